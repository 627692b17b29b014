//! Inbound Gate - signed HTTP API that provisions proxy inbounds for paid orders.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inbound_gate::admin::{arg_value, AdminCommand};
use inbound_gate::config::Settings;
use inbound_gate::server::{AppState, GateServer};
use inbound_gate::store::Database;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG_PATH: &str = "/etc/inbound-gate/gate.toml";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = arg_value(&args, "--config", Some("-c"))
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error creating Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match AdminCommand::from_args(&args) {
        Ok(Some(command)) => {
            return match runtime.block_on(run_admin(&settings, command)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    ExitCode::FAILURE
                }
            };
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!("Listen address: {}", settings.server.bind);
    info!("Database path: {}", settings.database.path.display());
    info!("Log level: {}", settings.logging.level);

    match runtime.block_on(async_main(settings, config_path)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gate failed");
            ExitCode::FAILURE
        }
    }
}

/// Run a maintenance command against the configured database and exit.
async fn run_admin(
    settings: &Settings,
    command: AdminCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&settings.database.path).await?;
    let result = command.run(&db, settings.security.default_rate_limit).await;
    db.close().await;

    print!("{}", result?);
    Ok(())
}

async fn async_main(
    settings: Settings,
    config_path: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(&settings.database.path).await?;

    let state = AppState::new(db.clone(), &settings);
    state.start_background_tasks(&settings);
    let audit = state.audit.clone();

    let server = GateServer::bind(settings.server.bind, state).await?;
    info!(addr = %server.local_addr()?, "Gate listening");

    let shutdown = Arc::new(Notify::new());
    let stop = Arc::clone(&shutdown);
    let mut server_task = tokio::spawn(server.run(async move { stop.notified().await }));

    let drain_timeout = Duration::from_secs(settings.limits.shutdown_drain_seconds);

    loop {
        tokio::select! {
            result = &mut server_task => {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(error = %e, "HTTP listener failed");
                        return Err(e.into());
                    }
                    Err(e) => return Err(e.into()),
                }
                break;
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, initiating graceful shutdown...");
                shutdown.notify_one();

                match tokio::time::timeout(drain_timeout, &mut server_task).await {
                    Ok(_) => info!("Graceful shutdown complete"),
                    Err(_) => {
                        warn!(
                            "Shutdown timeout after {}s, some requests may be terminated",
                            drain_timeout.as_secs()
                        );
                        server_task.abort();
                    }
                }
                break;
            }
            _ = reload_signal() => {
                // The running listener keeps its snapshot; this only checks the file.
                info!("Reload signal received, validating configuration...");
                match Settings::load(&config_path) {
                    Ok(_) => info!("Configuration is valid; restart to apply changes"),
                    Err(e) => error!(error = %e, "Configuration reload failed, keeping existing settings"),
                }
            }
        }
    }

    if let Some(audit) = audit {
        if let Err(e) = audit.flush().await {
            warn!(error = %e, "Failed to flush audit log");
        }
    }
    db.close().await;
    info!("Gate stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Wait for a reload signal (SIGHUP).
#[cfg(unix)]
async fn reload_signal() {
    match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGHUP handler");
            std::future::pending::<()>().await;
        }
    }
}

/// No-op reload signal for non-Unix platforms.
#[cfg(not(unix))]
async fn reload_signal() {
    std::future::pending::<()>().await;
}

fn print_help() {
    println!(
        r#"{} {}
Signed HTTP API that provisions proxy inbounds for paid orders.

USAGE:
    inbound-gated [OPTIONS]

OPTIONS:
    -c, --config <PATH>         Path to configuration file
                                [default: {}]
        --create-key <NAME>     Issue an API key, print it, and exit
        --rate-limit <N>        Requests per window for the new key
        --allowed-ips <LIST>    Comma-separated source IPs for the new key
        --list-keys             List API keys (secrets are not shown)
        --enable-key <KEY>      Re-activate an API key
        --disable-key <KEY>     Deactivate an API key
        --delete-key <KEY>      Delete an API key
        --create-order <ID>     Record a pending order (needs --user)
        --user <ID>             Owner of the new order
        --amount <N>            Amount of the new order
        --expires-at <MS>       Deadline of the new order, ms epoch (0 = never)
        --mark-paid <ID>        Confirm payment of a pending order
    -h, --help                  Print help information
    -V, --version               Print version information
"#,
        NAME, VERSION, DEFAULT_CONFIG_PATH
    );
}

fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}
