//! Simple client for a running inbound gate.
//!
//! Run with:
//!   GATE_API_KEY=xui_... GATE_API_SECRET=... cargo run --example signed_client -- O1 U1 vless
//!
//! `GATE_URL` defaults to `http://127.0.0.1:8080`.
//!
//! Steps:
//! 1. order/status - Show the order before provisioning
//! 2. inbound/create - Provision an inbound for the order
//! 3. inbound/create again - Same order, expect the same inbound back
//! 4. order/status - Show the consumed order

use std::env;

use inbound_gate::client::ApiClient;
use inbound_gate::protocol::{CreateInboundRequest, Envelope};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = env::var("GATE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let api_key = env::var("GATE_API_KEY")?;
    let secret = env::var("GATE_API_SECRET")?;

    let args: Vec<String> = env::args().skip(1).collect();
    let order_id = args.first().map(String::as_str).unwrap_or("O1");
    let user_id = args.get(1).map(String::as_str).unwrap_or("U1");
    let protocol = args.get(2).map(String::as_str).unwrap_or("vless");

    println!("=== Inbound Gate Client ({}) ===\n", base_url);
    let client = ApiClient::new(base_url, api_key, secret)?;

    println!("Step 1: order/status");
    print_envelope(&client.order_status(order_id).await?)?;

    println!("Step 2: inbound/create");
    let request = CreateInboundRequest::new(order_id, user_id, protocol);
    print_envelope(&client.create_inbound(&request).await?)?;

    println!("Step 3: inbound/create (retry)");
    print_envelope(&client.create_inbound(&request).await?)?;

    println!("Step 4: order/status");
    print_envelope(&client.order_status(order_id).await?)?;

    println!("=== Done ===");
    Ok(())
}

fn print_envelope(envelope: &Envelope) -> Result<(), Box<dyn std::error::Error>> {
    println!("Response: {}\n", serde_json::to_string_pretty(envelope)?);
    Ok(())
}
