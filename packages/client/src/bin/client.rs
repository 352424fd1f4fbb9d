//! Command-line client for the Hibiki relay.
//!
//! Sends each line typed at the prompt to the relay and prints every message
//! the relay broadcasts. Reconnects automatically on disconnection (max 5
//! consecutive failed attempts with 5 second interval).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hibiki-client
//! cargo run --bin hibiki-client -- --url ws://127.0.0.1:9000/relay
//! ```

use clap::Parser;

use hibiki_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "hibiki-client")]
#[command(about = "Command-line client for the Hibiki broadcast relay", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/server")]
    url: String,
}

#[tokio::main]
async fn main() {
    setup_logger("hibiki_client", env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = hibiki_client::run_client(args.url).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
