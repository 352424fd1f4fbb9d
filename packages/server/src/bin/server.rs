//! WebSocket relay server.
//!
//! Broadcasts every text message a client sends to all connected clients.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hibiki-server
//! cargo run --bin hibiki-server -- --host 127.0.0.1 --port 3000 --path /relay
//! ```

use clap::Parser;

use hibiki_server::{config::ServerConfig, ui::Server};
use hibiki_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "hibiki-server")]
#[command(about = "WebSocket relay server that broadcasts every message to all clients", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value_t = 8080)]
    port: u16,

    /// Path the WebSocket endpoint is mounted at
    #[arg(long, default_value = "/server")]
    path: String,

    /// Directory with static files served at "/"
    #[arg(long, default_value = "webroot")]
    static_dir: String,

    /// Capacity of each session's inbound and outbound queues
    #[arg(long, default_value_t = 64)]
    queue_capacity: usize,

    /// Milliseconds a broadcast waits on a full outbound queue (0 = no limit)
    #[arg(long, default_value_t = 5_000)]
    send_timeout_ms: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            ws_path: args.path,
            static_dir: args.static_dir,
            outbound_capacity: args.queue_capacity,
            inbound_capacity: args.queue_capacity,
            send_timeout_ms: args.send_timeout_ms,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger("hibiki_server", env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let config = ServerConfig::from(args);

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
