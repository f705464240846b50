//! WebSocket broadcast hub server
//!
//! Run with: ws-hub [BIND_ADDR]
//!
//! Examples:
//!   ws-hub                    # binds to 0.0.0.0:12345
//!   ws-hub localhost          # binds to 127.0.0.1:12345
//!   ws-hub 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! Connect any WebSocket client to ws://HOST:PORT/ws. Text typed into one
//! client shows up on every client as {"sender":"<id>","content":"<text>"}.

use std::net::SocketAddr;

use ws_hub::server::config::DEFAULT_PORT;
use ws_hub::{HubServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:12345
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:12345
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: ws-hub [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  ws-hub                     # binds to 0.0.0.0:{}", DEFAULT_PORT);
    eprintln!("  ws-hub localhost           # binds to 127.0.0.1:{}", DEFAULT_PORT);
    eprintln!("  ws-hub 127.0.0.1:9000      # binds to 127.0.0.1:9000");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ws_hub=debug".parse()?),
        )
        .init();

    tracing::info!("Starting application");

    let server = HubServer::new(config);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind_addr() {
        assert_eq!(
            parse_bind_addr("localhost").unwrap(),
            "127.0.0.1:12345".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_bind_addr("localhost:9000").unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_bind_addr("0.0.0.0:1").unwrap(),
            "0.0.0.0:1".parse::<SocketAddr>().unwrap()
        );
        assert!(parse_bind_addr("not an address").is_err());
    }
}
