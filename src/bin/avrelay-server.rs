//! Relay server binary
//!
//! Run with: avrelay-server [--listen BIND_ADDR]
//!
//! Examples:
//!   avrelay-server                                  # binds to 0.0.0.0:1935
//!   avrelay-server --listen localhost               # binds to 127.0.0.1:1935
//!   avrelay-server --listen 127.0.0.1:1936          # binds to 127.0.0.1:1936
//!   avrelay-server --archive-dir /var/lib/avrelay   # archive primary tracks there
//!   avrelay-server --no-archive                     # relay only

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use avrelay::protocol::constants::DEFAULT_PORT;
use avrelay::registry::config::{DEFAULT_GOP_CACHE_MAX_SIZE, DEFAULT_QUEUE_CAPACITY};
use avrelay::{RegistryConfig, RelayServer, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "avrelay-server", version, about = "Live audio/video relay server")]
struct Args {
    /// Address to bind to: IP:PORT, IP or localhost[:PORT]
    #[arg(short, long, default_value = "0.0.0.0:1935", value_parser = parse_bind_addr)]
    listen: SocketAddr,

    /// Directory receiving primary-track archives
    #[arg(long, default_value = ".")]
    archive_dir: PathBuf,

    /// Do not archive primary tracks
    #[arg(long, conflicts_with = "archive_dir")]
    no_archive: bool,

    /// Per-stream queue capacity in packets
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Late-joiner GOP cache limit in bytes (0 disables it)
    #[arg(long, default_value_t = DEFAULT_GOP_CACHE_MAX_SIZE)]
    gop_cache_size: usize,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_connections: usize,
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:1935
/// - "localhost:1936" -> 127.0.0.1:1936
/// - "127.0.0.1" -> 127.0.0.1:1935
/// - "127.0.0.1:1936" -> 127.0.0.1:1936
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("avrelay=info".parse()?)
                .add_directive("avrelay_server=info".parse()?),
        )
        .init();

    let mut config = ServerConfig::default()
        .bind(args.listen)
        .max_connections(args.max_connections);
    config = if args.no_archive {
        config.disable_archive()
    } else {
        config.archive_dir(args.archive_dir)
    };

    let registry_config = RegistryConfig::default()
        .queue_capacity(args.queue_capacity)
        .gop_cache_max_size(args.gop_cache_size);

    let server = RelayServer::with_registry_config(config, registry_config);

    tracing::info!(addr = %server.bind_addr(), "Starting relay server");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
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
            "127.0.0.1:1935".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_bind_addr("localhost:1936").unwrap(),
            "127.0.0.1:1936".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_bind_addr("0.0.0.0").unwrap(),
            "0.0.0.0:1935".parse::<SocketAddr>().unwrap()
        );
        assert!(parse_bind_addr("not an address").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["avrelay-server"]);

        assert_eq!(args.listen.port(), 1935);
        assert!(!args.no_archive);
        assert_eq!(args.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_args_no_archive() {
        let args = Args::parse_from(["avrelay-server", "--no-archive", "-l", "localhost:2000"]);

        assert!(args.no_archive);
        assert_eq!(args.listen.port(), 2000);
    }
}
