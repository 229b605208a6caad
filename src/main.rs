//! wg-oneshot - send one UDP datagram through a WireGuard peer
//!
//! Performs a single handshake with the peer, tunnels one payload to the
//! given destination, prints the one reply and exits.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use wireguard_oneshot::{run_session_with, Configuration, OneshotError, SessionOptions};

/// How `--payload` is encoded on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PayloadFormat {
    Text,
    Base64,
}

/// wg-oneshot - one UDP round trip through a WireGuard peer
#[derive(Parser, Debug)]
#[command(name = "wg-oneshot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WireGuard `.conf` or JSON configuration file (flags below override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Our private key (base64)
    #[arg(long)]
    private_key: Option<String>,

    /// The peer's public key (base64)
    #[arg(long)]
    public_key: Option<String>,

    /// Preshared key (base64)
    #[arg(long)]
    preshared_key: Option<String>,

    /// The peer's endpoint, host:port
    #[arg(long)]
    endpoint: Option<String>,

    /// Our tunnel IPv4 address
    #[arg(long)]
    client_ip: Option<String>,

    /// IPv4 address the datagram is sent to inside the tunnel
    #[arg(long)]
    destination_ip: Option<String>,

    /// UDP port the datagram is sent to inside the tunnel
    #[arg(long)]
    destination_port: Option<u16>,

    /// Datagram payload
    #[arg(long, default_value = "")]
    payload: String,

    /// Encoding of --payload
    #[arg(long, value_enum, default_value_t = PayloadFormat::Text)]
    payload_format: PayloadFormat,

    /// Receive timeout for the handshake and for the reply, in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Print the reply as lowercase hex instead of text
    #[arg(long)]
    hex: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins unless --verbose is given
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => match e.downcast_ref::<OneshotError>() {
            Some(err) => {
                eprintln!("Error: {}", err.user_message());
                ExitCode::from(err.exit_code() as u8)
            }
            None => {
                eprintln!("Error: {:#}", e);
                ExitCode::from(1)
            }
        },
    }
}

async fn run(args: Args) -> anyhow::Result<String> {
    let config = build_config(&args)?;

    let missing = missing_fields(&config, &args);
    if !missing.is_empty() {
        bail!("missing required values: {}", missing.join(", "));
    }

    let destination_ip = args.destination_ip.as_deref().unwrap_or_default();
    let destination_port = args.destination_port.unwrap_or_default();
    if destination_port == 0 {
        bail!("--destination-port must be between 1 and 65535");
    }

    let payload = match args.payload_format {
        PayloadFormat::Text => args.payload.clone().into_bytes(),
        PayloadFormat::Base64 => BASE64
            .decode(args.payload.trim())
            .context("--payload is not valid base64")?,
    };

    let options = SessionOptions {
        timeout: Duration::from_millis(args.timeout_ms),
    };

    tracing::info!(
        "Sending {} bytes to {}:{} via {}",
        payload.len(),
        destination_ip,
        destination_port,
        config.endpoint
    );

    let reply =
        run_session_with(&config, &options, &payload, destination_ip, destination_port).await?;

    Ok(render_reply(&reply, args.hex))
}

/// Load the config file, if any, then apply flag overrides
fn build_config(args: &Args) -> anyhow::Result<Configuration> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            Configuration::from_file(path).map_err(|e| anyhow!(OneshotError::from(e)))?
        }
        None => Configuration::default(),
    };

    if let Some(value) = &args.private_key {
        config.private_key = value.clone();
    }
    if let Some(value) = &args.public_key {
        config.public_key = value.clone();
    }
    if let Some(value) = &args.preshared_key {
        config.preshared_key = Some(value.clone());
    }
    if let Some(value) = &args.endpoint {
        config.endpoint = value.clone();
    }
    if let Some(value) = &args.client_ip {
        config.client_ip_address = value.clone();
    }

    Ok(config)
}

/// Every required value that is still absent, as flag names
fn missing_fields(config: &Configuration, args: &Args) -> Vec<&'static str> {
    let mut missing: Vec<&'static str> = config
        .missing_fields()
        .into_iter()
        .map(|field| match field {
            "privateKey" => "--private-key",
            "publicKey" => "--public-key",
            "endpoint" => "--endpoint",
            _ => "--client-ip",
        })
        .collect();

    if args.destination_ip.as_deref().map_or(true, |ip| ip.trim().is_empty()) {
        missing.push("--destination-ip");
    }
    if args.destination_port.is_none() {
        missing.push("--destination-port");
    }
    missing
}

/// Text up to the first NUL byte, or the full reply as hex
fn render_reply(reply: &[u8], hex: bool) -> String {
    if hex {
        return hex::encode(reply);
    }
    let end = reply.iter().position(|&b| b == 0).unwrap_or(reply.len());
    String::from_utf8_lossy(&reply[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_truncates_at_nul() {
        assert_eq!(render_reply(b"pong\0\0garbage", false), "pong");
        assert_eq!(render_reply(b"pong", false), "pong");
        assert_eq!(render_reply(b"\0", false), "");
    }

    #[test]
    fn test_render_hex() {
        assert_eq!(render_reply(&[0x00, 0xab, 0x10], true), "00ab10");
    }

    #[test]
    fn test_missing_fields_listed_together() {
        let args = Args::parse_from(["wg-oneshot", "--private-key", "x"]);
        let config = build_config(&args).unwrap();
        assert_eq!(
            missing_fields(&config, &args),
            vec![
                "--public-key",
                "--endpoint",
                "--client-ip",
                "--destination-ip",
                "--destination-port"
            ]
        );
    }

    #[test]
    fn test_all_flags_satisfy_requirements() {
        let args = Args::parse_from([
            "wg-oneshot",
            "--private-key",
            "a",
            "--public-key",
            "b",
            "--endpoint",
            "127.0.0.1:51820",
            "--client-ip",
            "10.0.0.2",
            "--destination-ip",
            "10.0.0.1",
            "--destination-port",
            "53",
            "--payload-format",
            "base64",
        ]);
        let config = build_config(&args).unwrap();
        assert!(missing_fields(&config, &args).is_empty());
        assert_eq!(config.endpoint, "127.0.0.1:51820");
        assert!(config.preshared_key.is_none());
        assert_eq!(args.payload_format, PayloadFormat::Base64);
    }
}
