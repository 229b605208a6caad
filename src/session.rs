//! One-shot session orchestration
//!
//! Validates the configuration, opens a UDP socket to the peer, runs one
//! handshake and one transport exchange on it, and closes it on return.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::config::{Configuration, SessionOptions};
use crate::error::{ConfigError, NetworkError, ProtocolError, Result};
use crate::protocol::{handshake, packet, transport};

/// Send `payload` to `dest_ip:dest_port` through the peer and return the reply payload
///
/// Uses the default options (5 second receive timeout).
pub async fn run_session(
    config: &Configuration,
    payload: &[u8],
    dest_ip: &str,
    dest_port: u16,
) -> Result<Vec<u8>> {
    run_session_with(config, &SessionOptions::default(), payload, dest_ip, dest_port).await
}

/// `run_session` with explicit options
pub async fn run_session_with(
    config: &Configuration,
    options: &SessionOptions,
    payload: &[u8],
    dest_ip: &str,
    dest_port: u16,
) -> Result<Vec<u8>> {
    let resolved = config.resolve()?;
    let destination: Ipv4Addr = dest_ip.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        value: dest_ip.to_string(),
    })?;
    if dest_port == 0 {
        return Err(ConfigError::InvalidEndpoint {
            value: format!("{}:{}", destination, dest_port),
        }
        .into());
    }
    if payload.len() > packet::MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload.len(),
            max: packet::MAX_PAYLOAD_LEN,
        }
        .into());
    }

    let endpoint = resolve_endpoint(&resolved.endpoint).await?;
    let socket = connect(endpoint).await?;
    tracing::info!("Connected to peer {}", endpoint);

    let key_pair = handshake::perform(&socket, &resolved, options.timeout).await?;

    transport::seal_and_send(
        &socket,
        &key_pair,
        payload,
        resolved.client_ip,
        destination,
        dest_port,
    )
    .await?;
    tracing::info!(
        "Sent {} byte payload to {}:{}",
        payload.len(),
        destination,
        dest_port
    );

    let reply = transport::receive_and_open(&socket, &key_pair, options.timeout).await?;
    tracing::info!("Received {} byte reply", reply.len());

    Ok(reply)
}

/// Bind an ephemeral IPv4 socket and connect it to the peer
async fn connect(endpoint: SocketAddr) -> Result<UdpSocket> {
    let bind_addr = "0.0.0.0:0";
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| NetworkError::BindFailed {
            addr: bind_addr.to_string(),
            reason: e.to_string(),
        })?;

    socket
        .connect(endpoint)
        .await
        .map_err(|e| NetworkError::ConnectFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    Ok(socket)
}

/// Resolve `host:port` to the first IPv4 socket address
async fn resolve_endpoint(endpoint: &str) -> Result<SocketAddr> {
    if let Ok(addr) = endpoint.parse::<SocketAddr>() {
        if addr.is_ipv4() {
            return Ok(addr);
        }
        return Err(NetworkError::NoIpv4Endpoint {
            host: endpoint.to_string(),
        }
        .into());
    }

    let addrs = tokio::net::lookup_host(endpoint)
        .await
        .map_err(|_| NetworkError::DnsResolutionFailed {
            host: endpoint.to_string(),
        })?;

    let mut addrs = addrs.peekable();
    if addrs.peek().is_none() {
        return Err(NetworkError::DnsResolutionFailed {
            host: endpoint.to_string(),
        }
        .into());
    }

    let addr = addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| NetworkError::NoIpv4Endpoint {
            host: endpoint.to_string(),
        })?;
    tracing::debug!("Resolved {} to {}", endpoint, addr);
    Ok(addr)
}
