//! WireGuard configuration file parser
//!
//! Reads the subset of a standard `.conf` a one-shot session needs:
//! `[Interface] PrivateKey, Address` and `[Peer] PublicKey, PresharedKey,
//! Endpoint`. Other keys are accepted and ignored.

use ipnet::IpNet;

use super::{decode_key, Configuration};
use crate::error::ConfigError;

/// Section type during parsing
#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Interface,
    Peer,
}

/// Parse a WireGuard configuration from a string
///
/// Keys are checked to be valid 32-byte base64 here; the first IPv4
/// `Address` becomes the client address. Only the first `[Peer]` is used.
pub fn parse_wg_conf(content: &str) -> Result<Configuration, ConfigError> {
    let mut config = Configuration::default();
    let mut current_section: Option<Section> = None;
    let mut seen_interface = false;
    let mut peers = 0usize;

    for (line_num, line) in content.lines().enumerate() {
        let line_num = line_num + 1; // 1-indexed
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.eq_ignore_ascii_case("[interface]") {
            current_section = Some(Section::Interface);
            seen_interface = true;
            continue;
        } else if line.eq_ignore_ascii_case("[peer]") {
            current_section = Some(Section::Peer);
            peers += 1;
            if peers > 1 {
                tracing::debug!("Ignoring [Peer] section at line {}", line_num);
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::ParseError {
                line: line_num,
                message: format!("Expected 'key = value', got: {}", line),
            });
        };

        let key = key.trim().to_lowercase();
        let value = value.trim();

        match current_section {
            Some(Section::Interface) => match key.as_str() {
                "privatekey" => {
                    decode_key(value, "PrivateKey")?;
                    config.private_key = value.to_string();
                }
                "address" => {
                    if config.client_ip_address.is_empty() {
                        if let Some(addr) = first_ipv4(value, line_num)? {
                            config.client_ip_address = addr;
                        }
                    }
                }
                _ => {
                    tracing::debug!("Unknown interface key: {}", key);
                }
            },
            Some(Section::Peer) if peers > 1 => {}
            Some(Section::Peer) => match key.as_str() {
                "publickey" => {
                    decode_key(value, "PublicKey")?;
                    config.public_key = value.to_string();
                }
                "presharedkey" => {
                    decode_key(value, "PresharedKey")?;
                    config.preshared_key = Some(value.to_string());
                }
                "endpoint" => {
                    config.endpoint = value.to_string();
                }
                _ => {
                    tracing::debug!("Unknown peer key: {}", key);
                }
            },
            None => {
                return Err(ConfigError::ParseError {
                    line: line_num,
                    message: "Configuration value outside of any section".to_string(),
                });
            }
        }
    }

    if !seen_interface {
        return Err(ConfigError::MissingField {
            field: "[Interface] section".to_string(),
        });
    }
    if config.private_key.is_empty() {
        return Err(ConfigError::MissingField {
            field: "PrivateKey".to_string(),
        });
    }
    if config.public_key.is_empty() {
        return Err(ConfigError::MissingField {
            field: "PublicKey in [Peer]".to_string(),
        });
    }

    Ok(config)
}

/// First IPv4 address in a comma-separated `Address` list
fn first_ipv4(value: &str, line_num: usize) -> Result<Option<String>, ConfigError> {
    for addr_str in value.split(',') {
        let addr_str = addr_str.trim();
        if addr_str.is_empty() {
            continue;
        }
        let ip_net: IpNet = addr_str.parse().map_err(|_| ConfigError::ParseError {
            line: line_num,
            message: format!("Invalid Address: {}", addr_str),
        })?;
        if let IpNet::V4(v4net) = ip_net {
            return Ok(Some(v4net.addr().to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONFIG: &str = r#"
[Interface]
PrivateKey = UOvtcWdILFwjb1UnsnK+a9lcqYvNTmtPv+fvqIVOz3w=
Address = fd00::2/64, 10.0.0.2/24
DNS = 8.8.8.8

[Peer]
PublicKey = YgkBjKXER5YarD8STsvMFURw/5nhCLIFOJ5uKWrrMW4=
AllowedIPs = 10.0.0.0/24, 0.0.0.0/0
Endpoint = 13.239.46.151:51820
PersistentKeepalive = 25
"#;

    #[test]
    fn test_parse_config() {
        let config = parse_wg_conf(TEST_CONFIG).unwrap();

        assert_eq!(
            config.private_key,
            "UOvtcWdILFwjb1UnsnK+a9lcqYvNTmtPv+fvqIVOz3w="
        );
        assert_eq!(
            config.public_key,
            "YgkBjKXER5YarD8STsvMFURw/5nhCLIFOJ5uKWrrMW4="
        );
        assert_eq!(config.client_ip_address, "10.0.0.2");
        assert_eq!(config.endpoint, "13.239.46.151:51820");
        assert!(config.preshared_key.is_none());
        assert!(config.resolve().is_ok());
    }

    #[test]
    fn test_first_peer_wins() {
        let content = format!(
            "{}\n[Peer]\nPublicKey = AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=\nEndpoint = 192.0.2.9:1\n",
            TEST_CONFIG
        );
        let config = parse_wg_conf(&content).unwrap();
        assert_eq!(config.endpoint, "13.239.46.151:51820");
    }

    #[test]
    fn test_preshared_key() {
        let content = TEST_CONFIG.replace(
            "Endpoint",
            "PresharedKey = AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=\nEndpoint",
        );
        let config = parse_wg_conf(&content).unwrap();
        assert_eq!(
            config.preshared_key.as_deref(),
            Some("AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=")
        );
    }

    #[test]
    fn test_invalid_key() {
        let content = TEST_CONFIG.replace(
            "YgkBjKXER5YarD8STsvMFURw/5nhCLIFOJ5uKWrrMW4=",
            "dG9vIHNob3J0",
        );
        assert!(matches!(
            parse_wg_conf(&content),
            Err(ConfigError::InvalidKey { field }) if field == "PublicKey"
        ));
    }

    #[test]
    fn test_missing_interface() {
        let config = "[Peer]\nPublicKey = YgkBjKXER5YarD8STsvMFURw/5nhCLIFOJ5uKWrrMW4=\n";
        assert!(matches!(
            parse_wg_conf(config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_missing_private_key() {
        let config = "[Interface]\nAddress = 10.0.0.2/24\n";
        assert!(parse_wg_conf(config).is_err());
    }

    #[test]
    fn test_value_outside_section() {
        assert!(matches!(
            parse_wg_conf("PrivateKey = x\n"),
            Err(ConfigError::ParseError { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_line() {
        assert!(matches!(
            parse_wg_conf("[Interface]\njunk\n"),
            Err(ConfigError::ParseError { line: 2, .. })
        ));
    }
}
