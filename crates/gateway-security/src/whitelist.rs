//! Source address whitelist.

use crate::error::{GateRejection, Result, SecurityError};
use gateway_config::WhitelistSettings;
use ipnetwork::IpNetwork;
use std::collections::HashSet;
use std::net::IpAddr;
use std::str::FromStr;

/// Fixed set of hosts allowed to reach the gateway.
///
/// Entries are IP addresses, CIDR networks or literal host names. The set is
/// built once and never mutated, so it can be shared freely across requests.
///
/// Host-name entries only match callers identified by name. The HTTP server
/// identifies every caller by its IP address, so behind it only address and
/// network entries take effect.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    networks: Vec<IpNetwork>,
    names: HashSet<String>,
}

impl Whitelist {
    /// Build from configuration entries.
    ///
    /// # Errors
    /// Returns error if an entry is neither an address, a network nor a host name.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut whitelist = Self::default();

        for entry in entries {
            let entry = entry.as_ref().trim();
            if let Ok(network) = parse_ip_or_network(entry) {
                whitelist.networks.push(network);
            } else if is_host_name(entry) {
                whitelist.names.insert(entry.to_ascii_lowercase());
            } else {
                return Err(SecurityError::config(format!(
                    "Invalid whitelist entry: '{entry}'"
                )));
            }
        }

        Ok(whitelist)
    }

    /// Build from the `whitelist` configuration section.
    ///
    /// # Errors
    /// Returns error if an entry cannot be parsed.
    pub fn from_settings(settings: &WhitelistSettings) -> Result<Self> {
        Self::from_entries(&settings.allowed)
    }

    /// Whether `remote_address` (a host without port) may proceed.
    #[must_use]
    pub fn admit(&self, remote_address: &str) -> bool {
        let host = strip_brackets(remote_address.trim());

        if let Ok(ip) = IpAddr::from_str(host) {
            let ip = unmap_ipv4(ip);
            return self.networks.iter().any(|network| network.contains(ip));
        }

        !host.is_empty() && self.names.contains(&host.to_ascii_lowercase())
    }

    /// Like [`Whitelist::admit`], returning the rejection on deny.
    ///
    /// # Errors
    /// Returns [`GateRejection`] when the address is not whitelisted.
    pub fn check(&self, remote_address: &str) -> std::result::Result<(), GateRejection> {
        if self.admit(remote_address) {
            Ok(())
        } else {
            Err(GateRejection::new(remote_address))
        }
    }

    /// Number of configured entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.networks.len() + self.names.len()
    }

    /// Whether no entry is configured. An empty whitelist denies everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Proxies whose `X-Forwarded-For` header is believed.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    proxies: HashSet<IpNetwork>,
}

impl TrustedProxies {
    /// Create an empty set. With no trusted proxies the socket peer is always the client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration entries.
    ///
    /// # Errors
    /// Returns error if an entry is not an IP address or CIDR network.
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut proxies = Self::new();
        for entry in entries {
            proxies.add(entry.as_ref())?;
        }
        Ok(proxies)
    }

    /// Add a trusted proxy.
    ///
    /// # Errors
    /// Returns error if IP/CIDR parsing fails.
    pub fn add(&mut self, proxy: &str) -> Result<()> {
        let network = parse_ip_or_network(proxy.trim())?;
        self.proxies.insert(network);
        Ok(())
    }

    /// Check if an IP is a trusted proxy.
    #[must_use]
    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        let ip = unmap_ipv4(ip);
        self.proxies.iter().any(|network| network.contains(ip))
    }

    /// Resolve the client address for a connection from `remote_addr`.
    #[must_use]
    pub fn get_client_ip(&self, xff_header: Option<&str>, remote_addr: IpAddr) -> IpAddr {
        let Some(xff) = xff_header else {
            return remote_addr;
        };

        if !self.is_trusted(remote_addr) {
            return remote_addr;
        }

        // Right to left: the first hop we do not trust is the client.
        let hops: Vec<&str> = xff.split(',').map(str::trim).collect();
        for hop in hops.iter().rev() {
            match hop.parse::<IpAddr>() {
                Ok(ip) if !self.is_trusted(ip) => return ip,
                Ok(_) => {}
                Err(_) => return remote_addr,
            }
        }

        hops.first()
            .and_then(|ip| ip.parse().ok())
            .unwrap_or(remote_addr)
    }
}

/// Parse an IP address or CIDR network.
fn parse_ip_or_network(s: &str) -> Result<IpNetwork> {
    if let Ok(network) = IpNetwork::from_str(s) {
        return Ok(network);
    }

    if let Ok(ip) = IpAddr::from_str(strip_brackets(s)) {
        return Ok(IpNetwork::from(ip));
    }

    Err(SecurityError::config(format!(
        "Invalid IP address or network: {s}"
    )))
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// `::ffff:a.b.c.d` compares as `a.b.c.d`.
fn unmap_ipv4(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

/// RFC 1123 host name. An all-numeric last label is rejected so that a
/// mistyped address such as `300.1.1.1` is not taken for a name.
fn is_host_name(s: &str) -> bool {
    let valid_labels = s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let numeric_tld = s
        .rsplit('.')
        .next()
        .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_digit()));

    !s.is_empty() && s.len() <= 253 && valid_labels && !numeric_tld
}
