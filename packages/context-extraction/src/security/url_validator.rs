//! SSRF protection for page URLs.
//!
//! Page URLs come straight from upload forms, so every fetch is checked
//! before a request leaves the process: the scheme, the host name, any
//! literal IP, and (in [`UrlValidator::validate_with_dns`]) every address
//! the name resolves to.

use ipnet::IpNet;
use std::collections::HashSet;
use std::net::IpAddr;
use url::{Host, Url};

use crate::error::{SecurityError, SecurityResult};

/// Host names that always point inside the deployment.
const INTERNAL_HOSTS: [&str; 5] = [
    "localhost",
    "metadata.google.internal",
    "metadata.gke.internal",
    "instance-data",
    "metadata",
];

/// Private, loopback, link-local (cloud metadata) and shared ranges.
const INTERNAL_RANGES: [&str; 10] = [
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "::/128",
    "::1/128",
    "fc00::/7",
];

/// Checks page URLs before they are fetched.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    blocked_hosts: HashSet<String>,
    blocked_ranges: Vec<IpNet>,
    /// Trusted hosts skip every check
    trusted_hosts: HashSet<String>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlValidator {
    pub fn new() -> Self {
        let mut blocked_ranges: Vec<IpNet> = INTERNAL_RANGES
            .iter()
            .filter_map(|range| range.parse().ok())
            .collect();
        if let Ok(link_local_v6) = "fe80::/10".parse() {
            blocked_ranges.push(link_local_v6);
        }

        Self {
            blocked_hosts: INTERNAL_HOSTS.iter().map(|h| h.to_string()).collect(),
            blocked_ranges,
            trusted_hosts: HashSet::new(),
        }
    }

    /// Trust a host, e.g. a local test server.
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.trusted_hosts.insert(host.into().to_ascii_lowercase());
        self
    }

    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into().to_ascii_lowercase());
        self
    }

    pub fn block_cidr(mut self, range: IpNet) -> Self {
        self.blocked_ranges.push(range);
        self
    }

    /// Check scheme, host name and any literal IP without touching DNS.
    pub fn validate(&self, url: &str) -> SecurityResult<()> {
        self.check(url).map(|_| ())
    }

    /// [`validate`](Self::validate), then resolve the host and check every
    /// address, so a public name pointing at an internal IP is refused.
    pub async fn validate_with_dns(&self, url: &str) -> SecurityResult<()> {
        let Some((name, port)) = self.check(url)? else {
            return Ok(());
        };

        let addrs = tokio::net::lookup_host((name.as_str(), port))
            .await
            .map_err(|e| SecurityError::DnsResolution(format!("{name}: {e}")))?;

        for addr in addrs {
            if let Err(SecurityError::BlockedCidr(ip)) = self.check_ip(addr.ip()) {
                return Err(SecurityError::BlockedCidr(format!("{ip} ({name})")));
            }
        }
        Ok(())
    }

    /// Returns the name and port still to resolve, or `None` when nothing
    /// is left to check (a literal IP or a trusted host).
    fn check(&self, url: &str) -> SecurityResult<Option<(String, u16)>> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SecurityError::DisallowedScheme(parsed.scheme().to_string()));
        }

        let host = parsed.host().ok_or(SecurityError::NoHost)?;
        let port = parsed.port_or_known_default().unwrap_or(80);

        match host {
            Host::Ipv4(ip) => self.check_ip(IpAddr::V4(ip)).map(|_| None),
            Host::Ipv6(ip) => self.check_ip(IpAddr::V6(ip)).map(|_| None),
            Host::Domain(name) => {
                let name = name.trim_end_matches('.').to_ascii_lowercase();
                if self.trusted_hosts.contains(&name) {
                    return Ok(None);
                }
                if self.blocked_hosts.contains(&name) || name.ends_with(".localhost") {
                    return Err(SecurityError::BlockedHost(name));
                }
                Ok(Some((name, port)))
            }
        }
    }

    fn check_ip(&self, ip: IpAddr) -> SecurityResult<()> {
        // An IPv4-mapped IPv6 address is judged by its IPv4 form
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };

        if self.trusted_hosts.contains(&ip.to_string()) {
            return Ok(());
        }
        if self.blocked_ranges.iter().any(|range| range.contains(&ip)) {
            return Err(SecurityError::BlockedCidr(ip.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refused(url: &str) -> bool {
        UrlValidator::new().validate(url).is_err()
    }

    #[test]
    fn test_internal_targets_are_refused() {
        for url in [
            "http://localhost:8000/",
            "http://api.localhost/",
            "http://LOCALHOST./",
            "http://127.0.0.1/",
            "http://[::1]/",
            "http://[::ffff:127.0.0.1]/",
            "http://10.0.0.1/",
            "http://172.16.0.1/",
            "http://192.168.1.1/",
            "http://100.64.0.1/",
            "http://169.254.169.254/latest/meta-data",
            "http://metadata.google.internal/",
        ] {
            assert!(refused(url), "{url} should be refused");
        }
    }

    #[test]
    fn test_only_http_schemes() {
        let validator = UrlValidator::new();
        assert!(matches!(
            validator.validate("file:///etc/passwd"),
            Err(SecurityError::DisallowedScheme(_))
        ));
        assert!(refused("ftp://example.com/brief.pdf"));
    }

    #[test]
    fn test_public_pages_pass() {
        assert!(!refused("https://acme.example/about"));
        assert!(!refused("http://8.8.8.8/"));
    }

    #[test]
    fn test_trusted_host_and_extra_blocks() {
        let validator = UrlValidator::new()
            .allow_host("localhost")
            .block_host("intranet.acme.example")
            .block_cidr("203.0.113.0/24".parse().unwrap());

        assert!(validator.validate("http://localhost:9000/").is_ok());
        assert!(validator.validate("https://intranet.acme.example/").is_err());
        assert!(validator.validate("http://203.0.113.7/").is_err());
    }

    #[tokio::test]
    async fn test_dns_check_skips_literal_ips() {
        let validator = UrlValidator::new();
        assert!(validator.validate_with_dns("http://8.8.8.8/").await.is_ok());
        assert!(validator.validate_with_dns("http://10.1.2.3/").await.is_err());
    }
}
