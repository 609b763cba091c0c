use reframe_types::{ReframeError, ReframeResult, TargetDescriptor};
use std::net::{Ipv4Addr, Ipv6Addr};
use url::Host;

/// Parses and vets a raw target. The private/loopback checks always run;
/// they are the only thing standing between this proxy and the inside of
/// the network it runs on. The suffix allow-list is optional on top.
pub fn resolve(raw: &str, allowed_suffixes: &[String]) -> ReframeResult<TargetDescriptor> {
    let target = TargetDescriptor::parse(raw)?;

    if host_is_private(&target.host()) {
        return Err(ReframeError::ForbiddenHost(target.hostname().to_string()));
    }

    if !host_is_allowed(target.hostname(), allowed_suffixes) {
        return Err(ReframeError::HostNotAllowed(target.hostname().to_string()));
    }

    Ok(target)
}

fn host_is_private(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            let domain = domain.strip_suffix('.').unwrap_or(&domain);
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(addr) => ipv4_is_private(*addr),
        Host::Ipv6(addr) => ipv6_is_private(*addr),
    }
}

fn ipv4_is_private(addr: Ipv4Addr) -> bool {
    addr.is_loopback()          // 127.0.0.0/8
        || addr.is_private()    // 10/8, 172.16/12, 192.168/16
        || addr.is_link_local() // 169.254/16
        || addr.is_unspecified()
        || addr.octets()[0] == 0 // 0.0.0.0/8 routes to local on Linux
}

fn ipv6_is_private(addr: Ipv6Addr) -> bool {
    if let Some(mapped) = addr.to_ipv4_mapped() {
        return ipv4_is_private(mapped);
    }
    addr.is_loopback()
        || addr.is_unspecified()
        || (addr.segments()[0] & 0xffc0) == 0xfe80 // link-local fe80::/10
        || (addr.segments()[0] & 0xfe00) == 0xfc00 // unique-local fc00::/7
}

fn host_is_allowed(hostname: &str, allowed_suffixes: &[String]) -> bool {
    if allowed_suffixes.is_empty() {
        return true;
    }
    let hostname = hostname.to_ascii_lowercase();
    allowed_suffixes.iter().any(|s| hostname.ends_with(s.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_ALLOWLIST: &[String] = &[];

    #[test]
    fn test_public_hosts_pass() {
        for url in [
            "https://example.com/",
            "http://example.com:8080/path?q=1",
            "https://93.184.216.34/",
            "https://[2606:2800:220:1:248:1893:25c8:1946]/",
        ] {
            assert!(resolve(url, NO_ALLOWLIST).is_ok(), "rejected {}", url);
        }
    }

    #[test]
    fn test_loopback_rejected() {
        for url in [
            "http://localhost/",
            "http://localhost:8080/admin",
            "http://sub.localhost/",
            "http://127.0.0.1/",
            "http://127.8.9.10/",
            "http://[::1]/",
        ] {
            assert!(
                matches!(resolve(url, NO_ALLOWLIST), Err(ReframeError::ForbiddenHost(_))),
                "accepted {}",
                url
            );
        }
    }

    #[test]
    fn test_private_ranges_rejected() {
        for url in [
            "http://10.0.0.1/",
            "http://10.255.255.254/",
            "http://172.16.0.1/",
            "http://172.31.99.1/",
            "http://192.168.1.1/",
            "http://169.254.169.254/latest/meta-data/",
            "http://0.0.0.0/",
            "http://[fe80::1]/",
            "http://[fd00::1]/",
            "http://[::ffff:192.168.0.1]/",
        ] {
            assert!(
                matches!(resolve(url, NO_ALLOWLIST), Err(ReframeError::ForbiddenHost(_))),
                "accepted {}",
                url
            );
        }
    }

    #[test]
    fn test_172_boundary() {
        assert!(resolve("http://172.15.0.1/", NO_ALLOWLIST).is_ok());
        assert!(resolve("http://172.16.0.1/", NO_ALLOWLIST).is_err());
        assert!(resolve("http://172.31.255.1/", NO_ALLOWLIST).is_err());
        assert!(resolve("http://172.32.0.1/", NO_ALLOWLIST).is_ok());
    }

    #[test]
    fn test_allowlist_suffix_match() {
        let allowed = vec!["example.com".to_string(), "wikipedia.org".to_string()];

        assert!(resolve("https://example.com/", &allowed).is_ok());
        assert!(resolve("https://www.example.com/", &allowed).is_ok());
        assert!(resolve("https://en.wikipedia.org/wiki/Proxy", &allowed).is_ok());
        assert!(matches!(
            resolve("https://evil.net/", &allowed),
            Err(ReframeError::HostNotAllowed(_))
        ));
    }

    #[test]
    fn test_allowlist_never_overrides_guard() {
        let allowed = vec!["localhost".to_string()];
        assert!(matches!(
            resolve("http://localhost/", &allowed),
            Err(ReframeError::ForbiddenHost(_))
        ));
    }

    #[test]
    fn test_invalid_targets() {
        for raw in ["", "not a url", "ftp://example.com/", "//example.com/path"] {
            assert!(
                matches!(resolve(raw, NO_ALLOWLIST), Err(ReframeError::InvalidUrl(_))),
                "accepted {:?}",
                raw
            );
        }
    }
}
