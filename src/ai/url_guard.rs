use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

use crate::utils::error::{AppError, Result};

const BLOCKED_HOSTS: &[&str] = &["localhost", "metadata.google.internal", "metadata"];

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast()
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_private_v4(mapped);
    }
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local, fe80::/10 link local
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

/// Accepts only http(s) URLs that point at public hosts.
pub fn check_public_url(url: &Url) -> Result<()> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!("Invalid URL scheme: {}", url.scheme())));
    }

    match url.host() {
        None => Err(AppError::Validation("Invalid URL: no hostname".to_string())),
        Some(Host::Ipv4(ip)) if is_private(IpAddr::V4(ip)) => Err(AppError::Validation(format!(
            "Access to private IP address is not allowed: {}",
            ip
        ))),
        Some(Host::Ipv6(ip)) if is_private(IpAddr::V6(ip)) => Err(AppError::Validation(format!(
            "Access to private IP address is not allowed: {}",
            ip
        ))),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            let blocked = BLOCKED_HOSTS
                .iter()
                .any(|b| domain == *b || domain.ends_with(&format!(".{}", b)));
            if blocked {
                Err(AppError::Validation(format!("Access to {} is not allowed", domain)))
            } else {
                Ok(())
            }
        }
        Some(_) => Ok(()),
    }
}

pub fn parse_public_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    check_public_url(&url)?;
    Ok(url)
}
