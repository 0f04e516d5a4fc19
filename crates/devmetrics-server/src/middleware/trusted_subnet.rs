use std::net::IpAddr;

use hyper::HeaderMap;
use ipnetwork::IpNetwork;

use crate::error::ServerError;

/// Gates write requests by the `X-Real-IP` header against a trusted CIDR (spec §6/§8).
/// An empty/unparsable `network` always passes, matching the original's fail-open behavior
/// when `trustedSubnet` is blank or malformed.
pub fn check(network: Option<&IpNetwork>, headers: &HeaderMap) -> Result<(), ServerError> {
    let Some(network) = network else {
        return Ok(());
    };

    let agent_ip = headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<IpAddr>().ok());

    match agent_ip {
        Some(ip) if network.contains(ip) => Ok(()),
        _ => Err(ServerError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn no_network_always_passes() {
        let headers = HeaderMap::new();
        assert!(check(None, &headers).is_ok());
    }

    #[test]
    fn ip_inside_cidr_passes() {
        let network: IpNetwork = "10.0.0.0/8".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("10.1.2.3"));
        assert!(check(Some(&network), &headers).is_ok());
    }

    #[test]
    fn ip_outside_cidr_is_forbidden() {
        let network: IpNetwork = "10.0.0.0/8".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("192.168.1.1"));
        assert!(matches!(
            check(Some(&network), &headers),
            Err(ServerError::Forbidden)
        ));
    }

    #[test]
    fn missing_header_with_configured_network_is_forbidden() {
        let network: IpNetwork = "10.0.0.0/8".parse().unwrap();
        let headers = HeaderMap::new();
        assert!(matches!(
            check(Some(&network), &headers),
            Err(ServerError::Forbidden)
        ));
    }
}
