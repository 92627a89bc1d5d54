//! Machine entries of the discovery directory.

use crate::{DiscoveryError, DiscoveryResult};

/// A cluster member as registered in the discovery directory.
///
/// Every peer URL of one machine carries the same member name. Client URLs
/// are derived from the peer URLs by replacing the port with the configured
/// client port, preserving scheme and host, so `client_urls[i]` always
/// corresponds to `peer_urls[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    /// The cluster-unique member name.
    pub name: String,

    /// Advertised peer URLs, in registration order.
    pub peer_urls: Vec<String>,

    /// Derived client URLs, one per peer URL.
    pub client_urls: Vec<String>,
}

impl Machine {
    /// Parses a directory value of the form
    /// `name=scheme://host:port,name=scheme://host:port,...`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NameMismatch`] if the tokens do not all
    /// carry the same name, and [`DiscoveryError::MalformedPeerUrl`] if a
    /// token has no `=` or its URL has no port position to substitute.
    pub fn parse(named_peer_urls: &str, client_port: u16) -> DiscoveryResult<Self> {
        let mut machine = Machine {
            name: String::new(),
            peer_urls: Vec::new(),
            client_urls: Vec::new(),
        };

        for token in named_peer_urls.split(',') {
            let (name, peer_url) = token
                .split_once('=')
                .ok_or_else(|| DiscoveryError::MalformedPeerUrl(token.to_string()))?;
            if !machine.name.is_empty() && machine.name != name {
                return Err(DiscoveryError::NameMismatch(named_peer_urls.to_string()));
            }
            machine.name = name.to_string();
            machine.client_urls.push(substitute_port(peer_url, client_port)?);
            machine.peer_urls.push(peer_url.to_string());
        }

        Ok(machine)
    }

    /// Builds a machine from a name and its advertised peer URLs, deriving
    /// the client URLs.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::MalformedPeerUrl`] if a URL has no port
    /// position to substitute.
    pub fn from_urls(name: &str, peer_urls: &[String], client_port: u16) -> DiscoveryResult<Self> {
        let client_urls = peer_urls
            .iter()
            .map(|u| substitute_port(u, client_port))
            .collect::<DiscoveryResult<Vec<_>>>()?;

        Ok(Machine {
            name: name.to_string(),
            peer_urls: peer_urls.to_vec(),
            client_urls,
        })
    }

    /// Returns `name=peerURL` for each peer URL, in order.
    ///
    /// Joined with `,` this is the exact wire form written back to the
    /// discovery directory.
    #[must_use]
    pub fn named_peer_urls(&self) -> Vec<String> {
        self.peer_urls.iter().map(|u| format!("{}={}", self.name, u)).collect()
    }
}

/// Replaces the port of `scheme://host:port` with `client_port`.
///
/// The URL is treated as three colon-separated components; the third is
/// replaced wholesale, so `http://h0:2380` with client port 2379 becomes
/// `http://h0:2379`.
fn substitute_port(peer_url: &str, client_port: u16) -> DiscoveryResult<String> {
    let mut parts = peer_url.splitn(3, ':');
    let (Some(scheme), Some(host)) = (parts.next(), parts.next()) else {
        return Err(DiscoveryError::MalformedPeerUrl(peer_url.to_string()));
    };
    Ok(format!("{}:{}:{}", scheme, host, client_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_url() {
        let m = Machine::parse("n0=http://h0:2380", 2379).unwrap();

        assert_eq!(m.name, "n0");
        assert_eq!(m.peer_urls, vec!["http://h0:2380"]);
        assert_eq!(m.client_urls, vec!["http://h0:2379"]);
    }

    #[test]
    fn test_parse_multiple_urls_keeps_order() {
        let m = Machine::parse("n0=http://h0:2380,n0=http://h0b:2381", 2379).unwrap();

        assert_eq!(m.peer_urls, vec!["http://h0:2380", "http://h0b:2381"]);
        assert_eq!(m.client_urls, vec!["http://h0:2379", "http://h0b:2379"]);
    }

    #[test]
    fn test_parse_port_substitution_pairs_up() {
        let m = Machine::parse("n0=http://h0:2380,n0=https://h1:7001", 4001).unwrap();

        assert_eq!(m.peer_urls.len(), m.client_urls.len());
        assert_eq!(m.client_urls[0], "http://h0:4001");
        assert_eq!(m.client_urls[1], "https://h1:4001");
    }

    #[test]
    fn test_parse_name_mismatch() {
        let err = Machine::parse("n0=http://h0:2380,n1=http://h1:2380", 2379).unwrap_err();
        assert!(matches!(err, DiscoveryError::NameMismatch(_)));
    }

    #[test]
    fn test_parse_missing_equals() {
        let err = Machine::parse("http://h0:2380", 2379).unwrap_err();
        assert!(matches!(err, DiscoveryError::MalformedPeerUrl(_)));
    }

    #[test]
    fn test_parse_url_without_port_position() {
        let err = Machine::parse("n0=localhost", 2379).unwrap_err();
        assert!(matches!(err, DiscoveryError::MalformedPeerUrl(_)));
    }

    #[test]
    fn test_named_peer_urls_wire_form() {
        let m = Machine::parse("n0=http://h0:2380,n0=http://h0b:2381", 2379).unwrap();

        assert_eq!(
            m.named_peer_urls(),
            vec!["n0=http://h0:2380", "n0=http://h0b:2381"]
        );
    }

    #[test]
    fn test_from_urls() {
        let urls = vec!["http://h3:2380".to_string(), "http://h3b:2380".to_string()];
        let m = Machine::from_urls("n3", &urls, 2379).unwrap();

        assert_eq!(m.name, "n3");
        assert_eq!(m.peer_urls, urls);
        assert_eq!(m.client_urls, vec!["http://h3:2379", "http://h3b:2379"]);
    }
}
