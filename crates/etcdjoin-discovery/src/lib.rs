//! Client for the etcd discovery directory.
//!
//! A discovery directory is an HTTP-addressable key/value namespace shared by
//! every node joining the same cluster. Each machine advertises itself as a
//! child entry whose value is its named-peer-URL list
//! (`name=scheme://host:port,...`), and the directory's `/_config/size` key
//! holds the target cluster size.
//!
//! This crate provides the two pieces the join logic consumes:
//! - [`Machine`]: one registered member, parsed from a directory value, with
//!   client URLs derived from its peer URLs by port substitution.
//! - [`DiscoveryClient`]: the HTTP client over the directory (list, read,
//!   register, delete), every call bounded by a per-request timeout.

mod client;
mod machine;

use thiserror::Error;

pub use client::{DiscoveryClient, Event, Node, DISCOVERY_TIMEOUT};
pub use machine::Machine;

/// Errors that can occur talking to the discovery directory or parsing its
/// entries.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The directory answered with a status code the operation does not
    /// tolerate.
    #[error("status code {status} from {url:?}: {body}")]
    Http {
        /// HTTP status code of the response.
        status: u16,
        /// The request URL.
        url: String,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The directory answered 200 but the body did not decode.
    #[error("invalid answer from {url:?}: {source}")]
    Parse {
        /// The request URL.
        url: String,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A named-peer-URL list carried more than one member name.
    #[error("different names in {0:?}")]
    NameMismatch(String),

    /// A named-peer-URL token was not of the form `name=scheme://host:port`.
    #[error("malformed named peer url {0:?}")]
    MalformedPeerUrl(String),

    /// The `/_config/size` value was not a decimal integer.
    #[error("invalid cluster size {0:?} in discovery directory")]
    InvalidSize(String),

    /// The HTTP request itself failed (connect, timeout, ...).
    #[error("discovery request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
