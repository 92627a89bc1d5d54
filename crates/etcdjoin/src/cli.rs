//! Command line interface definition.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use etcdjoin_cluster::Strategy;

/// etcdjoin: auto-join an etcd cluster, either during bootstrapping or
/// later.
#[derive(Debug, Parser)]
#[command(name = "etcdjoin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The etcd discovery URL shared by every node of the cluster.
    #[arg(long, env = "ELASTIC_ETCD_DISCOVERY")]
    pub discovery: String,

    /// The strategy to make room for this node: prepared, add, replace or
    /// prune.
    #[arg(
        long = "join-strategy",
        env = "ELASTIC_ETCD_JOIN_STRATEGY",
        default_value_t = Strategy::Replace
    )]
    pub join_strategy: Strategy,

    /// The cluster-unique node name.
    #[arg(long, env = "ELASTIC_ETCD_NAME")]
    pub name: String,

    /// The advertised peer URLs of this instance, comma-separated.
    #[arg(
        long = "initial-advertise-peer-urls",
        env = "ELASTIC_ETCD_INITIAL_ADVERTISE_PEER_URLS",
        default_value = "http://localhost:2380"
    )]
    pub initial_advertise_peer_urls: String,

    /// The etcd client port of all peers.
    #[arg(long = "client-port", env = "ELASTIC_ETCD_CLIENT_PORT", default_value_t = 2379)]
    pub client_port: u16,

    /// The target etcd cluster size: -1 reads the size value of the
    /// discovery URL, 0 means unbounded.
    #[arg(
        long = "cluster-size",
        env = "ELASTIC_ETCD_CLUSTER_SIZE",
        default_value_t = -1,
        allow_negative_numbers = true
    )]
    pub cluster_size: i64,

    /// The etcd data directory. Defaults to `<name>.etcd`.
    #[arg(long = "data-dir", env = "ELASTIC_ETCD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// The output format.
    #[arg(short = 'o', long = "output", value_enum, default_value = "env")]
    pub output: OutputFormat,
}

/// How to render the resulting etcd configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `ETCD_*` environment variable lines.
    Env,
    /// A systemd drop-in unit.
    Dropin,
    /// An etcd flag string.
    Flags,
}

impl Cli {
    /// Validates the flag combination and normalizes the discovery URL.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or advertise list, or on a discovery URL
    /// that is empty or not http/https.
    pub fn validate(&mut self) -> Result<()> {
        if self.name.is_empty() {
            bail!("name must be set");
        }
        if self.initial_advertise_peer_urls.is_empty() {
            bail!("initial-advertise-peer-urls must consist of at least one url");
        }

        self.discovery = self.discovery.trim_end_matches('/').to_string();
        if self.discovery.is_empty() {
            bail!("discovery url must be set");
        }
        if !self.discovery.starts_with("http://") && !self.discovery.starts_with("https://") {
            bail!("discovery url {:?} must use http or https scheme", self.discovery);
        }

        Ok(())
    }

    /// The etcd data directory, defaulting to `<name>.etcd`.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.etcd", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from([&["etcdjoin"], args].concat())
    }

    #[test]
    fn test_cli_defaults() {
        let cli = parse(&["--discovery", "https://discovery.etcd.io/abc", "--name", "n0"]);

        assert_eq!(cli.join_strategy, Strategy::Replace);
        assert_eq!(cli.initial_advertise_peer_urls, "http://localhost:2380");
        assert_eq!(cli.client_port, 2379);
        assert_eq!(cli.cluster_size, -1);
        assert_eq!(cli.output, OutputFormat::Env);
        assert_eq!(cli.data_dir(), PathBuf::from("n0.etcd"));
    }

    #[test]
    fn test_cli_strategy_and_output_parsing() {
        let cli = parse(&[
            "--discovery",
            "http://example.com/registry/abc",
            "--name",
            "n1",
            "--join-strategy",
            "prune",
            "-o",
            "dropin",
        ]);

        assert_eq!(cli.join_strategy, Strategy::Prune);
        assert_eq!(cli.output, OutputFormat::Dropin);
    }

    #[test]
    fn test_cli_rejects_unknown_strategy() {
        let result = Cli::try_parse_from([
            "etcdjoin",
            "--discovery",
            "http://example.com",
            "--name",
            "n0",
            "--join-strategy",
            "dumb",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_trims_trailing_slash() {
        let mut cli = parse(&["--discovery", "https://discovery.etcd.io/abc/", "--name", "n0"]);

        cli.validate().unwrap();
        assert_eq!(cli.discovery, "https://discovery.etcd.io/abc");
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let mut cli = parse(&["--discovery", "ftp://example.com/abc", "--name", "n0"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut cli = parse(&["--discovery", "http://example.com/abc", "--name", ""]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let cli = parse(&[
            "--discovery",
            "http://example.com/abc",
            "--name",
            "n0",
            "--data-dir",
            "/var/lib/etcd",
        ]);

        assert_eq!(cli.data_dir(), PathBuf::from("/var/lib/etcd"));
    }
}
