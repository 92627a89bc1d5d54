//! Rendering the join decision for consumption by etcd.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use etcdjoin_cluster::EtcdConfig;

/// The join result together with the local data directory, ready to be
/// rendered.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// The configuration the join decision produced.
    pub config: EtcdConfig,

    /// The etcd data directory.
    pub data_dir: PathBuf,
}

impl LaunchConfig {
    fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ETCD_INITIAL_CLUSTER", self.config.initial_cluster.join(",")),
            ("ETCD_INITIAL_CLUSTER_STATE", self.config.initial_cluster_state.clone()),
            (
                "ETCD_INITIAL_ADVERTISE_PEER_URLS",
                self.config.advertise_peer_urls.clone(),
            ),
            ("ETCD_DISCOVERY", self.config.discovery.clone()),
            ("ETCD_NAME", self.config.name.clone()),
            ("ETCD_DATA_DIR", self.data_dir.display().to_string()),
        ]
    }

    /// Turns the configuration into etcd flags. Empty fields are omitted;
    /// `-name` and `-data-dir` are always emitted.
    #[must_use]
    pub fn flags(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.config.initial_cluster_state.is_empty() {
            args.push(format!(
                "-initial-cluster-state={}",
                self.config.initial_cluster_state
            ));
        }
        if !self.config.initial_cluster.is_empty() {
            args.push(format!("-initial-cluster={}", self.config.initial_cluster.join(",")));
        }
        if !self.config.discovery.is_empty() {
            args.push(format!("-discovery={}", self.config.discovery));
        }
        if !self.config.advertise_peer_urls.is_empty() {
            args.push(format!(
                "-initial-advertise-peer-urls={}",
                self.config.advertise_peer_urls
            ));
        }
        args.push(format!("-name={}", self.config.name));
        args.push(format!("-data-dir={}", self.data_dir.display()));
        args
    }

    /// Renders a space-separated etcd flag string.
    #[must_use]
    pub fn render_flags(&self) -> String {
        self.flags().join(" ")
    }

    /// Renders `KEY="value"` environment lines.
    #[must_use]
    pub fn render_env(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.env_vars() {
            let _ = writeln!(out, "{key}=\"{value}\"");
        }
        out
    }

    /// Renders a systemd drop-in unit carrying the configuration as
    /// `Environment=` lines.
    #[must_use]
    pub fn render_dropin(&self) -> String {
        let mut out = String::new();
        out.push_str("[Unit]\n");
        out.push_str("After=network-online.target\n");
        out.push_str("Requires=network-online.target\n");
        out.push_str("\n[Service]\n");
        for (key, value) in self.env_vars() {
            let _ = writeln!(out, "Environment=\"{key}={value}\"");
        }
        out
    }
}

/// A node is fresh when its data directory does not exist or is empty.
#[must_use]
pub fn is_fresh(data_dir: &Path) -> bool {
    match std::fs::read_dir(data_dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch(config: EtcdConfig) -> LaunchConfig {
        LaunchConfig { config, data_dir: PathBuf::from("n0.etcd") }
    }

    fn new_cluster_config() -> EtcdConfig {
        EtcdConfig {
            initial_cluster: Vec::new(),
            initial_cluster_state: "new".to_string(),
            advertise_peer_urls: "http://h0:2380".to_string(),
            discovery: "https://discovery.etcd.io/abc".to_string(),
            name: "n0".to_string(),
        }
    }

    fn existing_cluster_config() -> EtcdConfig {
        EtcdConfig {
            initial_cluster: vec!["n0=http://h0:2380".to_string(), "n1=http://h1:2380".to_string()],
            initial_cluster_state: "existing".to_string(),
            advertise_peer_urls: "http://h0:2380".to_string(),
            discovery: String::new(),
            name: "n0".to_string(),
        }
    }

    #[test]
    fn test_flags_omit_empty_fields() {
        let rendered = launch(new_cluster_config()).render_flags();

        assert_eq!(
            rendered,
            "-initial-cluster-state=new -discovery=https://discovery.etcd.io/abc \
             -initial-advertise-peer-urls=http://h0:2380 -name=n0 -data-dir=n0.etcd"
        );
    }

    #[test]
    fn test_flags_include_initial_cluster() {
        let rendered = launch(existing_cluster_config()).render_flags();

        assert!(rendered
            .contains("-initial-cluster=n0=http://h0:2380,n1=http://h1:2380"));
        assert!(!rendered.contains("-discovery="));
    }

    #[test]
    fn test_env_rendering() {
        let rendered = launch(existing_cluster_config()).render_env();

        assert!(rendered.contains("ETCD_INITIAL_CLUSTER=\"n0=http://h0:2380,n1=http://h1:2380\"\n"));
        assert!(rendered.contains("ETCD_INITIAL_CLUSTER_STATE=\"existing\"\n"));
        assert!(rendered.contains("ETCD_NAME=\"n0\"\n"));
        assert!(rendered.contains("ETCD_DATA_DIR=\"n0.etcd\"\n"));
    }

    #[test]
    fn test_dropin_rendering() {
        let rendered = launch(new_cluster_config()).render_dropin();

        assert!(rendered.starts_with("[Unit]\n"));
        assert!(rendered.contains("After=network-online.target\n"));
        assert!(rendered.contains("Requires=network-online.target\n"));
        assert!(rendered.contains("\n[Service]\n"));
        assert!(rendered.contains("Environment=\"ETCD_DISCOVERY=https://discovery.etcd.io/abc\"\n"));
        assert!(rendered.contains("Environment=\"ETCD_NAME=n0\"\n"));
    }

    #[test]
    fn test_is_fresh_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_fresh(&dir.path().join("does-not-exist")));
    }

    #[test]
    fn test_is_fresh_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_fresh(dir.path()));
    }

    #[test]
    fn test_is_fresh_populated_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("member"), b"wal").unwrap();
        assert!(!is_fresh(dir.path()));
    }
}
