// Copyright 2026 etcdjoin authors
// SPDX-License-Identifier: Apache-2.0

//! etcdjoin: auto-join a discovery-coordinated etcd cluster.
//!
//! Decides whether this node seeds a new cluster, restarts into an
//! existing one, or adds itself as a fresh member, and prints the
//! resulting etcd configuration to stdout. All diagnostics go to stderr.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use etcdjoin_cluster::{join, JoinRequest};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod output;

use cli::{Cli, OutputFormat};
use output::LaunchConfig;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let mut cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit();
        }
        Err(err) => {
            let _ = err.print();
            std::process::exit(1);
        }
    };
    cli.validate()?;

    let data_dir = cli.data_dir();
    let fresh = output::is_fresh(&data_dir);
    debug!(data_dir = %data_dir.display(), fresh, "Derived data directory");

    let req = JoinRequest {
        discovery_url: cli.discovery.clone(),
        name: cli.name.clone(),
        initial_advertise_peer_urls: cli.initial_advertise_peer_urls.clone(),
        fresh,
        client_port: cli.client_port,
        cluster_size: cli.cluster_size,
        strategy: cli.join_strategy,
    };

    let config = join(&req).await.context("cluster join failed")?;
    let launch = LaunchConfig { config, data_dir };

    match cli.output {
        OutputFormat::Flags => println!("{}", launch.render_flags()),
        OutputFormat::Env => print!("{}", launch.render_env()),
        OutputFormat::Dropin => print!("{}", launch.render_dropin()),
    }

    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout carries only the rendered configuration; logs go to stderr.
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
