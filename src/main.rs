#![allow(dead_code, unused_imports)]
#![recursion_limit = "256"]

mod application;
mod cli;
mod data;
mod domain;
mod explain;
mod infra;
mod ml;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pneumo_scan=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
