use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod checkpoint;
mod chunk;
mod cli;
mod config;
mod controller;
mod report;
mod runner;
mod scheduler;
mod stage;
mod status;
mod steps;
mod unit;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = RootArgs::parse();
    match args.command {
        Command::Run(args) => controller::run_pipeline_cmd(&args),
        Command::Resample(args) => controller::worker_resample(&args),
        Command::Reconstruct(args) => controller::worker_reconstruct(&args),
        Command::Aggregate(args) => controller::worker_aggregate(&args),
        Command::Select(args) => controller::worker_select(&args),
        Command::Status(args) => status::run_status(&args),
    }
}
