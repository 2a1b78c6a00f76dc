use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_config;
mod cmd_demo;
mod cmd_exercise;

fn init_logger() {
    // RUST_LOG wins; otherwise info. Example: RUST_LOG=debug SRD_DEBUG=1 srd demo
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Demo { json } => cmd_demo::exec(json),

        cli::Cmd::Exercise {
            pages,
            ops,
            seed,
            merge_every,
            json,
        } => cmd_exercise::exec(pages, ops, seed, merge_every, json),

        cli::Cmd::Config { json } => cmd_config::exec(json),
    }
}
