use clap::{Parser, Subcommand};

/// Command-line front end for the deduplicating RAM block device.
/// Device geometry comes from SRD_* environment variables.
#[derive(Parser, Debug)]
#[command(name = "srd", version, about = "Deduplicating RAM block device")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Two identical pages, one merge, one write: print the counters after each step
    Demo {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Random write/read workload checked against an in-memory model
    Exercise {
        /// Device size in pages (overrides SRD_SIZE)
        #[arg(long)]
        pages: Option<u64>,
        #[arg(long, default_value_t = 10_000)]
        ops: u64,
        #[arg(long, default_value_t = 0x5eed)]
        seed: u64,
        /// Run a merge after every N operations (0 = never)
        #[arg(long, default_value_t = 500)]
        merge_every: u64,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
