use std::process::exit;

use anyhow::{Context, Result};
use bank::{Clock, coupons::is_valid_month};
use clap::{Parser, Subcommand};
use server::{
    config::{Config, StoreBackend},
    database::init_store,
};
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill an empty store with the seed coupons
    Seed {
        /// Seed as if this were the current month
        #[arg(long, value_parser = parse_month)]
        force_month: Option<u8>,
    },
    /// Print every stored coupon
    Status,
}

fn parse_month(raw: &str) -> Result<u8, String> {
    raw.parse::<u8>()
        .ok()
        .filter(|month| is_valid_month(*month))
        .ok_or_else(|| format!("'{raw}' is not a month between 1 and 12"))
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load().context("loading configuration")?;

    if config.store == StoreBackend::Memory {
        warn!("STORE_BACKEND is memory, it starts seeded and nothing outlives this process");
    }

    let current_month = config.clock()?.current_month();
    let store = init_store(&config, current_month)
        .await
        .context("connecting to the store")?;

    match args.command {
        Command::Seed { force_month } => {
            let count = process::seed(store.as_ref(), force_month.unwrap_or(current_month)).await?;
            println!("Seeded {count} coupons");
        }
        Command::Status => {
            let lines = process::status(store.as_ref(), current_month).await?;

            if lines.is_empty() {
                println!("Store is empty, run `process seed` first");
            }

            for line in lines {
                println!("{line}");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    if let Err(e) = run(Args::parse()).await {
        error!("{e:#}");
        exit(1);
    }
}
