use std::time::Instant;

use anyhow::{Context, Result};
use bucket_sort::{BucketSorter, DEFAULT_BUCKET_COUNT};
use clap::{Parser, Subcommand};
use rand::Rng;
use server_api::{sort_array, ApiContext};
use shared::{
    domain::{ArrayData, ArrayId},
    protocol::SortRequest,
};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/arrays.db")]
    database_url: String,
    #[arg(long, default_value_t = DEFAULT_BUCKET_COUNT)]
    buckets: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert random integer arrays with values in 1..=1000.
    Seed {
        #[arg(long, default_value_t = 100)]
        count: usize,
        #[arg(long, default_value_t = 10)]
        size: usize,
    },
    Sort {
        id: i64,
    },
    SortAll,
    Count,
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let ctx = ApiContext {
        sorter: BucketSorter::new(cli.buckets)?,
        ..ApiContext::new(storage)
    };

    match cli.command {
        Command::Seed { count, size } => {
            let mut rng = rand::thread_rng();
            let started = Instant::now();
            for _ in 0..count {
                let values: Vec<i64> = (0..size).map(|_| rng.gen_range(1..=1000)).collect();
                ctx.storage
                    .create_array(&ArrayData::Integers(values), false)
                    .await?;
            }
            println!(
                "seeded {count} arrays of {size} in {:.5}s",
                started.elapsed().as_secs_f64()
            );
        }
        Command::Sort { id } => {
            let response = sort_array(
                &ctx,
                SortRequest {
                    id: Some(ArrayId(id)),
                },
            )
            .await
            .with_context(|| format!("failed to sort array {id}"))?;
            println!(
                "sorted array {id} ({} elements) in {} ms",
                response.data.len(),
                response.execution_time
            );
        }
        Command::SortAll => {
            let ids = ctx.storage.list_array_ids().await?;
            let started = Instant::now();
            for id in &ids {
                sort_array(&ctx, SortRequest { id: Some(*id) })
                    .await
                    .with_context(|| format!("failed to sort array {}", id.0))?;
            }
            let total = started.elapsed().as_secs_f64();
            let avg = if ids.is_empty() {
                0.0
            } else {
                total / ids.len() as f64
            };
            println!(
                "sorted {} arrays in {total:.5}s (avg {avg:.5}s)",
                ids.len()
            );
        }
        Command::Count => {
            println!("{}", ctx.storage.count_arrays().await?);
        }
        Command::Clear => {
            let removed = ctx.storage.clear_arrays().await?;
            println!("removed {removed} arrays");
        }
    }

    Ok(())
}
