//! `array-bin`: wires a coordinator task and a pool of worker tasks together
//! over `core-transport` and drives a scripted client session against them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use core_client::DistributedMemory;
use core_coordinator::Coordinator;
use core_protocol::{SliceDescriptor, WriteValue};
use core_transport::{InProcessGroup, ProcessGroup};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// `array-bin --max-size <N> --verbose <0-3> [--workers <N>]`
#[derive(Parser, Debug)]
#[command(name = "array-bin", version, about = "Distributed array store")]
struct Args {
    /// Per-worker element capacity.
    #[arg(long = "max-size")]
    max_size: u64,

    /// Logging verbosity, 0 (quiet) through 3 (trace); maps onto `tracing`'s
    /// `EnvFilter` and is threaded uniformly to the coordinator and every
    /// worker.
    #[arg(long = "verbose", default_value_t = 1)]
    verbose: u8,

    /// Number of worker ranks in the process group (ranks `2..2+N`).
    #[arg(long = "workers", default_value_t = 3)]
    workers: usize,

    /// Optional log file; defaults to stderr when omitted.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

fn verbosity_filter(level: u8) -> &'static str {
    match level {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn configure_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(verbosity_filter(args.verbose)));

    match &args.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().context("log-file must name a file")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).try_init().ok();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args)?;

    info!(target: "runtime", max_size = args.max_size, workers = args.workers, "startup");

    let (client_link, coordinator_links, worker_endpoints) = InProcessGroup::build(args.workers);

    let coordinator = Coordinator::new(args.max_size, coordinator_links);
    let coordinator_handle = tokio::spawn(coordinator.run());
    let worker_handles: Vec<_> = worker_endpoints
        .into_iter()
        .map(|endpoint| tokio::spawn(core_worker::run(endpoint)))
        .collect();

    let mut memory = DistributedMemory::new(client_link);
    run_demo_session(&mut memory).await?;
    memory.close().await;

    coordinator_handle.await.context("coordinator task panicked")?;
    for handle in worker_handles {
        handle.await.context("worker task panicked")?;
    }

    info!(target: "runtime", "shutdown");
    Ok(())
}

/// A small scripted session exercising allocate/write/read. Kept deliberately
/// minimal rather than growing into a CLI query language: this binary's job
/// is to wire the roles together, not to define a workload format.
async fn run_demo_session(memory: &mut DistributedMemory) -> Result<()> {
    let key = memory.allocate(10).await.context("allocate failed")?;
    info!(target: "runtime.demo", key, "allocated");

    memory
        .write_slice(
            SliceDescriptor::new(key, 0, 10, 1),
            WriteValue::Sequence((0..10).collect()),
        )
        .await
        .context("write failed")?;

    let values = memory
        .read_slice(SliceDescriptor::new(key, 0, 10, 1))
        .await
        .context("read failed")?;
    info!(target: "runtime.demo", ?values, "read back");

    Ok(())
}
