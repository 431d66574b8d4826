//! `ringbench` command line.
//!
//! Runs the ring sweep either as one process hosting every rank (`local`) or
//! as a seed plus one process per worker (`seed`, `worker`). The report goes
//! to stdout on the report rank; logs go to stderr.

use clap::{Args, Parser, Subcommand};
use ringbench::topology::resolve_hostname;
use ringbench::{AggregationStrategy, BenchConfig, Rank, Result, RingClient, RingError, SeedNode};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(about = "Ring-scheduled point-to-point transfer benchmark")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    bench: BenchArgs,
}

#[derive(Subcommand)]
enum Mode {
    /// Run every rank in this process over loopback.
    Local {
        #[arg(long, short = 'n', default_value_t = 4)]
        world_size: u32,
    },
    /// Accept `world-size` workers and hand out ranks.
    Seed {
        #[arg(long, default_value = "0.0.0.0:7070")]
        bind: SocketAddr,
        #[arg(long, short = 'n')]
        world_size: u32,
    },
    /// Join a seed and run one rank.
    Worker {
        #[arg(long)]
        seed: SocketAddr,
        /// Address for the peer mesh endpoint.
        #[arg(long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
    },
}

/// Overrides for values otherwise taken from `RINGBENCH_*` variables.
#[derive(Args)]
struct BenchArgs {
    #[arg(long, global = true)]
    bufcnt: Option<usize>,
    #[arg(long, global = true)]
    itemsize: Option<usize>,
    #[arg(long, global = true)]
    nrep: Option<usize>,
    #[arg(long, global = true)]
    aggregation: Option<AggregationStrategy>,
    #[arg(long, global = true)]
    root: Option<Rank>,
    #[arg(long, global = true)]
    hostname: Option<String>,
}

impl BenchArgs {
    fn apply(self, cfg: &mut BenchConfig) {
        if let Some(v) = self.bufcnt {
            cfg.bufcnt = v;
        }
        if let Some(v) = self.itemsize {
            cfg.itemsize = v;
        }
        if let Some(v) = self.nrep {
            cfg.nrep = v;
        }
        if let Some(v) = self.aggregation {
            cfg.aggregation = v;
        }
        if let Some(v) = self.root {
            cfg.root = v;
        }
        if let Some(v) = self.hostname {
            cfg.hostname = Some(v);
        }
    }
}

fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = BenchConfig::from_env();
    cli.bench.apply(&mut config);

    match run(cli.mode, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(mode: Mode, config: BenchConfig) -> Result<()> {
    match mode {
        Mode::Local { world_size } => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            rt.block_on(run_local(world_size, config))
        }
        Mode::Seed { bind, world_size } => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(async {
                let seed = SeedNode::bind(bind, world_size)?
                    .with_formation_timeout(config.formation_timeout);
                info!(addr = %seed.local_addr(), world_size, "seed listening");
                seed.form_cluster().await?;
                Ok(())
            })
        }
        Mode::Worker { seed, bind } => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(run_worker(seed, bind, config))
        }
    }
}

async fn run_worker(seed: SocketAddr, bind: SocketAddr, config: BenchConfig) -> Result<()> {
    let client = RingClient::join_with_timeout(seed, bind, config.formation_timeout).await?;
    let hostname = resolve_hostname(config.hostname.as_deref());
    info!(rank = client.rank(), world_size = client.world_size(), %hostname, "joined ring");

    let outcome = ringbench::run_benchmark(&client, &config, &hostname).await?;
    if let Some(report) = outcome.report {
        print!("{report}");
    }
    client.shutdown().await
}

async fn run_local(world_size: u32, config: BenchConfig) -> Result<()> {
    let clients: Vec<Arc<RingClient>> = RingClient::bootstrap_local(world_size)
        .await?
        .into_iter()
        .map(Arc::new)
        .collect();
    let hostname = resolve_hostname(config.hostname.as_deref());
    info!(world_size, %hostname, "local ring formed");

    let tasks: Vec<_> = clients
        .iter()
        .map(|c| {
            let client = Arc::clone(c);
            let config = config.clone();
            let hostname = hostname.clone();
            tokio::spawn(async move { ringbench::run_benchmark(&client, &config, &hostname).await })
        })
        .collect();

    // Fail fast: a rank that errors leaves its partners blocked.
    let outcomes = futures::future::try_join_all(tasks.into_iter().map(|task| async move {
        task.await
            .map_err(|e| RingError::transport_with_source("benchmark task failed", e))?
    }))
    .await?;
    for report in outcomes.into_iter().filter_map(|o| o.report) {
        print!("{report}");
    }

    futures::future::try_join_all(clients.iter().map(|c| c.shutdown())).await?;
    Ok(())
}
