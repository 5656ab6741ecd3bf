use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use embedbench_common::config::{read_payload_file, BenchConfig};
use embedbench_core::BenchRunner;
use embedbench_mock::{MockConfig, DEFAULT_DIM, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_WAIT};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "embedbench", version, about = "Concurrent latency benchmark for an embedding endpoint")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fire one batch of concurrent requests and print latency stats (default)
    Bench(BenchArgs),
    /// Serve a mock embedding endpoint
    Mock(MockArgs),
    Version,
}

#[derive(Args, Debug, Default)]
struct BenchArgs {
    /// Endpoint to POST to
    #[arg(long)]
    url: Option<String>,
    /// Number of simultaneous requests
    #[arg(short = 'n', long)]
    concurrency: Option<usize>,
    /// Read the request text from this file
    #[arg(long)]
    text_file: Option<PathBuf>,
    /// Per-request timeout in milliseconds (default: none)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl BenchArgs {
    fn apply(self, cfg: &mut BenchConfig) -> anyhow::Result<()> {
        if let Some(url) = self.url { cfg.endpoint_url = url; }
        if let Some(n) = self.concurrency { cfg.concurrency = n; }
        if let Some(path) = self.text_file { cfg.payload_text = read_payload_file(&path)?; }
        if let Some(ms) = self.timeout_ms { cfg.timeout_ms = Some(ms); }
        Ok(())
    }
}

#[derive(Args, Debug)]
struct MockArgs {
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
    /// Embedding dimension to answer with
    #[arg(long, default_value_t = DEFAULT_DIM)]
    dim: usize,
    /// Fixed processing delay, paid once per batch
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
    /// Most requests answered together
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
    max_batch_size: usize,
    /// How long a started batch waits for each further request
    #[arg(long, default_value_t = DEFAULT_MAX_WAIT.as_millis() as u64)]
    max_wait_ms: u64,
}

// Single-threaded on purpose: requests interleave on one event loop.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Bench(BenchArgs::default())) {
        Commands::Bench(args) => bench(args).await,
        Commands::Mock(args) => mock(args).await,
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn bench(args: BenchArgs) -> anyhow::Result<()> {
    let mut cfg = BenchConfig::load().context("loading config")?;
    args.apply(&mut cfg)?;
    let runner = BenchRunner::new(&cfg)?;
    let mut stdout = std::io::stdout();
    runner.run(&mut stdout).await.context("benchmark run failed")?;
    Ok(())
}

async fn mock(args: MockArgs) -> anyhow::Result<()> {
    let config = MockConfig {
        dim: args.dim,
        latency: Duration::from_millis(args.latency_ms),
        max_batch_size: args.max_batch_size,
        max_wait: Duration::from_millis(args.max_wait_ms),
        ..MockConfig::default()
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("binding port {}", args.port))?;
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(target: "mock", "shutdown signal received");
    };
    embedbench_mock::serve(listener, config, shutdown).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );

    // stdout carries the report; logs go to stderr.
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
