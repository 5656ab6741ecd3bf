//! Benchmark runner: fire a batch of concurrent embedding requests and summarize their latency

pub mod client;
pub mod payload;
pub mod runner;
pub mod stats;

pub use client::{EmbedClient, Sample};
pub use payload::EmbedRequest;
pub use runner::{BenchRunner, RunReport};
pub use stats::Stats;
