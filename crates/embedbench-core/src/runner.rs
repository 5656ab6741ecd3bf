use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use embedbench_common::config::BenchConfig;
use embedbench_common::{BenchError, Result};
use tokio::task::JoinSet;

use crate::client::{EmbedClient, Sample};
use crate::payload::EmbedRequest;
use crate::stats::Stats;

/// Samples in completion order, plus their summary.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub samples: Vec<Sample>,
    pub stats: Stats,
}

pub struct BenchRunner {
    client: EmbedClient,
    payload: Arc<EmbedRequest>,
    concurrency: usize,
}

impl BenchRunner {
    pub fn new(config: &BenchConfig) -> Result<Self> {
        config.validate()?;
        let client = EmbedClient::new(config.endpoint_url.clone(), config.timeout_ms.map(Duration::from_millis))?;
        Ok(Self {
            client,
            payload: Arc::new(EmbedRequest::new(config.payload_text.clone())),
            concurrency: config.concurrency,
        })
    }

    /// Fires `concurrency` requests at once and writes one line per finished request,
    /// then the stats block. The first failure aborts the run before any stats are written;
    /// requests still in flight are dropped with the join set.
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<RunReport> {
        tracing::info!(target: "runner", url = %self.client.url(), concurrency = self.concurrency, "starting benchmark");
        let mut tasks = JoinSet::new();
        for index in 0..self.concurrency {
            let client = self.client.clone();
            let payload = self.payload.clone();
            tasks.spawn(async move { client.embed(index, &payload).await });
        }

        let mut samples = Vec::with_capacity(self.concurrency);
        while let Some(joined) = tasks.join_next().await {
            let sample = match joined.map_err(|e| BenchError::TaskJoin(e.to_string()))? {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::warn!(target: "runner", error = %e, "request failed, aborting run");
                    return Err(e);
                }
            };
            tracing::debug!(target: "runner", index = sample.index, elapsed_ms = sample.elapsed_ms, "request done");
            writeln!(
                out,
                "Request {} finished in {:.2} ms, got embedding dim={}",
                sample.index, sample.elapsed_ms, sample.dim
            )?;
            samples.push(sample);
        }

        let elapsed: Vec<f64> = samples.iter().map(|s| s.elapsed_ms).collect();
        let stats = Stats::from_elapsed(&elapsed)
            .ok_or_else(|| BenchError::Config("concurrency must be at least 1".into()))?;
        write!(out, "{}", stats)?;
        out.flush()?;
        tracing::info!(target: "runner", count = stats.count, avg_ms = stats.avg_ms, "benchmark finished");
        Ok(RunReport { samples, stats })
    }
}
