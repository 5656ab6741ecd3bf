//! Batch collector standing in for the model: concurrent requests queue up and are answered together.

use std::time::Duration;

use prometheus::IntCounter;
use tokio::sync::{mpsc, oneshot};

use crate::embed_text;

pub struct EmbedJob {
    pub text: String,
    pub respond: oneshot::Sender<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub max_batch_size: usize,
    /// How long to wait for each further job once a batch has started.
    pub max_wait: Duration,
    /// Charged once per batch, not per job.
    pub latency: Duration,
    pub dim: usize,
}

/// Spawns the collector on the current runtime. It exits once every sender is dropped.
pub fn start(settings: BatchSettings, batches_total: IntCounter) -> mpsc::Sender<EmbedJob> {
    let (tx, rx) = mpsc::channel::<EmbedJob>(1024);
    tokio::spawn(run(rx, settings, batches_total));
    tx
}

async fn run(mut rx: mpsc::Receiver<EmbedJob>, settings: BatchSettings, batches_total: IntCounter) {
    let max_batch_size = settings.max_batch_size.max(1);
    loop {
        let Some(first) = rx.recv().await else { return };
        let mut batch = Vec::with_capacity(max_batch_size);
        batch.push(first);
        while batch.len() < max_batch_size {
            match tokio::time::timeout(settings.max_wait, rx.recv()).await {
                Ok(Some(job)) => batch.push(job),
                _ => break,
            }
        }

        batches_total.inc();
        tracing::debug!(target: "mock", size = batch.len(), "processing batch");
        if !settings.latency.is_zero() {
            tokio::time::sleep(settings.latency).await;
        }
        for job in batch {
            let _ = job.respond.send(embed_text(&job.text, settings.dim));
        }
    }
}
