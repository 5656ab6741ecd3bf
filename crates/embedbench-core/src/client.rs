use std::time::{Duration, Instant};

use embedbench_common::{BenchError, Result};
use serde::de::IgnoredAny;

use crate::payload::EmbedRequest;

// Only the length of `embedding` is ever read.
#[derive(serde::Deserialize)]
struct EmbedResponse {
    embedding: Option<Vec<IgnoredAny>>,
}

/// Outcome of one successful request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub index: usize,
    pub elapsed_ms: f64,
    pub dim: usize,
}

/// Thin wrapper over a pooled `reqwest::Client`; clones share the same connections.
#[derive(Clone)]
pub struct EmbedClient {
    http: reqwest::Client,
    url: String,
}

impl EmbedClient {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| BenchError::Config(format!("building http client: {}", e)))?;
        Ok(Self { http, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one request and times it from just before the send until the body is parsed.
    pub async fn embed(&self, index: usize, payload: &EmbedRequest) -> Result<Sample> {
        let start = Instant::now();
        let resp = self
            .http
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|source| BenchError::Transport { index, source })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BenchError::Status { index, status: status.as_u16() });
        }
        let body = resp
            .bytes()
            .await
            .map_err(|source| BenchError::Transport { index, source })?;
        let dim = embedding_dim(index, &body)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(Sample { index, elapsed_ms, dim })
    }
}

/// Length of the `embedding` array in a response body.
pub fn embedding_dim(index: usize, body: &[u8]) -> Result<usize> {
    let parsed: EmbedResponse =
        serde_json::from_slice(body).map_err(|source| BenchError::Decode { index, source })?;
    parsed
        .embedding
        .map(|e| e.len())
        .ok_or(BenchError::MissingEmbedding { index })
}
