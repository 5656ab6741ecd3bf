use serde::Serialize;

/// Body of `POST /v1/embed`. Built once per run and shared by every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedRequest {
    pub text: String,
}

impl EmbedRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
