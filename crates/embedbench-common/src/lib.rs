pub type Result<T> = core::result::Result<T, BenchError>;

/// Every way a benchmark run can fail. Any of these aborts the whole run.
#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("request {index}: transport error: {source}")]
    Transport {
        index: usize,
        #[source]
        source: reqwest::Error,
    },
    #[error("request {index}: server answered {status}")]
    Status { index: usize, status: u16 },
    #[error("request {index}: response body is not a valid embedding response: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("request {index}: response has no `embedding` field")]
    MissingEmbedding { index: usize },
    #[error("request task failed: {0}")]
    TaskJoin(String),
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Index of the request that failed, if the failure belongs to one.
    pub fn request_index(&self) -> Option<usize> {
        match self {
            BenchError::Transport { index, .. }
            | BenchError::Status { index, .. }
            | BenchError::Decode { index, .. }
            | BenchError::MissingEmbedding { index } => Some(*index),
            _ => None,
        }
    }
}

pub mod config {
    use super::{BenchError, Result};
    use serde::Deserialize;
    use std::env;
    use std::path::Path;

    pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:3000/v1/embed";
    pub const DEFAULT_CONCURRENCY: usize = 10;
    /// A week of diary entries, long enough to make the model do real work.
    pub const DEFAULT_PAYLOAD_TEXT: &str = include_str!("diary.txt");

    #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    pub struct BenchConfig {
        pub endpoint_url: String,
        pub concurrency: usize,
        pub payload_text: String,
        /// Per-request timeout. `None` keeps the HTTP client's default (wait forever).
        pub timeout_ms: Option<u64>,
    }

    impl Default for BenchConfig {
        fn default() -> Self {
            Self {
                endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
                concurrency: DEFAULT_CONCURRENCY,
                payload_text: DEFAULT_PAYLOAD_TEXT.to_string(),
                timeout_ms: None,
            }
        }
    }

    impl BenchConfig {
        /// Loads from the YAML file named by `EMBEDBENCH_CONFIG`, or from defaults
        /// plus `EMBEDBENCH_*` overrides when that variable is unset.
        pub fn load() -> Result<Self> {
            if let Ok(path) = env::var("EMBEDBENCH_CONFIG") {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| BenchError::Config(format!("reading {}: {}", path, e)))?;
                return Self::from_yaml_str(&text);
            }
            let mut cfg = Self::default();
            if let Ok(url) = env::var("EMBEDBENCH_URL") {
                cfg.endpoint_url = url;
            }
            if let Ok(v) = env::var("EMBEDBENCH_CONCURRENCY") {
                cfg.concurrency = v
                    .parse()
                    .map_err(|_| BenchError::Config(format!("EMBEDBENCH_CONCURRENCY: not a number: {}", v)))?;
            }
            if let Ok(v) = env::var("EMBEDBENCH_TIMEOUT_MS") {
                let ms = v
                    .parse()
                    .map_err(|_| BenchError::Config(format!("EMBEDBENCH_TIMEOUT_MS: not a number: {}", v)))?;
                cfg.timeout_ms = Some(ms);
            }
            if let Ok(path) = env::var("EMBEDBENCH_TEXT_FILE") {
                cfg.payload_text = read_payload_file(Path::new(&path))?;
            }
            Ok(cfg)
        }

        pub fn from_yaml_str(text: &str) -> Result<Self> {
            serde_yaml::from_str(text).map_err(|e| BenchError::Config(e.to_string()))
        }

        pub fn validate(&self) -> Result<()> {
            if self.concurrency == 0 {
                return Err(BenchError::Config("concurrency must be at least 1".into()));
            }
            if self.endpoint_url.trim().is_empty() {
                return Err(BenchError::Config("endpoint_url is empty".into()));
            }
            Ok(())
        }
    }

    pub fn read_payload_file(path: &Path) -> Result<String> {
        std::fs::read_to_string(path)
            .map_err(|e| BenchError::Config(format!("reading payload {}: {}", path.display(), e)))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serial_test::serial;

        #[test]
        fn defaults_match_fixed_benchmark() {
            let cfg = BenchConfig::default();
            assert_eq!(cfg.endpoint_url, "http://localhost:3000/v1/embed");
            assert_eq!(cfg.concurrency, 10);
            assert!(cfg.payload_text.starts_with("Monday: Woke up late"));
            assert!(cfg.payload_text.contains("\n\nSunday:"));
            assert_eq!(cfg.timeout_ms, None);
            cfg.validate().unwrap();
        }

        #[test]
        fn yaml_overrides_only_given_keys() {
            let cfg = BenchConfig::from_yaml_str("concurrency: 3\ntimeout_ms: 2500\n").unwrap();
            assert_eq!(cfg.concurrency, 3);
            assert_eq!(cfg.timeout_ms, Some(2500));
            assert_eq!(cfg.endpoint_url, DEFAULT_ENDPOINT_URL);
            assert_eq!(cfg.payload_text, DEFAULT_PAYLOAD_TEXT);
        }

        #[test]
        fn bad_yaml_is_a_config_error() {
            let err = BenchConfig::from_yaml_str("concurrency: lots").unwrap_err();
            assert!(matches!(err, BenchError::Config(_)));
        }

        const VARS: [&str; 5] = [
            "EMBEDBENCH_CONFIG",
            "EMBEDBENCH_URL",
            "EMBEDBENCH_CONCURRENCY",
            "EMBEDBENCH_TIMEOUT_MS",
            "EMBEDBENCH_TEXT_FILE",
        ];

        /// Clears the `EMBEDBENCH_*` variables and puts the old values back on drop.
        struct EnvGuard(Vec<(&'static str, Option<String>)>);

        impl EnvGuard {
            fn new() -> Self {
                let saved = VARS.iter().map(|k| (*k, env::var(k).ok())).collect();
                for k in VARS {
                    env::remove_var(k);
                }
                Self(saved)
            }
        }

        impl Drop for EnvGuard {
            fn drop(&mut self) {
                for (k, v) in &self.0 {
                    match v {
                        Some(v) => env::set_var(k, v),
                        None => env::remove_var(k),
                    }
                }
            }
        }

        #[test]
        #[serial]
        fn load_without_env_is_default() {
            let _guard = EnvGuard::new();
            assert_eq!(BenchConfig::load().unwrap(), BenchConfig::default());
        }

        #[test]
        #[serial]
        fn env_overrides_apply() {
            let _guard = EnvGuard::new();
            env::set_var("EMBEDBENCH_URL", "http://127.0.0.1:9000/v1/embed");
            env::set_var("EMBEDBENCH_CONCURRENCY", "25");
            env::set_var("EMBEDBENCH_TIMEOUT_MS", "1500");
            let cfg = BenchConfig::load().unwrap();
            assert_eq!(cfg.endpoint_url, "http://127.0.0.1:9000/v1/embed");
            assert_eq!(cfg.concurrency, 25);
            assert_eq!(cfg.timeout_ms, Some(1500));
            assert_eq!(cfg.payload_text, DEFAULT_PAYLOAD_TEXT);
        }

        #[test]
        #[serial]
        fn non_numeric_env_is_a_config_error() {
            let _guard = EnvGuard::new();
            env::set_var("EMBEDBENCH_CONCURRENCY", "ten");
            assert!(matches!(BenchConfig::load(), Err(BenchError::Config(_))));

            env::remove_var("EMBEDBENCH_CONCURRENCY");
            env::set_var("EMBEDBENCH_TIMEOUT_MS", "soon");
            assert!(matches!(BenchConfig::load(), Err(BenchError::Config(_))));
        }

        #[test]
        #[serial]
        fn text_file_env_replaces_payload() {
            let _guard = EnvGuard::new();
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("payload.txt");
            std::fs::write(&path, "one short paragraph").unwrap();
            env::set_var("EMBEDBENCH_TEXT_FILE", &path);
            assert_eq!(BenchConfig::load().unwrap().payload_text, "one short paragraph");

            env::set_var("EMBEDBENCH_TEXT_FILE", dir.path().join("absent.txt"));
            assert!(matches!(BenchConfig::load(), Err(BenchError::Config(_))));
        }

        #[test]
        #[serial]
        fn config_file_wins_over_env() {
            let _guard = EnvGuard::new();
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("bench.yaml");
            std::fs::write(&path, "endpoint_url: http://10.0.0.1:3000/v1/embed\nconcurrency: 2\n").unwrap();
            env::set_var("EMBEDBENCH_CONFIG", &path);
            env::set_var("EMBEDBENCH_CONCURRENCY", "99");
            let cfg = BenchConfig::load().unwrap();
            assert_eq!(cfg.endpoint_url, "http://10.0.0.1:3000/v1/embed");
            assert_eq!(cfg.concurrency, 2);
        }

        #[test]
        #[serial]
        fn unreadable_config_file_is_an_error() {
            let _guard = EnvGuard::new();
            env::set_var("EMBEDBENCH_CONFIG", "/nonexistent/embedbench.yaml");
            assert!(matches!(BenchConfig::load(), Err(BenchError::Config(_))));
        }

        #[test]
        fn zero_concurrency_is_rejected() {
            let cfg = BenchConfig { concurrency: 0, ..BenchConfig::default() };
            assert!(matches!(cfg.validate(), Err(BenchError::Config(_))));
        }
    }
}
