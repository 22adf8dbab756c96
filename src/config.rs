//! Configuration management for the OCR review server

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::ocr::OcrProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ocr: OcrConfig,
    pub worker: WorkerConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory; images and results live in subdirectories
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// Engines in fallback order
    pub providers: Vec<OcrProvider>,
    pub language: String,
    pub tesseract_cmd: String,
    pub remote_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Jobs processed in parallel
    pub concurrency: usize,
    /// Finished jobs older than this are purged
    pub job_retention_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub undo_capacity: usize,
}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("./data"),
            },
            ocr: OcrConfig {
                providers: vec![OcrProvider::Tesseract],
                language: "deu".to_string(),
                tesseract_cmd: "tesseract".to_string(),
                remote_url: None,
                timeout_secs: 120,
            },
            worker: WorkerConfig {
                concurrency: 1,
                job_retention_hours: 24,
            },
            client: ClientConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                poll_interval_ms: 1000,
                request_timeout_secs: 30,
                undo_capacity: 100,
            },
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let providers = match env::var("OCR_PROVIDERS") {
            Ok(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|name| {
                    OcrProvider::parse(name).ok_or_else(|| ConfigError::InvalidValue {
                        name: "OCR_PROVIDERS",
                        value: name.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => defaults.ocr.providers,
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            storage: StorageConfig {
                data_dir: env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.data_dir),
            },
            ocr: OcrConfig {
                providers,
                language: env::var("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
                tesseract_cmd: env::var("TESSERACT_CMD").unwrap_or(defaults.ocr.tesseract_cmd),
                remote_url: env::var("OCR_REMOTE_URL").ok(),
                timeout_secs: parse_var("OCR_TIMEOUT_SECS", defaults.ocr.timeout_secs)?,
            },
            worker: WorkerConfig {
                concurrency: parse_var("WORKER_CONCURRENCY", defaults.worker.concurrency)?.max(1),
                job_retention_hours: parse_var(
                    "JOB_RETENTION_HOURS",
                    defaults.worker.job_retention_hours,
                )?,
            },
            client: ClientConfig {
                base_url: env::var("CLIENT_BASE_URL").unwrap_or(defaults.client.base_url),
                poll_interval_ms: parse_var(
                    "CLIENT_POLL_INTERVAL_MS",
                    defaults.client.poll_interval_ms,
                )?,
                request_timeout_secs: parse_var(
                    "CLIENT_REQUEST_TIMEOUT_SECS",
                    defaults.client.request_timeout_secs,
                )?,
                undo_capacity: parse_var("CLIENT_UNDO_CAPACITY", defaults.client.undo_capacity)?,
            },
        })
    }
}

/// Read a variable, falling back to `default` when unset
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.worker.concurrency, 1);
        assert_eq!(config.storage.images_dir(), PathBuf::from("./data/images"));
        assert_eq!(config.client.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u16 = parse_var("OCR_REVIEW_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
