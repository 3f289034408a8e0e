//! Configuration module
//!
//! Environment-driven configuration for the report generation pipeline:
//! upstream API settings, deadline and token policy, storage backend
//! selection, template location, and completeness policy thresholds.

use std::env;
use std::time::Duration;

// Common constants
const PIPELINE_DEADLINE_SECS: u64 = 120;
const UPSTREAM_REQUEST_TIMEOUT_SECS: u64 = 10;
const UPSTREAM_PAGE_SIZE: usize = 200;
const TOKEN_SAFETY_MARGIN_SECS: u64 = 30;
const DOWNLOAD_URL_TTL_SECS: u64 = 86_400;
const MIN_CONTROL_ENTRIES: usize = 1;
const EXPECTED_CONTROL_ENTRIES: usize = 21;
const MAX_PLAUSIBLE_DEFICIENCIES: usize = 10;

/// Artifact storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

/// Application configuration for the generation pipeline.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    // Upstream compliance platform
    pub upstream_base_url: String,
    pub upstream_request_timeout_secs: u64,
    pub upstream_page_size: usize,
    // Pipeline policy
    pub pipeline_deadline_secs: u64,
    pub token_safety_margin_secs: u64,
    // Templates
    pub template_dir: String,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub download_url_ttl_secs: u64,
    // Completeness policy thresholds
    pub min_control_entries: usize,
    pub expected_control_entries: usize,
    pub max_plausible_deficiencies: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend =
            env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "s3" => Some(StorageBackend::S3),
                    "local" => Some(StorageBackend::Local),
                    _ => None,
                });

        let config = Config {
            environment,
            upstream_base_url: env::var("UPSTREAM_BASE_URL")
                .map_err(|_| anyhow::anyhow!("UPSTREAM_BASE_URL must be set"))?,
            upstream_request_timeout_secs: env::var("UPSTREAM_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| UPSTREAM_REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(UPSTREAM_REQUEST_TIMEOUT_SECS),
            upstream_page_size: env::var("UPSTREAM_PAGE_SIZE")
                .unwrap_or_else(|_| UPSTREAM_PAGE_SIZE.to_string())
                .parse()
                .unwrap_or(UPSTREAM_PAGE_SIZE),
            pipeline_deadline_secs: env::var("PIPELINE_DEADLINE_SECS")
                .unwrap_or_else(|_| PIPELINE_DEADLINE_SECS.to_string())
                .parse()
                .unwrap_or(PIPELINE_DEADLINE_SECS),
            token_safety_margin_secs: env::var("TOKEN_SAFETY_MARGIN_SECS")
                .unwrap_or_else(|_| TOKEN_SAFETY_MARGIN_SECS.to_string())
                .parse()
                .unwrap_or(TOKEN_SAFETY_MARGIN_SECS),
            template_dir: env::var("TEMPLATE_DIR").unwrap_or_else(|_| "templates".to_string()),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok().or_else(|| env::var("AWS_REGION").ok()),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            download_url_ttl_secs: env::var("DOWNLOAD_URL_TTL_SECS")
                .unwrap_or_else(|_| DOWNLOAD_URL_TTL_SECS.to_string())
                .parse()
                .unwrap_or(DOWNLOAD_URL_TTL_SECS),
            min_control_entries: env::var("MIN_CONTROL_ENTRIES")
                .unwrap_or_else(|_| MIN_CONTROL_ENTRIES.to_string())
                .parse()
                .unwrap_or(MIN_CONTROL_ENTRIES),
            expected_control_entries: env::var("EXPECTED_CONTROL_ENTRIES")
                .unwrap_or_else(|_| EXPECTED_CONTROL_ENTRIES.to_string())
                .parse()
                .unwrap_or(EXPECTED_CONTROL_ENTRIES),
            max_plausible_deficiencies: env::var("MAX_PLAUSIBLE_DEFICIENCIES")
                .unwrap_or_else(|_| MAX_PLAUSIBLE_DEFICIENCIES.to_string())
                .parse()
                .unwrap_or(MAX_PLAUSIBLE_DEFICIENCIES),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.upstream_base_url.starts_with("http://")
            && !self.upstream_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "UPSTREAM_BASE_URL must be an http(s) URL"
            ));
        }

        if self.pipeline_deadline_secs == 0 {
            return Err(anyhow::anyhow!("PIPELINE_DEADLINE_SECS must be greater than zero"));
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline_deadline_secs)
    }

    pub fn upstream_request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_request_timeout_secs)
    }

    pub fn token_safety_margin(&self) -> Duration {
        Duration::from_secs(self.token_safety_margin_secs)
    }

    pub fn download_url_ttl(&self) -> Duration {
        Duration::from_secs(self.download_url_ttl_secs)
    }
}
