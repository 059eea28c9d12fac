//! Object sources for extraction.
//!
//! [`ObjectSource`] is the fetch seam: the extractor asks for bytes by key and
//! never branches on whether the bytes came from a bucket or from fixtures.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use stowage_core::{logging, Error, ExtractConfig, ExtractMode, Result, S3Config};

use crate::payload::PayloadFormat;

/// Rows served by [`SimulatedSource`] for every supported key.
const FIXTURE_ROWS: [(i64, &str); 2] = [(1, "Mock Item"), (2, "Another Item")];

/// Something that returns the raw bytes stored under a key.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Where `key` is read from, for logging.
    fn locate(&self, key: &str) -> String;

    /// Fetch the object body.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;
}

/// Fixture-backed source for running the pipeline without network access.
///
/// `.json` keys yield a two-element array of `{id, name}` objects and `.csv`
/// keys the same rows with a header line. Other keys yield an empty body.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSource;

impl SimulatedSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ObjectSource for SimulatedSource {
    fn locate(&self, key: &str) -> String {
        format!("simulated://{}", key)
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let body = match PayloadFormat::from_key(key) {
            Some(PayloadFormat::Json) => {
                let rows: Vec<serde_json::Value> = FIXTURE_ROWS
                    .iter()
                    .map(|(id, name)| serde_json::json!({ "id": id, "name": name }))
                    .collect();
                serde_json::to_vec(&rows)?
            }
            Some(PayloadFormat::Csv) => {
                let mut body = String::from("id,name\n");
                for (id, name) in FIXTURE_ROWS {
                    body.push_str(&format!("{},{}\n", id, name));
                }
                body.into_bytes()
            }
            None => Vec::new(),
        };

        info!(
            subsystem = logging::SUBSYSTEM_INGEST,
            component = "simulated",
            op = "fetch",
            object_key = key,
            bytes = body.len(),
            "Serving fixture payload"
        );
        Ok(body)
    }
}

/// Anonymous HTTPS reads from a public S3 bucket.
#[derive(Debug, Clone)]
pub struct PublicS3Source {
    client: Client,
    endpoint: String,
}

impl PublicS3Source {
    /// Source for `https://<bucket>.s3.<region>.amazonaws.com`.
    pub fn new(bucket: &str, region: &str, timeout: Duration) -> Result<Self> {
        Self::with_endpoint(
            format!("https://{}.s3.{}.amazonaws.com", bucket, region),
            timeout,
        )
    }

    /// Source rooted at an arbitrary endpoint (S3-compatible stores, tests).
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Request(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        info!(
            subsystem = logging::SUBSYSTEM_INGEST,
            component = "s3",
            endpoint = %endpoint,
            timeout_secs = timeout.as_secs(),
            "Initializing public S3 source"
        );
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Public URL of `key`.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectSource for PublicS3Source {
    fn locate(&self, key: &str) -> String {
        self.object_url(key)
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        let start = Instant::now();
        let url = self.object_url(key);
        debug!(
            subsystem = logging::SUBSYSTEM_INGEST,
            component = "s3",
            op = "fetch",
            object_key = key,
            url = %url,
            "Fetching object"
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Request(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Request(format!("GET {} returned {}", url, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Request(format!("Failed to read body of {}: {}", url, e)))?;

        debug!(
            subsystem = logging::SUBSYSTEM_INGEST,
            component = "s3",
            op = "fetch",
            object_key = key,
            bytes = body.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Object fetched"
        );
        Ok(body.to_vec())
    }
}

/// Build the source selected by `extract.mode`.
pub fn source_for(s3: &S3Config, extract: &ExtractConfig) -> Result<Box<dyn ObjectSource>> {
    match extract.mode {
        ExtractMode::Simulated => Ok(Box::new(SimulatedSource::new())),
        ExtractMode::Live => Ok(Box::new(PublicS3Source::new(
            &s3.bucket_name,
            &s3.region,
            Duration::from_secs(extract.timeout_secs),
        )?)),
    }
}
