use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Private bucket holding payment-proof files. Access is mediated externally
/// via signed URLs; nothing here ever builds a public link.
pub const PROOF_BUCKET: &str = "payment-proofs";

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()>;
}

/// Supabase Storage client for one project.
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(base_url: String, service_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(OUTBOUND_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    pub fn from_env() -> Result<Self> {
        let url = env::var("SUPABASE_URL").context("SUPABASE_URL not set")?;
        let key =
            env::var("SUPABASE_SERVICE_ROLE_KEY").context("SUPABASE_SERVICE_ROLE_KEY not set")?;
        Self::new(url, key)
    }

    pub fn secondary_from_env() -> Option<Self> {
        let url = env::var("SECONDARY_SUPABASE_URL")
            .ok()
            .filter(|s| !s.is_empty())?;
        let key = env::var("SECONDARY_SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|s| !s.is_empty())?;
        Self::new(url, key).ok()
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, PROOF_BUCKET, name);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("Content-Type", content_type)
            // Names are unique per request; a collision is a bug, not a
            // replace.
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Upload of '{}' failed. Status: {} {}",
                name,
                status,
                body
            ));
        }
        Ok(())
    }
}

/// Primary-then-mirror uploads, same fatal/non-fatal split as `MirroredDb`.
#[derive(Clone)]
pub struct MirroredStore {
    primary: Arc<dyn ObjectStore>,
    secondary: Option<Arc<dyn ObjectStore>>,
}

impl MirroredStore {
    pub fn new(primary: Arc<dyn ObjectStore>, secondary: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { primary, secondary }
    }

    pub async fn store(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        self.primary.upload(name, bytes, content_type).await?;
        if let Some(secondary) = &self.secondary {
            if let Err(e) = secondary.upload(name, bytes, content_type).await {
                warn!("Secondary storage upload failed (ignored): {:#}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingStore {
        names: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn upload(&self, name: &str, _bytes: &[u8], _content_type: &str) -> Result<()> {
            if self.fail {
                return Err(anyhow!("bucket unavailable"));
            }
            self.names.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn recording(fail: bool) -> Arc<RecordingStore> {
        Arc::new(RecordingStore {
            names: Mutex::new(Vec::new()),
            fail,
        })
    }

    #[tokio::test]
    async fn primary_upload_failure_propagates() {
        let store = MirroredStore::new(recording(true), Some(recording(false)));
        assert!(store.store("a.png", b"x", "image/png").await.is_err());
    }

    #[tokio::test]
    async fn secondary_upload_failure_is_swallowed() {
        let primary = recording(false);
        let store = MirroredStore::new(primary.clone(), Some(recording(true)));
        store.store("a.png", b"x", "image/png").await.unwrap();
        assert_eq!(primary.names.lock().unwrap().as_slice(), ["a.png"]);
    }
}
