use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

/// Opaque row-insert capability. One implementation per backing project.
#[async_trait]
pub trait Database: Send + Sync {
    async fn insert(&self, table: &str, row: &Value) -> Result<()>;
}

/// PostgREST client for one Supabase project, authenticated with the
/// service-role key.
#[derive(Debug, Clone)]
pub struct SupabaseDb {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseDb {
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

    /// Secondary project credentials are optional; absence disables the mirror.
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
impl Database for SupabaseDb {
    async fn insert(&self, table: &str, row: &Value) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Insert into '{}' failed. Status: {} {}",
                table,
                status,
                body
            ));
        }
        Ok(())
    }
}

/// Primary-then-mirror persistence. The fatal/non-fatal split lives here:
/// a primary failure propagates, a secondary failure is only logged.
#[derive(Clone)]
pub struct MirroredDb {
    primary: Arc<dyn Database>,
    secondary: Option<Arc<dyn Database>>,
}

impl MirroredDb {
    pub fn new(primary: Arc<dyn Database>, secondary: Option<Arc<dyn Database>>) -> Self {
        Self { primary, secondary }
    }

    pub async fn persist(&self, table: &str, row: &Value) -> Result<()> {
        self.primary.insert(table, row).await?;
        if let Some(secondary) = &self.secondary {
            if let Err(e) = secondary.insert(table, row).await {
                warn!("Secondary database insert failed (ignored): {:#}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingDb {
        rows: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Database for RecordingDb {
        async fn insert(&self, table: &str, _row: &Value) -> Result<()> {
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            self.rows.lock().unwrap().push(table.to_string());
            Ok(())
        }
    }

    fn recording(fail: bool) -> Arc<RecordingDb> {
        Arc::new(RecordingDb {
            rows: Mutex::new(Vec::new()),
            fail,
        })
    }

    #[tokio::test]
    async fn primary_failure_propagates() {
        let db = MirroredDb::new(recording(true), None);
        assert!(db.persist("problem_statements", &json!({})).await.is_err());
    }

    #[tokio::test]
    async fn secondary_failure_is_swallowed() {
        let primary = recording(false);
        let db = MirroredDb::new(primary.clone(), Some(recording(true)));
        db.persist("sponsorships", &json!({})).await.unwrap();
        assert_eq!(primary.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn both_stores_receive_the_row() {
        let primary = recording(false);
        let secondary = recording(false);
        let db = MirroredDb::new(primary.clone(), Some(secondary.clone()));
        db.persist("problem_statements", &json!({})).await.unwrap();
        assert_eq!(primary.rows.lock().unwrap().len(), 1);
        assert_eq!(secondary.rows.lock().unwrap().len(), 1);
    }
}
