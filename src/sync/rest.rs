use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::remote::{RemoteSnapshot, RemoteStore};

/// Row layout of the snapshot table.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRow {
    id: String,
    data: serde_json::Value,
    updated_at: DateTime<Utc>,
}

/// Snapshot store speaking the PostgREST dialect (as exposed by Supabase). Snapshots live in a
/// table with `id`, `data` and `updated_at` columns.
pub struct RestRemoteStore {
    client: Client,
    url: String,
    table: String,
    api_key: String,
}

impl RestRemoteStore {
    pub fn new(url: &str, table: &str, api_key: String) -> Result<Self> {
        if url.is_empty() || table.is_empty() {
            bail!("Remote url and table must be set");
        }
        Ok(Self {
            client: Client::builder().build()?,
            url: url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteSnapshot>> {
        let request = self.client.get(self.endpoint()).query(&[
            ("id", format!("eq.{user_id}")),
            ("select", "id,data,updated_at".to_string()),
        ]);
        let response = self
            .authorized(request)
            .send()
            .await
            .context("Remote snapshot request failed")?
            .error_for_status()?;

        let rows: Vec<SnapshotRow> = response
            .json()
            .await
            .context("Remote snapshot has an unexpected shape")?;
        debug!("Fetched {} snapshot rows", rows.len());

        Ok(rows.into_iter().next().map(|row| RemoteSnapshot {
            user_id: row.id,
            data: row.data,
            updated_at: row.updated_at,
        }))
    }

    async fn upsert(&self, snapshot: RemoteSnapshot) -> Result<()> {
        let row = SnapshotRow {
            id: snapshot.user_id,
            data: snapshot.data,
            updated_at: snapshot.updated_at,
        };
        let request = self
            .client
            .post(self.endpoint())
            .header("Prefer", "resolution=merge-duplicates")
            .json(&row);
        self.authorized(request)
            .send()
            .await
            .context("Remote snapshot upload failed")?
            .error_for_status()?;
        Ok(())
    }

    /// The realtime channel of the backend is not supported, changes are only seen on the next
    /// pull.
    fn subscribe(
        &self,
        _user_id: &str,
        _since: Option<DateTime<Utc>>,
    ) -> Option<BoxStream<'static, RemoteSnapshot>> {
        None
    }
}
