use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use super::{validate_identifier, value_text, Filter, Record, RecordStore, StoreError, StoreScope, ID_COLUMN};
use crate::config::BackendConfig;

/// PostgREST-backed store on the managed backend (`/rest/v1/{table}`).
///
/// Service scope authenticates with the service key. User scope forwards the
/// caller's backend access token so row-level security applies; without one the
/// request falls back to the anon key and RLS sees an anonymous caller.
pub struct RestStore {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

impl RestStore {
    pub fn new(client: Client, config: &BackendConfig) -> Self {
        Self {
            client,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            service_key: config.service_key.clone(),
        }
    }

    fn table_url(&self, table: &str) -> Result<String, StoreError> {
        validate_identifier(table)?;
        Ok(format!("{}/rest/v1/{}", self.base_url, table))
    }

    fn authorize(&self, request: RequestBuilder, scope: &StoreScope) -> RequestBuilder {
        let (apikey, bearer) = match scope {
            StoreScope::Service => (&self.service_key, &self.service_key),
            StoreScope::User { access_token: Some(token) } => (&self.anon_key, token),
            StoreScope::User { access_token: None } => (&self.anon_key, &self.anon_key),
        };
        request.header("apikey", apikey).bearer_auth(bearer)
    }

    async fn rows(response: Response) -> Result<Vec<Record>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Upstream { status: status.as_u16(), body });
        }

        match response.json::<Value>().await? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(StoreError::Decode(format!("expected object row, got {}", other))),
                })
                .collect(),
            other => Err(StoreError::Decode(format!("expected array, got {}", other))),
        }
    }
}

/// PostgREST condition for an equality filter. `eq.null` would compare against
/// the string "null", so null needs the `is` operator.
fn condition(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        other => format!("eq.{}", value_text(other)),
    }
}

#[async_trait]
impl RecordStore for RestStore {
    async fn fetch(&self, scope: &StoreScope, table: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let request = self
            .client
            .get(self.table_url(table)?)
            .query(&[(ID_COLUMN, format!("eq.{}", id)), ("limit", "1".to_string())]);
        let response = self.authorize(request, scope).send().await?;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn list(&self, scope: &StoreScope, table: &str, filters: &[Filter]) -> Result<Vec<Record>, StoreError> {
        let mut params = Vec::with_capacity(filters.len());
        for filter in filters {
            validate_identifier(&filter.column)?;
            params.push((filter.column.as_str(), condition(&filter.value)));
        }

        let request = self.client.get(self.table_url(table)?).query(&params);
        let response = self.authorize(request, scope).send().await?;
        Self::rows(response).await
    }

    async fn insert(&self, scope: &StoreScope, table: &str, record: Record) -> Result<Record, StoreError> {
        for column in record.keys() {
            validate_identifier(column)?;
        }

        let request = self
            .client
            .post(self.table_url(table)?)
            .header("Prefer", "return=representation")
            .json(&record);
        let response = self.authorize(request, scope).send().await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    async fn update(&self, scope: &StoreScope, table: &str, id: &str, patch: Record) -> Result<Option<Record>, StoreError> {
        for column in patch.keys() {
            validate_identifier(column)?;
        }

        let request = self
            .client
            .patch(self.table_url(table)?)
            .query(&[(ID_COLUMN, format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch);
        let response = self.authorize(request, scope).send().await?;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn delete(&self, scope: &StoreScope, table: &str, id: &str) -> Result<bool, StoreError> {
        let request = self
            .client
            .delete(self.table_url(table)?)
            .query(&[(ID_COLUMN, format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        let response = self.authorize(request, scope).send().await?;
        Ok(!Self::rows(response).await?.is_empty())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let request = self.client.get(format!("{}/rest/v1/", self.base_url));
        let response = self.authorize(request, &StoreScope::Service).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("backend responded {}", response.status())))
        }
    }
}
