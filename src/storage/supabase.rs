//! Supabase (PostgREST + Storage) row store.

use super::{Filter, RemoteStore, Row, UploadOptions};
use crate::{Error, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

/// Row store backed by a hosted Supabase project.
pub struct SupabaseStore {
    /// Project URL without trailing slash, e.g. `https://abc.supabase.co`.
    base_url: String,
    /// Public anon key, sent as `apikey`.
    anon_key: SecretString,
    /// User session token; falls back to the anon key.
    access_token: Option<SecretString>,
    /// HTTP client with connection pooling.
    client: Client,
}

impl SupabaseStore {
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Creates a store for the given Supabase project.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Project URL, e.g. `https://abc.supabase.co`
    /// * `anon_key` - Anonymous API key sent as `apikey`, and as the bearer
    ///   token until a user access token is set
    #[must_use]
    pub fn new(base_url: impl Into<String>, anon_key: SecretString) -> Self {
        Self::with_timeout(base_url, anon_key, Self::DEFAULT_TIMEOUT)
    }

    /// Creates a store with a custom request timeout.
    #[must_use]
    pub fn with_timeout(
        base_url: impl Into<String>,
        anon_key: SecretString,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .user_agent(format!("Haven/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key,
            access_token: None,
            client,
        }
    }

    /// Authenticates requests as a signed-in user (row-level security).
    #[must_use]
    pub fn with_access_token(mut self, token: SecretString) -> Self {
        self.access_token = Some(token);
        self
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{bucket}/{}",
            self.base_url,
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_ref().unwrap_or(&self.anon_key);
        request
            .header("apikey", self.anon_key.expose_secret())
            .header(
                "Authorization",
                format!("Bearer {}", bearer.expose_secret()),
            )
    }

    /// Converts a filter to PostgREST query parameters.
    fn query_params(filter: &Filter) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = filter
            .conditions()
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{}", plain_value(value))))
            .collect();
        if let Some((column, ascending)) = filter.ordering() {
            let dir = if ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{column}.{dir}")));
        }
        if let Some(limit) = filter.row_limit() {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    fn send(operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().map_err(|e| Error::operation(operation, e))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().unwrap_or_default();
        Err(Error::operation(
            operation,
            format!("HTTP {status}: {body}"),
        ))
    }

    fn rows(operation: &str, response: Response) -> Result<Vec<Row>> {
        response
            .json::<Vec<Row>>()
            .map_err(|e| Error::operation(operation, e))
    }
}

/// Renders a JSON value the way PostgREST expects in a filter.
fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RemoteStore for SupabaseStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(Self::query_params(filter));
        let request = self.authorize(self.client.get(self.rest_url(table)).query(&params));
        let response = Self::send("supabase_select", request)?;
        Self::rows("supabase_select", response)
    }

    fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let request = self.authorize(
            self.client
                .post(self.rest_url(table))
                .header("Prefer", "return=representation")
                .json(&rows),
        );
        let response = Self::send("supabase_insert", request)?;
        Self::rows("supabase_insert", response)
    }

    fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<Vec<Row>> {
        let request = self.authorize(
            self.client
                .patch(self.rest_url(table))
                .query(&Self::query_params(filter))
                .header("Prefer", "return=representation")
                .json(&patch),
        );
        let response = Self::send("supabase_update", request)?;
        Self::rows("supabase_update", response)
    }

    fn delete(&self, table: &str, filter: &Filter) -> Result<usize> {
        let request = self.authorize(
            self.client
                .delete(self.rest_url(table))
                .query(&Self::query_params(filter))
                .header("Prefer", "return=representation"),
        );
        let response = Self::send("supabase_delete", request)?;
        Ok(Self::rows("supabase_delete", response)?.len())
    }

    fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        options: &UploadOptions,
    ) -> Result<()> {
        let request = self.authorize(
            self.client
                .post(self.object_url(bucket, path))
                .header("Content-Type", &options.content_type)
                .header("Cache-Control", "max-age=3600")
                .header("x-upsert", if options.upsert { "true" } else { "false" })
                .body(data.to_vec()),
        );
        Self::send("supabase_upload", request).map(|_| ())
    }
}
