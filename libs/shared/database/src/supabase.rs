use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::query::PostgrestQuery;

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// PostgREST answers 409 on unique/foreign key violations.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SupabaseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SupabaseError::Conflict(_))
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: config.supabase_anon_key.clone(),
        }
    }

    /// Client for work not tied to a user session (public listings,
    /// vendor callbacks). Uses the service role key when one is configured.
    pub fn with_server_key(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: config.server_key().to_string(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?;
        headers.insert("apikey", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token.unwrap_or(&self.api_key);
        let authorization = HeaderValue::from_str(&format!("Bearer {}", bearer))
            .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?;
        headers.insert(AUTHORIZATION, authorization);

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("API error ({}): {}", status, text);

            return Err(match status.as_u16() {
                401 | 403 => SupabaseError::Auth(text),
                404 => SupabaseError::NotFound(text),
                409 => SupabaseError::Conflict(text),
                code => SupabaseError::Api { status: code, message: text },
            });
        }

        let data = serde_json::from_str::<T>(&text)?;
        Ok(data)
    }

    pub async fn select<T>(&self, query: &PostgrestQuery, auth_token: Option<&str>)
                           -> Result<Vec<T>, SupabaseError>
    where T: DeserializeOwned {
        self.request(Method::GET, &query.to_path(), auth_token, None).await
    }

    /// Inserts `body` and returns the stored rows.
    pub async fn insert<T>(&self, table: &str, body: Value, auth_token: Option<&str>)
                           -> Result<Vec<T>, SupabaseError>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}", table);
        self.request_with_headers(
            Method::POST,
            &path,
            auth_token,
            Some(body),
            Some(return_representation()),
        ).await
    }

    /// Patches every row matched by the query's filters and returns them.
    pub async fn update<T>(&self, query: &PostgrestQuery, body: Value, auth_token: Option<&str>)
                           -> Result<Vec<T>, SupabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(
            Method::PATCH,
            &query.to_filter_path(),
            auth_token,
            Some(body),
            Some(return_representation()),
        ).await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}
