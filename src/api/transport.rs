//! Pluggable request transport.
//!
//! `ApiClient` builds requests and interprets responses; a `Transport` only
//! moves bytes. Production uses reqwest, tests use `mock::MockTransport`.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use std::time::Duration;
use url::Url;

use super::error::ApiError;
use crate::config::ApiConfig;

/// A fully resolved outgoing request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
  pub method: Method,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
}

impl ApiRequest {
  #[cfg(test)]
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Raw response: status code plus body bytes.
#[derive(Debug, Clone)]
pub struct ApiResponse {
  pub status: u16,
  pub body: Vec<u8>,
}

impl ApiResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// reqwest-backed transport shared by the whole process.
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let mut builder = reqwest::Client::builder().cookie_store(config.with_credentials);
    if config.timeout_secs > 0 {
      builder = builder.timeout(Duration::from_secs(config.timeout_secs));
    }

    let client = builder
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
    let mut builder = self.client.request(request.method, request.url);
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
      builder = builder.body(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| ApiError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    let body = response
      .bytes()
      .await
      .map_err(|e| ApiError::Transport(e.to_string()))?;

    Ok(ApiResponse {
      status,
      body: body.to_vec(),
    })
  }
}
