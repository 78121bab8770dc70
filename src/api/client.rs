use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::envelope::ErrorBody;
use super::error::ApiError;
use super::transport::{ApiRequest, Transport};
use crate::auth::AuthHolder;

/// Path fragment identifying authentication endpoints; these never carry a bearer token.
const AUTH_PATH_MARKER: &str = "/auth/";

/// Shared REST client.
///
/// The bearer token is looked up on every call, so a login or logout takes
/// effect on the very next request.
#[derive(Clone)]
pub struct ApiClient {
  base_url: String,
  transport: Arc<dyn Transport>,
  auth: AuthHolder,
}

impl ApiClient {
  pub fn new(base_url: &str, transport: Arc<dyn Transport>, auth: AuthHolder) -> Result<Self> {
    Url::parse(base_url).map_err(|e| eyre!("Invalid API base URL '{}': {}", base_url, e))?;

    Ok(Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      transport,
      auth,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.send::<(), T>(Method::GET, path, None).await
  }

  pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, ApiError> {
    self.send(Method::POST, path, Some(body)).await
  }

  pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, ApiError> {
    self.send(Method::PUT, path, Some(body)).await
  }

  pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, ApiError> {
    self.send(Method::PATCH, path, Some(body)).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    self.send::<(), T>(Method::DELETE, path, None).await
  }

  async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    body: Option<&B>,
  ) -> Result<T, ApiError> {
    let url = Url::parse(&format!("{}{}", self.base_url, path))
      .map_err(|e| ApiError::Transport(format!("invalid request path {}: {}", path, e)))?;

    let mut headers = vec![("Accept".to_string(), "application/json".to_string())];

    if !path.contains(AUTH_PATH_MARKER) {
      if let Some(token) = self.auth.token() {
        headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
      }
    }

    let body = match body {
      Some(b) => {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        Some(serde_json::to_vec(b).map_err(|e| ApiError::Decode(e.to_string()))?)
      }
      None => None,
    };

    debug!(%method, %path, "sending request");

    let response = self
      .transport
      .send(ApiRequest {
        method,
        url,
        headers,
        body,
      })
      .await?;

    if !response.is_success() {
      let message = ErrorBody::message_from(&response.body)
        .unwrap_or_else(|| format!("request failed with status {}", response.status));
      return Err(ApiError::Status {
        status: response.status,
        message,
      });
    }

    serde_json::from_slice(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
  }
}
