// HTTP client wrapper for the remote board APIs
//
// Attaches the bearer token and quota project header to every call and turns
// any non-2xx answer into a `RemoteFailure` naming the action that failed.

use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::config::RemoteConfig;
use crate::credentials::AccessTokenSource;
use crate::error::{Result, StorageError};

const USER_PROJECT_HEADER: &str = "x-goog-user-project";

#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    config: RemoteConfig,
    tokens: Arc<dyn AccessTokenSource>,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            tokens,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        action: &str,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let request = self.request(Method::GET, resource).await?.query(query);
        let response = self.send(action, request).await?;
        self.read_json(action, response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        action: &str,
        resource: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(Method::POST, resource).await?.json(body);
        let response = self.send(action, request).await?;
        self.read_json(action, response).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        action: &str,
        resource: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        let request = self
            .request(Method::PATCH, resource)
            .await?
            .query(query)
            .json(body);
        let response = self.send(action, request).await?;
        self.read_json(action, response).await
    }

    pub async fn delete(&self, action: &str, resource: &str) -> Result<()> {
        let request = self.request(Method::DELETE, resource).await?;
        self.send(action, request).await?;
        Ok(())
    }

    async fn request(&self, method: Method, resource: &str) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .http
            .request(method, self.config.url(resource))
            .bearer_auth(token)
            .header(USER_PROJECT_HEADER, &self.config.project_number))
    }

    async fn send(&self, action: &str, request: RequestBuilder) -> Result<Response> {
        tracing::debug!(action, "Sending remote request");
        let response = request.send().await.map_err(|source| StorageError::Transport {
            action: action.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(action, status = status.as_u16(), body = %body, "Remote request failed");
        Err(StorageError::RemoteFailure {
            action: action.to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, action: &str, response: Response) -> Result<T> {
        response.json().await.map_err(|source| {
            if source.is_decode() {
                StorageError::invalid_data(format!("{action}: {source}"))
            } else {
                StorageError::Transport {
                    action: action.to_string(),
                    source,
                }
            }
        })
    }
}
