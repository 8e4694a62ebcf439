use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{DirectoryClient, DirectoryIdentity};
use crate::{config::DirectoryConfig, Error, Result};

/// HTTP client for the identity-directory service.
///
/// Endpoints:
/// - `POST {base}/identities` with `{username, email}` -> identity JSON
/// - `DELETE {base}/identities/{id}` -> 204 (404 treated as success)
/// - `GET {base}/identities/{id}` -> identity JSON
pub struct HttpDirectoryClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

#[derive(Serialize)]
struct CreateIdentityBody<'a> {
    username: &'a str,
    email: &'a str,
}

impl HttpDirectoryClient {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| Error::Directory(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn identities_url(&self) -> String {
        format!("{}/identities", self.base_url)
    }

    fn identity_url(&self, identity_id: &str) -> String {
        format!("{}/identities/{}", self.base_url, identity_id)
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn create_identity(&self, username: &str, email: &str) -> Result<DirectoryIdentity> {
        let response = self
            .client
            .post(self.identities_url())
            .bearer_auth(&self.api_token)
            .json(&CreateIdentityBody { username, email })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Directory(format!(
                "create identity failed with {status}: {body}"
            )));
        }

        let identity: DirectoryIdentity = response
            .json()
            .await
            .map_err(|e| Error::Directory(format!("invalid create identity response: {e}")))?;

        debug!(
            identity_id = %identity.identity_id,
            username = %identity.username,
            "Directory identity created"
        );

        Ok(identity)
    }

    async fn delete_identity(&self, identity_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.identity_url(identity_id))
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        // The identity may already be gone; treat that as deleted.
        if status == StatusCode::NOT_FOUND {
            warn!(identity_id = %identity_id, "Directory identity already absent");
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Directory(format!(
                "delete identity failed with {status}: {body}"
            )));
        }

        debug!(identity_id = %identity_id, "Directory identity deleted");
        Ok(())
    }

    async fn describe_identity(&self, identity_id: &str) -> Result<DirectoryIdentity> {
        let response = self
            .client
            .get(self.identity_url(identity_id))
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!(
                "directory identity {identity_id} not found"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Directory(format!(
                "describe identity failed with {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Directory(format!("invalid describe identity response: {e}")))
    }
}
