use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::{check, FirebaseBackend};
use crate::error::{BackendError, Result};
use crate::traits::ObjectStorage;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

/// `{base}/v0/b/{bucket}/o/{name}` with the object name as a single
/// encoded segment.
fn object_url(base: &str, bucket: &str, name: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/v0/b/{bucket}/o", base.trim_end_matches('/')))
        .map_err(|e| BackendError::Config(format!("bad storage url: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| BackendError::Config("storage url cannot be a base".into()))?
        .push(name);
    Ok(url)
}

/// Public download URL for an uploaded object.
fn download_url(base: &str, bucket: &str, name: &str, token: Option<&str>) -> Result<String> {
    let mut url = object_url(base, bucket, name)?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("alt", "media");
        // Several tokens may be listed; any one works.
        if let Some(token) = token.and_then(|t| t.split(',').next()) {
            pairs.append_pair("token", token);
        }
    }
    Ok(url.into())
}

#[async_trait]
impl ObjectStorage for FirebaseBackend {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let token = self.require_bearer().await?;
        let url = format!(
            "{}/v0/b/{}/o",
            self.config.storage_url.trim_end_matches('/'),
            self.config.storage_bucket
        );
        let size = bytes.len();
        let resp = self
            .http
            .post(url)
            .query(&[("name", path)])
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let uploaded: UploadResponse = check(resp)
            .await
            .map_err(|e| match e {
                BackendError::Protocol(m) => BackendError::Storage(m),
                other => other,
            })?
            .json()
            .await?;
        debug!(path, size, "object uploaded");

        download_url(
            &self.config.storage_url,
            &self.config.storage_bucket,
            &uploaded.name,
            uploaded.download_tokens.as_deref(),
        )
    }

    async fn delete_object(&self, path: &str) -> Result<()> {
        let token = self.require_bearer().await?;
        let url = object_url(&self.config.storage_url, &self.config.storage_bucket, path)?;
        let resp = self.http.delete(url).bearer_auth(token).send().await?;
        check(resp).await?;
        Ok(())
    }
}
