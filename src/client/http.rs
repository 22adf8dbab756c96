//! HTTP transport for the review client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::api::{ClientError, ReviewApi};
use crate::config::ClientConfig;
use crate::jobs::{JobId, JobStatus};
use crate::results::{DetectedRegion, RegionStatus};
use crate::routes::jobs::{BatchSubmitResponse, CancelResponse, SubmitResponse};
use crate::routes::results::ResultsResponse;
use crate::storage::ImageRef;

/// `ReviewApi` over the server's REST endpoints
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn image_url(&self, image_ref: &ImageRef, rest: &str) -> String {
        self.url(&format!(
            "/images/{}{}",
            urlencoding::encode(image_ref.as_str()),
            rest
        ))
    }
}

/// Decode a JSON body, mapping 404 to `NotFound` and other failures to
/// `Transport`
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::NotFound(body));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Transport(format!("HTTP {}: {}", status, body)));
    }
    Ok(response.json().await?)
}

#[async_trait]
impl ReviewApi for HttpApi {
    async fn submit(&self, image_ref: &ImageRef) -> Result<JobId, ClientError> {
        let response = self
            .client
            .post(self.url("/ocr/jobs"))
            .json(&json!({ "image_ref": image_ref }))
            .send()
            .await?;
        let body: SubmitResponse = decode(response).await?;
        Ok(body.job_id)
    }

    async fn submit_batch(&self, image_refs: &[ImageRef]) -> Result<Vec<JobId>, ClientError> {
        let response = self
            .client
            .post(self.url("/ocr/jobs/batch"))
            .json(&json!({ "image_refs": image_refs }))
            .send()
            .await?;
        let body: BatchSubmitResponse = decode(response).await?;
        Ok(body.job_ids)
    }

    async fn status(&self, job_id: JobId) -> Result<JobStatus, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/ocr/jobs/{}", job_id)))
            .send()
            .await?;
        decode(response).await
    }

    async fn cancel(&self, job_id: JobId) -> Result<bool, ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/ocr/jobs/{}", job_id)))
            .send()
            .await?;
        let body: CancelResponse = decode(response).await?;
        Ok(body.cancelled)
    }

    async fn list_results(&self, image_ref: &ImageRef) -> Result<Vec<DetectedRegion>, ClientError> {
        let response = self
            .client
            .get(self.image_url(image_ref, "/results"))
            .send()
            .await?;
        let body: ResultsResponse = decode(response).await?;
        Ok(body.items)
    }

    async fn rename(
        &self,
        image_ref: &ImageRef,
        index: usize,
        text: &str,
    ) -> Result<DetectedRegion, ClientError> {
        let response = self
            .client
            .patch(self.image_url(image_ref, &format!("/results/{}", index)))
            .json(&json!({ "text": text }))
            .send()
            .await?;
        decode(response).await
    }

    async fn set_status(
        &self,
        image_ref: &ImageRef,
        index: usize,
        status: RegionStatus,
    ) -> Result<DetectedRegion, ClientError> {
        let response = self
            .client
            .patch(self.image_url(image_ref, &format!("/results/{}", index)))
            .json(&json!({ "status": status }))
            .send()
            .await?;
        decode(response).await
    }

    async fn clean(&self, image_ref: &ImageRef) -> Result<Vec<DetectedRegion>, ClientError> {
        let response = self
            .client
            .post(self.image_url(image_ref, "/clean"))
            .send()
            .await?;
        let body: ResultsResponse = decode(response).await?;
        Ok(body.items)
    }
}
