//! REST client for the hosted object storage service.
//!
//! Speaks the `/storage/v1/object` dialect:
//!
//! | Call | Request |
//! |---|---|
//! | `put_object` | `POST /storage/v1/object/{bucket}/{key}` |
//! | `public_url` | `/storage/v1/object/public/{bucket}/{key}` |
//! | `create_signed_upload_ticket` | `POST /storage/v1/object/upload/sign/{bucket}/{key}` |
//! | `put_via_ticket` | `PUT /storage/v1/object/upload/sign/{bucket}/{path}?token=...` |
//!
//! The sign call answers `{"url": "...?token=..."}`.
//!
//! Writes never overwrite (`x-upsert: false`); every retry uses a new key.

use super::StorageError;
use super::storage::{ObjectStore, SignedUploadTicket};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;

pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SignResponse {
    url: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.endpoint, self.bucket, key)
    }

    fn sign_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/upload/sign/{}/{}",
            self.endpoint, self.bucket, key
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
    }
}

/// Map a non-2xx response to [`StorageError::Status`].
async fn check(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Pull the `token` query parameter out of a (possibly relative) signed URL.
fn ticket_token(signed_url: &str) -> Result<String, StorageError> {
    let base = Url::parse("http://storage.invalid/")
        .map_err(|e| StorageError::InvalidTicket(e.to_string()))?;
    let url = base
        .join(signed_url)
        .map_err(|e| StorageError::InvalidTicket(format!("{}: {}", signed_url, e)))?;
    url.query_pairs()
        .find(|(name, _)| name == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| StorageError::InvalidTicket(format!("no token in {}", signed_url)))
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StorageError> {
        debug!("POST {} ({} bytes)", self.object_url(key), body.len());
        let request = self
            .client
            .post(self.object_url(key))
            .header("content-type", content_type)
            .header("cache-control", format!("max-age={}", cache_control))
            .header("x-upsert", "false")
            .body(body);
        check(self.authorized(request).send().await?).await?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.endpoint, self.bucket, key
        )
    }

    async fn create_signed_upload_ticket(
        &self,
        key: &str,
    ) -> Result<SignedUploadTicket, StorageError> {
        let request = self.client.post(self.sign_url(key));
        let response = check(self.authorized(request).send().await?).await?;
        let signed: SignResponse = response.json().await?;
        Ok(SignedUploadTicket {
            token: ticket_token(&signed.url)?,
            path: key.to_string(),
        })
    }

    async fn put_via_ticket(
        &self,
        ticket: &SignedUploadTicket,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!("PUT {} via ticket ({} bytes)", ticket.path, body.len());
        // The ticket is the credential; only the anon key goes along
        let request = self
            .client
            .put(self.sign_url(&ticket.path))
            .query(&[("token", ticket.token.as_str())])
            .header("apikey", &self.api_key)
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(body);
        check(request.send().await?).await?;
        Ok(())
    }
}
