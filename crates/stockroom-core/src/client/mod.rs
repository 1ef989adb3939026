//! Authenticated HTTP client for the products backend.
//!
//! Each method is a single round trip. Failures are normalized into
//! [`RemoteError`]; nothing is retried.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::IdentitySession;
use crate::models::{Record, RecordFields, RecordId};
use crate::util::{compact_text, normalize_http_base};
use crate::{Error, Result};

const PRODUCTS_ROUTE: &str = "/products";

/// A failed backend call.
///
/// `status` is `None` when no response arrived (transport failure, timeout, or
/// no credential to send).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", status_suffix(.status))]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_signed_in() -> Self {
        Self::new(None, "Not signed in")
    }

    fn transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::new(None, "Request timed out");
        }
        Self::new(None, format!("Request failed: {error}"))
    }

    /// Build from a non-2xx response: the body's `message` field wins, then
    /// the status reason phrase.
    fn from_response(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|payload| payload.message)
            .map(|message| compact_text(&message))
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .map_or_else(|| format!("HTTP {}", status.as_u16()), ToString::to_string)
            });
        Self::new(Some(status.as_u16()), message)
    }
}

#[allow(clippy::ref_option)]
fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Backend operations the collection store depends on.
#[allow(async_fn_in_trait)]
pub trait ProductsApi {
    /// Fetch the collection, filtered server-side when `search` is non-empty.
    async fn list(&self, search: Option<&str>) -> std::result::Result<Vec<Record>, RemoteError>;

    /// Create a record; the server assigns the id.
    async fn create(&self, fields: &RecordFields) -> std::result::Result<Record, RemoteError>;

    /// Replace a record's fields. The response body is ignored.
    async fn update(
        &self,
        id: &RecordId,
        fields: &RecordFields,
    ) -> std::result::Result<(), RemoteError>;

    async fn remove(&self, id: &RecordId) -> std::result::Result<(), RemoteError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    name: &'a str,
    quantity: u64,
    price: f64,
    submitter_identity: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    name: &'a str,
    quantity: u64,
    price: f64,
}

/// reqwest-backed [`ProductsApi`] that reads the bearer token per request.
#[derive(Debug, Clone)]
pub struct HttpProductsClient<I: IdentitySession> {
    base_url: String,
    client: reqwest::Client,
    identity: I,
}

impl<I: IdentitySession> HttpProductsClient<I> {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration, identity: I) -> Result<Self> {
        let base_url =
            normalize_http_base(base_url.as_ref(), "API base URL").map_err(Error::Config)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            client,
            identity,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, search: Option<&str>) -> String {
        match search.map(str::trim).filter(|term| !term.is_empty()) {
            Some(term) => format!(
                "{}{PRODUCTS_ROUTE}?search={}",
                self.base_url,
                urlencoding::encode(term)
            ),
            None => format!("{}{PRODUCTS_ROUTE}", self.base_url),
        }
    }

    fn item_url(&self, id: &RecordId) -> String {
        format!(
            "{}{PRODUCTS_ROUTE}/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        )
    }

    /// Attach the current credential, or refuse to build the request.
    fn authorized(
        &self,
        method: Method,
        url: String,
    ) -> std::result::Result<(RequestBuilder, String), RemoteError> {
        let credential = self
            .identity
            .credential()
            .ok_or_else(RemoteError::not_signed_in)?;
        tracing::debug!("{} {}", method, url);
        let request = self
            .client
            .request(method, url)
            .bearer_auth(&credential.token)
            .header(reqwest::header::ACCEPT, "application/json");
        Ok((request, credential.subject))
    }
}

async fn execute(request: RequestBuilder) -> std::result::Result<Response, RemoteError> {
    let response = request.send().await.map_err(|error| {
        tracing::warn!("Products request failed before a response: {}", error);
        RemoteError::transport(&error)
    })?;
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = RemoteError::from_response(status, &body);
    tracing::warn!("Products request rejected: {}", error);
    Err(error)
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: Response,
) -> std::result::Result<T, RemoteError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|error| RemoteError::new(Some(status), format!("Failed to read response: {error}")))?;
    serde_json::from_str(&body).map_err(|error| {
        RemoteError::new(Some(status), format!("Invalid response payload: {error}"))
    })
}

impl<I: IdentitySession> ProductsApi for HttpProductsClient<I> {
    async fn list(&self, search: Option<&str>) -> std::result::Result<Vec<Record>, RemoteError> {
        let (request, _) = self.authorized(Method::GET, self.collection_url(search))?;
        let response = execute(request).await?;
        decode(response).await
    }

    async fn create(&self, fields: &RecordFields) -> std::result::Result<Record, RemoteError> {
        let (request, subject) = self.authorized(Method::POST, self.collection_url(None))?;
        let body = CreateBody {
            name: &fields.name,
            quantity: fields.quantity,
            price: fields.price,
            submitter_identity: &subject,
        };
        let response = execute(request.json(&body)).await?;
        decode(response).await
    }

    async fn update(
        &self,
        id: &RecordId,
        fields: &RecordFields,
    ) -> std::result::Result<(), RemoteError> {
        let (request, _) = self.authorized(Method::PUT, self.item_url(id))?;
        let body = UpdateBody {
            name: &fields.name,
            quantity: fields.quantity,
            price: fields.price,
        };
        execute(request.json(&body)).await?;
        Ok(())
    }

    async fn remove(&self, id: &RecordId) -> std::result::Result<(), RemoteError> {
        let (request, _) = self.authorized(Method::DELETE, self.item_url(id))?;
        execute(request).await?;
        Ok(())
    }
}
