// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking REST transport for the persist and list-fetch boundaries.
//!
//! Drafts are created with `POST {base}/{resource}`, persisted rows are
//! updated with `PUT {base}/{resource}/{id}`, and pages come from
//! `POST {base}/{resource}/query`. Successful bodies are wrapped as
//! `{"data": ...}`.

use anyhow::{Context, Result, anyhow, bail};
use gridsync_core::{
    BAD_REQUEST, BAD_RESPONSE, CellValue, DEFAULT_ID_FIELD, Fields, ListPage, ListRequest,
    PageFetcher, PersistFailure, RowPersister,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    resource: String,
    id_field: String,
    timeout: Duration,
    http: HttpClient,
}

impl ApiClient {
    pub fn new(base_url: &str, resource: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let mut base_url = Url::parse(trimmed)
            .with_context(|| format!("api.base_url {trimmed:?} is not a valid URL"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "api.base_url must use http or https, got {:?}",
                base_url.scheme()
            );
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let resource = resource.trim().trim_matches('/').to_owned();
        if resource.is_empty() {
            bail!("api.resource must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            resource,
            id_field: DEFAULT_ID_FIELD.to_owned(),
            timeout,
            http,
        })
    }

    #[must_use]
    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn collection_url(&self) -> Result<Url> {
        self.endpoint(&self.resource)
    }

    pub fn row_url(&self, id: i64) -> Result<Url> {
        self.endpoint(&format!("{}/{id}", self.resource))
    }

    pub fn query_url(&self) -> Result<Url> {
        self.endpoint(&format!("{}/query", self.resource))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("join {path:?} onto {}", self.base_url))
    }

    /// Creates or updates one row and returns the server's copy of it.
    pub fn save_row(&self, payload: &Fields) -> Result<Fields, PersistFailure> {
        let id = payload.get(&self.id_field).and_then(CellValue::as_i64);
        let request = match id {
            Some(id) => self.http.put(self.url_or_failure(self.row_url(id))?),
            None => self.http.post(self.url_or_failure(self.collection_url())?),
        };
        tracing::debug!(resource = %self.resource, ?id, "persisting row");
        self.send(request.json(payload))
    }

    pub fn list_page(&self, request: &ListRequest) -> Result<ListPage, PersistFailure> {
        let url = self.url_or_failure(self.query_url())?;
        tracing::debug!(
            resource = %self.resource,
            page = request.page,
            size = request.size,
            "fetching page"
        );
        self.send(self.http.post(url).json(request))
    }

    /// Fetches the smallest first page to confirm the API answers.
    pub fn ping(&self) -> Result<u64> {
        let request = ListRequest {
            page: 1,
            size: gridsync_core::PAGE_SIZES[0],
            sort_orders: Vec::new(),
            filters: Vec::new(),
        };
        self.list_page(&request)
            .map(|page| page.pagination.total)
            .map_err(|failure| anyhow!("{} answered with an error: {failure}", self.base_url))
    }

    fn url_or_failure(&self, url: Result<Url>) -> Result<Url, PersistFailure> {
        url.map_err(|error| PersistFailure::other(format!("{error:#}")))
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PersistFailure> {
        let response = request
            .send()
            .map_err(|error| connection_failure(&self.base_url, &error))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|error| connection_failure(&self.base_url, &error))?;

        if !status.is_success() {
            return Err(status_failure(status, &body));
        }
        serde_json::from_str::<Envelope<T>>(&body)
            .map(|envelope| envelope.data)
            .map_err(|error| PersistFailure::other(format!("decode response: {error}")))
    }
}

impl RowPersister for ApiClient {
    fn persist(&self, payload: &Fields) -> Result<Fields, PersistFailure> {
        self.save_row(payload)
    }
}

impl PageFetcher for ApiClient {
    fn fetch_page(&self, request: &ListRequest) -> Result<ListPage, PersistFailure> {
        self.list_page(request)
    }
}

fn connection_failure(base_url: &Url, error: &reqwest::Error) -> PersistFailure {
    tracing::warn!(%base_url, %error, "request failed before a response arrived");
    PersistFailure::network(format!("cannot reach {base_url} ({error})"))
}

/// 4xx bodies carry structured rejections; 5xx bodies are kept only for
/// diagnostics.
fn status_failure(status: StatusCode, body: &str) -> PersistFailure {
    let data = serde_json::from_str::<Value>(body)
        .ok()
        .or_else(|| (!body.trim().is_empty()).then(|| Value::String(body.to_owned())));
    let code = if status.is_client_error() {
        BAD_REQUEST
    } else {
        BAD_RESPONSE
    };
    PersistFailure {
        code: Some(code.to_owned()),
        data,
        message: format!("Request failed with status code {}", status.as_u16()),
    }
}
