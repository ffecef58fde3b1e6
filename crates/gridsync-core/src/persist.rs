// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::ids::ServerId;
use crate::value::Fields;
use crate::view::ListRequest;

/// Error code carried by structured API rejections.
pub const BAD_REQUEST: &str = "ERR_BAD_REQUEST";
pub const BAD_RESPONSE: &str = "ERR_BAD_RESPONSE";
pub const NETWORK: &str = "ERR_NETWORK";

/// What a persist or list call rejects with: a transport code, the decoded
/// response body when there was one, and a human message.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistFailure {
    pub code: Option<String>,
    pub data: Option<Value>,
    pub message: String,
}

impl PersistFailure {
    pub fn bad_request(data: Value) -> Self {
        Self {
            code: Some(BAD_REQUEST.to_owned()),
            data: Some(data),
            message: "Request failed with status code 400".to_owned(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            code: Some(NETWORK.to_owned()),
            data: None,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            code: None,
            data: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for PersistFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for PersistFailure {}

/// Another row in the same batch that the server also found invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWarning {
    pub id: ServerId,
    pub fields: Vec<String>,
    pub message: Option<String>,
}

/// A persist rejection after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveFailure {
    Warnings(Vec<FieldWarning>),
    Detail(String),
    FieldErrors { fields: Vec<String>, message: String },
    Unknown(String),
}

// `null` and a missing key mean the same thing in these bodies.
#[derive(Debug, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    warnings: Option<Vec<WarningEntry>>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    errors: Option<Vec<ErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct WarningEntry {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    fields: Option<Vec<String>>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    fields: Option<Vec<String>>,
    #[serde(default)]
    message: Option<String>,
}

impl SaveFailure {
    /// Structured shapes are only honored for `ERR_BAD_REQUEST`; checked
    /// in the order warnings, detail, field errors.
    pub fn classify(failure: &PersistFailure) -> Self {
        let unknown = || Self::Unknown(failure.message.clone());
        if failure.code.as_deref() != Some(BAD_REQUEST) {
            return unknown();
        }
        let Some(data) = &failure.data else {
            return unknown();
        };
        let Ok(body) = serde_json::from_value::<RejectionBody>(data.clone()) else {
            return unknown();
        };

        let warnings: Vec<FieldWarning> = body
            .warnings
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                Some(FieldWarning {
                    id: server_id_from_json(entry.id.as_ref()?)?,
                    fields: entry.fields.unwrap_or_default(),
                    message: entry.message,
                })
            })
            .collect();
        if !warnings.is_empty() {
            return Self::Warnings(warnings);
        }

        if let Some(detail) = body.detail.filter(|detail| !detail.trim().is_empty()) {
            return Self::Detail(detail);
        }

        if let Some(first) = body.errors.unwrap_or_default().into_iter().next() {
            return Self::FieldErrors {
                fields: first.fields.unwrap_or_default(),
                message: first.message.unwrap_or_default(),
            };
        }

        unknown()
    }
}

fn server_id_from_json(value: &Value) -> Option<ServerId> {
    match value {
        Value::Number(number) => number.as_i64().map(ServerId::new),
        Value::String(raw) => raw.trim().parse().ok().map(ServerId::new),
        _ => None,
    }
}

/// The caller-supplied persist function. Resolves with the server's
/// canonical row data.
pub trait RowPersister {
    fn persist(&self, payload: &Fields) -> Result<Fields, PersistFailure>;
}

impl<F> RowPersister for F
where
    F: Fn(&Fields) -> Result<Fields, PersistFailure>,
{
    fn persist(&self, payload: &Fields) -> Result<Fields, PersistFailure> {
        self(payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    pub items: Vec<Fields>,
    pub pagination: PageInfo,
}

/// The caller-supplied list function.
pub trait PageFetcher {
    fn fetch_page(&self, request: &ListRequest) -> Result<ListPage, PersistFailure>;
}

impl<F> PageFetcher for F
where
    F: Fn(&ListRequest) -> Result<ListPage, PersistFailure>,
{
    fn fetch_page(&self, request: &ListRequest) -> Result<ListPage, PersistFailure> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldWarning, PersistFailure, SaveFailure};
    use crate::ids::ServerId;
    use serde_json::json;

    #[test]
    fn warnings_take_priority_over_detail_and_errors() {
        let failure = PersistFailure::bad_request(json!({
            "warnings": [{"id": 3, "fields": ["amount"]}, {"id": "4", "fields": []}],
            "detail": "ignored",
            "errors": [{"fields": ["name"], "message": "ignored"}],
        }));
        assert_eq!(
            SaveFailure::classify(&failure),
            SaveFailure::Warnings(vec![
                FieldWarning {
                    id: ServerId::new(3),
                    fields: vec!["amount".to_owned()],
                    message: None,
                },
                FieldWarning {
                    id: ServerId::new(4),
                    fields: Vec::new(),
                    message: None,
                },
            ])
        );
    }

    #[test]
    fn detail_is_used_verbatim() {
        let failure = PersistFailure::bad_request(json!({"detail": "Period already closed"}));
        assert_eq!(
            SaveFailure::classify(&failure),
            SaveFailure::Detail("Period already closed".to_owned())
        );
    }

    #[test]
    fn null_collections_read_as_absent() {
        let failure = PersistFailure::bad_request(json!({
            "detail": "Duplicate entry",
            "errors": null,
            "warnings": null,
        }));
        assert_eq!(
            SaveFailure::classify(&failure),
            SaveFailure::Detail("Duplicate entry".to_owned())
        );

        let unaddressed = PersistFailure::bad_request(json!({
            "warnings": [{"fields": ["amount"]}, {"id": null, "fields": null}],
            "errors": [{"fields": null, "message": "is required"}],
        }));
        assert_eq!(
            SaveFailure::classify(&unaddressed),
            SaveFailure::FieldErrors {
                fields: Vec::new(),
                message: "is required".to_owned(),
            }
        );
    }

    #[test]
    fn first_field_error_wins() {
        let failure = PersistFailure::bad_request(json!({
            "errors": [
                {"fields": ["name"], "message": "is invalid"},
                {"fields": ["total"], "message": "is negative"},
            ],
        }));
        assert_eq!(
            SaveFailure::classify(&failure),
            SaveFailure::FieldErrors {
                fields: vec!["name".to_owned()],
                message: "is invalid".to_owned(),
            }
        );
    }

    #[test]
    fn structured_body_without_bad_request_code_is_unknown() {
        let failure = PersistFailure {
            code: Some("ERR_BAD_RESPONSE".to_owned()),
            data: Some(json!({"detail": "boom"})),
            message: "Request failed with status code 500".to_owned(),
        };
        assert_eq!(
            SaveFailure::classify(&failure),
            SaveFailure::Unknown("Request failed with status code 500".to_owned())
        );
    }

    #[test]
    fn unrecognized_body_shape_is_unknown() {
        let failure = PersistFailure::bad_request(json!({"detail": 17}));
        assert!(matches!(
            SaveFailure::classify(&failure),
            SaveFailure::Unknown(_)
        ));

        let empty = PersistFailure::bad_request(json!({}));
        assert!(matches!(SaveFailure::classify(&empty), SaveFailure::Unknown(_)));
    }

    #[test]
    fn network_failures_are_unknown() {
        let failure = PersistFailure::network("connection refused");
        assert_eq!(
            SaveFailure::classify(&failure),
            SaveFailure::Unknown("connection refused".to_owned())
        );
    }
}
