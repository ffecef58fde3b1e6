// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Optimistic save and delete against the caller's persist function, and
//! reconciliation of whatever comes back into row state plus one alert.

use std::collections::BTreeMap;

use crate::alert::{Alert, Severity};
use crate::ids::RowId;
use crate::persist::{FieldWarning, PersistFailure, RowPersister, SaveFailure};
use crate::row::{Row, RowStatus, TransitionError, TransitionResult, ValidationMessages};
use crate::value::{CellValue, Fields};

pub const SAVE_SUCCESS_MESSAGE: &str = "Row saved successfully";
pub const DELETE_SUCCESS_MESSAGE: &str = "Row deleted successfully";
pub const DEFAULT_ID_FIELD: &str = "id";
pub const DELETED_FLAG: &str = "deleted";

const SAVE_FAILURE_PREFIX: &str = "Unable to save row";
const DELETE_FAILURE_PREFIX: &str = "Unable to delete row";
const WARNING_FALLBACK: &str = "needs review";

/// Display labels for field names: `<prefix>.<field>` is looked up in the
/// translation table, falling back to the field name with underscores
/// spaced out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLabels {
    prefix: String,
    translations: BTreeMap<String, String>,
}

impl FieldLabels {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            translations: BTreeMap::new(),
        }
    }

    pub fn with_translation(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.translations.insert(key.into(), label.into());
        self
    }

    pub fn label_for(&self, field: &str) -> String {
        let key = if self.prefix.is_empty() {
            field.to_owned()
        } else {
            format!("{}.{field}", self.prefix)
        };
        self.translations
            .get(&key)
            .cloned()
            .unwrap_or_else(|| field.replace('_', " "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveContext {
    pub id_field: String,
    pub labels: FieldLabels,
}

impl Default for SaveContext {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_owned(),
            labels: FieldLabels::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub row: Row,
    pub alert: Alert,
    /// Rows other than this one that the server flagged in the same batch.
    pub cross_row_warnings: Vec<FieldWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Removed { id: RowId, alert: Alert },
    Kept { row: Row, alert: Alert },
}

impl DeleteOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            Self::Removed { alert, .. } | Self::Kept { alert, .. } => alert,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SaveOrchestrator {
    context: SaveContext,
}

impl SaveOrchestrator {
    pub fn new(context: SaveContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &SaveContext {
        &self.context
    }

    /// The body handed to the persist function: the row's fields plus the
    /// id field once the row exists on the server.
    pub fn payload(&self, row: &Row) -> Fields {
        let mut payload = row.fields.clone();
        match row.id.server_id() {
            Some(id) => {
                payload.insert(self.context.id_field.clone(), CellValue::Integer(id.get()));
            }
            None => {
                payload.remove(&self.context.id_field);
            }
        }
        payload
    }

    pub fn delete_payload(&self, row: &Row) -> Fields {
        let mut payload = self.payload(row);
        payload.insert(DELETED_FLAG.to_owned(), CellValue::Bool(true));
        payload
    }

    /// Saves a modified (or already saving) row. Persist failures never
    /// surface as `Err`; they come back as a row status plus an alert.
    pub fn save<P>(&self, mut row: Row, persister: &P) -> TransitionResult<SaveOutcome>
    where
        P: RowPersister + ?Sized,
    {
        if row.status == RowStatus::Modified {
            row.begin_save()?;
        }
        if row.status != RowStatus::Saving {
            return Err(TransitionError::NotDirty {
                id: row.id,
                status: row.status,
            });
        }
        let result = persister.persist(&self.payload(&row));
        self.reconcile(row, result)
    }

    /// Folds a persist result into a saving row.
    pub fn reconcile(
        &self,
        mut row: Row,
        result: Result<Fields, PersistFailure>,
    ) -> TransitionResult<SaveOutcome> {
        match result {
            Ok(server_fields) => {
                let id = match self.server_row_id(&server_fields) {
                    Some(id) => id,
                    None => {
                        if row.is_new() {
                            tracing::warn!(
                                row = %row.id,
                                id_field = %self.context.id_field,
                                "saved draft came back without a usable id; the next save creates another record"
                            );
                        }
                        row.id
                    }
                };
                row.apply_success(id, server_fields)?;
                tracing::debug!(row = %row.id, "row saved");
                Ok(SaveOutcome {
                    row,
                    alert: Alert::success(SAVE_SUCCESS_MESSAGE),
                    cross_row_warnings: Vec::new(),
                })
            }
            Err(failure) => {
                let classified = SaveFailure::classify(&failure);
                tracing::warn!(row = %row.id, error = %failure, "save rejected");
                self.reject(row, classified)
            }
        }
    }

    fn reject(&self, mut row: Row, failure: SaveFailure) -> TransitionResult<SaveOutcome> {
        let severity = severity_for(row.rejection_status());
        match failure {
            SaveFailure::Warnings(warnings) => {
                let own_id = row.id.server_id();
                let (own, others): (Vec<_>, Vec<_>) = warnings
                    .into_iter()
                    .partition(|warning| Some(warning.id) == own_id);
                let flagged = own.len() + others.len();
                row.apply_rejection(warning_messages(own.iter()))?;
                Ok(SaveOutcome {
                    row,
                    alert: Alert::new(
                        format!("{SAVE_FAILURE_PREFIX}: {flagged} row(s) need attention"),
                        severity,
                    ),
                    cross_row_warnings: others,
                })
            }
            SaveFailure::Detail(detail) => {
                row.apply_rejection(ValidationMessages::new())?;
                Ok(SaveOutcome {
                    row,
                    alert: Alert::new(detail, severity),
                    cross_row_warnings: Vec::new(),
                })
            }
            SaveFailure::FieldErrors { fields, message } => {
                let text = match fields.as_slice() {
                    [field] => format!(
                        "{SAVE_FAILURE_PREFIX}: {} {message}",
                        self.context.labels.label_for(field)
                    ),
                    _ if message.trim().is_empty() => SAVE_FAILURE_PREFIX.to_owned(),
                    _ => message.clone(),
                };
                let messages = fields
                    .into_iter()
                    .map(|field| (field, vec![message.clone()]))
                    .collect();
                row.apply_rejection(messages)?;
                Ok(SaveOutcome {
                    row,
                    alert: Alert::new(text, severity),
                    cross_row_warnings: Vec::new(),
                })
            }
            SaveFailure::Unknown(message) => {
                row.apply_failure()?;
                Ok(SaveOutcome {
                    row,
                    alert: Alert::error(format!("{SAVE_FAILURE_PREFIX}: {message}")),
                    cross_row_warnings: Vec::new(),
                })
            }
        }
    }

    /// Deletes a row. Drafts never reach the server.
    pub fn delete<P>(&self, mut row: Row, persister: &P) -> TransitionResult<DeleteOutcome>
    where
        P: RowPersister + ?Sized,
    {
        if row.status != RowStatus::Deleted {
            row.begin_delete()?;
        }
        if row.is_new() {
            return Ok(DeleteOutcome::Removed {
                id: row.id,
                alert: Alert::success(DELETE_SUCCESS_MESSAGE),
            });
        }
        let result = persister.persist(&self.delete_payload(&row));
        Ok(self.reconcile_delete(row, result))
    }

    pub fn reconcile_delete(&self, mut row: Row, result: Result<Fields, PersistFailure>) -> DeleteOutcome {
        match result {
            Ok(_) => {
                tracing::debug!(row = %row.id, "row deleted");
                DeleteOutcome::Removed {
                    id: row.id,
                    alert: Alert::success(DELETE_SUCCESS_MESSAGE),
                }
            }
            Err(failure) => {
                tracing::warn!(row = %row.id, error = %failure, "delete rejected");
                let reason = match SaveFailure::classify(&failure) {
                    SaveFailure::Warnings(warnings) => {
                        format!("{} row(s) need attention", warnings.len())
                    }
                    SaveFailure::Detail(detail) => detail,
                    SaveFailure::FieldErrors { message, .. } => message,
                    SaveFailure::Unknown(message) => message,
                };
                row.reject_delete();
                DeleteOutcome::Kept {
                    row,
                    alert: Alert::error(format!("{DELETE_FAILURE_PREFIX}: {reason}")),
                }
            }
        }
    }

    /// The row id named by server data, if it carries one.
    pub fn server_row_id(&self, fields: &Fields) -> Option<RowId> {
        fields
            .get(&self.context.id_field)
            .and_then(CellValue::as_i64)
            .map(RowId::server)
    }
}

/// Messages stored on rows named by a cross-row warning.
pub fn warning_messages<'a>(warnings: impl Iterator<Item = &'a FieldWarning>) -> ValidationMessages {
    let mut messages = ValidationMessages::new();
    for warning in warnings {
        let text = warning
            .message
            .clone()
            .unwrap_or_else(|| WARNING_FALLBACK.to_owned());
        for field in &warning.fields {
            messages.entry(field.clone()).or_default().push(text.clone());
        }
    }
    messages
}

const fn severity_for(status: RowStatus) -> Severity {
    match status {
        RowStatus::Warning => Severity::Warning,
        _ => Severity::Error,
    }
}
