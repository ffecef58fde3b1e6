// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ids::RowId;
use crate::value::{CellValue, Fields, changed_fields, is_equal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Pristine,
    Modified,
    Saving,
    Success,
    Warning,
    Error,
    Deleted,
}

impl RowStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pristine => "pristine",
            Self::Modified => "modified",
            Self::Saving => "saving",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Deleted => "deleted",
        }
    }

    pub const fn carries_messages(self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

/// Field name -> messages shown next to the offending cell.
pub type ValidationMessages = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    NotDirty { id: RowId, status: RowStatus },
    NotSaving { id: RowId, status: RowStatus },
    SaveInFlight { id: RowId },
    AlreadyDeleted { id: RowId },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDirty { id, status } => {
                write!(f, "row {id} has no unsaved edits (status {})", status.as_str())
            }
            Self::NotSaving { id, status } => write!(
                f,
                "row {id} has no save in flight (status {})",
                status.as_str()
            ),
            Self::SaveInFlight { id } => {
                write!(f, "row {id} is saving; wait for the save to finish")
            }
            Self::AlreadyDeleted { id } => write!(f, "row {id} is already being deleted"),
        }
    }
}

impl std::error::Error for TransitionError {}

pub type TransitionResult<T> = std::result::Result<T, TransitionError>;

/// One editable record and its place in the edit lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub fields: Fields,
    pub persisted: Fields,
    pub status: RowStatus,
    pub validation_messages: ValidationMessages,
    pub modified: bool,
}

impl Row {
    /// A row loaded from the server; its fields are the persisted baseline.
    pub fn loaded(id: RowId, fields: Fields) -> Self {
        Self {
            id,
            persisted: fields.clone(),
            fields,
            status: RowStatus::Pristine,
            validation_messages: ValidationMessages::new(),
            modified: false,
        }
    }

    /// A blank row appended by the client; nothing has been persisted yet.
    pub fn blank(id: RowId) -> Self {
        Self::loaded(id, Fields::new())
    }

    pub fn is_new(&self) -> bool {
        self.id.is_draft()
    }

    pub fn is_dirty(&self) -> bool {
        self.modified && !changed_fields(&self.fields, &self.persisted).is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&CellValue> {
        self.fields.get(name)
    }

    /// Applies a cell edit. Returns whether the edit left the row with
    /// unsaved changes that warrant a save.
    pub fn write_field(&mut self, name: &str, value: CellValue) -> TransitionResult<bool> {
        if self.status == RowStatus::Deleted {
            return Err(TransitionError::AlreadyDeleted { id: self.id });
        }
        if self
            .fields
            .get(name)
            .is_some_and(|current| is_equal(current, &value))
        {
            return Ok(false);
        }

        self.fields.insert(name.to_owned(), value);
        let dirty = !changed_fields(&self.fields, &self.persisted).is_empty();
        if dirty {
            self.status = RowStatus::Modified;
            self.modified = true;
            self.validation_messages.clear();
        } else {
            self.modified = false;
            if matches!(self.status, RowStatus::Modified | RowStatus::Saving) {
                self.status = RowStatus::Pristine;
            }
        }
        tracing::debug!(row = %self.id, field = name, dirty, "cell write");
        Ok(dirty)
    }

    pub fn begin_save(&mut self) -> TransitionResult<()> {
        if self.status != RowStatus::Modified || !self.is_dirty() {
            return Err(TransitionError::NotDirty {
                id: self.id,
                status: self.status,
            });
        }
        self.status = RowStatus::Saving;
        Ok(())
    }

    /// Merges server-canonical fields and marks the row saved.
    pub fn apply_success(&mut self, id: RowId, server_fields: Fields) -> TransitionResult<()> {
        if self.status != RowStatus::Saving {
            return Err(TransitionError::NotSaving {
                id: self.id,
                status: self.status,
            });
        }
        self.id = id;
        self.fields.extend(server_fields);
        self.persisted = self.fields.clone();
        self.status = RowStatus::Success;
        self.modified = false;
        self.validation_messages.clear();
        Ok(())
    }

    /// Records a server rejection; warning for drafts, error for persisted
    /// rows. The row stays editable.
    pub fn apply_rejection(&mut self, messages: ValidationMessages) -> TransitionResult<RowStatus> {
        if self.status != RowStatus::Saving {
            return Err(TransitionError::NotSaving {
                id: self.id,
                status: self.status,
            });
        }
        self.status = self.rejection_status();
        self.validation_messages = messages;
        Ok(self.status)
    }

    /// Records a failure that is not a validation problem (transport,
    /// unknown shape). Always `error`, whatever the row's persistence.
    pub fn apply_failure(&mut self) -> TransitionResult<()> {
        if self.status != RowStatus::Saving {
            return Err(TransitionError::NotSaving {
                id: self.id,
                status: self.status,
            });
        }
        self.status = RowStatus::Error;
        self.validation_messages.clear();
        Ok(())
    }

    /// Marks a row other than the saving one with a cross-row warning.
    pub fn flag_warning(&mut self, messages: ValidationMessages) {
        if self.status == RowStatus::Saving {
            return;
        }
        self.status = RowStatus::Warning;
        self.validation_messages = messages;
    }

    pub const fn rejection_status(&self) -> RowStatus {
        if self.id.is_draft() {
            RowStatus::Warning
        } else {
            RowStatus::Error
        }
    }

    pub fn begin_delete(&mut self) -> TransitionResult<()> {
        match self.status {
            RowStatus::Saving => Err(TransitionError::SaveInFlight { id: self.id }),
            RowStatus::Deleted => Err(TransitionError::AlreadyDeleted { id: self.id }),
            _ => {
                self.status = RowStatus::Deleted;
                Ok(())
            }
        }
    }

    /// The delete did not take effect; the row stays visible with a warning.
    pub fn reject_delete(&mut self) {
        self.status = RowStatus::Warning;
    }

    /// Adopts what a superseded save committed. Status is left alone while
    /// a newer save is in flight.
    pub fn adopt_committed(&mut self, id: RowId, committed: Fields) {
        self.id = id;
        // Server-filled columns (the id, defaults) the user never touched.
        for (name, value) in &committed {
            self.fields
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self.persisted = committed;
        if matches!(self.status, RowStatus::Saving | RowStatus::Deleted) {
            return;
        }
        let dirty = !changed_fields(&self.fields, &self.persisted).is_empty();
        self.modified = dirty;
        if dirty {
            self.status = RowStatus::Modified;
        } else if self.status == RowStatus::Modified {
            self.status = RowStatus::Success;
        }
    }
}
