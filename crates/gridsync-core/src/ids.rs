// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_key {
    ($name:ident, $repr:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name($repr);

        impl $name {
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }
    };
}

row_key!(ServerId, i64);
row_key!(DraftId, u64);

/// Identity of a grid row: a server primary key once persisted, a
/// client placeholder before that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RowId {
    Server(ServerId),
    Draft(DraftId),
}

impl RowId {
    pub const fn server(value: i64) -> Self {
        Self::Server(ServerId::new(value))
    }

    pub const fn draft(value: u64) -> Self {
        Self::Draft(DraftId::new(value))
    }

    pub const fn is_draft(self) -> bool {
        matches!(self, Self::Draft(_))
    }

    pub const fn server_id(self) -> Option<ServerId> {
        match self {
            Self::Server(id) => Some(id),
            Self::Draft(_) => None,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{}", id.get()),
            Self::Draft(id) => write!(f, "draft-{}", id.get()),
        }
    }
}

/// Hands out draft ids for blank rows. Ids are never reused within one
/// generator.
#[derive(Debug, Clone, Default)]
pub struct DraftIds {
    next: u64,
}

impl DraftIds {
    pub fn next_id(&mut self) -> RowId {
        self.next += 1;
        RowId::draft(self.next)
    }
}
