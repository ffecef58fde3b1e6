// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Filter, sort and pagination state for one grid: persisted through a
//! [`KeyValueStore`] and flattened into the list request.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::store::KeyValueStore;

pub const PAGE_SIZES: [u32; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 25;

const FILTER_KEY_SUFFIX: &str = "filter";
const COLUMN_KEY_SUFFIX: &str = "column";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// One column of the grid's own column state, in the grid's JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnState {
    pub col_id: String,
    #[serde(default)]
    pub sort: Option<SortDirection>,
    #[serde(default)]
    pub sort_index: Option<u32>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

impl ColumnState {
    pub fn unsorted(col_id: impl Into<String>) -> Self {
        Self {
            col_id: col_id.into(),
            sort: None,
            sort_index: None,
            hide: false,
            width: None,
        }
    }

    pub fn sorted(col_id: impl Into<String>, direction: SortDirection, index: u32) -> Self {
        Self {
            sort: Some(direction),
            sort_index: Some(index),
            ..Self::unsorted(col_id)
        }
    }
}

/// Per-column filter as the grid reports it. Keys the engine does not
/// interpret (`dateFrom`, `filterTo`, ...) ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
    #[serde(rename = "type")]
    pub operator: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub filter: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilterDescriptor {
    pub fn new(operator: impl Into<String>, operand: impl Into<Value>) -> Self {
        Self {
            filter_type: None,
            operator: operator.into(),
            filter: operand.into(),
            extra: Map::new(),
        }
    }

    /// The value sent to the server: `filter`, or `dateFrom` for date
    /// filters that carry no plain operand.
    pub fn operand(&self) -> Value {
        if !self.filter.is_null() {
            return self.filter.clone();
        }
        self.extra.get("dateFrom").cloned().unwrap_or(Value::Null)
    }
}

/// Column -> filter, the grid's native filter model.
pub type FilterModel = BTreeMap<String, FilterDescriptor>;

/// Flattened filter sent to the list API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// The single translation from the grid's filter model to request filters.
/// Fixed `extra` filters replace any user filter on the same field.
pub fn filters_from_model(model: &FilterModel, extra: &[Filter]) -> Vec<Filter> {
    let mut filters: Vec<Filter> = model
        .iter()
        .filter(|(field, _)| !extra.iter().any(|fixed| &fixed.field == *field))
        .map(|(field, descriptor)| Filter {
            field: field.clone(),
            operator: descriptor.operator.clone(),
            value: descriptor.operand(),
        })
        .collect();
    filters.extend(extra.iter().cloned());
    filters
}

/// Active sorts in priority order. Columns without a sort index keep
/// their relative order after indexed ones.
pub fn sort_orders_from_columns(columns: &[ColumnState]) -> Vec<SortOrder> {
    let mut sorted: Vec<(&ColumnState, SortDirection)> = columns
        .iter()
        .filter_map(|column| column.sort.map(|direction| (column, direction)))
        .collect();
    sorted.sort_by_key(|(column, _)| column.sort_index.unwrap_or(u32::MAX));
    sorted
        .into_iter()
        .map(|(column, direction)| SortOrder::new(column.col_id.clone(), direction))
        .collect()
}

/// Column state that applies `orders` with the first entry at priority 0.
pub fn column_state_for_sort(orders: &[SortOrder]) -> Vec<ColumnState> {
    orders
        .iter()
        .zip(0_u32..)
        .map(|(order, index)| ColumnState::sorted(order.field.clone(), order.direction, index))
        .collect()
}

/// Nearest allowed page size; ties go to the smaller size.
pub fn snap_page_size(size: u32) -> u32 {
    PAGE_SIZES
        .iter()
        .copied()
        .min_by_key(|allowed| allowed.abs_diff(size))
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalCount {
    Unknown,
    Fresh(u64),
    Stale(u64),
}

impl TotalCount {
    pub const fn value(self) -> Option<u64> {
        match self {
            Self::Unknown => None,
            Self::Fresh(total) | Self::Stale(total) => Some(total),
        }
    }

    pub const fn is_fresh(self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    #[must_use]
    pub const fn stale(self) -> Self {
        match self {
            Self::Fresh(total) => Self::Stale(total),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
    pub total: TotalCount,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            total: TotalCount::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    pub filter_model: FilterModel,
    pub filters: Vec<Filter>,
    pub sort_orders: Vec<SortOrder>,
    pub pagination: Pagination,
}

impl ViewState {
    /// Any change to what is being listed invalidates the known total.
    pub fn invalidate_total(&mut self) {
        self.pagination.total = self.pagination.total.stale();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    pub page: u32,
    pub size: u32,
    pub sort_orders: Vec<SortOrder>,
    pub filters: Vec<Filter>,
}

pub fn to_list_request(view: &ViewState) -> ListRequest {
    ListRequest {
        page: view.pagination.page.max(1),
        size: snap_page_size(view.pagination.size),
        sort_orders: view.sort_orders.clone(),
        filters: view.filters.clone(),
    }
}

/// The part of a view that survives a reload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistedView {
    pub filter_model: Option<FilterModel>,
    pub column_state: Option<Vec<ColumnState>>,
}

pub fn filter_key(grid_key: &str) -> String {
    format!("{grid_key}-{FILTER_KEY_SUFFIX}")
}

pub fn column_key(grid_key: &str) -> String {
    format!("{grid_key}-{COLUMN_KEY_SUFFIX}")
}

#[derive(Debug, Clone)]
pub struct ViewStateStore<S> {
    store: S,
}

impl<S: KeyValueStore> ViewStateStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Missing or unreadable entries come back as `None`; a broken session
    /// entry must not keep the grid from mounting.
    pub fn load(&self, grid_key: &str) -> Result<PersistedView> {
        Ok(PersistedView {
            filter_model: self.load_entry(&filter_key(grid_key))?,
            column_state: self.load_entry(&column_key(grid_key))?,
        })
    }

    pub fn save(&self, grid_key: &str, view: &PersistedView) -> Result<()> {
        if let Some(model) = &view.filter_model {
            self.save_filter_model(grid_key, model)?;
        }
        if let Some(columns) = &view.column_state {
            self.save_column_state(grid_key, columns)?;
        }
        Ok(())
    }

    pub fn save_filter_model(&self, grid_key: &str, model: &FilterModel) -> Result<()> {
        self.save_entry(&filter_key(grid_key), model)
    }

    pub fn save_column_state(&self, grid_key: &str, columns: &[ColumnState]) -> Result<()> {
        self.save_entry(&column_key(grid_key), &columns)
    }

    pub fn clear(&self, grid_key: &str) -> Result<()> {
        self.store.clear(&filter_key(grid_key))?;
        self.store.clear(&column_key(grid_key))?;
        tracing::info!(grid = grid_key, "view state cleared");
        Ok(())
    }

    fn load_entry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.load(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                tracing::warn!(key, %error, "ignoring unreadable view state");
                Ok(None)
            }
        }
    }

    fn save_entry<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).with_context(|| format!("encode {key}"))?;
        self.store.save(key, &raw)?;
        tracing::info!(key, "view state persisted");
        Ok(())
    }
}
