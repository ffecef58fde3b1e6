// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::RowId;
use crate::row::Row;
use crate::view::{ColumnState, FilterModel};

/// Row-set change pushed to the grid widget.
#[derive(Debug, Clone, PartialEq)]
pub enum RowTransaction {
    Add(Vec<Row>),
    Remove(Vec<RowId>),
    /// A row whose identity changed, e.g. a draft that got its server id.
    Replace { previous: RowId, row: Row },
    /// A freshly loaded page replaces everything visible.
    Reset(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusedCell {
    pub row_index: usize,
    pub col_key: String,
}

impl FocusedCell {
    pub fn new(row_index: usize, col_key: impl Into<String>) -> Self {
        Self {
            row_index,
            col_key: col_key.into(),
        }
    }
}

/// The grid widget as seen by the controller. Implemented by the host's
/// rendering layer; the engine never draws anything itself.
pub trait GridApi {
    fn apply_transaction(&mut self, transaction: RowTransaction);
    fn refresh_cells(&mut self, rows: &[Row]);
    fn start_editing_cell(&mut self, row_index: usize, col_key: &str);
    fn stop_editing(&mut self);
    /// Returns false when there is no cell to move to.
    fn tab_to_next_cell(&mut self, backwards: bool) -> bool;
    fn focused_cell(&self) -> Option<FocusedCell>;
    fn set_filter_model(&mut self, model: Option<&FilterModel>);
    fn filter_model(&self) -> FilterModel;
    fn apply_column_state(&mut self, state: &[ColumnState]);
    fn column_state(&self) -> Vec<ColumnState>;
    fn hide_overlay(&mut self);
}
