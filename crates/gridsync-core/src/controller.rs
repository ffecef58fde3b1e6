// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Wires grid callbacks to row state, saves and persisted view state.
//!
//! Every callback returns the [`SyncEvent`]s the host has to act on. Work
//! that talks to the server comes in two halves (`begin_*` hands out a
//! ticket, `finish_*` folds the result back in) so hosts can run the call
//! wherever they like; the inline variants do both halves in one go.

use anyhow::Result;
use crossterm::event::KeyEvent;
use std::collections::{BTreeMap, BTreeSet};
use std::slice;
use std::time::Duration;

use crate::alert::{Alert, Severity};
use crate::grid::{GridApi, RowTransaction};
use crate::ids::{DraftIds, RowId};
use crate::keys::{self, CellFocus, KeyOptions, RowActivation};
use crate::persist::{FieldWarning, ListPage, PageFetcher, PersistFailure, RowPersister};
use crate::row::{Row, RowStatus};
use crate::save::{
    DELETE_SUCCESS_MESSAGE, DeleteOutcome, SaveContext, SaveOrchestrator, warning_messages,
};
use crate::store::KeyValueStore;
use crate::value::{CellValue, Fields};
use crate::view::{
    ColumnState, DEFAULT_PAGE_SIZE, Filter, FilterModel, ListRequest, SortOrder, TotalCount,
    ViewState, ViewStateStore, column_state_for_sort, filters_from_model, snap_page_size,
    sort_orders_from_columns, to_list_request,
};

pub const DEFAULT_BLANK_ROW_DELAY: Duration = Duration::from_millis(100);

const LOAD_FAILURE_PREFIX: &str = "Unable to load rows";
const DELETE_FAILURE_PREFIX: &str = "Unable to delete row";

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Namespaces persisted view state; unique per grid instance.
    pub grid_key: String,
    pub default_sort: Vec<SortOrder>,
    /// Fixed filters the user cannot edit.
    pub extra_filters: Vec<Filter>,
    pub row_navigation: bool,
    /// Column a blank row opens its editor on.
    pub first_editable_column: Option<String>,
    pub blank_row_delay: Duration,
    pub page_size: u32,
    pub save: SaveContext,
}

impl ControllerConfig {
    pub fn new(grid_key: impl Into<String>) -> Self {
        Self {
            grid_key: grid_key.into(),
            default_sort: Vec::new(),
            extra_filters: Vec::new(),
            row_navigation: false,
            first_editable_column: None,
            blank_row_delay: DEFAULT_BLANK_ROW_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
            save: SaveContext::default(),
        }
    }

    #[must_use]
    pub fn with_default_sort(mut self, orders: Vec<SortOrder>) -> Self {
        self.default_sort = orders;
        self
    }

    #[must_use]
    pub fn with_extra_filters(mut self, filters: Vec<Filter>) -> Self {
        self.extra_filters = filters;
        self
    }

    #[must_use]
    pub fn with_first_editable_column(mut self, column: impl Into<String>) -> Self {
        self.first_editable_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_row_navigation(mut self, enabled: bool) -> Self {
        self.row_navigation = enabled;
        self
    }

    #[must_use]
    pub fn with_save_context(mut self, save: SaveContext) -> Self {
        self.save = save;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Alert(Alert),
    FiltersChanged(Vec<Filter>),
    SortChanged(Vec<SortOrder>),
    /// The host should fetch this page.
    ListRequestChanged(ListRequest),
    RowsLoaded { count: usize, total: u64 },
    RowsRepainted(Vec<RowId>),
    RowRemoved(RowId),
    /// Call [`GridSyncController::append_blank_row`] after `delay`.
    BlankRowScheduled { delay: Duration },
    BlankRowAppended(RowId),
    ViewReset,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellEdit {
    pub row: RowId,
    pub field: String,
    pub value: CellValue,
}

impl CellEdit {
    pub fn new(row: RowId, field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            row,
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A save handed out by [`GridSyncController::begin_save`].
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    row: RowId,
    sequence: u64,
    payload: Fields,
}

impl SaveTicket {
    pub fn row(&self) -> RowId {
        self.row
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn payload(&self) -> &Fields {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTicket {
    row: RowId,
    payload: Fields,
}

impl DeleteTicket {
    pub fn row(&self) -> RowId {
        self.row
    }

    pub fn payload(&self) -> &Fields {
        &self.payload
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    sequence: u64,
    request: ListRequest,
}

impl FetchTicket {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn request(&self) -> &ListRequest {
        &self.request
    }
}

pub struct GridSyncController<S> {
    config: ControllerConfig,
    views: ViewStateStore<S>,
    view: ViewState,
    orchestrator: SaveOrchestrator,
    rows: Vec<Row>,
    drafts: DraftIds,
    /// Draft ids that have since been replaced by a server id.
    renamed: BTreeMap<RowId, RowId>,
    save_sequence: u64,
    latest_saves: BTreeMap<RowId, u64>,
    fetch_sequence: u64,
    blank_row_pending: bool,
    mounted: bool,
}

impl<S: KeyValueStore> GridSyncController<S> {
    pub fn new(config: ControllerConfig, store: S) -> Self {
        let mut view = ViewState::default();
        view.pagination.size = snap_page_size(config.page_size);
        view.filters = config.extra_filters.clone();
        view.sort_orders = config.default_sort.clone();
        Self {
            orchestrator: SaveOrchestrator::new(config.save.clone()),
            config,
            views: ViewStateStore::new(store),
            view,
            rows: Vec::new(),
            drafts: DraftIds::default(),
            renamed: BTreeMap::new(),
            save_sequence: 0,
            latest_saves: BTreeMap::new(),
            fetch_sequence: 0,
            blank_row_pending: false,
            mounted: true,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.position(id).map(|index| &self.rows[index])
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn list_request(&self) -> ListRequest {
        to_list_request(&self.view)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn blank_row_pending(&self) -> bool {
        self.blank_row_pending
    }

    /// Tears the controller down; every later call is a no-op.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.blank_row_pending = false;
        self.latest_saves.clear();
        tracing::debug!(grid = %self.config.grid_key, "grid unmounted");
    }

    // View state.

    pub fn on_grid_ready<G: GridApi + ?Sized>(&mut self, grid: &mut G) -> Result<Vec<SyncEvent>> {
        if !self.mounted {
            return Ok(Vec::new());
        }
        let persisted = self.views.load(&self.config.grid_key)?;

        self.view.filter_model = match persisted.filter_model {
            Some(model) => {
                grid.set_filter_model(Some(&model));
                model
            }
            None => FilterModel::new(),
        };
        self.view.filters = filters_from_model(&self.view.filter_model, &self.config.extra_filters);

        self.view.sort_orders = match persisted.column_state {
            Some(columns) => {
                grid.apply_column_state(&columns);
                sort_orders_from_columns(&columns)
            }
            None => {
                if !self.config.default_sort.is_empty() {
                    grid.apply_column_state(&column_state_for_sort(&self.config.default_sort));
                }
                self.config.default_sort.clone()
            }
        };
        self.view.pagination.page = 1;
        self.view.pagination.total = TotalCount::Unknown;
        tracing::debug!(grid = %self.config.grid_key, "grid ready");

        Ok(vec![
            SyncEvent::FiltersChanged(self.view.filters.clone()),
            SyncEvent::SortChanged(self.view.sort_orders.clone()),
            SyncEvent::ListRequestChanged(self.list_request()),
        ])
    }

    pub fn on_filter_changed<G: GridApi + ?Sized>(&mut self, grid: &mut G) -> Result<Vec<SyncEvent>> {
        if !self.mounted {
            return Ok(Vec::new());
        }
        let model = grid.filter_model();
        self.views.save_filter_model(&self.config.grid_key, &model)?;
        self.view.filters = filters_from_model(&model, &self.config.extra_filters);
        self.view.filter_model = model;
        self.restart_paging();
        Ok(vec![
            SyncEvent::FiltersChanged(self.view.filters.clone()),
            SyncEvent::ListRequestChanged(self.list_request()),
        ])
    }

    pub fn on_sort_changed<G: GridApi + ?Sized>(&mut self, grid: &mut G) -> Result<Vec<SyncEvent>> {
        if !self.mounted {
            return Ok(Vec::new());
        }
        let columns = grid.column_state();
        self.views.save_column_state(&self.config.grid_key, &columns)?;
        self.view.sort_orders = sort_orders_from_columns(&columns);
        self.restart_paging();
        Ok(vec![
            SyncEvent::SortChanged(self.view.sort_orders.clone()),
            SyncEvent::ListRequestChanged(self.list_request()),
        ])
    }

    /// Moves to another page. A size change starts over at page one.
    pub fn set_page(&mut self, page: u32, size: u32) -> Vec<SyncEvent> {
        if !self.mounted {
            return Vec::new();
        }
        let size = snap_page_size(size);
        let page = if size == self.view.pagination.size {
            page.max(1)
        } else {
            1
        };
        if page == self.view.pagination.page && size == self.view.pagination.size {
            return Vec::new();
        }
        self.view.pagination.page = page;
        self.view.pagination.size = size;
        self.view.invalidate_total();
        vec![SyncEvent::ListRequestChanged(self.list_request())]
    }

    /// Forgets persisted filters and sorts and returns the grid to its
    /// defaults.
    pub fn reset<G: GridApi + ?Sized>(&mut self, grid: &mut G) -> Result<Vec<SyncEvent>> {
        if !self.mounted {
            return Ok(Vec::new());
        }
        self.views.clear(&self.config.grid_key)?;
        grid.set_filter_model(None);
        let columns = reset_columns(&grid.column_state(), &self.config.default_sort);
        grid.apply_column_state(&columns);

        self.view.filter_model = FilterModel::new();
        self.view.filters = self.config.extra_filters.clone();
        self.view.sort_orders = self.config.default_sort.clone();
        self.restart_paging();
        Ok(vec![
            SyncEvent::ViewReset,
            SyncEvent::FiltersChanged(self.view.filters.clone()),
            SyncEvent::SortChanged(self.view.sort_orders.clone()),
            SyncEvent::ListRequestChanged(self.list_request()),
        ])
    }

    fn restart_paging(&mut self) {
        self.view.pagination.page = 1;
        self.view.invalidate_total();
    }

    // Fetching.

    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        if !self.mounted {
            return None;
        }
        self.fetch_sequence += 1;
        Some(FetchTicket {
            sequence: self.fetch_sequence,
            request: self.list_request(),
        })
    }

    /// Applies a fetched page unless a newer fetch has started since.
    pub fn finish_fetch<G: GridApi + ?Sized>(
        &mut self,
        grid: &mut G,
        ticket: FetchTicket,
        result: Result<ListPage, PersistFailure>,
    ) -> Vec<SyncEvent> {
        if !self.mounted {
            return Vec::new();
        }
        if ticket.sequence != self.fetch_sequence {
            tracing::debug!(
                sequence = ticket.sequence,
                latest = self.fetch_sequence,
                "dropping stale page"
            );
            return Vec::new();
        }
        match result {
            Ok(page) => self.load_rows(grid, page),
            Err(failure) => {
                tracing::warn!(grid = %self.config.grid_key, error = %failure, "page fetch failed");
                grid.hide_overlay();
                vec![SyncEvent::Alert(Alert::error(format!(
                    "{LOAD_FAILURE_PREFIX}: {}",
                    failure.message
                )))]
            }
        }
    }

    pub fn refresh<G, F>(&mut self, grid: &mut G, fetcher: &F) -> Vec<SyncEvent>
    where
        G: GridApi + ?Sized,
        F: PageFetcher + ?Sized,
    {
        let Some(ticket) = self.begin_fetch() else {
            return Vec::new();
        };
        let result = fetcher.fetch_page(&ticket.request);
        self.finish_fetch(grid, ticket, result)
    }

    /// Replaces the visible rows with a page from the server.
    pub fn load_rows<G: GridApi + ?Sized>(&mut self, grid: &mut G, page: ListPage) -> Vec<SyncEvent> {
        if !self.mounted {
            return Vec::new();
        }
        let orchestrator = &self.orchestrator;
        let drafts = &mut self.drafts;
        self.rows = page
            .items
            .into_iter()
            .map(|fields| {
                let id = orchestrator.server_row_id(&fields).unwrap_or_else(|| {
                    tracing::warn!("loaded row has no id; keeping it as a draft");
                    drafts.next_id()
                });
                Row::loaded(id, fields)
            })
            .collect();
        self.renamed.clear();
        self.latest_saves.clear();
        self.view.pagination.page = page.pagination.page.max(1);
        self.view.pagination.total = TotalCount::Fresh(page.pagination.total);

        grid.apply_transaction(RowTransaction::Reset(self.rows.clone()));
        grid.hide_overlay();

        let mut events = vec![SyncEvent::RowsLoaded {
            count: self.rows.len(),
            total: page.pagination.total,
        }];
        events.extend(self.schedule_blank_row());
        events
    }

    // Editing.

    /// Writes an edited cell and, when that leaves the row with unsaved
    /// changes, starts a save.
    pub fn begin_save<G: GridApi + ?Sized>(
        &mut self,
        grid: &mut G,
        edit: CellEdit,
    ) -> (Vec<SyncEvent>, Option<SaveTicket>) {
        if !self.mounted {
            return (Vec::new(), None);
        }
        let Some(index) = self.position(edit.row) else {
            tracing::debug!(row = %edit.row, "edit for a row that is no longer visible");
            return (Vec::new(), None);
        };
        let row = &mut self.rows[index];
        let before = row.status;
        let dirty = match row.write_field(&edit.field, edit.value) {
            Ok(dirty) => dirty,
            Err(error) => {
                tracing::debug!(%error, "edit ignored");
                return (Vec::new(), None);
            }
        };
        if !dirty {
            if row.status == before {
                return (Vec::new(), None);
            }
            grid.refresh_cells(slice::from_ref(&*row));
            return (vec![SyncEvent::RowsRepainted(vec![row.id])], None);
        }
        if let Err(error) = row.begin_save() {
            tracing::warn!(%error, "save not started");
            return (Vec::new(), None);
        }

        self.save_sequence += 1;
        let ticket = SaveTicket {
            row: row.id,
            sequence: self.save_sequence,
            payload: self.orchestrator.payload(row),
        };
        self.latest_saves.insert(row.id, ticket.sequence);
        grid.refresh_cells(slice::from_ref(&*row));
        (vec![SyncEvent::RowsRepainted(vec![row.id])], Some(ticket))
    }

    /// Folds a persist result back into the row it was started for.
    pub fn finish_save<G: GridApi + ?Sized>(
        &mut self,
        grid: &mut G,
        ticket: SaveTicket,
        result: Result<Fields, PersistFailure>,
    ) -> Vec<SyncEvent> {
        if !self.mounted {
            return Vec::new();
        }
        let Some(index) = self.position(ticket.row) else {
            tracing::debug!(row = %ticket.row, "save finished for a row that is gone");
            return Vec::new();
        };
        let previous = self.rows[index].id;
        let current = self.latest_saves.get(&previous) == Some(&ticket.sequence)
            && self.rows[index].status == RowStatus::Saving;
        if !current {
            return self.settle_superseded(grid, index, ticket, result);
        }
        self.latest_saves.remove(&previous);

        let outcome = match self.orchestrator.reconcile(self.rows[index].clone(), result) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(%error, "save result not applied");
                return Vec::new();
            }
        };
        self.rows[index] = outcome.row;
        let mut repainted = vec![self.rows[index].id];
        self.show_row(grid, previous, index);
        repainted.extend(self.flag_cross_row_warnings(grid, &outcome.cross_row_warnings));
        vec![
            SyncEvent::RowsRepainted(repainted),
            SyncEvent::Alert(outcome.alert),
        ]
    }

    /// Grid edit-stop callback with the save run inline.
    pub fn on_cell_edit_stop<G, P>(&mut self, grid: &mut G, persister: &P, edit: CellEdit) -> Vec<SyncEvent>
    where
        G: GridApi + ?Sized,
        P: RowPersister + ?Sized,
    {
        let (mut events, ticket) = self.begin_save(grid, edit);
        if let Some(ticket) = ticket {
            let result = persister.persist(&ticket.payload);
            events.extend(self.finish_save(grid, ticket, result));
        }
        events
    }

    /// The row moved on while this save was in flight. Failures are
    /// dropped; a success still records what the server committed, without
    /// touching the status a newer save or edit owns.
    fn settle_superseded<G: GridApi + ?Sized>(
        &mut self,
        grid: &mut G,
        index: usize,
        ticket: SaveTicket,
        result: Result<Fields, PersistFailure>,
    ) -> Vec<SyncEvent> {
        let server_fields = match result {
            Ok(server_fields) => server_fields,
            Err(failure) => {
                tracing::debug!(
                    row = %ticket.row,
                    sequence = ticket.sequence,
                    error = %failure,
                    "dropping superseded save failure"
                );
                return Vec::new();
            }
        };
        let previous = self.rows[index].id;
        match self.latest_saves.get(&previous).copied() {
            Some(latest) if latest == ticket.sequence => {
                self.latest_saves.remove(&previous);
            }
            Some(_) => {}
            // A newer save already settled; only a missing server id is news.
            None if !self.rows[index].is_new() => {
                tracing::debug!(row = %previous, sequence = ticket.sequence, "dropping superseded save");
                return Vec::new();
            }
            None => {}
        }
        let id = self
            .orchestrator
            .server_row_id(&server_fields)
            .unwrap_or(previous);
        let mut committed = ticket.payload;
        committed.extend(server_fields);
        self.rows[index].adopt_committed(id, committed);
        tracing::debug!(row = %id, sequence = ticket.sequence, "superseded save committed");
        self.show_row(grid, previous, index);
        vec![SyncEvent::RowsRepainted(vec![id])]
    }

    fn flag_cross_row_warnings<G: GridApi + ?Sized>(
        &mut self,
        grid: &mut G,
        warnings: &[FieldWarning],
    ) -> Vec<RowId> {
        let ids: BTreeSet<RowId> = warnings
            .iter()
            .map(|warning| RowId::Server(warning.id))
            .collect();
        let mut flagged = Vec::new();
        for id in ids {
            let Some(row) = self.rows.iter_mut().find(|row| row.id == id) else {
                continue;
            };
            let messages = warning_messages(
                warnings
                    .iter()
                    .filter(|warning| RowId::Server(warning.id) == id),
            );
            row.flag_warning(messages);
            grid.refresh_cells(slice::from_ref(&*row));
            flagged.push(id);
        }
        flagged
    }

    /// Repaints a row, swapping it in under its new id if it changed.
    fn show_row<G: GridApi + ?Sized>(&mut self, grid: &mut G, previous: RowId, index: usize) {
        let current = self.rows[index].id;
        if current == previous {
            grid.refresh_cells(slice::from_ref(&self.rows[index]));
            return;
        }
        self.renamed.insert(previous, current);
        if let Some(sequence) = self.latest_saves.remove(&previous) {
            self.latest_saves.insert(current, sequence);
        }
        grid.apply_transaction(RowTransaction::Replace {
            previous,
            row: self.rows[index].clone(),
        });
    }

    /// Commits the active editor and moves to the next (or previous) cell.
    pub fn advance_editor<G: GridApi + ?Sized>(&self, grid: &mut G, backwards: bool) -> bool {
        if !self.mounted {
            return false;
        }
        grid.stop_editing();
        if !grid.tab_to_next_cell(backwards) {
            return false;
        }
        match grid.focused_cell() {
            Some(cell) => {
                grid.start_editing_cell(cell.row_index, &cell.col_key);
                true
            }
            None => false,
        }
    }

    /// Grid key-down hook: returns whether the grid should ignore the key.
    /// `on_activate` runs at most once, for Enter on a navigable row.
    pub fn suppress_keyboard_event<T: Clone>(
        &self,
        key: &KeyEvent,
        focus: &CellFocus<T>,
        row: Option<RowId>,
        on_activate: Option<&mut dyn FnMut(RowActivation<T>)>,
    ) -> bool {
        if !self.mounted {
            return false;
        }
        let options = KeyOptions {
            row_navigation: self.config.row_navigation,
            row_activate_available: on_activate.is_some(),
            target_row: row.map(|id| self.resolve(id)),
        };
        let decision = keys::decide(key, focus, options);
        if let (Some(activation), Some(callback)) = (decision.activate, on_activate) {
            callback(activation);
        }
        decision.suppress
    }

    // Deleting and blank rows.

    pub fn begin_delete<G: GridApi + ?Sized>(
        &mut self,
        grid: &mut G,
        id: RowId,
    ) -> (Vec<SyncEvent>, Option<DeleteTicket>) {
        if !self.mounted {
            return (Vec::new(), None);
        }
        let Some(index) = self.position(id) else {
            tracing::debug!(row = %id, "delete for a row that is no longer visible");
            return (Vec::new(), None);
        };
        let row = &mut self.rows[index];
        if let Err(error) = row.begin_delete() {
            tracing::warn!(%error, "delete refused");
            let alert = Alert::new(format!("{DELETE_FAILURE_PREFIX}: {error}"), Severity::Warning);
            return (vec![SyncEvent::Alert(alert)], None);
        }
        if row.is_new() {
            let events = self.remove_row(grid, index, Alert::success(DELETE_SUCCESS_MESSAGE));
            return (events, None);
        }
        grid.refresh_cells(slice::from_ref(&*row));
        let ticket = DeleteTicket {
            row: row.id,
            payload: self.orchestrator.delete_payload(row),
        };
        (vec![SyncEvent::RowsRepainted(vec![ticket.row])], Some(ticket))
    }

    pub fn finish_delete<G: GridApi + ?Sized>(
        &mut self,
        grid: &mut G,
        ticket: DeleteTicket,
        result: Result<Fields, PersistFailure>,
    ) -> Vec<SyncEvent> {
        if !self.mounted {
            return Vec::new();
        }
        let Some(index) = self
            .position(ticket.row)
            .filter(|index| self.rows[*index].status == RowStatus::Deleted)
        else {
            tracing::debug!(row = %ticket.row, "delete finished for a row that was reloaded");
            return Vec::new();
        };
        match self
            .orchestrator
            .reconcile_delete(self.rows[index].clone(), result)
        {
            DeleteOutcome::Removed { alert, .. } => self.remove_row(grid, index, alert),
            DeleteOutcome::Kept { row, alert } => {
                let id = row.id;
                self.rows[index] = row;
                grid.refresh_cells(slice::from_ref(&self.rows[index]));
                vec![SyncEvent::RowsRepainted(vec![id]), SyncEvent::Alert(alert)]
            }
        }
    }

    pub fn delete_row<G, P>(&mut self, grid: &mut G, persister: &P, id: RowId) -> Vec<SyncEvent>
    where
        G: GridApi + ?Sized,
        P: RowPersister + ?Sized,
    {
        let (mut events, ticket) = self.begin_delete(grid, id);
        if let Some(ticket) = ticket {
            let result = persister.persist(&ticket.payload);
            events.extend(self.finish_delete(grid, ticket, result));
        }
        events
    }

    fn remove_row<G: GridApi + ?Sized>(&mut self, grid: &mut G, index: usize, alert: Alert) -> Vec<SyncEvent> {
        let row = self.rows.remove(index);
        self.latest_saves.remove(&row.id);
        grid.apply_transaction(RowTransaction::Remove(vec![row.id]));
        let mut events = vec![SyncEvent::RowRemoved(row.id), SyncEvent::Alert(alert)];
        events.extend(self.schedule_blank_row());
        events
    }

    fn schedule_blank_row(&mut self) -> Option<SyncEvent> {
        if !self.rows.is_empty() || self.blank_row_pending {
            return None;
        }
        self.blank_row_pending = true;
        Some(SyncEvent::BlankRowScheduled {
            delay: self.config.blank_row_delay,
        })
    }

    /// Runs a scheduled blank row. Skipped when rows showed up meanwhile.
    pub fn append_blank_row<G: GridApi + ?Sized>(&mut self, grid: &mut G) -> Vec<SyncEvent> {
        if !self.mounted || !self.blank_row_pending {
            return Vec::new();
        }
        self.blank_row_pending = false;
        if !self.rows.is_empty() {
            tracing::debug!("grid has rows again; blank row not needed");
            return Vec::new();
        }
        self.add_row(grid)
    }

    /// Appends a draft row and opens its first editable cell.
    pub fn add_row<G: GridApi + ?Sized>(&mut self, grid: &mut G) -> Vec<SyncEvent> {
        if !self.mounted {
            return Vec::new();
        }
        let row = Row::blank(self.drafts.next_id());
        let id = row.id;
        self.rows.push(row.clone());
        grid.apply_transaction(RowTransaction::Add(vec![row]));
        if let Some(column) = &self.config.first_editable_column {
            grid.start_editing_cell(self.rows.len() - 1, column);
        }
        vec![SyncEvent::BlankRowAppended(id)]
    }

    fn resolve(&self, id: RowId) -> RowId {
        self.renamed.get(&id).copied().unwrap_or(id)
    }

    fn position(&self, id: RowId) -> Option<usize> {
        let id = self.resolve(id);
        self.rows.iter().position(|row| row.id == id)
    }
}

/// Clears every sort and applies `default_sort` on top.
fn reset_columns(current: &[ColumnState], default_sort: &[SortOrder]) -> Vec<ColumnState> {
    let mut columns: Vec<ColumnState> = current
        .iter()
        .map(|column| ColumnState::unsorted(column.col_id.clone()))
        .collect();
    for sorted in column_state_for_sort(default_sort) {
        match columns.iter_mut().find(|column| column.col_id == sorted.col_id) {
            Some(column) => *column = sorted,
            None => columns.push(sorted),
        }
    }
    columns
}
