// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use gridsync_core::{
    ColumnState, FilterModel, FocusedCell, GridApi, GridSyncController, JsonFileStore, Row,
    RowTransaction, Severity, SyncEvent, ViewStateStore,
};
use gridsync_http::ApiClient;
use serde_json::json;
use std::collections::BTreeSet;

use crate::config::Config;

/// A grid with no screen behind it. Holds whatever the controller pushes so
/// the CLI can print it afterwards.
#[derive(Debug, Default)]
pub struct ConsoleGrid {
    rows: Vec<Row>,
    filter_model: FilterModel,
    column_state: Vec<ColumnState>,
    focused: Option<FocusedCell>,
}

impl ConsoleGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tab-separated table; the id column comes first, the rest in name
    /// order.
    pub fn render(&self, id_field: &str) -> String {
        let columns: BTreeSet<&str> = self
            .rows
            .iter()
            .flat_map(|row| row.fields.keys().map(String::as_str))
            .filter(|name| *name != id_field)
            .collect();

        let mut out = String::new();
        let header: Vec<&str> = std::iter::once(id_field).chain(columns.iter().copied()).collect();
        out.push_str(&header.join("\t"));
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = header
                .iter()
                .map(|name| row.field(name).map(|value| value.display()).unwrap_or_default())
                .collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        out
    }
}

impl GridApi for ConsoleGrid {
    fn apply_transaction(&mut self, transaction: RowTransaction) {
        match transaction {
            RowTransaction::Add(rows) => self.rows.extend(rows),
            RowTransaction::Remove(ids) => self.rows.retain(|row| !ids.contains(&row.id)),
            RowTransaction::Replace { previous, row } => {
                if let Some(slot) = self.rows.iter_mut().find(|slot| slot.id == previous) {
                    *slot = row;
                }
            }
            RowTransaction::Reset(rows) => self.rows = rows,
        }
    }

    fn refresh_cells(&mut self, rows: &[Row]) {
        for row in rows {
            if let Some(slot) = self.rows.iter_mut().find(|slot| slot.id == row.id) {
                *slot = row.clone();
            }
        }
    }

    fn start_editing_cell(&mut self, row_index: usize, col_key: &str) {
        self.focused = Some(FocusedCell::new(row_index, col_key));
    }

    fn stop_editing(&mut self) {}

    fn tab_to_next_cell(&mut self, _backwards: bool) -> bool {
        false
    }

    fn focused_cell(&self) -> Option<FocusedCell> {
        self.focused.clone()
    }

    fn set_filter_model(&mut self, model: Option<&FilterModel>) {
        self.filter_model = model.cloned().unwrap_or_default();
    }

    fn filter_model(&self) -> FilterModel {
        self.filter_model.clone()
    }

    fn apply_column_state(&mut self, state: &[ColumnState]) {
        for incoming in state {
            match self
                .column_state
                .iter_mut()
                .find(|column| column.col_id == incoming.col_id)
            {
                Some(column) => *column = incoming.clone(),
                None => self.column_state.push(incoming.clone()),
            }
        }
    }

    fn column_state(&self) -> Vec<ColumnState> {
        self.column_state.clone()
    }

    fn hide_overlay(&mut self) {}
}

/// Which page `--list` asks for; `None` keeps the stored view's choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageChoice {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

fn api_client(config: &Config) -> Result<ApiClient> {
    Ok(ApiClient::new(config.base_url(), config.resource(), config.timeout()?)?
        .with_id_field(config.id_field()))
}

fn view_store(config: &Config) -> Result<JsonFileStore> {
    Ok(JsonFileStore::new(config.view_state_path()?))
}

pub fn check(config: &Config) -> Result<String> {
    let client = api_client(config)?;
    let total = client.ping()?;
    tracing::info!(base_url = %client.base_url(), total, "api reachable");
    Ok(format!(
        "{} answered; {} has {total} row(s)",
        client.base_url(),
        client.resource()
    ))
}

/// Mounts a grid against the stored view, fetches one page and prints it.
pub fn list(config: &Config, choice: PageChoice) -> Result<String> {
    let client = api_client(config)?;
    let mut controller = GridSyncController::new(config.controller_config()?, view_store(config)?);
    let mut grid = ConsoleGrid::new();

    let mut events = controller.on_grid_ready(&mut grid)?;
    // A size change starts over at page one, so the size goes first.
    if let Some(size) = choice.size {
        let page = controller.view().pagination.page;
        events.extend(controller.set_page(page, size));
    }
    if let Some(page) = choice.page {
        let size = controller.view().pagination.size;
        events.extend(controller.set_page(page, size));
    }
    events.extend(controller.refresh(&mut grid, &client));

    let mut summary = None;
    for event in events {
        match event {
            SyncEvent::Alert(alert) if alert.severity == Severity::Error => bail!(alert.message),
            SyncEvent::Alert(alert) => tracing::info!(message = %alert.message, "grid alert"),
            SyncEvent::RowsLoaded { count, total } => summary = Some((count, total)),
            _ => {}
        }
    }

    let mut out = grid.render(config.id_field());
    if let Some((count, total)) = summary {
        let pagination = &controller.view().pagination;
        out.push_str(&format!(
            "page {} ({} per page): {count} of {total} row(s)\n",
            pagination.page, pagination.size
        ));
    }
    Ok(out)
}

pub fn show_view(config: &Config) -> Result<String> {
    let views = ViewStateStore::new(view_store(config)?);
    let view = views.load(config.grid_key())?;
    let rendered = json!({
        "grid": config.grid_key(),
        "filterModel": view.filter_model,
        "columnState": view.column_state,
    });
    Ok(serde_json::to_string_pretty(&rendered)?)
}

pub fn reset_view(config: &Config) -> Result<String> {
    let views = ViewStateStore::new(view_store(config)?);
    views.clear(config.grid_key())?;
    Ok(format!("cleared stored view for grid {}", config.grid_key()))
}
