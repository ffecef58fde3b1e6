// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use gridsync_core::{
    Alert, CellEdit, CellFocus, CellValue, ColumnState, ControllerConfig, Filter,
    FilterDescriptor, FilterModel, GridSyncController, KeyValueStore, MemoryStore, PersistFailure,
    PersistedView, RowActivation, RowId, RowStatus, RowTransaction, Severity, SortDirection,
    SortOrder, SyncEvent, TotalCount, ViewStateStore,
};
use gridsync_testkit::{
    FakeGrid, FakeServer, GridCall, OrderFaker, fields, list_page, loaded_row,
};
use serde_json::json;
use std::time::Duration;

const COLUMNS: [&str; 4] = ["name", "amount_cents", "status", "due"];

fn orders_config() -> ControllerConfig {
    ControllerConfig::new("orders")
        .with_default_sort(vec![SortOrder::new("name", SortDirection::Asc)])
        .with_first_editable_column("name")
}

fn controller(store: &MemoryStore) -> GridSyncController<MemoryStore> {
    GridSyncController::new(orders_config(), store.clone())
}

/// A controller showing `count` server rows with ids 1..=count.
fn loaded(count: usize) -> (GridSyncController<MemoryStore>, FakeGrid, FakeServer) {
    let server = FakeServer::new("id");
    for order in OrderFaker::new(11).orders(count) {
        server.seed(order);
    }
    let mut grid = FakeGrid::new(&COLUMNS);
    let mut controller = controller(&MemoryStore::new());
    controller.refresh(&mut grid, &server);
    (controller, grid, server)
}

fn alerts(events: &[SyncEvent]) -> Vec<Alert> {
    events
        .iter()
        .filter_map(|event| match event {
            SyncEvent::Alert(alert) => Some(alert.clone()),
            _ => None,
        })
        .collect()
}

fn status(controller: &GridSyncController<MemoryStore>, id: RowId) -> Option<RowStatus> {
    controller.row(id).map(|row| row.status)
}

#[test]
fn grid_ready_without_stored_state_applies_default_sort() -> Result<()> {
    let store = MemoryStore::new();
    let mut grid = FakeGrid::new(&["name", "date", "amount"]);
    let mut controller = controller(&store);

    let events = controller.on_grid_ready(&mut grid)?;

    assert!(grid.calls.contains(&GridCall::ApplyColumnState(vec![ColumnState::sorted(
        "name",
        SortDirection::Asc,
        0,
    )])));
    assert!(events.contains(&SyncEvent::SortChanged(vec![SortOrder::new(
        "name",
        SortDirection::Asc,
    )])));
    assert!(store.keys().is_empty());
    Ok(())
}

#[test]
fn sort_change_persists_grid_column_state() -> Result<()> {
    let store = MemoryStore::new();
    let mut grid = FakeGrid::new(&["name", "date", "amount"]);
    let mut controller = controller(&store);
    controller.on_grid_ready(&mut grid)?;

    grid.sort_by("date", SortDirection::Desc);
    let events = controller.on_sort_changed(&mut grid)?;

    let stored = store.load("orders-column")?.expect("column state persisted");
    assert_eq!(stored, serde_json::to_string(&grid.column_state)?);
    assert!(events.contains(&SyncEvent::SortChanged(vec![SortOrder::new(
        "date",
        SortDirection::Desc,
    )])));
    assert_eq!(
        controller.list_request().sort_orders,
        vec![SortOrder::new("date", SortDirection::Desc)]
    );
    Ok(())
}

#[test]
fn grid_ready_restores_persisted_view() -> Result<()> {
    let store = MemoryStore::new();
    let mut model = FilterModel::new();
    model.insert("status".to_owned(), FilterDescriptor::new("equals", "open"));
    ViewStateStore::new(store.clone()).save(
        "orders",
        &PersistedView {
            filter_model: Some(model.clone()),
            column_state: Some(vec![
                ColumnState::sorted("due", SortDirection::Desc, 0),
                ColumnState::unsorted("name"),
            ]),
        },
    )?;

    let mut grid = FakeGrid::new(&COLUMNS);
    let events = controller(&store).on_grid_ready(&mut grid)?;

    assert_eq!(grid.filter_model, model);
    assert_eq!(
        grid.column_state
            .iter()
            .find(|column| column.col_id == "due")
            .and_then(|column| column.sort),
        Some(SortDirection::Desc)
    );
    assert!(events.contains(&SyncEvent::FiltersChanged(vec![Filter::new(
        "status", "equals", "open",
    )])));
    assert!(events.contains(&SyncEvent::SortChanged(vec![SortOrder::new(
        "due",
        SortDirection::Desc,
    )])));
    Ok(())
}

#[test]
fn filter_change_merges_fixed_filters_and_restarts_paging() -> Result<()> {
    let store = MemoryStore::new();
    let config = orders_config().with_extra_filters(vec![Filter::new("period", "equals", "2026-Q1")]);
    let mut controller = GridSyncController::new(config, store.clone());
    let mut grid = FakeGrid::new(&COLUMNS);
    controller.on_grid_ready(&mut grid)?;
    controller.set_page(3, 25);

    grid.filter_by("name", "contains", "Acme");
    let events = controller.on_filter_changed(&mut grid)?;

    let expected = vec![
        Filter::new("name", "contains", "Acme"),
        Filter::new("period", "equals", "2026-Q1"),
    ];
    assert!(events.contains(&SyncEvent::FiltersChanged(expected.clone())));
    let request = controller.list_request();
    assert_eq!(request.page, 1);
    assert_eq!(request.filters, expected);

    let stored: FilterModel = serde_json::from_str(&store.load("orders-filter")?.expect("stored"))?;
    assert_eq!(stored, grid.filter_model);
    Ok(())
}

#[test]
fn reset_clears_stored_view_and_grid_filters() -> Result<()> {
    let store = MemoryStore::new();
    let mut controller = controller(&store);
    let mut grid = FakeGrid::new(&COLUMNS);
    controller.on_grid_ready(&mut grid)?;
    grid.filter_by("status", "equals", "open");
    controller.on_filter_changed(&mut grid)?;
    grid.sort_by("due", SortDirection::Desc);
    controller.on_sort_changed(&mut grid)?;
    assert_eq!(store.keys().len(), 2);

    let events = controller.reset(&mut grid)?;

    assert!(store.keys().is_empty());
    assert!(grid.calls.contains(&GridCall::SetFilterModel(None)));
    assert!(grid.filter_model.is_empty());
    let sorted: Vec<&str> = grid
        .column_state
        .iter()
        .filter(|column| column.sort.is_some())
        .map(|column| column.col_id.as_str())
        .collect();
    assert_eq!(sorted, vec!["name"]);
    assert_eq!(events.first(), Some(&SyncEvent::ViewReset));
    Ok(())
}

#[test]
fn page_size_change_returns_to_first_page() {
    let mut controller = controller(&MemoryStore::new());
    controller.set_page(4, 25);
    assert_eq!(controller.list_request().page, 4);

    let events = controller.set_page(4, 60);
    let request = controller.list_request();
    assert_eq!((request.page, request.size), (1, 50));
    assert_eq!(events, vec![SyncEvent::ListRequestChanged(request)]);
    assert!(controller.set_page(1, 50).is_empty());
}

#[test]
fn refresh_loads_rows_and_marks_total_fresh() {
    let (controller, grid, server) = loaded(3);

    assert_eq!(controller.rows().len(), 3);
    let mut ids = grid.row_ids();
    ids.sort();
    assert_eq!(ids, vec![RowId::server(1), RowId::server(2), RowId::server(3)]);
    assert_eq!(controller.view().pagination.total, TotalCount::Fresh(3));
    assert!(grid.calls.contains(&GridCall::HideOverlay));
    assert_eq!(server.requests()[0].sort_orders, vec![SortOrder::new("name", SortDirection::Asc)]);
}

#[test]
fn stale_fetch_results_are_dropped() {
    let mut controller = controller(&MemoryStore::new());
    let mut grid = FakeGrid::new(&COLUMNS);
    let first = controller.begin_fetch().expect("mounted");
    let second = controller.begin_fetch().expect("mounted");

    let late = controller.finish_fetch(
        &mut grid,
        first,
        Ok(list_page(vec![fields(&[("id", 7_i64.into())])], 1, 25, 1)),
    );
    assert!(late.is_empty());
    assert!(grid.rows.is_empty());

    let events = controller.finish_fetch(
        &mut grid,
        second,
        Ok(list_page(vec![fields(&[("id", 9_i64.into())])], 1, 25, 1)),
    );
    assert!(events.contains(&SyncEvent::RowsLoaded { count: 1, total: 1 }));
    assert_eq!(grid.row_ids(), vec![RowId::server(9)]);
}

#[test]
fn failed_fetch_raises_error_alert() {
    let server = FakeServer::new("id");
    server.fail_next(PersistFailure::network("Network Error"));
    let mut controller = controller(&MemoryStore::new());
    let mut grid = FakeGrid::new(&COLUMNS);

    let events = controller.refresh(&mut grid, &server);

    assert_eq!(
        alerts(&events),
        vec![Alert::error("Unable to load rows: Network Error")]
    );
    assert!(grid.calls.contains(&GridCall::HideOverlay));
}

#[test]
fn empty_page_schedules_one_blank_row() {
    let (mut controller, mut grid, server) = loaded(0);
    assert!(controller.blank_row_pending());

    let again = controller.refresh(&mut grid, &server);
    assert!(!again
        .iter()
        .any(|event| matches!(event, SyncEvent::BlankRowScheduled { .. })));

    let events = controller.append_blank_row(&mut grid);
    let [SyncEvent::BlankRowAppended(id)] = events.as_slice() else {
        panic!("expected a blank row, got {events:?}");
    };
    assert!(id.is_draft());
    assert_eq!(grid.editing.as_ref().map(|cell| cell.col_key.as_str()), Some("name"));
    assert!(controller.append_blank_row(&mut grid).is_empty());
}

#[test]
fn writing_an_unchanged_value_does_not_save() {
    let (mut controller, mut grid, server) = loaded(1);
    let name = controller.rows()[0].field("name").cloned().expect("name");

    let events = controller.on_cell_edit_stop(
        &mut grid,
        &server,
        CellEdit::new(RowId::server(1), "name", name),
    );

    assert!(events.is_empty());
    assert!(server.payloads().is_empty());
    assert_eq!(status(&controller, RowId::server(1)), Some(RowStatus::Pristine));
}

#[test]
fn edit_saves_and_reports_success() {
    let (mut controller, mut grid, server) = loaded(2);

    let events = controller.on_cell_edit_stop(
        &mut grid,
        &server,
        CellEdit::new(RowId::server(2), "status", "archived"),
    );

    assert_eq!(alerts(&events), vec![Alert::success("Row saved successfully")]);
    let row = controller.row(RowId::server(2)).expect("row");
    assert_eq!(row.status, RowStatus::Success);
    assert!(!row.modified);
    assert_eq!(row.persisted, row.fields);
    assert_eq!(server.payloads()[0].get("id"), Some(&CellValue::Integer(2)));
    assert_eq!(grid.row(RowId::server(2)).map(|row| row.status), Some(RowStatus::Success));
}

#[test]
fn saved_draft_takes_its_server_id() {
    let server = FakeServer::new("id");
    let mut controller = controller(&MemoryStore::new());
    let mut grid = FakeGrid::new(&COLUMNS);
    let appended = controller.add_row(&mut grid);
    let [SyncEvent::BlankRowAppended(draft)] = appended.as_slice() else {
        panic!("draft row expected, got {appended:?}");
    };
    let draft = *draft;

    controller.on_cell_edit_stop(&mut grid, &server, CellEdit::new(draft, "name", "Acme Valves"));

    assert!(!server.payloads()[0].contains_key("id"));
    assert_eq!(grid.row_ids(), vec![RowId::server(1)]);
    assert!(grid.calls.iter().any(|call| matches!(
        call,
        GridCall::Transaction(RowTransaction::Replace { previous, .. }) if *previous == draft
    )));
    // The old draft id keeps resolving for late callbacks.
    assert_eq!(status(&controller, draft), Some(RowStatus::Success));
}

#[test]
fn rejected_draft_is_a_warning_with_field_label() {
    let server = FakeServer::new("id");
    server.reject_next(json!({"errors": [{"fields": ["name"], "message": "is required"}]}));
    let mut controller = controller(&MemoryStore::new());
    let mut grid = FakeGrid::new(&COLUMNS);
    let appended = controller.add_row(&mut grid);
    let [SyncEvent::BlankRowAppended(draft)] = appended.as_slice() else {
        panic!("draft row expected, got {appended:?}");
    };
    let draft = *draft;

    let events = controller.on_cell_edit_stop(&mut grid, &server, CellEdit::new(draft, "name", " "));

    assert_eq!(
        alerts(&events),
        vec![Alert::new("Unable to save row: name is required", Severity::Warning)]
    );
    let row = controller.row(draft).expect("row stays");
    assert_eq!(row.status, RowStatus::Warning);
    assert_eq!(row.validation_messages.get("name"), Some(&vec!["is required".to_owned()]));
}

#[test]
fn cross_row_warnings_flag_other_rows() {
    let (mut controller, mut grid, server) = loaded(3);
    server.reject_next(json!({
        "warnings": [
            {"id": 1, "fields": ["amount_cents"]},
            {"id": 3, "fields": ["due"], "message": "overlaps order 1"},
        ]
    }));

    let events = controller.on_cell_edit_stop(
        &mut grid,
        &server,
        CellEdit::new(RowId::server(1), "amount_cents", 12_i64),
    );

    assert_eq!(
        alerts(&events),
        vec![Alert::error("Unable to save row: 2 row(s) need attention")]
    );
    assert_eq!(status(&controller, RowId::server(1)), Some(RowStatus::Error));
    let flagged = controller.row(RowId::server(3)).expect("row 3");
    assert_eq!(flagged.status, RowStatus::Warning);
    assert_eq!(
        flagged.validation_messages.get("due"),
        Some(&vec!["overlaps order 1".to_owned()])
    );
    assert_eq!(status(&controller, RowId::server(2)), Some(RowStatus::Pristine));
    assert!(events.contains(&SyncEvent::RowsRepainted(vec![RowId::server(1), RowId::server(3)])));
}

#[test]
fn unknown_failure_is_an_error_alert() {
    let (mut controller, mut grid, server) = loaded(1);
    server.fail_next(PersistFailure::other("Request failed with status code 500"));

    let events = controller.on_cell_edit_stop(
        &mut grid,
        &server,
        CellEdit::new(RowId::server(1), "status", "open-ish"),
    );

    assert_eq!(
        alerts(&events),
        vec![Alert::error("Unable to save row: Request failed with status code 500")]
    );
    assert_eq!(status(&controller, RowId::server(1)), Some(RowStatus::Error));
}

#[test]
fn late_older_save_does_not_override_newer_result() {
    let (mut controller, mut grid, _server) = loaded(1);
    let id = RowId::server(1);

    let (_, first) = controller.begin_save(&mut grid, CellEdit::new(id, "status", "shipped-1"));
    let (_, second) = controller.begin_save(&mut grid, CellEdit::new(id, "status", "shipped-2"));
    let (first, second) = (first.expect("first save"), second.expect("second save"));
    assert!(second.sequence() > first.sequence());

    let newer = controller.finish_save(&mut grid, second.clone(), Ok(second.payload().clone()));
    assert_eq!(alerts(&newer).len(), 1);

    let older = controller.finish_save(&mut grid, first, Err(PersistFailure::network("timeout")));
    assert!(older.is_empty());

    let row = controller.row(id).expect("row");
    assert_eq!(row.status, RowStatus::Success);
    assert_eq!(row.field("status"), Some(&CellValue::from("shipped-2")));
}

#[test]
fn early_older_success_keeps_newer_save_in_flight() {
    let (mut controller, mut grid, _server) = loaded(1);
    let id = RowId::server(1);

    let (_, first) = controller.begin_save(&mut grid, CellEdit::new(id, "status", "shipped-1"));
    let (_, second) = controller.begin_save(&mut grid, CellEdit::new(id, "status", "shipped-2"));
    let (first, second) = (first.expect("first save"), second.expect("second save"));

    let older = controller.finish_save(&mut grid, first.clone(), Ok(first.payload().clone()));
    assert!(alerts(&older).is_empty());
    assert_eq!(status(&controller, id), Some(RowStatus::Saving));

    let newer = controller.finish_save(&mut grid, second.clone(), Ok(second.payload().clone()));
    assert_eq!(alerts(&newer), vec![Alert::success("Row saved successfully")]);
    assert_eq!(status(&controller, id), Some(RowStatus::Success));
}

#[test]
fn older_draft_success_after_newer_failure_still_adopts_server_id() {
    let mut controller = controller(&MemoryStore::new());
    let mut grid = FakeGrid::new(&COLUMNS);
    let appended = controller.add_row(&mut grid);
    let [SyncEvent::BlankRowAppended(draft)] = appended.as_slice() else {
        panic!("draft row expected, got {appended:?}");
    };
    let draft = *draft;

    let (_, first) = controller.begin_save(&mut grid, CellEdit::new(draft, "name", "Acme"));
    let (_, second) = controller.begin_save(&mut grid, CellEdit::new(draft, "name", "Acme Valves"));
    let (first, second) = (first.expect("first save"), second.expect("second save"));

    let newer = controller.finish_save(&mut grid, second, Err(PersistFailure::network("timeout")));
    assert_eq!(alerts(&newer).len(), 1);
    assert_eq!(status(&controller, draft), Some(RowStatus::Error));

    let committed = fields(&[("id", 77_i64.into()), ("name", "Acme".into())]);
    let older = controller.finish_save(&mut grid, first, Ok(committed));

    assert!(alerts(&older).is_empty());
    assert_eq!(older, vec![SyncEvent::RowsRepainted(vec![RowId::server(77)])]);
    assert_eq!(grid.row_ids(), vec![RowId::server(77)]);
    let row = controller.row(draft).expect("draft id resolves to the saved row");
    assert_eq!(row.id, RowId::server(77));
    assert_eq!(row.persisted.get("name"), Some(&CellValue::from("Acme")));
    assert_eq!(row.field("name"), Some(&CellValue::from("Acme Valves")));
    assert!(row.modified);
    assert_eq!(row.status, RowStatus::Modified);
}

#[test]
fn detail_rejection_on_persisted_row_is_an_error() {
    let server = FakeServer::new("id");
    server.reject_next(json!({"detail": "Order is invoiced", "errors": null}));
    let mut controller = controller(&MemoryStore::new());
    let mut grid = FakeGrid::new(&COLUMNS);
    let row = loaded_row(5, &[("name", "Acme".into())]);
    controller.load_rows(&mut grid, list_page(vec![row.fields], 1, 25, 1));

    let events = controller.on_cell_edit_stop(
        &mut grid,
        &server,
        CellEdit::new(RowId::server(5), "name", "Acme Valves"),
    );

    assert_eq!(alerts(&events), vec![Alert::error("Order is invoiced")]);
    assert_eq!(status(&controller, RowId::server(5)), Some(RowStatus::Error));
}

#[test]
fn deleting_last_row_schedules_blank_row() {
    let (mut controller, mut grid, server) = loaded(1);

    let events = controller.delete_row(&mut grid, &server, RowId::server(1));

    assert_eq!(alerts(&events), vec![Alert::success("Row deleted successfully")]);
    assert!(events.contains(&SyncEvent::RowRemoved(RowId::server(1))));
    assert!(events.contains(&SyncEvent::BlankRowScheduled {
        delay: Duration::from_millis(100)
    }));
    assert!(grid.rows.is_empty());
    assert!(server.table().is_empty());
    assert_eq!(server.payloads()[0].get("deleted"), Some(&CellValue::Bool(true)));
}

#[test]
fn failed_delete_keeps_row_visible_with_warning() {
    let (mut controller, mut grid, server) = loaded(2);
    server.reject_next(json!({"detail": "Order is invoiced"}));

    let events = controller.delete_row(&mut grid, &server, RowId::server(2));

    assert_eq!(
        alerts(&events),
        vec![Alert::error("Unable to delete row: Order is invoiced")]
    );
    assert_eq!(status(&controller, RowId::server(2)), Some(RowStatus::Warning));
    assert_eq!(grid.rows.len(), 2);
}

#[test]
fn draft_delete_never_reaches_the_server() {
    let server = FakeServer::new("id");
    let mut controller = controller(&MemoryStore::new());
    let mut grid = FakeGrid::new(&COLUMNS);
    let appended = controller.add_row(&mut grid);
    let [SyncEvent::BlankRowAppended(draft)] = appended.as_slice() else {
        panic!("draft row expected, got {appended:?}");
    };
    let draft = *draft;

    let events = controller.delete_row(&mut grid, &server, draft);

    assert_eq!(alerts(&events), vec![Alert::success("Row deleted successfully")]);
    assert!(server.payloads().is_empty());
    assert!(controller.blank_row_pending());
}

#[test]
fn delete_is_refused_while_saving() {
    let (mut controller, mut grid, server) = loaded(1);
    let id = RowId::server(1);
    let (_, ticket) = controller.begin_save(&mut grid, CellEdit::new(id, "status", "archived"));
    assert!(ticket.is_some());

    let events = controller.delete_row(&mut grid, &server, id);

    let [alert] = alerts(&events).try_into().expect("one alert");
    assert_eq!(alert.severity, Severity::Warning);
    assert!(server.payloads().is_empty());
    assert_eq!(status(&controller, id), Some(RowStatus::Saving));
}

#[test]
fn enter_activates_row_once_when_navigation_enabled() {
    let config = orders_config().with_row_navigation(true);
    let controller = GridSyncController::new(config, MemoryStore::new());
    let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
    let focus = CellFocus::container("cell-1-name", 0);

    let mut seen = Vec::new();
    let mut record = |activation: RowActivation<&'static str>| seen.push(activation);
    let suppressed =
        controller.suppress_keyboard_event(&enter, &focus, Some(RowId::server(1)), Some(&mut record));

    assert!(suppressed);
    assert_eq!(
        seen,
        vec![RowActivation {
            row: RowId::server(1),
            target: "cell-1-name",
        }]
    );
}

#[test]
fn enter_passes_through_without_navigation() {
    let controller = controller(&MemoryStore::new());
    let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
    let focus = CellFocus::container((), 0);
    assert!(!controller.suppress_keyboard_event(&enter, &focus, Some(RowId::server(1)), None));
}

#[test]
fn advance_editor_commits_and_moves_on() {
    let (controller, mut grid, _server) = loaded(2);
    grid.focus(0, "due");

    assert!(controller.advance_editor(&mut grid, false));
    assert_eq!(grid.calls[grid.calls.len() - 3], GridCall::StopEditing);
    assert_eq!(
        grid.editing.as_ref().map(|cell| (cell.row_index, cell.col_key.as_str())),
        Some((1, "name"))
    );

    grid.focus(0, "name");
    assert!(!controller.advance_editor(&mut grid, true));
}

#[test]
fn unmounted_controller_ignores_every_callback() -> Result<()> {
    let (mut controller, mut grid, server) = loaded(1);
    let (_, ticket) =
        controller.begin_save(&mut grid, CellEdit::new(RowId::server(1), "status", "archived"));
    controller.unmount();
    grid.take_calls();

    let ticket = ticket.expect("save started before unmount");
    assert!(controller.finish_save(&mut grid, ticket, Ok(Default::default())).is_empty());
    assert!(controller
        .on_cell_edit_stop(&mut grid, &server, CellEdit::new(RowId::server(1), "name", "x"))
        .is_empty());
    assert!(controller.delete_row(&mut grid, &server, RowId::server(1)).is_empty());
    assert!(controller.refresh(&mut grid, &server).is_empty());
    assert!(controller.on_grid_ready(&mut grid)?.is_empty());
    assert!(controller.append_blank_row(&mut grid).is_empty());
    assert!(controller.add_row(&mut grid).is_empty());
    assert!(grid.calls.is_empty());
    assert!(server.payloads().is_empty());
    Ok(())
}
