// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use gridsync_core::{
    CellValue, ColumnState, DELETED_FLAG, Fields, FilterModel, FocusedCell, GridApi,
    ListPage, ListRequest, PageFetcher, PageInfo, PersistFailure, Row, RowId, RowPersister,
    RowTransaction, SortDirection,
};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use time::{Date, Duration, Month, OffsetDateTime, Time};

const CUSTOMERS: [&str; 12] = [
    "Acme",
    "Globex",
    "Initech",
    "Umbrella",
    "Hooli",
    "Vandelay",
    "Stark",
    "Wayne",
    "Tyrell",
    "Soylent",
    "Cyberdyne",
    "Wonka",
];

const PRODUCTS: [&str; 8] = [
    "Widgets", "Gaskets", "Sprockets", "Valves", "Brackets", "Hinges", "Bearings", "Fasteners",
];

const ORDER_STATUSES: [&str; 4] = ["open", "shipped", "invoiced", "closed"];

/// Everything the controller asked the grid to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum GridCall {
    Transaction(RowTransaction),
    Refresh(Vec<RowId>),
    StartEditing { row_index: usize, col_key: String },
    StopEditing,
    Tab { backwards: bool },
    SetFilterModel(Option<FilterModel>),
    ApplyColumnState(Vec<ColumnState>),
    HideOverlay,
}

/// An in-memory grid widget. Column state merges the way the real widget
/// merges partial state.
#[derive(Debug, Clone, Default)]
pub struct FakeGrid {
    pub rows: Vec<Row>,
    pub columns: Vec<String>,
    pub filter_model: FilterModel,
    pub column_state: Vec<ColumnState>,
    pub focused: Option<FocusedCell>,
    pub editing: Option<FocusedCell>,
    pub calls: Vec<GridCall>,
}

impl FakeGrid {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|column| (*column).to_owned()).collect(),
            column_state: columns.iter().map(|column| ColumnState::unsorted(*column)).collect(),
            ..Self::default()
        }
    }

    /// What a header click does: one active sort at priority 0.
    pub fn sort_by(&mut self, column: &str, direction: SortDirection) {
        for state in &mut self.column_state {
            if state.col_id == column {
                state.sort = Some(direction);
                state.sort_index = Some(0);
            } else {
                state.sort = None;
                state.sort_index = None;
            }
        }
    }

    pub fn filter_by(&mut self, column: &str, operator: &str, operand: impl Into<serde_json::Value>) {
        self.filter_model.insert(
            column.to_owned(),
            gridsync_core::FilterDescriptor::new(operator, operand),
        );
    }

    pub fn focus(&mut self, row_index: usize, column: &str) {
        self.focused = Some(FocusedCell::new(row_index, column));
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn row_ids(&self) -> Vec<RowId> {
        self.rows.iter().map(|row| row.id).collect()
    }

    pub fn take_calls(&mut self) -> Vec<GridCall> {
        std::mem::take(&mut self.calls)
    }
}

impl GridApi for FakeGrid {
    fn apply_transaction(&mut self, transaction: RowTransaction) {
        match &transaction {
            RowTransaction::Add(rows) => self.rows.extend(rows.iter().cloned()),
            RowTransaction::Remove(ids) => self.rows.retain(|row| !ids.contains(&row.id)),
            RowTransaction::Replace { previous, row } => {
                if let Some(slot) = self.rows.iter_mut().find(|slot| slot.id == *previous) {
                    *slot = row.clone();
                }
            }
            RowTransaction::Reset(rows) => self.rows = rows.clone(),
        }
        self.calls.push(GridCall::Transaction(transaction));
    }

    fn refresh_cells(&mut self, rows: &[Row]) {
        for row in rows {
            if let Some(slot) = self.rows.iter_mut().find(|slot| slot.id == row.id) {
                *slot = row.clone();
            }
        }
        self.calls
            .push(GridCall::Refresh(rows.iter().map(|row| row.id).collect()));
    }

    fn start_editing_cell(&mut self, row_index: usize, col_key: &str) {
        let cell = FocusedCell::new(row_index, col_key);
        self.focused = Some(cell.clone());
        self.editing = Some(cell);
        self.calls.push(GridCall::StartEditing {
            row_index,
            col_key: col_key.to_owned(),
        });
    }

    fn stop_editing(&mut self) {
        self.editing = None;
        self.calls.push(GridCall::StopEditing);
    }

    fn tab_to_next_cell(&mut self, backwards: bool) -> bool {
        self.calls.push(GridCall::Tab { backwards });
        let Some(focused) = &self.focused else {
            return false;
        };
        let Some(column) = self.columns.iter().position(|col| *col == focused.col_key) else {
            return false;
        };
        let width = self.columns.len();
        let flat = focused.row_index * width + column;
        let next = if backwards {
            flat.checked_sub(1)
        } else {
            Some(flat + 1).filter(|next| *next < self.rows.len() * width)
        };
        match next {
            Some(next) => {
                self.focused = Some(FocusedCell::new(next / width, self.columns[next % width].clone()));
                true
            }
            None => false,
        }
    }

    fn focused_cell(&self) -> Option<FocusedCell> {
        self.focused.clone()
    }

    fn set_filter_model(&mut self, model: Option<&FilterModel>) {
        self.filter_model = model.cloned().unwrap_or_default();
        self.calls.push(GridCall::SetFilterModel(model.cloned()));
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
        self.calls.push(GridCall::ApplyColumnState(state.to_vec()));
    }

    fn column_state(&self) -> Vec<ColumnState> {
        self.column_state.clone()
    }

    fn hide_overlay(&mut self) {
        self.calls.push(GridCall::HideOverlay);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A list-and-persist backend over an in-memory table. Queued failures are
/// returned, in order, before the table is touched.
#[derive(Debug)]
pub struct FakeServer {
    id_field: String,
    table: Mutex<Vec<Fields>>,
    next_id: Mutex<i64>,
    failures: Mutex<VecDeque<PersistFailure>>,
    payloads: Mutex<Vec<Fields>>,
    requests: Mutex<Vec<ListRequest>>,
}

impl FakeServer {
    pub fn new(id_field: &str) -> Self {
        Self {
            id_field: id_field.to_owned(),
            table: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
            failures: Mutex::new(VecDeque::new()),
            payloads: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Inserts a row as if it had been saved earlier; returns its id.
    pub fn seed(&self, mut fields: Fields) -> i64 {
        let id = self.allocate_id();
        fields.insert(self.id_field.clone(), CellValue::Integer(id));
        lock(&self.table).push(fields);
        id
    }

    pub fn fail_next(&self, failure: PersistFailure) {
        lock(&self.failures).push_back(failure);
    }

    /// Queues a 400 carrying the given JSON body.
    pub fn reject_next(&self, body: serde_json::Value) {
        self.fail_next(PersistFailure::bad_request(body));
    }

    pub fn payloads(&self) -> Vec<Fields> {
        lock(&self.payloads).clone()
    }

    pub fn requests(&self) -> Vec<ListRequest> {
        lock(&self.requests).clone()
    }

    pub fn table(&self) -> Vec<Fields> {
        lock(&self.table).clone()
    }

    fn allocate_id(&self) -> i64 {
        let mut next = lock(&self.next_id);
        let id = *next;
        *next += 1;
        id
    }

    fn row_id(&self, fields: &Fields) -> Option<i64> {
        fields.get(&self.id_field).and_then(CellValue::as_i64)
    }
}

impl RowPersister for FakeServer {
    fn persist(&self, payload: &Fields) -> Result<Fields, PersistFailure> {
        lock(&self.payloads).push(payload.clone());
        if let Some(failure) = lock(&self.failures).pop_front() {
            return Err(failure);
        }

        let deleted = payload
            .get(DELETED_FLAG)
            .is_some_and(|flag| *flag == CellValue::Bool(true));
        let mut stored = payload.clone();
        stored.remove(DELETED_FLAG);

        match self.row_id(payload) {
            Some(id) => {
                let mut table = lock(&self.table);
                let Some(index) = table.iter().position(|row| self.row_id(row) == Some(id)) else {
                    return Err(PersistFailure::bad_request(
                        serde_json::json!({"detail": format!("Row {id} does not exist")}),
                    ));
                };
                if deleted {
                    table.remove(index);
                    return Ok(Fields::new());
                }
                table[index].extend(stored);
                Ok(table[index].clone())
            }
            None => {
                let id = self.allocate_id();
                stored.insert(self.id_field.clone(), CellValue::Integer(id));
                lock(&self.table).push(stored.clone());
                Ok(stored)
            }
        }
    }
}

impl PageFetcher for FakeServer {
    fn fetch_page(&self, request: &ListRequest) -> Result<ListPage, PersistFailure> {
        lock(&self.requests).push(request.clone());
        if let Some(failure) = lock(&self.failures).pop_front() {
            return Err(failure);
        }

        let mut rows: Vec<Fields> = lock(&self.table)
            .iter()
            .filter(|row| {
                request.filters.iter().all(|filter| {
                    let cell = row.get(&filter.field).cloned().unwrap_or_default();
                    let wanted = CellValue::from(filter.value.clone());
                    match filter.operator.as_str() {
                        "contains" => cell.display().contains(wanted.display().as_str()),
                        _ => cell == wanted,
                    }
                })
            })
            .cloned()
            .collect();
        rows.sort_by(|left, right| {
            request
                .sort_orders
                .iter()
                .map(|order| {
                    let ordering = compare_cells(left.get(&order.field), right.get(&order.field));
                    match order.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        let total = rows.len() as u64;
        let size = request.size.max(1) as usize;
        let start = (request.page.max(1) as usize - 1) * size;
        let items = rows.into_iter().skip(start).take(size).collect();
        Ok(ListPage {
            items,
            pagination: PageInfo {
                page: request.page,
                size: request.size,
                total,
            },
        })
    }
}

fn compare_cells(left: Option<&CellValue>, right: Option<&CellValue>) -> Ordering {
    let left = left.cloned().unwrap_or_default();
    let right = right.cloned().unwrap_or_default();
    match (&left, &right) {
        (CellValue::Instant(a), CellValue::Instant(b)) => a.cmp(b),
        _ => match (left.as_i64(), right.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => left.display().cmp(&right.display()),
        },
    }
}

pub fn fields(pairs: &[(&str, CellValue)]) -> Fields {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_owned(), value.clone()))
        .collect()
}

pub fn loaded_row(id: i64, pairs: &[(&str, CellValue)]) -> Row {
    let mut fields = fields(pairs);
    fields.insert("id".to_owned(), CellValue::Integer(id));
    Row::loaded(RowId::server(id), fields)
}

pub fn list_page(items: Vec<Fields>, page: u32, size: u32, total: u64) -> ListPage {
    ListPage {
        items,
        pagination: PageInfo { page, size, total },
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Reproducible order rows for grids and fake servers.
#[derive(Debug, Clone)]
pub struct OrderFaker {
    rng: DeterministicRng,
}

impl OrderFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn order(&mut self) -> Fields {
        let name = format!(
            "{} {}",
            self.pick(&CUSTOMERS),
            self.pick(&PRODUCTS)
        );
        let amount_cents = 1_000 + (self.rng.next_u64() % 499_000) as i64;
        let status = self.pick(&ORDER_STATUSES);
        let due = self.date_in_year(2026);
        fields(&[
            ("name", CellValue::from(name.as_str())),
            ("amount_cents", CellValue::Integer(amount_cents)),
            ("status", CellValue::from(status)),
            ("due", CellValue::Instant(due)),
        ])
    }

    pub fn orders(&mut self, count: usize) -> Vec<Fields> {
        (0..count).map(|_| self.order()).collect()
    }

    pub fn date_in_year(&mut self, year: i32) -> OffsetDateTime {
        let start = midnight_utc(year, Month::January, 1);
        let day = self.rng.int_n(365) as i64;
        start + Duration::days(day)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

fn midnight_utc(year: i32, month: Month, day: u8) -> OffsetDateTime {
    Date::from_calendar_date(year, month, day)
        .map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::{FakeGrid, FakeServer, OrderFaker, fields};
    use gridsync_core::{
        CellValue, GridApi, ListRequest, PageFetcher, RowPersister, SortDirection, SortOrder,
    };

    fn request(page: u32, size: u32) -> ListRequest {
        ListRequest {
            page,
            size,
            sort_orders: Vec::new(),
            filters: Vec::new(),
        }
    }

    #[test]
    fn faker_is_deterministic() {
        let mut left = OrderFaker::new(42);
        let mut right = OrderFaker::new(42);
        assert_eq!(left.orders(5), right.orders(5));
    }

    #[test]
    fn orders_fall_in_the_requested_year() {
        let mut faker = OrderFaker::new(7);
        for _ in 0..50 {
            assert_eq!(faker.date_in_year(2026).year(), 2026);
        }
    }

    #[test]
    fn server_assigns_ids_to_new_rows() {
        let server = FakeServer::new("id");
        let saved = server
            .persist(&fields(&[("name", "Acme".into())]))
            .expect("insert");
        assert_eq!(saved.get("id"), Some(&CellValue::Integer(1)));
        assert_eq!(server.table().len(), 1);
    }

    #[test]
    fn server_deletes_flagged_rows() {
        let server = FakeServer::new("id");
        let id = server.seed(fields(&[("name", "Acme".into())]));
        server
            .persist(&fields(&[("id", id.into()), ("deleted", true.into())]))
            .expect("delete");
        assert!(server.table().is_empty());
    }

    #[test]
    fn server_pages_and_sorts() {
        let server = FakeServer::new("id");
        for name in ["b", "c", "a"] {
            server.seed(fields(&[("name", name.into())]));
        }
        let mut sorted = request(1, 2);
        sorted.sort_orders = vec![SortOrder::new("name", SortDirection::Asc)];
        let page = server.fetch_page(&sorted).expect("page");
        assert_eq!(page.pagination.total, 3);
        let names: Vec<String> = page
            .items
            .iter()
            .filter_map(|row| row.get("name").map(CellValue::display))
            .collect();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);

        let second = server.fetch_page(&request(2, 2)).expect("page");
        assert_eq!(second.items.len(), 1);
    }

    #[test]
    fn fake_grid_tabs_across_rows() {
        let mut grid = FakeGrid::new(&["name", "amount"]);
        grid.rows = vec![
            super::loaded_row(1, &[]),
            super::loaded_row(2, &[]),
        ];
        grid.focus(0, "amount");
        assert!(grid.tab_to_next_cell(false));
        assert_eq!(grid.focused_cell().map(|cell| cell.row_index), Some(1));
        assert!(grid.tab_to_next_cell(false));
        assert!(!grid.tab_to_next_cell(false));
        grid.focus(0, "name");
        assert!(!grid.tab_to_next_cell(true));
    }
}
