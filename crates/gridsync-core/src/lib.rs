// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod alert;
pub mod controller;
pub mod grid;
pub mod ids;
pub mod keys;
pub mod persist;
pub mod row;
pub mod save;
pub mod store;
pub mod value;
pub mod view;

pub use alert::*;
pub use controller::*;
pub use grid::*;
pub use ids::*;
pub use keys::{CellFocus, FocusSource, KeyDecision, KeyOptions, RowActivation};
pub use persist::*;
pub use row::*;
pub use save::*;
pub use store::*;
pub use value::*;
pub use view::*;
