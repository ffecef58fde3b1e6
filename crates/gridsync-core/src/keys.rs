// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Decides whether a key press inside a grid cell belongs to the cell's
//! own widgets or to grid-level cell navigation.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::ids::RowId;

/// Where a key event originated within the focused cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusSource {
    /// The cell container itself.
    Container,
    /// The focusable descendant at this index (document order).
    Descendant(usize),
}

/// DOM-query equivalent of the focused cell: the element the event came
/// from and how many focusable descendants the cell holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFocus<T> {
    pub target: T,
    pub source: FocusSource,
    pub focusable: usize,
}

impl<T> CellFocus<T> {
    pub fn container(target: T, focusable: usize) -> Self {
        Self {
            target,
            source: FocusSource::Container,
            focusable,
        }
    }

    pub fn descendant(target: T, index: usize, focusable: usize) -> Self {
        Self {
            target,
            source: FocusSource::Descendant(index),
            focusable,
        }
    }

    fn is_first_descendant(&self) -> bool {
        matches!(self.source, FocusSource::Descendant(0))
    }

    fn is_last_descendant(&self) -> bool {
        matches!(self.source, FocusSource::Descendant(index) if index + 1 == self.focusable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyOptions {
    pub row_navigation: bool,
    pub row_activate_available: bool,
    pub target_row: Option<RowId>,
}

/// Synthesized drill-in event; `target` is the element the key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowActivation<T> {
    pub row: RowId,
    pub target: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDecision<T> {
    pub suppress: bool,
    pub activate: Option<RowActivation<T>>,
}

impl<T> KeyDecision<T> {
    const fn pass() -> Self {
        Self {
            suppress: false,
            activate: None,
        }
    }

    const fn consume() -> Self {
        Self {
            suppress: true,
            activate: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKey {
    Enter,
    Tab { backwards: bool },
}

fn classify(key: &KeyEvent) -> Option<CellKey> {
    match key.code {
        KeyCode::Enter => Some(CellKey::Enter),
        KeyCode::Tab => Some(CellKey::Tab {
            backwards: key.modifiers.contains(KeyModifiers::SHIFT),
        }),
        KeyCode::BackTab => Some(CellKey::Tab { backwards: true }),
        _ => None,
    }
}

pub fn decide<T: Clone>(key: &KeyEvent, focus: &CellFocus<T>, options: KeyOptions) -> KeyDecision<T> {
    match classify(key) {
        Some(CellKey::Enter) => decide_enter(focus, options),
        Some(CellKey::Tab { backwards }) => decide_tab(focus, backwards),
        None => KeyDecision::pass(),
    }
}

fn decide_enter<T: Clone>(focus: &CellFocus<T>, options: KeyOptions) -> KeyDecision<T> {
    if focus.focusable > 0 {
        // A nested widget (button, link) handles Enter itself.
        return KeyDecision::consume();
    }

    match options.target_row {
        Some(row) if options.row_navigation && options.row_activate_available => KeyDecision {
            suppress: true,
            activate: Some(RowActivation {
                row,
                target: focus.target.clone(),
            }),
        },
        _ => KeyDecision::pass(),
    }
}

fn decide_tab<T>(focus: &CellFocus<T>, backwards: bool) -> KeyDecision<T> {
    if focus.focusable == 0 {
        return KeyDecision::pass();
    }
    if !backwards && focus.is_last_descendant() {
        return KeyDecision::pass();
    }
    if backwards && (focus.is_first_descendant() || focus.source == FocusSource::Container) {
        return KeyDecision::pass();
    }
    // Focus keeps cycling inside the cell; the owning widget moves it.
    KeyDecision::consume()
}
