//! New-unit edge detection.
//!
//! The controller exposes the identifier of whatever unit currently sits at
//! the inspection station. [`ChangeDetector`] turns that level signal into
//! edges: an event fires the first time a non-empty identifier differs from
//! the last one that fired.
//!
//! State is a single in-memory slot. It starts empty on every process start,
//! so a unit still at the station across a restart is detected once more.
//! There is no debounce: a transient misread that reverts produces two edges.

use crate::measurement::Record;

/// A record whose identifier differs from the previously observed unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    /// The record that triggered the edge.
    pub record: Record,
    /// Identifier of the previous unit, if any was seen since start.
    pub previous: Option<String>,
}

impl DetectionEvent {
    /// Identifier of the newly arrived unit.
    pub fn identifier(&self) -> &str {
        &self.record.identifier
    }
}

/// Single-slot memo of the last unit identifier.
#[derive(Debug, Default, Clone)]
pub struct ChangeDetector {
    last_identifier: Option<String>,
}

impl ChangeDetector {
    /// Create a detector that has not seen any unit yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the last unit that fired an event.
    pub fn last_identifier(&self) -> Option<&str> {
        self.last_identifier.as_deref()
    }

    /// Feed one record; returns an event on a new-unit edge.
    ///
    /// Empty identifiers never fire and never clear the memo, so a unit
    /// leaving the station is not an event.
    pub fn observe(&mut self, record: &Record) -> Option<DetectionEvent> {
        if !record.has_unit() {
            return None;
        }
        if self.last_identifier.as_deref() == Some(record.identifier.as_str()) {
            return None;
        }
        let previous = self.last_identifier.replace(record.identifier.clone());
        Some(DetectionEvent {
            record: record.clone(),
            previous,
        })
    }

    /// Forget the last identifier.
    pub fn reset(&mut self) {
        self.last_identifier = None;
    }
}
