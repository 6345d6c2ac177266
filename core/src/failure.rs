//! Structured inconsistency reports and the bounded collector that holds them.

use serde::Serialize;

use crate::records::{Record, RecordKind};

/// Default cap on collected failures.
pub const DEFAULT_MAX_FAILURE_ITEMS: usize = 100;

/// Reason text stored when descriptions are disabled.
pub const DESCRIPTION_PLACEHOLDER: &str = "?";

/// What a [`FailedItem`] is primarily about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FailedSubject {
    /// A raw id that could not be resolved or whose row could not be read.
    Id { kind: RecordKind, id: i64 },
    /// A loaded record that is inconsistent with something else.
    Record(Record),
    /// The database as a whole (e.g. "no vehicles at all").
    Database,
}

/// One detected inconsistency.
///
/// # Examples
///
/// ```
/// use triplog_core::{FailedItem, FailedSubject, RecordKind};
///
/// let item = FailedItem::unresolved(RecordKind::VehicleMake, 12, None, "Can't load VehicleMake");
/// assert_eq!(item.subject, FailedSubject::Id { kind: RecordKind::VehicleMake, id: 12 });
/// assert!(item.related.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedItem {
    pub subject: FailedSubject,
    /// A second record giving context: the record that pointed at a missing
    /// one, or the record that is more specific about the failure.
    pub related: Option<Record>,
    pub description: String,
}

impl FailedItem {
    /// An id of `kind` that could not be resolved; `related` usually is the
    /// record holding the dangling reference.
    pub fn unresolved(
        kind: RecordKind,
        id: i64,
        related: Option<Record>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            subject: FailedSubject::Id { kind, id },
            related,
            description: description.into(),
        }
    }

    /// A loaded record that failed a consistency check.
    pub fn record(record: Record, related: Option<Record>, description: impl Into<String>) -> Self {
        Self {
            subject: FailedSubject::Record(record),
            related,
            description: description.into(),
        }
    }

    /// A failure of the database as a whole.
    pub fn database(description: impl Into<String>) -> Self {
        Self {
            subject: FailedSubject::Database,
            related: None,
            description: description.into(),
        }
    }
}

/// Append-only, order-preserving failure list with a hard cap.
///
/// [`add`](Self::add) returns `false` once the collector is full; callers use
/// that as the signal to stop scanning.
///
/// # Examples
///
/// ```
/// use triplog_core::{FailedItem, FailureCollector};
///
/// let mut collector = FailureCollector::new(2, true);
/// assert!(collector.add(FailedItem::database("first")));
/// assert!(!collector.add(FailedItem::database("second"))); // now full
/// assert!(!collector.add(FailedItem::database("third")));  // dropped
/// assert_eq!(collector.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct FailureCollector {
    items: Vec<FailedItem>,
    max_items: usize,
    store_descriptions: bool,
}

impl Default for FailureCollector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURE_ITEMS, true)
    }
}

impl FailureCollector {
    /// Creates a collector holding at most `max_items` (minimum 1).
    ///
    /// With `store_descriptions` off, every reason is replaced by
    /// [`DESCRIPTION_PLACEHOLDER`]; ids and records are kept.
    pub fn new(max_items: usize, store_descriptions: bool) -> Self {
        Self {
            items: Vec::new(),
            max_items: max_items.max(1),
            store_descriptions,
        }
    }

    /// Appends `item` unless the cap was already reached.
    ///
    /// Returns `false` when the item was dropped or when this item filled the
    /// collector, `true` while there is room for more.
    pub fn add(&mut self, mut item: FailedItem) -> bool {
        if self.is_full() {
            return false;
        }
        if !self.store_descriptions {
            item.description = DESCRIPTION_PLACEHOLDER.to_string();
        }
        self.items.push(item);
        !self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn items(&self) -> &[FailedItem] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
