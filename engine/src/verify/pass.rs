//! State shared by the checks of one data pass.

use tracing::trace;
use triplog_core::{Entity, FailedItem, FailureCollector, RecordError, RowQuery, RowStore, Value, load_entity};

use crate::cache::{Cached, ObjectCaches};
use crate::error::Result;

/// One pass over the data: the store, fresh caches, and the failure sink.
pub(crate) struct Pass<'a, S: RowStore + ?Sized> {
    pub store: &'a S,
    pub caches: ObjectCaches,
    failures: &'a mut FailureCollector,
}

impl<'a, S: RowStore + ?Sized> Pass<'a, S> {
    pub fn new(store: &'a S, failures: &'a mut FailureCollector) -> Self {
        Self {
            store,
            caches: ObjectCaches::new(),
            failures,
        }
    }

    /// True once the collector can take no more items; scanning stops here.
    pub fn full(&self) -> bool {
        self.failures.is_full()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn report(&mut self, item: FailedItem) {
        trace!(description = %item.description, "Integrity failure");
        self.failures.add(item);
    }

    /// Reads every row of `E` ordered by id. Rows that cannot be read are
    /// reported and left out. Also returns the raw row count.
    pub fn scan<E: Entity>(&mut self) -> Result<(Vec<E>, usize)> {
        let rows = self.read_rows::<E>(RowQuery::for_entity::<E>().order_by("_id"))?;
        let total = rows.len();
        Ok((rows.into_iter().flatten().collect(), total))
    }

    /// Rows of `E` whose `field` equals `value`, ordered by id. Rows that
    /// cannot be read are reported and keep their place as `None`, so
    /// callers walking a sequence can tell where it is broken.
    pub fn scan_where<E: Entity>(
        &mut self,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Option<E>>> {
        let query = RowQuery::for_entity::<E>()
            .filter(format!("{field} = ?"), vec![value.into()])
            .order_by("_id");
        self.read_rows(query)
    }

    fn read_rows<E: Entity>(&mut self, query: RowQuery) -> Result<Vec<Option<E>>> {
        let rows = self.store.get_rows(&query)?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match E::from_row(row) {
                Ok(record) => records.push(Some(record)),
                Err(err) => {
                    self.report_unreadable::<E>(err);
                    records.push(None);
                }
            }
        }
        Ok(records)
    }

    /// A row without a readable id is reported against the database.
    fn report_unreadable<E: Entity>(&mut self, err: RecordError) {
        let description = format!("Can't load {}: {err}", E::KIND);
        let item = match err.id {
            Some(id) => FailedItem::unresolved(E::KIND, id, None, description),
            None => FailedItem::database(description),
        };
        self.report(item);
    }

    /// Checks that `id` resolves through the cache for `E`; if not, reports
    /// it with `owner` as the related record.
    pub fn require<E: Cached, O: Entity>(&mut self, id: i64, owner: &O, what: &str) -> Result<bool> {
        let found = self.caches.lookup::<E, S>(self.store, id)?.is_some();
        if !found {
            self.report_missing::<E, O>(id, owner, what);
        }
        Ok(found)
    }

    /// [`require`](Self::require) for an optional reference; `None` passes.
    pub fn optional<E: Cached, O: Entity>(
        &mut self,
        id: Option<i64>,
        owner: &O,
        what: &str,
    ) -> Result<bool> {
        match id {
            Some(id) => self.require::<E, O>(id, owner, what),
            None => Ok(true),
        }
    }

    /// Loads `E` directly, bypassing the caches. Unreadable rows read as
    /// missing.
    pub fn load<E: Entity>(&mut self, id: i64) -> Result<Option<E>> {
        Ok(load_entity::<E, S>(self.store, id)?.and_then(|loaded| loaded.ok()))
    }

    /// Direct-load counterpart of [`require`](Self::require).
    pub fn require_direct<E: Entity, O: Entity>(
        &mut self,
        id: i64,
        owner: &O,
        what: &str,
    ) -> Result<Option<E>> {
        let loaded = self.load::<E>(id)?;
        if loaded.is_none() {
            self.report_missing::<E, O>(id, owner, what);
        }
        Ok(loaded)
    }

    fn report_missing<E: Entity, O: Entity>(&mut self, id: i64, owner: &O, what: &str) {
        self.report(FailedItem::unresolved(
            E::KIND,
            id,
            Some(owner.clone().into_record()),
            format!("Can't load {what}"),
        ));
    }
}
