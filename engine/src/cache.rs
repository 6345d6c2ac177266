//! Per-pass object caches.
//!
//! Each verification pass resolves the same master records over and over
//! (every trip points at a vehicle, every stop at a location). An
//! [`ObjectCache`] loads each id at most once, remembering misses as well as
//! hits, so repeated lookups never touch the store again.

use std::collections::HashMap;

use tracing::warn;
use triplog_core::{
    Entity, FreqTrip, GasBrandGrade, GeoArea, Location, Person, RowStore, StoreError, Trip, Vehicle,
    ViaRoute, load_entity,
};

/// Id-to-record memo for one entity type.
///
/// Records live in an arena; the index maps an id to its slot, or to `None`
/// once the id is known not to resolve.
#[derive(Debug)]
pub struct ObjectCache<E> {
    slots: Vec<E>,
    index: HashMap<i64, Option<usize>>,
    loads: usize,
}

impl<E> Default for ObjectCache<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            loads: 0,
        }
    }
}

impl<E: Entity> ObjectCache<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `id`, loading it from `store` on first use.
    ///
    /// A row that exists but cannot be read resolves to `None` like a missing
    /// one, and is logged.
    pub fn get<S: RowStore + ?Sized>(
        &mut self,
        store: &S,
        id: i64,
    ) -> Result<Option<&E>, StoreError> {
        if let Some(slot) = self.index.get(&id).copied() {
            return Ok(slot.map(|at| &self.slots[at]));
        }
        self.loads += 1;
        let slot = match load_entity::<E, S>(store, id)? {
            Some(Ok(record)) => {
                self.slots.push(record);
                Some(self.slots.len() - 1)
            }
            Some(Err(err)) => {
                warn!(kind = %E::KIND, id, error = %err, "Unreadable row treated as unresolved");
                None
            }
            None => None,
        };
        self.index.insert(id, slot);
        Ok(slot.map(|at| &self.slots[at]))
    }

    /// Seeds the cache with a record already loaded by a table scan.
    pub fn prime(&mut self, record: E) {
        let id = record.id();
        if !matches!(self.index.get(&id), Some(Some(_))) {
            self.slots.push(record);
            self.index.insert(id, Some(self.slots.len() - 1));
        }
    }

    /// Number of ids this cache went to the store for.
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Number of ids known, resolved or not.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Entity types that get an [`ObjectCache`] in [`ObjectCaches`].
pub trait Cached: Entity {
    fn cache(caches: &mut ObjectCaches) -> &mut ObjectCache<Self>;
}

/// The set of caches used during one verification pass.
#[derive(Debug, Default)]
pub struct ObjectCaches {
    pub vehicles: ObjectCache<Vehicle>,
    pub persons: ObjectCache<Person>,
    pub areas: ObjectCache<GeoArea>,
    pub locations: ObjectCache<Location>,
    pub routes: ObjectCache<ViaRoute>,
    pub brand_grades: ObjectCache<GasBrandGrade>,
    pub freq_trips: ObjectCache<FreqTrip>,
    pub trips: ObjectCache<Trip>,
}

impl ObjectCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `id` through the cache for `E`.
    pub fn lookup<E: Cached, S: RowStore + ?Sized>(
        &mut self,
        store: &S,
        id: i64,
    ) -> Result<Option<&E>, StoreError> {
        E::cache(self).get(store, id)
    }
}

macro_rules! cached {
    ($ty:ty, $field:ident) => {
        impl Cached for $ty {
            fn cache(caches: &mut ObjectCaches) -> &mut ObjectCache<Self> {
                &mut caches.$field
            }
        }
    };
}

cached!(Vehicle, vehicles);
cached!(Person, persons);
cached!(GeoArea, areas);
cached!(Location, locations);
cached!(ViaRoute, routes);
cached!(GasBrandGrade, brand_grades);
cached!(FreqTrip, freq_trips);
cached!(Trip, trips);
