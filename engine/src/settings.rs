//! Current vehicle, driver and area selection.
//!
//! The selection is persisted in the `settings` table as `sfield`/`svalue`
//! pairs. [`CurrentSettings`] caches the resolved records and reloads them
//! when asked about a store with a different owner than the one it loaded
//! from, or after [`CurrentSettings::invalidate`].

use std::path::PathBuf;

use tracing::{debug, warn};
use triplog_core::{Entity, GeoArea, Person, RowQuery, RowStore, Value, Vehicle, load_entity};

use crate::error::Result;

/// Table holding persisted settings.
pub const SETTINGS_TABLE: &str = "settings";

const SETTINGS_FIELDS: &[&str] = &["_id", "sfield", "svalue"];

/// A persisted selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    CurrentVehicle,
    CurrentDriver,
    CurrentArea,
}

impl SettingKey {
    /// Value of the `sfield` column.
    pub fn field(self) -> &'static str {
        match self {
            SettingKey::CurrentVehicle => "CURRENT_VEHICLE",
            SettingKey::CurrentDriver => "CURRENT_DRIVER",
            SettingKey::CurrentArea => "CURRENT_AREA",
        }
    }
}

/// Cached current selection of one logbook.
///
/// The cache is keyed on [`RowStore::owner`]: stores without an owner
/// (in-memory databases) cannot be told apart, so switching between them
/// needs an explicit [`invalidate`](Self::invalidate).
#[derive(Debug, Default)]
pub struct CurrentSettings {
    loaded: bool,
    owner: Option<PathBuf>,
    vehicle: Option<Vehicle>,
    driver: Option<Person>,
    area: Option<GeoArea>,
}

impl CurrentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vehicle<S: RowStore + ?Sized>(&mut self, store: &S) -> Result<Option<&Vehicle>> {
        self.ensure_loaded(store)?;
        Ok(self.vehicle.as_ref())
    }

    pub fn driver<S: RowStore + ?Sized>(&mut self, store: &S) -> Result<Option<&Person>> {
        self.ensure_loaded(store)?;
        Ok(self.driver.as_ref())
    }

    pub fn area<S: RowStore + ?Sized>(&mut self, store: &S) -> Result<Option<&GeoArea>> {
        self.ensure_loaded(store)?;
        Ok(self.area.as_ref())
    }

    /// Persists `vehicle` as the current vehicle.
    pub fn set_vehicle<S: RowStore + ?Sized>(&mut self, store: &S, vehicle: &Vehicle) -> Result<()> {
        self.ensure_loaded(store)?;
        write_setting(store, SettingKey::CurrentVehicle, vehicle.id)?;
        self.vehicle = Some(vehicle.clone());
        Ok(())
    }

    pub fn set_driver<S: RowStore + ?Sized>(&mut self, store: &S, driver: &Person) -> Result<()> {
        self.ensure_loaded(store)?;
        write_setting(store, SettingKey::CurrentDriver, driver.id)?;
        self.driver = Some(driver.clone());
        Ok(())
    }

    pub fn set_area<S: RowStore + ?Sized>(&mut self, store: &S, area: &GeoArea) -> Result<()> {
        self.ensure_loaded(store)?;
        write_setting(store, SettingKey::CurrentArea, area.id)?;
        self.area = Some(area.clone());
        Ok(())
    }

    /// Forgets everything cached; the next read goes to the store.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn ensure_loaded<S: RowStore + ?Sized>(&mut self, store: &S) -> Result<()> {
        if self.loaded && self.owner.as_deref() == store.owner() {
            return Ok(());
        }
        debug!(owner = ?store.owner(), "Loading current settings");
        self.vehicle = load_setting(store, SettingKey::CurrentVehicle)?;
        self.driver = load_setting(store, SettingKey::CurrentDriver)?;
        self.area = load_setting(store, SettingKey::CurrentArea)?;
        self.owner = store.owner().map(|path| path.to_path_buf());
        self.loaded = true;
        Ok(())
    }
}

fn setting_query(key: SettingKey) -> RowQuery {
    RowQuery::new(SETTINGS_TABLE, SETTINGS_FIELDS)
        .filter("sfield = ?", vec![Value::from(key.field())])
        .order_by("_id")
        .limit(1)
}

/// Reads the id stored under `key` and resolves it. A dangling or unreadable
/// setting resolves to `None`.
fn load_setting<E: Entity, S: RowStore + ?Sized>(store: &S, key: SettingKey) -> Result<Option<E>> {
    let rows = store.get_rows(&setting_query(key))?;
    let Some(raw) = rows.first().map(|row| row.opt_text("svalue")).transpose()?.flatten() else {
        return Ok(None);
    };
    let Ok(id) = raw.trim().parse::<i64>() else {
        warn!(key = key.field(), value = %raw, "Ignoring non-numeric setting");
        return Ok(None);
    };
    match load_entity::<E, S>(store, id)? {
        Some(Ok(record)) => Ok(Some(record)),
        Some(Err(err)) => {
            warn!(key = key.field(), id, error = %err, "Ignoring unreadable setting target");
            Ok(None)
        }
        None => {
            warn!(key = key.field(), id, "Setting points at a missing record");
            Ok(None)
        }
    }
}

fn write_setting<S: RowStore + ?Sized>(store: &S, key: SettingKey, id: i64) -> Result<()> {
    let value = Value::from(id.to_string());
    match store.get_rows(&setting_query(key))?.first() {
        Some(row) => {
            store.update(SETTINGS_TABLE, row.id()?, &[("svalue", value)])?;
        }
        None => {
            store.insert(SETTINGS_TABLE, &[("sfield", Value::from(key.field())), ("svalue", value)])?;
        }
    }
    Ok(())
}
