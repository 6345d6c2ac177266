//! Schema upgrades along the migration chain.
//!
//! The persisted schema version lives in two places: the `appinfo` metadata
//! row `DB_CURRENT_SCHEMAVERSION` (zero-padded, e.g. `"0943"`) and,
//! optionally, the storage-native version stamp. Every successful upgrade
//! also appends one row to `db_upgrade_hist`.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};
use triplog_core::{RowQuery, RowStore, SchemaVersion, StoreError, Value};

use crate::chain::{MigrationChain, MigrationStep};
use crate::error::{EngineError, Result};
use crate::script::apply_script;
use crate::verify::{VerificationLevel, Verifier};

/// Table holding application metadata as `aifield`/`aivalue` pairs.
pub const METADATA_TABLE: &str = "appinfo";

/// Metadata key of the persisted schema version.
pub const SCHEMA_VERSION_FIELD: &str = "DB_CURRENT_SCHEMAVERSION";

/// Table recording one row per completed upgrade.
pub const HISTORY_TABLE: &str = "db_upgrade_hist";

const METADATA_FIELDS: &[&str] = &["_id", "aifield", "aivalue"];
const HISTORY_FIELDS: &[&str] = &["_id", "db_vers_to", "db_vers_from", "upg_time"];

/// Outcome of an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    /// Chain steps walked, with or without a script.
    pub steps_applied: usize,
    /// Names of the scripts executed, in order.
    pub scripts_run: Vec<String>,
}

impl UpgradeReport {
    /// True when the store was already current and nothing was written.
    pub fn is_noop(&self) -> bool {
        self.steps_applied == 0
    }
}

/// Where a store's persisted version stands relative to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "version", rename_all = "snake_case")]
pub enum SchemaStatus {
    Current,
    UpgradeNeeded(SchemaVersion),
    TooOld(SchemaVersion),
    TooNew(SchemaVersion),
    /// Inside the upgradable range but not a released version.
    Unknown(SchemaVersion),
}

/// One row of the upgrade history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeRecord {
    pub id: i64,
    pub to: SchemaVersion,
    pub from: SchemaVersion,
    /// Seconds since the Unix epoch.
    pub upgraded_at: i64,
}

/// Applies the migration chain to row stores.
///
/// # Examples
///
/// ```ignore
/// let engine = MigrationEngine::standard()?;
/// let from = read_schema_version(&store)?;
/// let report = engine.upgrade_to_current(&store, from, false)?;
/// println!("{} -> {}: {} scripts", report.from, report.to, report.scripts_run.len());
/// ```
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    chain: MigrationChain,
}

impl MigrationEngine {
    pub fn new(chain: MigrationChain) -> Self {
        Self { chain }
    }

    /// An engine over [`MigrationChain::standard`].
    pub fn standard() -> Result<Self> {
        Ok(Self::new(MigrationChain::standard()?))
    }

    pub fn chain(&self) -> &MigrationChain {
        &self.chain
    }

    pub fn current_version(&self) -> SchemaVersion {
        self.chain.current()
    }

    /// Upgrades `store` from schema version `from` to the current version.
    ///
    /// Nothing is written when `from` is already current. Otherwise each
    /// step's script runs in chain order, then the native version stamp
    /// (unless `skip_native_version_pragma`), the metadata row, and one
    /// history row are written.
    ///
    /// # Errors
    ///
    /// Version rejections ([`EngineError::TooOld`],
    /// [`EngineError::NewerThanCurrent`], [`EngineError::UnknownVersion`]) and
    /// [`EngineError::MissingScript`] are raised before the store is touched.
    /// A failing statement aborts with [`EngineError::Script`]; steps already
    /// applied are not rolled back.
    pub fn upgrade_to_current<S: RowStore + ?Sized>(
        &self,
        store: &S,
        from: SchemaVersion,
        skip_native_version_pragma: bool,
    ) -> Result<UpgradeReport> {
        let current = self.current_version();
        let path = self.chain.path_from(from)?;
        if path.is_empty() {
            info!(version = %current, "Schema already current");
            return Ok(UpgradeReport {
                from,
                to: current,
                steps_applied: 0,
                scripts_run: Vec::new(),
            });
        }
        ensure_scripts_present(store, path)?;

        info!(from = %from, to = %current, steps = path.len(), "Upgrading schema");
        let mut scripts_run = Vec::new();
        for step in path {
            if step.has_script {
                scripts_run.push(run_step_script(store, step)?);
            } else {
                debug!(from = %step.from, to = %step.to, "Version-only step");
            }
        }

        stamp_version(store, current, skip_native_version_pragma)?;
        store.insert(
            HISTORY_TABLE,
            &[
                ("db_vers_to", Value::from(current.get())),
                ("db_vers_from", Value::from(from.get())),
                ("upg_time", Value::from(chrono::Utc::now().timestamp())),
            ],
        )?;
        info!(from = %from, to = %current, scripts = scripts_run.len(), "Schema upgrade complete");

        Ok(UpgradeReport {
            from,
            to: current,
            steps_applied: path.len(),
            scripts_run,
        })
    }

    /// Copies the database file at `source` to `dest`, checks the copy's
    /// physical integrity, and upgrades the copy. `source` is never opened.
    ///
    /// `opener` turns the copied file into a store; the store is closed
    /// before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// [`EngineError::DestinationExists`] if `dest` exists,
    /// [`EngineError::Validation`] (naming `dest`, which is left on disk)
    /// when the copy is physically damaged, plus anything
    /// [`upgrade_to_current`](Self::upgrade_to_current) raises.
    pub fn upgrade_copy_to_current<S, F>(
        &self,
        source: &Path,
        dest: &Path,
        from: SchemaVersion,
        opener: F,
    ) -> Result<UpgradeReport>
    where
        S: RowStore,
        F: FnOnce(&Path) -> std::result::Result<S, StoreError>,
    {
        self.chain.path_from(from)?;
        let bytes = copy_to_new_file(source, dest)?;
        info!(source = %source.display(), dest = %dest.display(), bytes, "Copied database for upgrade");

        let mut store = opener(dest)?;
        let outcome = self.validate_and_upgrade(&store, dest, from);
        let closed = store.close();
        let report = outcome?;
        closed?;
        Ok(report)
    }

    fn validate_and_upgrade<S: RowStore>(
        &self,
        store: &S,
        dest: &Path,
        from: SchemaVersion,
    ) -> Result<UpgradeReport> {
        let mut verifier = Verifier::new(store);
        if verifier.verify(VerificationLevel::Physical)?.is_some() {
            let diagnostic = verifier
                .failed_items()
                .first()
                .map(|item| item.description.clone())
                .unwrap_or_default();
            warn!(dest = %dest.display(), diagnostic = %diagnostic, "Copied database failed validation");
            return Err(EngineError::Validation {
                path: dest.to_path_buf(),
                diagnostic,
            });
        }
        verifier.release();
        self.upgrade_to_current(store, from, false)
    }

    /// Creates the current schema in an empty store and stamps it current.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingScript`] if the store has no full-create
    /// script; statement failures as for upgrades.
    pub fn create_current<S: RowStore + ?Sized>(
        &self,
        store: &S,
        skip_native_version_pragma: bool,
    ) -> Result<()> {
        let name = store.script_name(SchemaVersion::CREATE);
        let reader = store
            .upgrade_script(SchemaVersion::CREATE)?
            .ok_or_else(|| EngineError::MissingScript(name.clone()))?;
        let stats = apply_script(store, &name, reader)?;
        stamp_version(store, self.current_version(), skip_native_version_pragma)?;
        info!(version = %self.current_version(), statements = stats.executed, "Created schema");
        Ok(())
    }

    /// Classifies the store's persisted version against the chain.
    pub fn schema_status<S: RowStore + ?Sized>(&self, store: &S) -> Result<SchemaStatus> {
        let version = read_schema_version(store)?;
        Ok(match self.chain.path_from(version) {
            Ok([]) => SchemaStatus::Current,
            Ok(_) => SchemaStatus::UpgradeNeeded(version),
            Err(EngineError::TooOld { .. }) => SchemaStatus::TooOld(version),
            Err(EngineError::NewerThanCurrent { .. }) => SchemaStatus::TooNew(version),
            Err(_) => SchemaStatus::Unknown(version),
        })
    }
}

/// Copies `source` into a file created at `dest`, failing if `dest` exists.
fn copy_to_new_file(source: &Path, dest: &Path) -> Result<u64> {
    let mut reader = File::open(source)?;
    let mut writer = match OpenOptions::new().write(true).create_new(true).open(dest) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(EngineError::DestinationExists(dest.to_path_buf()));
        }
        Err(err) => return Err(err.into()),
    };
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    Ok(bytes)
}

fn ensure_scripts_present<S: RowStore + ?Sized>(store: &S, path: &[MigrationStep]) -> Result<()> {
    for step in path.iter().filter(|step| step.has_script) {
        if store.upgrade_script(step.to)?.is_none() {
            return Err(EngineError::MissingScript(store.script_name(step.to)));
        }
    }
    Ok(())
}

fn run_step_script<S: RowStore + ?Sized>(store: &S, step: &MigrationStep) -> Result<String> {
    let name = store.script_name(step.to);
    let reader = store
        .upgrade_script(step.to)?
        .ok_or_else(|| EngineError::MissingScript(name.clone()))?;
    let stats = apply_script(store, &name, reader)?;
    debug!(
        script = %name,
        statements = stats.executed,
        skipped = stats.skipped,
        "Applied upgrade script"
    );
    Ok(name)
}

/// Writes `version` to the native stamp (unless skipped) and the metadata row.
fn stamp_version<S: RowStore + ?Sized>(
    store: &S,
    version: SchemaVersion,
    skip_native_version_pragma: bool,
) -> Result<()> {
    if skip_native_version_pragma {
        debug!("Skipping native version stamp");
    } else {
        store.exec_raw(&format!("PRAGMA user_version = {}", version.get()))?;
    }
    let padded = Value::from(version.padded());
    match find_metadata_row(store)? {
        Some(id) => {
            store.update(METADATA_TABLE, id, &[("aivalue", padded)])?;
        }
        None => {
            store.insert(
                METADATA_TABLE,
                &[("aifield", Value::from(SCHEMA_VERSION_FIELD)), ("aivalue", padded)],
            )?;
        }
    }
    Ok(())
}

fn metadata_query() -> RowQuery {
    RowQuery::new(METADATA_TABLE, METADATA_FIELDS)
        .filter("aifield = ?", vec![Value::from(SCHEMA_VERSION_FIELD)])
        .order_by("_id")
        .limit(1)
}

fn find_metadata_row<S: RowStore + ?Sized>(store: &S) -> Result<Option<i64>> {
    match store.get_rows(&metadata_query())?.first() {
        Some(row) => Ok(Some(row.id()?)),
        None => Ok(None),
    }
}

/// Reads the persisted schema version from the metadata row.
///
/// # Errors
///
/// [`EngineError::Metadata`] when the row is missing or not a version.
pub fn read_schema_version<S: RowStore + ?Sized>(store: &S) -> Result<SchemaVersion> {
    let rows = store.get_rows(&metadata_query())?;
    let row = rows
        .first()
        .ok_or_else(|| EngineError::Metadata(format!("no {SCHEMA_VERSION_FIELD} row")))?;
    let raw = row.opt_text("aivalue")?.unwrap_or_default();
    SchemaVersion::parse_padded(&raw)
        .ok_or_else(|| EngineError::Metadata(format!("unreadable schema version {raw:?}")))
}

/// Lists the upgrade history, oldest first.
pub fn upgrade_history<S: RowStore + ?Sized>(store: &S) -> Result<Vec<UpgradeRecord>> {
    let query = RowQuery::new(HISTORY_TABLE, HISTORY_FIELDS).order_by("_id");
    store
        .get_rows(&query)?
        .iter()
        .map(|row| -> Result<UpgradeRecord> {
            Ok(UpgradeRecord {
                id: row.id()?,
                to: SchemaVersion::new(version_column(row.i64("db_vers_to")?)?),
                from: SchemaVersion::new(version_column(row.i64("db_vers_from")?)?),
                upgraded_at: row.i64("upg_time")?,
            })
        })
        .collect()
}

fn version_column(raw: i64) -> Result<i32> {
    i32::try_from(raw).map_err(|_| EngineError::Metadata(format!("version {raw} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{CURRENT_VERSION, MIN_UPGRADABLE_VERSION};
    use crate::testing::FakeStore;
    use triplog_core::Row;

    const SCRIPTED: [i32; 11] = [902, 903, 904, 906, 908, 909, 911, 912, 920, 931, 940];

    fn store_at(version: &str) -> FakeStore {
        let store = FakeStore::new();
        store.put(
            Row::new(METADATA_TABLE)
                .with("_id", 1)
                .with("aifield", SCHEMA_VERSION_FIELD)
                .with("aivalue", version),
        );
        for v in SCRIPTED {
            store.add_script(v, &format!("-- upgrade to {v}\nCREATE TABLE t{v} (x int);\n"));
        }
        store
    }

    #[test]
    fn test_full_upgrade_from_oldest() {
        let store = store_at("0901");
        let engine = MigrationEngine::standard().unwrap();
        let report = engine
            .upgrade_to_current(&store, MIN_UPGRADABLE_VERSION, false)
            .unwrap();

        assert_eq!(report.steps_applied, 14);
        assert_eq!(report.scripts_run.len(), 11);
        assert_eq!(report.scripts_run[0], "upg_v0902.sql");
        assert_eq!(report.scripts_run[10], "upg_v0940.sql");

        let executed = store.executed.borrow();
        assert_eq!(executed[0], "CREATE TABLE t902 (x int);");
        assert_eq!(executed.last().unwrap(), "PRAGMA user_version = 943");
        drop(executed);

        assert_eq!(read_schema_version(&store).unwrap(), CURRENT_VERSION);
        assert_eq!(store.native_version.get(), 943);
        let history = upgrade_history(&store).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to, CURRENT_VERSION);
        assert_eq!(history[0].from, MIN_UPGRADABLE_VERSION);
    }

    #[test]
    fn test_partial_upgrade_runs_only_later_scripts() {
        let store = store_at("0931");
        let engine = MigrationEngine::standard().unwrap();
        let report = engine
            .upgrade_to_current(&store, SchemaVersion::new(931), false)
            .unwrap();
        assert_eq!(report.steps_applied, 2);
        assert_eq!(report.scripts_run, vec!["upg_v0940.sql".to_string()]);
    }

    #[test]
    fn test_every_chain_version_reaches_current() {
        let engine = MigrationEngine::standard().unwrap();
        for version in engine.chain().versions() {
            let store = store_at(&version.padded());
            engine.upgrade_to_current(&store, version, false).unwrap();
            assert_eq!(read_schema_version(&store).unwrap(), CURRENT_VERSION);
        }
    }

    #[test]
    fn test_current_store_is_left_untouched() {
        let store = store_at("0943");
        let engine = MigrationEngine::standard().unwrap();
        let report = engine.upgrade_to_current(&store, CURRENT_VERSION, false).unwrap();
        assert!(report.is_noop());
        assert!(store.executed.borrow().is_empty());
        assert!(store.rows(HISTORY_TABLE).is_empty());
    }

    #[test]
    fn test_out_of_range_versions_touch_nothing() {
        let engine = MigrationEngine::standard().unwrap();
        for (version, expect_old) in [(900, true), (944, false)] {
            let store = store_at("0900");
            let err = engine
                .upgrade_to_current(&store, SchemaVersion::new(version), false)
                .unwrap_err();
            assert!(err.is_out_of_range());
            if expect_old {
                assert!(matches!(err, EngineError::TooOld { .. }));
            } else {
                assert!(matches!(err, EngineError::NewerThanCurrent { .. }));
            }
            assert!(store.executed.borrow().is_empty());
            assert!(store.rows(HISTORY_TABLE).is_empty());
        }
    }

    #[test]
    fn test_unreleased_version_rejected() {
        let store = store_at("0907");
        let engine = MigrationEngine::standard().unwrap();
        let err = engine
            .upgrade_to_current(&store, SchemaVersion::new(907), false)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownVersion(v) if v.get() == 907));
        assert!(store.executed.borrow().is_empty());
    }

    #[test]
    fn test_missing_script_detected_before_changes() {
        let store = store_at("0901");
        store.scripts.borrow_mut().remove(&920);
        let engine = MigrationEngine::standard().unwrap();
        let err = engine
            .upgrade_to_current(&store, MIN_UPGRADABLE_VERSION, false)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingScript(name) if name == "upg_v0920.sql"));
        assert!(store.executed.borrow().is_empty());
    }

    #[test]
    fn test_failing_statement_names_script() {
        let store = store_at("0901");
        *store.fail_on.borrow_mut() = Some("t909".into());
        let engine = MigrationEngine::standard().unwrap();
        let err = engine
            .upgrade_to_current(&store, MIN_UPGRADABLE_VERSION, false)
            .unwrap_err();
        assert!(matches!(err, EngineError::Script { script, .. } if script == "upg_v0909.sql"));
        assert!(store.rows(HISTORY_TABLE).is_empty());
        assert_eq!(read_schema_version(&store).unwrap().get(), 901);
    }

    #[test]
    fn test_native_stamp_can_be_skipped() {
        let store = store_at("0940");
        let engine = MigrationEngine::standard().unwrap();
        engine
            .upgrade_to_current(&store, SchemaVersion::new(940), true)
            .unwrap();
        assert_eq!(store.native_version.get(), 0);
        assert_eq!(read_schema_version(&store).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_missing_metadata_row_is_inserted() {
        let store = FakeStore::new();
        let engine = MigrationEngine::standard().unwrap();
        engine
            .upgrade_to_current(&store, SchemaVersion::new(940), false)
            .unwrap();
        assert_eq!(read_schema_version(&store).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_create_current() {
        let store = FakeStore::new();
        store.add_script(0, "CREATE TABLE vehicle (_id integer);\n");
        let engine = MigrationEngine::standard().unwrap();
        engine.create_current(&store, false).unwrap();
        assert_eq!(store.executed.borrow()[0], "CREATE TABLE vehicle (_id integer);");
        assert_eq!(read_schema_version(&store).unwrap(), CURRENT_VERSION);
        assert_eq!(engine.schema_status(&store).unwrap(), SchemaStatus::Current);
    }

    #[test]
    fn test_create_without_script() {
        let store = FakeStore::new();
        let engine = MigrationEngine::standard().unwrap();
        assert!(matches!(
            engine.create_current(&store, false),
            Err(EngineError::MissingScript(name)) if name == "upg_v0000.sql"
        ));
    }

    #[test]
    fn test_schema_status() {
        let engine = MigrationEngine::standard().unwrap();
        let cases = [
            ("0943", SchemaStatus::Current),
            ("0920", SchemaStatus::UpgradeNeeded(SchemaVersion::new(920))),
            ("0850", SchemaStatus::TooOld(SchemaVersion::new(850))),
            ("0950", SchemaStatus::TooNew(SchemaVersion::new(950))),
            ("0907", SchemaStatus::Unknown(SchemaVersion::new(907))),
        ];
        for (raw, expected) in cases {
            assert_eq!(engine.schema_status(&store_at(raw)).unwrap(), expected);
        }
    }

    #[test]
    fn test_read_schema_version_errors() {
        assert!(matches!(
            read_schema_version(&FakeStore::new()),
            Err(EngineError::Metadata(_))
        ));
        assert!(matches!(
            read_schema_version(&store_at("nine-oh-one")),
            Err(EngineError::Metadata(_))
        ));
    }

    #[test]
    fn test_upgrade_copy_rejects_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.db");
        let dest = dir.path().join("dest.db");
        std::fs::write(&source, b"source").unwrap();
        std::fs::write(&dest, b"already here").unwrap();

        let engine = MigrationEngine::standard().unwrap();
        let err = engine
            .upgrade_copy_to_current(&source, &dest, MIN_UPGRADABLE_VERSION, |_| {
                Ok(FakeStore::new())
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::DestinationExists(_)));
        assert_eq!(std::fs::read(&dest).unwrap(), b"already here");
    }

    #[test]
    fn test_upgrade_copy_validation_failure_keeps_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.db");
        let dest = dir.path().join("dest.db");
        std::fs::write(&source, b"garbage").unwrap();

        let engine = MigrationEngine::standard().unwrap();
        let err = engine
            .upgrade_copy_to_current(&source, &dest, MIN_UPGRADABLE_VERSION, |_| {
                let store = store_at("0901");
                *store.physical_diagnostic.borrow_mut() = Some("file is not a database".into());
                Ok(store)
            })
            .unwrap_err();
        match err {
            EngineError::Validation { path, diagnostic } => {
                assert_eq!(path, dest);
                assert_eq!(diagnostic, "file is not a database");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read(&dest).unwrap(), b"garbage");
        assert_eq!(std::fs::read(&source).unwrap(), b"garbage");
    }

    #[test]
    fn test_upgrade_copy_of_missing_source_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing.db");
        let dest = dir.path().join("dest.db");

        let engine = MigrationEngine::standard().unwrap();
        let err = engine
            .upgrade_copy_to_current(&source, &dest, MIN_UPGRADABLE_VERSION, |_| {
                Ok(FakeStore::new())
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn test_upgrade_copy_rejects_version_before_copying() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.db");
        let dest = dir.path().join("dest.db");
        std::fs::write(&source, b"source").unwrap();

        let engine = MigrationEngine::standard().unwrap();
        let err = engine
            .upgrade_copy_to_current(&source, &dest, SchemaVersion::new(100), |_| {
                Ok(FakeStore::new())
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::TooOld { .. }));
        assert!(!dest.exists());
    }
}
