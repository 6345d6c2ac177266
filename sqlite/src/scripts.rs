//! Upgrade-script resources.
//!
//! Scripts are named `<prefix><version>.<ext>` where the version has at least
//! four digits, e.g. `upg_v0906.sql` upgrades *into* version 906. Version 0
//! (`upg_v0000.sql`) is the full-create script for a fresh database.
//!
//! The scripts compiled into this crate cover the built-in migration chain;
//! a [`ScriptSource::Directory`] lets a caller supply its own set.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use triplog_core::SchemaVersion;

use crate::error::{Result, SqliteError};

/// File-name prefix of every script resource.
pub const SCRIPT_PREFIX: &str = "upg_v";

/// File-name extension of every script resource.
pub const SCRIPT_EXTENSION: &str = "sql";

static SCRIPT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^upg_v(\d{4,})\.sql$").expect("static regex must compile")
});

const BUNDLED: &[(i32, &str)] = &[
    (0, include_str!("../scripts/upg_v0000.sql")),
    (902, include_str!("../scripts/upg_v0902.sql")),
    (903, include_str!("../scripts/upg_v0903.sql")),
    (904, include_str!("../scripts/upg_v0904.sql")),
    (906, include_str!("../scripts/upg_v0906.sql")),
    (908, include_str!("../scripts/upg_v0908.sql")),
    (909, include_str!("../scripts/upg_v0909.sql")),
    (911, include_str!("../scripts/upg_v0911.sql")),
    (912, include_str!("../scripts/upg_v0912.sql")),
    (920, include_str!("../scripts/upg_v0920.sql")),
    (931, include_str!("../scripts/upg_v0931.sql")),
    (940, include_str!("../scripts/upg_v0940.sql")),
];

/// Resource name of the script upgrading into `version`.
///
/// # Examples
///
/// ```
/// use triplog_core::SchemaVersion;
/// use triplog_sqlite::script_name;
///
/// assert_eq!(script_name(SchemaVersion::new(906)), "upg_v0906.sql");
/// assert_eq!(script_name(SchemaVersion::CREATE), "upg_v0000.sql");
/// ```
pub fn script_name(version: SchemaVersion) -> String {
    format!("{SCRIPT_PREFIX}{}.{SCRIPT_EXTENSION}", version.padded())
}

/// Parses a resource name back into the version it upgrades into.
///
/// Returns `None` for names that do not follow the convention.
pub fn parse_script_name(name: &str) -> Option<SchemaVersion> {
    let caps = SCRIPT_NAME_RE.captures(name)?;
    caps.get(1)?.as_str().parse().ok().map(SchemaVersion::new)
}

/// Where upgrade scripts are read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScriptSource {
    /// The scripts compiled into this crate (the default).
    #[default]
    Bundled,
    /// A directory of `upg_vNNNN.sql` files.
    Directory(PathBuf),
}

impl ScriptSource {
    /// Opens the script upgrading into `version`, or `None` if this source has none.
    pub fn open(&self, version: SchemaVersion) -> Result<Option<Box<dyn BufRead>>> {
        match self {
            ScriptSource::Bundled => Ok(BUNDLED
                .iter()
                .find(|(v, _)| *v == version.get())
                .map(|(_, text)| Box::new(Cursor::new(text.as_bytes())) as Box<dyn BufRead>)),
            ScriptSource::Directory(dir) => {
                let path = dir.join(script_name(version));
                if !path.is_file() {
                    return Ok(None);
                }
                let file = File::open(&path)?;
                Ok(Some(Box::new(BufReader::new(file))))
            }
        }
    }

    /// Lists the versions this source has scripts for, ascending.
    ///
    /// # Errors
    ///
    /// For a directory source, returns [`SqliteError::InvalidScriptName`] when
    /// a file carries the script prefix but does not parse as a script name.
    pub fn available_versions(&self) -> Result<Vec<SchemaVersion>> {
        match self {
            ScriptSource::Bundled => Ok(BUNDLED
                .iter()
                .map(|(v, _)| SchemaVersion::new(*v))
                .collect()),
            ScriptSource::Directory(dir) => {
                let mut found = BTreeMap::new();
                for entry in std::fs::read_dir(dir)? {
                    let name = entry?.file_name().to_string_lossy().into_owned();
                    if !name.starts_with(SCRIPT_PREFIX) {
                        continue;
                    }
                    let version = parse_script_name(&name)
                        .ok_or_else(|| SqliteError::InvalidScriptName(name.clone()))?;
                    found.insert(version, name);
                }
                Ok(found.into_keys().collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_parse_script_name() {
        assert_eq!(parse_script_name("upg_v0906.sql"), Some(SchemaVersion::new(906)));
        assert_eq!(parse_script_name("upg_v12345.sql"), Some(SchemaVersion::new(12345)));
        assert_eq!(parse_script_name("upg_v906.sql"), None);
        assert_eq!(parse_script_name("upg_v0906.txt"), None);
        assert_eq!(parse_script_name("other.sql"), None);
    }

    #[test]
    fn test_bundled_names_round_trip() {
        for version in ScriptSource::Bundled.available_versions().unwrap() {
            assert_eq!(parse_script_name(&script_name(version)), Some(version));
        }
    }

    #[test]
    fn test_bundled_open() {
        let mut text = String::new();
        ScriptSource::Bundled
            .open(SchemaVersion::new(902))
            .unwrap()
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.contains("gas_brandgrade"));
        assert!(ScriptSource::Bundled.open(SchemaVersion::new(905)).unwrap().is_none());
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("upg_v0950.sql"), "CREATE TABLE x (a int);\n").unwrap();
        std::fs::write(dir.path().join("README"), "not a script").unwrap();
        let source = ScriptSource::Directory(dir.path().to_path_buf());
        assert_eq!(source.available_versions().unwrap(), vec![SchemaVersion::new(950)]);
        assert!(source.open(SchemaVersion::new(950)).unwrap().is_some());
        assert!(source.open(SchemaVersion::new(951)).unwrap().is_none());
    }

    #[test]
    fn test_directory_source_rejects_malformed_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("upg_v95.sql"), "").unwrap();
        let source = ScriptSource::Directory(dir.path().to_path_buf());
        assert!(matches!(
            source.available_versions(),
            Err(SqliteError::InvalidScriptName(_))
        ));
    }
}
