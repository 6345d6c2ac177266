//! The ordered migration chain.
//!
//! Released schema versions form one linear chain of steps, each step
//! connecting a version to its direct successor. Only some steps change the
//! schema and therefore carry a script; the others just move the stamp
//! forward.

use serde::Serialize;
use triplog_core::SchemaVersion;

use crate::error::{EngineError, Result};

/// Oldest schema version the built-in chain can upgrade from.
pub const MIN_UPGRADABLE_VERSION: SchemaVersion = SchemaVersion::new(901);

/// Schema version produced by the built-in chain.
pub const CURRENT_VERSION: SchemaVersion = SchemaVersion::new(943);

/// Built-in steps: `(from, to, has_script)`.
const STANDARD_STEPS: &[(i32, i32, bool)] = &[
    (901, 902, true),
    (902, 903, true),
    (903, 904, true),
    (904, 905, false),
    (905, 906, true),
    (906, 908, true),
    (908, 909, true),
    (909, 910, false),
    (910, 911, true),
    (911, 912, true),
    (912, 920, true),
    (920, 931, true),
    (931, 940, true),
    (940, 943, false),
];

/// One edge of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    /// Whether an upgrade script named after `to` must run for this step.
    pub has_script: bool,
}

impl MigrationStep {
    pub const fn new(from: i32, to: i32, has_script: bool) -> Self {
        Self {
            from: SchemaVersion::new(from),
            to: SchemaVersion::new(to),
            has_script,
        }
    }
}

/// A validated, unbroken sequence of [`MigrationStep`]s.
///
/// # Examples
///
/// ```
/// use triplog_core::SchemaVersion;
/// use triplog_engine::MigrationChain;
///
/// let chain = MigrationChain::standard().unwrap();
/// assert_eq!(chain.minimum(), SchemaVersion::new(901));
/// assert_eq!(chain.current(), SchemaVersion::new(943));
///
/// let path = chain.path_from(SchemaVersion::new(931)).unwrap();
/// assert_eq!(path.len(), 2);
/// assert!(chain.path_from(SchemaVersion::new(907)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationChain {
    steps: Vec<MigrationStep>,
}

impl MigrationChain {
    /// Builds a chain from `minimum` to `current`, checking that every step
    /// moves strictly forward and starts where the previous one ended.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BrokenChain`] on an empty list, a step that
    /// does not advance, a gap between consecutive steps, or ends that differ
    /// from `minimum` and `current`.
    pub fn new(
        steps: Vec<MigrationStep>,
        minimum: SchemaVersion,
        current: SchemaVersion,
    ) -> Result<Self> {
        let (Some(first), Some(last)) = (steps.first(), steps.last()) else {
            return Err(EngineError::BrokenChain("no steps".into()));
        };
        if first.from != minimum {
            return Err(EngineError::BrokenChain(format!(
                "chain starts at {}, expected {minimum}",
                first.from
            )));
        }
        if last.to != current {
            return Err(EngineError::BrokenChain(format!(
                "chain ends at {}, expected {current}",
                last.to
            )));
        }
        for step in &steps {
            if step.to <= step.from {
                return Err(EngineError::BrokenChain(format!(
                    "step {} -> {} does not advance",
                    step.from, step.to
                )));
            }
        }
        for pair in steps.windows(2) {
            if pair[0].to != pair[1].from {
                return Err(EngineError::BrokenChain(format!(
                    "gap between {} and {}",
                    pair[0].to, pair[1].from
                )));
            }
        }
        Ok(Self { steps })
    }

    /// The chain of released logbook schema versions, 901 through 943.
    pub fn standard() -> Result<Self> {
        Self::new(
            STANDARD_STEPS
                .iter()
                .map(|&(from, to, has_script)| MigrationStep::new(from, to, has_script))
                .collect(),
            MIN_UPGRADABLE_VERSION,
            CURRENT_VERSION,
        )
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Oldest version this chain upgrades from.
    pub fn minimum(&self) -> SchemaVersion {
        self.steps[0].from
    }

    /// Version every upgrade ends at.
    pub fn current(&self) -> SchemaVersion {
        self.steps[self.steps.len() - 1].to
    }

    /// Every version on the chain, oldest first.
    pub fn versions(&self) -> impl Iterator<Item = SchemaVersion> + '_ {
        std::iter::once(self.minimum()).chain(self.steps.iter().map(|s| s.to))
    }

    pub fn contains(&self, version: SchemaVersion) -> bool {
        self.versions().any(|v| v == version)
    }

    /// The steps leading from `from` to [`current`](Self::current); empty
    /// when `from` is already current.
    ///
    /// # Errors
    ///
    /// [`EngineError::TooOld`] below the minimum,
    /// [`EngineError::NewerThanCurrent`] above the current version, and
    /// [`EngineError::UnknownVersion`] for an in-range version that is not
    /// on the chain.
    pub fn path_from(&self, from: SchemaVersion) -> Result<&[MigrationStep]> {
        if from < self.minimum() {
            return Err(EngineError::TooOld {
                version: from,
                minimum: self.minimum(),
            });
        }
        if from > self.current() {
            return Err(EngineError::NewerThanCurrent {
                version: from,
                current: self.current(),
            });
        }
        if !self.contains(from) {
            return Err(EngineError::UnknownVersion(from));
        }
        let start = self.steps.partition_point(|step| step.from < from);
        Ok(&self.steps[start..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_chain_bounds() {
        let chain = MigrationChain::standard().unwrap();
        assert_eq!(chain.minimum(), MIN_UPGRADABLE_VERSION);
        assert_eq!(chain.current(), CURRENT_VERSION);
        assert_eq!(chain.steps().len(), 14);
    }

    #[test]
    fn test_standard_script_steps() {
        let chain = MigrationChain::standard().unwrap();
        let scripted: Vec<i32> = chain
            .steps()
            .iter()
            .filter(|s| s.has_script)
            .map(|s| s.to.get())
            .collect();
        assert_eq!(
            scripted,
            vec![902, 903, 904, 906, 908, 909, 911, 912, 920, 931, 940]
        );
    }

    #[test]
    fn test_every_node_reaches_current() {
        let chain = MigrationChain::standard().unwrap();
        for version in chain.versions() {
            let path = chain.path_from(version).unwrap();
            let mut at = version;
            for step in path {
                assert_eq!(step.from, at);
                at = step.to;
            }
            assert_eq!(at, CURRENT_VERSION);
        }
    }

    #[test]
    fn test_rejections() {
        let chain = MigrationChain::standard().unwrap();
        assert!(matches!(
            chain.path_from(SchemaVersion::new(900)),
            Err(EngineError::TooOld { .. })
        ));
        assert!(matches!(
            chain.path_from(SchemaVersion::new(944)),
            Err(EngineError::NewerThanCurrent { .. })
        ));
        for gap in [907, 913, 930, 941, 942] {
            assert!(matches!(
                chain.path_from(SchemaVersion::new(gap)),
                Err(EngineError::UnknownVersion(_))
            ));
        }
        assert!(chain.path_from(CURRENT_VERSION).unwrap().is_empty());
    }

    fn chain(steps: Vec<MigrationStep>, minimum: i32, current: i32) -> Result<MigrationChain> {
        MigrationChain::new(steps, SchemaVersion::new(minimum), SchemaVersion::new(current))
    }

    #[test]
    fn test_broken_chains_rejected() {
        assert!(chain(vec![], 1, 2).is_err());
        assert!(
            chain(
                vec![MigrationStep::new(1, 2, true), MigrationStep::new(3, 4, true)],
                1,
                4
            )
            .is_err()
        );
        assert!(chain(vec![MigrationStep::new(5, 5, false)], 5, 5).is_err());
        assert!(
            chain(
                vec![MigrationStep::new(1, 3, true), MigrationStep::new(3, 2, true)],
                1,
                2
            )
            .is_err()
        );
    }

    #[test]
    fn test_declared_bounds_must_match_steps() {
        let steps = vec![MigrationStep::new(901, 902, true), MigrationStep::new(902, 903, false)];
        assert!(chain(steps.clone(), 901, 903).is_ok());
        assert!(matches!(
            chain(steps.clone(), 900, 903),
            Err(EngineError::BrokenChain(msg)) if msg.contains("starts at 901")
        ));
        assert!(matches!(
            chain(steps, 901, 943),
            Err(EngineError::BrokenChain(msg)) if msg.contains("ends at 903")
        ));
    }

    #[test]
    fn test_contains_only_chain_nodes() {
        let chain = MigrationChain::standard().unwrap();
        assert!(chain.contains(MIN_UPGRADABLE_VERSION));
        assert!(chain.contains(SchemaVersion::new(920)));
        assert!(chain.contains(CURRENT_VERSION));
        assert!(!chain.contains(SchemaVersion::new(907)));
        assert!(!chain.contains(SchemaVersion::new(944)));
    }
}
