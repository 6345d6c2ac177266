//! Multi-level integrity verification.
//!
//! Verification runs in cumulative passes of increasing cost:
//!
//! 1. [`Physical`](VerificationLevel::Physical): the storage engine's own
//!    structural check.
//! 2. [`MasterData`](VerificationLevel::MasterData): every reference between
//!    vehicles, persons, areas, locations, routes and frequent trips resolves.
//! 3. [`TransactionalData`](VerificationLevel::TransactionalData): trips,
//!    stops and fuel purchases reference valid master data and are
//!    geographically consistent.
//!
//! A [`Verifier`] remembers the highest pass that succeeded and never reruns
//! it, so asking for level 3 after level 2 passed only runs level 3.
//!
//! # Example
//!
//! ```ignore
//! let mut verifier = Verifier::new(&store);
//! match verifier.verify(VerificationLevel::TransactionalData)? {
//!     None => println!("clean"),
//!     Some(level) => {
//!         for item in verifier.failed_items() {
//!             println!("{level}: {}", item.description);
//!         }
//!     }
//! }
//! ```

mod master;
mod pass;
mod transactional;

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};
use triplog_core::{FailedItem, FailureCollector, RowStore};

use crate::config::VerifyConfig;
use crate::error::{EngineError, Result};
use pass::Pass;

/// Ordinal reported when every requested pass succeeded.
pub const VERIFY_OK: i32 = 0;

/// A verification pass, ordered by cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationLevel {
    Physical = 1,
    MasterData = 2,
    TransactionalData = 3,
}

impl VerificationLevel {
    /// All levels, cheapest first.
    pub const ALL: [VerificationLevel; 3] = [
        VerificationLevel::Physical,
        VerificationLevel::MasterData,
        VerificationLevel::TransactionalData,
    ];

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Maps an ordinal (1, 2 or 3) back to its level.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidLevel`] for any other value.
    pub fn from_ordinal(ordinal: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.ordinal() == ordinal)
            .ok_or(EngineError::InvalidLevel(ordinal))
    }
}

impl TryFrom<i32> for VerificationLevel {
    type Error = EngineError;

    fn try_from(ordinal: i32) -> Result<Self> {
        Self::from_ordinal(ordinal)
    }
}

impl fmt::Display for VerificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerificationLevel::Physical => "PHYSICAL",
            VerificationLevel::MasterData => "MASTER_DATA",
            VerificationLevel::TransactionalData => "TRANSACTIONAL_DATA",
        })
    }
}

/// Runs verification passes against one store.
///
/// The verifier borrows the store; [`release`](Self::release) drops that
/// borrow early, after which every verification call fails with
/// [`EngineError::Released`].
pub struct Verifier<'s, S: RowStore + ?Sized> {
    store: Option<&'s S>,
    completed: Option<VerificationLevel>,
    failures: FailureCollector,
}

impl<'s, S: RowStore + ?Sized> Verifier<'s, S> {
    /// A verifier with the default failure cap and descriptions kept.
    pub fn new(store: &'s S) -> Self {
        Self::with_config(store, &VerifyConfig::default())
    }

    pub fn with_config(store: &'s S, config: &VerifyConfig) -> Self {
        Self {
            store: Some(store),
            completed: None,
            failures: config.collector(),
        }
    }

    /// Runs every pass up to and including `level` that has not already
    /// succeeded.
    ///
    /// Returns `None` when all of them pass, or the first failing level. The
    /// failures found are available from [`failed_items`](Self::failed_items)
    /// until the next call.
    ///
    /// # Errors
    ///
    /// [`EngineError::Released`] after [`release`](Self::release); store
    /// errors raised while reading propagate unchanged.
    pub fn verify(&mut self, level: VerificationLevel) -> Result<Option<VerificationLevel>> {
        let store = self.store.ok_or(EngineError::Released)?;
        self.failures.clear();
        for pass in VerificationLevel::ALL {
            if pass > level || Some(pass) <= self.completed {
                continue;
            }
            info!(level = %pass, "Running verification pass");
            let clean = match pass {
                VerificationLevel::Physical => self.physical(store)?,
                VerificationLevel::MasterData => self.data_pass(store, master::run)?,
                VerificationLevel::TransactionalData => self.data_pass(store, transactional::run)?,
            };
            if !clean {
                warn!(level = %pass, failures = self.failures.len(), "Verification failed");
                return Ok(Some(pass));
            }
            self.completed = Some(pass);
        }
        info!(level = %level, "Verification passed");
        Ok(None)
    }

    /// Ordinal form of [`verify`](Self::verify): returns [`VERIFY_OK`] or the
    /// ordinal of the failing level.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidLevel`] when `ordinal` is not 1, 2 or 3.
    pub fn verify_ordinal(&mut self, ordinal: i32) -> Result<i32> {
        let level = VerificationLevel::from_ordinal(ordinal)?;
        Ok(self.verify(level)?.map_or(VERIFY_OK, VerificationLevel::ordinal))
    }

    /// Highest level that has passed so far.
    pub fn highest_completed(&self) -> Option<VerificationLevel> {
        self.completed
    }

    /// Failures collected by the most recent [`verify`](Self::verify).
    pub fn failed_items(&self) -> &[FailedItem] {
        self.failures.items()
    }

    pub fn failures(&self) -> &FailureCollector {
        &self.failures
    }

    /// Drops the store reference. Collected failures stay readable.
    pub fn release(&mut self) {
        self.store = None;
    }

    pub fn is_released(&self) -> bool {
        self.store.is_none()
    }

    fn physical(&mut self, store: &S) -> Result<bool> {
        match store.physical_integrity_check()? {
            None => Ok(true),
            Some(diagnostic) => {
                warn!(diagnostic = %diagnostic, "Physical integrity check failed");
                self.failures.add(FailedItem::database(diagnostic));
                Ok(false)
            }
        }
    }

    fn data_pass(
        &mut self,
        store: &S,
        run: fn(&mut Pass<'_, S>) -> Result<()>,
    ) -> Result<bool> {
        let mut pass = Pass::new(store, &mut self.failures);
        let before = pass.failure_count();
        run(&mut pass)?;
        Ok(pass.failure_count() == before)
    }
}
