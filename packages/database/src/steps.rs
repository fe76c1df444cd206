//! Versioned rebuild steps.
//!
//! A catalog is built by applying an ordered list of [`CatalogStep`]s. Each
//! applied step is recorded in `_catalog_steps`, so a partially built
//! catalog can be resumed, rolled back one step at a time, or reset.
//!
//! Every [`StepRunner`] command runs in a single transaction: either all of
//! the steps it touches take effect, or none do.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use duckdb::Connection;

use crate::DbError;
use crate::progress::{ProgressCallback, null_progress};

/// Inputs shared by every step of a run.
#[derive(Clone)]
pub struct StepContext {
    source_root: PathBuf,
    progress: Arc<dyn ProgressCallback>,
}

impl StepContext {
    /// Creates a context for an already validated source data root.
    #[must_use]
    pub fn new(source_root: PathBuf, progress: Arc<dyn ProgressCallback>) -> Self {
        Self {
            source_root,
            progress,
        }
    }

    /// Creates a context that reports no progress.
    #[must_use]
    pub fn without_progress(source_root: PathBuf) -> Self {
        Self::new(source_root, null_progress())
    }

    /// Root directory of the raw source data.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Progress sink for long-running steps.
    #[must_use]
    pub fn progress(&self) -> &dyn ProgressCallback {
        self.progress.as_ref()
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("source_root", &self.source_root)
            .finish_non_exhaustive()
    }
}

/// One reversible transformation of the catalog.
///
/// `down` must undo exactly what `up` introduced and nothing else.
pub trait CatalogStep: Send + Sync {
    /// Position of the step in the sequence. Unique per runner.
    fn version(&self) -> u32;

    /// Short human-readable name.
    fn name(&self) -> &'static str;

    /// Applies the step.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the step cannot be applied.
    fn up(&self, conn: &Connection, ctx: &StepContext) -> Result<(), DbError>;

    /// Reverts the step.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the step cannot be reverted.
    fn down(&self, conn: &Connection, ctx: &StepContext) -> Result<(), DbError>;
}

/// Applied/pending state of one registered step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    /// Step version.
    pub version: u32,
    /// Step name.
    pub name: &'static str,
    /// When the step was applied, if it has been.
    pub applied_at: Option<DateTime<Utc>>,
}

impl StepStatus {
    /// Whether the step has been applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.applied_at {
            Some(at) => write!(
                f,
                "{:>4}  {:<28} applied {}",
                self.version,
                self.name,
                at.to_rfc3339()
            ),
            None => write!(f, "{:>4}  {:<28} pending", self.version, self.name),
        }
    }
}

/// Applies and reverts an ordered set of steps.
pub struct StepRunner {
    steps: Vec<Box<dyn CatalogStep>>,
}

impl StepRunner {
    /// Creates a runner, ordering the steps by version.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidSteps`] if two steps share a version.
    pub fn new(mut steps: Vec<Box<dyn CatalogStep>>) -> Result<Self, DbError> {
        steps.sort_by_key(|s| s.version());

        for pair in steps.windows(2) {
            if pair[0].version() == pair[1].version() {
                return Err(DbError::InvalidSteps {
                    message: format!(
                        "steps {} and {} share version {}",
                        pair[0].name(),
                        pair[1].name(),
                        pair[0].version()
                    ),
                });
            }
        }

        Ok(Self { steps })
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Applies every pending step in version order.
    ///
    /// Returns the versions that were applied.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any step fails; nothing is applied in that
    /// case.
    pub fn up(&self, conn: &Connection, ctx: &StepContext) -> Result<Vec<u32>, DbError> {
        self.apply_pending(conn, ctx, usize::MAX)
    }

    /// Applies the next pending step, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the step fails.
    pub fn up_by_one(&self, conn: &Connection, ctx: &StepContext) -> Result<Option<u32>, DbError> {
        Ok(self.apply_pending(conn, ctx, 1)?.into_iter().next())
    }

    /// Reverts the most recently applied step, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the step fails.
    pub fn down(&self, conn: &Connection, ctx: &StepContext) -> Result<Option<u32>, DbError> {
        Ok(self.revert_applied(conn, ctx, 1)?.into_iter().next())
    }

    /// Reverts every applied step, newest first.
    ///
    /// Returns the versions that were reverted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any step fails; nothing is reverted in that
    /// case.
    pub fn reset(&self, conn: &Connection, ctx: &StepContext) -> Result<Vec<u32>, DbError> {
        self.revert_applied(conn, ctx, usize::MAX)
    }

    /// Reverts and re-applies the most recently applied step.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if either direction fails.
    pub fn redo(&self, conn: &Connection, ctx: &StepContext) -> Result<Option<u32>, DbError> {
        ensure_table(conn)?;

        crate::in_transaction(conn, || {
            let applied = applied_versions(conn)?;
            let Some(step) = self
                .steps
                .iter()
                .rev()
                .find(|s| applied.contains_key(&s.version()))
            else {
                log::info!("No applied steps to redo");
                return Ok(None);
            };

            revert(step.as_ref(), conn, ctx)?;
            apply(step.as_ref(), conn, ctx)?;
            Ok(Some(step.version()))
        })
    }

    /// Reports every registered step with its applied time.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the bookkeeping table cannot be read.
    pub fn status(&self, conn: &Connection) -> Result<Vec<StepStatus>, DbError> {
        ensure_table(conn)?;
        let applied = applied_versions(conn)?;

        for version in applied.keys() {
            if !self.steps.iter().any(|s| s.version() == *version) {
                log::warn!("Applied step {version} is not registered");
            }
        }

        Ok(self
            .steps
            .iter()
            .map(|s| StepStatus {
                version: s.version(),
                name: s.name(),
                applied_at: applied.get(&s.version()).copied(),
            })
            .collect())
    }

    /// Highest applied step version, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the bookkeeping table cannot be read.
    pub fn version(&self, conn: &Connection) -> Result<Option<u32>, DbError> {
        ensure_table(conn)?;
        Ok(applied_versions(conn)?.keys().next_back().copied())
    }

    fn apply_pending(
        &self,
        conn: &Connection,
        ctx: &StepContext,
        limit: usize,
    ) -> Result<Vec<u32>, DbError> {
        ensure_table(conn)?;

        crate::in_transaction(conn, || {
            let applied = applied_versions(conn)?;
            let mut done = Vec::new();

            for step in self
                .steps
                .iter()
                .filter(|s| !applied.contains_key(&s.version()))
                .take(limit)
            {
                apply(step.as_ref(), conn, ctx)?;
                done.push(step.version());
            }

            if done.is_empty() {
                log::info!("Catalog is up to date");
            }

            Ok(done)
        })
    }

    fn revert_applied(
        &self,
        conn: &Connection,
        ctx: &StepContext,
        limit: usize,
    ) -> Result<Vec<u32>, DbError> {
        ensure_table(conn)?;

        crate::in_transaction(conn, || {
            let applied = applied_versions(conn)?;
            let mut done = Vec::new();

            for step in self
                .steps
                .iter()
                .rev()
                .filter(|s| applied.contains_key(&s.version()))
                .take(limit)
            {
                revert(step.as_ref(), conn, ctx)?;
                done.push(step.version());
            }

            if done.is_empty() {
                log::info!("No applied steps to revert");
            }

            Ok(done)
        })
    }
}

fn apply(step: &dyn CatalogStep, conn: &Connection, ctx: &StepContext) -> Result<(), DbError> {
    log::info!("Applying step {} ({})", step.version(), step.name());
    step.up(conn, ctx).map_err(|e| wrap(step, e))?;

    conn.execute(
        "INSERT INTO _catalog_steps (version, name, applied_at) VALUES (?, ?, ?)",
        duckdb::params![
            i64::from(step.version()),
            step.name(),
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

fn revert(step: &dyn CatalogStep, conn: &Connection, ctx: &StepContext) -> Result<(), DbError> {
    log::info!("Reverting step {} ({})", step.version(), step.name());
    step.down(conn, ctx).map_err(|e| wrap(step, e))?;

    conn.execute(
        "DELETE FROM _catalog_steps WHERE version = ?",
        [i64::from(step.version())],
    )?;
    Ok(())
}

/// Attributes a step's error to the step, leaving already attributed
/// errors alone.
fn wrap(step: &dyn CatalogStep, error: DbError) -> DbError {
    match error {
        DbError::Step { .. } => error,
        other => DbError::Step {
            version: step.version(),
            name: step.name(),
            source: Box::new(other),
        },
    }
}

fn ensure_table(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _catalog_steps (
            version INTEGER NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn applied_versions(conn: &Connection) -> Result<BTreeMap<u32, DateTime<Utc>>, DbError> {
    let mut stmt = conn.prepare("SELECT version, applied_at FROM _catalog_steps")?;
    let mut rows = stmt.query([])?;

    let mut applied = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let version: i64 = row.get(0)?;
        let applied_at: String = row.get(1)?;

        let version = u32::try_from(version).map_err(|e| DbError::Conversion {
            message: format!("invalid step version {version}: {e}"),
        })?;
        let applied_at = DateTime::parse_from_rfc3339(&applied_at)
            .map_err(|e| DbError::Conversion {
                message: format!("invalid applied_at {applied_at:?} for step {version}: {e}"),
            })?
            .with_timezone(&Utc);

        applied.insert(version, applied_at);
    }

    Ok(applied)
}
