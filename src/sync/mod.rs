//! Import and refresh cycles.
//!
//! Both cycles fan out one fetch per feed identity through
//! `buffer_unordered`, then fan the results back in on the calling task.
//! Only that consumer loop touches the [`Store`], so merges and writes happen
//! one arrival at a time without locking.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{AppPaths, Config};
use crate::feed::{read_identity_list, FetchError, FetchFailure, Fetcher};
use crate::palette::{Palette, NEUTRAL_COLOR};
use crate::storage::{StorageError, Store};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Import list not found: {}", .0.display())]
    ImportSourceNotFound(PathBuf),

    #[error("A sync cycle is already running")]
    Busy,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// ============================================================================
// Busy flag
// ============================================================================

/// Shared "a cycle is running" flag.
///
/// Clones observe the same state. The UI checks it before destructive
/// actions.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }
}

/// Clears the busy flag when dropped, on every exit path.
#[derive(Debug)]
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// Progress and reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Import,
    Refresh,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Import => f.write_str("Importing"),
            SyncPhase::Refresh => f.write_str("Updating"),
        }
    }
}

/// Sent after every arrival. Displays as `Updating (3/10)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub done: usize,
    pub total: usize,
    /// Identity of the feed that just arrived.
    pub link: String,
    pub failed: bool,
    /// Groups whose members have now all arrived this cycle.
    pub settled_groups: Vec<String>,
}

impl std::fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}/{})", self.phase, self.done, self.total)
    }
}

#[derive(Debug, Default)]
pub struct ImportReport {
    /// Identities listed in the file after blank, comment and repeated
    /// lines are dropped.
    pub listed: usize,
    /// Identities skipped because the store already had them.
    pub already_present: usize,
    pub added: Vec<String>,
    pub failed: Vec<FetchFailure>,
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    pub total: usize,
    pub updated: Vec<String>,
    /// Feeds now showing their error placeholder.
    pub failed: Vec<FetchFailure>,
    /// Groups in the order they settled.
    pub settled_groups: Vec<String>,
}

#[derive(Debug)]
pub enum AddOutcome {
    Added(String),
    AlreadyPresent,
    Failed(FetchFailure),
}

// ============================================================================
// Syncer
// ============================================================================

/// Runs fetch cycles against a [`Store`].
pub struct Syncer {
    fetcher: Fetcher,
    palette: Palette,
    max_concurrent: usize,
    busy: BusyFlag,
}

impl Syncer {
    pub fn new(fetcher: Fetcher, palette: Palette, max_concurrent: usize) -> Self {
        Self {
            fetcher,
            palette,
            max_concurrent: max_concurrent.max(1),
            busy: BusyFlag::default(),
        }
    }

    pub fn from_config(config: &Config, paths: &AppPaths) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(config.fetch_timeout(), Some(paths.diagnostic_log.clone()))?;
        Ok(Self::new(
            fetcher,
            Palette::from_config(&config.color),
            config.max_concurrent_fetches(),
        ))
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    fn acquire(&self) -> Result<BusyGuard, SyncError> {
        self.busy.try_acquire().ok_or(SyncError::Busy)
    }

    /// Subscribe to a single identity with a fresh random color.
    pub async fn add_feed(&self, store: &mut Store, identity: &str) -> Result<AddOutcome, SyncError> {
        let _guard = self.acquire()?;
        let identity = identity.trim();
        if store.contains_feed(identity) {
            return Ok(AddOutcome::AlreadyPresent);
        }

        match self.fetcher.fetch(identity, self.palette.random()).await {
            Ok(feed) => {
                let link = feed.link.clone();
                if store.add_feed(feed)? {
                    tracing::info!(feed = %link, "Added feed");
                    Ok(AddOutcome::Added(link))
                } else {
                    Ok(AddOutcome::AlreadyPresent)
                }
            }
            Err(failure) => Ok(AddOutcome::Failed(failure)),
        }
    }

    /// Fetch every identity in the list at `path` that the store lacks.
    ///
    /// A missing list aborts with [`SyncError::ImportSourceNotFound`] before
    /// anything is fetched. Failed sources are reported, not stored.
    pub async fn import_from_list(
        &self,
        store: &mut Store,
        path: &Path,
        progress: Option<&mpsc::Sender<SyncProgress>>,
    ) -> Result<ImportReport, SyncError> {
        let _guard = self.acquire()?;

        let identities = match read_identity_list(path) {
            Ok(ids) => ids,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::ImportSourceNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(SyncError::Io(e)),
        };

        let listed = identities.len();
        let pending: Vec<String> = identities
            .into_iter()
            .filter(|id| !store.contains_feed(id))
            .collect();
        let mut report = ImportReport {
            listed,
            already_present: listed - pending.len(),
            ..Default::default()
        };

        let total = pending.len();
        tracing::info!(list = %path.display(), total = total, skipped = report.already_present, "Starting import");

        let mut arrivals = stream::iter(pending)
            .map(|identity| {
                let fetcher = self.fetcher.clone();
                let color = self.palette.random();
                async move { fetcher.fetch(&identity, color).await }
            })
            .buffer_unordered(self.max_concurrent);

        let mut done = 0;
        while let Some(result) = arrivals.next().await {
            done += 1;
            let (link, failed) = match result {
                Ok(feed) => {
                    let link = feed.link.clone();
                    if store.add_feed(feed)? {
                        report.added.push(link.clone());
                    }
                    (link, false)
                }
                Err(failure) => {
                    let link = failure.identity.clone();
                    report.failed.push(failure);
                    (link, true)
                }
            };
            send_progress(progress, SyncProgress {
                phase: SyncPhase::Import,
                done,
                total,
                link,
                failed,
                settled_groups: Vec::new(),
            })
            .await;
        }

        tracing::info!(
            added = report.added.len(),
            failed = report.failed.len(),
            "Import finished"
        );
        Ok(report)
    }

    /// Refetch every feed, keeping each feed's color.
    ///
    /// Failed feeds are shown as their placeholder until the next cycle but
    /// keep their last good record on disk.
    pub async fn refresh_all(
        &self,
        store: &mut Store,
        progress: Option<&mpsc::Sender<SyncProgress>>,
    ) -> Result<RefreshReport, SyncError> {
        let _guard = self.acquire()?;

        let targets: Vec<(String, u8)> = store
            .feeds()
            .iter()
            .map(|f| (f.link.clone(), f.color))
            .collect();
        let total = targets.len();
        let mut report = RefreshReport {
            total,
            ..Default::default()
        };
        tracing::info!(total = total, "Starting refresh");

        let mut arrivals = stream::iter(targets)
            .map(|(link, color)| {
                let fetcher = self.fetcher.clone();
                async move {
                    let result = fetcher.fetch(&link, NEUTRAL_COLOR).await;
                    (link, color, result)
                }
            })
            .buffer_unordered(self.max_concurrent);

        let mut arrived = HashSet::new();
        let mut settled = HashSet::new();
        let mut done = 0;

        while let Some((link, color, result)) = arrivals.next().await {
            done += 1;
            let failed = match result {
                Ok(mut feed) => {
                    feed.set_color(color);
                    if store.replace_feed(feed) {
                        store.save_feed(&link)?;
                        report.updated.push(link.clone());
                    }
                    false
                }
                Err(failure) => {
                    let mut placeholder = failure.placeholder.clone();
                    placeholder.set_color(color);
                    store.replace_feed(placeholder);
                    report.failed.push(failure);
                    true
                }
            };

            arrived.insert(link.clone());
            let newly = store.settle_groups(&arrived, &mut settled);
            report.settled_groups.extend(newly.iter().cloned());

            send_progress(progress, SyncProgress {
                phase: SyncPhase::Refresh,
                done,
                total,
                link,
                failed,
                settled_groups: newly,
            })
            .await;
        }

        store.sort();
        tracing::info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Refresh finished"
        );
        Ok(report)
    }
}

async fn send_progress(progress: Option<&mpsc::Sender<SyncProgress>>, update: SyncProgress) {
    let Some(tx) = progress else {
        return;
    };
    let (done, total) = (update.done, update.total);
    if let Err(e) = tx.send(update).await {
        tracing::warn!(error = %e, done = done, total = total, "Progress channel send failed (receiver dropped)");
    }
}
