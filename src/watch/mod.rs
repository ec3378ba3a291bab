//! Watch session
//!
//! Rebuilds an experiment whenever one of its fragments changes. The
//! session is an explicit per-invocation object: it owns the resolved
//! target list, the output path, and the cancellation flag, and tears
//! everything down when `run` returns.
//!
//! Change events flow from the notify backend thread through a bounded
//! queue of capacity 1 into a single build-worker loop. The
//! queue is the serialization point: at most one pass runs at a time,
//! and any burst of events during a pass collapses into at most one
//! pending follow-up pass.
//!
//! The target list is fixed for the life of the session. Editing
//! `includes.toml` while watching takes effect on the next invocation,
//! not mid-session.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::assemble::{self, BuildError};
use crate::targets::TargetList;

/// How often the worker loop wakes up to check the cancel flag while no
/// change events arrive.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Errors that end a watch session before it enters its loop.
///
/// Build failures after the initial pass are logged and do not end the
/// session; the next change event is the retry.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("initial build failed: {0}")]
    Build(#[from] BuildError),

    #[error("failed to install filesystem watch: {0}")]
    Notify(#[from] notify::Error),
}

/// Sending half of the rebuild queue, held by the watcher callback.
///
/// `trigger` never blocks: a full queue means a pass is already pending,
/// so the event is redundant and dropped.
struct RebuildTrigger {
    tx: SyncSender<()>,
}

impl RebuildTrigger {
    fn trigger(&self) {
        match self.tx.try_send(()) {
            Ok(()) => {}
            // Full: a follow-up pass is already queued.
            // Disconnected: the worker loop is gone; nothing to do.
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {}
        }
    }
}

fn rebuild_channel() -> (RebuildTrigger, Receiver<()>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (RebuildTrigger { tx }, rx)
}

/// One watch invocation: initial build, then rebuild-on-change until
/// cancelled.
pub struct WatchSession {
    experiment: String,
    targets: TargetList,
    output_path: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl WatchSession {
    pub fn new(experiment: impl Into<String>, targets: TargetList, output_path: PathBuf) -> Self {
        Self {
            experiment: experiment.into(),
            targets,
            output_path,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that requests a cooperative stop. Setting it lets an
    /// in-flight pass finish, then the loop releases its watches and
    /// returns.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the session until the cancel flag is set.
    ///
    /// The initial build pass runs before any watch is installed, so a
    /// broken experiment fails fast with the underlying [`BuildError`].
    pub fn run(&self) -> Result<(), WatchError> {
        assemble::build(&self.targets, &self.output_path)?;
        info!(
            experiment = %self.experiment,
            output = %self.output_path.display(),
            "initial build complete"
        );

        // The output file shares a directory with watched fragments;
        // filtering events against the target set keeps our own writes
        // from scheduling passes.
        let watched: HashSet<PathBuf> = self.targets.iter().map(|p| normalize(p)).collect();
        let (trigger, triggers) = rebuild_channel();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_fragment_change(&event, &watched) {
                        trigger.trigger();
                    }
                }
                Err(err) => warn!(error = %err, "watch backend error"),
            })?;
        for dir in watch_roots(&self.targets) {
            watcher.watch(&dir, RecursiveMode::NonRecursive)?;
            debug!(path = %dir.display(), "watching directory");
        }
        info!(
            experiment = %self.experiment,
            targets = self.targets.len(),
            "watching for fragment changes"
        );

        while !self.cancel.load(Ordering::SeqCst) {
            match triggers.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(()) => match assemble::build(&self.targets, &self.output_path) {
                    Ok(()) => info!(experiment = %self.experiment, "rebuilt"),
                    // Previous output stays as written by the last good
                    // pass; the next change event retries.
                    Err(err) => warn!(experiment = %self.experiment, error = %err, "build pass failed"),
                },
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Dropping the watcher releases every watch handle.
        drop(watcher);
        info!(experiment = %self.experiment, "watch session stopped");
        Ok(())
    }
}

/// Directories to install watches on: the parent of every target,
/// deduplicated. Watching directories instead of files survives the
/// rename-then-replace save strategy editors use.
fn watch_roots(targets: &TargetList) -> BTreeSet<PathBuf> {
    targets
        .iter()
        .filter_map(|p| p.parent().map(normalize))
        .collect()
}

/// Content changes only; rename/remove of a fragment does not schedule a
/// pass by itself.
fn is_fragment_change(event: &Event, watched: &HashSet<PathBuf>) -> bool {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return false;
    }
    event.paths.iter().any(|p| watched.contains(&normalize(p)))
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::sync::mpsc::TryRecvError;

    #[test]
    fn test_burst_of_triggers_coalesces_to_one() {
        let (trigger, rx) = rebuild_channel();

        trigger.trigger();
        trigger.trigger();
        trigger.trigger();

        assert!(rx.try_recv().is_ok());
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn test_trigger_works_again_after_drain() {
        let (trigger, rx) = rebuild_channel();

        trigger.trigger();
        rx.try_recv().unwrap();
        trigger.trigger();

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_trigger_after_worker_gone_is_harmless() {
        let (trigger, rx) = rebuild_channel();
        drop(rx);
        trigger.trigger();
    }

    #[test]
    fn test_watch_roots_deduplicate_parents() {
        use crate::config::{ExperimentConfig, ProjectLayout};
        use crate::targets::resolve;
        use std::path::Path;

        let layout = ProjectLayout::from_root(Path::new("/proj"));
        let config = ExperimentConfig {
            name: "demo".to_string(),
            root_dir: layout.experiment_dir("demo"),
            include_names: vec!["a".to_string(), "b".to_string()],
        };
        let targets = resolve(&layout, &config);

        // Two fragments in the experiment dir, two in includes.
        let roots = watch_roots(&targets);
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn test_event_filter_matches_targets_only() {
        let target = PathBuf::from("/proj/includes/a.glsl");
        let watched: HashSet<PathBuf> = [target.clone()].into_iter().collect();

        let hit = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(target.clone());
        assert!(is_fragment_change(&hit, &watched));

        let miss = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/proj/experiments/demo/build.glsl"));
        assert!(!is_fragment_change(&miss, &watched));
    }

    #[test]
    fn test_event_filter_kinds() {
        let target = PathBuf::from("/proj/includes/a.glsl");
        let watched: HashSet<PathBuf> = [target.clone()].into_iter().collect();

        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(target.clone());
        assert!(is_fragment_change(&create, &watched));

        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(target);
        assert!(!is_fragment_change(&remove, &watched));
    }

    #[test]
    fn test_cancel_handle_shares_flag() {
        use crate::config::{ExperimentConfig, ProjectLayout};

        let layout = ProjectLayout::from_root(Path::new("/proj"));
        let config = ExperimentConfig {
            name: "demo".to_string(),
            root_dir: layout.experiment_dir("demo"),
            include_names: Vec::new(),
        };
        let session = WatchSession::new(
            "demo",
            crate::targets::resolve(&layout, &config),
            PathBuf::from("/tmp/build.glsl"),
        );

        let handle = session.cancel_handle();
        assert!(!session.cancel.load(Ordering::SeqCst));
        handle.store(true, Ordering::SeqCst);
        assert!(session.cancel.load(Ordering::SeqCst));
    }
}
