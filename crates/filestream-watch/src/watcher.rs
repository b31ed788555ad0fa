//! Polling watcher that turns successive scans into a stream of [`FsEvent`]s.
//!
//! One task owns the previous snapshot and runs the loop:
//!
//! ```text
//!  tick ──▶ scan ──▶ diff(prev, next) ──▶ hand off each event ──▶ prev = next
//!   ▲                                                                 │
//!   └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events go through a zero-capacity channel, so the loop waits for the
//! consumer before producing the next event. Cancellation is observed while
//! waiting for the next tick and while waiting on a handoff; when the loop
//! stops, the channel closes and [`EventStream::next_event`] returns `None`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::change_detector::{diff, ChangeSummary, DiffOptions};
use crate::config::{ConfigValidator, WatcherConfig, DEFAULT_CHECK_INTERVAL};
use crate::error::{Error, Result};
use crate::events::{FsEvent, Snapshot};
use crate::file_scanner::FileScanner;
use crate::traits::Scanner;

/// Runtime settings of a [`FileWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Time between two scans.
    pub check_interval: Duration,
    /// Diff refinements.
    pub diff: DiffOptions,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            diff: DiffOptions::default(),
        }
    }
}

impl WatcherOptions {
    /// Set the scan interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set the diff options.
    pub fn with_diff(mut self, diff: DiffOptions) -> Self {
        self.diff = diff;
        self
    }
}

/// Lifecycle of the watch loop. There is no way back from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Ticking, scanning, diffing and emitting.
    Running,
    /// Terminal.
    Stopped,
}

/// Outcome of handing one event to the consumer.
enum Handoff {
    Delivered,
    Cancelled,
}

/// Consumer side of a watcher.
///
/// Cloning yields another handle on the same stream; each event is delivered
/// to exactly one handle.
#[derive(Debug, Clone)]
pub struct EventStream {
    receiver: flume::Receiver<FsEvent>,
}

impl EventStream {
    /// Wait for the next event. Returns `None` once the watcher has stopped.
    pub async fn next_event(&self) -> Option<FsEvent> {
        self.receiver.recv_async().await.ok()
    }

    /// Blocking variant of [`next_event`](Self::next_event) for consumers
    /// running outside the async runtime.
    pub fn recv_blocking(&self) -> Option<FsEvent> {
        self.receiver.recv().ok()
    }

    /// Whether the watcher has stopped and no event is pending.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_disconnected() && self.receiver.is_empty()
    }
}

/// Periodically scans and reports what changed since the previous scan.
pub struct FileWatcher<S> {
    scanner: S,
    options: WatcherOptions,
    prev: Snapshot,
    sender: flume::Sender<FsEvent>,
    receiver: flume::Receiver<FsEvent>,
}

impl FileWatcher<FileScanner> {
    /// Validate the config and build a watcher over a [`FileScanner`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` or `Error::Pattern` for an invalid config; the
    /// watcher is never created in that case.
    pub fn from_config(config: &WatcherConfig) -> Result<Self> {
        ConfigValidator::validate_config(config)?;
        let scanner = FileScanner::new(&config.paths, &config.scanner)?;
        let options = WatcherOptions {
            check_interval: config.check_interval,
            diff: config.diff_options(),
        };
        Ok(Self::new(scanner, options))
    }
}

impl<S: Scanner + 'static> FileWatcher<S> {
    /// Create a watcher with an empty baseline, so the first tick reports
    /// every existing file as created.
    pub fn new(scanner: S, options: WatcherOptions) -> Self {
        Self::with_baseline(scanner, options, Snapshot::new())
    }

    /// Create a watcher whose first diff runs against `baseline`.
    pub fn with_baseline(scanner: S, options: WatcherOptions, baseline: Snapshot) -> Self {
        let (sender, receiver) = flume::bounded(0);
        Self {
            scanner,
            options,
            prev: baseline,
            sender,
            receiver,
        }
    }

    /// Get a handle on the event stream. Must be taken before [`run`](Self::run).
    pub fn events(&self) -> EventStream {
        EventStream {
            receiver: self.receiver.clone(),
        }
    }

    /// Run the loop on a new tokio task.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Run the scan, diff, emit loop until `cancel` fires.
    ///
    /// Also stops when every [`EventStream`] has been dropped, since no event
    /// could be delivered anymore. Consumers observe the end of the stream
    /// once this returns.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            scanner,
            options,
            mut prev,
            sender,
            receiver,
        } = self;
        // Only consumer handles may keep the channel open.
        drop(receiver);

        let mut ticker = tokio::time::interval(options.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "File watcher started, checking every {:?}",
            options.check_interval
        );

        let mut state = WatcherState::Running;
        while state == WatcherState::Running {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    state = WatcherState::Stopped;
                    continue;
                }
                _ = ticker.tick() => {}
            }

            state = match tick(&scanner, &options, &mut prev, &sender, &cancel).await {
                Ok(Handoff::Delivered) => WatcherState::Running,
                Ok(Handoff::Cancelled) => WatcherState::Stopped,
                Err(e) => {
                    info!("Stopping file watcher: {}", e);
                    WatcherState::Stopped
                }
            };
        }

        drop(sender);
        info!("File watcher stopped");
    }
}

/// One iteration: scan, diff, emit, replace the baseline.
///
/// A failed scan is logged and leaves `prev` untouched. The baseline is only
/// replaced after every event of the tick has been handed off.
async fn tick<S: Scanner>(
    scanner: &S,
    options: &WatcherOptions,
    prev: &mut Snapshot,
    sender: &flume::Sender<FsEvent>,
    cancel: &CancellationToken,
) -> Result<Handoff> {
    let next = match scanner.scan().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Scan failed, keeping previous state: {}", e);
            return Ok(Handoff::Delivered);
        }
    };

    let events = diff(prev, &next, &options.diff);
    if !events.is_empty() {
        debug!("Tick found {}", ChangeSummary::from_events(&events));
    }

    for event in events {
        trace!("Emitting {} for {:?}", event.op, event.path());
        if let Handoff::Cancelled = emit(sender, event, cancel).await? {
            return Ok(Handoff::Cancelled);
        }
    }

    *prev = next;
    Ok(Handoff::Delivered)
}

/// Hand a single event to the consumer, giving up if cancelled first.
async fn emit(
    sender: &flume::Sender<FsEvent>,
    event: FsEvent,
    cancel: &CancellationToken,
) -> Result<Handoff> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(Handoff::Cancelled),
        sent = sender.send_async(event) => {
            sent.map_err(Error::from)?;
            Ok(Handoff::Delivered)
        }
    }
}

impl<S> std::fmt::Debug for FileWatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("options", &self.options)
            .field("known_files", &self.prev.len())
            .field("scanner", &"<Scanner>")
            .finish()
    }
}
