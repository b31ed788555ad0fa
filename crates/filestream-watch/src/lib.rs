//! # Filestream File Discovery
//!
//! The file discovery and change detection core of a log shipping agent.
//! A [`FileScanner`] turns configured paths and glob patterns into a
//! [`Snapshot`] of regular files; a [`FileWatcher`] rescans on a fixed
//! interval, diffs each snapshot against the previous one, and hands the
//! resulting [`FsEvent`]s one at a time to whoever reads the
//! [`EventStream`], typically the layer that starts and stops harvesters.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │  WatcherConfig  │───▶│   FileScanner    │───▶│    Snapshot     │
//! │ (paths, filters)│    │ (glob, stat)     │    │ (path → meta)   │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//!                                                         │
//!                                                         ▼
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   EventStream   │◀───│   FileWatcher    │◀───│ change_detector │
//! │   (consumer)    │    │ (tick, handoff)  │    │     (diff)      │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filestream_watch::{FileWatcher, WatcherConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> filestream_watch::Result<()> {
//! let config = WatcherConfig::new(["/var/log/app/*.log"]);
//! let watcher = FileWatcher::from_config(&config)?;
//! let events = watcher.events();
//!
//! let cancel = CancellationToken::new();
//! let handle = watcher.spawn(cancel.clone());
//!
//! while let Some(event) = events.next_event().await {
//!     println!("{} {:?}", event.op, event.path());
//! }
//! # cancel.cancel();
//! # let _ = handle.await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod change_detector;
pub mod config;
pub mod error;
mod events;
mod file_scanner;
pub mod filter;
pub mod traits;
mod watcher;

pub use change_detector::{diff, ChangeSummary, DiffOptions};
pub use config::{
    ConfigValidator, MatchTarget, MatcherConfig, ScanFilterConfig, ValidationError, WatcherConfig,
};
pub use error::*;
pub use events::*;
pub use file_scanner::FileScanner;
pub use traits::Scanner;
pub use watcher::{EventStream, FileWatcher, WatcherOptions, WatcherState};

/// Re-export common types for convenience
pub mod prelude {
    pub use crate::{
        Error, EventStream, FileMetadata, FileScanner, FileWatcher, FsEvent, Operation, Result,
        ScanFilterConfig, Scanner, Snapshot, WatcherConfig,
    };
}
