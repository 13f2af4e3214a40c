//! pixelstats - Daily download statistics for PixelBuilds releases
//!
//! pixelstats counts how often each PixelBuilds device build was downloaded,
//! compares the totals with the previous run and reports the difference.
//!
//! ## Core Features
//!
//! - **Two release hosts**: GitHub and Gitea are queried for every device and
//!   their counts are summed
//! - **Partial outages**: a host that is down or has no releases only skips
//!   that host, never the run
//! - **Snapshot diffing**: per-device and total deltas against the last run,
//!   stored as key-sorted JSON
//! - **Telegram delivery**: the report is sent when bot credentials are set
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`device`]: Device manifest
//! - [`source`]: Release host access
//! - [`reconcile`]: Download aggregation and diffing
//! - [`report`]: Report rendering
//! - [`snapshot`]: Snapshot model and persistence
//! - [`notify`]: Report delivery
//! - [`job`]: End-to-end run

pub mod config;
pub mod device;
pub mod job;
pub mod notify;
pub mod reconcile;
pub mod report;
pub mod snapshot;
pub mod source;

pub use config::Config;
pub use device::{Device, DeviceManifest};
pub use job::{RunOptions, RunSummary, StatsJob};
pub use reconcile::{AssetFilter, DeviceFetch, Reconciler, Reconciliation};
pub use report::Report;
pub use snapshot::{Snapshot, SnapshotStore};
pub use source::{ReleaseSource, SourceResult};
