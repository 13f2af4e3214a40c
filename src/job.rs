//! Stats Job - one fetch, reconcile, persist and notify pass
//!
//! The order is fixed: the snapshot is written before the report is sent, so
//! a failed notification never loses the computed totals.

use anyhow::{Context, Result};
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::device::{Device, DeviceManifest};
use crate::notify::{Notifier, TelegramNotifier};
use crate::reconcile::{AssetFilter, DeviceFetch, Reconciler};
use crate::report::{format_timestamp, Report};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::source::{build_client, HttpReleaseSource, ReleaseSource, SourceResult};

/// Switches for a single run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute and print the report without saving or sending it
    pub dry_run: bool,
    /// Save the snapshot but do not send the report
    pub skip_notify: bool,
}

/// Results from a complete run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: Report,
    pub snapshot: Snapshot,
    pub devices: usize,
    pub skipped_devices: usize,
    pub persisted: bool,
    pub notified: bool,
    pub duration: Duration,
}

pub struct StatsJob {
    config: Arc<Config>,
    manifest: DeviceManifest,
    first: Box<dyn ReleaseSource>,
    second: Box<dyn ReleaseSource>,
    store: SnapshotStore,
    notifier: Option<Box<dyn Notifier>>,
}

impl StatsJob {
    /// Create a job wired to the HTTP hosts and Telegram described by `config`
    pub fn new(config: Config) -> Result<Self> {
        let client = build_client(&config.fetch.user_agent, config.fetch_timeout())?;

        let manifest = DeviceManifest::new(client.clone(), config.devices_url.clone());
        let first = HttpReleaseSource::new(client.clone(), &config.sources.primary);
        let second = HttpReleaseSource::new(client.clone(), &config.sources.secondary);
        let store = SnapshotStore::new(config.snapshot_path());

        let notifier: Option<Box<dyn Notifier>> = match config.telegram_credentials() {
            Some((token, chat_id)) => Some(Box::new(TelegramNotifier::new(
                client,
                config.telegram.api_base.clone(),
                token,
                chat_id,
            ))),
            None => {
                debug!("Telegram credentials not configured, notifications disabled");
                None
            }
        };

        Ok(Self::with_parts(
            config,
            manifest,
            Box::new(first),
            Box::new(second),
            store,
            notifier,
        ))
    }

    /// Create from existing collaborators (for reuse and tests)
    pub fn with_parts(
        config: Config,
        manifest: DeviceManifest,
        first: Box<dyn ReleaseSource>,
        second: Box<dyn ReleaseSource>,
        store: SnapshotStore,
        notifier: Option<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            manifest,
            first,
            second,
            store,
            notifier,
        }
    }

    /// Run a complete pass: fetch, reconcile, persist, notify
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary> {
        let start_time = Instant::now();

        let previous = self
            .store
            .load()
            .context("Failed to load previous snapshot")?;

        let devices = self
            .manifest
            .fetch()
            .await
            .context("Failed to load device list")?;

        let fetched = self.fetch_all(&devices).await;

        let reconciler = Reconciler::new(
            AssetFilter::from_config(&self.config.assets),
            self.first.label(),
            self.second.label(),
        );
        let generated_at = format_timestamp(&Local::now());
        let outcome = reconciler.fold(fetched, previous, &generated_at);

        let skipped_devices = outcome.report.skipped_devices().len();
        info!(
            "Counted {} downloads ({:+}) across {} devices, {} skipped",
            outcome.report.total,
            outcome.report.total_diff,
            outcome.report.tallies.len(),
            skipped_devices
        );

        let mut summary = RunSummary {
            report: outcome.report,
            snapshot: outcome.snapshot,
            devices: devices.len(),
            skipped_devices,
            persisted: false,
            notified: false,
            duration: Duration::ZERO,
        };

        if options.dry_run {
            info!("Dry run, snapshot not saved and report not sent");
            summary.duration = start_time.elapsed();
            return Ok(summary);
        }

        self.store
            .save(&summary.snapshot)
            .context("Failed to save snapshot")?;
        summary.persisted = true;

        match &self.notifier {
            Some(notifier) if !options.skip_notify => {
                notifier
                    .send(&summary.report.to_string())
                    .await
                    .with_context(|| format!("Failed to notify {}", notifier.destination()))?;
                summary.notified = true;
            }
            Some(_) => debug!("Notification skipped on request"),
            None => debug!("No notifier configured"),
        }

        summary.duration = start_time.elapsed();
        Ok(summary)
    }

    /// Fetch both hosts for every device, at most `max_parallel` devices at a
    /// time. Results come back in device-list order.
    async fn fetch_all(&self, devices: &[Device]) -> Vec<DeviceFetch> {
        let max_parallel = self.config.max_parallel();

        info!(
            "Fetching releases for {} devices ({} at a time)",
            devices.len(),
            max_parallel
        );

        stream::iter(devices.iter().map(|device| self.fetch_device(device)))
            .buffered(max_parallel)
            .collect()
            .await
    }

    async fn fetch_device(&self, device: &Device) -> DeviceFetch {
        info!("Processing {}...", device.display_name());

        let (first, second) = tokio::join!(
            self.fetch_with_timeout(&*self.first, &device.codename),
            self.fetch_with_timeout(&*self.second, &device.codename)
        );

        DeviceFetch {
            device: device.clone(),
            first,
            second,
        }
    }

    async fn fetch_with_timeout(&self, source: &dyn ReleaseSource, codename: &str) -> SourceResult {
        let limit = self.config.fetch_timeout();

        match timeout(limit, source.fetch_releases(codename)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "{} timed out for {} after {}s",
                    source.label(),
                    codename,
                    limit.as_secs()
                );
                SourceResult::Unavailable {
                    status: None,
                    body: format!("timed out after {}s", limit.as_secs()),
                }
            }
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    /// Get configuration for external inspection
    pub fn config(&self) -> &Config {
        &self.config
    }
}
