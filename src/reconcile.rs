//! Reconciliation - turns per-host release listings into download totals
//!
//! For every device the qualifying asset downloads of both hosts are summed,
//! compared with the previous snapshot and written back into it. The
//! reconciler does no I/O: fetched results and the previous snapshot come in,
//! the updated snapshot and the report go out.
//!
//! Hosts are evaluated independently. One host answering with no releases
//! never prevents the other host from being counted.

use tracing::{debug, warn};

use crate::config::AssetConfig;
use crate::device::Device;
use crate::report::{DeviceTally, Report, SkipReason, SkippedEntry};
use crate::snapshot::{diff_key, Snapshot, DATE_KEY, TOTAL_DIFF_KEY, TOTAL_KEY};
use crate::source::{Release, SourceResult};

/// Decides which release assets count as downloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFilter {
    prefix: String,
    suffix: String,
}

impl AssetFilter {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(config.prefix.clone(), config.suffix.clone())
    }

    /// Either condition is enough
    pub fn matches(&self, name: &str) -> bool {
        name.starts_with(&self.prefix) || name.ends_with(&self.suffix)
    }

    /// Sum of qualifying downloads across every release
    pub fn count_downloads(&self, releases: &[Release]) -> u64 {
        releases
            .iter()
            .flat_map(|release| release.assets.iter())
            .filter(|asset| self.matches(&asset.name))
            .fold(0u64, |sum, asset| sum.saturating_add(asset.download_count))
    }
}

impl Default for AssetFilter {
    fn default() -> Self {
        Self::from_config(&AssetConfig::default())
    }
}

/// Both host results for one device
#[derive(Debug, Clone)]
pub struct DeviceFetch {
    pub device: Device,
    pub first: SourceResult,
    pub second: SourceResult,
}

/// Updated snapshot plus the report describing it
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub snapshot: Snapshot,
    pub report: Report,
}

impl Reconciliation {
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.report.skipped
    }
}

/// Running totals threaded through the per-device fold
#[derive(Default)]
struct Totals {
    downloads: i64,
    previous: i64,
}

pub struct Reconciler {
    filter: AssetFilter,
    first_label: String,
    second_label: String,
}

impl Reconciler {
    /// `first_label`/`second_label` name the hosts in skip reasons
    pub fn new(
        filter: AssetFilter,
        first_label: impl Into<String>,
        second_label: impl Into<String>,
    ) -> Self {
        Self {
            filter,
            first_label: first_label.into(),
            second_label: second_label.into(),
        }
    }

    /// Query both hosts through the given fetchers, then fold in device order
    pub fn reconcile<F1, F2>(
        &self,
        devices: &[Device],
        mut fetch_first: F1,
        mut fetch_second: F2,
        previous: Snapshot,
        generated_at: &str,
    ) -> Reconciliation
    where
        F1: FnMut(&Device) -> SourceResult,
        F2: FnMut(&Device) -> SourceResult,
    {
        let fetched = devices.iter().map(|device| DeviceFetch {
            device: device.clone(),
            first: fetch_first(device),
            second: fetch_second(device),
        });

        self.fold(fetched, previous, generated_at)
    }

    /// Fold already fetched results; iteration order is report order
    pub fn fold<I>(&self, fetched: I, previous: Snapshot, generated_at: &str) -> Reconciliation
    where
        I: IntoIterator<Item = DeviceFetch>,
    {
        let mut snapshot = previous;
        let mut tallies = Vec::new();
        let mut skipped = Vec::new();
        let mut totals = Totals::default();

        for DeviceFetch {
            device,
            first,
            second,
        } in fetched
        {
            let codename = device.codename.as_str();

            if first.is_unavailable() && second.is_unavailable() {
                warn!(
                    "Failed to get data for device {}! {} responded {}; {} responded {}",
                    codename,
                    self.first_label,
                    first.describe(),
                    self.second_label,
                    second.describe()
                );
                skipped.push(SkippedEntry::new(
                    codename,
                    SkipReason::NoDataFromEither {
                        first: self.first_label.clone(),
                        second: self.second_label.clone(),
                    },
                ));
                continue;
            }

            let mut downloads = 0u64;
            for (label, result) in [(&self.first_label, &first), (&self.second_label, &second)] {
                match result {
                    SourceResult::Data(releases) => {
                        let counted = self.filter.count_downloads(releases);
                        debug!("Counted {} downloads for {} on {}", counted, codename, label);
                        downloads = downloads.saturating_add(counted);
                    }
                    SourceResult::Empty => {
                        debug!("No releases on {} for {}", label, codename);
                        skipped.push(SkippedEntry::new(
                            codename,
                            SkipReason::NoReleases {
                                source: label.clone(),
                            },
                        ));
                    }
                    SourceResult::Unavailable { .. } => {
                        warn!(
                            "Failed to get data from {} for {}: {}",
                            label,
                            codename,
                            result.describe()
                        );
                        skipped.push(SkippedEntry::new(
                            codename,
                            SkipReason::NoData {
                                source: label.clone(),
                            },
                        ));
                    }
                }
            }

            let count = i64::try_from(downloads).unwrap_or(i64::MAX);
            let previous = snapshot.count(codename);
            let diff = count.saturating_sub(previous);

            snapshot.set_count(codename, count);
            snapshot.set_count(diff_key(codename), diff);

            totals.downloads = totals.downloads.saturating_add(count);
            totals.previous = totals.previous.saturating_add(previous);

            debug!(
                "{} downloads in total for {} (previously {})",
                count,
                device.display_name(),
                previous
            );

            tallies.push(DeviceTally {
                codename: codename.to_string(),
                count,
                previous,
                diff,
            });
        }

        let total_diff = totals.downloads.saturating_sub(totals.previous);

        snapshot.set_text(DATE_KEY, generated_at);
        snapshot.set_count(TOTAL_KEY, totals.downloads);
        snapshot.set_count(TOTAL_DIFF_KEY, total_diff);

        Reconciliation {
            snapshot,
            report: Report {
                generated_at: generated_at.to_string(),
                tallies,
                skipped,
                total: totals.downloads,
                total_diff,
            },
        }
    }
}
