//! Plain-text download report sent to Telegram and printed to stdout

use chrono::{DateTime, TimeZone};
use std::fmt;

/// Timestamp layout shared by the report header and the snapshot `_date` key
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `" (+5)"`, `" (-3)"`, or nothing for an unchanged value
pub fn diff_suffix(diff: i64) -> String {
    match diff {
        d if d > 0 => format!(" (+{})", d),
        d if d < 0 => format!(" ({})", d),
        _ => String::new(),
    }
}

/// Download count for one processed device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTally {
    pub codename: String,
    pub count: i64,
    pub previous: i64,
    pub diff: i64,
}

impl fmt::Display for DeviceTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}{}", self.codename, self.count, diff_suffix(self.diff))
    }
}

/// Why a device, or one host for a device, produced no count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither host could be reached; the device keeps its previous total
    NoDataFromEither { first: String, second: String },
    /// The host answered with an empty release list
    NoReleases { source: String },
    /// The host could not be used while the other one could
    NoData { source: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub codename: String,
    pub reason: SkipReason,
}

impl SkippedEntry {
    pub fn new(codename: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            codename: codename.into(),
            reason,
        }
    }

    /// Whether the whole device was dropped rather than a single host
    pub fn is_device_skip(&self) -> bool {
        matches!(self.reason, SkipReason::NoDataFromEither { .. })
    }
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            SkipReason::NoDataFromEither { first, second } => write!(
                f,
                "{} - no data from both {} and {}",
                self.codename, first, second
            ),
            SkipReason::NoReleases { source } => {
                write!(f, "{} ({}) - no releases", self.codename, source)
            }
            SkipReason::NoData { source } => write!(f, "{} ({}) - no data", self.codename, source),
        }
    }
}

/// Result of one run, rendered with `Display`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub generated_at: String,
    pub tallies: Vec<DeviceTally>,
    pub skipped: Vec<SkippedEntry>,
    pub total: i64,
    pub total_diff: i64,
}

impl Report {
    /// Codenames of every device dropped entirely, in report order
    pub fn skipped_devices(&self) -> Vec<&str> {
        self.skipped
            .iter()
            .filter(|entry| entry.is_device_skip())
            .map(|entry| entry.codename.as_str())
            .collect()
    }

    pub fn tally(&self, codename: &str) -> Option<&DeviceTally> {
        self.tallies.iter().find(|tally| tally.codename == codename)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Download stats as of {} in last 24 hours:", self.generated_at)?;

        for tally in &self.tallies {
            write!(f, "\n{}", tally)?;
        }
        write!(f, "\n\n")?;

        if !self.skipped.is_empty() {
            write!(f, "Skipped devices:")?;
            for entry in &self.skipped {
                write!(f, "\n{}", entry)?;
            }
            write!(f, "\n\n")?;
        }

        write!(f, "Total: {}{}", self.total, diff_suffix(self.total_diff))
    }
}
