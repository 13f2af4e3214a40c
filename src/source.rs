//! Release sources - per-device release listings from a release host
//!
//! Both GitHub and Gitea expose `GET .../{codename}/releases` returning a JSON
//! array of releases, each carrying an `assets` array with download counts.
//! A fetch never fails outright: every problem is folded into a [`SourceResult`]
//! so one broken host only skips that host for that device.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SourceConfig;

/// Placeholder substituted with the device codename in release URLs
pub const CODENAME_PLACEHOLDER: &str = "{codename}";

/// A downloadable file attached to a release
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub download_count: u64,
}

/// A release as returned by the host API. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Release {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Outcome of asking one host about one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceResult {
    /// Host could not be used: non-200 status, transport error, timeout or
    /// an undecodable payload. `status` is `None` when no response arrived.
    Unavailable { status: Option<u16>, body: String },
    /// Host answered but the device has no releases
    Empty,
    /// Releases in the order the host returned them
    Data(Vec<Release>),
}

impl SourceResult {
    /// Classify a raw HTTP response
    pub fn from_response(status: u16, body: &str) -> Self {
        if status != StatusCode::OK.as_u16() {
            return SourceResult::Unavailable {
                status: Some(status),
                body: body.to_string(),
            };
        }

        match serde_json::from_str::<Vec<Release>>(body) {
            Ok(releases) if releases.is_empty() => SourceResult::Empty,
            Ok(releases) => SourceResult::Data(releases),
            Err(e) => SourceResult::Unavailable {
                status: Some(status),
                body: format!("malformed release listing: {}", e),
            },
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SourceResult::Unavailable { .. })
    }

    /// Short diagnostic, used in log lines
    pub fn describe(&self) -> String {
        match self {
            SourceResult::Unavailable {
                status: Some(status),
                body,
            } => format!("{}: {}", status, body),
            SourceResult::Unavailable { status: None, body } => body.clone(),
            SourceResult::Empty => "no releases".to_string(),
            SourceResult::Data(releases) => format!("{} releases", releases.len()),
        }
    }
}

/// Trait for release hosts
///
/// Implement this to count downloads from another host.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch every release of the given device
    async fn fetch_releases(&self, codename: &str) -> SourceResult;

    /// Host name for display/logging
    fn label(&self) -> String;
}

/// Release host reached over HTTP with a `{codename}` URL template
pub struct HttpReleaseSource {
    client: Client,
    name: String,
    url_template: String,
    token: Option<String>,
}

impl HttpReleaseSource {
    pub fn new(client: Client, config: &SourceConfig) -> Self {
        Self {
            client,
            name: config.name.clone(),
            url_template: config.releases_url.clone(),
            token: config.token(),
        }
    }

    /// Releases URL for a device
    pub fn releases_url(&self, codename: &str) -> String {
        self.url_template.replace(CODENAME_PLACEHOLDER, codename)
    }
}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn fetch_releases(&self, codename: &str) -> SourceResult {
        let url = self.releases_url(codename);
        debug!("Fetching {} releases from {}", self.name, url);

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to {} failed for {}: {}", self.name, codename, e);
                return SourceResult::Unavailable {
                    status: None,
                    body: e.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read {} response for {}: {}", self.name, codename, e);
                return SourceResult::Unavailable {
                    status: Some(status),
                    body: e.to_string(),
                };
            }
        };

        SourceResult::from_response(status, &body)
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

/// Build the shared HTTP client used for every host
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}
