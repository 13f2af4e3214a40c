use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A device listed in the PixelBuilds manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    /// Unique short identifier, also the release repository name
    pub codename: String,
    #[serde(default)]
    pub manufacturer: String,
}

impl Device {
    pub fn new(codename: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            codename: codename.into(),
            manufacturer: manufacturer.into(),
        }
    }

    /// `manufacturer/codename`, manufacturer lowercased
    pub fn display_name(&self) -> String {
        if self.manufacturer.is_empty() {
            self.codename.clone()
        } else {
            format!("{}/{}", self.manufacturer.to_lowercase(), self.codename)
        }
    }
}

/// Fetches the device list. Unlike the release hosts, failure here is fatal.
pub struct DeviceManifest {
    client: Client,
    url: String,
}

impl DeviceManifest {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode the manifest
    pub async fn fetch(&self) -> Result<Vec<Device>> {
        debug!("Fetching device manifest from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch device manifest from {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Device manifest request to {} failed", self.url))?;

        let devices: Vec<Device> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse device manifest from {}", self.url))?;

        info!("Found {} devices in manifest", devices.len());
        Ok(devices)
    }
}
