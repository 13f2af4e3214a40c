//! Common test utilities and helpers for pixelstats tests
#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_json::{json, Value};
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Temp directory plus a mock server standing in for every remote host
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub server: MockServer,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            server: MockServer::start().await,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.temp_dir.child("downloads.json").path().to_path_buf()
    }

    pub fn write_snapshot(&self, snapshot: &Value) {
        self.temp_dir
            .child("downloads.json")
            .write_str(&serde_json::to_string_pretty(snapshot).unwrap())
            .expect("Failed to write snapshot");
    }

    pub fn read_snapshot(&self) -> Value {
        let content =
            std::fs::read_to_string(self.snapshot_path()).expect("Failed to read snapshot");
        serde_json::from_str(&content).expect("Snapshot is not JSON")
    }

    /// YAML config pointing every host at the mock server
    pub fn config_yaml(&self, telegram: bool) -> String {
        let uri = self.server.uri();
        let mut yaml = format!(
            r#"
devices_url: "{uri}/devices.json"
sources:
  primary:
    name: "GitHub"
    releases_url: "{uri}/github/{{codename}}/releases"
  secondary:
    name: "Gitea"
    releases_url: "{uri}/gitea/{{codename}}/releases"
snapshot:
  path: "{snapshot}"
fetch:
  timeout: 5
  max_parallel: 2
logging:
  color: false
"#,
            uri = uri,
            snapshot = self.snapshot_path().display()
        );

        if telegram {
            yaml.push_str(&format!(
                "telegram:\n  bot_token: \"123:abc\"\n  chat_id: \"-10042\"\n  api_base: \"{}\"\n",
                uri
            ));
        }

        yaml
    }

    pub fn create_config(&self, telegram: bool) -> PathBuf {
        let config = self.temp_dir.child("config.yml");
        config
            .write_str(&self.config_yaml(telegram))
            .expect("Failed to write test config");
        config.path().to_path_buf()
    }

    pub async fn mount_devices(&self, codenames: &[&str]) {
        let devices: Vec<Value> = codenames
            .iter()
            .map(|codename| json!({ "codename": codename, "manufacturer": "Google" }))
            .collect();

        Mock::given(method("GET"))
            .and(path("/devices.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(devices))
            .mount(&self.server)
            .await;
    }

    /// Serve `body` with `status` for one host/device pair
    pub async fn mount_releases(&self, host: &str, codename: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/{}/{}/releases", host, codename)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_telegram(&self) {
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&self.server)
            .await;
    }

    /// Texts of every Telegram message received so far
    pub async fn sent_messages(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path().ends_with("/sendMessage"))
            .filter_map(|request| {
                let body: Value = serde_json::from_slice(&request.body).ok()?;
                body["text"].as_str().map(str::to_string)
            })
            .collect()
    }
}

/// Release listing with one release holding the given `(name, downloads)` assets
pub fn releases(assets: &[(&str, u64)]) -> Value {
    let assets: Vec<Value> = assets
        .iter()
        .map(|(name, count)| {
            json!({
                "name": name,
                "download_count": count,
                "size": 1024,
                "browser_download_url": format!("https://example.invalid/{}", name)
            })
        })
        .collect();

    json!([{ "tag_name": "v1", "draft": false, "assets": assets }])
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
