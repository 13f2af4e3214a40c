//! End-to-end runs of the stats job against mocked release hosts

mod common;

use common::{assert_contains_all, releases, TestEnvironment};
use pixelstats::{Config, RunOptions, StatsJob};
use serde_json::json;
use serial_test::serial;

fn clear_telegram_env() {
    std::env::remove_var("TG_BOT_TOKEN");
    std::env::remove_var("TG_CHAT_ID");
}

fn job_for(env: &TestEnvironment, telegram: bool) -> StatsJob {
    let config_path = env.create_config(telegram);
    let config = Config::load(&config_path).expect("Failed to load test config");
    StatsJob::new(config).expect("Failed to build job")
}

#[tokio::test]
#[serial]
async fn test_full_run_sums_hosts_and_sends_report() {
    clear_telegram_env();
    let env = TestEnvironment::new().await;
    env.write_snapshot(&json!({ "raven": 100, "retired": 55, "_total": 155 }));

    env.mount_devices(&["raven", "lynx", "ghost"]).await;
    env.mount_releases(
        "github",
        "raven",
        200,
        releases(&[("PixelBuilds_raven.zip", 80), ("raven.sha256", 900), ("boot.img", 4)]),
    )
    .await;
    env.mount_releases("gitea", "raven", 200, releases(&[("PixelBuilds_raven.img", 40)]))
        .await;
    env.mount_releases("github", "lynx", 200, json!([])).await;
    env.mount_releases("gitea", "lynx", 200, releases(&[("lynx-ota.zip", 6)]))
        .await;
    env.mount_releases("github", "ghost", 404, json!({ "message": "Not Found" }))
        .await;
    env.mount_releases("gitea", "ghost", 500, json!({ "message": "boom" }))
        .await;
    env.mount_telegram().await;

    let summary = job_for(&env, true)
        .run(RunOptions::default())
        .await
        .expect("Run failed");

    assert!(summary.persisted);
    assert!(summary.notified);
    assert_eq!(summary.devices, 3);
    assert_eq!(summary.skipped_devices, 1);

    let snapshot = env.read_snapshot();
    assert_eq!(snapshot["raven"], json!(120));
    assert_eq!(snapshot["raven_diff"], json!(20));
    assert_eq!(snapshot["lynx"], json!(6));
    assert_eq!(snapshot["lynx_diff"], json!(6));
    assert_eq!(snapshot["retired"], json!(55));
    assert!(snapshot.get("ghost").is_none());
    assert_eq!(snapshot["_total"], json!(126));
    assert_eq!(snapshot["_total_diff"], json!(26));
    assert!(snapshot["_date"].is_string());

    let messages = env.sent_messages().await;
    assert_eq!(messages.len(), 1);
    assert_contains_all(
        &messages[0],
        &[
            "Download stats as of",
            "\n\nraven: 120 (+20)\nlynx: 6 (+6)\n\n",
            "Skipped devices:\nlynx (GitHub) - no releases\nghost - no data from both GitHub and Gitea\n\n",
            "Total: 126 (+26)",
        ],
    );
    assert_eq!(messages[0], summary.report.to_string());
}

#[tokio::test]
#[serial]
async fn test_snapshot_file_is_sorted_and_indented() {
    clear_telegram_env();
    let env = TestEnvironment::new().await;

    env.mount_devices(&["zebra", "alpha"]).await;
    for codename in ["zebra", "alpha"] {
        env.mount_releases("github", codename, 200, releases(&[("PixelBuilds_x.zip", 1)]))
            .await;
        env.mount_releases("gitea", codename, 404, json!({})).await;
    }

    job_for(&env, false)
        .run(RunOptions::default())
        .await
        .expect("Run failed");

    let content = std::fs::read_to_string(env.snapshot_path()).unwrap();
    let keys: Vec<&str> = content
        .lines()
        .filter_map(|line| line.trim().strip_prefix('"'))
        .filter_map(|line| line.split('"').next())
        .collect();

    assert_eq!(
        keys,
        vec!["_date", "_total", "_total_diff", "alpha", "alpha_diff", "zebra", "zebra_diff"]
    );
    assert!(content.starts_with("{\n  \"_date\": "));
}

#[tokio::test]
#[serial]
async fn test_rerun_with_same_data_has_no_diff() {
    clear_telegram_env();
    let env = TestEnvironment::new().await;

    env.mount_devices(&["raven"]).await;
    env.mount_releases("github", "raven", 200, releases(&[("PixelBuilds_raven.zip", 10)]))
        .await;
    env.mount_releases("gitea", "raven", 200, releases(&[("raven.zip", 5)]))
        .await;

    let job = job_for(&env, false);
    let first = job.run(RunOptions::default()).await.expect("First run failed");
    let second = job.run(RunOptions::default()).await.expect("Second run failed");

    assert_eq!(first.report.total, 15);
    assert_eq!(first.report.total_diff, 15);
    assert_eq!(second.report.total, 15);
    assert_eq!(second.report.total_diff, 0);
    assert!(second.report.to_string().contains("raven: 15\n"));
    assert_eq!(env.read_snapshot()["raven_diff"], json!(0));
}

#[tokio::test]
#[serial]
async fn test_every_device_skipped_still_completes() {
    clear_telegram_env();
    let env = TestEnvironment::new().await;
    env.write_snapshot(&json!({ "raven": 7 }));

    env.mount_devices(&["raven"]).await;
    // No release mocks: both hosts answer 404

    let summary = job_for(&env, false)
        .run(RunOptions::default())
        .await
        .expect("Run failed");

    assert_eq!(summary.skipped_devices, 1);
    assert!(summary.report.to_string().ends_with("Total: 0"));

    let snapshot = env.read_snapshot();
    assert_eq!(snapshot["raven"], json!(7));
    assert_eq!(snapshot["_total"], json!(0));
}

#[tokio::test]
#[serial]
async fn test_malformed_release_payload_skips_host_only() {
    clear_telegram_env();
    let env = TestEnvironment::new().await;

    env.mount_devices(&["raven"]).await;
    env.mount_releases("github", "raven", 200, json!({ "unexpected": "object" }))
        .await;
    env.mount_releases("gitea", "raven", 200, releases(&[("PixelBuilds_raven.zip", 3)]))
        .await;

    let summary = job_for(&env, false)
        .run(RunOptions::default())
        .await
        .expect("Run failed");

    assert_eq!(summary.report.total, 3);
    assert!(summary
        .report
        .to_string()
        .contains("raven (GitHub) - no data"));
}
