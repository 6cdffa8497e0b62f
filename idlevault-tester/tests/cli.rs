use std::process::Command;

use tempfile::TempDir;

fn tester() -> Command {
    Command::new(env!("CARGO_BIN_EXE_idlevault-tester"))
}

#[test]
fn cli_scenarios_json_report_all_pass() {
    let dir = TempDir::new().expect("temp dir");
    let output_path = dir.path().join("report.json");
    let status = tester()
        .args(["scenarios", "--report", "json", "--output"])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());

    let content = std::fs::read_to_string(output_path).expect("read output");
    let results: Vec<serde_json::Value> = serde_json::from_str(&content).expect("json report");
    assert!(results.len() >= 4);
    assert!(results.iter().all(|r| r["passed"] == true), "{content}");
}

#[test]
fn cli_status_initializes_save_file() {
    let dir = TempDir::new().expect("temp dir");
    let output = tester()
        .arg("status")
        .arg("--save-dir")
        .arg(dir.path())
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Offline for"));
    assert!(stdout.contains("0 coins / 0 hammers"));
    assert!(
        dir.path()
            .join("SaveLoadData")
            .join("offline_data.json")
            .exists()
    );
}

#[test]
fn cli_collect_on_fresh_save_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let output = tester()
        .arg("collect")
        .arg("--save-dir")
        .arg(dir.path())
        .output()
        .expect("run cli");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Nothing to collect yet"));
}

#[test]
fn cli_collect_grants_from_old_anchor() {
    let dir = TempDir::new().expect("temp dir");
    let save_dir = dir.path().join("SaveLoadData");
    std::fs::create_dir_all(&save_dir).expect("save dir");
    let anchor = chrono::Utc::now().timestamp() - 3_600;
    std::fs::write(
        save_dir.join("offline_data.json"),
        format!(r#"{{"lastCollectUtcSeconds": {anchor}, "coins": 5, "hammers": 0}}"#),
    )
    .expect("seed save");

    let output = tester()
        .arg("collect")
        .arg("--save-dir")
        .arg(dir.path())
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Collected"), "{stdout}");

    let saved: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(save_dir.join("offline_data.json")).expect("read save"),
    )
    .expect("save json");
    assert!(saved["coins"].as_i64().unwrap_or_default() >= 605);
    assert!(saved["lastCollectUtcSeconds"].as_i64().unwrap_or_default() > anchor);
}

#[test]
fn cli_simulate_collects_without_writing_save() {
    let dir = TempDir::new().expect("temp dir");
    let output = tester()
        .args(["simulate", "--seconds", "120", "--collect", "--save-dir"])
        .arg(dir.path())
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Collected"), "{stdout}");
    assert!(stdout.contains("170 coins / 17 hammers"), "{stdout}");
    assert!(!dir.path().join("SaveLoadData").exists());
}

#[test]
fn cli_loot_is_a_placeholder() {
    let dir = TempDir::new().expect("temp dir");
    let output = tester()
        .arg("loot")
        .arg("--save-dir")
        .arg(dir.path())
        .output()
        .expect("run cli");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("placeholder"));
}

#[test]
fn cli_rejects_negative_rate_config() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("bad.json");
    std::fs::write(&config, r#"{ "rates": { "coin_per_minute": -5 } }"#).expect("write cfg");
    let output = tester()
        .arg("status")
        .arg("--config")
        .arg(&config)
        .arg("--save-dir")
        .arg(dir.path())
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid reward config"), "{stderr}");
}

#[test]
fn cli_simulate_rejects_unbounded_seconds() {
    for seconds in ["inf", "1e17", "NaN"] {
        let output = tester()
            .args(["simulate", "--seconds", seconds])
            .output()
            .expect("run cli");
        assert!(!output.status.success(), "--seconds {seconds} should fail");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("--seconds"), "{stderr}");
    }
}

#[test]
fn cli_rejects_blank_save_file_name() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("bad_save.json");
    std::fs::write(&config, r#"{ "save": { "file_name": "" } }"#).expect("write cfg");
    let output = tester()
        .arg("status")
        .arg("--config")
        .arg(&config)
        .arg("--save-dir")
        .arg(dir.path())
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid reward config"));
}
