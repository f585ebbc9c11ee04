use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_path(name: &str) -> String {
    workspace_root()
        .join("tests/fixtures")
        .join(name)
        .to_string_lossy()
        .to_string()
}

fn patch_dir() -> String {
    fixture_path("patches")
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_empire-se"))
        .args(args)
        .env_remove("EMPIRE_SE_PATCH_DIR")
        .env_remove("EMPIRE_SE_ASSET_DIRS")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run empire-se CLI")
}

fn temp_output_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{}_{}.json", std::process::id(), nanos))
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn inspect_prints_summary() {
    let save = fixture_path("social_empires_save.json");
    let output = run_cli(&["inspect", &save]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "Social Empires (multi-town save)");
    assert_eq!(lines[1], "Player: Tester (1001)");
}

#[test]
fn inspect_json_reports_dialect() {
    let save = fixture_path("social_wars_save.json");
    let output = run_cli(&["inspect", &save, "--json"]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["game"], json!("Social Wars"));
    assert_eq!(value["item_count"], json!(2));
    assert_eq!(value["capabilities"]["can_select_town"], json!(false));
    assert_eq!(
        value["capabilities"]["issues"],
        json!(["no_town_selector", "no_config_loaded", "resources_unavailable"])
    );
}

#[test]
fn inspect_rejects_configuration_files() {
    let config = fixture_path("config.json");
    let output = run_cli(&["inspect", &config]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("UnrecognizedFormat"));
}

#[test]
fn items_lists_named_records() {
    let save = fixture_path("social_empires_save.json");
    let config = fixture_path("config.json");
    let output = run_cli(&["items", &save, "--config", &config, "--json"]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["town"], json!("0"));
    assert_eq!(value["items"][0]["name"], json!("Town Hall"));
}

#[test]
fn items_finds_positions_by_id() {
    let save = fixture_path("social_empires_save.json");
    let output = run_cli(&["items", &save, "--id", "101"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "Town 0: 2 items with id 101 at 0, 2");
}

#[test]
fn reconcile_applies_patch_directory() {
    let save = fixture_path("social_empires_save.json");
    let config = fixture_path("config.json");
    let patches = patch_dir();
    let output = run_cli(&[
        "reconcile",
        &save,
        "--config",
        &config,
        "--patch-dir",
        &patches,
        "--json",
    ]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["missing_in_config"], json!([999]));
    assert_eq!(value["unused_in_save"][2]["name"], json!("Elder Dragon"));
}

#[test]
fn no_patches_flag_loads_the_configuration_unpatched() {
    let save = fixture_path("social_empires_save.json");
    let config = fixture_path("config.json");
    let patches = patch_dir();
    let output = run_cli(&[
        "reconcile",
        &save,
        "--config",
        &config,
        "--patch-dir",
        &patches,
        "--no-patches",
        "--json",
    ]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["unused_in_save"][2]["name"], json!("Dragon"));
}

#[test]
fn add_writes_edited_save_and_leaves_input_untouched() {
    let save = fixture_path("social_empires_save.json");
    let config = fixture_path("config.json");
    let original = fs::read(&save).expect("fixture");
    let out = temp_output_path("empire_add");
    let out_str = out.to_string_lossy().to_string();

    let output = run_cli(&[
        "add", &save, "--config", &config, "--id", "103", "--town", "1", "--x", "3", "--y", "4",
        "--quantity", "2", "--output", &out_str,
    ]);
    assert!(output.status.success());
    assert_eq!(fs::read(&save).expect("fixture"), original);

    let edited: Value = serde_json::from_slice(&fs::read(&out).expect("output written"))
        .expect("output is JSON");
    assert_eq!(
        edited["maps"][1]["items"],
        json!([[103, 3, 4, 0, 0, 0, [], {}], [103, 3, 4, 0, 0, 0, [], {}]])
    );
    assert_eq!(edited["maps"][0]["items"].as_array().map(Vec::len), Some(4));

    let _ = fs::remove_file(out);
}

#[test]
fn add_unknown_id_fails_without_output() {
    let save = fixture_path("social_empires_save.json");
    let config = fixture_path("config.json");
    let out = temp_output_path("empire_add_unknown");
    let out_str = out.to_string_lossy().to_string();

    let output = run_cli(&[
        "add", &save, "--config", &config, "--id", "4242", "--output", &out_str,
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("UnknownIdentifier"));
    assert!(!out.exists());
}

#[test]
fn delete_by_index_and_id() {
    let save = fixture_path("social_empires_save.json");
    let out = temp_output_path("empire_delete");
    let out_str = out.to_string_lossy().to_string();

    let output = run_cli(&[
        "delete", &save, "--index", "1", "--id", "999", "--output", &out_str,
    ]);
    assert!(output.status.success());

    let edited: Value = serde_json::from_slice(&fs::read(&out).expect("output written"))
        .expect("output is JSON");
    let ids: Vec<Value> = edited["maps"][0]["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|item| item[0].clone())
        .collect();
    assert_eq!(ids, vec![json!(101), json!(101)]);

    let _ = fs::remove_file(out);
}

#[test]
fn delete_without_selection_is_a_usage_error() {
    let save = fixture_path("social_empires_save.json");
    let out = temp_output_path("empire_delete_usage");
    let out_str = out.to_string_lossy().to_string();

    let output = run_cli(&["delete", &save, "--output", &out_str]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn resources_edit_requires_output() {
    let save = fixture_path("social_empires_save.json");
    let output = run_cli(&["resources", &save, "--set-coins", "10"]);
    assert_eq!(output.status.code(), Some(2));

    let out = temp_output_path("empire_resources_usage");
    let out_str = out.to_string_lossy().to_string();
    let output = run_cli(&["resources", &save, "--output", &out_str]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn resources_edit_writes_new_values() {
    let save = fixture_path("social_empires_save.json");
    let out = temp_output_path("empire_resources");
    let out_str = out.to_string_lossy().to_string();

    let output = run_cli(&[
        "resources", &save, "--set-coins", "123", "--set-race", "t", "--set-skin", "4",
        "--output", &out_str, "--json",
    ]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["coins"], json!(123));
    assert_eq!(value["race"], json!("t"));
    assert_eq!(value["skin_name"], json!("Rocky Mountains"));

    let edited: Value = serde_json::from_slice(&fs::read(&out).expect("output written"))
        .expect("output is JSON");
    assert_eq!(edited["maps"][0]["coins"], json!(123));
    assert_eq!(edited["playerInfo"]["xp_bonus"], json!(3));

    let _ = fs::remove_file(out);
}

#[test]
fn config_reports_patches_and_exports() {
    let config = fixture_path("config.json");
    let patches = patch_dir();
    let out = temp_output_path("empire_config_export");
    let out_str = out.to_string_lossy().to_string();

    let output = run_cli(&[
        "config", &config, "--patch-dir", &patches, "--export", &out_str, "--json",
    ]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["entries"], json!(6));
    assert_eq!(value["patches"]["applied"].as_array().map(Vec::len), Some(2));
    assert_eq!(value["patches"]["skipped"].as_array().map(Vec::len), Some(2));

    let exported: Value = serde_json::from_slice(&fs::read(&out).expect("export written"))
        .expect("export is JSON");
    assert_eq!(exported["items"][4]["name"], json!("Elder Dragon"));
    assert_eq!(exported["items"][2]["gold"], json!(300));

    let _ = fs::remove_file(out);
}

#[test]
fn config_shows_one_entry() {
    let config = fixture_path("config.json");
    let output = run_cli(&["config", &config, "--id", "104", "--json"]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["name"], json!("Knight"));
    assert_eq!(value["id"], json!("104"));
}

#[test]
fn asset_prints_expected_paths() {
    let config = fixture_path("config.json");
    let output = run_cli(&[
        "asset",
        &config,
        "--id",
        "102",
        "--asset-dirs",
        "thumbs/a,thumbs/b",
        "--json",
    ]);
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(
        value["candidates"],
        json!(["thumbs/a/farm.jpg", "thumbs/b/farm.jpg"])
    );
    assert_eq!(value["found"], Value::Null);
}
