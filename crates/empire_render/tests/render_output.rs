use std::fs;
use std::path::PathBuf;

use empire_core::core_api::{Engine, Session};
use empire_core::document::TownKey;
use empire_core::patch::read_patch_dir;
use empire_core::resources::{PlayerResources, Race};
use empire_render::{
    JsonStyle, render_capabilities_json, render_items_json, render_items_text,
    render_patch_report_json, render_patch_report_text, render_reconcile_json,
    render_reconcile_text, render_resources_json, render_resources_text, render_summary_json,
    render_summary_text,
};
use serde_json::{Value, json};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture(name: &str) -> Vec<u8> {
    fs::read(workspace_root().join("tests/fixtures").join(name))
        .expect("fixture should be readable")
}

fn loaded_session() -> Session {
    let patches = read_patch_dir(&workspace_root().join("tests/fixtures/patches"))
        .expect("patch dir");
    let mut session = Session::new(Engine::new());
    session
        .open_save(fixture("social_empires_save.json"))
        .expect("save should load");
    session
        .open_config(fixture("config.json"), &patches)
        .expect("config should load");
    session
}

fn keys(value: &Value) -> Vec<&str> {
    value
        .as_object()
        .expect("json should be an object")
        .keys()
        .map(String::as_str)
        .collect()
}

#[test]
fn summary_json_uses_canonical_key_order() {
    let session = loaded_session();
    let value = render_summary_json(&session.summary().expect("summary"), JsonStyle::CanonicalV1);

    assert_eq!(
        keys(&value),
        vec![
            "game",
            "dialect",
            "player_id",
            "player_name",
            "towns",
            "item_count",
            "modified",
        ]
    );
    assert_eq!(value["game"], json!("Social Empires"));
    assert_eq!(value["towns"][1]["name"], json!("Outpost"));
    assert_eq!(value["towns"][0]["selected"], json!(true));
}

#[test]
fn summary_text_marks_the_selected_town() {
    let session = loaded_session();
    let text = render_summary_text(&session.summary().expect("summary"));
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Social Empires (multi-town save)");
    assert_eq!(lines[1], "Player: Tester (1001)");
    assert_eq!(lines[2], "Towns:");
    assert!(lines[3].starts_with("  * 0"));
    assert!(lines[3].contains("Home"));
    assert!(lines[3].ends_with("4 items"));
    assert!(lines[4].starts_with("    1"));
    assert_eq!(lines[5], "Items: 4");
}

#[test]
fn items_render_with_configuration_names() {
    let session = loaded_session();
    let listing = session.list(&TownKey::Index(0)).expect("home");

    let value = render_items_json(&listing, session.config(), JsonStyle::CanonicalV1);
    assert_eq!(value["count"], json!(4));
    assert_eq!(
        keys(&value["items"][0]),
        vec!["index", "id", "name", "x", "y", "record"]
    );
    assert_eq!(value["items"][1]["name"], json!("Farm"));
    assert_eq!(value["items"][3]["name"], Value::Null);
    assert_eq!(value["items"][1]["record"][7], json!({"hp": 90}));

    let text = render_items_text(&listing, session.config());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Town 0: 4 items");
    assert!(lines[1].starts_with("#"));
    assert!(lines[3].contains("Farm"));
    assert!(lines[5].contains("999"));
    assert!(lines[5].contains('?'));
}

#[test]
fn empty_town_renders_header_only() {
    let session = loaded_session();
    let listing = session.list(&TownKey::Index(1)).expect("outpost");
    assert_eq!(render_items_text(&listing, None), "Town 1: 0 items\n");
}

#[test]
fn reconcile_renders_missing_and_named_unused() {
    let session = loaded_session();
    let report = session.reconcile().expect("reconcile");
    let config = session.config().expect("config");

    let value = render_reconcile_json(&report, config, JsonStyle::CanonicalV1);
    assert_eq!(value["clean"], json!(false));
    assert_eq!(value["missing_in_config"], json!([999]));
    assert_eq!(
        value["unused_in_save"][2],
        json!({"id": 105, "name": "Elder Dragon"})
    );

    let text = render_reconcile_text(&report, config);
    assert!(text.starts_with("Missing from configuration (1):\n  999\n"));
    assert!(text.contains("Unused in save (4):"));
    assert!(text.contains("103     Barracks"));
}

#[test]
fn patch_report_lists_applied_and_skipped_files() {
    let session = loaded_session();
    let report = session.patch_report().expect("report");

    let value = render_patch_report_json(report, JsonStyle::CanonicalV1);
    assert_eq!(
        keys(&value),
        vec!["patching_available", "applied", "skipped", "not_applied"]
    );
    assert_eq!(value["skipped"][0]["operation"], json!(1));
    assert_eq!(value["skipped"][0]["path"], json!("/items/40/name"));
    assert_eq!(
        value["skipped"][0]["code"],
        json!("PatchApplicationFailure")
    );

    let text = render_patch_report_text(report);
    assert!(text.starts_with("Patches: 2 applied, 2 skipped\n"));
    assert!(text.contains("  applied  01_dragon_cost.json\n"));
    assert!(text.contains("  skipped  03_missing_target.json op 1 at /items/40/name: "));
}

#[test]
fn resources_render_in_fixed_order() {
    let session = loaded_session();
    let resources = session.resources().expect("resources");

    let value = render_resources_json(&resources, JsonStyle::CanonicalV1);
    assert_eq!(
        keys(&value),
        vec![
            "cash", "coins", "xp", "level", "stone", "wood", "food", "mana", "race", "skin",
            "skin_name",
        ]
    );
    assert_eq!(value["skin_name"], json!("Snowy Plains"));

    let text = render_resources_text(&resources);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "cash    250");
    assert_eq!(lines[1], "coins   5,000");
    assert_eq!(lines[8], "race    Humans");
    assert_eq!(lines[9], "skin    2 (Snowy Plains)");
}

#[test]
fn resources_text_handles_extreme_values() {
    let resources = PlayerResources {
        cash: i64::MIN,
        coins: i64::MAX,
        xp: -1234,
        level: 1,
        stone: 0,
        wood: 999,
        food: 1000,
        mana: 0,
        race: Race::Trolls,
        skin: 0,
    };

    let text = render_resources_text(&resources);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "cash    -9,223,372,036,854,775,808");
    assert_eq!(lines[1], "coins   9,223,372,036,854,775,807");
    assert_eq!(lines[2], "xp      -1,234");
    assert_eq!(lines[5], "wood    999");
    assert_eq!(lines[6], "food    1,000");
}

#[test]
fn capabilities_json_names_issues() {
    let session = loaded_session();
    let value = render_capabilities_json(&session.capabilities(), JsonStyle::CanonicalV1);
    assert_eq!(
        keys(&value),
        vec![
            "can_select_town",
            "can_add_items",
            "can_edit_resources",
            "can_patch",
            "issues",
        ]
    );
    assert_eq!(value["can_add_items"], json!(true));
    assert_eq!(value["issues"], json!([]));

    let empty = Session::new(Engine::new());
    let value = render_capabilities_json(&empty.capabilities(), JsonStyle::CanonicalV1);
    assert_eq!(value["can_select_town"], json!(false));
    assert_eq!(value["issues"], json!(["no_config_loaded"]));
}
