use std::fs;
use std::path::PathBuf;

use empire_core::core_api::CoreErrorCode;
use empire_core::document::SaveDocument;
use empire_core::resources::{self, Race, Resource};
use serde_json::json;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_save(name: &str) -> SaveDocument {
    let bytes = fs::read(workspace_root().join("tests/fixtures").join(name))
        .expect("fixture should be readable");
    SaveDocument::parse(&bytes).expect("fixture should parse")
}

#[test]
fn reads_every_resource_from_its_section() {
    let save = fixture_save("social_empires_save.json");
    let res = resources::read(&save).expect("multi-town save has resources");

    assert_eq!(res.cash, 250);
    assert_eq!(res.coins, 5000);
    assert_eq!(res.xp, 120);
    assert_eq!(res.level, 4);
    assert_eq!(res.stone, 30);
    assert_eq!(res.wood, 40);
    assert_eq!(res.food, 50);
    assert_eq!(res.mana, 15);
    assert_eq!(res.race, Race::Humans);
    assert_eq!(res.skin, 2);
    assert_eq!(res.skin_name(), Some("Snowy Plains"));
    assert_eq!(res.get(Resource::Mana), 15);
}

#[test]
fn absent_fields_fall_back_to_defaults() {
    let save = fixture_save("keyed_towns_save.json");
    let res = resources::read(&save).expect("keyed save has resources");

    assert_eq!(res.cash, 1);
    assert_eq!(res.coins, 1);
    assert_eq!(res.xp, 0);
    assert_eq!(res.level, 1);
    assert_eq!(res.race, Race::Humans);
    assert_eq!(res.skin, 0);
}

#[test]
fn edits_touch_only_the_named_keys() {
    let mut save = fixture_save("social_empires_save.json");

    resources::set_resource(&mut save, Resource::Coins, 9999).expect("coins");
    resources::set_resource(&mut save, Resource::Cash, 1).expect("cash");
    resources::set_resource(&mut save, Resource::Mana, 40).expect("mana");
    resources::set_race(&mut save, Race::Trolls).expect("race");
    resources::set_skin(&mut save, 6).expect("skin");
    assert!(save.is_modified());

    let reparsed = SaveDocument::parse(&save.to_bytes().expect("serialise")).expect("reload");
    let res = resources::read(&reparsed).expect("resources");
    assert_eq!(res.coins, 9999);
    assert_eq!(res.cash, 1);
    assert_eq!(res.mana, 40);
    assert_eq!(res.race, Race::Trolls);
    assert_eq!(res.skin_name(), Some("Cloudy Heaven"));

    let info = reparsed.player_info().expect("playerInfo survives");
    assert_eq!(info.get("xp_bonus"), Some(&json!(3)));
    assert_eq!(
        reparsed.field("privateState").and_then(|v| v.get("unlocked")),
        Some(&json!([3, 4]))
    );
    assert_eq!(reparsed.towns()[0].len(), 4);
    assert_eq!(reparsed.towns()[1].field("coins"), Some(&json!(10)));
}

#[test]
fn invalid_values_are_rejected_without_changes() {
    let mut save = fixture_save("social_empires_save.json");

    let err = resources::set_resource(&mut save, Resource::Wood, -5).expect_err("negative");
    assert_eq!(err.code, CoreErrorCode::UnsupportedOperation);

    let err = resources::set_skin(&mut save, 7).expect_err("only seven skins");
    assert_eq!(err.code, CoreErrorCode::UnsupportedOperation);

    let err = resources::set_race(&mut save, Race::from_raw("x")).expect_err("unknown race");
    assert_eq!(err.code, CoreErrorCode::UnsupportedOperation);

    assert!(!save.is_modified());
}

#[test]
fn single_town_saves_have_no_resource_sections() {
    let mut save = fixture_save("social_wars_save.json");

    let err = resources::read(&save).expect_err("no towns/privateState");
    assert_eq!(err.code, CoreErrorCode::UnsupportedOperation);
    let err = resources::set_resource(&mut save, Resource::Coins, 1).expect_err("no sections");
    assert_eq!(err.code, CoreErrorCode::UnsupportedOperation);
    assert!(!save.is_modified());
}

#[test]
fn race_codes_map_to_names() {
    assert_eq!(Race::from_raw("h"), Race::Humans);
    assert_eq!(Race::from_raw("t"), Race::Trolls);
    assert_eq!(Race::Trolls.raw(), "t");
    assert_eq!(Race::from_raw("z").to_string(), "Unknown (z)");
}
