use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use empire_core::core_api::CoreErrorCode;
use empire_core::dialect::Dialect;
use empire_core::document::{ConfigDocument, Identifier, SaveDocument, TownKey};
use empire_core::mutation;
use empire_core::reconcile::{reconcile, reconcile_town};
use serde_json::json;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture(name: &str) -> Vec<u8> {
    fs::read(workspace_root().join("tests/fixtures").join(name))
        .expect("fixture should be readable")
}

fn ids(values: &[i64]) -> BTreeSet<Identifier> {
    values.iter().copied().map(Identifier::Int).collect()
}

#[test]
fn reports_missing_and_unused_identifiers() {
    let save = SaveDocument::parse(&fixture("social_empires_save.json")).expect("save");
    let config = ConfigDocument::parse(&fixture("config.json")).expect("config");

    let report = reconcile(&save, &config);
    assert_eq!(report.missing_in_config, ids(&[999]));
    assert_eq!(report.unused_in_save, ids(&[103, 104, 105, 201]));
    assert!(!report.is_clean());
}

#[test]
fn report_follows_edits_to_the_save() {
    let mut save = SaveDocument::parse(&fixture("social_empires_save.json")).expect("save");
    let config = ConfigDocument::parse(&fixture("config.json")).expect("config");

    let orphans = mutation::find(&save, &TownKey::Index(0), &Identifier::Int(999)).expect("town");
    mutation::delete_many(&mut save, &orphans).expect("delete orphan");
    mutation::add(&mut save, &config, &Identifier::Int(103), &Default::default())
        .expect("add barracks");

    let report = reconcile(&save, &config);
    assert!(report.is_clean());
    assert_eq!(report.unused_in_save, ids(&[104, 105, 201]));
}

#[test]
fn single_town_save_reconciles_against_the_same_configuration() {
    let save = SaveDocument::parse(&fixture("social_wars_save.json")).expect("save");
    let config = ConfigDocument::parse(&fixture("config.json")).expect("config");

    let report = reconcile(&save, &config);
    assert_eq!(report.missing_in_config, ids(&[202]));
    assert_eq!(report.unused_in_save, ids(&[101, 102, 103, 104, 105]));
}

#[test]
fn string_identifiers_in_the_save_match_integer_definitions() {
    let save = SaveDocument::from_value(
        json!({"playerInfo": {}, "items": [{"id": "104", "x": 1, "y": 1}]}),
        Dialect::SaveDialectSingleTown,
    )
    .expect("save");
    let config = ConfigDocument::parse(&fixture("config.json")).expect("config");

    let report = reconcile(&save, &config);
    assert!(report.missing_in_config.is_empty());
    assert!(!report.unused_in_save.contains(&Identifier::Int(104)));
}

#[test]
fn town_scope_limits_missing_but_not_unused() {
    let save = SaveDocument::parse(&fixture("social_empires_save.json")).expect("save");
    let config = ConfigDocument::parse(&fixture("config.json")).expect("config");

    let outpost = reconcile_town(&save, &TownKey::Index(1), &config).expect("outpost exists");
    assert!(outpost.missing_in_config.is_empty());
    assert_eq!(outpost.unused_in_save, ids(&[103, 104, 105, 201]));

    let home = reconcile_town(&save, &TownKey::Index(0), &config).expect("home exists");
    assert_eq!(home.missing_in_config, ids(&[999]));
}

#[test]
fn unknown_town_is_reported() {
    let save = SaveDocument::parse(&fixture("social_empires_save.json")).expect("save");
    let config = ConfigDocument::parse(&fixture("config.json")).expect("config");

    let err = reconcile_town(&save, &TownKey::Index(7), &config).expect_err("no town 7");
    assert_eq!(err.code, CoreErrorCode::ReferenceNotFound);
    assert_eq!(err.subject.as_deref(), Some("7"));
}

#[test]
fn empty_configuration_leaves_everything_missing() {
    let save = SaveDocument::parse(&fixture("keyed_towns_save.json")).expect("save");
    let config = ConfigDocument::from_value(json!({"items": []})).expect("empty config");

    let report = reconcile(&save, &config);
    assert_eq!(report.missing_in_config, ids(&[101]));
    assert!(report.unused_in_save.is_empty());
}
