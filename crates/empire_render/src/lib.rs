use std::fmt::Write as _;

use empire_core::core_api::{
    Capabilities, CapabilityIssue, PatchReport, SaveSummary, SkippedPatch,
};
use empire_core::document::{ConfigDocument, ConfigEntry, Identifier, ItemListing, ItemRecord};
use empire_core::reconcile::ReconciliationReport;
use empire_core::resources::{PlayerResources, Resource};
use serde_json::{Map as JsonMap, Value as JsonValue};

const ITEM_COL_INDEX: usize = 5;
const ITEM_COL_ID: usize = 8;
const ITEM_COL_NAME: usize = 24;
const ITEM_COL_POS: usize = 6;
const TOWN_COL_NAME: usize = 20;
const RESOURCE_COL_NAME: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

pub fn render_summary_json(summary: &SaveSummary, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(summary_json(summary)),
    }
}

pub fn render_summary_text(summary: &SaveSummary) -> String {
    let mut out = String::new();
    let game = summary.dialect.game_name().unwrap_or("Unknown game");
    writeln!(out, "{game} ({})", summary.dialect).expect("writing to String cannot fail");

    let player = match (&summary.player_name, &summary.player_id) {
        (Some(name), Some(id)) => format!("{name} ({id})"),
        (Some(name), None) => name.clone(),
        (None, Some(id)) => id.clone(),
        (None, None) => "-".to_string(),
    };
    writeln!(out, "Player: {player}").expect("writing to String cannot fail");

    writeln!(out, "Towns:").expect("writing to String cannot fail");
    for town in &summary.towns {
        let marker = if town.selected { '*' } else { ' ' };
        let line = format!(
            "  {marker} {:<4}{:<w$}{} items",
            town.key.to_string(),
            fit_column(&town.name, TOWN_COL_NAME - 1),
            town.item_count,
            w = TOWN_COL_NAME
        );
        writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
    }
    writeln!(out, "Items: {}", summary.item_count).expect("writing to String cannot fail");
    if summary.modified {
        writeln!(out, "(modified)").expect("writing to String cannot fail");
    }
    out
}

/// Items of one town; names come from `config` when one is loaded.
pub fn render_items_json(
    listing: &ItemListing,
    config: Option<&ConfigDocument>,
    style: JsonStyle,
) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            out.insert(
                "town".to_string(),
                JsonValue::String(listing.town().to_string()),
            );
            out.insert("count".to_string(), JsonValue::from(listing.len()));
            out.insert(
                "items".to_string(),
                JsonValue::Array(
                    listing
                        .iter()
                        .enumerate()
                        .map(|(index, item)| item_to_json(index, item, config))
                        .collect(),
                ),
            );
            JsonValue::Object(out)
        }
    }
}

pub fn render_items_text(listing: &ItemListing, config: Option<&ConfigDocument>) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "Town {}: {} items",
        listing.town(),
        listing.len()
    )
    .expect("writing to String cannot fail");
    if listing.is_empty() {
        return out;
    }

    writeln!(
        out,
        "{:<a$}{:<b$}{:<c$}{:<d$}{}",
        "#",
        "ID",
        "NAME",
        "X",
        "Y",
        a = ITEM_COL_INDEX,
        b = ITEM_COL_ID,
        c = ITEM_COL_NAME,
        d = ITEM_COL_POS
    )
    .expect("writing to String cannot fail");
    for (index, item) in listing.iter().enumerate() {
        let name = entry_name(config, item.identifier()).unwrap_or("?");
        let (x, y) = match item.position() {
            Some((x, y)) => (x.to_string(), y.to_string()),
            None => ("-".to_string(), "-".to_string()),
        };
        let line = format!(
            "{:<a$}{:<b$}{:<c$}{:<d$}{}",
            index,
            item.identifier().to_string(),
            fit_column(name, ITEM_COL_NAME - 1),
            x,
            y,
            a = ITEM_COL_INDEX,
            b = ITEM_COL_ID,
            c = ITEM_COL_NAME,
            d = ITEM_COL_POS
        );
        writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
    }
    out
}

pub fn render_reconcile_json(
    report: &ReconciliationReport,
    config: &ConfigDocument,
    style: JsonStyle,
) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            out.insert("clean".to_string(), JsonValue::Bool(report.is_clean()));
            out.insert(
                "missing_in_config".to_string(),
                JsonValue::Array(
                    report
                        .missing_in_config
                        .iter()
                        .map(Identifier::to_value)
                        .collect(),
                ),
            );
            out.insert(
                "unused_in_save".to_string(),
                JsonValue::Array(
                    report
                        .unused_in_save
                        .iter()
                        .map(|id| identifier_with_name(id, Some(config)))
                        .collect(),
                ),
            );
            JsonValue::Object(out)
        }
    }
}

pub fn render_reconcile_text(report: &ReconciliationReport, config: &ConfigDocument) -> String {
    let mut out = String::new();
    if report.is_clean() {
        writeln!(out, "Every placed item is defined in the configuration.")
            .expect("writing to String cannot fail");
    } else {
        writeln!(
            out,
            "Missing from configuration ({}):",
            report.missing_in_config.len()
        )
        .expect("writing to String cannot fail");
        for id in &report.missing_in_config {
            writeln!(out, "  {id}").expect("writing to String cannot fail");
        }
    }

    writeln!(out, "Unused in save ({}):", report.unused_in_save.len())
        .expect("writing to String cannot fail");
    for id in &report.unused_in_save {
        let line = format!(
            "  {:<w$}{}",
            id.to_string(),
            entry_name(Some(config), id).unwrap_or(""),
            w = ITEM_COL_ID
        );
        writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
    }
    out
}

pub fn render_patch_report_json(report: &PatchReport, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            out.insert(
                "patching_available".to_string(),
                JsonValue::Bool(report.patches_applied()),
            );
            out.insert(
                "applied".to_string(),
                JsonValue::Array(report.applied.iter().cloned().map(JsonValue::String).collect()),
            );
            out.insert(
                "skipped".to_string(),
                JsonValue::Array(report.skipped.iter().map(skipped_to_json).collect()),
            );
            out.insert(
                "not_applied".to_string(),
                JsonValue::Array(
                    report
                        .not_applied
                        .iter()
                        .cloned()
                        .map(JsonValue::String)
                        .collect(),
                ),
            );
            JsonValue::Object(out)
        }
    }
}

pub fn render_patch_report_text(report: &PatchReport) -> String {
    let mut out = String::new();
    if !report.patches_applied() {
        writeln!(
            out,
            "Patching unavailable; {} patch file(s) not applied",
            report.not_applied.len()
        )
        .expect("writing to String cannot fail");
        for name in &report.not_applied {
            writeln!(out, "  not applied  {name}").expect("writing to String cannot fail");
        }
        return out;
    }

    writeln!(
        out,
        "Patches: {} applied, {} skipped",
        report.applied.len(),
        report.skipped.len()
    )
    .expect("writing to String cannot fail");
    for name in &report.applied {
        writeln!(out, "  applied  {name}").expect("writing to String cannot fail");
    }
    for skipped in &report.skipped {
        let mut location = String::new();
        if let Some(operation) = skipped.operation {
            location.push_str(&format!(" op {operation}"));
        }
        if let Some(path) = &skipped.path {
            location.push_str(&format!(" at {path}"));
        }
        writeln!(
            out,
            "  skipped  {}{location}: {}",
            skipped.file, skipped.error.message
        )
        .expect("writing to String cannot fail");
    }
    out
}

pub fn render_resources_json(resources: &PlayerResources, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            for resource in Resource::ALL {
                out.insert(
                    resource.key().to_string(),
                    JsonValue::from(resources.get(resource)),
                );
            }
            out.insert(
                "race".to_string(),
                JsonValue::String(resources.race.raw().to_string()),
            );
            out.insert("skin".to_string(), JsonValue::from(resources.skin));
            out.insert(
                "skin_name".to_string(),
                resources
                    .skin_name()
                    .map(|name| JsonValue::String(name.to_string()))
                    .unwrap_or(JsonValue::Null),
            );
            JsonValue::Object(out)
        }
    }
}

pub fn render_resources_text(resources: &PlayerResources) -> String {
    let mut out = String::new();
    for resource in Resource::ALL {
        writeln!(
            out,
            "{:<w$}{}",
            resource.key(),
            format_number_with_commas(resources.get(resource)),
            w = RESOURCE_COL_NAME
        )
        .expect("writing to String cannot fail");
    }
    writeln!(out, "{:<w$}{}", "race", resources.race, w = RESOURCE_COL_NAME)
        .expect("writing to String cannot fail");
    writeln!(
        out,
        "{:<w$}{} ({})",
        "skin",
        resources.skin,
        resources.skin_name().unwrap_or("unknown"),
        w = RESOURCE_COL_NAME
    )
    .expect("writing to String cannot fail");
    out
}

/// The definition exactly as the configuration holds it.
pub fn render_config_entry_json(entry: &ConfigEntry) -> JsonValue {
    entry.to_value()
}

pub fn render_config_entry_text(entry: &ConfigEntry) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{} {}",
        entry.identifier(),
        entry.name().unwrap_or("(unnamed)")
    )
    .expect("writing to String cannot fail");
    for (key, value) in entry.fields() {
        if key == "id" || key == "name" {
            continue;
        }
        writeln!(out, "  {key}: {}", scalar_text(value)).expect("writing to String cannot fail");
    }
    out
}

pub fn render_capabilities_json(capabilities: &Capabilities, style: JsonStyle) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => {
            let mut out = JsonMap::new();
            out.insert(
                "can_select_town".to_string(),
                JsonValue::Bool(capabilities.can_select_town),
            );
            out.insert(
                "can_add_items".to_string(),
                JsonValue::Bool(capabilities.can_add_items),
            );
            out.insert(
                "can_edit_resources".to_string(),
                JsonValue::Bool(capabilities.can_edit_resources),
            );
            out.insert(
                "can_patch".to_string(),
                JsonValue::Bool(capabilities.can_patch),
            );
            out.insert(
                "issues".to_string(),
                JsonValue::Array(
                    capabilities
                        .issues
                        .iter()
                        .map(|issue| JsonValue::String(capability_issue_name(*issue).to_string()))
                        .collect(),
                ),
            );
            JsonValue::Object(out)
        }
    }
}

fn capability_issue_name(issue: CapabilityIssue) -> &'static str {
    match issue {
        CapabilityIssue::PatchingUnavailable => "patching_unavailable",
        CapabilityIssue::NoTownSelector => "no_town_selector",
        CapabilityIssue::ResourcesUnavailable => "resources_unavailable",
        CapabilityIssue::NoConfigLoaded => "no_config_loaded",
    }
}

fn summary_json(summary: &SaveSummary) -> JsonMap<String, JsonValue> {
    let mut out = JsonMap::new();
    out.insert(
        "game".to_string(),
        summary
            .dialect
            .game_name()
            .map(|name| JsonValue::String(name.to_string()))
            .unwrap_or(JsonValue::Null),
    );
    out.insert(
        "dialect".to_string(),
        JsonValue::String(summary.dialect.as_str().to_string()),
    );
    out.insert("player_id".to_string(), optional_string(&summary.player_id));
    out.insert(
        "player_name".to_string(),
        optional_string(&summary.player_name),
    );
    out.insert(
        "towns".to_string(),
        JsonValue::Array(
            summary
                .towns
                .iter()
                .map(|town| {
                    let mut entry = JsonMap::new();
                    entry.insert("key".to_string(), JsonValue::String(town.key.to_string()));
                    entry.insert("name".to_string(), JsonValue::String(town.name.clone()));
                    entry.insert("item_count".to_string(), JsonValue::from(town.item_count));
                    entry.insert("selected".to_string(), JsonValue::Bool(town.selected));
                    JsonValue::Object(entry)
                })
                .collect(),
        ),
    );
    out.insert("item_count".to_string(), JsonValue::from(summary.item_count));
    out.insert("modified".to_string(), JsonValue::Bool(summary.modified));
    out
}

fn item_to_json(index: usize, item: &ItemRecord, config: Option<&ConfigDocument>) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("index".to_string(), JsonValue::from(index));
    out.insert("id".to_string(), item.identifier().to_value());
    out.insert(
        "name".to_string(),
        entry_name(config, item.identifier())
            .map(|name| JsonValue::String(name.to_string()))
            .unwrap_or(JsonValue::Null),
    );
    let (x, y) = match item.position() {
        Some((x, y)) => (JsonValue::from(x), JsonValue::from(y)),
        None => (JsonValue::Null, JsonValue::Null),
    };
    out.insert("x".to_string(), x);
    out.insert("y".to_string(), y);
    out.insert("record".to_string(), item.to_value());
    JsonValue::Object(out)
}

fn identifier_with_name(id: &Identifier, config: Option<&ConfigDocument>) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("id".to_string(), id.to_value());
    out.insert(
        "name".to_string(),
        entry_name(config, id)
            .map(|name| JsonValue::String(name.to_string()))
            .unwrap_or(JsonValue::Null),
    );
    JsonValue::Object(out)
}

fn skipped_to_json(skipped: &SkippedPatch) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("file".to_string(), JsonValue::String(skipped.file.clone()));
    out.insert(
        "operation".to_string(),
        skipped.operation.map(JsonValue::from).unwrap_or(JsonValue::Null),
    );
    out.insert("path".to_string(), optional_string(&skipped.path));
    out.insert(
        "code".to_string(),
        JsonValue::String(format!("{:?}", skipped.error.code)),
    );
    out.insert(
        "message".to_string(),
        JsonValue::String(skipped.error.message.clone()),
    );
    JsonValue::Object(out)
}

fn entry_name<'a>(config: Option<&'a ConfigDocument>, id: &Identifier) -> Option<&'a str> {
    config?.get(id)?.name()
}

fn optional_string(value: &Option<String>) -> JsonValue {
    match value {
        Some(v) => JsonValue::String(v.clone()),
        None => JsonValue::Null,
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn fit_column(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width <= 3 {
        return value.chars().take(width).collect();
    }

    let mut out = String::with_capacity(width);
    for ch in value.chars().take(width - 3) {
        out.push(ch);
    }
    out.push_str("...");
    out
}

fn format_number_with_commas(n: i64) -> String {
    let sign = if n < 0 { "-" } else { "" };
    format!("{sign}{}", group_digits(n.unsigned_abs()))
}

fn group_digits(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}
