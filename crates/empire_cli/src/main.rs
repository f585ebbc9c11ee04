use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use empire_core::core_api::{Engine, EngineOptions, Session};
use empire_core::document::{Identifier, TownKey};
use empire_core::patch::{PatchCapability, PatchFile, read_patch_dir};
use empire_core::resources::{Race, Resource};
use empire_render::{
    JsonStyle, render_capabilities_json, render_config_entry_json, render_config_entry_text,
    render_items_json, render_items_text, render_patch_report_json, render_patch_report_text,
    render_reconcile_json, render_reconcile_text, render_resources_json, render_resources_text,
    render_summary_json, render_summary_text,
};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Log core activity at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Directory of JSON Patch files applied to every loaded configuration.
    #[arg(long, global = true, env = "EMPIRE_SE_PATCH_DIR", value_name = "DIR")]
    patch_dir: Option<PathBuf>,
    /// Load configurations without applying patches.
    #[arg(long, global = true)]
    no_patches: bool,
    /// Thumbnail directories, comma separated, searched in order.
    #[arg(
        long,
        global = true,
        env = "EMPIRE_SE_ASSET_DIRS",
        value_delimiter = ',',
        value_name = "DIR,..."
    )]
    asset_dirs: Vec<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dialect, player and towns of a save.
    Inspect {
        #[arg(value_name = "SAVE")]
        save: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Items of one town, optionally only those with a given id.
    Items {
        #[arg(value_name = "SAVE")]
        save: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        town: Option<String>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Identifiers placed in the save but missing from the configuration, and
    /// the reverse.
    Reconcile {
        #[arg(value_name = "SAVE")]
        save: PathBuf,
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        town: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Place new items in a town.
    Add(AddArgs),
    /// Remove items from a town.
    Delete(DeleteArgs),
    /// Show or edit player resources.
    Resources(ResourcesArgs),
    /// Show the patched configuration.
    Config {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
        #[arg(long)]
        id: Option<String>,
        /// Write the patched configuration here.
        #[arg(long)]
        export: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Expected thumbnail path of a configuration entry.
    Asset {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
        #[arg(long)]
        id: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(value_name = "SAVE")]
    save: PathBuf,
    #[arg(long)]
    config: PathBuf,
    #[arg(long)]
    id: String,
    #[arg(long)]
    town: Option<String>,
    #[arg(long, default_value_t = 1)]
    quantity: usize,
    #[arg(long, allow_hyphen_values = true)]
    x: Option<i64>,
    #[arg(long, allow_hyphen_values = true)]
    y: Option<i64>,
    /// Extra field override, `KEY=VALUE`; VALUE is read as JSON when it parses.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, JsonValue)>,
    #[arg(long)]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    #[arg(value_name = "SAVE")]
    save: PathBuf,
    #[arg(long)]
    town: Option<String>,
    /// Position of an item in the town listing; repeatable.
    #[arg(long = "index")]
    indexes: Vec<usize>,
    /// Delete every item with this id.
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    output: PathBuf,
}

#[derive(Debug, Args)]
struct ResourcesArgs {
    #[arg(value_name = "SAVE")]
    save: PathBuf,
    #[arg(long = "set-cash")]
    set_cash: Option<i64>,
    #[arg(long = "set-coins")]
    set_coins: Option<i64>,
    #[arg(long = "set-xp")]
    set_xp: Option<i64>,
    #[arg(long = "set-level")]
    set_level: Option<i64>,
    #[arg(long = "set-stone")]
    set_stone: Option<i64>,
    #[arg(long = "set-wood")]
    set_wood: Option<i64>,
    #[arg(long = "set-food")]
    set_food: Option<i64>,
    #[arg(long = "set-mana")]
    set_mana: Option<i64>,
    #[arg(long = "set-race")]
    set_race: Option<RaceArg>,
    #[arg(long = "set-skin")]
    set_skin: Option<usize>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

impl ResourcesArgs {
    fn value_edits(&self) -> [(Resource, Option<i64>); 8] {
        [
            (Resource::Cash, self.set_cash),
            (Resource::Coins, self.set_coins),
            (Resource::Xp, self.set_xp),
            (Resource::Level, self.set_level),
            (Resource::Stone, self.set_stone),
            (Resource::Wood, self.set_wood),
            (Resource::Food, self.set_food),
            (Resource::Mana, self.set_mana),
        ]
    }

    fn has_edits(&self) -> bool {
        self.value_edits().iter().any(|(_, v)| v.is_some())
            || self.set_race.is_some()
            || self.set_skin.is_some()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum RaceArg {
    #[value(alias = "h")]
    Humans,
    #[value(alias = "t")]
    Trolls,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let options = engine_options(&cli);
    let patches = load_patches(&cli);
    let mut session = Session::new(Engine::with_options(options));

    match cli.command {
        Command::Inspect { save, json } => {
            open_save(&mut session, &save);
            let summary = session
                .summary()
                .unwrap_or_else(|e| exit_with("Error summarising save", e));
            if json {
                let mut value = render_summary_json(&summary, JsonStyle::CanonicalV1);
                if let JsonValue::Object(fields) = &mut value {
                    fields.insert(
                        "capabilities".to_string(),
                        render_capabilities_json(&session.capabilities(), JsonStyle::CanonicalV1),
                    );
                }
                print_json(&value);
            } else {
                print!("{}", render_summary_text(&summary));
            }
        }
        Command::Items {
            save,
            config,
            town,
            id,
            json,
        } => {
            open_save(&mut session, &save);
            if let Some(config) = &config {
                open_config(&mut session, config, &patches);
            }
            let town = town_or_selected(&session, town.as_deref());
            let listing = session
                .list(&town)
                .unwrap_or_else(|e| exit_with("Error listing items", e));

            if let Some(id) = id {
                let identifier = Identifier::parse(&id);
                let found = session
                    .find(&town, &identifier)
                    .unwrap_or_else(|e| exit_with("Error finding items", e));
                let references = listing.references();
                let positions: Vec<usize> = found
                    .iter()
                    .filter_map(|r| references.iter().position(|candidate| candidate == r))
                    .collect();
                if json {
                    let mut out = JsonMap::new();
                    out.insert("town".to_string(), JsonValue::String(town.to_string()));
                    out.insert("id".to_string(), identifier.to_value());
                    out.insert(
                        "indexes".to_string(),
                        JsonValue::Array(positions.iter().map(|&i| JsonValue::from(i)).collect()),
                    );
                    print_json(&JsonValue::Object(out));
                } else {
                    let joined: Vec<String> = positions.iter().map(ToString::to_string).collect();
                    println!(
                        "Town {town}: {} items with id {identifier}{}",
                        positions.len(),
                        if joined.is_empty() {
                            String::new()
                        } else {
                            format!(" at {}", joined.join(", "))
                        }
                    );
                }
                return;
            }

            if json {
                print_json(&render_items_json(
                    &listing,
                    session.config(),
                    JsonStyle::CanonicalV1,
                ));
            } else {
                print!("{}", render_items_text(&listing, session.config()));
            }
        }
        Command::Reconcile {
            save,
            config,
            town,
            json,
        } => {
            open_save(&mut session, &save);
            open_config(&mut session, &config, &patches);
            let report = match town {
                Some(town) => session.reconcile_town(&TownKey::parse(&town)),
                None => session.reconcile(),
            }
            .unwrap_or_else(|e| exit_with("Error reconciling", e));
            let Some(config) = session.config() else {
                exit_with("Error reconciling", "no configuration is loaded");
            };
            if json {
                print_json(&render_reconcile_json(&report, config, JsonStyle::CanonicalV1));
            } else {
                print!("{}", render_reconcile_text(&report, config));
            }
        }
        Command::Add(args) => run_add(&mut session, &patches, args),
        Command::Delete(args) => run_delete(&mut session, args),
        Command::Resources(args) => run_resources(&mut session, args),
        Command::Config {
            config,
            id,
            export,
            json,
        } => {
            open_config(&mut session, &config, &patches);
            let (Some(loaded), Some(report)) = (session.config(), session.patch_report()) else {
                exit_with("Error loading configuration", "no configuration is loaded");
            };

            if let Some(path) = &export {
                let bytes = session
                    .export_config()
                    .unwrap_or_else(|e| exit_with("Error serialising configuration", e));
                write_output(path, &bytes);
            }

            if let Some(id) = id {
                let identifier = Identifier::parse(&id);
                let Some(entry) = loaded.get(&identifier) else {
                    exit_with("Error looking up entry", format!("unknown id {identifier}"));
                };
                if json {
                    print_json(&render_config_entry_json(entry));
                } else {
                    print!("{}", render_config_entry_text(entry));
                }
                return;
            }

            if json {
                let mut out = JsonMap::new();
                out.insert("entries".to_string(), JsonValue::from(loaded.len()));
                out.insert(
                    "patches".to_string(),
                    render_patch_report_json(report, JsonStyle::CanonicalV1),
                );
                if let Some(path) = &export {
                    out.insert(
                        "exported".to_string(),
                        JsonValue::String(path.display().to_string()),
                    );
                }
                print_json(&JsonValue::Object(out));
            } else {
                println!("Configuration: {} entries", loaded.len());
                print!("{}", render_patch_report_text(report));
                if let Some(path) = &export {
                    println!("Wrote patched configuration to {}", path.display());
                }
            }
        }
        Command::Asset { config, id, json } => {
            open_config(&mut session, &config, &patches);
            let identifier = Identifier::parse(&id);
            let Some(loaded) = session.config() else {
                exit_with("Error loading configuration", "no configuration is loaded");
            };
            let candidates = session
                .engine()
                .asset_locator()
                .candidates(loaded, &identifier)
                .unwrap_or_else(|e| exit_with("Error locating asset", e));
            let found = session
                .asset_path(&identifier)
                .unwrap_or_else(|e| exit_with("Error locating asset", e));

            if json {
                let mut out = JsonMap::new();
                out.insert("id".to_string(), identifier.to_value());
                out.insert(
                    "candidates".to_string(),
                    JsonValue::Array(
                        candidates
                            .iter()
                            .map(|p| JsonValue::String(p.display().to_string()))
                            .collect(),
                    ),
                );
                out.insert(
                    "found".to_string(),
                    found
                        .as_ref()
                        .map(|p| JsonValue::String(p.display().to_string()))
                        .unwrap_or(JsonValue::Null),
                );
                print_json(&JsonValue::Object(out));
            } else if candidates.is_empty() {
                println!("{identifier} has no thumbnail");
            } else {
                for path in &candidates {
                    let marker = if found.as_ref() == Some(path) {
                        "found"
                    } else {
                        "expected"
                    };
                    println!("{marker:<9}{}", path.display());
                }
            }
        }
    }
}

fn run_add(session: &mut Session, patches: &[PatchFile], args: AddArgs) {
    open_save(session, &args.save);
    open_config(session, &args.config, patches);

    if let Some(town) = &args.town {
        session
            .select_town(&TownKey::parse(town))
            .unwrap_or_else(|e| exit_with("Error selecting town", e));
    }

    let mut overrides = JsonMap::new();
    if let Some(x) = args.x {
        overrides.insert("x".to_string(), JsonValue::from(x));
    }
    if let Some(y) = args.y {
        overrides.insert("y".to_string(), JsonValue::from(y));
    }
    for (key, value) in args.overrides {
        overrides.insert(key, value);
    }

    let identifier = Identifier::parse(&args.id);
    let added = session
        .add_many(&identifier, &overrides, args.quantity)
        .unwrap_or_else(|e| exit_with("Error adding items", e));
    write_save(session, &args.output);
    println!(
        "Added {} x {identifier}; wrote edited save to {}",
        added.len(),
        args.output.display()
    );
}

fn run_delete(session: &mut Session, args: DeleteArgs) {
    if args.indexes.is_empty() && args.id.is_none() {
        eprintln!("delete requires --index <N> or --id <ID>");
        process::exit(2);
    }

    open_save(session, &args.save);
    let town = town_or_selected(session, args.town.as_deref());

    let mut references = Vec::new();
    for &index in &args.indexes {
        let reference = session
            .item_at(&town, index)
            .unwrap_or_else(|e| exit_with("Error resolving item", e));
        references.push(reference);
    }
    if let Some(id) = &args.id {
        let found = session
            .find(&town, &Identifier::parse(id))
            .unwrap_or_else(|e| exit_with("Error finding items", e));
        references.extend(found);
    }

    let removed = session
        .delete_many(&references)
        .unwrap_or_else(|e| exit_with("Error deleting items", e));
    write_save(session, &args.output);
    println!(
        "Deleted {} items; wrote edited save to {}",
        removed.len(),
        args.output.display()
    );
}

fn run_resources(session: &mut Session, args: ResourcesArgs) {
    let has_edits = args.has_edits();
    if has_edits && args.output.is_none() {
        eprintln!("--set-* flags require --output <PATH>");
        process::exit(2);
    }
    if !has_edits && args.output.is_some() {
        eprintln!("--output requires at least one --set-* flag");
        process::exit(2);
    }

    open_save(session, &args.save);

    for (resource, value) in args.value_edits() {
        if let Some(value) = value {
            session
                .set_resource(resource, value)
                .unwrap_or_else(|e| exit_with(&format!("Error applying {resource} edit"), e));
        }
    }
    if let Some(race) = args.set_race {
        let race = match race {
            RaceArg::Humans => Race::Humans,
            RaceArg::Trolls => Race::Trolls,
        };
        session
            .set_race(race)
            .unwrap_or_else(|e| exit_with("Error applying race edit", e));
    }
    if let Some(skin) = args.set_skin {
        session
            .set_skin(skin)
            .unwrap_or_else(|e| exit_with("Error applying skin edit", e));
    }

    if let Some(path) = &args.output {
        write_save(session, path);
    }

    let resources = session
        .resources()
        .unwrap_or_else(|e| exit_with("Error reading resources", e));
    if args.json {
        print_json(&render_resources_json(&resources, JsonStyle::CanonicalV1));
    } else {
        if let Some(path) = &args.output {
            println!("Wrote edited save to {}", path.display());
        }
        print!("{}", render_resources_text(&resources));
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,empire_core=debug,empire_se=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
}

fn engine_options(cli: &Cli) -> EngineOptions {
    let mut options = EngineOptions::default();
    if cli.no_patches {
        options.patch_capability = PatchCapability::Unavailable;
    }
    if !cli.asset_dirs.is_empty() {
        options.asset_dirs = cli.asset_dirs.clone();
    }
    options
}

fn load_patches(cli: &Cli) -> Vec<PatchFile> {
    let Some(dir) = &cli.patch_dir else {
        return Vec::new();
    };
    let patches = read_patch_dir(dir).unwrap_or_else(|e| {
        exit_with(&format!("Error reading patch directory {}", dir.display()), e)
    });
    debug!(dir = %dir.display(), count = patches.len(), "patch files found");
    patches
}

fn open_save(session: &mut Session, path: &Path) {
    let bytes = read_input(path);
    if let Err(e) = session.open_save(bytes) {
        eprintln!("Error parsing save file: {}", path.display());
        eprintln!("  {e}");
        process::exit(1);
    }
}

fn open_config(session: &mut Session, path: &Path, patches: &[PatchFile]) {
    let bytes = read_input(path);
    match session.open_config(bytes, patches) {
        Ok(report) => {
            for skipped in &report.skipped {
                warn!(file = %skipped.file, error = %skipped.error, "patch not applied");
            }
        }
        Err(e) => {
            eprintln!("Error parsing configuration file: {}", path.display());
            eprintln!("  {e}");
            process::exit(1);
        }
    }
}

fn read_input(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    })
}

fn write_save(session: &Session, path: &Path) {
    let bytes = session
        .serialize()
        .unwrap_or_else(|e| exit_with("Error creating modified save bytes", e));
    write_output(path, &bytes);
}

fn write_output(path: &Path, bytes: &[u8]) {
    fs::write(path, bytes).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", path.display());
        process::exit(1);
    });
}

fn town_or_selected(session: &Session, town: Option<&str>) -> TownKey {
    match town {
        Some(raw) => TownKey::parse(raw),
        None => match session.save() {
            Some(save) => save.selected_town().key().clone(),
            None => exit_with("Error selecting town", "no save is loaded"),
        },
    }
}

fn print_json(value: &JsonValue) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    println!("{rendered}");
}

fn exit_with(context: &str, err: impl Display) -> ! {
    eprintln!("{context}: {err}");
    process::exit(1);
}

fn parse_override(raw: &str) -> Result<(String, JsonValue), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("invalid override '{raw}', expected KEY=VALUE"));
    };
    if key.is_empty() {
        return Err(format!("invalid override '{raw}', key is empty"));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok((key.to_string(), value))
}
