//! Player resource fields of a multi-town save.
//!
//! Values live in three places: `playerInfo` (cash), the first town
//! (coins, xp, level, stone, wood, food, race, skin) and `privateState`
//! (mana). Only the named keys are touched; everything else in those
//! sections is left as loaded.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core_api::CoreError;
use crate::document::{PLAYER_INFO_KEY, SaveDocument};

pub const PRIVATE_STATE_KEY: &str = "privateState";

pub const SKIN_NAMES: [&str; 7] = [
    "Grassy Meadows",
    "Sunny Desert",
    "Snowy Plains",
    "Ocean",
    "Rocky Mountains",
    "Lush Jungle",
    "Cloudy Heaven",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Section {
    PlayerInfo,
    FirstTown,
    PrivateState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Cash,
    Coins,
    Xp,
    Level,
    Stone,
    Wood,
    Food,
    Mana,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Self::Cash,
        Self::Coins,
        Self::Xp,
        Self::Level,
        Self::Stone,
        Self::Wood,
        Self::Food,
        Self::Mana,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Coins => "coins",
            Self::Xp => "xp",
            Self::Level => "level",
            Self::Stone => "stone",
            Self::Wood => "wood",
            Self::Food => "food",
            Self::Mana => "mana",
        }
    }

    fn section(self) -> Section {
        match self {
            Self::Cash => Section::PlayerInfo,
            Self::Mana => Section::PrivateState,
            _ => Section::FirstTown,
        }
    }

    fn default_value(self) -> i64 {
        match self {
            Self::Level => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Race {
    Humans,
    Trolls,
    Other(String),
}

impl Race {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "h" => Self::Humans,
            "t" => Self::Trolls,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Self::Humans => "h",
            Self::Trolls => "t",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Humans => f.write_str("Humans"),
            Self::Trolls => f.write_str("Trolls"),
            Self::Other(raw) => write!(f, "Unknown ({raw})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResources {
    pub cash: i64,
    pub coins: i64,
    pub xp: i64,
    pub level: i64,
    pub stone: i64,
    pub wood: i64,
    pub food: i64,
    pub mana: i64,
    pub race: Race,
    pub skin: usize,
}

impl PlayerResources {
    pub fn get(&self, resource: Resource) -> i64 {
        match resource {
            Resource::Cash => self.cash,
            Resource::Coins => self.coins,
            Resource::Xp => self.xp,
            Resource::Level => self.level,
            Resource::Stone => self.stone,
            Resource::Wood => self.wood,
            Resource::Food => self.food,
            Resource::Mana => self.mana,
        }
    }

    pub fn skin_name(&self) -> Option<&'static str> {
        SKIN_NAMES.get(self.skin).copied()
    }
}

pub fn read(save: &SaveDocument) -> Result<PlayerResources, CoreError> {
    ensure_sections(save)?;
    let value = |resource: Resource| {
        section(save, resource.section())
            .and_then(|fields| fields.get(resource.key()))
            .and_then(Value::as_i64)
            .unwrap_or_else(|| resource.default_value())
    };
    let town = section(save, Section::FirstTown);

    let race = town
        .and_then(|fields| fields.get("race"))
        .and_then(Value::as_str)
        .map(Race::from_raw)
        .unwrap_or(Race::Humans);
    let skin = town
        .and_then(|fields| fields.get("skin"))
        .and_then(skin_index)
        .unwrap_or(0);

    Ok(PlayerResources {
        cash: value(Resource::Cash),
        coins: value(Resource::Coins),
        xp: value(Resource::Xp),
        level: value(Resource::Level),
        stone: value(Resource::Stone),
        wood: value(Resource::Wood),
        food: value(Resource::Food),
        mana: value(Resource::Mana),
        race,
        skin,
    })
}

pub fn set_resource(
    save: &mut SaveDocument,
    resource: Resource,
    value: i64,
) -> Result<(), CoreError> {
    if value < 0 {
        return Err(
            CoreError::unsupported(format!("{resource} cannot be negative"))
                .with_subject(resource.key()),
        );
    }
    write_field(save, resource.section(), resource.key(), Value::from(value))
}

pub fn set_race(save: &mut SaveDocument, race: Race) -> Result<(), CoreError> {
    if let Race::Other(raw) = &race {
        return Err(
            CoreError::unsupported("race must be humans (h) or trolls (t)")
                .with_subject(raw.clone()),
        );
    }
    write_field(save, Section::FirstTown, "race", Value::from(race.raw()))
}

pub fn set_skin(save: &mut SaveDocument, skin: usize) -> Result<(), CoreError> {
    if skin >= SKIN_NAMES.len() {
        return Err(CoreError::unsupported(format!(
            "skin must be between 0 and {}",
            SKIN_NAMES.len() - 1
        ))
        .with_subject(skin.to_string()));
    }
    write_field(save, Section::FirstTown, "skin", Value::from(skin))
}

fn ensure_sections(save: &SaveDocument) -> Result<(), CoreError> {
    let present = save.dialect().has_towns()
        && section(save, Section::PlayerInfo).is_some()
        && section(save, Section::PrivateState).is_some();
    if present {
        Ok(())
    } else {
        Err(CoreError::unsupported(format!(
            "save has no {PLAYER_INFO_KEY}/{PRIVATE_STATE_KEY}/town sections to hold resources"
        )))
    }
}

fn section(save: &SaveDocument, section: Section) -> Option<&Map<String, Value>> {
    match section {
        Section::PlayerInfo => save.field(PLAYER_INFO_KEY).and_then(Value::as_object),
        Section::PrivateState => save.field(PRIVATE_STATE_KEY).and_then(Value::as_object),
        Section::FirstTown => save.towns().first().map(|town| town.metadata()),
    }
}

fn write_field(
    save: &mut SaveDocument,
    section: Section,
    key: &str,
    value: Value,
) -> Result<(), CoreError> {
    ensure_sections(save)?;
    let fields = match section {
        Section::PlayerInfo => save
            .root_mut()
            .get_mut(PLAYER_INFO_KEY)
            .and_then(Value::as_object_mut),
        Section::PrivateState => save
            .root_mut()
            .get_mut(PRIVATE_STATE_KEY)
            .and_then(Value::as_object_mut),
        Section::FirstTown => Some(save.town_mut(0).metadata_mut()),
    };
    let Some(fields) = fields else {
        return Err(CoreError::unsupported(format!("save section for {key} is missing")));
    };
    fields.insert(key.to_string(), value);
    save.mark_modified();
    Ok(())
}

fn skin_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
