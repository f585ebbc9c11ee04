mod engine;
mod error;
mod types;

pub use engine::{Engine, EngineOptions, Loaded, Session};
pub use error::{CoreError, CoreErrorCode};
pub use types::{
    Capabilities, CapabilityIssue, PatchReport, SaveSummary, SkippedPatch, TownSummary,
};
