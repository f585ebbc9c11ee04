pub mod assets;
pub mod core_api;
pub mod dialect;
pub mod document;
pub mod mutation;
pub mod patch;
pub mod reconcile;
pub mod resources;
