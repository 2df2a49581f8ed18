//! Business logic services module
//!
//! Contains the core engine logic for the survey: read-only definition access,
//! respondent-scoped persistence, the pure evaluators the propagation engine
//! drives, and the public façade external callers use.

pub mod answer_store;
pub mod definition_store;
pub mod dependent_store;
pub mod engine;
pub mod navigation;
pub mod operator;
pub mod propagation;
pub mod respondent_store;
pub mod template;

pub use definition_store::DefinitionSnapshot;
