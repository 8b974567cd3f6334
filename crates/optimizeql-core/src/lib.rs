//! optimizeql core - shared abstractions for the query analysis pipeline
//!
//! This crate defines the pieces every other optimizeql crate depends on:
//!
//! - `Connector` - read-only, transaction-sandboxed access to a live database
//! - `LlmProvider` - uniform `generate(system, user, max_tokens)` over model backends
//! - The introspection data model (`TableSchema`, `ExplainResult`, ...)
//! - The suggestion taxonomy (`AnalysisResult`, `CompareResult`, ...)
//! - `Settings` and `ConnectionConfig`

mod connector;
mod driver;
mod error;
mod introspection;
pub mod limit;
mod provider;
mod settings;
mod suggestion;
mod types;

pub use connector::*;
pub use driver::*;
pub use error::*;
pub use introspection::*;
pub use provider::*;
pub use settings::*;
pub use suggestion::*;
pub use types::*;
