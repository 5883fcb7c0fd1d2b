//! Builder API for chart construction.
//!
//! Fluent builders produce the same [`ChartDefinition`] as the JSON format,
//! and [`compile`] turns a definition into a validated [`StateChart`].
//!
//! [`ChartDefinition`]: crate::definition::ChartDefinition
//! [`StateChart`]: crate::core::StateChart

mod chart;
mod compile;
pub mod error;
mod state;
mod transition;

pub use chart::ChartBuilder;
pub use compile::compile;
pub use error::{ChartError, ReferenceKind, StructuralError, UnresolvedReference};
pub use state::StateBuilder;
pub use transition::TransitionBuilder;
