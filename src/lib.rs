//! Statechart: a hierarchical state chart interpreter
//!
//! Statechart follows the "pure core, imperative shell" philosophy. Charts
//! are validated once into an immutable arena, the transition engine is a
//! pure function from `(configuration, context, event)` to the next step,
//! and a small stateful service runs the scheduled actions and notifies
//! observers.
//!
//! # Core Concepts
//!
//! - **Chart**: nested atomic, compound, parallel and final states, built
//!   from JSON or with the fluent builders
//! - **Configuration**: the set of active states, always a legal cut of the tree
//! - **Implementations**: named assignments, effects and guards bound at build
//! - **Service**: start / send / stop lifecycle with observers and checkpoints
//!
//! # Example
//!
//! ```rust
//! use statechart::{ChartBuilder, Implementations, Service, StateBuilder, TransitionBuilder};
//! use serde_json::json;
//!
//! let implementations = Implementations::new()
//!     .assign_field("updateColor", "color", |_ctx, event| {
//!         event.get("color").cloned().unwrap_or_default()
//!     });
//!
//! let chart = ChartBuilder::new("light")
//!     .context(json!({ "color": "#fff" }))
//!     .initial("unlit")
//!     .state("unlit", StateBuilder::atomic().on("TURN_ON", "lit"))
//!     .state(
//!         "lit",
//!         StateBuilder::atomic()
//!             .on("TURN_OFF", "unlit")
//!             .on("CHANGE_COLOR", TransitionBuilder::new().action("updateColor")),
//!     )
//!     .build(implementations)
//!     .unwrap();
//!
//! let mut service = Service::new(chart);
//! service.start().unwrap();
//! service.send("TURN_ON").unwrap();
//! service
//!     .send(statechart::Event::new("CHANGE_COLOR").with("color", "#f00"))
//!     .unwrap();
//!
//! assert!(service.matches("lit"));
//! assert_eq!(service.context()["color"], "#f00");
//! ```

pub mod actions;
pub mod builder;
pub mod checkpoint;
pub mod core;
pub mod definition;
pub mod service;

// Re-export commonly used types
pub use crate::actions::{ActionDispatcher, ActionError, ActionFailure, ActionScope, Implementations};
pub use crate::builder::{ChartBuilder, ChartError, StateBuilder, TransitionBuilder};
pub use crate::checkpoint::{Checkpoint, CheckpointError};
pub use crate::core::{step, Configuration, Event, Guard, StateChart, StateValue, Step};
pub use crate::definition::ChartDefinition;
pub use crate::service::{Service, ServiceError, ServiceOptions, ServiceStatus, SharedService};
