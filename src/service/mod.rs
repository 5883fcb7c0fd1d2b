//! The imperative shell around the pure engine.
//!
//! A [`Service`] owns one configuration and one context, feeds events to
//! [`step`](crate::core::step) and runs the resulting effects through the
//! [`ActionDispatcher`](crate::actions::ActionDispatcher). [`SharedService`]
//! wraps it for use from several threads or tasks.

pub mod error;
mod options;
mod runtime;
mod shared;

pub use error::ServiceError;
pub use options::ServiceOptions;
pub use runtime::{ObserverId, Service, ServiceStatus, Snapshot};
pub use shared::SharedService;
