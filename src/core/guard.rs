//! Guard predicates for controlling transitions.
//!
//! Guards are pure boolean functions over the current context and the
//! triggering event. A transition whose guard fails is treated exactly as if
//! no handler existed for that event in that region.

use crate::core::event::Event;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Pure predicate that decides whether a transition is eligible.
///
/// # Example
///
/// ```rust
/// use statechart::core::{Event, Guard};
/// use serde_json::json;
///
/// let below_limit = Guard::new(|ctx, _event| ctx["count"].as_u64().unwrap_or(0) < 3);
///
/// assert!(below_limit.check(&json!({ "count": 1 }), &Event::new("INC")));
/// assert!(!below_limit.check(&json!({ "count": 3 }), &Event::new("INC")));
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<dyn Fn(&Value, &Event) -> bool + Send + Sync>,
}

impl Guard {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be pure (deterministic, no side effects) and
    /// thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Value, &Event) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the guard against a context and event.
    pub fn check(&self, context: &Value, event: &Event) -> bool {
        (self.predicate)(context, event)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}
