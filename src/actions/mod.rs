//! Action implementations and dispatch.
//!
//! Charts refer to actions and guards by name. The embedding application
//! supplies an [`Implementations`] table mapping those names to callables;
//! the chart builder resolves every name eagerly so that a missing
//! implementation is a construction error rather than a runtime surprise.
//!
//! Two kinds of action exist:
//!
//! - **Assign** actions are pure functions producing the next context. The
//!   transition engine applies them itself, before any effect runs.
//! - **Effect** actions are impure callables run by the
//!   [`ActionDispatcher`] after the transition has been committed.

mod dispatcher;
mod error;

pub use dispatcher::{ActionDispatcher, ActionScope};
pub use error::{ActionError, ActionFailure};

use crate::core::{Event, Guard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Pure context update: `(context, event) -> context'`.
pub type AssignFn = Arc<dyn Fn(&Value, &Event) -> Value + Send + Sync>;

/// Side-effecting action.
pub type EffectFn =
    Arc<dyn Fn(&mut ActionScope<'_>) -> Result<(), ActionFailure> + Send + Sync>;

/// Whether an action updates context or performs a side effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Assign,
    Effect,
}

/// A callable bound to an action name.
#[derive(Clone)]
pub enum ActionImpl {
    Assign(AssignFn),
    Effect(EffectFn),
}

impl ActionImpl {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Assign(_) => ActionKind::Assign,
            Self::Effect(_) => ActionKind::Effect,
        }
    }
}

impl fmt::Debug for ActionImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionImpl::{:?}", self.kind())
    }
}

/// Resolution table from action and guard names to callables.
///
/// # Example
///
/// ```rust
/// use statechart::Implementations;
/// use statechart::actions::ActionKind;
///
/// let implementations = Implementations::new()
///     .assign_field("updateColor", "color", |_ctx, event| {
///         event.get("color").cloned().unwrap_or_default()
///     })
///     .effect("log", |scope| {
///         println!("entered with {}", scope.context());
///         Ok(())
///     })
///     .guard("isBright", |ctx, _event| ctx["brightness"].as_u64() > Some(50));
///
/// assert_eq!(implementations.action("updateColor").unwrap().kind(), ActionKind::Assign);
/// assert!(implementations.guard_named("isBright").is_some());
/// assert!(implementations.action("missing").is_none());
/// ```
#[derive(Clone, Default)]
pub struct Implementations {
    actions: BTreeMap<String, ActionImpl>,
    guards: BTreeMap<String, Guard>,
}

impl Implementations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an assignment that replaces the whole context.
    pub fn assign<F>(mut self, name: impl Into<String>, update: F) -> Self
    where
        F: Fn(&Value, &Event) -> Value + Send + Sync + 'static,
    {
        self.actions
            .insert(name.into(), ActionImpl::Assign(Arc::new(update)));
        self
    }

    /// Register an assignment that sets one field of an object context.
    ///
    /// A non-object context is replaced by an object holding just that field.
    pub fn assign_field<F>(
        self,
        name: impl Into<String>,
        field: impl Into<String>,
        value: F,
    ) -> Self
    where
        F: Fn(&Value, &Event) -> Value + Send + Sync + 'static,
    {
        let field = field.into();
        self.assign(name, move |context, event| {
            let mut object = match context {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            object.insert(field.clone(), value(context, event));
            Value::Object(object)
        })
    }

    /// Register a side-effecting action.
    pub fn effect<F>(mut self, name: impl Into<String>, effect: F) -> Self
    where
        F: Fn(&mut ActionScope<'_>) -> Result<(), ActionFailure> + Send + Sync + 'static,
    {
        self.actions
            .insert(name.into(), ActionImpl::Effect(Arc::new(effect)));
        self
    }

    /// Register a guard predicate.
    pub fn guard<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Event) -> bool + Send + Sync + 'static,
    {
        self.guards.insert(name.into(), Guard::new(predicate));
        self
    }

    pub fn action(&self, name: &str) -> Option<&ActionImpl> {
        self.actions.get(name)
    }

    pub fn guard_named(&self, name: &str) -> Option<&Guard> {
        self.guards.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn guard_names(&self) -> impl Iterator<Item = &str> {
        self.guards.keys().map(String::as_str)
    }
}

impl fmt::Debug for Implementations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementations")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("guards", &self.guards.keys().collect::<Vec<_>>())
            .finish()
    }
}
