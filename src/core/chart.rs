//! The compiled, immutable state chart.
//!
//! A chart is an arena of [`StateNode`]s addressed by [`StateId`]. Ids are
//! assigned in document order (a pre-order walk of the definition), so
//! sorting ids ascending yields outermost-first entry order and sorting them
//! descending yields innermost-first exit order.

use crate::actions::{ActionImpl, ActionKind, Implementations};
use crate::builder::ChartError;
use crate::core::guard::Guard;
use crate::definition::ChartDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable index of a node within its chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Interned action name, resolved against the implementation table at build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(pub(crate) usize);

/// Interned guard name, resolved against the implementation table at build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GuardId(pub(crate) usize);

/// The kind of a state node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// A leaf with no children
    Atomic,
    /// Exactly one child active at a time, entered through `initial`
    Compound,
    /// Every child (region) active at once
    Parallel,
    /// A terminal leaf; its region accepts no further events
    Final,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Atomic => "atomic",
            Self::Compound => "compound",
            Self::Parallel => "parallel",
            Self::Final => "final",
        };
        f.write_str(name)
    }
}

/// Keys from the root down to a node, root key first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatePath(Vec<String>);

impl StatePath {
    pub(crate) fn root(key: &str) -> Self {
        Self(vec![key.to_string()])
    }

    pub(crate) fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Dotted path below the root, as accepted by [`StateChart::find`].
    ///
    /// The root itself is the empty string.
    pub fn relative(&self) -> String {
        self.0[1..].join(".")
    }

    /// Absolute `#root.a.b` form.
    pub fn absolute(&self) -> String {
        format!("#{}", self.0.join("."))
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A transition bound to one (node, event) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub(crate) event: String,
    pub(crate) source: StateId,
    pub(crate) target: Option<StateId>,
    pub(crate) actions: Vec<ActionId>,
    pub(crate) guard: Option<GuardId>,
    pub(crate) internal: bool,
}

impl Transition {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn source(&self) -> StateId {
        self.source
    }

    /// `None` for targetless (actions-only) transitions.
    pub fn target(&self) -> Option<StateId> {
        self.target
    }

    pub fn actions(&self) -> &[ActionId] {
        &self.actions
    }

    pub fn guard(&self) -> Option<GuardId> {
        self.guard
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }
}

/// A node of the chart tree.
#[derive(Clone, Debug)]
pub struct StateNode {
    pub(crate) id: StateId,
    pub(crate) key: String,
    pub(crate) path: StatePath,
    pub(crate) kind: StateKind,
    pub(crate) parent: Option<StateId>,
    pub(crate) children: Vec<StateId>,
    pub(crate) initial: Option<StateId>,
    pub(crate) on: BTreeMap<String, Transition>,
    pub(crate) entry: Vec<ActionId>,
    pub(crate) exit: Vec<ActionId>,
}

impl StateNode {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &StatePath {
        &self.path
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    pub fn children(&self) -> &[StateId] {
        &self.children
    }

    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    pub fn transition(&self, event_type: &str) -> Option<&Transition> {
        self.on.get(event_type)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.on.values()
    }

    pub fn entry(&self) -> &[ActionId] {
        &self.entry
    }

    pub fn exit(&self) -> &[ActionId] {
        &self.exit
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, StateKind::Atomic | StateKind::Final)
    }
}

/// An action name bound to its implementation.
#[derive(Clone, Debug)]
pub struct BoundAction {
    pub(crate) name: String,
    pub(crate) implementation: ActionImpl,
}

impl BoundAction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ActionKind {
        self.implementation.kind()
    }
}

/// A guard name bound to its predicate.
#[derive(Clone, Debug)]
pub struct BoundGuard {
    pub(crate) name: String,
    pub(crate) guard: Guard,
}

impl BoundGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, context: &Value, event: &crate::core::Event) -> bool {
        self.guard.check(context, event)
    }
}

/// A validated, immutable state chart.
///
/// Built once from a [`ChartDefinition`] and an [`Implementations`] table;
/// every structural rule and every action/guard reference is checked at
/// construction.
///
/// # Example
///
/// ```rust
/// use statechart::{ChartBuilder, Implementations, StateBuilder};
///
/// let chart = ChartBuilder::new("light")
///     .initial("unlit")
///     .state("unlit", StateBuilder::atomic().on("TURN_ON", "lit"))
///     .state("lit", StateBuilder::atomic().on("TURN_OFF", "unlit"))
///     .build(Implementations::new())
///     .unwrap();
///
/// let lit = chart.find("lit").unwrap();
/// assert_eq!(chart.node(lit).path().to_string(), "light.lit");
/// assert_eq!(chart.find("#light.unlit"), chart.find("unlit"));
/// ```
#[derive(Clone, Debug)]
pub struct StateChart {
    pub(crate) id: String,
    pub(crate) nodes: Vec<StateNode>,
    pub(crate) initial_context: Value,
    pub(crate) actions: Vec<BoundAction>,
    pub(crate) guards: Vec<BoundGuard>,
    pub(crate) implementations: Implementations,
}

impl StateChart {
    /// Validate a definition and bind it to its implementations.
    pub fn new(
        definition: ChartDefinition,
        implementations: Implementations,
    ) -> Result<Self, ChartError> {
        crate::builder::compile(definition, implementations)
    }

    /// The chart id, which is also the root state's key.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root_id(&self) -> StateId {
        StateId(0)
    }

    pub fn root(&self) -> &StateNode {
        self.node(self.root_id())
    }

    /// Look up a node. Ids are only produced by this chart.
    pub fn node(&self, id: StateId) -> &StateNode {
        &self.nodes[id.0]
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &StateNode> {
        self.nodes.iter()
    }

    pub fn initial_context(&self) -> &Value {
        &self.initial_context
    }

    pub fn implementations(&self) -> &Implementations {
        &self.implementations
    }

    pub fn action(&self, id: ActionId) -> &BoundAction {
        &self.actions[id.0]
    }

    pub fn guard(&self, id: GuardId) -> &BoundGuard {
        &self.guards[id.0]
    }

    /// Resolve a path to a node.
    ///
    /// `"a.b"` is relative to the root, `"#<chart id>.a.b"` is absolute, and
    /// the empty string names the root.
    pub fn find(&self, path: &str) -> Option<StateId> {
        if let Some(absolute) = path.strip_prefix('#') {
            let mut segments = absolute.split('.');
            if segments.next()? != self.root().key {
                return None;
            }
            return self.descend(self.root_id(), segments);
        }
        if path.is_empty() {
            return Some(self.root_id());
        }
        self.descend(self.root_id(), path.split('.'))
    }

    /// The child of `parent` with the given key.
    pub fn child(&self, parent: StateId, key: &str) -> Option<StateId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|child| self.node(*child).key == key)
    }

    pub(crate) fn descend<'a>(
        &self,
        from: StateId,
        mut segments: impl Iterator<Item = &'a str>,
    ) -> Option<StateId> {
        segments.try_fold(from, |current, key| self.child(current, key))
    }

    /// Proper ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: StateId) -> impl Iterator<Item = StateId> + '_ {
        std::iter::successors(self.node(id).parent, move |current| {
            self.node(*current).parent
        })
    }

    /// True if `id` is a proper descendant of `ancestor`.
    pub fn is_descendant(&self, id: StateId, ancestor: StateId) -> bool {
        self.ancestors(id).any(|candidate| candidate == ancestor)
    }

    /// Add `id` and its default descent to `into`: the `initial` chain of
    /// compound states and every region of parallel states.
    pub(crate) fn enter_default(&self, id: StateId, into: &mut BTreeSet<StateId>) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            into.insert(current);
            let node = self.node(current);
            match node.kind {
                StateKind::Compound => pending.extend(node.initial),
                StateKind::Parallel => pending.extend(node.children.iter().copied()),
                StateKind::Atomic | StateKind::Final => {}
            }
        }
    }

    /// The configuration a fresh service starts in.
    pub fn initial_configuration(&self) -> crate::core::Configuration {
        let mut active = BTreeSet::new();
        self.enter_default(self.root_id(), &mut active);
        crate::core::Configuration::from_set(active)
    }

    /// Find the handler for `event_type` starting at an active node and
    /// bubbling toward the root. The first node that declares the event wins.
    pub fn find_handler(&self, from: StateId, event_type: &str) -> Option<&Transition> {
        std::iter::once(from)
            .chain(self.ancestors(from))
            .find_map(|id| self.node(id).on.get(event_type))
    }
}
