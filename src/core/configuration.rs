//! Runtime position of a chart: the set of active states.

use crate::core::chart::{StateChart, StateId, StateKind};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// The set of currently active state nodes.
///
/// A configuration produced by the engine is always a legal cut of its chart:
/// the root is active, every active node's parent is active, an active
/// compound node has exactly one active child and an active parallel node has
/// all of its children active. [`Configuration::is_valid_cut`] checks this.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Configuration {
    active: BTreeSet<StateId>,
}

impl Configuration {
    pub(crate) fn from_set(active: BTreeSet<StateId>) -> Self {
        Self { active }
    }

    pub(crate) fn ids(&self) -> &BTreeSet<StateId> {
        &self.active
    }

    /// Rebuild a configuration from leaf paths (as produced by
    /// [`Configuration::leaf_paths`]), activating every ancestor.
    ///
    /// Returns `None` if any path is unknown. The result is not guaranteed to
    /// be a legal cut; check with [`Configuration::is_valid_cut`].
    pub fn from_leaf_paths<S: AsRef<str>>(chart: &StateChart, paths: &[S]) -> Option<Self> {
        let mut active = BTreeSet::new();
        for path in paths {
            let id = chart.find(path.as_ref())?;
            active.insert(id);
            active.extend(chart.ancestors(id));
        }
        Some(Self { active })
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.active.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.active.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active atomic and final nodes, in document order.
    pub fn leaves<'a>(&'a self, chart: &'a StateChart) -> impl Iterator<Item = StateId> + 'a {
        self.iter().filter(move |id| chart.node(*id).is_leaf())
    }

    /// Relative paths of the active leaves, in document order.
    pub fn leaf_paths(&self, chart: &StateChart) -> Vec<String> {
        self.leaves(chart)
            .map(|id| chart.node(id).path().relative())
            .collect()
    }

    /// True if the state at `path` is active.
    ///
    /// ```rust
    /// use statechart::{ChartBuilder, Implementations, StateBuilder};
    ///
    /// let chart = ChartBuilder::new("door")
    ///     .initial("closed")
    ///     .state("closed", StateBuilder::compound("locked")
    ///         .state("locked", StateBuilder::atomic())
    ///         .state("unlocked", StateBuilder::atomic()))
    ///     .state("open", StateBuilder::atomic())
    ///     .build(Implementations::new())
    ///     .unwrap();
    ///
    /// let config = chart.initial_configuration();
    /// assert!(config.matches(&chart, "closed"));
    /// assert!(config.matches(&chart, "closed.locked"));
    /// assert!(!config.matches(&chart, "open"));
    /// ```
    pub fn matches(&self, chart: &StateChart, path: &str) -> bool {
        chart.find(path).is_some_and(|id| self.contains(id))
    }

    /// Check the legal-cut invariant against `chart`.
    pub fn is_valid_cut(&self, chart: &StateChart) -> bool {
        if !self.contains(chart.root_id()) {
            return false;
        }
        self.iter().all(|id| {
            let node = chart.node(id);
            let parent_active = node.parent().is_none_or(|parent| self.contains(parent));
            let children_ok = match node.kind() {
                StateKind::Compound => {
                    node.children().iter().filter(|c| self.contains(**c)).count() == 1
                }
                StateKind::Parallel => node.children().iter().all(|c| self.contains(*c)),
                StateKind::Atomic | StateKind::Final => true,
            };
            parent_active && children_ok
        })
    }

    /// Event types handled by some active, non-final node, sorted.
    pub fn next_events(&self, chart: &StateChart) -> Vec<String> {
        let mut events = BTreeSet::new();
        for leaf in self.leaves(chart) {
            if chart.node(leaf).kind() == StateKind::Final {
                continue;
            }
            for id in std::iter::once(leaf).chain(chart.ancestors(leaf)) {
                events.extend(chart.node(id).transitions().map(|t| t.event().to_string()));
            }
        }
        events.into_iter().collect()
    }

    /// True once a final child of the root is active.
    pub fn is_done(&self, chart: &StateChart) -> bool {
        chart
            .root()
            .children()
            .iter()
            .any(|id| self.contains(*id) && chart.node(*id).kind() == StateKind::Final)
    }

    /// The nested state value, e.g. `{"lit": {"pattern": "steady"}}`.
    pub fn value(&self, chart: &StateChart) -> StateValue {
        self.value_of(chart, chart.root_id())
    }

    fn value_of(&self, chart: &StateChart, id: StateId) -> StateValue {
        let node = chart.node(id);
        match node.kind() {
            StateKind::Compound => {
                let active = node.children().iter().copied().find(|c| self.contains(*c));
                match active {
                    Some(child) if chart.node(child).is_leaf() => {
                        StateValue::Leaf(chart.node(child).key().to_string())
                    }
                    Some(child) => StateValue::Branch(vec![(
                        chart.node(child).key().to_string(),
                        self.value_of(chart, child),
                    )]),
                    None => StateValue::Branch(Vec::new()),
                }
            }
            StateKind::Parallel => StateValue::Branch(
                node.children()
                    .iter()
                    .map(|child| {
                        (
                            chart.node(*child).key().to_string(),
                            self.value_of(chart, *child),
                        )
                    })
                    .collect(),
            ),
            StateKind::Atomic | StateKind::Final => StateValue::Branch(Vec::new()),
        }
    }
}

/// Nested description of a configuration.
///
/// A compound node whose active child is a leaf contributes the child's key;
/// otherwise nodes contribute an object keyed by active child (compound) or
/// by region (parallel).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateValue {
    Leaf(String),
    Branch(Vec<(String, StateValue)>),
}

impl StateValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Leaf(key) => Value::String(key.clone()),
            Self::Branch(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaf(key) => serializer.serialize_str(key),
            Self::Branch(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
