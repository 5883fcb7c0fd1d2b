//! Compilation of a [`ChartDefinition`] into a [`StateChart`].
//!
//! Compilation runs in three passes, each reporting every problem it finds:
//! structural checks over the definition tree, target resolution over the
//! arena, and binding of action and guard names to implementations.

use crate::actions::Implementations;
use crate::builder::error::{ChartError, ReferenceKind, StructuralError, UnresolvedReference};
use crate::core::{
    ActionId, BoundAction, BoundGuard, GuardId, StateChart, StateId, StateKind, StateNode,
    StatePath, Transition,
};
use crate::definition::{ChartDefinition, StateDefinition, TransitionDefinition};
use std::collections::{BTreeMap, BTreeSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<StructuralError>>;

/// Validate a definition and bind it to `implementations`.
pub fn compile(
    definition: ChartDefinition,
    implementations: Implementations,
) -> Result<StateChart, ChartError> {
    collect(validate_structure(&definition))?;

    let (mut chart, sources) = layout(&definition, implementations);
    let transitions = collect(resolve_targets(&chart, &sources))?;
    bind(&mut chart, &sources, transitions)?;

    tracing::debug!(
        chart = %chart.id,
        states = chart.nodes.len(),
        actions = chart.actions.len(),
        guards = chart.guards.len(),
        "Compiled state chart"
    );

    Ok(chart)
}

fn collect<T>(result: Result<T, Vec<StructuralError>>) -> Result<T, ChartError> {
    result.map_err(ChartError::Structural)
}

fn check(violation: Option<StructuralError>) -> Check {
    match violation {
        Some(error) => Validation::fail(error),
        None => Validation::success(()),
    }
}

fn finish(checks: Vec<Check>) -> Result<(), Vec<StructuralError>> {
    match Validation::all_vec(checks).map(|_| ()) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(errors) => Err(errors.iter().cloned().collect()),
    }
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains('.') && !key.starts_with('#')
}

fn validate_structure(definition: &ChartDefinition) -> Result<(), Vec<StructuralError>> {
    let mut checks = vec![check((!valid_key(&definition.id)).then(|| {
        StructuralError::InvalidKey {
            key: definition.id.clone(),
        }
    }))];

    let mut pending = vec![(definition.id.clone(), &definition.root)];
    while let Some((path, state)) = pending.pop() {
        checks.extend(state_checks(&path, state));
        for (key, child) in state.states.iter().rev() {
            pending.push((format!("{path}.{key}"), child));
        }
    }

    finish(checks)
}

fn state_checks(path: &str, state: &StateDefinition) -> Vec<Check> {
    let kind = state.resolved_kind();
    let has_child = |key: &str| state.states.iter().any(|(k, _)| k == key);
    let mut checks = Vec::new();

    match kind {
        StateKind::Compound => {
            checks.push(check(match &state.initial {
                None => Some(StructuralError::MissingInitial {
                    state: path.to_string(),
                }),
                Some(initial) if !state.states.is_empty() && !has_child(initial) => {
                    Some(StructuralError::InitialNotChild {
                        state: path.to_string(),
                        initial: initial.clone(),
                    })
                }
                Some(_) => None,
            }));
        }
        StateKind::Parallel => {
            checks.push(check(state.initial.as_ref().map(|_| {
                StructuralError::ParallelWithInitial {
                    state: path.to_string(),
                }
            })));
        }
        StateKind::Atomic | StateKind::Final => {
            checks.push(check(state.initial.as_ref().map(|_| {
                StructuralError::InitialOnLeaf {
                    state: path.to_string(),
                    kind,
                }
            })));
            checks.push(check((!state.states.is_empty()).then(|| {
                StructuralError::LeafWithChildren {
                    state: path.to_string(),
                    kind,
                }
            })));
        }
    }

    if matches!(kind, StateKind::Compound | StateKind::Parallel) && state.states.is_empty() {
        checks.push(Validation::fail(StructuralError::NoChildren {
            state: path.to_string(),
            kind,
        }));
    }

    if kind == StateKind::Final && !state.on.is_empty() {
        checks.push(Validation::fail(StructuralError::FinalWithTransitions {
            state: path.to_string(),
        }));
    }

    let mut seen = BTreeSet::new();
    for (key, _) in &state.states {
        if !valid_key(key) {
            checks.push(Validation::fail(StructuralError::InvalidKey { key: key.clone() }));
        } else if !seen.insert(key.as_str()) {
            checks.push(Validation::fail(StructuralError::DuplicateKey {
                parent: path.to_string(),
                key: key.clone(),
            }));
        }
    }

    let mut events = BTreeSet::new();
    for (event, transition) in &state.on {
        if kind == StateKind::Parallel && transition.internal {
            checks.push(Validation::fail(StructuralError::InternalFromParallel {
                state: path.to_string(),
                event: event.clone(),
            }));
        }
        if !events.insert(event.as_str()) {
            checks.push(Validation::fail(StructuralError::DuplicateEvent {
                state: path.to_string(),
                event: event.clone(),
            }));
        }
    }

    checks
}

/// Lay the definition out as an arena in document order.
///
/// Returns the chart without transitions or bound actions, plus the
/// definition each node came from, indexed by [`StateId`].
fn layout(
    definition: &ChartDefinition,
    implementations: Implementations,
) -> (StateChart, Vec<&StateDefinition>) {
    let mut nodes: Vec<StateNode> = Vec::new();
    let mut sources: Vec<&StateDefinition> = Vec::new();
    let mut pending: Vec<(Option<StateId>, &str, &StateDefinition)> =
        vec![(None, definition.id.as_str(), &definition.root)];

    while let Some((parent, key, state)) = pending.pop() {
        let id = StateId(nodes.len());
        let path = match parent {
            Some(parent) => nodes[parent.0].path.child(key),
            None => StatePath::root(key),
        };
        if let Some(parent) = parent {
            nodes[parent.0].children.push(id);
        }

        nodes.push(StateNode {
            id,
            key: key.to_string(),
            path,
            kind: state.resolved_kind(),
            parent,
            children: Vec::new(),
            initial: None,
            on: BTreeMap::new(),
            entry: Vec::new(),
            exit: Vec::new(),
        });
        sources.push(state);

        for (child_key, child) in state.states.iter().rev() {
            pending.push((Some(id), child_key.as_str(), child));
        }
    }

    let mut chart = StateChart {
        id: definition.id.clone(),
        nodes,
        initial_context: definition.context.clone(),
        actions: Vec::new(),
        guards: Vec::new(),
        implementations,
    };

    for (index, state) in sources.iter().copied().enumerate() {
        let initial = state
            .initial
            .as_deref()
            .and_then(|key| chart.child(StateId(index), key));
        chart.nodes[index].initial = initial;
    }

    (chart, sources)
}

/// Resolve a target string from the perspective of `source`.
///
/// `#id.a.b` is absolute, `.a.b` names a descendant of the source, and a
/// bare `a.b` is looked up among the source's siblings.
fn resolve_target(chart: &StateChart, source: StateId, target: &str) -> Option<StateId> {
    if target.starts_with('#') {
        return chart.find(target);
    }
    if let Some(descendant) = target.strip_prefix('.') {
        return chart.descend(source, descendant.split('.'));
    }
    let base = chart.node(source).parent.unwrap_or(source);
    chart.descend(base, target.split('.'))
}

type Resolved<'a> = Vec<(StateId, &'a str, &'a TransitionDefinition, Option<StateId>)>;

fn resolve_targets<'a>(
    chart: &StateChart,
    sources: &[&'a StateDefinition],
) -> Result<Resolved<'a>, Vec<StructuralError>> {
    let mut resolved = Vec::new();
    let mut checks = Vec::new();

    for (index, state) in sources.iter().copied().enumerate() {
        let source = StateId(index);
        for (event, transition) in &state.on {
            let target = match &transition.target {
                None => None,
                Some(target) => match resolve_target(chart, source, target) {
                    Some(id) => Some(id),
                    None => {
                        checks.push(Validation::fail(StructuralError::UnknownTarget {
                            state: chart.node(source).path.to_string(),
                            event: event.clone(),
                            target: target.clone(),
                        }));
                        continue;
                    }
                },
            };
            resolved.push((source, event.as_str(), transition, target));
        }
    }

    finish(checks).map(|_| resolved)
}

/// Interns names into dense ids, remembering the first state that used each.
struct Interner<'a> {
    ids: BTreeMap<&'a str, usize>,
    order: Vec<(&'a str, StateId)>,
}

impl<'a> Interner<'a> {
    fn new() -> Self {
        Self {
            ids: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    fn intern(&mut self, name: &'a str, state: StateId) -> usize {
        let next = self.order.len();
        *self.ids.entry(name).or_insert_with(|| {
            self.order.push((name, state));
            next
        })
    }
}

fn bind(
    chart: &mut StateChart,
    sources: &[&StateDefinition],
    transitions: Resolved<'_>,
) -> Result<(), ChartError> {
    let mut actions = Interner::new();
    let mut guards = Interner::new();

    for (index, state) in sources.iter().copied().enumerate() {
        let id = StateId(index);
        chart.nodes[index].entry = state
            .entry
            .iter()
            .map(|name| ActionId(actions.intern(name, id)))
            .collect();
        chart.nodes[index].exit = state
            .exit
            .iter()
            .map(|name| ActionId(actions.intern(name, id)))
            .collect();
    }

    for (source, event, definition, target) in transitions {
        let transition = Transition {
            event: event.to_string(),
            source,
            target,
            actions: definition
                .actions
                .iter()
                .map(|name| ActionId(actions.intern(name, source)))
                .collect(),
            guard: definition
                .guard
                .as_deref()
                .map(|name| GuardId(guards.intern(name, source))),
            internal: definition.internal,
        };
        chart.nodes[source.0].on.insert(event.to_string(), transition);
    }

    let mut unresolved = Vec::new();

    for (name, state) in &actions.order {
        match chart.implementations.action(name) {
            Some(implementation) => chart.actions.push(BoundAction {
                name: name.to_string(),
                implementation: implementation.clone(),
            }),
            None => unresolved.push(UnresolvedReference {
                kind: ReferenceKind::Action,
                name: name.to_string(),
                state: chart.node(*state).path.to_string(),
            }),
        }
    }

    for (name, state) in &guards.order {
        match chart.implementations.guard_named(name) {
            Some(guard) => chart.guards.push(BoundGuard {
                name: name.to_string(),
                guard: guard.clone(),
            }),
            None => unresolved.push(UnresolvedReference {
                kind: ReferenceKind::Guard,
                name: name.to_string(),
                state: chart.node(*state).path.to_string(),
            }),
        }
    }

    if unresolved.is_empty() {
        Ok(())
    } else {
        Err(ChartError::Unresolved(unresolved))
    }
}
