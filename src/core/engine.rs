//! The pure transition engine.
//!
//! [`step`] computes the next configuration, the next context and the ordered
//! action batch for one event. It performs no side effects of its own: guards
//! and assignments are pure by contract, and effect actions are only
//! *scheduled* here, to be run afterwards by the
//! [`ActionDispatcher`](crate::actions::ActionDispatcher).

use crate::actions::{ActionImpl, ActionKind};
use crate::core::chart::{ActionId, StateChart, StateId, StateKind, Transition};
use crate::core::configuration::Configuration;
use crate::core::event::Event;
use serde_json::Value;
use std::collections::BTreeSet;

/// Where a scheduled action came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionOrigin {
    /// Exit action of a state being deactivated
    Exit(StateId),
    /// Action bound to the transition taken from `source`
    Transition { source: StateId },
    /// Entry action of a state being activated
    Entry(StateId),
}

/// One action in a step's batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduledAction {
    pub id: ActionId,
    pub name: String,
    pub kind: ActionKind,
    pub origin: ActionOrigin,
}

/// Result of processing one event.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Configuration after the step
    pub configuration: Configuration,
    /// Context after every assignment of the step has been applied
    pub context: Value,
    /// Exit, transition and entry actions in execution order
    pub actions: Vec<ScheduledAction>,
    /// True if at least one transition was taken
    pub changed: bool,
}

impl Step {
    fn unchanged(configuration: &Configuration, context: &Value) -> Self {
        Self {
            configuration: configuration.clone(),
            context: context.clone(),
            actions: Vec::new(),
            changed: false,
        }
    }
}

/// Compute the result of sending `event` to a chart in `configuration`.
///
/// Each active, non-final leaf looks for the nearest node on its path to the
/// root that handles `event`. A failed guard ends the search for that leaf.
/// Every selected transition contributes the batch
/// `[exits innermost-first, transition actions, entries outermost-first]`;
/// when several parallel regions fire, their batches are concatenated in
/// region order. Assignments are folded into the context before the step is
/// returned, so effects only ever observe the post-assignment context.
///
/// # Example
///
/// ```rust
/// use statechart::core::{step, Event};
/// use statechart::{ChartBuilder, Implementations, StateBuilder};
///
/// let chart = ChartBuilder::new("light")
///     .initial("unlit")
///     .state("unlit", StateBuilder::atomic().on("TURN_ON", "lit"))
///     .state("lit", StateBuilder::atomic().on("TURN_OFF", "unlit"))
///     .build(Implementations::new())
///     .unwrap();
///
/// let start = chart.initial_configuration();
/// let next = step(&chart, &start, chart.initial_context(), &Event::new("TURN_ON"));
///
/// assert!(next.changed);
/// assert!(next.configuration.matches(&chart, "lit"));
///
/// let ignored = step(&chart, &next.configuration, &next.context, &Event::new("TURN_ON"));
/// assert!(!ignored.changed);
/// assert_eq!(ignored.configuration, next.configuration);
/// ```
pub fn step(
    chart: &StateChart,
    configuration: &Configuration,
    context: &Value,
    event: &Event,
) -> Step {
    let selected = select_transitions(chart, configuration, context, event);
    if selected.is_empty() {
        tracing::trace!(event = %event.event_type, "no enabled transition");
        return Step::unchanged(configuration, context);
    }

    let mut active = configuration.ids().clone();
    let mut actions = Vec::new();

    for transition in &selected {
        let exits = exit_set(chart, configuration.ids(), transition);
        let entries = entry_set(chart, transition);

        for id in exits.iter().rev() {
            schedule(chart, &mut actions, &chart.node(*id).exit, ActionOrigin::Exit(*id));
            active.remove(id);
        }
        schedule(
            chart,
            &mut actions,
            &transition.actions,
            ActionOrigin::Transition {
                source: transition.source,
            },
        );
        for id in &entries {
            schedule(chart, &mut actions, &chart.node(*id).entry, ActionOrigin::Entry(*id));
        }
        active.extend(entries);
    }

    let context = apply_assignments(chart, context, event, &actions);

    tracing::debug!(
        event = %event.event_type,
        transitions = selected.len(),
        actions = actions.len(),
        "step"
    );

    Step {
        configuration: Configuration::from_set(active),
        context,
        actions,
        changed: true,
    }
}

/// Entry batch for a service starting in the chart's initial configuration.
pub fn initial_step(chart: &StateChart, context: &Value) -> Step {
    let configuration = chart.initial_configuration();
    let mut actions = Vec::new();
    for id in configuration.iter() {
        schedule(chart, &mut actions, &chart.node(id).entry, ActionOrigin::Entry(id));
    }
    let context = apply_assignments(chart, context, &Event::init(), &actions);

    Step {
        configuration,
        context,
        actions,
        changed: true,
    }
}

/// Exit batch for a service stopping in `configuration`, innermost first.
pub fn exit_step(chart: &StateChart, configuration: &Configuration, context: &Value) -> Step {
    let mut actions = Vec::new();
    for id in configuration.ids().iter().rev() {
        schedule(chart, &mut actions, &chart.node(*id).exit, ActionOrigin::Exit(*id));
    }
    let context = apply_assignments(chart, context, &Event::stop(), &actions);

    Step {
        configuration: configuration.clone(),
        context,
        actions,
        changed: true,
    }
}

fn select_transitions<'c>(
    chart: &'c StateChart,
    configuration: &Configuration,
    context: &Value,
    event: &Event,
) -> Vec<&'c Transition> {
    let mut selected: Vec<&Transition> = Vec::new();
    let mut claimed: BTreeSet<StateId> = BTreeSet::new();

    for leaf in configuration.leaves(chart) {
        if chart.node(leaf).kind() == StateKind::Final {
            continue;
        }
        let Some(transition) = chart.find_handler(leaf, &event.event_type) else {
            continue;
        };
        if selected.iter().any(|t| t.source == transition.source) {
            continue;
        }
        if let Some(guard) = transition.guard {
            if !chart.guard(guard).check(context, event) {
                tracing::trace!(
                    event = %event.event_type,
                    source = %chart.node(transition.source).path(),
                    guard = chart.guard(guard).name(),
                    "guard blocked transition"
                );
                continue;
            }
        }

        let exits = exit_set(chart, configuration.ids(), transition);
        if !exits.is_disjoint(&claimed) {
            tracing::warn!(
                event = %event.event_type,
                source = %chart.node(transition.source).path(),
                "dropping transition that conflicts with an earlier region"
            );
            continue;
        }
        claimed.extend(exits);
        selected.push(transition);
    }

    selected
}

/// The node under which states are exited and entered, or `None` for a
/// targetless transition.
fn transition_domain(chart: &StateChart, transition: &Transition) -> Option<StateId> {
    let target = transition.target?;
    let source = transition.source;

    if transition.internal
        && chart.node(source).kind() == StateKind::Compound
        && chart.is_descendant(target, source)
    {
        return Some(source);
    }

    let domain = chart
        .ancestors(source)
        .find(|ancestor| {
            chart.node(*ancestor).kind() == StateKind::Compound
                && chart.is_descendant(target, *ancestor)
        })
        .unwrap_or_else(|| chart.root_id());
    Some(domain)
}

fn exit_set(
    chart: &StateChart,
    active: &BTreeSet<StateId>,
    transition: &Transition,
) -> BTreeSet<StateId> {
    let Some(domain) = transition_domain(chart, transition) else {
        return BTreeSet::new();
    };
    active
        .iter()
        .copied()
        .filter(|id| chart.is_descendant(*id, domain))
        .collect()
}

fn entry_set(chart: &StateChart, transition: &Transition) -> BTreeSet<StateId> {
    let mut entering = BTreeSet::new();
    let (Some(target), Some(domain)) = (transition.target, transition_domain(chart, transition))
    else {
        return entering;
    };

    if target == domain {
        for child in default_children(chart, target) {
            chart.enter_default(child, &mut entering);
        }
        return entering;
    }

    chart.enter_default(target, &mut entering);
    for ancestor in chart.ancestors(target).take_while(|a| *a != domain) {
        entering.insert(ancestor);
        if chart.node(ancestor).kind() == StateKind::Parallel {
            for region in chart.node(ancestor).children() {
                if !entering.contains(region) {
                    chart.enter_default(*region, &mut entering);
                }
            }
        }
    }
    // A parallel root as domain has had every region exited.
    if chart.node(domain).kind() == StateKind::Parallel {
        for region in chart.node(domain).children() {
            if !entering.contains(region) {
                chart.enter_default(*region, &mut entering);
            }
        }
    }
    entering
}

fn default_children(chart: &StateChart, id: StateId) -> Vec<StateId> {
    let node = chart.node(id);
    match node.kind() {
        StateKind::Compound => node.initial().into_iter().collect(),
        StateKind::Parallel => node.children().to_vec(),
        StateKind::Atomic | StateKind::Final => Vec::new(),
    }
}

fn schedule(
    chart: &StateChart,
    batch: &mut Vec<ScheduledAction>,
    ids: &[ActionId],
    origin: ActionOrigin,
) {
    batch.extend(ids.iter().map(|id| {
        let bound = chart.action(*id);
        ScheduledAction {
            id: *id,
            name: bound.name().to_string(),
            kind: bound.kind(),
            origin,
        }
    }));
}

fn apply_assignments(
    chart: &StateChart,
    context: &Value,
    event: &Event,
    actions: &[ScheduledAction],
) -> Value {
    actions
        .iter()
        .filter(|action| action.kind == ActionKind::Assign)
        .fold(context.clone(), |current, action| {
            match &chart.action(action.id).implementation {
                ActionImpl::Assign(assign) => assign(&current, event),
                ActionImpl::Effect(_) => current,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Implementations;
    use crate::builder::{ChartBuilder, StateBuilder, TransitionBuilder};
    use serde_json::json;

    fn names(step: &Step) -> Vec<&str> {
        step.actions.iter().map(|a| a.name.as_str()).collect()
    }

    fn noop_effects(names: &[&str]) -> Implementations {
        names
            .iter()
            .fold(Implementations::new(), |acc, name| acc.effect(*name, |_scope| Ok(())))
    }

    fn nested() -> StateChart {
        ChartBuilder::new("m")
            .initial("a")
            .state(
                "a",
                StateBuilder::compound("a1")
                    .entry("enterA")
                    .exit("exitA")
                    .state(
                        "a1",
                        StateBuilder::atomic()
                            .entry("enterA1")
                            .exit("exitA1")
                            .on(
                                "GO",
                                TransitionBuilder::new().to("#m.b.b2").action("goAction"),
                            )
                            .on("NEXT", "a2")
                            .on("SELF", TransitionBuilder::new().to("a1").action("selfAction")),
                    )
                    .state("a2", StateBuilder::atomic().entry("enterA2").exit("exitA2"))
                    .on("INNER", TransitionBuilder::new().to(".a2").internal())
                    .on("OUTER", ".a2"),
            )
            .state(
                "b",
                StateBuilder::compound("b1")
                    .entry("enterB")
                    .exit("exitB")
                    .state("b1", StateBuilder::atomic().entry("enterB1"))
                    .state("b2", StateBuilder::atomic().entry("enterB2")),
            )
            .build(noop_effects(&[
                "enterA", "exitA", "enterA1", "exitA1", "enterA2", "exitA2", "goAction",
                "selfAction", "enterB", "exitB", "enterB1", "enterB2",
            ]))
            .unwrap()
    }

    #[test]
    fn ordering_law_exit_transition_entry() {
        let chart = nested();
        let start = chart.initial_configuration();

        let next = step(&chart, &start, &json!({}), &Event::new("GO"));

        assert_eq!(names(&next), vec!["exitA1", "exitA", "goAction", "enterB", "enterB2"]);
        assert!(next.configuration.matches(&chart, "b.b2"));
        assert!(!next.configuration.matches(&chart, "b.b1"));
        assert!(next.configuration.is_valid_cut(&chart));
    }

    #[test]
    fn sibling_transition_keeps_parent_active() {
        let chart = nested();
        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("NEXT"));

        assert_eq!(names(&next), vec!["exitA1", "enterA2"]);
        assert!(next.configuration.matches(&chart, "a.a2"));
    }

    #[test]
    fn external_self_transition_exits_and_reenters() {
        let chart = nested();
        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("SELF"));

        assert_eq!(names(&next), vec!["exitA1", "selfAction", "enterA1"]);
        assert_eq!(next.configuration, chart.initial_configuration());
    }

    #[test]
    fn internal_transition_skips_source_exit_and_entry() {
        let chart = nested();
        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("INNER"));

        assert_eq!(names(&next), vec!["exitA1", "enterA2"]);
    }

    #[test]
    fn external_transition_to_child_reenters_source() {
        let chart = nested();
        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("OUTER"));

        assert_eq!(names(&next), vec!["exitA1", "exitA", "enterA", "enterA2"]);
        assert!(next.configuration.matches(&chart, "a.a2"));
    }

    #[test]
    fn unmatched_event_is_a_no_op() {
        let chart = nested();
        let start = chart.initial_configuration();
        let context = json!({ "k": 1 });

        let next = step(&chart, &start, &context, &Event::new("UNKNOWN"));

        assert!(!next.changed);
        assert!(next.actions.is_empty());
        assert_eq!(next.configuration, start);
        assert_eq!(next.context, context);
    }

    #[test]
    fn initial_step_enters_outermost_first() {
        let chart = nested();
        let init = initial_step(&chart, &json!({}));

        assert_eq!(names(&init), vec!["enterA", "enterA1"]);
        assert_eq!(init.configuration, chart.initial_configuration());
    }

    #[test]
    fn exit_step_exits_innermost_first() {
        let chart = nested();
        let exit = exit_step(&chart, &chart.initial_configuration(), &json!({}));

        assert_eq!(names(&exit), vec!["exitA1", "exitA"]);
    }

    #[test]
    fn guard_failure_does_not_fall_back_to_ancestor() {
        let chart = ChartBuilder::new("m")
            .initial("idle")
            .on("GO", "fallback")
            .state(
                "idle",
                StateBuilder::atomic().on("GO", TransitionBuilder::new().to("busy").guard("never")),
            )
            .state("busy", StateBuilder::atomic())
            .state("fallback", StateBuilder::atomic())
            .build(Implementations::new().guard("never", |_c, _e| false))
            .unwrap();
        let start = chart.initial_configuration();

        let next = step(&chart, &start, &json!({}), &Event::new("GO"));

        assert!(!next.changed);
        assert_eq!(next.configuration, start);
    }

    #[test]
    fn guard_sees_pre_step_context_and_event() {
        let chart = ChartBuilder::new("m")
            .initial("idle")
            .state(
                "idle",
                StateBuilder::atomic().on(
                    "GO",
                    TransitionBuilder::new().to("busy").guard("allowed"),
                ),
            )
            .state("busy", StateBuilder::atomic())
            .build(Implementations::new().guard("allowed", |ctx, event| {
                ctx["enabled"] == json!(true) && event.get("force").is_some()
            }))
            .unwrap();
        let start = chart.initial_configuration();

        let blocked = step(&chart, &start, &json!({ "enabled": true }), &Event::new("GO"));
        let allowed = step(
            &chart,
            &start,
            &json!({ "enabled": true }),
            &Event::new("GO").with("force", true),
        );

        assert!(!blocked.changed);
        assert!(allowed.configuration.matches(&chart, "busy"));
    }

    #[test]
    fn assignments_apply_before_effects_in_batch_order() {
        let chart = ChartBuilder::new("m")
            .initial("idle")
            .state(
                "idle",
                StateBuilder::atomic().on(
                    "GO",
                    TransitionBuilder::new()
                        .to("busy")
                        .action("log")
                        .action("double")
                        .action("increment"),
                ),
            )
            .state("busy", StateBuilder::atomic())
            .build(
                Implementations::new()
                    .effect("log", |_scope| Ok(()))
                    .assign_field("double", "n", |ctx, _e| json!(ctx["n"].as_i64().unwrap_or(0) * 2))
                    .assign_field("increment", "n", |ctx, _e| {
                        json!(ctx["n"].as_i64().unwrap_or(0) + 1)
                    }),
            )
            .unwrap();

        let next = step(&chart, &chart.initial_configuration(), &json!({ "n": 3 }), &Event::new("GO"));

        assert_eq!(next.context, json!({ "n": 7 }));
        assert_eq!(names(&next), vec!["log", "double", "increment"]);
        assert_eq!(next.actions[0].kind, ActionKind::Effect);
        assert_eq!(next.actions[1].kind, ActionKind::Assign);
    }

    #[test]
    fn transition_between_parallel_regions_reenters_parallel() {
        let chart = ChartBuilder::new("p")
            .initial("both")
            .state(
                "both",
                StateBuilder::parallel()
                    .entry("enterBoth")
                    .exit("exitBoth")
                    .state(
                        "left",
                        StateBuilder::compound("l1")
                            .state("l1", StateBuilder::atomic().on("CROSS", "#p.both.right.r2"))
                            .state("l2", StateBuilder::atomic()),
                    )
                    .state(
                        "right",
                        StateBuilder::compound("r1")
                            .state("r1", StateBuilder::atomic())
                            .state("r2", StateBuilder::atomic()),
                    ),
            )
            .build(noop_effects(&["enterBoth", "exitBoth"]))
            .unwrap();

        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("CROSS"));

        assert_eq!(names(&next), vec!["exitBoth", "enterBoth"]);
        assert!(next.configuration.matches(&chart, "both.left.l1"));
        assert!(next.configuration.matches(&chart, "both.right.r2"));
        assert!(next.configuration.is_valid_cut(&chart));
    }

    #[test]
    fn transition_across_parallel_root_reenters_every_region() {
        let chart = ChartBuilder::new("p")
            .parallel()
            .state(
                "left",
                StateBuilder::compound("l1")
                    .exit("exitLeft")
                    .entry("enterLeft")
                    .state("l1", StateBuilder::atomic().on("CROSS", "#p.right.r2"))
                    .state("l2", StateBuilder::atomic()),
            )
            .state(
                "right",
                StateBuilder::compound("r1")
                    .state("r1", StateBuilder::atomic())
                    .state("r2", StateBuilder::atomic()),
            )
            .build(noop_effects(&["exitLeft", "enterLeft"]))
            .unwrap();

        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("CROSS"));

        assert_eq!(names(&next), vec!["exitLeft", "enterLeft"]);
        assert_eq!(
            next.configuration.leaf_paths(&chart),
            vec!["left.l1".to_string(), "right.r2".to_string()]
        );
        assert!(next.configuration.is_valid_cut(&chart));
    }

    #[test]
    fn both_regions_fire_in_declaration_order() {
        let chart = ChartBuilder::new("p")
            .initial("both")
            .state(
                "both",
                StateBuilder::parallel()
                    .state(
                        "left",
                        StateBuilder::compound("l1")
                            .state(
                                "l1",
                                StateBuilder::atomic()
                                    .on("TICK", TransitionBuilder::new().to("l2").action("left")),
                            )
                            .state("l2", StateBuilder::atomic()),
                    )
                    .state(
                        "right",
                        StateBuilder::compound("r1")
                            .state(
                                "r1",
                                StateBuilder::atomic()
                                    .on("TICK", TransitionBuilder::new().to("r2").action("right")),
                            )
                            .state("r2", StateBuilder::atomic()),
                    ),
            )
            .build(noop_effects(&["left", "right"]))
            .unwrap();

        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("TICK"));

        assert_eq!(names(&next), vec!["left", "right"]);
        assert_eq!(
            next.configuration.value(&chart).to_json(),
            json!({ "both": { "left": "l2", "right": "r2" } })
        );
    }

    #[test]
    fn shared_ancestor_handler_fires_once() {
        let chart = ChartBuilder::new("p")
            .initial("both")
            .state(
                "both",
                StateBuilder::parallel()
                    .on("PING", TransitionBuilder::new().action("pong"))
                    .state("left", StateBuilder::atomic())
                    .state("right", StateBuilder::atomic()),
            )
            .build(noop_effects(&["pong"]))
            .unwrap();

        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("PING"));

        assert_eq!(names(&next), vec!["pong"]);
        assert!(next.changed);
        assert_eq!(next.configuration, chart.initial_configuration());
    }

    #[test]
    fn conflicting_region_transition_is_dropped() {
        let chart = ChartBuilder::new("p")
            .initial("both")
            .state(
                "both",
                StateBuilder::parallel()
                    .state(
                        "left",
                        StateBuilder::compound("l1")
                            .state("l1", StateBuilder::atomic().on("JUMP", "l2"))
                            .state("l2", StateBuilder::atomic()),
                    )
                    .state(
                        "right",
                        StateBuilder::compound("r1")
                            .state("r1", StateBuilder::atomic().on("JUMP", "#p.away"))
                            .state("r2", StateBuilder::atomic()),
                    ),
            )
            .state("away", StateBuilder::atomic())
            .build(Implementations::new())
            .unwrap();

        let next = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("JUMP"));

        assert!(next.configuration.matches(&chart, "both.left.l2"));
        assert!(next.configuration.matches(&chart, "both.right.r1"));
        assert!(next.configuration.is_valid_cut(&chart));
    }

    #[test]
    fn final_region_ignores_events_while_sibling_stays_live() {
        let chart = ChartBuilder::new("p")
            .initial("both")
            .state(
                "both",
                StateBuilder::parallel()
                    .state(
                        "left",
                        StateBuilder::compound("l1")
                            .state("l1", StateBuilder::atomic().on("FINISH", "done"))
                            .state("done", StateBuilder::final_state()),
                    )
                    .state(
                        "right",
                        StateBuilder::compound("r1")
                            .state("r1", StateBuilder::atomic().on("FINISH", "r2"))
                            .state("r2", StateBuilder::atomic().on("FINISH", "r1")),
                    ),
            )
            .build(Implementations::new())
            .unwrap();

        let first = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("FINISH"));
        assert!(first.configuration.matches(&chart, "both.left.done"));
        assert!(first.configuration.matches(&chart, "both.right.r2"));

        let second = step(&chart, &first.configuration, &json!({}), &Event::new("FINISH"));
        assert!(second.configuration.matches(&chart, "both.left.done"));
        assert!(second.configuration.matches(&chart, "both.right.r1"));
    }

    #[test]
    fn transition_to_root_reenters_initial_descent() {
        let chart = ChartBuilder::new("m")
            .initial("a")
            .state("a", StateBuilder::atomic().on("GO", "b"))
            .state("b", StateBuilder::atomic().on("RESET", "#m"))
            .build(Implementations::new())
            .unwrap();

        let at_b = step(&chart, &chart.initial_configuration(), &json!({}), &Event::new("GO"));
        let reset = step(&chart, &at_b.configuration, &json!({}), &Event::new("RESET"));

        assert_eq!(reset.configuration, chart.initial_configuration());
    }
}
