//! The stateful service that drives a chart.

use crate::actions::ActionDispatcher;
use crate::checkpoint::{Checkpoint, MachineMetadata, CHECKPOINT_VERSION};
use crate::core::{
    exit_step, initial_step, step, Configuration, ConfigurationTransition, Event, StateChart,
    StateHistory, StateValue, Step,
};
use crate::service::{ServiceError, ServiceOptions};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of a service. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Handle returned by [`Service::on_transition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

/// What an observer sees after an event has been processed.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    pub chart: &'a StateChart,
    pub configuration: &'a Configuration,
    pub context: &'a Value,
    pub event: &'a Event,
    /// False when the event matched no transition
    pub changed: bool,
}

impl Snapshot<'_> {
    pub fn value(&self) -> StateValue {
        self.configuration.value(self.chart)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.configuration.matches(self.chart, path)
    }
}

type Observer = Box<dyn FnMut(&Snapshot<'_>) + Send>;

/// A running instance of a chart.
///
/// The service owns the current configuration and context, processes events
/// one at a time through [`step`], runs the resulting effect actions and
/// notifies observers. Events sent by actions are queued and processed after
/// the step that sent them.
///
/// # Example
///
/// ```rust
/// use statechart::{ChartBuilder, Implementations, Service, StateBuilder};
///
/// let chart = ChartBuilder::new("light")
///     .initial("unlit")
///     .state("unlit", StateBuilder::atomic().on("TURN_ON", "lit"))
///     .state("lit", StateBuilder::atomic().on("TURN_OFF", "unlit"))
///     .build(Implementations::new())
///     .unwrap();
///
/// let mut service = Service::new(chart);
/// service.start().unwrap();
/// service.send("TURN_ON").unwrap();
///
/// assert!(service.matches("lit"));
/// assert_eq!(service.next_events(), vec!["TURN_OFF"]);
/// ```
pub struct Service {
    id: Uuid,
    chart: Arc<StateChart>,
    options: ServiceOptions,
    status: ServiceStatus,
    configuration: Option<Configuration>,
    context: Value,
    queue: VecDeque<Event>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
    history: StateHistory,
    metadata: MachineMetadata,
}

impl Service {
    pub fn new(chart: impl Into<Arc<StateChart>>) -> Self {
        Self::with_options(chart, ServiceOptions::default())
    }

    pub fn with_options(chart: impl Into<Arc<StateChart>>, options: ServiceOptions) -> Self {
        let chart = chart.into();
        let context = chart.initial_context().clone();
        Self {
            id: Uuid::new_v4(),
            chart,
            options,
            status: ServiceStatus::Idle,
            configuration: None,
            context,
            queue: VecDeque::new(),
            observers: Vec::new(),
            next_observer: 0,
            history: StateHistory::new(),
            metadata: MachineMetadata::default(),
        }
    }

    /// Replace the chart's initial context before starting.
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Resume a service from a checkpoint taken from the same chart.
    ///
    /// The restored service is running; entry actions are not re-run.
    pub fn restore(
        chart: impl Into<Arc<StateChart>>,
        checkpoint: &Checkpoint,
    ) -> Result<Self, ServiceError> {
        let chart = chart.into();
        let configuration = checkpoint.configuration_for(&chart)?;

        tracing::info!(
            service = %checkpoint.service_id,
            chart = %chart.id(),
            checkpoint = %checkpoint.id,
            "service restored"
        );

        Ok(Self {
            id: checkpoint.service_id,
            chart,
            options: ServiceOptions::default(),
            status: ServiceStatus::Running,
            configuration: Some(configuration),
            context: checkpoint.context.clone(),
            queue: VecDeque::new(),
            observers: Vec::new(),
            next_observer: 0,
            history: checkpoint.history.clone(),
            metadata: checkpoint.metadata.clone(),
        })
    }

    /// Enter the initial configuration and run its entry actions.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        self.require(ServiceStatus::Idle, "start")?;

        let event = Event::init();
        let step = initial_step(&self.chart, &self.context);
        self.status = ServiceStatus::Running;

        tracing::info!(service = %self.id, chart = %self.chart.id(), "service started");

        self.commit(step, event)?;
        self.drain()
    }

    /// Process an event, then every event queued by its actions.
    pub fn send(&mut self, event: impl Into<Event>) -> Result<(), ServiceError> {
        self.require(ServiceStatus::Running, "send")?;
        self.queue.push_back(event.into());
        self.drain()
    }

    /// Run the exit actions of every active state and stop for good.
    ///
    /// The service is stopped even if an exit action fails.
    pub fn stop(&mut self) -> Result<(), ServiceError> {
        self.require(ServiceStatus::Running, "stop")?;

        self.status = ServiceStatus::Stopped;
        self.discard_queue();

        let Some(configuration) = self.configuration.take() else {
            return Ok(());
        };
        let step = exit_step(&self.chart, &configuration, &self.context);
        self.context = step.context;

        tracing::info!(service = %self.id, chart = %self.chart.id(), "service stopped");

        ActionDispatcher::new(&self.chart)
            .dispatch(&step.actions, &self.context, &Event::stop())
            .map(|_| ())
            .map_err(ServiceError::from)
    }

    /// Register an observer, called after every processed event in
    /// subscription order.
    pub fn on_transition<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&Snapshot<'_>) + Send + 'static,
    {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn chart(&self) -> &StateChart {
        &self.chart
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// The active configuration; `None` unless running.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    pub fn state_value(&self) -> Option<StateValue> {
        self.configuration
            .as_ref()
            .map(|configuration| configuration.value(&self.chart))
    }

    pub fn matches(&self, path: &str) -> bool {
        self.configuration
            .as_ref()
            .is_some_and(|configuration| configuration.matches(&self.chart, path))
    }

    /// True if sending `event` now would take a transition.
    ///
    /// Guards are evaluated against the current context; nothing runs.
    pub fn can(&self, event: impl Into<Event>) -> bool {
        let event = event.into();
        self.configuration
            .as_ref()
            .is_some_and(|configuration| {
                step(&self.chart, configuration, &self.context, &event).changed
            })
    }

    pub fn next_events(&self) -> Vec<String> {
        self.configuration
            .as_ref()
            .map(|configuration| configuration.next_events(&self.chart))
            .unwrap_or_default()
    }

    /// True once a top-level final state is active.
    pub fn is_done(&self) -> bool {
        self.configuration
            .as_ref()
            .is_some_and(|configuration| configuration.is_done(&self.chart))
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    pub fn metadata(&self) -> &MachineMetadata {
        &self.metadata
    }

    /// Capture the running service for later [`Service::restore`].
    pub fn checkpoint(&self) -> Result<Checkpoint, ServiceError> {
        let configuration = match (&self.configuration, self.status) {
            (Some(configuration), ServiceStatus::Running) => configuration,
            _ => {
                return Err(ServiceError::InvalidUsage {
                    operation: "checkpoint",
                    status: self.status,
                })
            }
        };

        Ok(Checkpoint {
            version: CHECKPOINT_VERSION,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            service_id: self.id,
            chart_id: self.chart.id().to_string(),
            configuration: configuration.leaf_paths(&self.chart),
            context: self.context.clone(),
            history: self.history.clone(),
            metadata: self.metadata.clone(),
        })
    }

    fn require(&self, status: ServiceStatus, operation: &'static str) -> Result<(), ServiceError> {
        if self.status != status {
            return Err(ServiceError::InvalidUsage {
                operation,
                status: self.status,
            });
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), ServiceError> {
        while let Some(event) = self.queue.pop_front() {
            self.process(event)?;
        }
        Ok(())
    }

    fn process(&mut self, event: Event) -> Result<(), ServiceError> {
        let Some(configuration) = self.configuration.as_ref() else {
            return Err(ServiceError::InvalidUsage {
                operation: "send",
                status: self.status,
            });
        };

        let step = step(&self.chart, configuration, &self.context, &event);
        self.metadata.record(event.event_type(), step.changed);

        if step.changed && self.options.record_history {
            let transition = ConfigurationTransition {
                from: configuration.leaf_paths(&self.chart),
                to: step.configuration.leaf_paths(&self.chart),
                event: event.event_type().to_string(),
                timestamp: Utc::now(),
            };
            let history = self.history.record(transition);
            self.history = match self.options.history_limit {
                Some(limit) => history.retain_last(limit),
                None => history,
            };
        }

        tracing::debug!(
            service = %self.id,
            event = %event.event_type(),
            changed = step.changed,
            "processed event"
        );

        self.commit(step, event)
    }

    /// Adopt a step's configuration and context, run its effects, queue what
    /// they sent and notify observers.
    fn commit(&mut self, step: Step, event: Event) -> Result<(), ServiceError> {
        self.configuration = Some(step.configuration);
        self.context = step.context;

        let dispatched = ActionDispatcher::new(&self.chart).dispatch(
            &step.actions,
            &self.context,
            &event,
        );
        let sent = match dispatched {
            Ok(sent) => sent,
            Err(error) => {
                tracing::warn!(service = %self.id, error = %error, "action failed");
                self.discard_queue();
                return Err(error.into());
            }
        };
        self.queue.extend(sent);

        if let Some(configuration) = &self.configuration {
            let snapshot = Snapshot {
                chart: &self.chart,
                configuration,
                context: &self.context,
                event: &event,
                changed: step.changed,
            };
            for (_, observer) in &mut self.observers {
                observer(&snapshot);
            }
        }

        Ok(())
    }

    fn discard_queue(&mut self) {
        if !self.queue.is_empty() {
            tracing::warn!(
                service = %self.id,
                discarded = self.queue.len(),
                "discarding queued events"
            );
            self.queue.clear();
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("chart", &self.chart.id())
            .field("status", &self.status)
            .field("configuration", &self.configuration)
            .field("context", &self.context)
            .field("queued", &self.queue.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionError, Implementations};
    use crate::builder::{ChartBuilder, StateBuilder, TransitionBuilder};
    use serde_json::json;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, names: &[&str]) -> Implementations {
        names.iter().fold(Implementations::new(), |implementations, name| {
            let log = Arc::clone(log);
            let entry = name.to_string();
            implementations.effect(*name, move |_scope| {
                log.lock().unwrap().push(entry.clone());
                Ok(())
            })
        })
    }

    fn light(implementations: Implementations) -> StateChart {
        ChartBuilder::new("light")
            .initial("unlit")
            .entry("enterLight")
            .exit("exitLight")
            .state(
                "unlit",
                StateBuilder::atomic()
                    .entry("enterUnlit")
                    .exit("exitUnlit")
                    .on("TURN_ON", "lit"),
            )
            .state(
                "lit",
                StateBuilder::atomic()
                    .entry("enterLit")
                    .on("TURN_OFF", "unlit")
                    .on("BREAK", "broken"),
            )
            .state("broken", StateBuilder::final_state())
            .build(implementations)
            .unwrap()
    }

    const LIGHT_ACTIONS: &[&str] = &[
        "enterLight",
        "exitLight",
        "enterUnlit",
        "exitUnlit",
        "enterLit",
    ];

    #[test]
    fn start_runs_entry_actions_outermost_first() {
        let log = Log::default();
        let mut service = Service::new(light(recorder(&log, LIGHT_ACTIONS)));

        assert_eq!(service.status(), ServiceStatus::Idle);
        assert!(service.configuration().is_none());

        service.start().unwrap();

        assert_eq!(service.status(), ServiceStatus::Running);
        assert!(service.matches("unlit"));
        assert_eq!(*log.lock().unwrap(), vec!["enterLight", "enterUnlit"]);
    }

    #[test]
    fn lifecycle_misuse_is_rejected() {
        let mut service = Service::new(light(recorder(&Log::default(), LIGHT_ACTIONS)));

        assert_eq!(
            service.send("TURN_ON"),
            Err(ServiceError::InvalidUsage {
                operation: "send",
                status: ServiceStatus::Idle,
            })
        );
        assert!(matches!(service.stop(), Err(ServiceError::InvalidUsage { .. })));

        service.start().unwrap();
        assert!(matches!(service.start(), Err(ServiceError::InvalidUsage { .. })));

        service.stop().unwrap();
        for result in [service.start(), service.send("TURN_ON"), service.stop()] {
            assert!(matches!(
                result,
                Err(ServiceError::InvalidUsage {
                    status: ServiceStatus::Stopped,
                    ..
                })
            ));
        }
    }

    #[test]
    fn stop_runs_exit_actions_innermost_first() {
        let log = Log::default();
        let mut service = Service::new(light(recorder(&log, LIGHT_ACTIONS)));
        service.start().unwrap();
        log.lock().unwrap().clear();

        service.stop().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["exitUnlit", "exitLight"]);
        assert_eq!(service.status(), ServiceStatus::Stopped);
        assert!(service.configuration().is_none());
        assert!(service.state_value().is_none());
    }

    #[test]
    fn observers_see_every_processed_event() {
        let mut service = Service::new(light(recorder(&Log::default(), LIGHT_ACTIONS)));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        service.on_transition(move |snapshot| {
            sink.lock().unwrap().push((
                snapshot.event.event_type().to_string(),
                snapshot.changed,
                snapshot.configuration.leaf_paths(snapshot.chart).join(","),
            ));
        });

        service.start().unwrap();
        service.send("TURN_ON").unwrap();
        service.send("TURN_ON").unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("statechart.init".to_string(), true, "unlit".to_string()),
                ("TURN_ON".to_string(), true, "lit".to_string()),
                ("TURN_ON".to_string(), false, "lit".to_string()),
            ]
        );
    }

    #[test]
    fn unsubscribed_observers_stop_receiving() {
        let mut service = Service::new(light(recorder(&Log::default(), LIGHT_ACTIONS)));
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let id = service.on_transition(move |_| *sink.lock().unwrap() += 1);

        service.start().unwrap();
        assert!(service.unsubscribe(id));
        assert!(!service.unsubscribe(id));
        service.send("TURN_ON").unwrap();

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn sent_events_are_processed_after_current_step() {
        let order = Log::default();
        let sink = Arc::clone(&order);
        let implementations = recorder(
            &order,
            &["enterUnlit", "exitUnlit", "enterLight", "exitLight"],
        )
        .effect("enterLit", move |scope| {
                sink.lock().unwrap().push("enterLit".to_string());
                scope.send("BREAK");
                Ok(())
            });
        let mut service = Service::new(light(implementations));
        service.start().unwrap();
        order.lock().unwrap().clear();

        service.send("TURN_ON").unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["exitUnlit", "enterLit"]);
        assert!(service.matches("broken"));
        assert!(service.is_done());
        assert!(service.next_events().is_empty());
    }

    #[test]
    fn action_failure_commits_step_and_drops_queue() {
        let chart = ChartBuilder::new("m")
            .initial("a")
            .state(
                "a",
                StateBuilder::atomic().on(
                    "GO",
                    TransitionBuilder::new().to("b").action("queue").action("explode"),
                ),
            )
            .state("b", StateBuilder::atomic().on("NEXT", "c"))
            .state("c", StateBuilder::atomic())
            .build(
                Implementations::new()
                    .effect("queue", |scope| {
                        scope.send("NEXT");
                        Ok(())
                    })
                    .effect("explode", |scope| scope.fail("boom")),
            )
            .unwrap();

        let observed = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&observed);
        let mut service = Service::new(chart);
        service.on_transition(move |_| *sink.lock().unwrap() += 1);
        service.start().unwrap();

        let result = service.send("GO");

        assert_eq!(
            result,
            Err(ServiceError::Action(ActionError::Failed {
                action: "explode".to_string(),
                message: "boom".to_string(),
            }))
        );
        assert!(service.matches("b"));
        assert_eq!(service.status(), ServiceStatus::Running);
        assert_eq!(*observed.lock().unwrap(), 1);

        service.send("NEXT").unwrap();
        assert!(service.matches("c"));
    }

    #[test]
    fn can_checks_guards_without_side_effects() {
        let chart = ChartBuilder::new("m")
            .context(json!({ "allowed": false }))
            .initial("a")
            .state(
                "a",
                StateBuilder::atomic().on("GO", TransitionBuilder::new().to("b").guard("allowed")),
            )
            .state("b", StateBuilder::atomic())
            .build(
                Implementations::new()
                    .guard("allowed", |ctx, _event| ctx["allowed"] == json!(true)),
            )
            .unwrap();

        let mut service = Service::new(chart);
        assert!(!service.can("GO"));
        service.start().unwrap();
        assert!(!service.can("GO"));
        assert!(!service.can("UNKNOWN"));

        let mut service =
            Service::new(service.chart().clone()).with_context(json!({ "allowed": true }));
        service.start().unwrap();
        assert!(service.can("GO"));
        assert!(service.matches("a"));
    }

    #[test]
    fn history_records_only_changes_and_respects_limit() {
        let options = ServiceOptions {
            record_history: true,
            history_limit: Some(2),
        };
        let mut service =
            Service::with_options(light(recorder(&Log::default(), LIGHT_ACTIONS)), options);
        service.start().unwrap();

        for event in ["TURN_ON", "NOISE", "TURN_OFF", "TURN_ON"] {
            service.send(event).unwrap();
        }

        let events: Vec<&str> = service
            .history()
            .transitions()
            .iter()
            .map(|t| t.event.as_str())
            .collect();
        assert_eq!(events, vec!["TURN_OFF", "TURN_ON"]);
        assert_eq!(service.metadata().events_processed, 4);
        assert_eq!(service.metadata().transitions_by_event.get("TURN_ON"), Some(&2));
    }

    #[test]
    fn checkpoint_requires_running_service() {
        let service = Service::new(light(recorder(&Log::default(), LIGHT_ACTIONS)));

        assert!(matches!(
            service.checkpoint(),
            Err(ServiceError::InvalidUsage {
                operation: "checkpoint",
                ..
            })
        ));
    }

    #[test]
    fn restore_resumes_without_entry_actions() {
        let log = Log::default();
        let chart = Arc::new(light(recorder(&log, LIGHT_ACTIONS)));
        let mut service = Service::new(Arc::clone(&chart));
        service.start().unwrap();
        service.send("TURN_ON").unwrap();
        let checkpoint = service.checkpoint().unwrap();
        log.lock().unwrap().clear();

        let mut restored = Service::restore(Arc::clone(&chart), &checkpoint).unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(restored.id(), service.id());
        assert_eq!(restored.status(), ServiceStatus::Running);
        assert!(restored.matches("lit"));
        assert_eq!(restored.history(), service.history());

        restored.send("TURN_OFF").unwrap();
        assert!(restored.matches("unlit"));
    }
}
