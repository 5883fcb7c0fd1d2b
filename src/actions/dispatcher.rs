//! Runs the effect actions of a step in their scheduled order.

use crate::actions::error::{ActionError, ActionFailure};
use crate::actions::ActionImpl;
use crate::core::{Event, ScheduledAction, StateChart};
use serde_json::Value;

/// What an effect action can see and do while it runs.
///
/// Events sent through [`ActionScope::send`] are queued by the service and
/// processed only after the current step completes.
pub struct ActionScope<'a> {
    context: &'a Value,
    event: &'a Event,
    action: &'a ScheduledAction,
    outbox: &'a mut Vec<Event>,
}

impl<'a> ActionScope<'a> {
    /// Context after this step's assignments.
    pub fn context(&self) -> &Value {
        self.context
    }

    /// The event that triggered this step.
    pub fn event(&self) -> &Event {
        self.event
    }

    /// The scheduled action being run.
    pub fn action(&self) -> &ScheduledAction {
        self.action
    }

    /// Queue a follow-up event.
    pub fn send(&mut self, event: impl Into<Event>) {
        self.outbox.push(event.into());
    }

    /// Shorthand for building a failure result.
    pub fn fail(&self, message: impl Into<String>) -> Result<(), ActionFailure> {
        Err(ActionFailure::new(message))
    }
}

/// Invokes effect actions through a chart's bound action table.
///
/// Actions are looked up by their interned [`ActionId`](crate::core::ActionId),
/// never by name. Assignments are skipped: the engine has already folded them into the
/// context handed to [`ActionDispatcher::dispatch`]. Dispatch is fail-fast;
/// the first failing action aborts the rest of the batch.
pub struct ActionDispatcher<'a> {
    chart: &'a StateChart,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(chart: &'a StateChart) -> Self {
        Self { chart }
    }

    /// Run `actions` in order, returning the events they queued.
    pub fn dispatch(
        &self,
        actions: &[ScheduledAction],
        context: &Value,
        event: &Event,
    ) -> Result<Vec<Event>, ActionError> {
        let mut outbox = Vec::new();

        for action in actions {
            // Ids scheduled by another chart have no slot here.
            let bound = self.chart.actions.get(action.id.0).ok_or_else(|| {
                ActionError::Unresolved {
                    action: action.name.clone(),
                }
            })?;

            let ActionImpl::Effect(effect) = &bound.implementation else {
                continue;
            };

            tracing::debug!(
                action = %action.name,
                event = %event.event_type,
                "running action"
            );

            let mut scope = ActionScope {
                context,
                event,
                action,
                outbox: &mut outbox,
            };
            effect(&mut scope).map_err(|failure| {
                tracing::debug!(action = %action.name, error = %failure, "action failed");
                ActionError::Failed {
                    action: action.name.clone(),
                    message: failure.message().to_string(),
                }
            })?;
        }

        Ok(outbox)
    }
}
