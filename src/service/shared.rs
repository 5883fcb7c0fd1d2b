//! Thread-safe service handle.

use crate::core::{Event, StateValue};
use crate::service::{ObserverId, Service, ServiceError, ServiceStatus, Snapshot};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// A clonable handle to one [`Service`], safe to share across threads.
///
/// Every call takes the lock for its whole duration, so events from
/// concurrent callers are processed one at a time and a `send` that loses
/// the race against `stop` is rejected with
/// [`ServiceError::InvalidUsage`].
///
/// An action or observer holding a clone of the handle may call
/// [`send`](Self::send) while the service is busy on the same thread. The
/// event is queued and processed once the current call has finished its own
/// events. Other methods must not be called from inside an action; use
/// [`ActionScope`](crate::ActionScope) there instead.
#[derive(Clone)]
pub struct SharedService {
    inner: Arc<Inner>,
}

struct Inner {
    service: Mutex<Service>,
    owner: Mutex<Option<ThreadId>>,
    mailbox: Mutex<VecDeque<Event>>,
}

/// Marks the current thread as the lock holder until dropped.
struct Ownership<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> Ownership<'a> {
    fn claim(owner: &'a Mutex<Option<ThreadId>>) -> Self {
        *owner.lock() = Some(thread::current().id());
        Self(owner)
    }
}

impl Drop for Ownership<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl SharedService {
    pub fn new(service: Service) -> Self {
        Self {
            inner: Arc::new(Inner {
                service: Mutex::new(service),
                owner: Mutex::new(None),
                mailbox: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        self.exclusive(Service::start)
    }

    /// Send an event. Called re-entrantly from an action or observer, the
    /// event is queued and `Ok(())` is returned at once.
    pub fn send(&self, event: impl Into<Event>) -> Result<(), ServiceError> {
        let event = event.into();
        if self.held_by_current_thread() {
            tracing::debug!(event = %event.event_type, "queueing re-entrant send");
            self.inner.mailbox.lock().push_back(event);
            return Ok(());
        }
        self.exclusive(|service| service.send(event))
    }

    pub fn stop(&self) -> Result<(), ServiceError> {
        self.exclusive(Service::stop)
    }

    pub fn on_transition<F>(&self, observer: F) -> ObserverId
    where
        F: FnMut(&Snapshot<'_>) + Send + 'static,
    {
        self.inner.service.lock().on_transition(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.inner.service.lock().unsubscribe(id)
    }

    pub fn status(&self) -> ServiceStatus {
        self.inner.service.lock().status()
    }

    pub fn context(&self) -> Value {
        self.inner.service.lock().context().clone()
    }

    pub fn state_value(&self) -> Option<StateValue> {
        self.inner.service.lock().state_value()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.inner.service.lock().matches(path)
    }

    /// Run `f` with exclusive access to the service.
    ///
    /// Events sent re-entrantly while `f` runs are processed afterwards; a
    /// failure among them is logged, not returned.
    pub fn with<R>(&self, f: impl FnOnce(&mut Service) -> R) -> R {
        let mut service = self.inner.service.lock();
        let _owner = Ownership::claim(&self.inner.owner);
        let value = f(&mut service);
        if let Err(error) = self.flush(&mut service) {
            tracing::warn!(%error, "re-entrant event failed");
        }
        value
    }

    fn held_by_current_thread(&self) -> bool {
        *self.inner.owner.lock() == Some(thread::current().id())
    }

    fn exclusive<R>(
        &self,
        f: impl FnOnce(&mut Service) -> Result<R, ServiceError>,
    ) -> Result<R, ServiceError> {
        let mut service = self.inner.service.lock();
        let _owner = Ownership::claim(&self.inner.owner);
        match f(&mut service) {
            Ok(value) => self.flush(&mut service).map(|()| value),
            Err(error) => {
                self.discard(service.status());
                Err(error)
            }
        }
    }

    /// Process events queued by re-entrant sends, in arrival order.
    fn flush(&self, service: &mut Service) -> Result<(), ServiceError> {
        loop {
            let next = self.inner.mailbox.lock().pop_front();
            let Some(event) = next else {
                return Ok(());
            };
            if service.status() != ServiceStatus::Running {
                self.discard(service.status());
                return Ok(());
            }
            if let Err(error) = service.send(event) {
                self.discard(service.status());
                return Err(error);
            }
        }
    }

    fn discard(&self, status: ServiceStatus) {
        let mut mailbox = self.inner.mailbox.lock();
        if !mailbox.is_empty() {
            tracing::warn!(
                discarded = mailbox.len(),
                %status,
                "discarding re-entrant events"
            );
            mailbox.clear();
        }
    }
}

impl From<Service> for SharedService {
    fn from(service: Service) -> Self {
        Self::new(service)
    }
}
