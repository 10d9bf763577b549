//! In-memory transport for tests
//!
//! Every connection, session and consumer created from one [`MemoryConnection`] appends
//! to a shared [`EventLog`], so tests can assert on teardown order. Handlers can add their
//! own [`TransportEvent::Marker`] entries to the same log.

use crate::endpoint::{Destination, GetMessageOptions, PutMessageOptions};
use crate::error::{ListenerError, ListenerResult};
use crate::transport::{Connection, ExceptionListener, MessageConsumer, Session};
use async_trait::async_trait;
use mqlink_config::{AckMode, ConsumerSource};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use types::constants::{MQMO_MATCH_CORREL_ID, MQMO_MATCH_MSG_ID, MQRC_NO_MSG_AVAILABLE};
use types::RawMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ClientIdSet(String),
    ConnectionStarted,
    ConnectionStopped,
    ConnectionClosed,
    SessionCreated { session: usize, ack_mode: AckMode },
    SessionCommitted(usize),
    SessionRolledBack(usize),
    SessionClosed(usize),
    ConsumerCreated {
        session: usize,
        source: String,
        selector: Option<String>,
    },
    ConsumerClosed { session: usize },
    Marker(String),
}

/// Ordered, shared record of transport activity
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<TransportEvent>>>,
}

impl EventLog {
    pub fn record(&self, event: TransportEvent) {
        self.events.lock().push(event);
    }

    pub fn mark(&self, label: impl Into<String>) {
        self.record(TransportEvent::Marker(label.into()));
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().clone()
    }

    /// Index of the first event matching `predicate`
    pub fn position(&self, predicate: impl Fn(&TransportEvent) -> bool) -> Option<usize> {
        self.events.lock().iter().position(predicate)
    }

    pub fn count(&self, predicate: impl Fn(&TransportEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

enum Delivery {
    Message(RawMessage),
    Fault(ListenerError),
}

/// In-memory queue or topic
///
/// Backs both the pull consumers created by [`MemorySession`] and the [`Destination`] used
/// by [`crate::QueueEndpoint`].
pub struct MemoryDestination {
    name: String,
    deliveries: Mutex<VecDeque<Delivery>>,
    get_faults: Mutex<VecDeque<ListenerError>>,
    arrived: Notify,
}

impl MemoryDestination {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            deliveries: Mutex::new(VecDeque::new()),
            get_faults: Mutex::new(VecDeque::new()),
            arrived: Notify::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&self, message: RawMessage) {
        self.deliveries.lock().push_back(Delivery::Message(message));
        self.arrived.notify_one();
    }

    /// Make a pending receive fail once, in order with queued messages
    pub fn push_fault(&self, error: ListenerError) {
        self.deliveries.lock().push_back(Delivery::Fault(error));
        self.arrived.notify_one();
    }

    /// Make the next [`Destination::get`] fail with `error`
    pub fn fail_next_get(&self, error: ListenerError) {
        self.get_faults.lock().push_back(error);
    }

    pub fn len(&self) -> usize {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| matches!(d, Delivery::Message(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel-safe: a delivery is only removed synchronously, never across an await
    async fn next(&self, timeout: Duration) -> ListenerResult<Option<RawMessage>> {
        let deadline = Instant::now() + timeout;
        loop {
            let arrived = self.arrived.notified();
            let delivery = self.deliveries.lock().pop_front();
            if let Some(delivery) = delivery {
                return match delivery {
                    Delivery::Message(message) => Ok(Some(message)),
                    Delivery::Fault(error) => Err(error),
                };
            }
            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                return Ok(None);
            }
        }
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn put(&self, message: RawMessage, _options: &PutMessageOptions) -> ListenerResult<()> {
        self.push(message);
        Ok(())
    }

    async fn get(
        &self,
        template: RawMessage,
        options: &GetMessageOptions,
    ) -> ListenerResult<RawMessage> {
        if let Some(error) = self.get_faults.lock().pop_front() {
            return Err(error);
        }
        let flags = options.match_flags();
        let wanted = &template.descriptor;
        let mut deliveries = self.deliveries.lock();
        let index = deliveries.iter().position(|delivery| match delivery {
            Delivery::Message(message) => {
                (flags & MQMO_MATCH_MSG_ID == 0
                    || message.descriptor.message_id == wanted.message_id)
                    && (flags & MQMO_MATCH_CORREL_ID == 0
                        || message.descriptor.correlation_id == wanted.correlation_id)
            }
            Delivery::Fault(_) => false,
        });
        match index.and_then(|i| deliveries.remove(i)) {
            Some(Delivery::Message(message)) => Ok(message),
            _ => Err(ListenerError::reason(
                "get",
                MQRC_NO_MSG_AVAILABLE,
                format!("no message available on {}", self.name),
            )),
        }
    }
}

#[derive(Clone, Default)]
struct Broker {
    log: EventLog,
    destinations: Arc<Mutex<HashMap<String, Arc<MemoryDestination>>>>,
}

impl Broker {
    fn destination(&self, name: &str) -> Arc<MemoryDestination> {
        self.destinations
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| MemoryDestination::new(name))
            .clone()
    }
}

/// Connection whose destinations live in process memory
pub struct MemoryConnection {
    broker: Broker,
    client_id: Mutex<Option<String>>,
    exception_listener: Mutex<Option<Arc<dyn ExceptionListener>>>,
    next_session: AtomicUsize,
    fail_sessions: AtomicBool,
}

impl MemoryConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            broker: Broker::default(),
            client_id: Mutex::new(None),
            exception_listener: Mutex::new(None),
            next_session: AtomicUsize::new(1),
            fail_sessions: AtomicBool::new(false),
        })
    }

    pub fn log(&self) -> EventLog {
        self.broker.log.clone()
    }

    /// Queue or topic by name, created on first use
    pub fn destination(&self, name: &str) -> Arc<MemoryDestination> {
        self.broker.destination(name)
    }

    /// Configure session creation to fail
    pub fn fail_session_creation(&self) {
        self.fail_sessions.store(true, Ordering::Relaxed);
    }

    pub fn has_exception_listener(&self) -> bool {
        self.exception_listener.lock().is_some()
    }

    /// Report an asynchronous connection fault to the registered listener
    pub fn raise(&self, error: &ListenerError) {
        if let Some(listener) = self.exception_listener.lock().clone() {
            listener.on_exception(error);
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn client_id(&self) -> Option<String> {
        self.client_id.lock().clone()
    }

    fn set_client_id(&self, client_id: &str) -> ListenerResult<()> {
        *self.client_id.lock() = Some(client_id.to_string());
        self.broker
            .log
            .record(TransportEvent::ClientIdSet(client_id.to_string()));
        Ok(())
    }

    fn set_exception_listener(&self, listener: Arc<dyn ExceptionListener>) {
        *self.exception_listener.lock() = Some(listener);
    }

    async fn create_session(&self, ack_mode: AckMode) -> ListenerResult<Arc<dyn Session>> {
        if self.fail_sessions.load(Ordering::Relaxed) {
            return Err(ListenerError::transport("create_session", "session limit reached"));
        }
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.broker.log.record(TransportEvent::SessionCreated {
            session: id,
            ack_mode,
        });
        Ok(Arc::new(MemorySession {
            id,
            broker: self.broker.clone(),
        }))
    }

    async fn start(&self) -> ListenerResult<()> {
        self.broker.log.record(TransportEvent::ConnectionStarted);
        Ok(())
    }

    async fn stop(&self) -> ListenerResult<()> {
        self.broker.log.record(TransportEvent::ConnectionStopped);
        Ok(())
    }

    async fn close(&self) -> ListenerResult<()> {
        self.broker.log.record(TransportEvent::ConnectionClosed);
        Ok(())
    }
}

pub struct MemorySession {
    id: usize,
    broker: Broker,
}

impl MemorySession {
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn create_consumer(
        &self,
        source: &ConsumerSource,
        selector: Option<&str>,
    ) -> ListenerResult<Arc<dyn MessageConsumer>> {
        self.broker.log.record(TransportEvent::ConsumerCreated {
            session: self.id,
            source: source.to_string(),
            selector: selector.map(str::to_string),
        });
        Ok(Arc::new(MemoryConsumer {
            session: self.id,
            destination: self.broker.destination(source.name()),
            log: self.broker.log.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn commit(&self) -> ListenerResult<()> {
        self.broker.log.record(TransportEvent::SessionCommitted(self.id));
        Ok(())
    }

    async fn rollback(&self) -> ListenerResult<()> {
        self.broker.log.record(TransportEvent::SessionRolledBack(self.id));
        Ok(())
    }

    async fn close(&self) -> ListenerResult<()> {
        self.broker.log.record(TransportEvent::SessionClosed(self.id));
        Ok(())
    }
}

pub struct MemoryConsumer {
    session: usize,
    destination: Arc<MemoryDestination>,
    log: EventLog,
    closed: AtomicBool,
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    async fn receive(&self, timeout: Duration) -> ListenerResult<Option<RawMessage>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ListenerError::transport("receive", "consumer is closed"));
        }
        self.destination.next(timeout).await
    }

    async fn close(&self) -> ListenerResult<()> {
        self.closed.store(true, Ordering::Release);
        self.log.record(TransportEvent::ConsumerClosed {
            session: self.session,
        });
        Ok(())
    }
}
