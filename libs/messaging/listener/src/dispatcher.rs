//! Single-flight dispatch loop for one consumer
//!
//! ```text
//! Idle → Receiving → Processing → Idle → ...
//!   └──────────┴───────────┴──→ Stopping → Stopped
//!                                  (or Failed)
//! ```
//!
//! The loop hands each message to the user handler on a fresh task and waits on a
//! single-slot completion channel before it receives again, so a consumer never has more
//! than one message in flight. A slow handler throttles retrieval instead of building a
//! backlog.

use crate::caller::Caller;
use crate::error::{ListenerError, ListenerResult};
use crate::service::ValidatedService;
use crate::transport::{MessageConsumer, Session};
use codec::decode_envelope;
use futures::future::BoxFuture;
use futures::FutureExt;
use mqlink_config::ListenerConfig;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, trace, warn};
use types::RawMessage;

/// Observable dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatcherState {
    Idle,
    Receiving,
    Processing,
    Stopping,
    Stopped,
    Failed,
}

impl DispatcherState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DispatcherState::Stopped | DispatcherState::Failed)
    }
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Upper bound of one blocking receive
    pub receive_timeout: Duration,
    /// Pause after a receive that returned nothing
    pub polling_interval: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self {
            receive_timeout: config.receive_timeout(),
            polling_interval: config.polling_interval(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&ListenerConfig::default())
    }
}

/// Control side of a [`Dispatcher`], kept by whoever owns the poll task
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    stop: Arc<watch::Sender<bool>>,
    state: watch::Receiver<DispatcherState>,
}

impl DispatcherHandle {
    /// Ask the loop to finish the message in flight and not receive again
    pub fn signal_stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DispatcherState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`; returns the matching state
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&DispatcherState) -> bool,
    ) -> ListenerResult<DispatcherState> {
        let mut state = self.state.clone();
        state
            .wait_for(predicate)
            .await
            .map(|s| *s)
            .map_err(|_| ListenerError::invalid_state("dispatcher dropped before reaching state"))
    }
}

pub struct Dispatcher {
    service: ValidatedService,
    session: Arc<dyn Session>,
    consumer: Arc<dyn MessageConsumer>,
    settings: DispatchSettings,
    state: watch::Sender<DispatcherState>,
    stop: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        service: ValidatedService,
        session: Arc<dyn Session>,
        consumer: Arc<dyn MessageConsumer>,
        settings: DispatchSettings,
    ) -> (Self, DispatcherHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(DispatcherState::Idle);
        let dispatcher = Self {
            service,
            session,
            consumer,
            settings,
            state: state_tx,
            stop: stop_rx,
        };
        let handle = DispatcherHandle {
            stop: Arc::new(stop_tx),
            state: state_rx,
        };
        (dispatcher, handle)
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    /// Poll until stopped; `Err` when the loop ends in [`DispatcherState::Failed`]
    pub async fn run(mut self) -> ListenerResult<()> {
        info!(
            consumer = %self.name(),
            receive_timeout_ms = self.settings.receive_timeout.as_millis() as u64,
            polling_interval_ms = self.settings.polling_interval.as_millis() as u64,
            "Dispatcher started"
        );
        let outcome = self.poll().await;
        match &outcome {
            Ok(()) => {
                self.set_state(DispatcherState::Stopped);
                info!(consumer = %self.name(), "Dispatcher stopped");
            }
            Err(e) => {
                self.set_state(DispatcherState::Failed);
                error!(consumer = %self.name(), error = %e, "Dispatcher terminated");
            }
        }
        outcome
    }

    async fn poll(&mut self) -> ListenerResult<()> {
        loop {
            if *self.stop.borrow() {
                self.set_state(DispatcherState::Stopping);
                return Ok(());
            }

            self.set_state(DispatcherState::Receiving);
            let received = tokio::select! {
                biased;
                _ = self.stop.changed() => None,
                received = self.consumer.receive(self.settings.receive_timeout) => Some(received),
            };
            let Some(received) = received else {
                self.set_state(DispatcherState::Stopping);
                return Ok(());
            };

            match received {
                Ok(Some(message)) => {
                    self.set_state(DispatcherState::Processing);
                    self.process(message).await?;
                    self.set_state(DispatcherState::Idle);
                }
                Ok(None) => {
                    self.set_state(DispatcherState::Idle);
                    if self.pause().await {
                        self.set_state(DispatcherState::Stopping);
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!(consumer = %self.name(), error = %e, "Receive failed");
                    self.set_state(DispatcherState::Processing);
                    self.route_error(e).await?;
                    self.set_state(DispatcherState::Idle);
                    if self.pause().await {
                        self.set_state(DispatcherState::Stopping);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Sleep for the polling interval; true when a stop arrived meanwhile
    async fn pause(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.stop.changed() => true,
            _ = tokio::time::sleep(self.settings.polling_interval) => false,
        }
    }

    async fn process(&self, mut message: RawMessage) -> ListenerResult<()> {
        let envelope = match decode_envelope(&mut message) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(consumer = %self.name(), error = %e, "Failed to decode message");
                return self
                    .route_error(ListenerError::handler_failed(anyhow::Error::new(e)))
                    .await;
            }
        };
        debug!(
            consumer = %self.name(),
            payload_bytes = envelope.payload.len(),
            headers = envelope.header_count(),
            "Dispatching message"
        );

        let caller = self
            .service
            .wants_caller()
            .then(|| Caller::new(self.service.shared_name(), Arc::clone(&self.session)));
        let handler = self.service.message_handler();

        match run_to_completion(handler(envelope, caller)).await {
            Ok(()) => {
                trace!(consumer = %self.name(), "Message handled");
                Ok(())
            }
            Err(cause) => {
                warn!(consumer = %self.name(), error = %cause, "Message handler failed");
                self.route_error(ListenerError::handler_failed(cause)).await
            }
        }
    }

    /// Give the error handler one chance; a failure inside it ends the loop
    async fn route_error(&self, error: ListenerError) -> ListenerResult<()> {
        let Some(on_error) = self.service.error_handler() else {
            return Err(error);
        };
        debug!(consumer = %self.name(), error = %error, "Routing failure to error handler");
        run_to_completion(on_error(error))
            .await
            .map_err(ListenerError::error_handler_failed)
    }

    fn set_state(&self, state: DispatcherState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            trace!(consumer = %self.name(), from = %previous, to = %state, "Dispatcher state");
        }
    }
}

/// Run one handler invocation on its own task and wait for its outcome
async fn run_to_completion(
    invocation: BoxFuture<'static, anyhow::Result<()>>,
) -> anyhow::Result<()> {
    let (done, completion) = oneshot::channel();
    tokio::spawn(async move {
        let outcome = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!(panic_message(panic.as_ref()))),
        };
        let _ = done.send(outcome);
    });
    match completion.await {
        Ok(outcome) => outcome,
        Err(_) => Err(anyhow::anyhow!("handler task ended without reporting an outcome")),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
