//! Receiver lifecycle: attach, start, detach, graceful and immediate stop
//!
//! One [`Listener`] owns one shared connection and a poll task per attached consumer.
//! Each consumer has its own session; nothing else is shared between them.

use crate::dispatcher::{DispatchSettings, Dispatcher, DispatcherHandle, DispatcherState};
use crate::error::{ListenerError, ListenerResult};
use crate::service::Service;
use crate::transport::{Connection, LoggingExceptionListener, MessageConsumer, Session};
use mqlink_config::{ConsumerConfig, ListenerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Created,
    Running,
    Stopped,
}

struct AttachedConsumer {
    name: String,
    session: Arc<dyn Session>,
    consumer: Arc<dyn MessageConsumer>,
    handle: DispatcherHandle,
    pending: Option<Dispatcher>,
    task: Option<JoinHandle<ListenerResult<()>>>,
}

impl AttachedConsumer {
    fn spawn(&mut self) {
        if let Some(dispatcher) = self.pending.take() {
            debug!(consumer = %self.name, "Spawning poll task");
            self.task = Some(tokio::spawn(dispatcher.run()));
        }
    }

    /// Wait for the poll task to finish, aborting it once `deadline` passes
    async fn join(&mut self, deadline: Instant, timeout: Duration) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(Ok(()))) => debug!(consumer = %self.name, "Poll task finished"),
            Ok(Ok(Err(e))) => {
                warn!(consumer = %self.name, error = %e, "Poll task had already failed")
            }
            Ok(Err(e)) => warn!(consumer = %self.name, error = %e, "Poll task panicked"),
            Err(_) => {
                let err = ListenerError::ShutdownTimeout {
                    consumer: self.name.clone(),
                    timeout,
                };
                warn!(consumer = %self.name, error = %err, "Aborting poll task");
                task.abort();
                let _ = task.await;
            }
        }
    }

    /// Cancel the poll task without waiting for the message in flight
    async fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            match task.await {
                Err(e) if e.is_cancelled() => {
                    debug!(consumer = %self.name, "Poll task cancelled")
                }
                Err(e) => warn!(consumer = %self.name, error = %e, "Poll task panicked"),
                Ok(_) => debug!(consumer = %self.name, "Poll task finished before abort"),
            }
        }
    }

    /// Close the consumer, then its session; both are attempted
    async fn close(&self) -> ListenerResult<()> {
        let consumer = self.consumer.close().await;
        if let Err(e) = &consumer {
            warn!(consumer = %self.name, error = %e, "Failed to close consumer");
        }
        let session = self.session.close().await;
        if let Err(e) = &session {
            warn!(consumer = %self.name, error = %e, "Failed to close session");
        }
        consumer.and(session)
    }
}

/// Owner of one connection and the dispatchers attached to it
pub struct Listener {
    connection: Arc<dyn Connection>,
    config: ListenerConfig,
    client_id: String,
    status: parking_lot::Mutex<ListenerStatus>,
    consumers: Mutex<Vec<AttachedConsumer>>,
}

impl Listener {
    /// Assign the client id and register the logging exception listener
    pub fn new(connection: Arc<dyn Connection>, config: ListenerConfig) -> ListenerResult<Self> {
        config.validate()?;
        let client_id = config
            .client_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        connection.set_client_id(&client_id)?;
        connection.set_exception_listener(Arc::new(LoggingExceptionListener::new(
            client_id.clone(),
        )));
        info!(client_id = %client_id, "Listener created");

        Ok(Self {
            connection,
            config,
            client_id,
            status: parking_lot::Mutex::new(ListenerStatus::Created),
            consumers: Mutex::new(Vec::new()),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn status(&self) -> ListenerStatus {
        *self.status.lock()
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Validate `service`, create its session and consumer, and queue its dispatcher
    ///
    /// The dispatcher starts polling at [`Listener::start`], or immediately when the
    /// listener is already running. Shape and configuration errors are reported before
    /// any transport resource is created.
    pub async fn attach(&self, service: Service, config: &ConsumerConfig) -> ListenerResult<()> {
        let service = service.validate()?;
        let source = config.validate()?;

        let mut consumers = self.consumers.lock().await;
        let status = self.status();
        if status == ListenerStatus::Stopped {
            return Err(ListenerError::invalid_state("listener is stopped"));
        }
        if consumers.iter().any(|c| c.name == service.name()) {
            return Err(ListenerError::invalid_service(format!(
                "a service named {:?} is already attached",
                service.name()
            )));
        }

        let session = self.connection.create_session(config.ack_mode).await?;
        let consumer = match session
            .create_consumer(&source, config.message_selector.as_deref())
            .await
        {
            Ok(consumer) => consumer,
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "Failed to close session after consumer error");
                }
                return Err(e);
            }
        };

        let name = service.name().to_string();
        let (dispatcher, handle) = Dispatcher::new(
            service,
            Arc::clone(&session),
            Arc::clone(&consumer),
            DispatchSettings::from_config(&self.config),
        );
        let mut attached = AttachedConsumer {
            name: name.clone(),
            session,
            consumer,
            handle,
            pending: Some(dispatcher),
            task: None,
        };
        if status == ListenerStatus::Running {
            attached.spawn();
        }
        consumers.push(attached);

        info!(
            client_id = %self.client_id,
            consumer = %name,
            source = %source,
            ack_mode = ?config.ack_mode,
            "Attached consumer"
        );
        Ok(())
    }

    /// Attach `service` using the consumer configured under its name
    pub async fn attach_configured(&self, service: Service) -> ListenerResult<()> {
        let config = self.config.consumer(service.name()).cloned().ok_or_else(|| {
            ListenerError::invalid_service(format!(
                "no consumer configured for service {:?}",
                service.name()
            ))
        })?;
        self.attach(service, &config).await
    }

    /// Start connection delivery, then every attached dispatcher
    pub async fn start(&self) -> ListenerResult<()> {
        let mut consumers = self.consumers.lock().await;
        match self.status() {
            ListenerStatus::Running => return Ok(()),
            ListenerStatus::Stopped => {
                return Err(ListenerError::invalid_state("listener is stopped"))
            }
            ListenerStatus::Created => {}
        }

        self.connection.start().await?;
        *self.status.lock() = ListenerStatus::Running;
        for attached in consumers.iter_mut() {
            attached.spawn();
        }
        info!(
            client_id = %self.client_id,
            consumers = consumers.len(),
            "Listener started"
        );
        Ok(())
    }

    /// Stop one consumer gracefully and release its session
    pub async fn detach(&self, name: &str) -> ListenerResult<()> {
        let mut consumers = self.consumers.lock().await;
        let index = consumers
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| ListenerError::invalid_state(format!("no consumer named {name:?}")))?;
        let mut attached = consumers.remove(index);
        drop(consumers);

        attached.handle.signal_stop();
        let timeout = self.config.shutdown_timeout();
        attached.join(Instant::now() + timeout, timeout).await;
        attached.close().await?;
        info!(client_id = %self.client_id, consumer = %name, "Detached consumer");
        Ok(())
    }

    /// Let in-flight handlers finish, then close consumers, sessions and the connection
    ///
    /// Handlers get up to the configured shutdown timeout in total. Calling this again
    /// after the listener has stopped does nothing.
    pub async fn graceful_stop(&self) -> ListenerResult<()> {
        let mut consumers = self.consumers.lock().await;
        if !self.mark_stopped() {
            debug!(client_id = %self.client_id, "Listener already stopped");
            return Ok(());
        }
        info!(
            client_id = %self.client_id,
            consumers = consumers.len(),
            "Stopping listener gracefully"
        );

        for attached in consumers.iter() {
            attached.handle.signal_stop();
        }
        let timeout = self.config.shutdown_timeout();
        let deadline = Instant::now() + timeout;
        for attached in consumers.iter_mut() {
            attached.join(deadline, timeout).await;
        }
        self.teardown(consumers.drain(..).collect()).await
    }

    /// Cancel every poll task and close resources without waiting for handlers
    ///
    /// A handler already running keeps running on its own task and may finish after
    /// teardown.
    pub async fn immediate_stop(&self) -> ListenerResult<()> {
        let mut consumers = self.consumers.lock().await;
        if !self.mark_stopped() {
            debug!(client_id = %self.client_id, "Listener already stopped");
            return Ok(());
        }
        info!(
            client_id = %self.client_id,
            consumers = consumers.len(),
            "Stopping listener immediately"
        );

        for attached in consumers.iter() {
            attached.handle.signal_stop();
        }
        for attached in consumers.iter_mut() {
            attached.abort().await;
        }
        self.teardown(consumers.drain(..).collect()).await
    }

    pub async fn consumer_names(&self) -> Vec<String> {
        self.consumers
            .lock()
            .await
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    /// Control handle of an attached consumer's dispatcher
    pub async fn dispatcher(&self, name: &str) -> Option<DispatcherHandle> {
        self.consumers
            .lock()
            .await
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.handle.clone())
    }

    pub async fn dispatcher_state(&self, name: &str) -> Option<DispatcherState> {
        self.dispatcher(name).await.map(|h| h.state())
    }

    /// Returns false when the listener was already stopped
    fn mark_stopped(&self) -> bool {
        let mut status = self.status.lock();
        if *status == ListenerStatus::Stopped {
            return false;
        }
        *status = ListenerStatus::Stopped;
        true
    }

    async fn teardown(&self, consumers: Vec<AttachedConsumer>) -> ListenerResult<()> {
        let mut first_error = None;
        for attached in &consumers {
            if let Err(e) = attached.close().await {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.connection.stop().await {
            warn!(client_id = %self.client_id, error = %e, "Failed to stop connection");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.connection.close().await {
            warn!(client_id = %self.client_id, error = %e, "Failed to close connection");
            first_error.get_or_insert(e);
        }
        info!(client_id = %self.client_id, "Listener stopped");
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("client_id", &self.client_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
