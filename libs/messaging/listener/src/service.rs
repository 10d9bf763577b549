//! Service registration and validation
//!
//! A [`Service`] is the user's handler set for one consumer. It is declared as a list of
//! named remote methods with parameter shapes, then validated into a [`ValidatedService`]
//! before any transport resource is created. The accepted shape is:
//!
//! - `onMessage(message)` or `onMessage(message, caller)`, required
//! - `onError(error)`, optional
//! - nothing else: no resource methods, no other remote methods

use crate::caller::Caller;
use crate::error::{ListenerError, ListenerResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use types::Envelope;

pub const ON_MESSAGE: &str = "onMessage";
pub const ON_ERROR: &str = "onError";

pub type MessageHandler =
    Arc<dyn Fn(Envelope, Option<Caller>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub type ErrorHandler =
    Arc<dyn Fn(ListenerError) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Declared parameter of a remote method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Message,
    Caller,
    Error,
}

#[derive(Clone)]
pub enum RemoteHandler {
    Message(MessageHandler),
    Error(ErrorHandler),
}

impl RemoteHandler {
    pub fn message<F, Fut>(handler: F) -> Self
    where
        F: Fn(Envelope, Option<Caller>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: MessageHandler =
            Arc::new(move |envelope, caller| handler(envelope, caller).boxed());
        RemoteHandler::Message(handler)
    }

    pub fn error<F, Fut>(handler: F) -> Self
    where
        F: Fn(ListenerError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: ErrorHandler = Arc::new(move |error| handler(error).boxed());
        RemoteHandler::Error(handler)
    }
}

impl fmt::Debug for RemoteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteHandler::Message(_) => f.write_str("RemoteHandler::Message"),
            RemoteHandler::Error(_) => f.write_str("RemoteHandler::Error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteMethod {
    pub name: String,
    pub params: Vec<Param>,
    pub handler: RemoteHandler,
}

/// Unvalidated handler set for one consumer
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    remote_methods: Vec<RemoteMethod>,
    resources: Vec<String>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_methods: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `onMessage(message)`
    pub fn on_message<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.remote(
            ON_MESSAGE,
            vec![Param::Message],
            RemoteHandler::message(move |envelope, _| handler(envelope)),
        )
    }

    /// Register `onMessage(message, caller)`
    pub fn on_message_with_caller<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(Envelope, Caller) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: MessageHandler = Arc::new(move |envelope, caller| match caller {
            Some(caller) => handler(envelope, caller).boxed(),
            None => futures::future::ready(Err(anyhow::anyhow!("no caller was supplied"))).boxed(),
        });
        self.remote(
            ON_MESSAGE,
            vec![Param::Message, Param::Caller],
            RemoteHandler::Message(handler),
        )
    }

    /// Register `onError(error)`
    pub fn on_error<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(ListenerError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.remote(ON_ERROR, vec![Param::Error], RemoteHandler::error(handler))
    }

    /// Register an arbitrary remote method; its shape is checked by [`Service::validate`]
    pub fn remote(mut self, name: impl Into<String>, params: Vec<Param>, handler: RemoteHandler) -> Self {
        self.remote_methods.push(RemoteMethod {
            name: name.into(),
            params,
            handler,
        });
        self
    }

    /// Declare a resource method; services bound to a listener may not have any
    pub fn resource(mut self, name: impl Into<String>) -> Self {
        self.resources.push(name.into());
        self
    }

    pub fn validate(self) -> ListenerResult<ValidatedService> {
        if self.name.trim().is_empty() {
            return Err(ListenerError::invalid_service("service name must not be empty"));
        }
        if !self.resources.is_empty() {
            return Err(ListenerError::invalid_service(format!(
                "{}: resource methods are not allowed, found {}",
                self.name,
                self.resources.join(", ")
            )));
        }
        let count = self.remote_methods.len();
        if !(1..=2).contains(&count) {
            return Err(ListenerError::invalid_service(format!(
                "{}: expected one or two remote methods, found {count}",
                self.name
            )));
        }

        let mut on_message = None;
        let mut on_error = None;
        for method in self.remote_methods {
            let slot_taken = match method.name.as_str() {
                ON_MESSAGE => on_message.is_some(),
                ON_ERROR => on_error.is_some(),
                other => {
                    return Err(ListenerError::invalid_service(format!(
                        "{}: unrecognized remote method {other:?}, only {ON_MESSAGE} and {ON_ERROR} are allowed",
                        self.name
                    )))
                }
            };
            if slot_taken {
                return Err(ListenerError::invalid_service(format!(
                    "{}: remote method {} is declared more than once",
                    self.name, method.name
                )));
            }
            if method.name == ON_MESSAGE {
                on_message = Some(method);
            } else {
                on_error = Some(method);
            }
        }

        let Some(on_message) = on_message else {
            return Err(ListenerError::invalid_service(format!(
                "{}: missing required remote method {ON_MESSAGE}",
                self.name
            )));
        };
        let wants_caller = check_message_params(&self.name, &on_message.params)?;
        let RemoteHandler::Message(message_handler) = on_message.handler else {
            return Err(ListenerError::invalid_service(format!(
                "{}: {ON_MESSAGE} must be bound to a message handler",
                self.name
            )));
        };

        let error_handler = match on_error {
            None => None,
            Some(method) => {
                if method.params != [Param::Error] {
                    return Err(ListenerError::invalid_service(format!(
                        "{}: {ON_ERROR} must take exactly one error parameter, found {:?}",
                        self.name, method.params
                    )));
                }
                let RemoteHandler::Error(handler) = method.handler else {
                    return Err(ListenerError::invalid_service(format!(
                        "{}: {ON_ERROR} must be bound to an error handler",
                        self.name
                    )));
                };
                Some(handler)
            }
        };

        Ok(ValidatedService {
            name: Arc::from(self.name),
            on_message: message_handler,
            wants_caller,
            on_error: error_handler,
        })
    }
}

/// Returns whether the handler takes a caller
fn check_message_params(service: &str, params: &[Param]) -> ListenerResult<bool> {
    let messages = params.iter().filter(|p| **p == Param::Message).count();
    let callers = params.iter().filter(|p| **p == Param::Caller).count();
    if messages != 1 || callers > 1 || messages + callers != params.len() {
        return Err(ListenerError::invalid_service(format!(
            "{service}: {ON_MESSAGE} must take a message and optionally a caller, found {params:?}"
        )));
    }
    Ok(callers == 1)
}

/// Handler set that passed validation
#[derive(Clone)]
pub struct ValidatedService {
    name: Arc<str>,
    on_message: MessageHandler,
    wants_caller: bool,
    on_error: Option<ErrorHandler>,
}

impl ValidatedService {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn wants_caller(&self) -> bool {
        self.wants_caller
    }

    pub fn has_error_handler(&self) -> bool {
        self.on_error.is_some()
    }

    pub(crate) fn message_handler(&self) -> MessageHandler {
        Arc::clone(&self.on_message)
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorHandler> {
        self.on_error.clone()
    }
}

impl fmt::Debug for ValidatedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedService")
            .field("name", &self.name)
            .field("wants_caller", &self.wants_caller)
            .field("has_error_handler", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok(_: Envelope) -> anyhow::Result<()> {
        Ok(())
    }

    fn message_handler() -> RemoteHandler {
        RemoteHandler::message(|_, _| async { Ok(()) })
    }

    fn error_message(service: Service) -> String {
        service.validate().unwrap_err().to_string()
    }

    #[test]
    fn test_valid_shapes() {
        let plain = Service::new("orders").on_message(ok).validate().unwrap();
        assert!(!plain.wants_caller());
        assert!(!plain.has_error_handler());

        let full = Service::new("orders")
            .on_message_with_caller(|_, _| async { Ok(()) })
            .on_error(|_| async { Ok(()) })
            .validate()
            .unwrap();
        assert!(full.wants_caller());
        assert!(full.has_error_handler());
        assert_eq!(full.name(), "orders");
    }

    #[test]
    fn test_caller_may_come_first() {
        let service = Service::new("orders")
            .remote(ON_MESSAGE, vec![Param::Caller, Param::Message], message_handler())
            .validate()
            .unwrap();
        assert!(service.wants_caller());
    }

    #[test]
    fn test_method_count() {
        assert!(error_message(Service::new("empty")).contains("found 0"));

        let three = Service::new("three")
            .on_message(ok)
            .on_error(|_| async { Ok(()) })
            .remote("onRequest", vec![Param::Message], message_handler());
        assert!(error_message(three).contains("found 3"));
    }

    #[test]
    fn test_unrecognized_and_duplicate_names() {
        let unknown = Service::new("svc").remote("onRequest", vec![Param::Message], message_handler());
        assert!(error_message(unknown).contains("unrecognized remote method"));

        let twice = Service::new("svc").on_message(ok).on_message(ok);
        assert!(error_message(twice).contains("more than once"));
    }

    #[test]
    fn test_on_message_required() {
        let only_error = Service::new("svc").on_error(|_| async { Ok(()) });
        assert!(error_message(only_error).contains("missing required remote method onMessage"));
    }

    #[test]
    fn test_parameter_shapes() {
        let no_message = Service::new("svc").remote(ON_MESSAGE, vec![Param::Caller], message_handler());
        assert!(error_message(no_message).contains("must take a message"));

        let two_callers = Service::new("svc").remote(
            ON_MESSAGE,
            vec![Param::Message, Param::Caller, Param::Caller],
            message_handler(),
        );
        assert!(error_message(two_callers).contains("must take a message"));

        let bad_error = Service::new("svc")
            .on_message(ok)
            .remote(ON_ERROR, vec![Param::Error, Param::Message], RemoteHandler::error(|_| async { Ok(()) }));
        assert!(error_message(bad_error).contains("exactly one error parameter"));

        let wrong_binding = Service::new("svc").remote(
            ON_MESSAGE,
            vec![Param::Message],
            RemoteHandler::error(|_| async { Ok(()) }),
        );
        assert!(error_message(wrong_binding).contains("message handler"));
    }

    #[test]
    fn test_resources_rejected() {
        let service = Service::new("svc").on_message(ok).resource("get");
        let err = service.validate().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("resource methods are not allowed"));
    }
}
