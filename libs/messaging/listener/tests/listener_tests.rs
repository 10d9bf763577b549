//! Listener lifecycle and dispatch behaviour over the in-memory transport

use codec::encode_envelope;
use listener::test_utils::{MemoryConnection, TransportEvent};
use listener::{
    push_channel, DispatchSettings, Dispatcher, DispatcherState, Listener, ListenerError,
    ListenerStatus, Service,
};
use listener::Connection;
use mqlink_config::{AckMode, ConsumerConfig, ConsumerSource, ListenerConfig, QueueConfig, TopicConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use types::{Envelope, RawMessage};

fn fast_config() -> ListenerConfig {
    ListenerConfig {
        shutdown_timeout_ms: 2_000,
        polling_interval_ms: 5,
        receive_timeout_ms: 20,
        ..ListenerConfig::default()
    }
}

fn message(payload: &str) -> RawMessage {
    encode_envelope(&Envelope::new(payload)).unwrap()
}

async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn is_marker(label: &'static str) -> impl Fn(&TransportEvent) -> bool {
    move |e| *e == TransportEvent::Marker(label.to_string())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_per_consumer() {
    let connection = MemoryConnection::new();
    let queue = connection.destination("ORDERS");
    for i in 0..5 {
        queue.push(message(&format!("m{i}")));
    }

    let spans: Arc<Mutex<Vec<(String, Instant, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let service = {
        let spans = Arc::clone(&spans);
        let in_flight = Arc::clone(&in_flight);
        let max_in_flight = Arc::clone(&max_in_flight);
        Service::new("orders").on_message(move |envelope| {
            let spans = Arc::clone(&spans);
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);
            async move {
                let entered = Instant::now();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(15)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                spans
                    .lock()
                    .unwrap()
                    .push((envelope.payload_text(), entered, Instant::now()));
                Ok(())
            }
        })
    };

    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener
        .attach(service, &ConsumerConfig::queue("ORDERS"))
        .await
        .unwrap();
    listener.start().await.unwrap();

    eventually(|| spans.lock().unwrap().len() == 5).await;
    listener.graceful_stop().await.unwrap();

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    let spans = spans.lock().unwrap();
    let order: Vec<_> = spans.iter().map(|(p, _, _)| p.as_str()).collect();
    assert_eq!(order, vec!["m0", "m1", "m2", "m3", "m4"]);
    for pair in spans.windows(2) {
        assert!(pair[0].2 <= pair[1].1, "handler for next message entered early");
    }
}

#[tokio::test]
async fn test_handler_failure_routes_once_and_polling_continues() {
    let connection = MemoryConnection::new();
    let queue = connection.destination("Q");
    queue.push(message("bad"));
    queue.push(message("good"));

    let errors: Arc<Mutex<Vec<(String, Option<String>)>>> = Arc::new(Mutex::new(Vec::new()));
    let handled = Arc::new(Mutex::new(Vec::new()));

    let service = {
        let errors = Arc::clone(&errors);
        let handled = Arc::clone(&handled);
        Service::new("svc")
            .on_message(move |envelope| {
                let handled = Arc::clone(&handled);
                async move {
                    let text = envelope.payload_text();
                    if text == "bad" {
                        anyhow::bail!("cannot parse order");
                    }
                    handled.lock().unwrap().push(text);
                    Ok(())
                }
            })
            .on_error(move |error| {
                let errors = Arc::clone(&errors);
                async move {
                    let cause = error.cause().map(|c| c.to_string());
                    errors.lock().unwrap().push((error.to_string(), cause));
                    Ok(())
                }
            })
    };

    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener.attach(service, &ConsumerConfig::queue("Q")).await.unwrap();
    listener.start().await.unwrap();

    eventually(|| handled.lock().unwrap().len() == 1).await;
    listener.graceful_stop().await.unwrap();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "failed to process message: cannot parse order");
    assert_eq!(errors[0].1.as_deref(), Some("cannot parse order"));
    assert_eq!(*handled.lock().unwrap(), vec!["good".to_string()]);
}

#[tokio::test]
async fn test_failure_without_error_handler_stops_only_that_consumer() {
    let connection = MemoryConnection::new();
    connection.destination("BROKEN").push(message("x"));

    let healthy = Arc::new(AtomicUsize::new(0));
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener
        .attach(
            Service::new("broken").on_message(|_| async { anyhow::bail!("unhandled") }),
            &ConsumerConfig::queue("BROKEN"),
        )
        .await
        .unwrap();
    {
        let healthy = Arc::clone(&healthy);
        listener
            .attach(
                Service::new("healthy").on_message(move |_| {
                    let healthy = Arc::clone(&healthy);
                    async move {
                        healthy.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
                &ConsumerConfig::queue("HEALTHY"),
            )
            .await
            .unwrap();
    }
    listener.start().await.unwrap();

    let broken = listener.dispatcher("broken").await.unwrap();
    let state = broken.wait_for(|s| s.is_terminal()).await.unwrap();
    assert_eq!(state, DispatcherState::Failed);

    connection.destination("HEALTHY").push(message("y"));
    eventually(|| healthy.load(Ordering::SeqCst) == 1).await;
    assert_ne!(
        listener.dispatcher_state("healthy").await,
        Some(DispatcherState::Failed)
    );
    listener.graceful_stop().await.unwrap();
}

#[tokio::test]
async fn test_failing_error_handler_is_fatal() {
    let connection = MemoryConnection::new();
    connection.destination("Q").push(message("x"));
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener
        .attach(
            Service::new("svc")
                .on_message(|_| async { anyhow::bail!("first") })
                .on_error(|_| async { anyhow::bail!("second") }),
            &ConsumerConfig::queue("Q"),
        )
        .await
        .unwrap();
    listener.start().await.unwrap();

    let handle = listener.dispatcher("svc").await.unwrap();
    assert_eq!(
        handle.wait_for(|s| s.is_terminal()).await.unwrap(),
        DispatcherState::Failed
    );
    listener.graceful_stop().await.unwrap();
}

#[tokio::test]
async fn test_receive_failure_is_routed_to_error_handler() {
    let connection = MemoryConnection::new();
    let queue = connection.destination("Q");
    queue.push_fault(ListenerError::reason("receive", 2009, "connection broken"));
    queue.push(message("after"));

    let reasons = Arc::new(Mutex::new(Vec::new()));
    let handled = Arc::new(AtomicUsize::new(0));
    let service = {
        let reasons = Arc::clone(&reasons);
        let handled = Arc::clone(&handled);
        Service::new("svc")
            .on_message(move |_| {
                let handled = Arc::clone(&handled);
                async move {
                    handled.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .on_error(move |error| {
                let reasons = Arc::clone(&reasons);
                async move {
                    reasons.lock().unwrap().push(error.reason_code());
                    Ok(())
                }
            })
    };

    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener.attach(service, &ConsumerConfig::queue("Q")).await.unwrap();
    listener.start().await.unwrap();

    eventually(|| handled.load(Ordering::SeqCst) == 1).await;
    listener.graceful_stop().await.unwrap();
    assert_eq!(*reasons.lock().unwrap(), vec![Some(2009)]);
}

#[tokio::test]
async fn test_receive_failure_without_error_handler_fails_loop() {
    let connection = MemoryConnection::new();
    connection
        .destination("Q")
        .push_fault(ListenerError::transport("receive", "queue deleted"));
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener
        .attach(
            Service::new("svc").on_message(|_| async { Ok(()) }),
            &ConsumerConfig::queue("Q"),
        )
        .await
        .unwrap();
    listener.start().await.unwrap();

    let handle = listener.dispatcher("svc").await.unwrap();
    assert_eq!(
        handle.wait_for(|s| s.is_terminal()).await.unwrap(),
        DispatcherState::Failed
    );
    listener.immediate_stop().await.unwrap();
}

#[tokio::test]
async fn test_graceful_stop_waits_for_in_flight_handler() {
    let connection = MemoryConnection::new();
    connection.destination("Q").push(message("slow"));
    let log = connection.log();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();

    let service = {
        let log = log.clone();
        Service::new("svc").on_message(move |_| {
            let log = log.clone();
            let started_tx = started_tx.clone();
            async move {
                log.mark("handler-start");
                let _ = started_tx.send(());
                tokio::time::sleep(Duration::from_millis(100)).await;
                log.mark("handler-end");
                Ok(())
            }
        })
    };

    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener.attach(service, &ConsumerConfig::queue("Q")).await.unwrap();
    listener.start().await.unwrap();
    started_rx.recv().await.unwrap();

    listener.graceful_stop().await.unwrap();
    assert_eq!(listener.status(), ListenerStatus::Stopped);

    let handler_end = log.position(is_marker("handler-end")).unwrap();
    let consumer_closed = log
        .position(|e| matches!(e, TransportEvent::ConsumerClosed { .. }))
        .unwrap();
    let session_closed = log
        .position(|e| matches!(e, TransportEvent::SessionClosed(_)))
        .unwrap();
    let stopped = log.position(|e| *e == TransportEvent::ConnectionStopped).unwrap();
    let closed = log.position(|e| *e == TransportEvent::ConnectionClosed).unwrap();
    assert!(handler_end < consumer_closed);
    assert!(consumer_closed < session_closed);
    assert!(session_closed < stopped);
    assert!(stopped < closed);

    let before = log.events().len();
    listener.graceful_stop().await.unwrap();
    listener.immediate_stop().await.unwrap();
    assert_eq!(log.events().len(), before);
}

#[tokio::test]
async fn test_immediate_stop_does_not_wait_for_handler() {
    let connection = MemoryConnection::new();
    connection.destination("Q").push(message("slow"));
    let log = connection.log();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();

    let service = {
        let log = log.clone();
        Service::new("svc").on_message(move |_| {
            let log = log.clone();
            let started_tx = started_tx.clone();
            async move {
                let _ = started_tx.send(());
                tokio::time::sleep(Duration::from_millis(300)).await;
                log.mark("handler-end");
                Ok(())
            }
        })
    };

    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener.attach(service, &ConsumerConfig::queue("Q")).await.unwrap();
    listener.start().await.unwrap();
    started_rx.recv().await.unwrap();

    listener.immediate_stop().await.unwrap();
    assert!(log.position(is_marker("handler-end")).is_none());
    assert!(log.position(|e| matches!(e, TransportEvent::SessionClosed(_))).is_some());
    assert!(log.position(|e| *e == TransportEvent::ConnectionClosed).is_some());

    // The handler keeps its own task and completes after teardown.
    eventually(|| log.position(is_marker("handler-end")).is_some()).await;
    assert!(listener.immediate_stop().await.is_ok());
}

#[tokio::test]
async fn test_connection_starts_before_polling() {
    let connection = MemoryConnection::new();
    connection.destination("Q").push(message("early"));
    let log = connection.log();

    let service = {
        let log = log.clone();
        Service::new("svc").on_message(move |_| {
            let log = log.clone();
            async move {
                log.mark("handled");
                Ok(())
            }
        })
    };
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener.attach(service, &ConsumerConfig::queue("Q")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(log.position(is_marker("handled")).is_none());
    assert_eq!(listener.dispatcher_state("svc").await, Some(DispatcherState::Idle));

    listener.start().await.unwrap();
    eventually(|| log.position(is_marker("handled")).is_some()).await;
    let started = log.position(|e| *e == TransportEvent::ConnectionStarted).unwrap();
    assert!(started < log.position(is_marker("handled")).unwrap());
    listener.graceful_stop().await.unwrap();
}

#[tokio::test]
async fn test_attach_after_start_polls_immediately() {
    let connection = MemoryConnection::new();
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener.start().await.unwrap();

    let handled = Arc::new(AtomicUsize::new(0));
    {
        let handled = Arc::clone(&handled);
        listener
            .attach(
                Service::new("late").on_message(move |_| {
                    let handled = Arc::clone(&handled);
                    async move {
                        handled.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
                &ConsumerConfig::queue("LATE"),
            )
            .await
            .unwrap();
    }
    connection.destination("LATE").push(message("hi"));
    eventually(|| handled.load(Ordering::SeqCst) == 1).await;
    listener.graceful_stop().await.unwrap();
}

#[tokio::test]
async fn test_attach_rejects_invalid_services_synchronously() {
    let connection = MemoryConnection::new();
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();

    let no_handler = listener
        .attach(Service::new("svc"), &ConsumerConfig::queue("Q"))
        .await
        .unwrap_err();
    assert!(matches!(no_handler, ListenerError::InvalidService(_)));

    let with_resource = listener
        .attach(
            Service::new("svc").on_message(|_| async { Ok(()) }).resource("status"),
            &ConsumerConfig::queue("Q"),
        )
        .await
        .unwrap_err();
    assert!(with_resource.is_configuration_error());

    let ambiguous = ConsumerConfig {
        topic: Some(TopicConfig::new("prices")),
        ..ConsumerConfig::queue("Q")
    };
    let config_err = listener
        .attach(Service::new("svc").on_message(|_| async { Ok(()) }), &ambiguous)
        .await
        .unwrap_err();
    assert!(matches!(config_err, ListenerError::Config(_)));

    assert_eq!(
        connection
            .log()
            .count(|e| matches!(e, TransportEvent::SessionCreated { .. })),
        0
    );
    assert!(listener.consumer_names().await.is_empty());
}

#[tokio::test]
async fn test_attach_rejects_duplicate_names_and_stopped_listener() {
    let connection = MemoryConnection::new();
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    let service = || Service::new("svc").on_message(|_| async { Ok(()) });

    listener.attach(service(), &ConsumerConfig::queue("Q")).await.unwrap();
    let duplicate = listener
        .attach(service(), &ConsumerConfig::queue("Q2"))
        .await
        .unwrap_err();
    assert!(duplicate.to_string().contains("already attached"));

    listener.graceful_stop().await.unwrap();
    let late = listener
        .attach(
            Service::new("other").on_message(|_| async { Ok(()) }),
            &ConsumerConfig::queue("Q3"),
        )
        .await
        .unwrap_err();
    assert!(matches!(late, ListenerError::InvalidState(_)));
    assert!(listener.start().await.is_err());
}

#[tokio::test]
async fn test_session_failure_surfaces_at_attach() {
    let connection = MemoryConnection::new();
    connection.fail_session_creation();
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    let err = listener
        .attach(
            Service::new("svc").on_message(|_| async { Ok(()) }),
            &ConsumerConfig::queue("Q"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ListenerError::Transport { operation: "create_session", .. }));
}

#[tokio::test]
async fn test_topic_consumer_and_ack_mode_reach_transport() {
    let connection = MemoryConnection::new();
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    let config = ConsumerConfig::topic(TopicConfig::durable("prices/eur", "px-1"))
        .with_ack_mode(AckMode::SessionTransacted)
        .with_selector("region = 'emea'");
    listener
        .attach(Service::new("prices").on_message(|_| async { Ok(()) }), &config)
        .await
        .unwrap();

    let events = connection.log().events();
    assert!(events.contains(&TransportEvent::SessionCreated {
        session: 1,
        ack_mode: AckMode::SessionTransacted,
    }));
    assert!(events.contains(&TransportEvent::ConsumerCreated {
        session: 1,
        source: "topic:prices/eur".into(),
        selector: Some("region = 'emea'".into()),
    }));
    listener.graceful_stop().await.unwrap();
}

#[tokio::test]
async fn test_caller_commits_session() {
    let connection = MemoryConnection::new();
    connection.destination("Q").push(message("tx"));
    let committed = Arc::new(AtomicUsize::new(0));

    let service = {
        let committed = Arc::clone(&committed);
        Service::new("svc").on_message_with_caller(move |_, caller| {
            let committed = Arc::clone(&committed);
            async move {
                assert_eq!(caller.consumer(), "svc");
                caller.commit().await?;
                committed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    };
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    listener
        .attach(
            service,
            &ConsumerConfig::queue("Q").with_ack_mode(AckMode::SessionTransacted),
        )
        .await
        .unwrap();
    listener.start().await.unwrap();

    eventually(|| committed.load(Ordering::SeqCst) == 1).await;
    listener.graceful_stop().await.unwrap();
    assert_eq!(
        connection
            .log()
            .count(|e| matches!(e, TransportEvent::SessionCommitted(1))),
        1
    );
}

#[tokio::test]
async fn test_detach_closes_one_consumer() {
    let connection = MemoryConnection::new();
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    for name in ["a", "b"] {
        listener
            .attach(
                Service::new(name).on_message(|_| async { Ok(()) }),
                &ConsumerConfig::queue(name.to_uppercase()),
            )
            .await
            .unwrap();
    }
    listener.start().await.unwrap();

    listener.detach("a").await.unwrap();
    assert_eq!(listener.consumer_names().await, vec!["b".to_string()]);
    let log = connection.log();
    assert!(log.events().contains(&TransportEvent::SessionClosed(1)));
    assert!(!log.events().contains(&TransportEvent::SessionClosed(2)));
    assert!(!log.events().contains(&TransportEvent::ConnectionClosed));
    assert!(listener.detach("a").await.is_err());

    listener.graceful_stop().await.unwrap();
    assert!(log.events().contains(&TransportEvent::SessionClosed(2)));
}

#[tokio::test]
async fn test_client_id_and_exception_listener() {
    let connection = MemoryConnection::new();
    let listener = Listener::new(connection.clone(), fast_config()).unwrap();
    assert_eq!(listener.client_id().len(), 36);
    assert_eq!(connection.client_id().as_deref(), Some(listener.client_id()));
    assert!(connection.has_exception_listener());
    connection.raise(&ListenerError::transport("heartbeat", "peer reset"));

    let configured = MemoryConnection::new();
    let config = ListenerConfig {
        client_id: Some("orders-service".into()),
        ..fast_config()
    };
    let listener = Listener::new(configured.clone(), config).unwrap();
    assert_eq!(listener.client_id(), "orders-service");
}

#[tokio::test]
async fn test_attach_configured_uses_named_consumer() {
    let connection = MemoryConnection::new();
    let mut config = fast_config();
    config
        .consumers
        .insert("orders".into(), ConsumerConfig::queue("ORDERS.IN"));
    let listener = Listener::new(connection.clone(), config).unwrap();

    listener
        .attach_configured(Service::new("orders").on_message(|_| async { Ok(()) }))
        .await
        .unwrap();
    let missing = listener
        .attach_configured(Service::new("unknown").on_message(|_| async { Ok(()) }))
        .await;
    assert!(missing.is_err());
    listener.graceful_stop().await.unwrap();
}

#[tokio::test]
async fn test_push_consumer_feeds_dispatcher() {
    let connection = MemoryConnection::new();
    let session = connection
        .create_session(AckMode::AutoAcknowledge)
        .await
        .unwrap();
    let (handle, consumer) = push_channel();

    let received = Arc::new(Mutex::new(Vec::new()));
    let service = {
        let received = Arc::clone(&received);
        Service::new("push")
            .on_message(move |envelope| {
                let received = Arc::clone(&received);
                async move {
                    received.lock().unwrap().push(envelope.payload_text());
                    Ok(())
                }
            })
            .validate()
            .unwrap()
    };
    let settings = DispatchSettings {
        receive_timeout: Duration::from_millis(20),
        polling_interval: Duration::from_millis(5),
    };
    let (dispatcher, control) = Dispatcher::new(service, session, Arc::new(consumer), settings);
    let task = tokio::spawn(dispatcher.run());

    for payload in ["one", "two", "three"] {
        handle.deliver(message(payload)).await.unwrap();
    }
    eventually(|| received.lock().unwrap().len() == 3).await;
    control.signal_stop();
    task.await.unwrap().unwrap();

    assert_eq!(*received.lock().unwrap(), vec!["one", "two", "three"]);
    assert_eq!(control.state(), DispatcherState::Stopped);
}

#[test]
fn test_queue_source_display() {
    let source = ConsumerSource::Queue(QueueConfig { name: "Q".into() });
    assert_eq!(source.to_string(), "queue:Q");
}

#[test]
fn test_stop_before_start_is_immediate() {
    tokio_test::block_on(async {
        let connection = MemoryConnection::new();
        let listener = Listener::new(connection.clone(), fast_config()).unwrap();
        listener
            .attach(
                Service::new("svc").on_message(|_| async { Ok(()) }),
                &ConsumerConfig::queue("Q"),
            )
            .await
            .unwrap();
        listener.graceful_stop().await.unwrap();
        let events = connection.log().events();
        assert!(events.contains(&TransportEvent::SessionClosed(1)));
        assert!(!events.contains(&TransportEvent::ConnectionStarted));
    });
}
