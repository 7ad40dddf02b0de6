#![forbid(unsafe_code)]

//! Logging integration tests for the widget adapter.
//!
//! Only events emitted on the test thread are captured (the subscriber is
//! thread-local); foreground-side logging is not asserted here.

use std::sync::{Arc, Mutex};

use arbor_core::{Background, Executors, Foreground, Presentation, TreeModelConfig};
use arbor_model::testing::MemoryDomain;
use arbor_model::{SnapshotNode, TreeSnapshot, TreeViewModel};
use arbor_widget::TreeAdapter;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: Level,
    message: String,
    fields: Vec<(String, String)>,
}

impl CapturedEvent {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields
                .push((field.name().to_string(), format!("{value:?}")));
        }
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

fn capture() -> (tracing::subscriber::DefaultGuard, Arc<Mutex<Vec<CapturedEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture {
        events: Arc::clone(&events),
    });
    (tracing::subscriber::set_default(subscriber), events)
}

fn model(domain: &Arc<MemoryDomain>) -> TreeViewModel<MemoryDomain> {
    let executors = Executors::new(
        Foreground::new("widget-tracing-test").unwrap(),
        Background::current(2).unwrap(),
    );
    TreeViewModel::new(Arc::clone(domain), executors, TreeModelConfig::default())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn read_triggered_load_is_traced() {
    let (_guard, events) = capture();
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a"])]));
    let adapter = TreeAdapter::new(model(&domain));
    adapter.settle().await;
    let root = adapter.root().expect("root");

    assert_eq!(adapter.child_count(&root), 1);
    adapter.settle().await;

    let events = events.lock().unwrap();
    let read = events
        .iter()
        .find(|e| e.message == "children requested by read")
        .expect("read logged");
    assert_eq!(read.level, Level::TRACE);
    assert_eq!(read.field("node_id"), Some(root.id().get().to_string().as_str()));
    assert!(
        events
            .iter()
            .all(|e| e.level != Level::WARN && e.level != Level::ERROR)
    );
}

#[tokio::test]
async fn snapshot_seeding_is_logged() {
    let (_guard, events) = capture();
    let snapshot = TreeSnapshot::new()
        .with_root("r")
        .with_node(
            "r",
            SnapshotNode {
                children: vec!["a".to_string(), "a".to_string()],
                presentation: Presentation::text("r"),
                ..Default::default()
            },
        )
        .with_node(
            "a",
            SnapshotNode {
                leaf: true,
                ..Default::default()
            },
        );
    let domain = Arc::new(MemoryDomain::from_edges("r", &[]));
    let adapter = TreeAdapter::with_snapshot(model(&domain), &snapshot);
    adapter.dispose();

    let events = events.lock().unwrap();
    let repeated = events
        .iter()
        .find(|e| e.message.contains("snapshot key repeated"))
        .expect("repeat logged");
    assert_eq!(repeated.level, Level::DEBUG);
    assert_eq!(repeated.field("key"), Some("a"));

    let seeded = events
        .iter()
        .find(|e| e.message == "seeded adapter from snapshot")
        .expect("seeding logged");
    assert_eq!(seeded.field("nodes"), Some("2"));
    assert!(events.iter().any(|e| e.message == "disposing tree adapter"));
}
