#![forbid(unsafe_code)]

//! View model scenarios over an in-memory domain.

use std::sync::{Arc, Weak};
use std::time::Duration;

use arbor_core::{
    Background, Executors, Foreground, NodeLifecycle, Presentation, Scope, TreeModelConfig,
};
use arbor_model::testing::MemoryDomain;
use arbor_model::{ChangeSet, ModelListener, TreeViewModel, ViewNode};
use arbor_walk::WalkOutcome;
use parking_lot::Mutex;

// ============================================================================
// Helpers
// ============================================================================

type Node = ViewNode<String>;

fn executors() -> Executors {
    Executors::new(
        Foreground::new("view-model-test").unwrap(),
        Background::current(2).unwrap(),
    )
}

fn model(domain: &Arc<MemoryDomain>) -> TreeViewModel<MemoryDomain> {
    TreeViewModel::new(Arc::clone(domain), executors(), TreeModelConfig::default())
}

fn names(nodes: &[Node]) -> Vec<String> {
    nodes.iter().map(|n| n.domain().clone()).collect()
}

#[derive(Debug)]
enum Event {
    Root(Option<String>, Option<String>),
    Children(String, ChangeSet<Node>),
    Presentation(String),
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    fn install(model: &TreeViewModel<MemoryDomain>) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        let weak: Weak<Recorder> = Arc::downgrade(&recorder);
        let weak: Weak<dyn ModelListener<String>> = weak;
        model.set_listener(weak);
        recorder
    }

    fn children_events(&self, parent: &str) -> Vec<ChangeSet<Node>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Children(p, cs) if p == parent => Some(cs.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ModelListener<String> for Recorder {
    fn root_changed(&self, old: Option<Node>, new: Option<Node>) {
        self.events.lock().push(Event::Root(
            old.map(|n| n.domain().clone()),
            new.map(|n| n.domain().clone()),
        ));
    }

    fn children_changed(&self, parent: &Node, changes: ChangeSet<Node>) {
        self.events
            .lock()
            .push(Event::Children(parent.domain().clone(), changes));
    }

    fn presentation_changed(&self, node: &Node) {
        self.events
            .lock()
            .push(Event::Presentation(node.domain().clone()));
    }
}

// ============================================================================
// Root
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn root_loads_with_presentation() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a"])]));
    let model = model(&domain);
    let recorder = Recorder::install(&model);

    let root = model.root().await.expect("root");
    assert_eq!(root.domain(), "r");
    assert_eq!(root.lifecycle(), NodeLifecycle::Loaded);
    let presentation = root.current_presentation().await.expect("presentation");
    assert_eq!(presentation.main_text(), "r");
    assert!(!presentation.is_leaf());
    assert!(matches!(
        recorder.events.lock().first(),
        Some(Event::Root(None, Some(r))) if r == "r"
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_and_failing_roots_yield_none() {
    let domain = Arc::new(MemoryDomain::new());
    let model = model(&domain);
    assert!(model.root().await.is_none());

    let failing = Arc::new(MemoryDomain::from_edges("r", &[]));
    failing.fail_root(true);
    let model = self::model(&failing);
    assert!(model.root().await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn same_root_keeps_view_node() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a"])]));
    let model = model(&domain);
    let root = model.root().await.unwrap();

    model.invalidate_root(false);
    model.wait_idle().await;
    assert_eq!(model.root_now(), Some(root.clone()));
    assert!(!root.is_disposed());
}

#[tokio::test(flavor = "multi_thread")]
async fn new_root_disposes_old_subtree() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a"])]));
    let model = model(&domain);
    let recorder = Recorder::install(&model);
    let root = model.root().await.unwrap();
    let children = root.current_children().await.unwrap();

    domain.set_root(Some("x"));
    model.invalidate_root(false);
    model.wait_idle().await;

    let new_root = model.root_now().expect("new root");
    assert_eq!(new_root.domain(), "x");
    assert!(root.is_disposed());
    assert!(children.iter().all(Node::is_disposed));
    assert_eq!(model.registered_count(), 1);
    assert!(matches!(
        recorder.events.lock().last(),
        Some(Event::Root(Some(old), Some(new))) if old == "r" && new == "x"
    ));
}

// ============================================================================
// Children
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn reload_preserves_kept_identity() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["A", "B"])]));
    let model = model(&domain);
    let recorder = Recorder::install(&model);
    let root = model.root().await.unwrap();
    let before = root.current_children().await.unwrap();
    assert_eq!(names(&before), vec!["A", "B"]);

    domain.set_children("r", &["B", "C"]);
    model.invalidate(&root, false);
    model.wait_idle().await;

    let after = root.children_now().unwrap();
    assert_eq!(names(&after), vec!["B", "C"]);
    assert_eq!(after[0], before[1]);
    assert!(before[0].is_disposed());
    assert!(!model.is_registered(before[0].id()));

    let events = recorder.children_events("r");
    assert_eq!(events.len(), 2);
    assert!(events[0].initial);
    let reload = &events[1];
    assert!(!reload.initial);
    assert_eq!(names(&reload.removed.iter().map(|r| r.node.clone()).collect::<Vec<_>>()), vec!["A"]);
    assert_eq!(reload.removed[0].index, 0);
    assert_eq!(names(&reload.inserted.iter().map(|r| r.node.clone()).collect::<Vec<_>>()), vec!["C"]);
    assert_eq!(reload.inserted[0].index, 1);
    assert_eq!(names(&reload.changed.iter().map(|r| r.node.clone()).collect::<Vec<_>>()), vec!["B"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_children_load_yields_empty_list() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a"])]));
    domain.fail_children("r", true);
    let model = model(&domain);
    let root = model.root().await.unwrap();
    assert_eq!(root.current_children().await, Some(Vec::new()));
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_presentation_drops_only_that_child() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a", "b", "c"])]));
    domain.fail_presentation("b", true);
    let model = model(&domain);
    let root = model.root().await.unwrap();
    let children = root.current_children().await.unwrap();
    assert_eq!(names(&children), vec!["a", "c"]);
    model.wait_idle().await;
    assert_eq!(model.registered_count(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_children_keep_first() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a", "b", "a"])]));
    let model = model(&domain);
    let root = model.root().await.unwrap();
    let children = root.current_children().await.unwrap();
    assert_eq!(names(&children), vec!["a", "b"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn ensure_children_replays_loaded_list() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a"])]));
    let model = model(&domain);
    let recorder = Recorder::install(&model);
    let root = model.root().await.unwrap();

    model.ensure_children(&root);
    model.wait_idle().await;
    assert_eq!(recorder.children_events("r").len(), 1);

    model.ensure_children(&root);
    let events = recorder.children_events("r");
    assert_eq!(events.len(), 2);
    assert!(events[1].initial);
    assert_eq!(domain.children_calls("r"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn recursive_invalidate_matches_fresh_compute() {
    let domain = Arc::new(MemoryDomain::from_edges(
        "r",
        &[("r", &["a", "b"]), ("a", &["a1", "a2"]), ("b", &["b1"])],
    ));
    let model = model(&domain);
    let root = model.root().await.unwrap();
    let children = root.current_children().await.unwrap();
    for child in &children {
        child.current_children().await.unwrap();
    }

    domain.set_children("r", &["b", "c"]);
    domain.set_children("b", &["b2", "b1"]);
    model.invalidate(&root, true);
    model.wait_idle().await;

    let root_children = root.children_now().unwrap();
    assert_eq!(names(&root_children), vec!["b", "c"]);
    assert_eq!(names(&root_children[0].children_now().unwrap()), vec!["b2", "b1"]);
    assert!(children[0].is_disposed());
}

// ============================================================================
// Presentation
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_readers_see_final_first_presentation() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[]));
    domain.set_presentation_steps(
        "r",
        vec![Presentation::text("draft"), Presentation::text("final")],
    );
    domain.set_delay(Some(Duration::from_millis(20)));
    let model = model(&domain);
    model.request_root();

    let mut waiters = Vec::new();
    for _ in 0..4 {
        let model = model.clone();
        waiters.push(tokio::spawn(async move {
            let root = model.root().await?;
            root.current_presentation().await
        }));
    }
    for waiter in waiters {
        let presentation = waiter.await.unwrap().expect("presentation");
        assert_eq!(presentation.main_text(), "final");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_publishes_latest_presentation() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[]));
    let model = model(&domain);
    let recorder = Recorder::install(&model);
    let root = model.root().await.unwrap();
    assert!(root.mark_published());

    domain.set_presentation("r", Presentation::text("second"));
    model.refresh_presentation(&root);
    domain.set_presentation("r", Presentation::text("third"));
    model.refresh_presentation(&root);
    model.wait_idle().await;

    assert_eq!(root.presentation_now().unwrap().main_text(), "third");
    assert!(
        recorder
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, Event::Presentation(n) if n == "r"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_refresh_keeps_previous_presentation() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[]));
    let model = model(&domain);
    let root = model.root().await.unwrap();

    domain.fail_presentation("r", true);
    model.refresh_presentation(&root);
    model.wait_idle().await;
    assert_eq!(root.presentation_now().unwrap().main_text(), "r");
    assert!(!root.is_disposed());
}

// ============================================================================
// Walks and disposal
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn find_loads_along_the_way() {
    let domain = Arc::new(MemoryDomain::from_edges(
        "r",
        &[("r", &["a", "b"]), ("b", &["c"])],
    ));
    let model = model(&domain);
    let scope = Scope::root("find");

    let outcome = model.find(|n| n == "c", &scope).await;
    let path = outcome.into_found().expect("found");
    let domains: Vec<String> = path.iter().map(|n| n.domain().clone()).collect();
    assert_eq!(domains, vec!["r", "b", "c"]);
    assert_eq!(domain.children_calls("a"), 1);

    let missing = model.find(|n| n == "zzz", &scope).await;
    assert_eq!(missing, WalkOutcome::NotFound);
}

#[tokio::test(flavor = "multi_thread")]
async fn dispose_cancels_everything() {
    let domain = Arc::new(MemoryDomain::from_edges("r", &[("r", &["a", "b"])]));
    let model = model(&domain);
    let root = model.root().await.unwrap();
    let children = root.current_children().await.unwrap();
    model.wait_idle().await;

    model.dispose();
    assert!(model.is_disposed());
    assert!(root.is_disposed());
    assert!(children.iter().all(Node::is_disposed));
    assert_eq!(model.registered_count(), 0);
    assert!(model.root().await.is_none());
}
