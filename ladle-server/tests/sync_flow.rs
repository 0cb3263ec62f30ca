//! 同步流程集成测试 - full stack through the in-process client
//!
//! 使用 ServerState::initialize 完整初始化（临时 redb 存储），通过
//! LocalTransport 走真实的路由、身份中间件和事件广播。
//!
//! alice 和 bob 同属 casa-verde，carol 住在 loft-9。

use std::sync::Arc;

use chrono::NaiveDate;
use tempfile::TempDir;

use ladle_client::{
    ClientError, CreateEntryRequest, DragSession, EntryKind, HoverPosition, LocalTransport,
    MealSlot, PlanEventType, PlanRange, PlanSession, PlanTransport,
};
use ladle_server::{Config, ServerState};

struct Harness {
    state: ServerState,
    router: axum::Router,
    // keeps the store directory alive for the test's duration
    _data_dir: TempDir,
}

impl Harness {
    async fn start() -> Self {
        Self::start_with_feed_capacity(256).await
    }

    async fn start_with_feed_capacity(capacity: usize) -> Self {
        let data_dir = TempDir::new().unwrap();
        let mut config = Config::with_overrides(data_dir.path().to_string_lossy(), 0);
        config.feed_capacity = capacity;
        let state = ServerState::initialize(&config).await;
        let router = ladle_server::api::app(state.clone());
        Self {
            state,
            router,
            _data_dir: data_dir,
        }
    }

    fn transport(&self, user: &str, household: &str) -> Arc<dyn PlanTransport> {
        let feed = self.state.service.broadcaster().sender_for(household);
        Arc::new(LocalTransport::new(self.router.clone(), feed, user))
    }

    async fn session(&self, user: &str) -> PlanSession {
        PlanSession::open(self.transport(user, "casa-verde"), week())
            .await
            .unwrap()
    }
}

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

fn week() -> PlanRange {
    PlanRange::new(d(2), d(8)).unwrap()
}

fn note(day: u32, slot: MealSlot, title: &str) -> CreateEntryRequest {
    CreateEntryRequest {
        date: d(day),
        slot,
        kind: EntryKind::Note,
        recipe_id: None,
        title: Some(title.to_string()),
    }
}

fn bucket_orders(session: &PlanSession, day: u32, slot: MealSlot) -> Vec<u32> {
    session
        .entries()
        .into_iter()
        .filter(|view| view.entry.date == d(day) && view.entry.slot == slot)
        .map(|view| view.entry.sort_order)
        .collect()
}

#[tokio::test]
async fn test_created_entries_append_densely() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;

    let a = alice
        .create(&note(2, MealSlot::Evening, "stew"))
        .await
        .unwrap();
    let b = alice
        .create(&note(2, MealSlot::Evening, "salad"))
        .await
        .unwrap();
    let c = alice
        .create(&note(2, MealSlot::Evening, "bread"))
        .await
        .unwrap();
    alice.refetch().await.unwrap();

    assert_eq!(
        alice.bucket_ids(d(2), MealSlot::Evening),
        vec![a.id, b.id, c.id]
    );
    assert_eq!(bucket_orders(&alice, 2, MealSlot::Evening), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_move_mirrors_locally_and_commits() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;

    let a = alice
        .create(&note(2, MealSlot::Evening, "stew"))
        .await
        .unwrap();
    let b = alice
        .create(&note(2, MealSlot::Evening, "salad"))
        .await
        .unwrap();
    let c = alice
        .create(&note(2, MealSlot::Evening, "bread"))
        .await
        .unwrap();
    alice.refetch().await.unwrap();

    let receipt = alice
        .move_entry(&c.id, d(2), MealSlot::Evening, 0)
        .await
        .unwrap();
    assert!(receipt.moved);

    // the speculative mirror already shows the committed order
    let expected = vec![c.id.clone(), a.id.clone(), b.id.clone()];
    assert_eq!(alice.bucket_ids(d(2), MealSlot::Evening), expected);

    // a fresh session reads the same order back from the store
    let bob = harness.session("bob").await;
    assert_eq!(bob.bucket_ids(d(2), MealSlot::Evening), expected);
    assert_eq!(bucket_orders(&bob, 2, MealSlot::Evening), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_overlong_index_clamps_to_tail() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;

    let a = alice
        .create(&note(2, MealSlot::Evening, "stew"))
        .await
        .unwrap();
    let b = alice
        .create(&note(2, MealSlot::Evening, "salad"))
        .await
        .unwrap();
    let c = alice
        .create(&note(2, MealSlot::Evening, "bread"))
        .await
        .unwrap();
    alice.refetch().await.unwrap();

    let receipt = alice
        .move_entry(&a.id, d(2), MealSlot::Evening, 9_999)
        .await
        .unwrap();
    assert!(receipt.moved);

    let bob = harness.session("bob").await;
    assert_eq!(
        bob.bucket_ids(d(2), MealSlot::Evening),
        vec![b.id, c.id, a.id]
    );
    assert_eq!(bucket_orders(&bob, 2, MealSlot::Evening), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_in_place_move_commits_nothing() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;

    let a = alice
        .create(&note(2, MealSlot::Morning, "porridge"))
        .await
        .unwrap();
    alice
        .create(&note(2, MealSlot::Morning, "toast"))
        .await
        .unwrap();
    alice.refetch().await.unwrap();

    let receipt = alice
        .move_entry(&a.id, d(2), MealSlot::Morning, 0)
        .await
        .unwrap();
    assert!(receipt.success);
    assert!(!receipt.moved);
}

#[tokio::test]
async fn test_cross_bucket_move_compacts_both_buckets() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;

    let a = alice
        .create(&note(2, MealSlot::Evening, "stew"))
        .await
        .unwrap();
    let b = alice
        .create(&note(2, MealSlot::Evening, "salad"))
        .await
        .unwrap();
    let c = alice
        .create(&note(2, MealSlot::Evening, "bread"))
        .await
        .unwrap();
    let x = alice
        .create(&note(3, MealSlot::Morning, "eggs"))
        .await
        .unwrap();
    alice.refetch().await.unwrap();

    alice
        .move_entry(&b.id, d(3), MealSlot::Morning, 0)
        .await
        .unwrap();

    let bob = harness.session("bob").await;
    assert_eq!(bob.bucket_ids(d(2), MealSlot::Evening), vec![a.id, c.id]);
    assert_eq!(bob.bucket_ids(d(3), MealSlot::Morning), vec![b.id, x.id]);
    assert_eq!(bucket_orders(&bob, 2, MealSlot::Evening), vec![0, 1]);
    assert_eq!(bucket_orders(&bob, 3, MealSlot::Morning), vec![0, 1]);
}

#[tokio::test]
async fn test_delete_compacts_and_repeat_is_benign() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;

    let a = alice
        .create(&note(2, MealSlot::Midday, "soup"))
        .await
        .unwrap();
    let b = alice
        .create(&note(2, MealSlot::Midday, "rice"))
        .await
        .unwrap();
    let c = alice
        .create(&note(2, MealSlot::Midday, "tea"))
        .await
        .unwrap();
    alice.refetch().await.unwrap();

    let receipt = alice.delete(&b.id).await.unwrap();
    assert!(receipt.success);
    assert_eq!(
        alice.bucket_ids(d(2), MealSlot::Midday),
        vec![a.id.clone(), c.id.clone()]
    );

    // deleting an already-gone entry succeeds quietly
    let receipt = alice.delete(&b.id).await.unwrap();
    assert!(receipt.success);

    let bob = harness.session("bob").await;
    assert_eq!(bob.bucket_ids(d(2), MealSlot::Midday), vec![a.id, c.id]);
    assert_eq!(bucket_orders(&bob, 2, MealSlot::Midday), vec![0, 1]);
}

#[tokio::test]
async fn test_kind_payload_mismatch_is_rejected() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;

    let mut bad = note(2, MealSlot::Evening, "note with recipe");
    bad.recipe_id = Some("tomato-soup".to_string());
    match alice.create(&bad).await.unwrap_err() {
        ClientError::Api { code, .. } => assert_eq!(code, "E0002"),
        other => panic!("unexpected error: {:?}", other),
    }

    let recipeless = CreateEntryRequest {
        date: d(2),
        slot: MealSlot::Evening,
        kind: EntryKind::Recipe,
        recipe_id: None,
        title: None,
    };
    match alice.create(&recipeless).await.unwrap_err() {
        ClientError::Api { code, .. } => assert_eq!(code, "E0002"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_identity_and_household_boundaries() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;
    let id = alice
        .create(&note(2, MealSlot::Evening, "stew"))
        .await
        .unwrap()
        .id;

    // carol's household sees none of casa-verde's entries
    let carol = PlanSession::open(harness.transport("carol", "loft-9"), week())
        .await
        .unwrap();
    assert!(carol.entries().is_empty());

    // and may not touch them even knowing an id
    match carol.delete(&id).await.unwrap_err() {
        ClientError::Api { code, .. } => assert_eq!(code, "E2001"),
        other => panic!("unexpected error: {:?}", other),
    }

    // an unknown user is rejected by the identity middleware
    let stranger = PlanSession::open(harness.transport("stranger", "casa-verde"), week()).await;
    match stranger.unwrap_err() {
        ClientError::Api { code, .. } => assert_eq!(code, "E3001"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_household_sessions_converge_over_the_feed() {
    let harness = Harness::start().await;
    let mut alice = harness.session("alice").await;
    let mut bob = harness.session("bob").await;
    alice.connect_feed().await.unwrap();
    bob.connect_feed().await.unwrap();

    // a create reaches every session, the originator included
    let stew = alice
        .create(&note(2, MealSlot::Evening, "stew"))
        .await
        .unwrap();
    let event = alice.apply_next().await.unwrap();
    assert_eq!(event.event_type, PlanEventType::EntryCreated);
    bob.apply_next().await.unwrap();
    assert_eq!(
        bob.bucket_ids(d(2), MealSlot::Evening),
        vec![stew.id.clone()]
    );

    let salad = bob
        .create(&note(2, MealSlot::Evening, "salad"))
        .await
        .unwrap();
    alice.apply_next().await.unwrap();
    bob.apply_next().await.unwrap();

    // bob reorders; alice converges on the event's position lists
    bob.move_entry(&salad.id, d(2), MealSlot::Evening, 0)
        .await
        .unwrap();
    let event = alice.apply_next().await.unwrap();
    assert_eq!(event.event_type, PlanEventType::EntryMoved);
    bob.apply_next().await.unwrap();

    let expected = vec![salad.id.clone(), stew.id.clone()];
    assert_eq!(alice.bucket_ids(d(2), MealSlot::Evening), expected);
    assert_eq!(bob.bucket_ids(d(2), MealSlot::Evening), expected);

    // and a delete compacts both caches
    bob.delete(&stew.id).await.unwrap();
    let event = alice.apply_next().await.unwrap();
    assert_eq!(event.event_type, PlanEventType::EntryDeleted);
    bob.apply_next().await.unwrap();

    assert_eq!(alice.bucket_ids(d(2), MealSlot::Evening), vec![salad.id]);
    assert_eq!(bucket_orders(&alice, 2, MealSlot::Evening), vec![0]);
    assert_eq!(
        alice.bucket_ids(d(2), MealSlot::Evening),
        bob.bucket_ids(d(2), MealSlot::Evening)
    );
}

#[tokio::test]
async fn test_drag_gesture_collapses_to_one_move() {
    let harness = Harness::start().await;
    let alice = harness.session("alice").await;

    let a = alice
        .create(&note(2, MealSlot::Evening, "stew"))
        .await
        .unwrap();
    let b = alice
        .create(&note(2, MealSlot::Evening, "salad"))
        .await
        .unwrap();
    let c = alice
        .create(&note(2, MealSlot::Evening, "bread"))
        .await
        .unwrap();
    alice.refetch().await.unwrap();

    // hover across buckets, settle back above the first entry
    let mut drag = DragSession::new();
    assert!(alice.begin_drag(&mut drag, &c.id));
    drag.drag_over(d(3), MealSlot::Morning, None, HoverPosition::Below);
    drag.drag_over(
        d(2),
        MealSlot::Evening,
        Some(a.id.as_str()),
        HoverPosition::Above,
    );
    let receipt = alice.complete_drag(&mut drag).await.unwrap().unwrap();
    assert!(receipt.moved);

    let bob = harness.session("bob").await;
    assert_eq!(
        bob.bucket_ids(d(2), MealSlot::Evening),
        vec![c.id, a.id, b.id]
    );
}

#[tokio::test]
async fn test_update_completes_over_the_feed() {
    let harness = Harness::start().await;
    let mut alice = harness.session("alice").await;
    let id = alice
        .create(&note(2, MealSlot::Midday, "draft"))
        .await
        .unwrap()
        .id;
    alice.refetch().await.unwrap();
    alice.connect_feed().await.unwrap();

    let receipt = alice.update_title(&id, "final").await.unwrap();
    assert!(receipt.success);

    let event = alice.apply_next().await.unwrap();
    assert_eq!(event.event_type, PlanEventType::EntryUpdated);
    let entries = alice.entries();
    assert_eq!(entries[0].entry.title.as_deref(), Some("final"));
}

#[tokio::test]
async fn test_failed_update_converges_back() {
    let harness = Harness::start().await;
    let mut alice = harness.session("alice").await;
    let id = alice
        .create(&CreateEntryRequest {
            date: d(2),
            slot: MealSlot::Evening,
            kind: EntryKind::Recipe,
            recipe_id: Some("tomato-soup".to_string()),
            title: None,
        })
        .await
        .unwrap()
        .id;
    alice.refetch().await.unwrap();
    alice.connect_feed().await.unwrap();

    // only notes can be retitled, but the receipt just acknowledges;
    // the rejection arrives later over the feed
    let receipt = alice.update_title(&id, "renamed").await.unwrap();
    assert!(receipt.success);
    assert_eq!(alice.entries()[0].entry.title.as_deref(), Some("renamed"));

    let event = alice.apply_next().await.unwrap();
    assert_eq!(event.event_type, PlanEventType::UpdateFailed);

    // the triggered refetch rolled the speculative title back
    let entries = alice.entries();
    assert_eq!(entries[0].entry.title, None);
    assert_eq!(entries[0].recipe.as_ref().unwrap().name, "Tomato Soup");
}

#[tokio::test]
async fn test_lagged_feed_refetches_and_stays_usable() {
    let harness = Harness::start_with_feed_capacity(2).await;
    let alice = harness.session("alice").await;
    let mut bob = harness.session("bob").await;
    bob.connect_feed().await.unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let dish = format!("dish {}", i);
        ids.push(
            alice
                .create(&note(2, MealSlot::Evening, &dish))
                .await
                .unwrap()
                .id,
        );
    }

    // capacity 2 dropped the oldest events; the session refetches first
    let err = bob.apply_next().await.unwrap_err();
    assert!(err.is_lag());
    assert_eq!(bob.bucket_ids(d(2), MealSlot::Evening), ids);

    // the stream keeps serving the retained events afterwards
    let event = bob.apply_next().await.unwrap();
    assert_eq!(event.event_type, PlanEventType::EntryCreated);
    assert_eq!(bob.bucket_ids(d(2), MealSlot::Evening), ids);
}

#[tokio::test]
async fn test_health_and_missing_identity() {
    use tower::ServiceExt;

    let harness = Harness::start().await;

    let response = harness
        .router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    // plan routes reject requests without the identity header
    let response = harness
        .router
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/api/plan?start=2026-03-02&end=2026-03-08")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let envelope: shared::ApiEnvelope<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope.code, "E3001");
}
