use bitevent_core::{
    dispatch, events, with_payload, DispatchStatus, EventBus, ListenerRegistry, MiddlewareRegistry,
    QueuedScheduler,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn counting(event: &'static str, hits: &Arc<AtomicUsize>) -> ListenerRegistry<&'static str> {
    let hits = hits.clone();
    ListenerRegistry::new().on(event, move |_| {
        hits.fetch_add(1, Ordering::SeqCst);
    })
}

fn player() -> MiddlewareRegistry<&'static str> {
    MiddlewareRegistry::new()
        .with("play", with_payload())
        .with("pause", with_payload())
}

#[test]
fn test_static_subscriber_receives_scoped_dispatch_once() {
    let (provider, hook, statics) = events(player());
    let _root = provider.mount().unwrap();

    let hits = counter();
    let _sub = statics.subscribe(counting("play", &hits));

    hook.bind_none().dispatch("play", vec![json!("intro")]).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_static_dispatch_reaches_scoped_listeners() {
    let (provider, hook, statics) = events(player());
    let _root = provider.mount().unwrap();

    let hits = counter();
    let _binding = hook.bind(counting("pause", &hits));

    let status = statics.dispatch("pause", vec![]).unwrap();
    assert_eq!(status, DispatchStatus::Delivered(1));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unsubscribing_one_leaves_the_others() {
    let (_, _, statics) = events(player());

    let first = counter();
    let second = counter();
    let sub_first = statics.subscribe(counting("play", &first));
    let _sub_second = statics.subscribe(counting("play", &second));

    sub_first.unsubscribe();
    statics.dispatch("play", vec![]).unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(statics.listener_count(), 1);
}

#[test]
fn test_static_dispatch_with_root_goes_through_scheduler() {
    let scheduler = Arc::new(QueuedScheduler::new());
    let bus = EventBus::builder(player())
        .scheduler(scheduler.clone())
        .build();
    let (provider, _, statics) = bus.split();

    let hits = counter();
    let _sub = statics.subscribe(counting("play", &hits));

    // No root: delivered on the calling thread
    assert_eq!(
        statics.dispatch("play", vec![]).unwrap(),
        DispatchStatus::Delivered(1)
    );

    let _root = provider.mount().unwrap();
    assert_eq!(
        statics.dispatch("play", vec![]).unwrap(),
        DispatchStatus::Scheduled
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    scheduler.run_pending();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_static_panic_is_isolated_then_reraised() {
    let (_, _, statics) = events(player());

    let hits = counter();
    let _faulty =
        statics.subscribe(ListenerRegistry::new().on("play", |_| panic!("subscriber failed")));
    let _healthy = statics.subscribe(counting("play", &hits));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        statics.dispatch("play", vec![])
    }));

    assert!(result.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dispatch_macro_serializes_arguments() {
    let (_, _, statics) = events(player());

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let _sub = statics.subscribe(ListenerRegistry::new().on("play", move |payload| {
        seen_clone.lock().push(payload.clone());
    }));

    dispatch!(statics, "play", vec!["a", "b"]).unwrap();
    assert_eq!(*seen.lock(), vec![json!(["a", "b"])]);
}

#[test]
fn test_unknown_event_from_static_facade() {
    let (_, _, statics) = events(player());
    let err = statics.dispatch("stop", vec![]).unwrap_err();
    assert!(err.is_unknown_event());
}

#[tokio::test]
async fn test_async_receiver_sees_deliveries() {
    let (provider, hook, statics) = events(player());
    let mut receiver = statics.receiver();
    let _root = provider.mount().unwrap();

    hook.bind_none().dispatch("play", vec![json!("intro")]).unwrap();
    statics.dispatch("pause", vec![]).unwrap();

    let first = receiver.recv().await.unwrap();
    assert_eq!(first.event, "play");
    assert_eq!(first.payload, json!("intro"));

    let second = receiver.recv().await.unwrap();
    assert_eq!(second.event, "pause");
}

#[tokio::test]
async fn test_receiver_alone_keeps_static_dispatch_alive() {
    let (_, _, statics) = events(player());
    let mut receiver = statics.receiver();

    let status = statics.dispatch("play", vec![json!(1)]).unwrap();
    assert_eq!(status, DispatchStatus::Delivered(0));

    let record = tokio::spawn(async move { receiver.recv().await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.payload, json!(1));
}
