use std::sync::Arc;

use parking_lot::Mutex;

use crate::test_utils::add;
use crate::test_utils::delete;
use crate::test_utils::update;
use crate::test_utils::RecordingHandler;
use crate::test_utils::TestObject;
use crate::EventHandler;
use crate::EventHandlerFns;
use crate::FilteringHandler;
use crate::WatchEvent;

fn obj(
    name: &str,
    version: u64,
    labels: &[&str],
) -> Arc<TestObject> {
    Arc::new(TestObject::new("ns", name, version).with_labels(labels))
}

#[test]
fn test_handle_routes_each_kind() {
    let recorder = RecordingHandler::new();
    let a1 = obj("a", 1, &[]);
    let a2 = obj("a", 2, &[]);

    recorder.handle(&WatchEvent::Add {
        item: a1.clone(),
        is_initial_list: true,
    });
    recorder.handle(&WatchEvent::Update {
        old: a1,
        new: a2.clone(),
    });
    recorder.handle(&WatchEvent::Delete { item: a2 });

    assert_eq!(
        recorder.seen(),
        vec![add("ns/a", true), update("ns/a", 1, 2), delete("ns/a")]
    );
}

#[test]
fn test_event_handler_fns_ignores_unset_callbacks() {
    let added = Arc::new(Mutex::new(Vec::new()));
    let sink = added.clone();
    let handler = EventHandlerFns::new().on_add(move |item: &Arc<TestObject>, initial| {
        sink.lock().push((item.name.clone(), initial));
    });

    // the builder methods shadow the trait methods of the same name
    EventHandler::on_add(&handler, &obj("a", 1, &[]), false);
    EventHandler::on_update(&handler, &obj("a", 1, &[]), &obj("a", 2, &[]));
    EventHandler::on_delete(&handler, &obj("a", 2, &[]));

    assert_eq!(*added.lock(), vec![("a".to_string(), false)]);
}

#[test]
fn test_filtering_handler_translates_updates() {
    let recorder = RecordingHandler::new();
    let filter = FilteringHandler::new(|o: &TestObject| o.labels.iter().any(|l| l == "bound"), recorder.clone());

    filter.on_add(&obj("a", 1, &[]), true);
    filter.on_add(&obj("b", 1, &["bound"]), true);
    // moves in
    filter.on_update(&obj("a", 1, &[]), &obj("a", 2, &["bound"]));
    // stays in
    filter.on_update(&obj("a", 2, &["bound"]), &obj("a", 3, &["bound"]));
    // moves out
    filter.on_update(&obj("b", 1, &["bound"]), &obj("b", 2, &[]));
    // stays out
    filter.on_update(&obj("c", 1, &[]), &obj("c", 2, &[]));
    filter.on_delete(&obj("c", 2, &[]));
    filter.on_delete(&obj("a", 3, &["bound"]));

    assert_eq!(
        recorder.seen(),
        vec![
            add("ns/b", true),
            add("ns/a", false),
            update("ns/a", 2, 3),
            delete("ns/b"),
            delete("ns/a"),
        ]
    );
}
