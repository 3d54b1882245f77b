use serde_json::{json, Value};
use signage_core::{
    to_expanded, Call, EntityRepository, Event, ExpandOptions, InMemoryTransport, Persistable,
    RelativeTimeline, RepoError, Serializable, Widget, Zone,
};
use std::sync::Arc;

fn store() -> (Arc<InMemoryTransport>, EntityRepository) {
    let transport = Arc::new(InMemoryTransport::new());
    let repo = EntityRepository::new(transport.clone());
    (transport, repo)
}

/// Zone -> call -> widget, plus an overlay widget.
async fn furnished_zone(repo: &EntityRepository) -> (Zone, Call, Widget) {
    let mut widget = Widget::new("clock", "clock");
    repo.create(&mut widget).await.unwrap();
    let mut call = Call::new("loop");
    repo.create(&mut call).await.unwrap();
    call.set_widget(repo, &mut widget).await.unwrap();

    let mut zone = Zone::new("main", 1920, 1080);
    repo.create(&mut zone).await.unwrap();
    zone.set_call(repo, &mut call).await.unwrap();
    (zone, call, widget)
}

#[tokio::test]
async fn flat_projection_round_trips() {
    let (_transport, repo) = store();
    let mut zone = Zone::new("main", 1920, 1080);
    zone.fields.x = 40;
    repo.create(&mut zone).await.unwrap();

    let flat = zone.to_flat().unwrap();
    let restored = Zone::from_flat(flat.clone()).unwrap();

    assert_eq!(restored.to_flat().unwrap(), flat);
    assert_eq!(restored.fields, zone.fields);
    assert_eq!(flat["id"], json!(zone.require_id().unwrap().to_string()));
    assert_eq!(flat["x"], json!(40));
    assert!(flat.get("createdAt").is_some());
    assert_eq!(flat["complete"], json!(false));
}

#[test]
fn flat_projection_has_no_association_keys() {
    let event = Event::new("intro", 0, 5_000);
    let flat = event.to_flat().unwrap();
    assert!(flat.get("call").is_none());
    assert!(flat.get("origin").is_none());
    assert_eq!(flat["durationMs"], json!(5_000));
}

#[test]
fn from_flat_rejects_non_objects() {
    let err = Zone::from_flat(json!(["not", "a", "row"])).err().unwrap();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[tokio::test]
async fn default_expansion_renders_one_layer_of_flat_rows() {
    let (_transport, repo) = store();
    let (zone, call, _widget) = furnished_zone(&repo).await;
    let mut reloaded: Zone = repo.read(zone.require_id().unwrap()).await.unwrap();

    let expanded = to_expanded(&mut reloaded, &repo, ExpandOptions::default())
        .await
        .unwrap();

    assert_eq!(expanded["name"], "main");
    assert_eq!(expanded["call"]["id"], json!(call.require_id().unwrap().to_string()));
    assert_eq!(expanded["call"]["name"], "loop");
    assert!(expanded["call"].get("widget").is_none());
    assert_eq!(expanded["overlay"], Value::Null);
}

#[tokio::test]
async fn ids_only_truncates_the_last_layer() {
    let (_transport, repo) = store();
    let (zone, call, widget) = furnished_zone(&repo).await;
    let mut reloaded: Zone = repo.read(zone.require_id().unwrap()).await.unwrap();

    let shallow = to_expanded(&mut reloaded, &repo, ExpandOptions::ids_only())
        .await
        .unwrap();
    assert_eq!(shallow["call"], json!(call.require_id().unwrap().to_string()));

    let deep = to_expanded(&mut reloaded, &repo, ExpandOptions::ids_only().with_depth(2))
        .await
        .unwrap();
    assert_eq!(deep["call"]["name"], "loop");
    assert_eq!(
        deep["call"]["widget"],
        json!(widget.require_id().unwrap().to_string())
    );
    assert_eq!(deep["call"]["relativeTimeline"], Value::Null);
}

#[tokio::test]
async fn zero_depth_is_the_flat_row() {
    let (_transport, repo) = store();
    let (mut zone, _call, _widget) = furnished_zone(&repo).await;

    let expanded = to_expanded(&mut zone, &repo, ExpandOptions::default().with_depth(0))
        .await
        .unwrap();
    assert_eq!(expanded, zone.to_flat().unwrap());
}

#[tokio::test]
async fn revisited_entities_render_as_ids() {
    let (_transport, repo) = store();
    let mut call = Call::new("loop");
    repo.create(&mut call).await.unwrap();
    let mut timeline = RelativeTimeline::new("morning");
    repo.create(&mut timeline).await.unwrap();
    let mut event = Event::new("again", 0, 5_000);
    repo.create(&mut event).await.unwrap();
    event.set_call(&repo, &mut call).await.unwrap();
    timeline.add_event(&repo, &mut event).await.unwrap();
    call.set_relative_timeline(&repo, &mut timeline).await.unwrap();

    let event_id = event.require_id().unwrap();
    let mut reloaded: Event = repo.read(event_id).await.unwrap();
    let expanded = to_expanded(&mut reloaded, &repo, ExpandOptions::default().with_depth(10))
        .await
        .unwrap();

    assert_eq!(expanded["call"]["name"], "loop");
    assert_eq!(expanded["call"]["relativeTimeline"]["name"], "morning");
    assert_eq!(
        expanded["call"]["relativeTimeline"]["events"],
        json!([event_id.to_string()])
    );
}
