use serde_json::json;
use signage_core::{
    Call, DescriptionService, DescriptionStatus, EntityRepository, Event, InMemoryTransport,
    Persistable, Profile, RelativeTimeline, Widget, Zone,
};
use std::sync::Arc;
use uuid::Uuid;

fn store() -> (Arc<InMemoryTransport>, EntityRepository) {
    let transport = Arc::new(InMemoryTransport::new());
    let repo = EntityRepository::new(transport.clone());
    (transport, repo)
}

async fn zone_with_widget(repo: &EntityRepository, name: &str) -> Zone {
    let mut widget = Widget::new(format!("{name}-clock"), "clock");
    repo.create(&mut widget).await.unwrap();
    let mut call = Call::new(format!("{name}-call"));
    repo.create(&mut call).await.unwrap();
    call.set_widget(repo, &mut widget).await.unwrap();
    let mut zone = Zone::new(name, 960, 1080);
    repo.create(&mut zone).await.unwrap();
    zone.set_call(repo, &mut call).await.unwrap();
    zone
}

#[tokio::test]
async fn entity_request_returns_expanded_description() {
    let (_transport, repo) = store();
    let zone = zone_with_widget(&repo, "left").await;
    let zone_id = zone.require_id().unwrap().to_string();
    let service = DescriptionService::new(repo);

    let envelopes = service
        .handle("RetrieveZoneDescription", &json!({ "zoneId": zone_id }))
        .await;

    assert_eq!(envelopes.len(), 1);
    let envelope = &envelopes[0];
    assert_eq!(envelope.event, "ZoneDescription");
    assert_eq!(envelope.status, DescriptionStatus::Ok);
    assert_eq!(envelope.data["id"], json!(zone_id));
    assert_eq!(envelope.data["call"]["name"], "left-call");
}

#[tokio::test]
async fn envelope_serializes_with_lowercase_status() {
    let (_transport, repo) = store();
    let zone = zone_with_widget(&repo, "left").await;
    let service = DescriptionService::new(repo);

    let envelopes = service
        .handle(
            "RetrieveZoneDescription",
            &json!({ "zoneId": zone.require_id().unwrap().to_string() }),
        )
        .await;

    let wire = serde_json::to_value(&envelopes[0]).unwrap();
    assert_eq!(wire["status"], "ok");
    assert_eq!(wire["event"], "ZoneDescription");
}

#[tokio::test]
async fn failures_are_reported_as_error_envelopes() {
    let (_transport, repo) = store();
    let service = DescriptionService::new(repo);

    let unknown = service.handle("RetrieveScreenDescription", &json!({})).await;
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].status, DescriptionStatus::Error);

    let missing_key = service.handle("RetrieveCallDescription", &json!({})).await;
    assert_eq!(missing_key[0].event, "CallDescription");
    assert!(!missing_key[0].is_ok());

    let missing_row = service
        .handle(
            "RetrieveCallDescription",
            &json!({ "callId": Uuid::new_v4().to_string() }),
        )
        .await;
    assert_eq!(missing_row[0].status, DescriptionStatus::Error);
    assert!(missing_row[0].data["message"]
        .as_str()
        .unwrap()
        .contains("not found"));
}

#[tokio::test]
async fn hash_description_emits_profile_and_zone_content() {
    let (_transport, repo) = store();
    let mut profile = Profile::new("lobby");
    repo.create(&mut profile).await.unwrap();
    let mut left = zone_with_widget(&repo, "left").await;
    let mut right = zone_with_widget(&repo, "right").await;
    profile.add_zone(&repo, &mut left).await.unwrap();
    profile.add_zone(&repo, &mut right).await.unwrap();
    let service = DescriptionService::new(repo);

    let envelopes = service
        .handle(
            "RetrieveHashDescription",
            &json!({ "profileId": profile.require_id().unwrap().to_string() }),
        )
        .await;

    assert_eq!(envelopes.len(), 2);
    assert_eq!(envelopes[0].event, "ProfileDescription");
    assert_eq!(
        envelopes[0].data["zones"],
        json!([
            left.require_id().unwrap().to_string(),
            right.require_id().unwrap().to_string()
        ])
    );

    assert_eq!(envelopes[1].event, "ZoneContentDescription");
    let contents = envelopes[1].data.as_array().unwrap();
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0]["name"], "left");
    assert_eq!(contents[0]["call"]["widget"]["name"], "left-clock");
    assert_eq!(contents[1]["call"]["name"], "right-call");
}

#[tokio::test]
async fn hash_description_of_a_missing_profile_is_one_error_envelope() {
    let (_transport, repo) = store();
    let service = DescriptionService::new(repo);

    let envelopes = service
        .handle(
            "RetrieveHashDescription",
            &json!({ "profileId": Uuid::new_v4().to_string() }),
        )
        .await;

    assert_eq!(envelopes.len(), 1);
    assert_eq!(envelopes[0].event, "HashDescription");
    assert_eq!(envelopes[0].status, DescriptionStatus::Error);
}

#[tokio::test]
async fn zone_content_reaches_timeline_events_and_stops_at_their_calls() {
    let (_transport, repo) = store();
    let mut clock = Widget::new("clock", "clock");
    repo.create(&mut clock).await.unwrap();
    let mut shared = Call::new("shared");
    repo.create(&mut shared).await.unwrap();
    shared.set_widget(&repo, &mut clock).await.unwrap();

    let mut timeline = RelativeTimeline::new("morning");
    repo.create(&mut timeline).await.unwrap();
    let mut intro = Event::new("intro", 0, 5_000);
    repo.create(&mut intro).await.unwrap();
    intro.set_call(&repo, &mut shared).await.unwrap();
    timeline.add_event(&repo, &mut intro).await.unwrap();

    let mut playlist = Call::new("playlist");
    repo.create(&mut playlist).await.unwrap();
    playlist
        .set_relative_timeline(&repo, &mut timeline)
        .await
        .unwrap();
    let mut zone = Zone::new("main", 1920, 1080);
    repo.create(&mut zone).await.unwrap();
    zone.set_call(&repo, &mut playlist).await.unwrap();
    let mut profile = Profile::new("lobby");
    repo.create(&mut profile).await.unwrap();
    profile.add_zone(&repo, &mut zone).await.unwrap();
    let service = DescriptionService::new(repo);

    let envelopes = service
        .handle(
            "RetrieveHashDescription",
            &json!({ "profileId": profile.require_id().unwrap().to_string() }),
        )
        .await;

    assert_eq!(envelopes.len(), 2);
    let content = &envelopes[1].data[0];
    let timeline_json = &content["call"]["relativeTimeline"];
    assert_eq!(timeline_json["name"], "morning");
    assert_eq!(timeline_json["events"][0]["name"], "intro");
    assert_eq!(
        timeline_json["events"][0]["call"],
        json!(shared.require_id().unwrap().to_string())
    );
    assert_eq!(content["call"]["absoluteTimeline"], serde_json::Value::Null);
}
