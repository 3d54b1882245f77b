use signage_core::engine::association::load_one;
use signage_core::engine::clone::{clone_owned_many, clone_owned_one, relink_one};
use signage_core::engine::lifecycle::{cascade_many, cascade_one};
use signage_core::{
    Call, Cardinality, EntityKind, EntityRepository, Event, InMemoryTransport, ModelError,
    Ownership, Persistable, Profile, Relation, Slot, Widget, Zone,
};
use std::sync::Arc;

fn store() -> (Arc<InMemoryTransport>, EntityRepository) {
    let transport = Arc::new(InMemoryTransport::new());
    let repo = EntityRepository::new(transport.clone());
    (transport, repo)
}

/// Event referencing a shared call, plus a blank event to clone into.
async fn event_with_call(repo: &EntityRepository) -> (Event, Event) {
    let mut call = Call::new("shared");
    repo.create(&mut call).await.unwrap();
    let mut event = Event::new("intro", 0, 1_000);
    repo.create(&mut event).await.unwrap();
    event.set_call(repo, &mut call).await.unwrap();
    let mut target = Event::new("copy", 0, 1_000);
    repo.create(&mut target).await.unwrap();
    (event, target)
}

async fn profile_with_zone(repo: &EntityRepository) -> (Profile, Profile) {
    let mut zone = Zone::new("main", 1920, 1080);
    repo.create(&mut zone).await.unwrap();
    let mut profile = Profile::new("lobby");
    repo.create(&mut profile).await.unwrap();
    profile.add_zone(repo, &mut zone).await.unwrap();
    let mut target = Profile::new("copy");
    repo.create(&mut target).await.unwrap();
    (profile, target)
}

fn referenced_zones() -> Relation {
    Relation::many(
        "zones",
        EntityKind::Profile,
        EntityKind::Zone,
        Ownership::Referenced,
    )
}

fn is_ownership_mismatch(err: &signage_core::RepoError, expected: Ownership) -> bool {
    matches!(
        err.as_model(),
        Some(ModelError::OwnershipMismatch { expected: found, .. }) if *found == expected
    )
}

#[tokio::test]
async fn owned_clone_of_a_referenced_target_is_rejected_before_any_request() {
    let (transport, repo) = store();
    let (event, target) = event_with_call(&repo).await;
    transport.clear_requests();

    let err = clone_owned_one::<Call>(
        &repo,
        event.require_id().unwrap(),
        target.require_id().unwrap(),
        Event::CALL,
        &mut Slot::unknown(),
        &mut Slot::unknown(),
    )
    .await
    .unwrap_err();

    assert!(is_ownership_mismatch(&err, Ownership::Owned));
    assert_eq!(transport.request_count(), 0);
    assert_eq!(transport.row_count("calls"), 1);
}

#[tokio::test]
async fn owned_collection_clone_rejects_a_referenced_relation() {
    let (transport, repo) = store();
    let (profile, target) = profile_with_zone(&repo).await;
    transport.clear_requests();

    let err = clone_owned_many::<Zone>(
        &repo,
        profile.require_id().unwrap(),
        target.require_id().unwrap(),
        referenced_zones(),
        &mut Slot::unknown(),
        &mut Slot::unknown(),
    )
    .await
    .unwrap_err();

    assert!(is_ownership_mismatch(&err, Ownership::Owned));
    assert_eq!(transport.request_count(), 0);
    assert_eq!(transport.row_count("zones"), 1);
}

#[tokio::test]
async fn relinking_an_owned_child_is_rejected() {
    let (transport, repo) = store();
    let mut call = Call::new("loop");
    repo.create(&mut call).await.unwrap();
    let mut zone = Zone::new("main", 1920, 1080);
    repo.create(&mut zone).await.unwrap();
    zone.set_call(&repo, &mut call).await.unwrap();
    let mut other = Zone::new("copy", 1920, 1080);
    repo.create(&mut other).await.unwrap();
    transport.clear_requests();

    let err = relink_one::<Call>(
        &repo,
        zone.require_id().unwrap(),
        other.require_id().unwrap(),
        Zone::CALL,
        &mut Slot::unknown(),
        &mut Slot::unknown(),
    )
    .await
    .unwrap_err();

    assert!(is_ownership_mismatch(&err, Ownership::Referenced));
    assert_eq!(transport.request_count(), 0);
    assert!(transport
        .linked_ids("zones", &other.require_id().unwrap().to_string(), "calls")
        .is_empty());
}

#[tokio::test]
async fn cascade_never_deletes_through_a_referenced_relation() {
    let (transport, repo) = store();
    let (event, _) = event_with_call(&repo).await;
    let (profile, _) = profile_with_zone(&repo).await;
    transport.clear_requests();

    let one = cascade_one::<Call>(
        &repo,
        event.require_id().unwrap(),
        Event::CALL,
        &mut Slot::unknown(),
    )
    .await
    .unwrap_err();
    let many = cascade_many::<Zone>(
        &repo,
        profile.require_id().unwrap(),
        referenced_zones(),
        &mut Slot::unknown(),
    )
    .await
    .unwrap_err();

    assert!(is_ownership_mismatch(&one, Ownership::Owned));
    assert!(is_ownership_mismatch(&many, Ownership::Owned));
    assert_eq!(transport.request_count(), 0);
    assert_eq!(transport.row_count("calls"), 1);
    assert_eq!(transport.row_count("zones"), 1);
}

#[tokio::test]
async fn collection_relation_cannot_be_loaded_as_one_to_one() {
    let (transport, repo) = store();
    let (profile, _) = profile_with_zone(&repo).await;
    transport.clear_requests();

    let err = load_one::<Zone>(
        &repo,
        profile.require_id().unwrap(),
        Profile::ZONES,
        &mut Slot::unknown(),
    )
    .await
    .err()
    .unwrap();

    assert_eq!(
        err.as_model(),
        Some(&ModelError::CardinalityMismatch {
            relation: "zones",
            expected: Cardinality::One,
        })
    );
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn shared_widget_survives_owner_level_helpers() {
    let (transport, repo) = store();
    let mut widget = Widget::new("clock", "clock");
    repo.create(&mut widget).await.unwrap();
    let mut call = Call::new("loop");
    repo.create(&mut call).await.unwrap();
    call.set_widget(&repo, &mut widget).await.unwrap();

    let err = cascade_one::<Widget>(
        &repo,
        call.require_id().unwrap(),
        Call::WIDGET,
        &mut Slot::unknown(),
    )
    .await
    .unwrap_err();

    assert!(is_ownership_mismatch(&err, Ownership::Owned));
    assert_eq!(transport.row_count("widgets"), 1);
}
