use signage_core::{
    delete_entity, AbsoluteTimeline, Call, EntityRepository, Event, InMemoryTransport, Method,
    Persistable, Profile, RelativeTimeline, RepoError, Widget, Zone,
};
use std::sync::Arc;

fn store() -> (Arc<InMemoryTransport>, EntityRepository) {
    let transport = Arc::new(InMemoryTransport::new());
    let repo = EntityRepository::new(transport.clone());
    (transport, repo)
}

fn delete_paths(transport: &InMemoryTransport) -> Vec<String> {
    transport
        .requests()
        .into_iter()
        .filter(|request| request.method == Method::Delete)
        .map(|request| request.path)
        .collect()
}

async fn timeline_with_events(repo: &EntityRepository, count: usize) -> RelativeTimeline {
    let mut call = Call::new("shared");
    repo.create(&mut call).await.unwrap();
    let mut timeline = RelativeTimeline::new("morning");
    repo.create(&mut timeline).await.unwrap();
    for index in 0..count {
        let mut event = Event::new(format!("event-{index}"), 0, 1_000);
        repo.create(&mut event).await.unwrap();
        event.set_call(repo, &mut call).await.unwrap();
        timeline.add_event(repo, &mut event).await.unwrap();
    }
    timeline
}

#[tokio::test]
async fn owned_children_are_deleted_before_the_parent() {
    let (transport, repo) = store();
    let timeline = timeline_with_events(&repo, 2).await;
    let id = timeline.require_id().unwrap();
    let source: RelativeTimeline = repo.read(id).await.unwrap();
    transport.clear_requests();

    delete_entity(source, &repo).await.unwrap();

    let deletes = delete_paths(&transport);
    assert_eq!(deletes.len(), 3);
    assert!(deletes[0].starts_with("events/"));
    assert!(deletes[1].starts_with("events/"));
    assert_eq!(deletes[2], format!("relative_timelines/{id}"));
    assert_eq!(transport.row_count("events"), 0);
    assert_eq!(transport.row_count("calls"), 1);
}

#[tokio::test]
async fn entity_without_owned_children_issues_one_delete() {
    let (transport, repo) = store();
    let timeline = timeline_with_events(&repo, 0).await;
    transport.clear_requests();

    delete_entity(timeline, &repo).await.unwrap();

    assert_eq!(transport.count(Method::Delete), 1);
}

#[tokio::test]
async fn cascade_follows_ownership_through_the_whole_graph() {
    let (transport, repo) = store();
    let mut timeline = timeline_with_events(&repo, 2).await;
    let mut call = Call::new("playlist");
    repo.create(&mut call).await.unwrap();
    call.set_relative_timeline(&repo, &mut timeline).await.unwrap();

    let mut overlay = Widget::new("logo", "image");
    repo.create(&mut overlay).await.unwrap();
    let mut zone = Zone::new("main", 1920, 1080);
    repo.create(&mut zone).await.unwrap();
    zone.set_call(&repo, &mut call).await.unwrap();
    zone.set_overlay(&repo, &mut overlay).await.unwrap();

    let mut profile = Profile::new("lobby");
    repo.create(&mut profile).await.unwrap();
    profile.add_zone(&repo, &mut zone).await.unwrap();
    let profile: Profile = repo.read(profile.require_id().unwrap()).await.unwrap();

    delete_entity(profile, &repo).await.unwrap();

    assert_eq!(transport.row_count("profiles"), 0);
    assert_eq!(transport.row_count("zones"), 0);
    assert_eq!(transport.row_count("relative_timelines"), 0);
    assert_eq!(transport.row_count("events"), 0);
    // "shared" is referenced by the events; "playlist" was owned by the zone.
    assert_eq!(transport.row_count("calls"), 1);
    assert_eq!(transport.row_count("widgets"), 1);
}

#[tokio::test]
async fn failed_cascade_keeps_the_parent_row() {
    let (transport, repo) = store();
    let timeline = timeline_with_events(&repo, 2).await;
    let id = timeline.require_id().unwrap();
    transport.fail_on(Method::Delete, "events/");

    let err = delete_entity(timeline, &repo).await.unwrap_err();

    assert!(matches!(err, RepoError::Transport(_)));
    assert!(transport.row("relative_timelines", &id.to_string()).is_some());
}

#[tokio::test]
async fn transient_entity_cannot_be_deleted() {
    let (transport, repo) = store();

    let err = delete_entity(Zone::new("draft", 10, 10), &repo)
        .await
        .unwrap_err();

    assert!(err.as_model().is_some());
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn deleting_a_call_removes_its_absolute_timeline_and_events() {
    let (transport, repo) = store();
    let mut shared = Call::new("shared");
    repo.create(&mut shared).await.unwrap();
    let mut timeline = AbsoluteTimeline::new("opening hours");
    repo.create(&mut timeline).await.unwrap();
    let mut opening = Event::new("opening", 0, 60_000);
    repo.create(&mut opening).await.unwrap();
    opening.set_call(&repo, &mut shared).await.unwrap();
    timeline.add_event(&repo, &mut opening).await.unwrap();

    let mut schedule = Call::new("schedule");
    repo.create(&mut schedule).await.unwrap();
    schedule
        .set_absolute_timeline(&repo, &mut timeline)
        .await
        .unwrap();
    let schedule: Call = repo.read(schedule.require_id().unwrap()).await.unwrap();
    transport.clear_requests();

    delete_entity(schedule, &repo).await.unwrap();

    let deletes = delete_paths(&transport);
    assert_eq!(deletes.len(), 3);
    assert!(deletes[0].starts_with("events/"));
    assert!(deletes[1].starts_with("absolute_timelines/"));
    assert!(deletes[2].starts_with("calls/"));
    assert_eq!(transport.row_count("absolute_timelines"), 0);
    assert_eq!(transport.row_count("events"), 0);
    assert_eq!(transport.row_count("calls"), 1);
}
