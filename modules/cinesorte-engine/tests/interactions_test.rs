//! Interaction toggles against the in-memory store: counters, XP, genre
//! affinity and the notifications they emit.

use chrono::{Datelike, Utc};

use cinesorte_common::{MediaType, NotificationKind};
use cinesorte_engine::testing::{Harness, MockCatalog, MockIdentity};
use cinesorte_engine::{InteractionAction, RecordInteraction};
use cinesorte_store::{MemoryStore, SocialStore};

fn toggle(media_id: &str, action: InteractionAction) -> RecordInteraction {
    RecordInteraction {
        media_id: media_id.into(),
        media_type: Some(MediaType::Movie),
        action,
        media_title: Some("Matrix".into()),
        poster_path: None,
    }
}

fn catalog() -> MockCatalog {
    MockCatalog::new().with_genres("603", &[28, 878])
}

#[tokio::test]
async fn watched_twice_restores_counters_but_keeps_xp() {
    let h = Harness::with(MemoryStore::new(), catalog(), MockIdentity::new());
    h.user("ana").await;

    let on = h
        .engine
        .record_interaction("ana", toggle("603", InteractionAction::Watched))
        .await
        .unwrap();
    assert!(on.watched);
    assert!(on.watched_at.is_some());
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert_eq!(ana.watched_count, 1);
    assert_eq!(ana.total_xp, 10);

    let off = h
        .engine
        .record_interaction("ana", toggle("603", InteractionAction::Watched))
        .await
        .unwrap();
    assert!(!off.watched);
    assert!(off.watched_at.is_none());
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert_eq!(ana.watched_count, 0);
    assert_eq!(ana.total_xp, 10);
}

#[tokio::test]
async fn like_and_unlike_cancel_genre_weight() {
    let h = Harness::with(MemoryStore::new(), catalog(), MockIdentity::new());
    h.user("ana").await;

    h.engine
        .record_interaction("ana", toggle("603", InteractionAction::Like))
        .await
        .unwrap();
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert_eq!(ana.genre_counts.get(&28), Some(&3));
    assert_eq!(ana.genre_counts.get(&878), Some(&3));
    assert_eq!(ana.total_xp, 5);

    h.engine
        .record_interaction("ana", toggle("603", InteractionAction::Like))
        .await
        .unwrap();
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert_eq!(ana.genre_counts.get(&28), Some(&0));
    assert_eq!(ana.genre_counts.get(&878), Some(&0));
    assert_eq!(ana.total_xp, 5);
}

#[tokio::test]
async fn like_clears_dislike() {
    let h = Harness::new();
    h.user("ana").await;

    h.engine
        .record_interaction("ana", toggle("603", InteractionAction::Dislike))
        .await
        .unwrap();
    let liked = h
        .engine
        .record_interaction("ana", toggle("603", InteractionAction::Like))
        .await
        .unwrap();
    assert!(liked.liked);
    assert!(!liked.disliked);

    let stored = h.store.get_interaction("ana", "603").await.unwrap().unwrap();
    assert!(stored.liked && !stored.disliked);
}

#[tokio::test]
async fn catalog_failure_does_not_fail_the_toggle() {
    let h = Harness::with(MemoryStore::new(), MockCatalog::failing(), MockIdentity::new());
    h.user("ana").await;

    let record = h
        .engine
        .record_interaction("ana", toggle("603", InteractionAction::Like))
        .await
        .unwrap();
    assert!(record.liked);
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert!(ana.genre_counts.is_empty());
    assert_eq!(ana.total_xp, 5);
    assert_eq!(h.catalog.lookups(), vec!["603".to_string()]);
}

#[tokio::test]
async fn person_media_skips_genre_lookup() {
    let h = Harness::with(MemoryStore::new(), catalog(), MockIdentity::new());
    h.user("ana").await;

    let mut request = toggle("603", InteractionAction::Like);
    request.media_type = Some(MediaType::Person);
    h.engine.record_interaction("ana", request).await.unwrap();
    assert!(h.catalog.lookups().is_empty());
}

#[tokio::test]
async fn empty_media_id_is_rejected() {
    let h = Harness::new();
    h.user("ana").await;
    let err = h
        .engine
        .record_interaction("ana", toggle("  ", InteractionAction::Like))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Dados inválidos.");
}

#[tokio::test]
async fn crossing_a_level_notifies_once() {
    let h = Harness::new();
    h.user("ana").await;

    // Ten watched titles at 10 XP each reach the 100 XP level-1 requirement.
    for i in 0..10 {
        h.engine
            .record_interaction("ana", toggle(&format!("m{i}"), InteractionAction::Watched))
            .await
            .unwrap();
    }
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert_eq!(ana.level, 2);
    assert_eq!(ana.xp, 0);
    assert_eq!(ana.total_xp, 100);
    assert!(ana.trophies.iter().any(|t| t.id == "wat_10"));

    let sent = h.store.notifications_for("ana");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::LevelUp);
    assert_eq!(sent[0].message, "Você alcançou o nível 2 - Espectador!");
}

#[tokio::test]
async fn failed_notification_keeps_the_level_up() {
    let h = Harness::with(
        MemoryStore::new().failing_notifications(),
        MockCatalog::new(),
        MockIdentity::new(),
    );
    h.user("ana").await;

    for i in 0..10 {
        h.engine
            .record_interaction("ana", toggle(&format!("m{i}"), InteractionAction::Watched))
            .await
            .unwrap();
    }
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert_eq!(ana.level, 2);
    assert_eq!(h.store.notification_count(), 0);
}

#[tokio::test]
async fn diary_groups_current_year_by_month() {
    let h = Harness::new();
    h.user("ana").await;
    h.engine
        .record_interaction("ana", toggle("603", InteractionAction::Watched))
        .await
        .unwrap();
    h.engine
        .record_interaction("ana", toggle("604", InteractionAction::Like))
        .await
        .unwrap();

    let now = Utc::now();
    let diary = h.engine.watch_diary("ana", now.year()).await.unwrap();
    assert_eq!(diary.len(), 1);
    let month = diary.get(&now.month0()).unwrap();
    assert_eq!(month.len(), 1);
    assert_eq!(month[0].media_id, "603");

    let empty = h.engine.watch_diary("ana", now.year() - 3).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn diary_rejects_years_without_a_successor() {
    let h = Harness::new();
    h.user("ana").await;

    let err = h.engine.watch_diary("ana", i32::MAX).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.to_string(), "Ano inválido.");
}
