//! Follow graph, trophies awarded through it, discovery and notifications.

use chrono::Utc;

use cinesorte_common::{MediaType, NotificationKind};
use cinesorte_engine::testing::Harness;
use cinesorte_engine::{InteractionAction, ProfileUpdate, RecordInteraction};
use cinesorte_store::SocialStore;

fn like(media_id: &str) -> RecordInteraction {
    RecordInteraction {
        media_id: media_id.into(),
        media_type: Some(MediaType::Movie),
        action: InteractionAction::Like,
        media_title: None,
        poster_path: None,
    }
}

#[tokio::test]
async fn follow_then_unfollow_is_symmetric() {
    let h = Harness::new();
    h.user("ana").await;
    h.user("bia").await;

    let commit = h.engine.follow("ana", "bia").await.unwrap();
    assert_eq!(commit.follower.following_count, 1);
    assert_eq!(commit.target.followers_count, 1);
    assert!(h.engine.is_following("ana", "bia").await.unwrap());
    assert_eq!(h.store.has_edge("ana", "bia"), (true, true));

    let sent = h.store.notifications_for("bia");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::NewFollower);
    assert_eq!(sent[0].message, "Nome começou a seguir você.");

    assert!(h.engine.unfollow("ana", "bia").await.unwrap());
    assert!(!h.engine.unfollow("ana", "bia").await.unwrap());
    assert_eq!(h.store.has_edge("ana", "bia"), (false, false));
    let stats = h.engine.stats("bia").await.unwrap();
    assert_eq!(stats.followers_count, 0);
    assert_eq!(h.store.get_user("ana").await.unwrap().unwrap().following_count, 0);
}

#[tokio::test]
async fn self_follow_is_rejected_without_writes() {
    let h = Harness::new();
    h.user("ana").await;
    let err = h.engine.follow("ana", "ana").await.unwrap_err();
    assert_eq!(err.to_string(), "Você não pode seguir a si mesmo.");
    assert_eq!(h.store.get_user("ana").await.unwrap().unwrap().followers_count, 0);
}

#[tokio::test]
async fn duplicate_follow_keeps_counters() {
    let h = Harness::new();
    h.user("ana").await;
    h.user("bia").await;
    h.engine.follow("ana", "bia").await.unwrap();
    assert!(h.engine.follow("ana", "bia").await.is_err());
    assert_eq!(h.store.get_user("bia").await.unwrap().unwrap().followers_count, 1);
}

#[tokio::test]
async fn tenth_follower_unlocks_trophy_once() {
    let h = Harness::new();
    h.user("ana").await;
    for i in 0..10 {
        let id = format!("fan{i}");
        h.user(&id).await;
        h.engine.follow(&id, "ana").await.unwrap();
    }
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert_eq!(ana.followers_count, 10);
    assert_eq!(ana.trophies.iter().filter(|t| t.id == "soc_10").count(), 1);

    h.engine.unfollow("fan9", "ana").await.unwrap();
    h.engine.follow("fan9", "ana").await.unwrap();

    let trophies: Vec<_> = h
        .store
        .notifications_for("ana")
        .into_iter()
        .filter(|n| n.kind == NotificationKind::TrophyUnlocked)
        .collect();
    assert_eq!(trophies.len(), 1);
    assert_eq!(trophies[0].message, "Você conquistou o troféu \"Popular na Roda\"!");
}

#[tokio::test]
async fn follower_lists_return_public_profiles() {
    let h = Harness::new();
    h.user("ana").await;
    h.user("bia").await;
    h.user("caio").await;
    h.engine.follow("bia", "ana").await.unwrap();
    h.engine.follow("caio", "ana").await.unwrap();

    let followers = h.engine.followers("ana").await.unwrap();
    let mut ids: Vec<_> = followers.iter().map(|p| p.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["bia", "caio"]);
    let following = h.engine.following("bia").await.unwrap();
    assert_eq!(following.len(), 1);
    assert_eq!(following[0].username, "ana");
}

#[tokio::test]
async fn suggestions_skip_self_and_followed() {
    let h = Harness::new();
    for id in ["ana", "bia", "caio", "duda"] {
        h.user(id).await;
    }
    h.store.increment_genre_counts("ana", &[28], 9).await.unwrap();
    h.store.increment_genre_counts("caio", &[28], 2).await.unwrap();
    h.store.increment_genre_counts("duda", &[28], 7).await.unwrap();
    h.engine.follow("ana", "bia").await.unwrap();

    let suggested = h.engine.suggestions("ana").await.unwrap();
    let ids: Vec<_> = suggested.iter().map(|s| s.profile.id.as_str()).collect();
    assert_eq!(ids, vec!["duda", "caio"]);
    assert_eq!(suggested[0].score, 7);
}

#[tokio::test]
async fn match_percentage_uses_liked_media() {
    let h = Harness::new();
    h.user("ana").await;
    h.user("bia").await;
    for media in ["1", "2"] {
        h.engine.record_interaction("ana", like(media)).await.unwrap();
    }
    for media in ["2", "3"] {
        h.engine.record_interaction("bia", like(media)).await.unwrap();
    }
    assert_eq!(h.engine.match_percentage("ana", "bia").await.unwrap(), 33);
    h.user("caio").await;
    assert_eq!(h.engine.match_percentage("ana", "caio").await.unwrap(), 0);
}

#[tokio::test]
async fn search_needs_three_characters() {
    let h = Harness::new();
    h.user("marina").await;
    h.user("mariana").await;
    h.user("bia").await;

    assert!(h.engine.search_users("ma").await.unwrap().is_empty());
    let found = h.engine.search_users("MAR").await.unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn mark_read_ignores_other_recipients() {
    let h = Harness::new();
    h.user("ana").await;
    h.user("bia").await;
    h.engine.follow("ana", "bia").await.unwrap();

    let listed = h.engine.notifications("bia").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(h.engine.unread_count("bia").await.unwrap(), 1);

    h.engine.mark_read("ana", listed[0].id).await.unwrap();
    assert_eq!(h.engine.unread_count("bia").await.unwrap(), 1);
    h.engine.mark_read("bia", listed[0].id).await.unwrap();
    assert_eq!(h.engine.unread_count("bia").await.unwrap(), 0);
}

#[tokio::test]
async fn username_change_is_audited_and_rate_limited() {
    let h = Harness::new();
    h.user("ana").await;

    let update = ProfileUpdate {
        username: Some("ana_nova".into()),
        bio: Some("Cinéfila".into()),
        ..Default::default()
    };
    let updated = h
        .engine
        .update_profile("ana", update, Some("test-agent"))
        .await
        .unwrap();
    assert_eq!(updated.username, "ana_nova");
    assert!(updated.last_username_change.is_some());

    let profile = h.engine.public_profile("ana_nova").await.unwrap();
    assert_eq!(profile.id, "ana");
    assert!(h.engine.public_profile("ana").await.is_err());

    let history = h.engine.profile_history("ana").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].changes["username"]["from"], "ana");
    assert_eq!(history[0].user_agent.as_deref(), Some("test-agent"));

    let again = ProfileUpdate {
        username: Some("ana_de_novo".into()),
        ..Default::default()
    };
    let err = h.engine.update_profile("ana", again, None).await.unwrap_err();
    assert_eq!(err.to_string(), "WAIT_30_DAYS");
}

#[tokio::test]
async fn taken_username_is_refused() {
    let h = Harness::new();
    h.user("ana").await;
    h.user("bia").await;
    let update = ProfileUpdate {
        username: Some("bia".into()),
        ..Default::default()
    };
    let err = h.engine.update_profile("ana", update, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Username em uso.");
}

#[tokio::test]
async fn empty_update_writes_no_audit() {
    let h = Harness::new();
    h.user("ana").await;
    h.engine
        .update_profile("ana", ProfileUpdate::default(), None)
        .await
        .unwrap();
    assert!(h.engine.profile_history("ana").await.unwrap().is_empty());
}

#[tokio::test]
async fn accepting_terms_records_version() {
    let h = Harness::new();
    h.user("ana").await;
    let before = Utc::now();
    h.engine.accept_terms("ana", "2.0", None).await.unwrap();
    let ana = h.store.get_user("ana").await.unwrap().unwrap();
    assert_eq!(ana.terms_version.as_deref(), Some("2.0"));
    assert!(ana.terms_accepted_at.is_some_and(|at| at >= before));
    assert_eq!(h.engine.profile_history("ana").await.unwrap().len(), 1);
}
