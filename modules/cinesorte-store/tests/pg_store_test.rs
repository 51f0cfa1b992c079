//! Integration tests for PgStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use cinesorte_common::{
    Comment, CuratedList, Interaction, ListItem, MediaType, Review, Trophy, UserProfile,
};
use cinesorte_store::{
    Effects, InteractionCommit, PgStore, ReviewCommit, ReviewFilter, SocialStore,
};

/// Get a migrated store, or skip if no test DB is available.
/// Tests run concurrently against one database, so every id is unique per test.
async fn test_store() -> Option<PgStore> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    let store = PgStore::new(pool);
    store.migrate().await.ok()?;
    Some(store)
}

fn unique(name: &str) -> String {
    format!("{name}{}", &Uuid::new_v4().simple().to_string()[..10])
}

fn user(id: &str) -> UserProfile {
    UserProfile::new(id, "Nome", id, format!("{id}@example.com"), Utc::now())
}

async fn publish(store: &PgStore, uid: &str) -> Review {
    store
        .create_review(uid, &|u: &UserProfile| {
            let mut next = u.clone();
            next.reviews_count += 1;
            next.total_xp += 20;
            next.xp += 20;
            let now = Utc::now();
            Ok(ReviewCommit {
                review: Review {
                    id: Uuid::new_v4(),
                    user_id: next.id.clone(),
                    media_id: "603".into(),
                    media_type: MediaType::Movie,
                    media_title: "Matrix".into(),
                    poster_path: None,
                    backdrop_path: None,
                    rating: 9.5,
                    text: "Clássico".into(),
                    likes_count: 0,
                    comments_count: 0,
                    username: next.username.clone(),
                    user_photo: None,
                    level_title: next.level_title.clone(),
                    is_elite_review: false,
                    is_edited: false,
                    created_at: now,
                    updated_at: now,
                },
                user: next,
                effects: Effects::default(),
            })
        })
        .await
        .unwrap()
        .review
}

#[tokio::test]
async fn user_roundtrip_keeps_json_columns() {
    let Some(store) = test_store().await else {
        return;
    };
    let ana = unique("ana");
    store.insert_user(&user(&ana)).await.unwrap();
    store.increment_genre_counts(&ana, &[28, 878], 3).await.unwrap();
    store.increment_genre_counts(&ana, &[28], -3).await.unwrap();

    let stored = store.get_user(&ana).await.unwrap().unwrap();
    assert_eq!(stored.genre_counts.get(&28), Some(&0));
    assert_eq!(stored.genre_counts.get(&878), Some(&3));
    assert_eq!(stored.level, 1);
}

#[tokio::test]
async fn username_search_treats_underscore_literally() {
    let Some(store) = test_store().await else {
        return;
    };
    let base = unique("s");
    store.insert_user(&user(&format!("{base}_b"))).await.unwrap();
    store.insert_user(&user(&format!("{base}xb"))).await.unwrap();

    let found = store.search_users(&format!("{base}_"), 10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, format!("{base}_b"));
}

#[tokio::test]
async fn interaction_commit_writes_both_documents() {
    let Some(store) = test_store().await else {
        return;
    };
    let ana = unique("ana");
    store.insert_user(&user(&ana)).await.unwrap();

    store
        .update_interaction(&ana, "603", &|u: &UserProfile, prev: Option<&Interaction>| {
            assert!(prev.is_none());
            let now = Utc::now();
            let mut next = u.clone();
            next.watched_count += 1;
            let mut i = Interaction::new(&u.id, "603", now);
            i.watched = true;
            i.watched_at = Some(now);
            Ok(InteractionCommit {
                user: next,
                interaction: i,
                genre_weight: 1,
                effects: Effects::default(),
            })
        })
        .await
        .unwrap();

    let stored_user = store.get_user(&ana).await.unwrap().unwrap();
    assert_eq!(stored_user.watched_count, 1);
    let stored = store.get_interaction(&ana, "603").await.unwrap().unwrap();
    assert!(stored.watched);
    assert!(stored.watched_at.is_some());
}

#[tokio::test]
async fn follow_and_unfollow_are_symmetric() {
    let Some(store) = test_store().await else {
        return;
    };
    let ana = unique("ana");
    let bia = unique("bia");
    store.insert_user(&user(&ana)).await.unwrap();
    store.insert_user(&user(&bia)).await.unwrap();

    store
        .follow(&ana, &bia, Utc::now(), &|_: &UserProfile| Vec::new())
        .await
        .unwrap();
    assert!(store.is_following(&ana, &bia).await.unwrap());
    assert_eq!(store.count_followers(&bia).await.unwrap(), 1);
    assert_eq!(store.count_following(&ana).await.unwrap(), 1);
    assert_eq!(store.get_user(&bia).await.unwrap().unwrap().followers_count, 1);

    assert!(store.unfollow(&ana, &bia).await.unwrap());
    assert_eq!(store.count_followers(&bia).await.unwrap(), 0);
    assert_eq!(store.count_following(&ana).await.unwrap(), 0);
    assert_eq!(store.get_user(&ana).await.unwrap().unwrap().following_count, 0);
}

#[tokio::test]
async fn self_follow_rejected() {
    let Some(store) = test_store().await else {
        return;
    };
    let ana = unique("ana");
    store.insert_user(&user(&ana)).await.unwrap();
    let err = store
        .follow(&ana, &ana, Utc::now(), &|_: &UserProfile| Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn review_delete_cascades_through_foreign_keys() {
    let Some(store) = test_store().await else {
        return;
    };
    let ana = unique("ana");
    let bia = unique("bia");
    store.insert_user(&user(&ana)).await.unwrap();
    store.insert_user(&user(&bia)).await.unwrap();
    let review = publish(&store, &ana).await;

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4(),
        review_id: review.id,
        user_id: bia.clone(),
        username: bia.clone(),
        user_photo: None,
        level_title: "Espectador".into(),
        text: "Concordo".into(),
        parent_id: None,
        is_edited: false,
        created_at: now,
        updated_at: now,
    };
    let parent = store.add_comment(&comment).await.unwrap();
    assert_eq!(parent.comments_count, 1);
    let liked = store.toggle_review_like(review.id, &bia).await.unwrap();
    assert_eq!(liked.review.likes_count, 1);

    store.delete_review(review.id).await.unwrap();
    assert!(store.get_review(review.id).await.unwrap().is_none());
    assert!(store.list_comments(review.id).await.unwrap().is_empty());
    assert!(!store.is_review_liked(review.id, &bia).await.unwrap());

    let remaining = store
        .list_reviews(ReviewFilter::ByUser(ana.clone()), 20)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn concurrent_likes_on_one_review_count_exactly() {
    let Some(store) = test_store().await else {
        return;
    };
    let ana = unique("ana");
    let fans: Vec<String> = (0..4).map(|i| unique(&format!("fan{i}"))).collect();
    store.insert_user(&user(&ana)).await.unwrap();
    for fan in &fans {
        store.insert_user(&user(fan)).await.unwrap();
    }
    let review = publish(&store, &ana).await;

    let (a, b, c, d) = tokio::join!(
        store.toggle_review_like(review.id, &fans[0]),
        store.toggle_review_like(review.id, &fans[1]),
        store.toggle_review_like(review.id, &fans[2]),
        store.toggle_review_like(review.id, &fans[3]),
    );
    for toggle in [a, b, c, d] {
        assert!(toggle.unwrap().liked);
    }
    let stored = store.get_review(review.id).await.unwrap().unwrap();
    assert_eq!(stored.likes_count, 4);

    // Same fan twice at once: the two toggles serialize and cancel out.
    let (on, off) = tokio::join!(
        store.toggle_review_like(review.id, &fans[0]),
        store.toggle_review_like(review.id, &fans[0]),
    );
    on.unwrap();
    off.unwrap();
    let stored = store.get_review(review.id).await.unwrap().unwrap();
    assert_eq!(stored.likes_count, 4);
    assert!(store.is_review_liked(review.id, &fans[0]).await.unwrap());
}

#[tokio::test]
async fn concurrent_follows_and_unfollows_keep_counters_consistent() {
    let Some(store) = test_store().await else {
        return;
    };
    let star = unique("star");
    let fans: Vec<String> = (0..4).map(|i| unique(&format!("f{i}"))).collect();
    store.insert_user(&user(&star)).await.unwrap();
    for fan in &fans {
        store.insert_user(&user(fan)).await.unwrap();
    }
    let none = |_: &UserProfile| -> Vec<Trophy> { Vec::new() };

    let (a, b, c, d) = tokio::join!(
        store.follow(&fans[0], &star, Utc::now(), &none),
        store.follow(&fans[1], &star, Utc::now(), &none),
        store.follow(&fans[2], &star, Utc::now(), &none),
        store.follow(&fans[3], &star, Utc::now(), &none),
    );
    for commit in [a, b, c, d] {
        commit.unwrap();
    }
    let stored = store.get_user(&star).await.unwrap().unwrap();
    assert_eq!(stored.followers_count, 4);
    assert_eq!(store.count_followers(&star).await.unwrap(), 4);

    // The same edge removed twice at once: exactly one removal wins and the
    // counter never drops below the edge count.
    let (first, second, third) = tokio::join!(
        store.unfollow(&fans[0], &star),
        store.unfollow(&fans[0], &star),
        store.unfollow(&fans[1], &star),
    );
    let removed = [first.unwrap(), second.unwrap()]
        .iter()
        .filter(|r| **r)
        .count();
    assert_eq!(removed, 1);
    assert!(third.unwrap());

    let stored = store.get_user(&star).await.unwrap().unwrap();
    assert_eq!(stored.followers_count, 2);
    assert_eq!(store.count_followers(&star).await.unwrap(), 2);
    let fan0 = store.get_user(&fans[0]).await.unwrap().unwrap();
    assert_eq!(fan0.following_count, 0);
}

#[tokio::test]
async fn concurrent_interaction_toggles_serialize() {
    let Some(store) = test_store().await else {
        return;
    };
    let ana = unique("ana");
    store.insert_user(&user(&ana)).await.unwrap();

    let flip = |u: &UserProfile, prev: Option<&Interaction>| -> cinesorte_common::Result<InteractionCommit> {
        let now = Utc::now();
        let mut i = prev
            .cloned()
            .unwrap_or_else(|| Interaction::new(&u.id, "603", now));
        let mut next = u.clone();
        i.watched = !i.watched;
        if i.watched {
            next.watched_count += 1;
        } else {
            next.watched_count -= 1;
        }
        Ok(InteractionCommit {
            user: next,
            interaction: i,
            genre_weight: 0,
            effects: Effects::default(),
        })
    };

    let (a, b, c, d) = tokio::join!(
        store.update_interaction(&ana, "603", &flip),
        store.update_interaction(&ana, "603", &flip),
        store.update_interaction(&ana, "603", &flip),
        store.update_interaction(&ana, "603", &flip),
    );
    for commit in [a, b, c, d] {
        commit.unwrap();
    }
    // Four flips from unwatched: back to unwatched, counter back to zero.
    let stored = store.get_interaction(&ana, "603").await.unwrap().unwrap();
    assert!(!stored.watched);
    assert_eq!(store.get_user(&ana).await.unwrap().unwrap().watched_count, 0);
}

fn curated(owner: &str, id: &str) -> CuratedList {
    let now = Utc::now();
    CuratedList {
        id: id.into(),
        user_id: owner.into(),
        name: "Noir".into(),
        description: String::new(),
        items: Vec::new(),
        is_public: true,
        saves_count: 0,
        cloned_from: None,
        created_at: now,
        updated_at: now,
    }
}

fn item(id: &str) -> ListItem {
    ListItem {
        id: id.into(),
        title: "Filme".into(),
        poster_path: None,
        backdrop_path: None,
        media_type: MediaType::Movie,
        vote_average: 7.5,
        added_at: Utc::now(),
    }
}

#[tokio::test]
async fn concurrent_list_edits_keep_items_unique() {
    let Some(store) = test_store().await else { return };
    let owner = unique("lst");
    store.insert_user(&user(&owner)).await.unwrap();
    store.insert_list(&curated(&owner, "noir-0001")).await.unwrap();

    let (item_a, item_b, item_c) = (item("603"), item("603"), item("604"));
    let (a, b, c) = tokio::join!(
        store.add_list_item(&owner, "noir-0001", &item_a),
        store.add_list_item(&owner, "noir-0001", &item_b),
        store.add_list_item(&owner, "noir-0001", &item_c),
    );
    let added_603 = [a.unwrap(), b.unwrap()].iter().filter(|x| **x).count();
    assert_eq!(added_603, 1);
    assert!(c.unwrap());

    let list = store.get_list(&owner, "noir-0001").await.unwrap().unwrap();
    assert_eq!(list.items.len(), 2);
    assert_eq!(list.items.iter().find(|i| i.id == "603").map(|i| i.media_type), Some(MediaType::Movie));
}

#[tokio::test]
async fn concurrent_clones_count_every_save() {
    let Some(store) = test_store().await else { return };
    let owner = unique("src");
    let fans: Vec<String> = (0..3).map(|i| unique(&format!("cl{i}"))).collect();
    store.insert_user(&user(&owner)).await.unwrap();
    store.insert_list(&curated(&owner, "noir-0001")).await.unwrap();

    let (copy_a, copy_b, copy_c) = (
        curated(&fans[0], "noir-000001"),
        curated(&fans[1], "noir-000001"),
        curated(&fans[2], "noir-000001"),
    );
    let (a, b, c) = tokio::join!(
        store.clone_list(&owner, "noir-0001", &copy_a),
        store.clone_list(&owner, "noir-0001", &copy_b),
        store.clone_list(&owner, "noir-0001", &copy_c),
    );
    for result in [a, b, c] {
        result.unwrap();
    }
    let source = store.get_list(&owner, "noir-0001").await.unwrap().unwrap();
    assert_eq!(source.saves_count, 3);

    let err = store
        .clone_list(&owner, "missing", &curated(&fans[0], "other-000001"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(store.get_list(&fans[0], "other-000001").await.unwrap().is_none());
}
