//! Curated lists: saving, cloning, membership, visibility and the collections feed.

use chrono::Utc;

use cinesorte_common::UserProfile;
use cinesorte_engine::testing::Harness;
use cinesorte_engine::{ListDraft, NewListItem};
use cinesorte_store::SocialStore;

fn draft(name: &str, is_public: Option<bool>) -> ListDraft {
    ListDraft {
        list_id: None,
        name: name.into(),
        description: Some("Para o fim de semana".into()),
        is_public,
    }
}

fn title(id: &str) -> NewListItem {
    NewListItem {
        id: id.into(),
        title: Some(format!("Filme {id}")),
        poster_path: Some("/p.jpg".into()),
        ..NewListItem::default()
    }
}

async fn harness() -> Harness {
    let h = Harness::new();
    h.user("ana").await;
    h.user("bia").await;
    h
}

#[tokio::test]
async fn new_list_starts_empty_and_public() {
    let h = harness().await;
    let id = h.engine.save_list("ana", draft("Noite de Terror", None)).await.unwrap();
    assert!(id.starts_with("noite-de-terror-"));

    let list = h.store.get_list("ana", &id).await.unwrap().unwrap();
    assert!(list.is_public);
    assert!(list.items.is_empty());
    assert_eq!(list.saves_count, 0);
    assert_eq!(list.description, "Para o fim de semana");
}

#[tokio::test]
async fn editing_keeps_items_and_counters() {
    let h = harness().await;
    let id = h.engine.save_list("ana", draft("Rascunho", None)).await.unwrap();
    h.engine.add_to_list("ana", &id, title("603")).await.unwrap();

    let edit = ListDraft {
        list_id: Some(id.clone()),
        name: "Definitiva".into(),
        description: None,
        is_public: Some(false),
    };
    assert_eq!(h.engine.save_list("ana", edit).await.unwrap(), id);

    let list = h.store.get_list("ana", &id).await.unwrap().unwrap();
    assert_eq!(list.name, "Definitiva");
    assert_eq!(list.description, "");
    assert!(!list.is_public);
    assert_eq!(list.items.len(), 1);
}

#[tokio::test]
async fn editing_a_missing_list_is_not_found() {
    let h = harness().await;
    let edit = ListDraft {
        list_id: Some("nope-0000".into()),
        name: "Qualquer".into(),
        ..ListDraft::default()
    };
    let err = h.engine.save_list("ana", edit).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn outdated_terms_block_list_creation() {
    let h = Harness::new();
    let mut old = UserProfile::new("ana", "Ana", "ana", "ana@example.com", Utc::now());
    old.terms_version = None;
    h.store.insert_user(&old).await.unwrap();

    let err = h.engine.save_list("ana", draft("Clássicos", None)).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
    assert_eq!(err.to_string(), "Aceite os novos termos.");
}

#[tokio::test]
async fn items_are_unique_by_media_id() {
    let h = harness().await;
    let id = h.engine.save_list("ana", draft("Ficção", None)).await.unwrap();
    h.engine.add_to_list("ana", &id, title("603")).await.unwrap();
    h.engine.add_to_list("ana", &id, title("603")).await.unwrap();
    h.engine.add_to_list("ana", &id, title("604")).await.unwrap();

    let list = h.store.get_list("ana", &id).await.unwrap().unwrap();
    let ids: Vec<&str> = list.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["603", "604"]);

    h.engine.remove_from_list("ana", &id, "603").await.unwrap();
    h.engine.remove_from_list("ana", &id, "999").await.unwrap();
    let list = h.store.get_list("ana", &id).await.unwrap().unwrap();
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].id, "604");
}

#[tokio::test]
async fn only_the_owner_can_add_to_a_list() {
    let h = harness().await;
    let id = h.engine.save_list("ana", draft("Minha", None)).await.unwrap();
    let err = h.engine.add_to_list("bia", &id, title("603")).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "Lista não existe ou você não tem permissão.");
}

#[tokio::test]
async fn cloning_copies_items_and_counts_the_save() {
    let h = harness().await;
    let id = h.engine.save_list("bia", draft("Anos 80", None)).await.unwrap();
    h.engine.add_to_list("bia", &id, title("105")).await.unwrap();
    h.engine.add_to_list("bia", &id, title("218")).await.unwrap();

    let copy_id = h.engine.clone_list("ana", "bia", &id).await.unwrap();

    let copy = h.store.get_list("ana", &copy_id).await.unwrap().unwrap();
    assert_eq!(copy.items.len(), 2);
    assert!(copy.is_public);
    let origin = copy.cloned_from.unwrap();
    assert_eq!(origin.owner, "bia");
    assert_eq!(origin.list_id, id);

    let source = h.store.get_list("bia", &id).await.unwrap().unwrap();
    assert_eq!(source.saves_count, 1);
}

#[tokio::test]
async fn cloning_rules() {
    let h = harness().await;
    let private = h.engine.save_list("bia", draft("Segredo", Some(false))).await.unwrap();
    let own = h.engine.save_list("ana", draft("Minha", None)).await.unwrap();

    let err = h.engine.clone_list("ana", "bia", &private).await.unwrap_err();
    assert_eq!(err.status_code(), 403);

    let err = h.engine.clone_list("ana", "ana", &own).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = h.engine.clone_list("ana", "ninguem", &own).await.unwrap_err();
    assert_eq!(err.to_string(), "Dono da lista não encontrado.");

    let err = h.engine.clone_list("ana", "bia", "sumiu-0000").await.unwrap_err();
    assert_eq!(err.status_code(), 404);

    let source = h.store.get_list("bia", &private).await.unwrap().unwrap();
    assert_eq!(source.saves_count, 0);
}

#[tokio::test]
async fn strangers_see_only_public_lists() {
    let h = harness().await;
    h.engine.save_list("bia", draft("Aberta", None)).await.unwrap();
    h.engine.save_list("bia", draft("Fechada", Some(false))).await.unwrap();

    let seen_by_ana = h.engine.user_lists("ana", "bia").await.unwrap();
    assert_eq!(seen_by_ana.len(), 1);
    assert_eq!(seen_by_ana[0].name, "Aberta");

    assert_eq!(h.engine.user_lists("bia", "bia").await.unwrap().len(), 2);
    assert_eq!(h.engine.user_lists("bia", "me").await.unwrap().len(), 2);

    let err = h.engine.user_lists("ana", "ninguem").await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn public_detail_carries_the_owner_and_hides_private_lists() {
    let h = harness().await;
    let open = h.engine.save_list("bia", draft("Aberta", None)).await.unwrap();
    let closed = h.engine.save_list("bia", draft("Fechada", Some(false))).await.unwrap();

    let detail = h.engine.public_list("bia", &open).await.unwrap();
    assert_eq!(detail.owner.username, "bia");
    assert_eq!(detail.list.name, "Aberta");

    let err = h.engine.public_list("bia", &closed).await.unwrap_err();
    assert_eq!(err.to_string(), "Esta lista é privada.");
}

#[tokio::test]
async fn shares_feed_reads_lists_live() {
    let h = harness().await;
    let id = h.engine.save_list("bia", draft("Oscar", None)).await.unwrap();
    for media in ["1", "2", "3", "4", "5"] {
        h.engine.add_to_list("bia", &id, title(media)).await.unwrap();
    }

    let share = h.engine.share_list("bia", &id, None).await.unwrap();
    assert_eq!(share.content, "Confira minha nova coleção: Oscar");
    assert_eq!(share.username, "bia");

    let rename = ListDraft {
        list_id: Some(id.clone()),
        name: "Oscar 2025".into(),
        ..ListDraft::default()
    };
    h.engine.save_list("bia", rename).await.unwrap();

    let feed = h.engine.collections_feed().await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].share.list_name, "Oscar 2025");
    assert_eq!(feed[0].list_count, 5);
    assert_eq!(feed[0].list_items.len(), 4);
    assert_eq!(feed[0].attachment_id, id);

    h.engine.delete_list("bia", &id).await.unwrap();
    let feed = h.engine.collections_feed().await.unwrap();
    assert_eq!(feed[0].list_count, 0);
    assert_eq!(feed[0].share.list_name, "Oscar");
}

#[tokio::test]
async fn private_lists_cannot_be_shared() {
    let h = harness().await;
    let id = h.engine.save_list("bia", draft("Só minha", Some(false))).await.unwrap();
    let err = h.engine.share_list("bia", &id, None).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(h.engine.collections_feed().await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_twice_is_not_found() {
    let h = harness().await;
    let id = h.engine.save_list("ana", draft("Temporária", None)).await.unwrap();
    h.engine.delete_list("ana", &id).await.unwrap();
    let err = h.engine.delete_list("ana", &id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn account_removal_takes_lists_and_shares() {
    let h = harness().await;
    let id = h.engine.save_list("ana", draft("Adeus", None)).await.unwrap();
    h.engine.share_list("ana", &id, Some("Últimos filmes".into())).await.unwrap();

    h.engine.delete_account("ana").await.unwrap();

    assert!(h.store.get_list("ana", &id).await.unwrap().is_none());
    assert!(h.engine.collections_feed().await.unwrap().is_empty());
}
