// Curated lists: creation and edits, cloning another user's public list,
// item membership, and the collections feed built from shared lists.
//
// A list belongs to exactly one user and its id is unique only within that
// user's lists. Cloning inserts the copy and bumps the source's saves count in
// one store call. Items are unique by media id.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use cinesorte_common::{
    CinesorteError, CuratedList, ListItem, ListOrigin, ListShare, MediaType, Result, UserProfile,
    TERMS_VERSION,
};
use cinesorte_store::ListDetails;

use crate::social::UserSummary;
use crate::validation;
use crate::Cinesorte;

pub const MAX_LIST_NAME: usize = 60;
pub const MAX_LIST_DESCRIPTION: usize = 300;
pub const MAX_SHARE_CONTENT: usize = 500;
pub const COLLECTIONS_FEED_LIMIT: usize = 20;
/// Items shown on a feed card.
pub const FEED_PREVIEW_ITEMS: usize = 4;

/// Path segment that names the caller's own lists.
pub const OWN_LISTS: &str = "me";

const UNTITLED: &str = "Sem título";
const LIST_MISSING: &str = "Lista não encontrada.";

/// Create (no `list_id`) or edit (with one) a list's details.
#[derive(Debug, Clone, Default)]
pub struct ListDraft {
    pub list_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    /// Missing means public, on edits too.
    pub is_public: Option<bool>,
}

impl ListDraft {
    pub fn validate(&self) -> Result<()> {
        let name_len = self.name.trim().chars().count();
        let description = self.description.as_deref().unwrap_or_default();
        if name_len == 0
            || name_len > MAX_LIST_NAME
            || description.chars().count() > MAX_LIST_DESCRIPTION
        {
            return Err(CinesorteError::validation("Dados inválidos."));
        }
        if validation::reject_profanity(&self.name).is_err()
            || validation::reject_profanity(description).is_err()
        {
            return Err(CinesorteError::validation("Nome ou descrição impróprios."));
        }
        Ok(())
    }
}

/// A title as the client sends it. Missing fields get catalog defaults.
#[derive(Debug, Clone, Default)]
pub struct NewListItem {
    pub id: String,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub media_type: Option<String>,
    pub vote_average: Option<f64>,
}

impl NewListItem {
    pub fn into_item(self, now: DateTime<Utc>) -> Result<ListItem> {
        let invalid = || CinesorteError::validation("Dados inválidos.");
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(invalid());
        }
        let media_type = match self.media_type.as_deref() {
            None | Some("") => MediaType::Movie,
            Some(raw) => MediaType::parse(raw).ok_or_else(invalid)?,
        };
        let vote_average = self.vote_average.unwrap_or(0.0);
        if !vote_average.is_finite() {
            return Err(invalid());
        }
        Ok(ListItem {
            id,
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            poster_path: self.poster_path.filter(|p| !p.is_empty()),
            backdrop_path: self.backdrop_path.filter(|p| !p.is_empty()),
            media_type,
            vote_average,
            added_at: now,
        })
    }
}

/// A public list with its owner's display fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDetail {
    #[serde(flatten)]
    pub list: CuratedList,
    pub owner: UserSummary,
}

/// A feed card: the share post plus a live preview of the list it points at.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPost {
    #[serde(flatten)]
    pub share: ListShare,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub list_count: usize,
    pub list_items: Vec<ListItem>,
    pub attachment_id: String,
}

impl CollectionPost {
    /// `list` is the current state of the shared list, if it still exists.
    pub fn new(mut share: ListShare, list: Option<&CuratedList>) -> Self {
        let (list_count, list_items) = match list {
            Some(list) => {
                share.list_name = list.name.clone();
                (
                    list.items.len(),
                    list.items.iter().take(FEED_PREVIEW_ITEMS).cloned().collect(),
                )
            }
            None => (0, Vec::new()),
        };
        let attachment_id = share.list_id.clone();
        Self {
            share,
            kind: "list_share",
            list_count,
            list_items,
            attachment_id,
        }
    }
}

/// Lowercase ASCII slug: runs of anything else collapse to one `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "lista".to_string()
    } else {
        slug.to_string()
    }
}

/// `slug-NNNN` with the last `digits` digits of the creation instant in milliseconds.
pub fn list_id_for(name: &str, now: DateTime<Utc>, digits: u32) -> String {
    let modulus = 10_i64.pow(digits);
    let suffix = now.timestamp_millis().rem_euclid(modulus);
    format!("{}-{:0width$}", slugify(name), suffix, width = digits as usize)
}

/// The caller's private copy of `source`, owned by `uid`.
pub fn compose_clone(
    source: &CuratedList,
    owner_username: &str,
    uid: &str,
    now: DateTime<Utc>,
) -> CuratedList {
    CuratedList {
        id: list_id_for(&source.name, now, 6),
        user_id: uid.to_string(),
        name: source.name.clone(),
        description: source.description.clone(),
        items: source.items.clone(),
        is_public: true,
        saves_count: 0,
        cloned_from: Some(ListOrigin {
            list_id: source.id.clone(),
            owner: owner_username.to_string(),
            original_name: source.name.clone(),
        }),
        created_at: now,
        updated_at: now,
    }
}

fn require_current_terms(user: &UserProfile) -> Result<()> {
    if user.terms_version.as_deref() == Some(TERMS_VERSION) {
        Ok(())
    } else {
        Err(CinesorteError::forbidden("Aceite os novos termos."))
    }
}

impl Cinesorte {
    /// Returns the id of the saved list.
    pub async fn save_list(&self, uid: &str, draft: ListDraft) -> Result<String> {
        draft.validate()?;
        let user = self.require_user(uid).await?;
        require_current_terms(&user)?;

        let now = Utc::now();
        let details = ListDetails {
            name: draft.name.trim().to_string(),
            description: draft.description.unwrap_or_default(),
            is_public: draft.is_public.unwrap_or(true),
            updated_at: now,
        };

        if let Some(list_id) = draft.list_id.filter(|id| !id.is_empty()) {
            self.store.update_list_details(uid, &list_id, &details).await?;
            return Ok(list_id);
        }

        let list = CuratedList {
            id: list_id_for(&details.name, now, 4),
            user_id: uid.to_string(),
            name: details.name,
            description: details.description,
            items: Vec::new(),
            is_public: details.is_public,
            saves_count: 0,
            cloned_from: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_list(&list).await?;
        info!(uid, list_id = %list.id, "List created");
        Ok(list.id)
    }

    /// Copy another user's public list into the caller's lists. Returns the new id.
    pub async fn clone_list(&self, uid: &str, owner_username: &str, list_id: &str) -> Result<String> {
        let user = self.require_user(uid).await?;
        require_current_terms(&user)?;

        let owner = self
            .store
            .get_user_by_username(owner_username)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Dono da lista não encontrado."))?;
        if owner.id == uid {
            return Err(CinesorteError::validation(
                "Você não pode clonar sua própria lista.",
            ));
        }
        let source = self
            .store
            .get_list(&owner.id, list_id)
            .await?
            .ok_or_else(|| CinesorteError::not_found(LIST_MISSING))?;
        if !source.is_public {
            return Err(CinesorteError::forbidden("Lista privada."));
        }

        let copy = compose_clone(&source, &owner.username, uid, Utc::now());
        self.store.clone_list(&owner.id, &source.id, &copy).await?;
        info!(uid, source = %source.id, owner = %owner.id, list_id = %copy.id, "List cloned");
        Ok(copy.id)
    }

    /// Adding a title that is already in the list is a no-op.
    pub async fn add_to_list(&self, uid: &str, list_id: &str, item: NewListItem) -> Result<()> {
        let item = item.into_item(Utc::now())?;
        match self.store.add_list_item(uid, list_id, &item).await {
            Ok(_) => Ok(()),
            Err(CinesorteError::NotFound(_)) => Err(CinesorteError::not_found(
                "Lista não existe ou você não tem permissão.",
            )),
            Err(e) => Err(e),
        }
    }

    pub async fn remove_from_list(&self, uid: &str, list_id: &str, media_id: &str) -> Result<()> {
        self.store
            .remove_list_item(uid, list_id, media_id, Utc::now())
            .await?;
        Ok(())
    }

    pub async fn delete_list(&self, uid: &str, list_id: &str) -> Result<()> {
        if !self.store.delete_list(uid, list_id).await? {
            return Err(CinesorteError::not_found(LIST_MISSING));
        }
        info!(uid, list_id, "List deleted");
        Ok(())
    }

    /// Lists of `username` as `viewer` may see them: all of them for the owner,
    /// public ones for everybody else. `me` names the viewer.
    pub async fn user_lists(&self, viewer: &str, username: &str) -> Result<Vec<CuratedList>> {
        let owner_id = if username == OWN_LISTS {
            viewer.to_string()
        } else {
            self.store
                .get_user_by_username(username)
                .await?
                .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado"))?
                .id
        };
        let public_only = owner_id != viewer;
        self.store.list_lists(&owner_id, public_only).await
    }

    pub async fn public_list(&self, username: &str, list_id: &str) -> Result<ListDetail> {
        let owner = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado."))?;
        let list = self
            .store
            .get_list(&owner.id, list_id)
            .await?
            .ok_or_else(|| CinesorteError::not_found(LIST_MISSING))?;
        if !list.is_public {
            return Err(CinesorteError::forbidden("Esta lista é privada."));
        }
        Ok(ListDetail {
            list,
            owner: UserSummary::from(owner),
        })
    }

    /// Post one of the caller's public lists to the collections feed.
    pub async fn share_list(&self, uid: &str, list_id: &str, content: Option<String>) -> Result<ListShare> {
        let list = self
            .store
            .get_list(uid, list_id)
            .await?
            .ok_or_else(|| CinesorteError::not_found(LIST_MISSING))?;
        if !list.is_public {
            return Err(CinesorteError::validation(
                "Você só pode compartilhar listas públicas.",
            ));
        }

        let content = match content.filter(|c| !c.trim().is_empty()) {
            Some(text) => {
                if text.chars().count() > MAX_SHARE_CONTENT {
                    return Err(CinesorteError::validation("Dados inválidos."));
                }
                validation::reject_profanity(&text)?;
                text
            }
            None => format!("Confira minha nova coleção: {}", list.name),
        };

        let user = self.require_user(uid).await?;
        let share = ListShare {
            id: Uuid::new_v4(),
            user_id: uid.to_string(),
            username: user.username,
            user_photo: user.photo_url,
            level_title: user.level_title,
            list_id: list.id,
            list_name: list.name,
            content,
            likes_count: 0,
            comments_count: 0,
            created_at: Utc::now(),
        };
        self.store.insert_list_share(&share).await?;
        info!(uid, share_id = %share.id, list_id = %share.list_id, "List shared");
        Ok(share)
    }

    /// Latest shares, each with the current name and first items of its list.
    /// A list that cannot be read leaves its card with the stored name and no items.
    pub async fn collections_feed(&self) -> Result<Vec<CollectionPost>> {
        let shares = self.store.list_shares(COLLECTIONS_FEED_LIMIT).await?;
        let lists = join_all(
            shares
                .iter()
                .map(|s| self.store.get_list(&s.user_id, &s.list_id)),
        )
        .await;

        Ok(shares
            .into_iter()
            .zip(lists)
            .map(|(share, list)| {
                let list = list.unwrap_or_else(|e| {
                    warn!(share_id = %share.id, error = %e, "Shared list unreadable");
                    None
                });
                CollectionPost::new(share, list.as_ref())
            })
            .collect())
    }

    async fn require_user(&self, uid: &str) -> Result<UserProfile> {
        self.store
            .get_user(uid)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn list(name: &str, items: usize) -> CuratedList {
        let now = Utc::now();
        CuratedList {
            id: "src".into(),
            user_id: "bia".into(),
            name: name.into(),
            description: "Favoritos".into(),
            items: (0..items)
                .map(|i| ListItem {
                    id: i.to_string(),
                    title: format!("Filme {i}"),
                    poster_path: None,
                    backdrop_path: None,
                    media_type: MediaType::Movie,
                    vote_average: 7.0,
                    added_at: now,
                })
                .collect(),
            is_public: false,
            saves_count: 3,
            cloned_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn slugs_collapse_everything_but_ascii_words() {
        assert_eq!(slugify("Meus Filmes Favoritos"), "meus-filmes-favoritos");
        assert_eq!(slugify("  Top 10: Terror!! "), "top-10-terror");
        assert_eq!(slugify("Ação"), "a-o");
        assert_eq!(slugify("!!!"), "lista");
    }

    #[test]
    fn list_ids_end_with_zero_padded_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_042).unwrap();
        assert_eq!(list_id_for("Noir", at, 4), "noir-0042");
        assert_eq!(list_id_for("Noir", at, 6), "noir-000042");
    }

    #[test]
    fn clone_is_public_and_remembers_its_source() {
        let now = Utc::now();
        let copy = compose_clone(&list("Clássicos", 2), "bia", "ana", now);
        assert_eq!(copy.user_id, "ana");
        assert!(copy.is_public);
        assert_eq!(copy.saves_count, 0);
        assert_eq!(copy.items.len(), 2);
        let origin = copy.cloned_from.unwrap();
        assert_eq!(origin.list_id, "src");
        assert_eq!(origin.owner, "bia");
        assert_eq!(origin.original_name, "Clássicos");
        assert!(copy.id.starts_with("cl-ssicos-"));
    }

    #[test]
    fn drafts_need_a_clean_short_name() {
        let draft = |name: &str| ListDraft {
            name: name.into(),
            ..ListDraft::default()
        };
        assert!(draft("Domingo").validate().is_ok());
        assert!(draft("  ").validate().is_err());
        assert!(draft(&"a".repeat(MAX_LIST_NAME + 1)).validate().is_err());
        assert_eq!(
            draft("filmes de merda").validate().unwrap_err().to_string(),
            "Nome ou descrição impróprios."
        );
    }

    #[test]
    fn items_take_catalog_defaults() {
        let item = NewListItem {
            id: " 603 ".into(),
            ..NewListItem::default()
        }
        .into_item(Utc::now())
        .unwrap();
        assert_eq!(item.id, "603");
        assert_eq!(item.title, UNTITLED);
        assert_eq!(item.media_type, MediaType::Movie);
        assert_eq!(item.vote_average, 0.0);

        let odd = NewListItem {
            id: "1".into(),
            media_type: Some("podcast".into()),
            ..NewListItem::default()
        };
        assert!(odd.into_item(Utc::now()).is_err());
    }

    #[test]
    fn feed_card_reads_the_live_list() {
        let share = ListShare {
            id: Uuid::new_v4(),
            user_id: "bia".into(),
            username: "bia".into(),
            user_photo: None,
            level_title: "Espectador".into(),
            list_id: "src".into(),
            list_name: "Nome antigo".into(),
            content: "Olha".into(),
            likes_count: 0,
            comments_count: 0,
            created_at: Utc::now(),
        };

        let card = CollectionPost::new(share.clone(), Some(&list("Nome novo", 6)));
        assert_eq!(card.share.list_name, "Nome novo");
        assert_eq!(card.list_count, 6);
        assert_eq!(card.list_items.len(), FEED_PREVIEW_ITEMS);
        assert_eq!(card.attachment_id, "src");

        let orphan = CollectionPost::new(share, None);
        assert_eq!(orphan.share.list_name, "Nome antigo");
        assert_eq!(orphan.list_count, 0);
        let json = serde_json::to_value(&orphan).unwrap();
        assert_eq!(json["type"], "list_share");
        assert_eq!(json["listName"], "Nome antigo");
    }
}
