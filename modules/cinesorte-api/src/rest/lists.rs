// Curated lists under /api/users/lists, plus list sharing, public list pages
// and the collections feed under /api/social.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use cinesorte_common::CuratedList;
use cinesorte_engine::{CollectionPost, ListDetail, ListDraft, NewListItem};

use crate::auth::AuthUser;
use crate::error::{ApiResult, Payload};
use crate::rest::MediaId;
use crate::routes::ack;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBody {
    list_id: Option<String>,
    list_name: String,
    description: Option<String>,
    is_public: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneBody {
    owner_username: String,
    original_list_id: String,
}

/// Catalog-shaped item, as the frontend's search results carry it.
#[derive(Deserialize)]
pub struct MediaItemBody {
    id: MediaId,
    title: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    media_type: Option<String>,
    vote_average: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToListBody {
    list_id: String,
    media_item: MediaItemBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareBody {
    list_id: String,
    content: Option<String>,
}

pub async fn save(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Payload(body): Payload<ListBody>,
) -> ApiResult<Response> {
    let draft = ListDraft {
        list_id: body.list_id,
        name: body.list_name,
        description: body.description,
        is_public: body.is_public,
    };
    let list_id = state.engine.save_list(&user.uid, draft).await?;
    Ok(Json(json!({ "message": "Lista salva.", "listId": list_id })).into_response())
}

pub async fn clone(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Payload(body): Payload<CloneBody>,
) -> ApiResult<Response> {
    let new_id = state
        .engine
        .clone_list(&user.uid, &body.owner_username, &body.original_list_id)
        .await?;
    Ok(Json(json!({ "message": "Lista salva na sua coleção!", "newListId": new_id })).into_response())
}

pub async fn add_media(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Payload(body): Payload<AddToListBody>,
) -> ApiResult<Response> {
    let media = body.media_item;
    let item = NewListItem {
        id: media.id.into_string(),
        title: media.title,
        poster_path: media.poster_path,
        backdrop_path: media.backdrop_path,
        media_type: media.media_type,
        vote_average: media.vote_average,
    };
    state.engine.add_to_list(&user.uid, &body.list_id, item).await?;
    Ok(ack("Adicionado.").into_response())
}

/// `username` may be `me`.
pub async fn user_lists(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<CuratedList>>> {
    Ok(Json(state.engine.user_lists(&user.uid, &username).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(list_id): Path<String>,
) -> ApiResult<Response> {
    state.engine.delete_list(&user.uid, &list_id).await?;
    Ok(ack("Lista deletada.").into_response())
}

pub async fn remove_media(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((list_id, media_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    state
        .engine
        .remove_from_list(&user.uid, &list_id, &media_id)
        .await?;
    Ok(ack("Removido.").into_response())
}

pub async fn share(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Payload(body): Payload<ShareBody>,
) -> ApiResult<Response> {
    let share = state
        .engine
        .share_list(&user.uid, &body.list_id, body.content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": share.id, "message": "Coleção compartilhada com sucesso!" })),
    )
        .into_response())
}

pub async fn public_detail(
    State(state): State<Arc<AppState>>,
    Path((username, list_id)): Path<(String, String)>,
) -> ApiResult<Json<ListDetail>> {
    Ok(Json(state.engine.public_list(&username, &list_id).await?))
}

pub async fn collections_feed(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<CollectionPost>>> {
    Ok(Json(state.engine.collections_feed().await?))
}
