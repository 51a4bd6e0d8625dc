//! Note REST API Routes
//!
//! CRUD over the caller's own notes. Every storage call is scoped to the
//! authenticated owner, so another user's note looks exactly like a missing
//! one. Reads go through the response cache under `notes:{owner_id}`; every
//! successful write drops that prefix.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use notes_core::{NewNote, Note, NoteFilter, NoteId, NotePatch};
use notes_storage::Storage;

use crate::{
    cache::{notes_prefix, ResponseCache},
    error::{ApiError, ApiResult},
    extractors::{ApiJson, ApiPath, ApiQuery},
    middleware::AuthExtractor,
    types::{DeleteResponse, ListNotesParams},
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /notes - Create a note owned by the caller
#[utoipa::path(
    post,
    path = "/notes",
    tag = "Notes",
    request_body = NewNote,
    responses(
        (status = 201, description = "Note created successfully", body = Note),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 422, description = "Title or content out of bounds", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_note(
    State(storage): State<Arc<dyn Storage>>,
    State(cache): State<ResponseCache>,
    AuthExtractor(auth): AuthExtractor,
    ApiJson(req): ApiJson<NewNote>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let note = storage.note_insert(auth.user_id, &req).await?;
    cache.invalidate(&notes_prefix(auth.user_id)).await;

    tracing::debug!(note_id = note.id, owner_id = auth.user_id, "Note created");
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /notes - List the caller's notes ordered by id
#[utoipa::path(
    get,
    path = "/notes",
    tag = "Notes",
    params(ListNotesParams),
    responses(
        (status = 200, description = "List of notes", body = [Note]),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 422, description = "skip or limit out of range", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_notes(
    State(storage): State<Arc<dyn Storage>>,
    State(cache): State<ResponseCache>,
    AuthExtractor(auth): AuthExtractor,
    ApiQuery(params): ApiQuery<ListNotesParams>,
) -> ApiResult<Json<Vec<Note>>> {
    let filter = NoteFilter::from_query(params.skip, params.limit, params.search)?;
    let owner_id = auth.user_id;

    let notes = cache
        .cached(&notes_prefix(owner_id), "list_notes", &filter, async {
            Ok::<_, ApiError>(storage.note_list(owner_id, &filter).await?)
        })
        .await?;

    Ok(Json(notes))
}

/// GET /notes/{id} - Get one of the caller's notes
#[utoipa::path(
    get,
    path = "/notes/{id}",
    tag = "Notes",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    responses(
        (status = 200, description = "Note details", body = Note),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Note not found or access denied", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_note(
    State(storage): State<Arc<dyn Storage>>,
    State(cache): State<ResponseCache>,
    AuthExtractor(auth): AuthExtractor,
    ApiPath(id): ApiPath<NoteId>,
) -> ApiResult<Json<Note>> {
    let owner_id = auth.user_id;

    let note = cache
        .cached(&notes_prefix(owner_id), "get_note", &id, async {
            storage
                .note_get(id, owner_id)
                .await?
                .ok_or_else(ApiError::note_not_found)
        })
        .await?;

    Ok(Json(note))
}

/// PUT /notes/{id} - Partially update one of the caller's notes
#[utoipa::path(
    put,
    path = "/notes/{id}",
    tag = "Notes",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    request_body = NotePatch,
    responses(
        (status = 200, description = "Note updated successfully", body = Note),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Note not found or access denied", body = ApiError),
        (status = 422, description = "Title or content out of bounds", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_note(
    State(storage): State<Arc<dyn Storage>>,
    State(cache): State<ResponseCache>,
    AuthExtractor(auth): AuthExtractor,
    ApiPath(id): ApiPath<NoteId>,
    ApiJson(patch): ApiJson<NotePatch>,
) -> ApiResult<Json<Note>> {
    patch.validate()?;

    let note = storage
        .note_update(id, auth.user_id, &patch)
        .await?
        .ok_or_else(ApiError::note_not_found)?;
    cache.invalidate(&notes_prefix(auth.user_id)).await;

    Ok(Json(note))
}

/// DELETE /notes/{id} - Delete one of the caller's notes
#[utoipa::path(
    delete,
    path = "/notes/{id}",
    tag = "Notes",
    params(
        ("id" = i64, Path, description = "Note ID")
    ),
    responses(
        (status = 200, description = "Note deleted", body = DeleteResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "Note not found or access denied", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_note(
    State(storage): State<Arc<dyn Storage>>,
    State(cache): State<ResponseCache>,
    AuthExtractor(auth): AuthExtractor,
    ApiPath(id): ApiPath<NoteId>,
) -> ApiResult<Json<DeleteResponse>> {
    if !storage.note_delete(id, auth.user_id).await? {
        return Err(ApiError::note_not_found());
    }
    cache.invalidate(&notes_prefix(auth.user_id)).await;

    tracing::debug!(note_id = id, owner_id = auth.user_id, "Note deleted");
    Ok(Json(DeleteResponse {
        detail: "Note deleted".to_string(),
    }))
}
