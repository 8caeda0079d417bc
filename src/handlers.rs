use crate::{
    AppState,
    access::resolve_owned,
    auth::AuthUser,
    models::{Card, CardPayload},
    repository::{PageRequest, SortDirection, SortField},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

// --- Filter Structs ---

/// PageFilter
///
/// Accepted query parameters for the card listing endpoint (GET /cards).
/// `sort` uses the `field` or `field,direction` form, e.g. `amount,desc`.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PageFilter {
    /// Zero-based page index. Defaults to 0.
    pub page: Option<i64>,
    /// Page size. Defaults to 20.
    pub size: Option<i64>,
    /// Sort spec. Defaults to `amount,asc`.
    pub sort: Option<String>,
}

impl PageFilter {
    /// Resolves the raw query parameters into a PageRequest, rejecting
    /// negative indices, non-positive sizes, and sort specs outside the
    /// field/direction whitelist.
    fn resolve(self) -> Result<PageRequest, StatusCode> {
        let mut page = PageRequest::default();

        if let Some(index) = self.page {
            if index < 0 {
                return Err(StatusCode::BAD_REQUEST);
            }
            page.page = index;
        }
        if let Some(size) = self.size {
            if size <= 0 {
                return Err(StatusCode::BAD_REQUEST);
            }
            page.size = size;
        }
        // The row offset is page * size; a combination that cannot be
        // represented can never address a real page, so it is malformed input.
        if page.page.checked_mul(page.size).is_none() {
            return Err(StatusCode::BAD_REQUEST);
        }
        if let Some(spec) = self.sort.as_deref() {
            let (field, direction) = match spec.split_once(',') {
                Some((f, d)) => (
                    SortField::parse(f).ok_or(StatusCode::BAD_REQUEST)?,
                    SortDirection::parse(d).ok_or(StatusCode::BAD_REQUEST)?,
                ),
                None => (
                    SortField::parse(spec).ok_or(StatusCode::BAD_REQUEST)?,
                    SortDirection::Asc,
                ),
            };
            page.sort_field = field;
            page.sort_direction = direction;
        }

        Ok(page)
    }
}

/// Maps a storage failure to the service-failure outcome. The error is logged
/// here, once, so handlers stay a single expression per branch.
fn storage_error(e: sqlx::Error) -> StatusCode {
    tracing::error!("storage failure: {:?}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

// --- Handlers ---

/// create_card
///
/// [Owner Route] Creates a new card for the authenticated caller.
/// The owner is always the caller resolved by the `AuthUser` extractor; any
/// owner or id value in the request body is discarded. No access-guard call:
/// there is no existing record to address yet.
#[utoipa::path(
    post,
    path = "/cards",
    request_body = CardPayload,
    responses((status = 201, description = "Created, Location points at the new card"))
)]
pub async fn create_card(
    AuthUser { username, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CardPayload>,
) -> Result<impl IntoResponse, StatusCode> {
    let card = state
        .repo
        .insert(payload.amount, &username)
        .await
        .map_err(storage_error)?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/cards/{}", card.id))],
    ))
}

/// list_cards
///
/// [Owner Route] Lists the caller's cards as a paged, sorted JSON array.
/// The owner filter sits inside the storage query ahead of pagination, so no
/// page/size/sort combination can surface another owner's cards. An identity
/// owning no cards gets an empty page, not an error.
#[utoipa::path(
    get,
    path = "/cards",
    params(PageFilter),
    responses((status = 200, description = "Page of the caller's cards", body = [Card]))
)]
pub async fn list_cards(
    AuthUser { username, .. }: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<PageFilter>,
) -> Result<Json<Vec<Card>>, StatusCode> {
    let page = filter.resolve()?;
    let cards = state
        .repo
        .find_all_by_owner(&username, page)
        .await
        .map_err(storage_error)?;
    Ok(Json(cards))
}

/// get_card
///
/// [Owner Route] Retrieves a single card by id.
/// 404 covers both "absent" and "owned by someone else"; the two are
/// indistinguishable from the outside.
#[utoipa::path(
    get,
    path = "/cards/{id}",
    params(("id" = i64, Path, description = "Card ID")),
    responses(
        (status = 200, description = "Found", body = Card),
        (status = 404, description = "Absent or not owned")
    )
)]
pub async fn get_card(
    AuthUser { username, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Card>, StatusCode> {
    match resolve_owned(&state.repo, id, &username)
        .await
        .map_err(storage_error)?
    {
        Some(card) => Ok(Json(card)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// update_card
///
/// [Owner Route] Replaces the amount of an existing card. Id and owner are
/// kept from the stored record; the request body cannot change them. The
/// access guard runs before any mutation, so a rejected update changes
/// nothing.
#[utoipa::path(
    put,
    path = "/cards/{id}",
    params(("id" = i64, Path, description = "Card ID")),
    request_body = CardPayload,
    responses(
        (status = 204, description = "Updated"),
        (status = 404, description = "Absent or not owned")
    )
)]
pub async fn update_card(
    AuthUser { username, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CardPayload>,
) -> Result<StatusCode, StatusCode> {
    let card = resolve_owned(&state.repo, id, &username)
        .await
        .map_err(storage_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state
        .repo
        .replace(card.id, payload.amount)
        .await
        .map_err(storage_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// delete_card
///
/// [Owner Route] Permanently removes a card the caller owns. No soft delete;
/// the id is never reassigned by storage.
#[utoipa::path(
    delete,
    path = "/cards/{id}",
    params(("id" = i64, Path, description = "Card ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Absent or not owned")
    )
)]
pub async fn delete_card(
    AuthUser { username, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let card = resolve_owned(&state.repo, id, &username)
        .await
        .map_err(storage_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    state
        .repo
        .delete_by_id(card.id)
        .await
        .map_err(storage_error)?;
    Ok(StatusCode::NO_CONTENT)
}
