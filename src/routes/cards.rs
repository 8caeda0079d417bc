use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Cards Router Module
///
/// The full CRUD surface for money cards. Every route here requires a
/// successfully authenticated identity holding the card-owner role; the
/// `card_owner_middleware` layer in `create_router` enforces both before any
/// handler runs. Per-record ownership is then checked inside the handlers via
/// the access guard.
pub fn card_routes() -> Router<AppState> {
    Router::new()
        // POST /cards — create a card owned by the caller, 201 + Location.
        // GET  /cards — the caller's cards, paged and sorted.
        .route("/cards", post(handlers::create_card).get(handlers::list_cards))
        // GET/PUT/DELETE /cards/{id} — id-addressed operations, all funneled
        // through the access guard; absent and foreign-owned are both 404.
        .route(
            "/cards/{id}",
            get(handlers::get_card)
                .put(handlers::update_card)
                .delete(handlers::delete_card),
        )
}
