use crate::{models::Card, repository::RepositoryState};

/// resolve_owned
///
/// The access guard: decides whether the caller may act on the card with the
/// given id. Looks the card up by id and keeps it only if its owner equals the
/// caller identity.
///
/// `None` covers both "no such card" and "card exists under a different
/// owner". Collapsing the two keeps an authenticated-but-unauthorized caller
/// from using response codes to enumerate other users' card ids, so this must
/// stay a single outcome; do not split it into not-found vs forbidden.
///
/// Read-only; storage failures propagate unchanged.
pub async fn resolve_owned(
    repo: &RepositoryState,
    id: i64,
    caller: &str,
) -> Result<Option<Card>, sqlx::Error> {
    Ok(repo.find_by_id(id).await?.filter(|card| card.owner == caller))
}
