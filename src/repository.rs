use crate::models::Card;
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicI64, Ordering},
};

// --- Pagination & Sorting ---

/// SortField
///
/// Whitelist of sortable card columns. The list query interpolates the column
/// name into SQL, so it must never come from raw client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Id,
    #[default]
    Amount,
    Owner,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Amount => "amount",
            SortField::Owner => "owner",
        }
    }

    /// Parses a client-supplied field name. Anything outside the whitelist is
    /// rejected so the caller can surface a validation failure.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "id" => Some(SortField::Id),
            "amount" => Some(SortField::Amount),
            "owner" => Some(SortField::Owner),
            _ => None,
        }
    }
}

/// SortDirection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// PageRequest
///
/// Resolved pagination and sorting parameters for the owner-scoped list query.
/// Defaults mirror the original behavior: page 0, size 20, amount ascending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
}

impl PageRequest {
    /// Row offset of this page. Saturates instead of overflowing, so an
    /// absurdly large page index degrades to an empty page rather than a
    /// panic; the HTTP layer rejects such requests before they get here.
    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: 20,
            sort_field: SortField::Amount,
            sort_direction: SortDirection::Asc,
        }
    }
}

// --- Repository Contract ---

/// CardRepository Trait
///
/// The abstract contract for the storage collaborator. Handlers and the access
/// guard interact with persistence only through this trait, so the concrete
/// backend (Postgres in deployment, the in-memory store in tests and local
/// experiments) can be swapped freely.
///
/// Ownership semantics owned by the callers:
/// - `find_all_by_owner` filters to the owner *before* pagination, so page
///   boundaries are computed only over the caller's own cards.
/// - `replace` and `delete_by_id` assume the caller has already confirmed
///   ownership through the access guard.
///
/// Every method surfaces storage failures as `sqlx::Error`; callers propagate
/// them unchanged as a service failure. There is no retry path.
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Persists a new card. Storage assigns the id; ids are never reused.
    async fn insert(&self, amount: f64, owner: &str) -> Result<Card, sqlx::Error>;

    /// Plain lookup by id, no ownership filter. Only the access guard calls
    /// this; it applies the owner check on the result.
    async fn find_by_id(&self, id: i64) -> Result<Option<Card>, sqlx::Error>;

    /// Owner-filtered, ordered page of cards.
    async fn find_all_by_owner(
        &self,
        owner: &str,
        page: PageRequest,
    ) -> Result<Vec<Card>, sqlx::Error>;

    /// Replaces the amount of an existing card. Id and owner are untouched.
    async fn replace(&self, id: i64, amount: f64) -> Result<(), sqlx::Error>;

    /// Permanently removes a card.
    async fn delete_by_id(&self, id: i64) -> Result<(), sqlx::Error>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn CardRepository>;

// --- Postgres Implementation ---

/// PostgresCardRepository
///
/// The deployment implementation of `CardRepository`, backed by PostgreSQL.
pub struct PostgresCardRepository {
    pool: PgPool,
}

impl PostgresCardRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CardRepository for PostgresCardRepository {
    async fn insert(&self, amount: f64, owner: &str) -> Result<Card, sqlx::Error> {
        sqlx::query_as::<_, Card>(
            "INSERT INTO cards (amount, owner) VALUES ($1, $2) RETURNING id, amount, owner",
        )
        .bind(amount)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Card>, sqlx::Error> {
        sqlx::query_as::<_, Card>("SELECT id, amount, owner FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// find_all_by_owner
    ///
    /// Uses QueryBuilder for safe parameterization. The owner filter is part of
    /// the base query, ahead of ORDER BY / LIMIT / OFFSET, so no page or sort
    /// combination can ever expose another owner's cards. The sort column and
    /// direction come from the whitelisted enums, never from raw input.
    async fn find_all_by_owner(
        &self,
        owner: &str,
        page: PageRequest,
    ) -> Result<Vec<Card>, sqlx::Error> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT id, amount, owner FROM cards WHERE owner = ");
        builder.push_bind(owner);

        builder.push(" ORDER BY ");
        builder.push(page.sort_field.column());
        builder.push(" ");
        builder.push(page.sort_direction.keyword());

        builder.push(" LIMIT ");
        builder.push_bind(page.size);
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        builder.build_query_as::<Card>().fetch_all(&self.pool).await
    }

    async fn replace(&self, id: i64, amount: f64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE cards SET amount = $1 WHERE id = $2")
            .bind(amount)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM cards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// --- In-Memory Implementation (Tests & Local Experiments) ---

/// InMemoryCardRepository
///
/// A full `CardRepository` implementation over a HashMap, used by the
/// end-to-end tests so the whole HTTP surface can be exercised without a
/// database. Id assignment is a monotonic counter, so deleted ids are never
/// reassigned, matching the Postgres BIGSERIAL behavior.
pub struct InMemoryCardRepository {
    cards: Mutex<HashMap<i64, Card>>,
    next_id: AtomicI64,
}

impl InMemoryCardRepository {
    pub fn new() -> Self {
        Self {
            cards: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Builds a store pre-populated with the given cards. The id counter is
    /// advanced past the highest seeded id.
    pub fn with_cards(seed: Vec<Card>) -> Self {
        let next = seed.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let cards = seed.into_iter().map(|c| (c.id, c)).collect();
        Self {
            cards: Mutex::new(cards),
            next_id: AtomicI64::new(next),
        }
    }
}

impl Default for InMemoryCardRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CardRepository for InMemoryCardRepository {
    async fn insert(&self, amount: f64, owner: &str) -> Result<Card, sqlx::Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let card = Card {
            id,
            amount,
            owner: owner.to_string(),
        };
        self.cards
            .lock()
            .expect("cards mutex poisoned")
            .insert(id, card.clone());
        Ok(card)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Card>, sqlx::Error> {
        Ok(self
            .cards
            .lock()
            .expect("cards mutex poisoned")
            .get(&id)
            .cloned())
    }

    async fn find_all_by_owner(
        &self,
        owner: &str,
        page: PageRequest,
    ) -> Result<Vec<Card>, sqlx::Error> {
        let mut owned: Vec<Card> = self
            .cards
            .lock()
            .expect("cards mutex poisoned")
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();

        owned.sort_by(|a, b| {
            let ord = match page.sort_field {
                SortField::Id => a.id.cmp(&b.id),
                SortField::Amount => a.amount.total_cmp(&b.amount),
                SortField::Owner => a.owner.cmp(&b.owner),
            };
            let ord = match page.sort_direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            // Tied sort keys fall back to id so page boundaries are stable
            // across requests despite the HashMap's iteration order.
            ord.then_with(|| a.id.cmp(&b.id))
        });

        let start = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(owned
            .into_iter()
            .skip(start)
            .take(page.size as usize)
            .collect())
    }

    async fn replace(&self, id: i64, amount: f64) -> Result<(), sqlx::Error> {
        if let Some(card) = self
            .cards
            .lock()
            .expect("cards mutex poisoned")
            .get_mut(&id)
        {
            card.amount = amount;
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), sqlx::Error> {
        self.cards.lock().expect("cards mutex poisoned").remove(&id);
        Ok(())
    }
}
