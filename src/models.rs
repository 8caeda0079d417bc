use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// Card
///
/// Represents a single money card record from the `public.cards` table.
/// This is the sole entity of the application and the primary data structure
/// for the ownership-scoped access protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Card {
    /// Assigned by storage at creation time, immutable thereafter, never reused.
    pub id: i64,
    /// Signed monetary value. No currency field; the original system models
    /// the amount as a double, so the column is DOUBLE PRECISION.
    pub amount: f64,
    /// The identity string of the creating principal. Set exactly once, at
    /// creation, from the authenticated caller. Never taken from client input,
    /// even on update.
    pub owner: String,
}

/// --- Request Payloads (Input Schemas) ---

/// CardPayload
///
/// Input payload for POST /cards and PUT /cards/{id}.
/// Only `amount` is read. Clients may send `id` or `owner` fields in the body;
/// serde drops unknown fields, so they can never influence the stored record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CardPayload {
    pub amount: f64,
}
