/// Router Module Index
///
/// Organizes the routing logic into access-segregated modules so the role gate
/// is applied explicitly at the module level (via Axum layers) rather than
/// inside individual handlers.

/// Routes accessible to all clients (health check).
pub mod public;

/// The /cards surface. Protected by the `AuthUser` extractor and the
/// card-owner role gate applied as a route layer.
pub mod cards;
