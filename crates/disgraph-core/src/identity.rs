//! Deterministic identity assignment.
//!
//! Every identifier is a v5 UUID over a fixed namespace and the
//! `<kind>:<natural key>` seed, so the same natural key yields the same
//! identifier within and across runs, and repeated uploads merge into the
//! platform's existing graph instead of duplicating nodes. The kind is part
//! of the hashed seed: an actor and a location sharing a display string must
//! not collide.

use uuid::Uuid;

use crate::model::{EntityKind, GraphError, RelationKind, StixId};

/// Namespace for every identifier this builder mints. Changing it would
/// orphan previously uploaded objects, so it is fixed for the lifetime of the
/// dataset.
pub const NAMESPACE: Uuid = Uuid::from_u128(0x1234_5678_1234_5678_1234_5678_1234_5678);

/// Assign the identifier for `(kind, natural_key)`.
///
/// Callers trim the key before assignment; an empty key is a contract
/// violation and fails loudly rather than minting an id for the empty string.
pub fn assign(kind: EntityKind, natural_key: &str) -> Result<StixId, GraphError> {
    if natural_key.is_empty() {
        return Err(GraphError::EmptyNaturalKey(kind));
    }
    let seed = format!("{}:{}", kind.stix_type(), natural_key);
    let uuid = Uuid::new_v5(&NAMESPACE, seed.as_bytes());
    Ok(StixId(format!("{}--{}", kind.stix_type(), uuid)))
}

/// Relationship identifiers are derived from their endpoints and kind, so a
/// re-run emits the same edge ids and the platform can merge instead of
/// appending duplicates.
pub fn assign_relationship(source: &StixId, kind: RelationKind, target: &StixId) -> StixId {
    let seed = format!("relationship:{}:{}:{}", source, kind.as_str(), target);
    let uuid = Uuid::new_v5(&NAMESPACE, seed.as_bytes());
    StixId(format!("relationship--{uuid}"))
}
