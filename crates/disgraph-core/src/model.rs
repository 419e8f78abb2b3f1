//! Graph data model shared by the builder components.
//!
//! Entities are immutable once created: the assembler mints an entity the
//! first time its natural key is seen in a run and reuses the same value for
//! every later reference. Relationship construction is append-only.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A broken caller contract, not a data-quality problem.
///
/// Malformed rows, unknown technique codes, and empty inputs are reported
/// through [`ResolutionReport`] and never abort a run; this error is reserved
/// for invariant violations that indicate a bug in the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("empty natural key for {0} entity")]
    EmptyNaturalKey(EntityKind),
}

/// The entity kinds this builder can mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    IntrusionSet,
    ThreatActor,
    Location,
    AttackPattern,
}

impl EntityKind {
    /// STIX object type string, used as the identifier prefix.
    pub fn stix_type(&self) -> &'static str {
        match self {
            EntityKind::IntrusionSet => "intrusion-set",
            EntityKind::ThreatActor => "threat-actor",
            EntityKind::Location => "location",
            EntityKind::AttackPattern => "attack-pattern",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stix_type())
    }
}

/// A STIX-style identifier, `<type>--<uuid>`.
///
/// Identifiers minted by this builder are v5 UUIDs over the entity's natural
/// key (see [`crate::identity`]); canonical technique identifiers come from
/// the external catalog verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StixId(pub String);

impl StixId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StixId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StixId {
    fn from(value: String) -> Self {
        StixId(value)
    }
}

impl From<&str> for StixId {
    fn from(value: &str) -> Self {
        StixId(value.to_string())
    }
}

/// Actor class applied to every threat actor in this domain.
pub const NATION_STATE: &str = "nation-state";

/// A disinformation incident, modeled as a STIX intrusion set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrusionSet {
    pub id: StixId,
    /// Natural key: the DISARM incident code (`disarm_id`).
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub countries: Vec<String>,
    pub actors: Vec<String>,
    pub urls: Vec<String>,
    pub notes: Option<String>,
    pub first_seen_year: Option<u16>,
    pub found_via: Option<String>,
}

/// An attributed actor. Natural key is the display name (or the `Unknown`
/// sentinel when the row carries no attribution).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatActor {
    pub id: StixId,
    pub name: String,
    pub actor_class: String,
}

/// A targeted country. The token is both identifier seed and display value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: StixId,
    pub country: String,
}

/// A locally minted technique. Only produced under
/// [`crate::resolve::UnresolvedPolicy::MintLocal`]; in the default
/// configuration techniques are references into the external catalog and are
/// never materialized here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackPattern {
    pub id: StixId,
    /// Natural key: the local technique code.
    pub code: String,
    pub name: String,
    pub description: Option<String>,
}

/// Any entity the builder can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    IntrusionSet(IntrusionSet),
    ThreatActor(ThreatActor),
    Location(Location),
    AttackPattern(AttackPattern),
}

impl Entity {
    pub fn id(&self) -> &StixId {
        match self {
            Entity::IntrusionSet(e) => &e.id,
            Entity::ThreatActor(e) => &e.id,
            Entity::Location(e) => &e.id,
            Entity::AttackPattern(e) => &e.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::IntrusionSet(_) => EntityKind::IntrusionSet,
            Entity::ThreatActor(_) => EntityKind::ThreatActor,
            Entity::Location(_) => EntityKind::Location,
            Entity::AttackPattern(_) => EntityKind::AttackPattern,
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            Entity::IntrusionSet(e) => &e.code,
            Entity::ThreatActor(e) => &e.name,
            Entity::Location(e) => &e.country,
            Entity::AttackPattern(e) => &e.code,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::IntrusionSet(e) => &e.name,
            Entity::ThreatActor(e) => &e.name,
            Entity::Location(e) => &e.country,
            Entity::AttackPattern(e) => &e.name,
        }
    }
}

/// Relation kinds emitted by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Uses,
    Targets,
    AttributedTo,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Uses => "uses",
            RelationKind::Targets => "targets",
            RelationKind::AttributedTo => "attributed-to",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered triple connecting two references.
///
/// Both endpoints exist in the run's output, with one exception: technique
/// references point outside the run into the external catalog and are
/// validated by the resolver instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: StixId,
    pub source_ref: StixId,
    pub kind: RelationKind,
    pub target_ref: StixId,
}

/// The accumulated output of one run. Entity order is first-appearance order
/// over the input rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// A technique code the catalog did not know, with its owning incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedTechnique {
    pub incident: String,
    pub code: String,
}

/// How technique resolution went over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Technique references matched against the catalog.
    pub resolved: usize,
    /// Catalog misses, in encounter order.
    pub unresolved: Vec<UnresolvedTechnique>,
    /// Incident rows skipped for missing required columns.
    pub malformed_rows: usize,
}

impl ResolutionReport {
    pub fn unresolved_count(&self) -> usize {
        self.unresolved.len()
    }
}

/// Everything one orchestrator pass hands back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub graph: Graph,
    pub report: ResolutionReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stix_id_serializes_transparently() {
        let id = StixId::from("intrusion-set--abc");
        assert_eq!(
            serde_json::to_value(&id).unwrap(),
            serde_json::json!("intrusion-set--abc")
        );
    }

    #[test]
    fn test_report_serializes_for_observability() {
        let report = ResolutionReport {
            resolved: 2,
            unresolved: vec![UnresolvedTechnique {
                incident: "I00001".to_string(),
                code: "T404".to_string(),
            }],
            malformed_rows: 1,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["resolved"], 2);
        assert_eq!(json["unresolved"][0]["code"], "T404");
        assert_eq!(json["malformed_rows"], 1);
    }
}
