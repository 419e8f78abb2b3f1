//! disgraph-core: deterministic entity-graph builder for disinformation
//! incident data.
//!
//! The builder turns tabular incident records (plus their associated
//! technique rows) into a deduplicated set of typed entities and
//! relationships ready for a threat intelligence platform:
//!
//! ```text
//!   incident rows ──► normalize ──► assemble ──► Graph + ResolutionReport
//!                        │             ▲
//!   technique rows ──────┘   identity ─┤
//!                    catalog ► resolve ┘
//! ```
//!
//! Identity is content-derived (v5 UUIDs over natural keys), so re-running
//! the builder on unchanged input yields byte-identical identifiers and
//! repeated uploads merge into the platform's existing graph. Technique
//! references resolve against an externally supplied catalog; misses are
//! recorded in the run report and skipped, never fatal.
//!
//! This crate performs no I/O. Spreadsheet fetching, catalog retrieval, and
//! platform upload live in collaborator crates.

pub mod assemble;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod orchestrate;
pub mod resolve;

pub use assemble::GraphBuilder;
pub use model::{
    AttackPattern, Entity, EntityKind, Graph, GraphError, IntrusionSet, Location, RelationKind,
    Relationship, ResolutionReport, RunOutput, StixId, ThreatActor, UnresolvedTechnique,
};
pub use normalize::{
    IncidentRow, NormalizedIncident, NormalizedTechnique, TechniqueRow, UNKNOWN_ACTOR,
};
pub use orchestrate::build_graph;
pub use resolve::{CatalogEntry, TechniqueCatalog, UnresolvedPolicy};
