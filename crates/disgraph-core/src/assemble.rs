//! Per-incident graph assembly.
//!
//! [`GraphBuilder`] is the run-scoped accumulator: an insertion-ordered
//! entity cache keyed by `(kind, natural key)`, an append-only relationship
//! list, and the resolution counters. It is owned by the orchestrator and
//! threaded through the run explicitly; there is no ambient state.

use indexmap::IndexMap;
use tracing::debug;

use crate::identity;
use crate::model::{
    AttackPattern, Entity, EntityKind, Graph, GraphError, IntrusionSet, Location, RelationKind,
    Relationship, ResolutionReport, RunOutput, StixId, ThreatActor, UnresolvedTechnique,
    NATION_STATE,
};
use crate::normalize::{NormalizedIncident, NormalizedTechnique};
use crate::resolve::{TechniqueCatalog, UnresolvedPolicy};

#[derive(Debug, Default)]
pub struct GraphBuilder {
    entities: IndexMap<(EntityKind, String), Entity>,
    relationships: Vec<Relationship>,
    resolved: usize,
    unresolved: Vec<UnresolvedTechnique>,
    malformed_rows: usize,
    policy: UnresolvedPolicy,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: UnresolvedPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Fold one normalized incident and its techniques into the run.
    ///
    /// An incident with no techniques, no actors, or no countries still
    /// contributes whatever subset of entities and relationships is
    /// well-defined. The only failure mode is an identity-contract violation.
    pub fn assemble_incident(
        &mut self,
        incident: &NormalizedIncident,
        techniques: &[NormalizedTechnique],
        catalog: &TechniqueCatalog,
    ) -> Result<(), GraphError> {
        let incident_ref = self.intern_incident(incident)?;
        let actor_refs = incident
            .actors
            .iter()
            .map(|actor| self.intern_actor(actor))
            .collect::<Result<Vec<_>, _>>()?;
        let location_refs = incident
            .countries
            .iter()
            .map(|country| self.intern_location(country))
            .collect::<Result<Vec<_>, _>>()?;

        let mut technique_refs = Vec::with_capacity(techniques.len());
        for technique in techniques {
            let canonical = if let Some(id) = catalog.resolve(&technique.local_code) {
                self.resolved += 1;
                id.clone()
            } else {
                self.unresolved.push(UnresolvedTechnique {
                    incident: incident.code.clone(),
                    code: technique.local_code.clone(),
                });
                match self.policy {
                    UnresolvedPolicy::Skip => {
                        debug!(
                            incident = %incident.code,
                            code = %technique.local_code,
                            "technique code not in catalog, skipping"
                        );
                        continue;
                    }
                    UnresolvedPolicy::MintLocal => self.intern_local_technique(technique)?,
                }
            };

            for actor_ref in &actor_refs {
                self.relate(actor_ref.clone(), RelationKind::Uses, canonical.clone());
            }
            for location_ref in &location_refs {
                self.relate(canonical.clone(), RelationKind::Targets, location_ref.clone());
            }
            technique_refs.push(canonical);
        }

        for technique_ref in &technique_refs {
            self.relate(incident_ref.clone(), RelationKind::Uses, technique_ref.clone());
        }
        for actor_ref in &actor_refs {
            self.relate(
                incident_ref.clone(),
                RelationKind::AttributedTo,
                actor_ref.clone(),
            );
        }
        for location_ref in &location_refs {
            self.relate(incident_ref.clone(), RelationKind::Targets, location_ref.clone());
        }

        Ok(())
    }

    /// Count an incident row the normalizer rejected.
    pub fn record_malformed(&mut self) {
        self.malformed_rows += 1;
    }

    /// Hand the accumulated graph and report to the caller, consuming the
    /// builder. Entities come out in first-appearance order.
    pub fn finish(self) -> RunOutput {
        RunOutput {
            graph: Graph {
                entities: self.entities.into_values().collect(),
                relationships: self.relationships,
            },
            report: ResolutionReport {
                resolved: self.resolved,
                unresolved: self.unresolved,
                malformed_rows: self.malformed_rows,
            },
        }
    }

    fn intern_incident(&mut self, incident: &NormalizedIncident) -> Result<StixId, GraphError> {
        self.intern_with(EntityKind::IntrusionSet, &incident.code, |id| {
            Entity::IntrusionSet(IntrusionSet {
                id,
                code: incident.code.clone(),
                name: incident.name.clone(),
                description: incident.description.clone(),
                countries: incident.countries.clone(),
                actors: incident.actors.clone(),
                urls: incident.urls.clone(),
                notes: incident.notes.clone(),
                first_seen_year: incident.first_seen_year,
                found_via: incident.found_via.clone(),
            })
        })
    }

    fn intern_actor(&mut self, name: &str) -> Result<StixId, GraphError> {
        self.intern_with(EntityKind::ThreatActor, name, |id| {
            Entity::ThreatActor(ThreatActor {
                id,
                name: name.to_string(),
                actor_class: NATION_STATE.to_string(),
            })
        })
    }

    fn intern_location(&mut self, country: &str) -> Result<StixId, GraphError> {
        self.intern_with(EntityKind::Location, country, |id| {
            Entity::Location(Location {
                id,
                country: country.to_string(),
            })
        })
    }

    fn intern_local_technique(
        &mut self,
        technique: &NormalizedTechnique,
    ) -> Result<StixId, GraphError> {
        self.intern_with(EntityKind::AttackPattern, &technique.local_code, |id| {
            Entity::AttackPattern(AttackPattern {
                id,
                code: technique.local_code.clone(),
                name: technique.local_code.clone(),
                description: technique.summary.clone(),
            })
        })
    }

    /// Return the cached entity for `(kind, natural_key)`, minting it on
    /// first encounter. A cached entity is reused, never recreated.
    fn intern_with<F>(
        &mut self,
        kind: EntityKind,
        natural_key: &str,
        make: F,
    ) -> Result<StixId, GraphError>
    where
        F: FnOnce(StixId) -> Entity,
    {
        let cache_key = (kind, natural_key.to_string());
        if let Some(entity) = self.entities.get(&cache_key) {
            return Ok(entity.id().clone());
        }
        let id = identity::assign(kind, natural_key)?;
        self.entities.insert(cache_key, make(id.clone()));
        Ok(id)
    }

    fn relate(&mut self, source_ref: StixId, kind: RelationKind, target_ref: StixId) {
        let id = identity::assign_relationship(&source_ref, kind, &target_ref);
        self.relationships.push(Relationship {
            id,
            source_ref,
            kind,
            target_ref,
        });
    }
}
