//! Builder-level tests: dedup, partial resolution, degraded rows, and the
//! full end-to-end scenario.

use disgraph_core::{
    build_graph, CatalogEntry, Entity, EntityKind, IncidentRow, RelationKind, StixId,
    TechniqueCatalog, TechniqueRow, UnresolvedPolicy, UNKNOWN_ACTOR,
};

fn incident(id: &str, name: &str, countries: Option<&str>, actors: Option<&str>) -> IncidentRow {
    IncidentRow {
        disarm_id: Some(id.to_string()),
        name: Some(name.to_string()),
        summary: Some("desc".to_string()),
        found_in_country: countries.map(str::to_string),
        attributions_seen: actors.map(str::to_string),
        ..IncidentRow::default()
    }
}

fn technique(incident_id: &str, code: &str) -> TechniqueRow {
    TechniqueRow {
        incident_id: Some(incident_id.to_string()),
        technique_ids: Some(code.to_string()),
        summary: Some("tech desc".to_string()),
    }
}

fn catalog() -> TechniqueCatalog {
    TechniqueCatalog::from_entries(vec![CatalogEntry {
        code: "T001".to_string(),
        canonical_id: StixId::from("attack-pattern--xyz"),
    }])
}

fn entity_keys(entities: &[Entity]) -> Vec<(EntityKind, String)> {
    entities
        .iter()
        .map(|e| (e.kind(), e.natural_key().to_string()))
        .collect()
}

fn has_relationship(
    output: &disgraph_core::RunOutput,
    source: &str,
    kind: RelationKind,
    target: &str,
) -> bool {
    output.graph.relationships.iter().any(|rel| {
        rel.source_ref.as_str() == source
            && rel.kind == kind
            && rel.target_ref.as_str() == target
    })
}

fn id_of(output: &disgraph_core::RunOutput, kind: EntityKind, key: &str) -> String {
    output
        .graph
        .entities
        .iter()
        .find(|e| e.kind() == kind && e.natural_key() == key)
        .map(|e| e.id().as_str().to_string())
        .unwrap_or_else(|| panic!("no {kind:?} entity with key {key}"))
}

#[test]
fn test_end_to_end_scenario() {
    let incidents = vec![incident("INC1", "Op X", Some("US,UK"), Some("Russia"))];
    let techniques = vec![technique("INC1", "T001")];

    let output = build_graph(&incidents, &techniques, &catalog(), UnresolvedPolicy::Skip).unwrap();

    let keys = entity_keys(&output.graph.entities);
    assert_eq!(
        keys,
        vec![
            (EntityKind::IntrusionSet, "INC1".to_string()),
            (EntityKind::ThreatActor, "Russia".to_string()),
            (EntityKind::Location, "US".to_string()),
            (EntityKind::Location, "UK".to_string()),
        ]
    );

    let inc = id_of(&output, EntityKind::IntrusionSet, "INC1");
    let actor = id_of(&output, EntityKind::ThreatActor, "Russia");
    let us = id_of(&output, EntityKind::Location, "US");
    let uk = id_of(&output, EntityKind::Location, "UK");
    let tech = "attack-pattern--xyz";

    assert!(has_relationship(&output, &inc, RelationKind::Uses, tech));
    assert!(has_relationship(&output, &actor, RelationKind::Uses, tech));
    assert!(has_relationship(&output, tech, RelationKind::Targets, &us));
    assert!(has_relationship(&output, tech, RelationKind::Targets, &uk));
    assert!(has_relationship(&output, &inc, RelationKind::AttributedTo, &actor));
    assert!(has_relationship(&output, &inc, RelationKind::Targets, &us));
    assert!(has_relationship(&output, &inc, RelationKind::Targets, &uk));
    assert_eq!(output.graph.relationships.len(), 7);

    assert_eq!(output.report.resolved, 1);
    assert!(output.report.unresolved.is_empty());
    assert_eq!(output.report.malformed_rows, 0);
}

#[test]
fn test_shared_actor_is_deduplicated() {
    let incidents = vec![
        incident("INC1", "Op X", Some("US"), Some("Russia")),
        incident("INC2", "Op Y", Some("FR"), Some("Russia")),
    ];

    let output = build_graph(&incidents, &[], &catalog(), UnresolvedPolicy::Skip).unwrap();

    let actors: Vec<&Entity> = output
        .graph
        .entities
        .iter()
        .filter(|e| e.kind() == EntityKind::ThreatActor)
        .collect();
    assert_eq!(actors.len(), 1, "one ThreatActor entity for both incidents");
    assert_eq!(actors[0].natural_key(), "Russia");

    // Both incidents still point at the shared actor.
    let actor_id = actors[0].id().as_str();
    let inc1 = id_of(&output, EntityKind::IntrusionSet, "INC1");
    let inc2 = id_of(&output, EntityKind::IntrusionSet, "INC2");
    assert!(has_relationship(&output, &inc1, RelationKind::AttributedTo, actor_id));
    assert!(has_relationship(&output, &inc2, RelationKind::AttributedTo, actor_id));
}

#[test]
fn test_partial_resolution_skips_only_the_miss() {
    let incidents = vec![incident("INC1", "Op X", Some("US"), Some("Russia"))];
    let techniques = vec![technique("INC1", "T001"), technique("INC1", "T404")];

    let output = build_graph(&incidents, &techniques, &catalog(), UnresolvedPolicy::Skip).unwrap();

    assert_eq!(output.report.resolved, 1);
    assert_eq!(output.report.unresolved.len(), 1);
    assert_eq!(output.report.unresolved[0].incident, "INC1");
    assert_eq!(output.report.unresolved[0].code, "T404");

    // No relationship touches the unresolved code; the resolved technique
    // keeps its full fan-out (actor uses, targets, incident uses).
    assert!(output
        .graph
        .relationships
        .iter()
        .all(|rel| !rel.target_ref.as_str().contains("T404")));
    let tech_edges = output
        .graph
        .relationships
        .iter()
        .filter(|rel| {
            rel.source_ref.as_str() == "attack-pattern--xyz"
                || rel.target_ref.as_str() == "attack-pattern--xyz"
        })
        .count();
    assert_eq!(tech_edges, 3);
}

#[test]
fn test_no_countries_still_yields_incident_and_attribution() {
    let incidents = vec![incident("INC1", "Op X", None, Some("Russia"))];

    let output = build_graph(&incidents, &[], &catalog(), UnresolvedPolicy::Skip).unwrap();

    assert!(output
        .graph
        .relationships
        .iter()
        .all(|rel| rel.kind != RelationKind::Targets));
    let inc = id_of(&output, EntityKind::IntrusionSet, "INC1");
    let actor = id_of(&output, EntityKind::ThreatActor, "Russia");
    assert!(has_relationship(&output, &inc, RelationKind::AttributedTo, &actor));
}

#[test]
fn test_absent_attribution_yields_unknown_actor() {
    let incidents = vec![incident("INC1", "Op X", Some("US"), None)];

    let output = build_graph(&incidents, &[], &catalog(), UnresolvedPolicy::Skip).unwrap();

    let actor = id_of(&output, EntityKind::ThreatActor, UNKNOWN_ACTOR);
    let inc = id_of(&output, EntityKind::IntrusionSet, "INC1");
    assert!(has_relationship(&output, &inc, RelationKind::AttributedTo, &actor));
}

#[test]
fn test_merge_is_order_independent() {
    let a = incident("INC1", "Op X", Some("US,UK"), Some("Russia"));
    let b = incident("INC2", "Op Y", Some("UK"), Some("Russia,Iran"));
    let techniques = vec![technique("INC1", "T001"), technique("INC2", "T001")];

    let forward = build_graph(
        &[a.clone(), b.clone()],
        &techniques,
        &catalog(),
        UnresolvedPolicy::Skip,
    )
    .unwrap();
    let backward = build_graph(&[b, a], &techniques, &catalog(), UnresolvedPolicy::Skip).unwrap();

    let mut forward_keys = entity_keys(&forward.graph.entities);
    let mut backward_keys = entity_keys(&backward.graph.entities);
    forward_keys.sort();
    backward_keys.sort();
    assert_eq!(forward_keys, backward_keys);

    // Identity is order-independent even though first-appearance order isn't.
    for entity in &forward.graph.entities {
        let twin = backward
            .graph
            .entities
            .iter()
            .find(|e| e.kind() == entity.kind() && e.natural_key() == entity.natural_key())
            .expect("entity present in both runs");
        assert_eq!(entity.id(), twin.id());
    }
}

#[test]
fn test_malformed_rows_are_counted_not_fatal() {
    let incidents = vec![
        IncidentRow::default(),
        incident("INC1", "Op X", Some("US"), Some("Russia")),
        IncidentRow {
            disarm_id: Some("INC2".to_string()),
            name: None,
            ..IncidentRow::default()
        },
    ];

    let output = build_graph(&incidents, &[], &catalog(), UnresolvedPolicy::Skip).unwrap();

    assert_eq!(output.report.malformed_rows, 2);
    assert_eq!(
        output
            .graph
            .entities
            .iter()
            .filter(|e| e.kind() == EntityKind::IntrusionSet)
            .count(),
        1
    );
}

#[test]
fn test_mint_local_policy_materializes_the_miss() {
    let incidents = vec![incident("INC1", "Op X", Some("US"), Some("Russia"))];
    let techniques = vec![technique("INC1", "T404")];

    let output = build_graph(
        &incidents,
        &techniques,
        &catalog(),
        UnresolvedPolicy::MintLocal,
    )
    .unwrap();

    let minted = id_of(&output, EntityKind::AttackPattern, "T404");
    assert!(minted.starts_with("attack-pattern--"));
    let inc = id_of(&output, EntityKind::IntrusionSet, "INC1");
    assert!(has_relationship(&output, &inc, RelationKind::Uses, &minted));

    // The catalog miss is still visible in the report.
    assert_eq!(output.report.resolved, 0);
    assert_eq!(output.report.unresolved.len(), 1);
}

#[test]
fn test_empty_catalog_degrades_to_unresolved() {
    let incidents = vec![incident("INC1", "Op X", Some("US"), Some("Russia"))];
    let techniques = vec![technique("INC1", "T001")];

    let output = build_graph(
        &incidents,
        &techniques,
        &TechniqueCatalog::default(),
        UnresolvedPolicy::Skip,
    )
    .unwrap();

    assert_eq!(output.report.resolved, 0);
    assert_eq!(output.report.unresolved.len(), 1);
    assert!(output
        .graph
        .relationships
        .iter()
        .all(|rel| rel.kind != RelationKind::Uses));
}
