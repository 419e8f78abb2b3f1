//! Run orchestration.
//!
//! One run is one pass over the full incident dataset: rows are processed
//! strictly in input order because entity dedup depends on the single
//! run-scoped cache observing all prior insertions. No operation here
//! suspends, blocks, or performs I/O.

use std::collections::HashMap;

use tracing::warn;

use crate::assemble::GraphBuilder;
use crate::model::{GraphError, RunOutput};
use crate::normalize::{self, IncidentRow, NormalizedTechnique, TechniqueRow};
use crate::resolve::{TechniqueCatalog, UnresolvedPolicy};

/// Build the full graph for one dataset pass.
///
/// A malformed row (missing `disarm_id` or `name`) is counted and skipped; an
/// empty row source yields an empty graph and an empty report. The only error
/// that can escape is an identity-contract violation, which indicates a bug
/// rather than bad data.
pub fn build_graph(
    incidents: &[IncidentRow],
    techniques: &[TechniqueRow],
    catalog: &TechniqueCatalog,
    policy: UnresolvedPolicy,
) -> Result<RunOutput, GraphError> {
    let techniques_by_incident = group_techniques(techniques);
    let mut builder = GraphBuilder::with_policy(policy);

    for (index, row) in incidents.iter().enumerate() {
        let incident = match normalize::normalize_incident(row) {
            Ok(incident) => incident,
            Err(missing) => {
                warn!(row = index, %missing, "skipping malformed incident row");
                builder.record_malformed();
                continue;
            }
        };

        let incident_techniques = techniques_by_incident
            .get(incident.code.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        builder.assemble_incident(&incident, incident_techniques, catalog)?;
    }

    Ok(builder.finish())
}

/// Group technique rows by owning incident once, so per-incident lookup does
/// not rescan the whole technique sheet.
fn group_techniques(rows: &[TechniqueRow]) -> HashMap<String, Vec<NormalizedTechnique>> {
    let mut grouped: HashMap<String, Vec<NormalizedTechnique>> = HashMap::new();
    for row in rows {
        let Some(incident_id) = normalize::clean(row.incident_id.as_deref()) else {
            continue;
        };
        let Some(technique) = normalize::normalize_technique(row) else {
            continue;
        };
        grouped.entry(incident_id).or_default().push(technique);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_empty_output() {
        let output = build_graph(
            &[],
            &[],
            &TechniqueCatalog::default(),
            UnresolvedPolicy::Skip,
        )
        .unwrap();
        assert!(output.graph.is_empty());
        assert_eq!(output.report.resolved, 0);
        assert!(output.report.unresolved.is_empty());
        assert_eq!(output.report.malformed_rows, 0);
    }

    #[test]
    fn test_technique_rows_without_incident_id_are_ignored() {
        let rows = vec![TechniqueRow {
            incident_id: None,
            technique_ids: Some("T0001".to_string()),
            summary: None,
        }];
        assert!(group_techniques(&rows).is_empty());
    }
}
