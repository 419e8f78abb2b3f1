//! Record normalization.
//!
//! Raw sheet rows arrive as optional strings: a missing or blank cell is
//! `None`, never an empty string the graph logic has to re-check. This module
//! validates and defaults every field exactly once, so nothing downstream
//! touches raw cells. Normalization is total over well-formed rows (absent
//! or malformed values become the absent marker, not an error); the only
//! rejection is a row missing one of its required key columns.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of the `incidents` sheet, as produced by a row-source collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentRow {
    pub disarm_id: Option<String>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub found_in_country: Option<String>,
    pub attributions_seen: Option<String>,
    pub year_started: Option<f64>,
    pub urls: Option<String>,
    pub notes: Option<String>,
    pub found_via: Option<String>,
}

/// One row of the `incidenttechniques` sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechniqueRow {
    pub incident_id: Option<String>,
    pub technique_ids: Option<String>,
    pub summary: Option<String>,
}

/// A row missing one of its required key columns. Such rows are skipped and
/// counted by the orchestrator, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("row is missing required column `{0}`")]
pub struct MissingColumn(pub &'static str);

/// Sentinel actor used when a row carries no attribution.
pub const UNKNOWN_ACTOR: &str = "Unknown";

/// An incident row with every field validated and defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedIncident {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub countries: Vec<String>,
    /// Never empty: defaults to `[UNKNOWN_ACTOR]` when attribution is absent.
    pub actors: Vec<String>,
    pub urls: Vec<String>,
    pub notes: Option<String>,
    pub first_seen_year: Option<u16>,
    pub found_via: Option<String>,
}

/// A technique row reduced to its local code and summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTechnique {
    pub local_code: String,
    pub summary: Option<String>,
}

/// Normalize one incident row.
pub fn normalize_incident(row: &IncidentRow) -> Result<NormalizedIncident, MissingColumn> {
    let code = required(&row.disarm_id, "disarm_id")?;
    let name = required(&row.name, "name")?;

    let mut actors = split_list(row.attributions_seen.as_deref());
    if actors.is_empty() {
        actors.push(UNKNOWN_ACTOR.to_string());
    }

    Ok(NormalizedIncident {
        code,
        name,
        description: clean(row.summary.as_deref()),
        countries: split_list(row.found_in_country.as_deref()),
        actors,
        urls: split_list(row.urls.as_deref()),
        notes: clean(row.notes.as_deref()),
        first_seen_year: finite_year(row.year_started),
        found_via: clean(row.found_via.as_deref()),
    })
}

/// Normalize one technique row. `None` when the row has no usable code.
pub fn normalize_technique(row: &TechniqueRow) -> Option<NormalizedTechnique> {
    let local_code = clean(row.technique_ids.as_deref())?;
    Some(NormalizedTechnique {
        local_code,
        summary: clean(row.summary.as_deref()),
    })
}

/// Normalize the technique rows associated with one incident, dropping
/// entries with an absent or empty code.
pub fn normalize_techniques(rows: &[TechniqueRow]) -> Vec<NormalizedTechnique> {
    rows.iter().filter_map(normalize_technique).collect()
}

fn required(value: &Option<String>, column: &'static str) -> Result<String, MissingColumn> {
    clean(value.as_deref()).ok_or(MissingColumn(column))
}

/// Trim, mapping blank and whitespace-only values to absent.
pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a comma-delimited cell into trimmed, non-empty tokens, preserving
/// order.
fn split_list(value: Option<&str>) -> Vec<String> {
    match value {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Sheet parsing can surface NaN or ±infinity for numeric cells; map those to
/// absent along with anything that does not fit a calendar year.
fn finite_year(value: Option<f64>) -> Option<u16> {
    let year = value?;
    if !year.is_finite() {
        return None;
    }
    u16::try_from(year as i64).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_row() -> IncidentRow {
        IncidentRow {
            disarm_id: Some("I00001".to_string()),
            name: Some("Op X".to_string()),
            ..IncidentRow::default()
        }
    }

    #[test]
    fn test_country_list_is_split_and_trimmed() {
        let row = IncidentRow {
            found_in_country: Some(" US , UK ,,  ".to_string()),
            ..minimal_row()
        };
        let incident = normalize_incident(&row).unwrap();
        assert_eq!(incident.countries, vec!["US", "UK"]);
    }

    #[test]
    fn test_absent_attribution_defaults_to_unknown() {
        let incident = normalize_incident(&minimal_row()).unwrap();
        assert_eq!(incident.actors, vec![UNKNOWN_ACTOR]);

        let blank = IncidentRow {
            attributions_seen: Some("   ".to_string()),
            ..minimal_row()
        };
        let incident = normalize_incident(&blank).unwrap();
        assert_eq!(incident.actors, vec![UNKNOWN_ACTOR]);
    }

    #[test]
    fn test_missing_required_columns_are_rejected() {
        let no_id = IncidentRow {
            disarm_id: None,
            ..minimal_row()
        };
        assert_eq!(
            normalize_incident(&no_id).unwrap_err(),
            MissingColumn("disarm_id")
        );

        let blank_name = IncidentRow {
            name: Some("  ".to_string()),
            ..minimal_row()
        };
        assert_eq!(
            normalize_incident(&blank_name).unwrap_err(),
            MissingColumn("name")
        );
    }

    #[test]
    fn test_non_finite_year_becomes_absent() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let row = IncidentRow {
                year_started: Some(bad),
                ..minimal_row()
            };
            assert_eq!(normalize_incident(&row).unwrap().first_seen_year, None);
        }

        let row = IncidentRow {
            year_started: Some(2016.0),
            ..minimal_row()
        };
        assert_eq!(normalize_incident(&row).unwrap().first_seen_year, Some(2016));
    }

    #[test]
    fn test_fields_are_trimmed() {
        let row = IncidentRow {
            disarm_id: Some("  I00001 ".to_string()),
            name: Some(" Op X ".to_string()),
            summary: Some("  desc ".to_string()),
            ..IncidentRow::default()
        };
        let incident = normalize_incident(&row).unwrap();
        assert_eq!(incident.code, "I00001");
        assert_eq!(incident.name, "Op X");
        assert_eq!(incident.description.as_deref(), Some("desc"));
    }

    #[test]
    fn test_techniques_without_code_are_dropped() {
        let rows = vec![
            TechniqueRow {
                incident_id: Some("I00001".to_string()),
                technique_ids: Some("T0001".to_string()),
                summary: Some("tech desc".to_string()),
            },
            TechniqueRow {
                incident_id: Some("I00001".to_string()),
                technique_ids: None,
                summary: Some("no code".to_string()),
            },
            TechniqueRow {
                incident_id: Some("I00001".to_string()),
                technique_ids: Some("  ".to_string()),
                summary: None,
            },
        ];
        let techniques = normalize_techniques(&rows);
        assert_eq!(techniques.len(), 1);
        assert_eq!(techniques[0].local_code, "T0001");
        assert_eq!(techniques[0].summary.as_deref(), Some("tech desc"));
    }
}
