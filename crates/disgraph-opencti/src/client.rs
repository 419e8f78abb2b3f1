//! Minimal OpenCTI GraphQL client.
//!
//! Only the two platform calls the pipeline needs: listing attack patterns
//! (the technique catalog) and pushing a STIX bundle for import. Everything
//! else about the platform stays behind this boundary.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use disgraph_core::{CatalogEntry, StixId};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::bundle::Bundle;

const CATALOG_PAGE_SIZE: usize = 500;

const ATTACK_PATTERNS_QUERY: &str = r#"
query DisgraphAttackPatterns($first: Int!, $after: ID) {
  attackPatterns(first: $first, after: $after) {
    edges { node { standard_id x_mitre_id } }
    pageInfo { endCursor hasNextPage }
  }
}
"#;

const IMPORT_BUNDLE_MUTATION: &str = r#"
mutation DisgraphImportBundle($bundle: String!) {
  stixBundlePush(connectorId: "disgraph", bundle: $bundle)
}
"#;

pub struct OpenCtiClient {
    base_url: String,
    token: String,
    http: reqwest::blocking::Client,
}

impl OpenCtiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }

    /// Fetch the platform's attack-pattern catalog, following pagination to
    /// the end. Records without a local code are dropped: they cannot be
    /// matched against sheet data.
    pub fn attack_pattern_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let data = self.graphql(
                ATTACK_PATTERNS_QUERY,
                json!({ "first": CATALOG_PAGE_SIZE, "after": after }),
            )?;
            let connection = data
                .get("attackPatterns")
                .ok_or_else(|| anyhow!("platform response missing attackPatterns"))?;

            let edges = connection
                .get("edges")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            for edge in edges {
                let node = edge.get("node");
                let code = node
                    .and_then(|n| n.get("x_mitre_id"))
                    .and_then(Value::as_str);
                let canonical = node
                    .and_then(|n| n.get("standard_id"))
                    .and_then(Value::as_str);
                if let (Some(code), Some(canonical)) = (code, canonical) {
                    entries.push(CatalogEntry {
                        code: code.to_string(),
                        canonical_id: StixId::from(canonical),
                    });
                }
            }

            let page_info = connection.get("pageInfo");
            let has_next = page_info
                .and_then(|p| p.get("hasNextPage"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !has_next {
                break;
            }
            after = page_info
                .and_then(|p| p.get("endCursor"))
                .and_then(Value::as_str)
                .map(str::to_string);
            if after.is_none() {
                break;
            }
        }

        info!(entries = entries.len(), "fetched attack-pattern catalog");
        Ok(entries)
    }

    /// Push a bundle for asynchronous import on the platform side.
    pub fn import_bundle(&self, bundle: &Bundle) -> Result<()> {
        let serialized = serde_json::to_string(bundle).context("failed to serialize bundle")?;
        self.graphql(IMPORT_BUNDLE_MUTATION, json!({ "bundle": serialized }))?;
        info!(
            bundle = %bundle.id,
            objects = bundle.objects.len(),
            "pushed bundle to platform"
        );
        Ok(())
    }

    fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let url = format!("{}/graphql", self.base_url);
        debug!(%url, "platform request");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} rejected the request"))?;

        let body: Value = response
            .json()
            .context("platform returned a non-JSON response")?;
        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(anyhow!("platform returned errors: {errors:?}"));
            }
        }
        body.get("data")
            .cloned()
            .ok_or_else(|| anyhow!("platform response missing data"))
    }
}

/// Load a catalog from a JSON file: a list of `{code, canonical_id}` records.
/// Lets runs resolve techniques without a reachable platform.
pub fn catalog_from_file(path: &Path) -> Result<Vec<CatalogEntry>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("invalid catalog JSON in {}", path.display()))?;
    Ok(entries)
}
