//! Disgraph CLI.
//!
//! One-shot pipeline over the DISARM master workbook:
//! - `build`: workbook → entity graph → STIX bundle on disk (+ report)
//! - `push`: build, then upload the bundle to the platform
//! - `catalog`: dump the platform's attack-pattern catalog to JSON
//!
//! Scheduling lives outside this binary; run it from cron or a connector
//! supervisor.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use disgraph_core::{build_graph, RunOutput, TechniqueCatalog, UnresolvedPolicy};
use disgraph_opencti::{catalog_from_file, to_bundle, OpenCtiClient};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use umya_spreadsheet::Spreadsheet;

#[derive(Parser)]
#[command(name = "disgraph")]
#[command(
    author,
    version,
    about = "Disinformation incident knowledge-graph builder"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph from the workbook and write a STIX bundle to disk.
    Build {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        catalog: CatalogArgs,
        /// Output path for the STIX bundle JSON
        #[arg(short, long, default_value = "bundle.json")]
        out: PathBuf,
        /// Optional output path for the resolution report JSON
        #[arg(long)]
        report: Option<PathBuf>,
        /// Mint locally identified technique entities for catalog misses
        #[arg(long)]
        mint_local_techniques: bool,
    },

    /// Build the graph and push the bundle straight to the platform.
    Push {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        platform: PlatformArgs,
        /// Mint locally identified technique entities for catalog misses
        #[arg(long)]
        mint_local_techniques: bool,
    },

    /// Dump the platform's attack-pattern catalog to a JSON file.
    Catalog {
        #[command(flatten)]
        platform: PlatformArgs,
        /// Output path for the catalog JSON
        #[arg(short, long, default_value = "catalog.json")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Local workbook path (takes precedence over --url)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Workbook URL
    #[arg(long, default_value = disgraph_ingest_xlsx::DISARM_MASTER_XLSX_URL)]
    url: String,
}

#[derive(Args)]
struct PlatformArgs {
    /// OpenCTI base URL (falls back to $OPENCTI_URL)
    #[arg(long)]
    opencti_url: Option<String>,
    /// OpenCTI API token (falls back to $OPENCTI_TOKEN)
    #[arg(long)]
    token: Option<String>,
}

#[derive(Args)]
struct CatalogArgs {
    /// Catalog JSON file (list of {code, canonical_id} records); when absent
    /// the catalog is fetched from the platform if credentials are given
    #[arg(long)]
    catalog: Option<PathBuf>,
    #[command(flatten)]
    platform: PlatformArgs,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            source,
            catalog,
            out,
            report,
            mint_local_techniques,
        } => {
            let catalog = load_catalog(&catalog)?;
            let output = build(&source, &catalog, policy(mint_local_techniques))?;
            let bundle = to_bundle(&output.graph);
            write_json(&out, &bundle)?;
            if let Some(report_path) = report {
                write_json(&report_path, &output.report)?;
            }
            print_summary(&output);
            println!("{} {}", "bundle".green().bold(), out.display());
            Ok(())
        }

        Commands::Push {
            source,
            platform,
            mint_local_techniques,
        } => {
            let client = platform_client(&platform)?;
            let catalog = TechniqueCatalog::from_entries(client.attack_pattern_catalog()?);
            let output = build(&source, &catalog, policy(mint_local_techniques))?;
            let bundle = to_bundle(&output.graph);
            client.import_bundle(&bundle)?;
            print_summary(&output);
            println!("{} {}", "pushed".green().bold(), bundle.id);
            Ok(())
        }

        Commands::Catalog { platform, out } => {
            let client = platform_client(&platform)?;
            let entries = client.attack_pattern_catalog()?;
            write_json(&out, &entries)?;
            println!(
                "{} {} entries -> {}",
                "catalog".green().bold(),
                entries.len(),
                out.display()
            );
            Ok(())
        }
    }
}

fn policy(mint_local_techniques: bool) -> UnresolvedPolicy {
    if mint_local_techniques {
        UnresolvedPolicy::MintLocal
    } else {
        UnresolvedPolicy::Skip
    }
}

fn load_workbook(source: &SourceArgs) -> Result<Spreadsheet> {
    match &source.input {
        Some(path) => disgraph_ingest_xlsx::read_workbook(path),
        None => disgraph_ingest_xlsx::fetch_workbook(&source.url),
    }
}

fn build(
    source: &SourceArgs,
    catalog: &TechniqueCatalog,
    policy: UnresolvedPolicy,
) -> Result<RunOutput> {
    let book = load_workbook(source)?;
    let incidents = disgraph_ingest_xlsx::incident_rows(&book)?;
    let techniques = disgraph_ingest_xlsx::technique_rows(&book)?;
    let output = build_graph(&incidents, &techniques, catalog, policy)?;
    Ok(output)
}

/// Catalog source precedence: explicit file, then platform, then empty.
fn load_catalog(args: &CatalogArgs) -> Result<TechniqueCatalog> {
    if let Some(path) = &args.catalog {
        return Ok(TechniqueCatalog::from_entries(catalog_from_file(path)?));
    }
    if args.platform.opencti_url.is_some() || env::var("OPENCTI_URL").is_ok() {
        let client = platform_client(&args.platform)?;
        return Ok(TechniqueCatalog::from_entries(
            client.attack_pattern_catalog()?,
        ));
    }
    warn!("no catalog configured; every technique reference will be unresolved");
    Ok(TechniqueCatalog::default())
}

fn platform_client(args: &PlatformArgs) -> Result<OpenCtiClient> {
    let url = args
        .opencti_url
        .clone()
        .or_else(|| env::var("OPENCTI_URL").ok())
        .ok_or_else(|| anyhow!("platform URL required: pass --opencti-url or set $OPENCTI_URL"))?;
    let token = args
        .token
        .clone()
        .or_else(|| env::var("OPENCTI_TOKEN").ok())
        .ok_or_else(|| anyhow!("platform token required: pass --token or set $OPENCTI_TOKEN"))?;
    OpenCtiClient::new(url, token)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn print_summary(output: &RunOutput) {
    let graph = &output.graph;
    let report = &output.report;

    println!(
        "{} {} entities, {} relationships",
        "built".green().bold(),
        graph.entities.len(),
        graph.relationships.len()
    );
    println!(
        "{} {} resolved, {} unresolved technique references",
        "techniques".cyan().bold(),
        report.resolved,
        report.unresolved_count()
    );
    for miss in &report.unresolved {
        println!(
            "  {} {} (incident {})",
            "unresolved".yellow(),
            miss.code,
            miss.incident
        );
    }
    if report.malformed_rows > 0 {
        println!(
            "{} {} malformed incident rows skipped",
            "warning".yellow().bold(),
            report.malformed_rows
        );
    }
}
