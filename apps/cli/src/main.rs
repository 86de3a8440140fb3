//! xmlview - render XML documents from mapping and data files
//!
//! Usage:
//!   xmlview render --mapping catalog.yaml --data tables.json [--query query.json] [--out-dir out/]
//!   xmlview plan --mapping catalog.yaml [--query query.json]
//!   xmlview check --mapping catalog.yaml

mod config;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use xmlview::model::DocumentDef;
use xmlview::{InMemorySource, MappingDocument, XmlQuery, XmlView};

use crate::config::XmlViewConfig;

#[derive(Parser, Debug)]
#[clap(name = "xmlview")]
#[clap(about = "Render XML documents from relational data through a mapping tree")]
struct Cli {
    /// Configuration file (defaults to ./xmlview.toml if present)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce documents and write them to stdout or a directory
    Render {
        /// Mapping document (JSON or YAML)
        #[clap(short, long)]
        mapping: PathBuf,

        /// Tables keyed by group name (JSON or YAML)
        #[clap(short, long)]
        data: PathBuf,

        /// Query with criteria and order keys (JSON or YAML)
        #[clap(short, long)]
        query: Option<PathBuf>,

        /// Write one `<name>-<n>.xml` file per document instead of stdout
        #[clap(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Print the compiled program for a query
    Plan {
        #[clap(short, long)]
        mapping: PathBuf,

        #[clap(short, long)]
        query: Option<PathBuf>,
    },
    /// Validate a mapping document
    Check {
        #[clap(short, long)]
        mapping: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = XmlViewConfig::load(cli.config.as_deref())?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    logging::init_logging(&config.logging, cli.verbose)
        .context("Failed to initialize logging")?;

    match cli.command {
        Command::Render {
            mapping,
            data,
            query,
            out_dir,
        } => {
            let view = XmlView::with_options(load_mapping(&mapping)?, config.view_options());
            let source: InMemorySource = read_file(&data)?;
            let query = load_query(query.as_deref())?;
            let documents = view.render(&query, &source)?;
            info!(documents = documents.len(), "rendered");
            match out_dir {
                Some(dir) => write_documents(&dir, view.document(), &documents)?,
                None => {
                    for xml in &documents {
                        println!("{xml}");
                    }
                }
            }
        }
        Command::Plan { mapping, query } => {
            let view = XmlView::with_options(load_mapping(&mapping)?, config.view_options());
            let query = load_query(query.as_deref())?;
            print!("{}", view.explain(&query)?);
        }
        Command::Check { mapping } => {
            let document = load_mapping(&mapping)?;
            println!(
                "{}: {} nodes, {} root(s)",
                document.name(),
                document.nodes().count(),
                document.roots().len()
            );
        }
    }
    Ok(())
}

fn load_mapping(path: &Path) -> Result<Arc<MappingDocument>> {
    let def: DocumentDef = read_file(path)?;
    let document = def
        .build()
        .with_context(|| format!("Invalid mapping in {}", path.display()))?;
    Ok(Arc::new(document))
}

fn load_query(path: Option<&Path>) -> Result<XmlQuery> {
    match path {
        Some(path) => read_file(path),
        None => Ok(XmlQuery::new()),
    }
}

/// Deserialize JSON or YAML, chosen by extension.
fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let value = if yaml {
        serde_yaml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    };
    Ok(value)
}

fn write_documents(dir: &Path, document: &MappingDocument, xml: &[String]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let stem = document.name().short_name().to_string();
    for (i, text) in xml.iter().enumerate() {
        let path = dir.join(format!("{stem}-{}.xml", i + 1));
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote document");
    }
    Ok(())
}
