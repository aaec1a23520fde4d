//! Model Validation CLI
//!
//! Validates JSON documents against a catalog of model declarations and
//! prints the normalized (coerced, defaulted) mapping.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use familiar_models::{ModelError, ModelsConfig, OutputFormat, SchemaCatalog};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-validate")]
#[command(about = "Validate JSON documents against declared models")]
struct Cli {
    /// Extra configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Catalog file (overrides the configured path)
    #[arg(long)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document and print the normalized mapping
    Check {
        /// Model to build (defaults to the configured or catalog root)
        #[arg(short, long)]
        model: Option<String>,

        /// Print compact JSON
        #[arg(long, conflicts_with = "pretty")]
        compact: bool,

        /// Print indented JSON
        #[arg(long)]
        pretty: bool,

        /// JSON document to validate (stdin when omitted)
        data: Option<PathBuf>,
    },

    /// List the models of the catalog and their fields
    List,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ModelsConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let catalog_path = cli.catalog.unwrap_or_else(|| config.catalog.path.clone());
    let catalog = SchemaCatalog::load(&catalog_path)
        .with_context(|| format!("loading catalog {}", catalog_path.display()))?;

    match cli.command {
        Commands::Check {
            model,
            compact,
            pretty,
            data,
        } => {
            let text = read_document(data.as_ref(), config.input.max_text_bytes)?;

            let name = model
                .or_else(|| config.catalog.root_model.clone())
                .or_else(|| catalog.root().map(String::from))
                .context("no model given and the catalog declares no root")?;

            let built = catalog.build(&name, text)?;

            let format = match (compact, pretty) {
                (true, _) => OutputFormat::Compact,
                (_, true) => OutputFormat::Pretty,
                _ => config.output.format,
            };
            match format {
                OutputFormat::Compact => println!("{}", built.to_text()),
                OutputFormat::Pretty => println!("{}", built.to_text_pretty()),
            }
            Ok(())
        }

        Commands::List => {
            for name in catalog.models() {
                let Some(schema) = catalog.schema(name) else {
                    continue;
                };
                let marker = if catalog.root() == Some(name) { " (root)" } else { "" };
                println!("{}{}", name, marker);
                for (field, descriptor) in schema.fields() {
                    let required = if descriptor.required { "required" } else { "optional" };
                    match &descriptor.object {
                        Some(binding) => {
                            println!("  {}: object<{}> {}", field, binding.class, required)
                        }
                        None => println!("  {}: {} {}", field, descriptor.field_type, required),
                    }
                }
            }
            Ok(())
        }
    }
}

fn read_document(path: Option<&PathBuf>, max_bytes: usize) -> anyhow::Result<String> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
            text
        }
    };

    check_document_size(&text, max_bytes)?;
    Ok(text)
}

/// Oversized documents are rejected as invalid model input
fn check_document_size(text: &str, max_bytes: usize) -> Result<(), ModelError> {
    if text.len() > max_bytes {
        return Err(ModelError::InputType {
            reason: format!("document is {} bytes, limit is {}", text.len(), max_bytes),
        });
    }
    Ok(())
}
