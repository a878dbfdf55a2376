//! Graph Studio CLI
//!
//! Validate, patch, render and edit chart specs, and manage saved projects.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use graph_studio::ai_edit::AiEditor;
use graph_studio::error::AiEditError;
use graph_studio::infer::{default_spec, infer_columns};
use graph_studio::patch::Patch;
use graph_studio::spec::{ChartSpec, FieldType, Row};
use graph_studio::store::{delete_or_warn, save_or_warn, Project, ProjectStore};
use graph_studio::{render, validate_spec_str, Backend, EngineConfig};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graph-studio")]
#[command(about = "Validate, patch, render and AI-edit chart specifications")]
struct Cli {
    /// Config file layered over the defaults
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Echarts,
    Plotly,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Echarts => Backend::Echarts,
            BackendArg::Plotly => Backend::Plotly,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a spec file against the chart schema
    Validate {
        /// Spec JSON file
        spec: PathBuf,
    },

    /// Apply a patch list to a spec
    Patch {
        /// Spec JSON file
        spec: PathBuf,
        /// Patch list, or an edit response with a "patches" array
        patches: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile a spec and its rows into a backend option object
    Render {
        /// Spec JSON file
        spec: PathBuf,
        /// Rows as a JSON array of objects
        #[arg(short, long)]
        rows: PathBuf,
        #[arg(short, long, value_enum, default_value = "echarts")]
        backend: BackendArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Infer column types from rows and print a starting spec
    Infer {
        /// Rows as a JSON array of objects
        rows: PathBuf,
        /// Source id recorded in the spec
        #[arg(long, default_value = "local")]
        source_id: String,
        /// Rows inspected per column (defaults to the configured value)
        #[arg(long)]
        sample_size: Option<usize>,
    },

    /// Ask the configured text generator to edit a spec
    Edit {
        /// Spec JSON file
        spec: PathBuf,
        /// Free-text instruction
        #[arg(short, long)]
        message: String,
        /// Output file for the edited spec (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage saved projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Show or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List saved projects
    List,
    /// Print a saved project
    Show { id: String },
    /// Save a spec file as a new project
    Save {
        /// Spec JSON file
        spec: PathBuf,
        #[arg(short, long)]
        name: String,
    },
    /// Delete a saved project
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        #[arg(default_value = "graph-studio.toml")]
        path: PathBuf,
    },
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

fn load_config(path: Option<&str>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(p) => EngineConfig::load_from(p),
        None => EngineConfig::load(),
    };
    config.context("failed to load configuration")
}

fn read_spec(path: &Path) -> anyhow::Result<ChartSpec> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    match validate_spec_str(&content) {
        Ok(spec) => Ok(spec),
        Err(e) => {
            println!("❌ {} is not a valid spec", path.display());
            for issue in &e.issues {
                println!("   └─ {}", issue);
            }
            bail!("invalid spec")
        }
    }
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<Row>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    let Value::Array(items) = value else {
        bail!("{} must contain a JSON array of row objects", path.display());
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(row) => Ok(row),
            _ => bail!("row {} is not an object", i),
        })
        .collect()
}

fn read_patches(path: &Path) -> anyhow::Result<Vec<Patch>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    let list = match value {
        Value::Object(mut obj) => obj.remove("patches").context("object has no \"patches\" array")?,
        other => other,
    };
    serde_json::from_value(list).context("malformed patch list")
}

fn write_json(value: &Value, output: Option<&Path>) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            println!("📦 Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { spec } => {
            let parsed = read_spec(&spec)?;
            println!(
                "✅ {} is valid ({}, {} columns)",
                spec.display(),
                parsed.chart_type,
                parsed.data.columns.len()
            );
            Ok(())
        }

        Commands::Patch { spec, patches, output } => {
            let current = read_spec(&spec)?;
            let patches = read_patches(&patches)?;
            let next = config.patch_engine().apply_and_validate(&current, &patches)?;
            eprintln!("✅ Applied {} patch(es)", patches.len());
            write_json(&next.to_value(), output.as_deref())
        }

        Commands::Render {
            spec,
            rows,
            backend,
            output,
        } => {
            let spec = read_spec(&spec)?;
            let rows = read_rows(&rows)?;
            let option = render(&spec, &rows, backend.into())?;
            write_json(&option, output.as_deref())
        }

        Commands::Infer {
            rows,
            source_id,
            sample_size,
        } => {
            let rows = read_rows(&rows)?;
            let columns = infer_columns(&rows, sample_size.unwrap_or(config.infer.sample_size));
            eprintln!("🔍 Inferred {} column(s) from {} row(s)", columns.len(), rows.len());
            for column in &columns {
                eprintln!(
                    "   {} - {}{}",
                    column.name,
                    column.field_type.as_str(),
                    if column.has_null { " (has nulls)" } else { "" }
                );
            }
            let spec = default_spec(&source_id, columns).context("rows have no columns")?;
            write_json(&spec.to_value(), None)
        }

        Commands::Edit { spec, message, output } => {
            let current = read_spec(&spec)?;
            let names: Vec<String> = current.data.columns.iter().map(|c| c.name.clone()).collect();
            let types: Vec<FieldType> = current.data.columns.iter().map(|c| c.field_type).collect();
            let editor = AiEditor::with_config(config.generator(), config.ai_edit_config(), config.patch_engine());

            let runtime = tokio::runtime::Runtime::new()?;
            let outcome = runtime.block_on(editor.edit_and_apply(&current, &names, &types, &message));
            match outcome {
                Ok((next, response)) => {
                    eprintln!(
                        "✅ {} (confidence {:.2}, {} patch(es))",
                        response.explanation,
                        response.confidence,
                        response.patches.len()
                    );
                    write_json(&next.to_value(), output.as_deref())
                }
                Err(AiEditError::ParseFailed { reason, preview }) => {
                    eprintln!("❌ Could not parse the model output: {}", reason);
                    eprintln!("   └─ {}", preview);
                    bail!("edit failed")
                }
                Err(e) => {
                    eprintln!("❌ {}", e);
                    bail!("edit failed")
                }
            }
        }

        Commands::Project { action } => {
            let store = config.project_store();
            match action {
                ProjectAction::List => {
                    let projects = store.list()?;
                    if projects.is_empty() {
                        println!("No projects in {}", store.root().display());
                    }
                    for p in projects {
                        println!("  {}  {:<24} {:<12} {}", p.id, p.name, p.chart_type.as_str(), p.updated_at.to_rfc3339());
                    }
                    Ok(())
                }
                ProjectAction::Show { id } => {
                    let project = store.load(&id)?;
                    write_json(&serde_json::to_value(&project)?, None)
                }
                ProjectAction::Save { spec, name } => {
                    let project = Project::new(name, read_spec(&spec)?);
                    if !save_or_warn(&store, &project) {
                        bail!("could not save project");
                    }
                    println!("✅ Saved project {} ({})", project.name, project.id);
                    Ok(())
                }
                ProjectAction::Delete { id } => {
                    if !delete_or_warn(&store, &id) {
                        bail!("could not delete project {}", id);
                    }
                    println!("🗑️  Deleted project {}", id);
                    Ok(())
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Init { path } => {
                if path.exists() {
                    bail!("{} already exists", path.display());
                }
                EngineConfig::default().save(&path)?;
                println!("✅ Wrote default configuration to {}", path.display());
                Ok(())
            }
        },
    }
}
