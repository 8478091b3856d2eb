use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use instantschema::catalog::primitive_types;
use instantschema::{
    MemoryBackend, MemoryContentTypes, MigrationReport, NewEntity, RegistryConfig, SchemaRegistry, SnapshotFile,
    StorageBackend,
};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-tool")]
#[command(about = "Apply entity manifests and inspect synthesized schemas")]
struct Cli {
    /// Generic text column length
    #[arg(long, global = true, default_value_t = 255)]
    max_text_length: u32,

    /// API page size
    #[arg(long, global = true, default_value_t = 50)]
    page_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a manifest and print the executed DDL
    Apply {
        #[arg(long)]
        manifest: PathBuf,
        /// Metadata snapshot to resume from and write back
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Print one entity's schema and bindings as JSON
    Describe {
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        app: String,
        #[arg(long)]
        entity: String,
    },
    /// List the primitive field types
    Catalog,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    /// Pre-existing record types; their tables are created before anything else
    #[serde(default)]
    native: Vec<NativeType>,
    #[serde(default)]
    applications: Vec<ManifestApplication>,
}

#[derive(Debug, Deserialize)]
struct NativeType {
    app_label: String,
    model: String,
    #[serde(default)]
    display_name: Option<String>,
    table: String,
}

#[derive(Debug, Deserialize)]
struct ManifestApplication {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    entities: Vec<NewEntity>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RegistryConfig::new()
        .max_text_length(cli.max_text_length)
        .page_size(cli.page_size);

    match cli.command {
        Command::Apply { manifest, snapshot } => apply(config, &manifest, snapshot.as_deref()),
        Command::Describe { manifest, app, entity } => describe(config, &manifest, &app, &entity),
        Command::Catalog => {
            for primitive in primitive_types() {
                println!("{:<14} {:<18} {}", primitive.token, primitive.storage.to_string(), primitive.description);
            }
            Ok(())
        }
    }
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read manifest '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid manifest '{}'", path.display()))
}

fn build_registry(config: RegistryConfig, manifest: &Manifest, snapshot: Option<&SnapshotFile>) -> Result<SchemaRegistry> {
    let mut content_types = MemoryContentTypes::new();
    let backend = MemoryBackend::new();
    for native in &manifest.native {
        content_types = content_types.with_native(
            &native.app_label,
            &native.model,
            native.display_name.as_deref().unwrap_or(&native.model),
            &native.table,
        );
        backend
            .execute_ddl(&format!("CREATE TABLE {} (id INTEGER PRIMARY KEY)", native.table))
            .with_context(|| format!("Failed to create native table '{}'", native.table))?;
    }

    let mut builder = SchemaRegistry::builder()
        .config(config)
        .content_types(Arc::new(content_types))
        .backend(Arc::new(backend));

    if let Some(snapshot) = snapshot
        && let Some(store) = snapshot
            .load()
            .with_context(|| format!("Failed to load snapshot '{}'", snapshot.path().display()))?
    {
        builder = builder.store(store);
    }
    Ok(builder.build())
}

/// Creates whatever the manifest names that the registry does not know yet.
fn apply_manifest(registry: &SchemaRegistry, manifest: Manifest) -> Result<MigrationReport> {
    let mut report = registry.sync_storage()?;

    for application in manifest.applications {
        if registry.store().application(&application.name)?.is_none() {
            let display_name = application.display_name.as_deref().unwrap_or(&application.name);
            registry.create_application(&application.name, display_name)?;
        }

        let mut new_entities = Vec::new();
        let mut extended = Vec::new();
        for entity in application.entities {
            if registry.store().entity(&application.name, &entity.name)?.is_some() {
                extended.push(entity);
            } else {
                new_entities.push(entity);
            }
        }

        let (_, created) = registry
            .define_entities(&application.name, new_entities)
            .with_context(|| format!("Failed to define entities of '{}'", application.name))?;
        report.merge(created);

        for entity in extended {
            let existing = registry.entity(&application.name, &entity.name)?;
            for field in entity.fields {
                if registry.store().field(existing.id, &field.name)?.is_some() {
                    continue;
                }
                let (_, added) = registry
                    .add_field(&application.name, &entity.name, field)
                    .with_context(|| format!("Failed to extend '{}.{}'", application.name, entity.name))?;
                report.merge(added);
            }
        }
    }
    Ok(report)
}

fn apply(config: RegistryConfig, manifest_path: &Path, snapshot: Option<&Path>) -> Result<()> {
    let manifest = read_manifest(manifest_path)?;
    let snapshot = snapshot.map(SnapshotFile::new);
    let registry = build_registry(config, &manifest, snapshot.as_ref())?;

    let report = apply_manifest(&registry, manifest)?;
    for statement in &report.statements {
        println!("{};", statement);
    }
    for failure in &report.index_failures {
        eprintln!("warning: {}", failure);
    }

    if let Some(snapshot) = &snapshot {
        registry
            .save_snapshot(snapshot)
            .with_context(|| format!("Failed to write snapshot '{}'", snapshot.path().display()))?;
    }
    Ok(())
}

fn describe(config: RegistryConfig, manifest_path: &Path, app: &str, entity: &str) -> Result<()> {
    let manifest = read_manifest(manifest_path)?;
    let registry = build_registry(config, &manifest, None)?;
    apply_manifest(&registry, manifest)?;

    let schema = registry
        .schema(app, entity)
        .map_err(|e| anyhow!("Cannot describe {}.{}: {}", app, entity, e))?;
    let output = serde_json::json!({
        "schema": &*schema,
        "admin": registry.admin_binding(app, entity)?,
        "api": registry.api_binding(app, entity)?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
