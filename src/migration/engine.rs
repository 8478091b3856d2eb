use super::ddl::{self, ReferenceMode};
use super::pending::PendingReferences;
use crate::catalog::ContentTypeRegistry;
use crate::config::RegistryConfig;
use crate::core::{ResolvedColumn, Result, SchemaError};
use crate::metadata::EntityDefinition;
use crate::notify::NotificationSink;
use crate::storage::StorageBackend;
use crate::synth::SynthesizedSchema;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// Outcome of one migration call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Statements that took effect, in execution order
    pub statements: Vec<String>,
    /// Tables created by this call
    pub created: Vec<String>,
    /// Tables that already existed and were left alone
    pub skipped: Vec<String>,
    /// Indexes that failed; the owning tables exist regardless
    pub index_failures: Vec<SchemaError>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn merge(&mut self, other: MigrationReport) {
        self.statements.extend(other.statements);
        self.created.extend(other.created);
        self.skipped.extend(other.skipped);
        self.index_failures.extend(other.index_failures);
    }
}

/// Any failure on the DDL path other than index installation.
fn storage_failure(err: SchemaError) -> SchemaError {
    match err {
        SchemaError::StorageUnavailable(_) | SchemaError::Lock(_) => err,
        other => SchemaError::StorageUnavailable(other.to_string()),
    }
}

/// Converges backing storage with synthesized schemas.
pub struct MigrationEngine {
    config: RegistryConfig,
    backend: Arc<dyn StorageBackend>,
    content_types: Arc<dyn ContentTypeRegistry>,
    notifier: Arc<dyn NotificationSink>,
    pending: Mutex<PendingReferences>,
}

impl MigrationEngine {
    pub fn new(
        config: RegistryConfig,
        backend: Arc<dyn StorageBackend>,
        content_types: Arc<dyn ContentTypeRegistry>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            backend,
            content_types,
            notifier,
            pending: Mutex::new(PendingReferences::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Snapshot of the obligations still waiting on missing tables.
    pub fn pending_references(&self) -> Result<PendingReferences> {
        Ok(self.pending.lock()?.clone())
    }

    pub fn create_table(&self, entity: &EntityDefinition, schema: &SynthesizedSchema) -> Result<MigrationReport> {
        self.create_tables(&[(entity, schema)])
    }

    /// Materializes every schema whose table is missing, in one transaction.
    ///
    /// References between members of the batch resolve regardless of order.
    /// Indexes are installed afterwards, each in its own transaction.
    pub fn create_tables(&self, batch: &[(&EntityDefinition, &SynthesizedSchema)]) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        let live = self.backend.list_tables().map_err(storage_failure)?;

        let mut manifest: Vec<(&EntityDefinition, &SynthesizedSchema)> = Vec::new();
        for &(entity, schema) in batch {
            if live.contains(&schema.table) || manifest.iter().any(|(_, s)| s.table == schema.table) {
                log::debug!("table {} already exists, skipping", schema.table);
                report.skipped.push(schema.table.clone());
            } else {
                manifest.push((entity, schema));
            }
        }
        if manifest.is_empty() {
            return Ok(report);
        }

        {
            let mut pending = self.pending.lock()?;
            let before = pending.clone();

            self.backend.begin().map_err(storage_failure)?;
            let outcome = self
                .materialize(&manifest, live, &mut pending, &mut report.statements)
                .and_then(|_| self.backend.commit());

            if let Err(err) = outcome {
                log::error!("table creation failed, rolling back: {}", err);
                if let Err(rollback_err) = self.backend.rollback() {
                    log::error!("rollback failed: {}", rollback_err);
                }
                *pending = before;
                return Err(storage_failure(err));
            }
        }

        report.created = manifest.iter().map(|(_, schema)| schema.table.clone()).collect();

        if self.config.notify_on_create {
            let created: Vec<EntityDefinition> = manifest.iter().map(|(entity, _)| (*entity).clone()).collect();
            self.notifier.entities_created(&created);
        }

        for (_, schema) in &manifest {
            for column in schema.reference_columns() {
                self.install_index(schema, column, &mut report);
            }
        }

        Ok(report)
    }

    fn materialize(
        &self,
        manifest: &[(&EntityDefinition, &SynthesizedSchema)],
        mut seen: BTreeSet<String>,
        pending: &mut PendingReferences,
        statements: &mut Vec<String>,
    ) -> Result<()> {
        for (_, schema) in manifest {
            let table = schema.table.as_str();

            let create = ddl::create_table(table, &schema.columns, |column| match column.reference() {
                Some(target) if target.table != table && !seen.contains(&target.table) => {
                    ReferenceMode::Deferred
                }
                _ => ReferenceMode::Inline,
            });
            self.execute(&create, statements)?;

            for column in schema.reference_columns() {
                if let Some(target) = column.reference()
                    && target.table != table
                    && !seen.contains(&target.table)
                {
                    pending.record(&target.table, table, &column.column);
                }
            }
            seen.insert(table.to_string());

            for obligation in pending.take(table) {
                let sql = ddl::add_foreign_key(&obligation.table, &obligation.column, table);
                self.execute(&sql, statements)?;
            }
        }

        for (entity, _) in manifest {
            self.content_types
                .register(&entity.app, &entity.name, &entity.display_name)?;
        }
        Ok(())
    }

    /// Adds one column for a new field. Existing rows get no value.
    pub fn add_column(&self, schema: &SynthesizedSchema, column: &ResolvedColumn) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        let mode = match column.reference() {
            Some(target) if target.table != schema.table => {
                if self.backend.table_exists(&target.table).map_err(storage_failure)? {
                    ReferenceMode::Inline
                } else {
                    ReferenceMode::Deferred
                }
            }
            _ => ReferenceMode::Inline,
        };

        let sql = ddl::add_column(&schema.table, column, mode);
        self.execute(&sql, &mut report.statements)?;

        if let (Some(target), ReferenceMode::Deferred) = (column.reference(), mode) {
            self.pending.lock()?.record(&target.table, &schema.table, &column.column);
        }
        if column.reference().is_some() {
            self.install_index(schema, column, &mut report);
        }
        Ok(report)
    }

    /// Drops one column by its physical name. Nothing cascades.
    pub fn drop_column(&self, table: &str, column: &str) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        self.execute(&ddl::drop_column(table, column), &mut report.statements)?;
        self.pending.lock()?.forget_column(table, column);
        Ok(report)
    }

    fn execute(&self, sql: &str, statements: &mut Vec<String>) -> Result<()> {
        log::debug!("executing: {}", sql);
        self.backend.execute_ddl(sql).map_err(storage_failure)?;
        statements.push(sql.to_string());
        Ok(())
    }

    /// One index, one transaction. Failures are recorded, never propagated.
    fn install_index(&self, schema: &SynthesizedSchema, column: &ResolvedColumn, report: &mut MigrationReport) {
        let sql = ddl::create_index(&schema.table, &column.column);

        let outcome = match self.backend.begin() {
            Ok(()) => {
                let attempt = self
                    .backend
                    .execute_ddl(&sql)
                    .and_then(|_| self.backend.commit());
                if attempt.is_err()
                    && let Err(rollback_err) = self.backend.rollback()
                {
                    log::error!("index rollback failed: {}", rollback_err);
                }
                attempt
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                log::debug!("executed: {}", sql);
                report.statements.push(sql);
            }
            Err(err) => {
                let failure = SchemaError::IndexInstallFailure {
                    app: schema.app.clone(),
                    entity: schema.entity.clone(),
                    column: column.column.clone(),
                    reason: err.to_string(),
                };
                if self.config.warn_on_index_failure {
                    log::warn!("{}", failure);
                } else {
                    log::debug!("{}", failure);
                }
                report.index_failures.push(failure);
            }
        }
    }
}
