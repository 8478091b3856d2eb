use instantschema::storage::TableInfo;
use instantschema::{
    ApiSettings, ColumnKind, ContentTypeRegistry, EntityPatch, FieldPatch, MemoryBackend, MemoryContentTypes, NewEntity, NewField,
    RecordingNotifier, SchemaError, SchemaRegistry, SnapshotFile, StorageBackend, StorageType,
};
use std::sync::Arc;
use tempfile::TempDir;

fn registry_with_users() -> (SchemaRegistry, Arc<MemoryBackend>) {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_tables("CREATE TABLE auth_user (id INTEGER PRIMARY KEY)")
            .unwrap(),
    );
    let content_types = Arc::new(MemoryContentTypes::new().with_native("auth", "user", "User", "auth_user"));
    let registry = SchemaRegistry::builder()
        .backend(backend.clone())
        .content_types(content_types)
        .build();
    registry.create_application("tasks", "Tasks").unwrap();
    (registry, backend)
}

fn table(backend: &MemoryBackend, name: &str) -> TableInfo {
    backend.describe_table(name).unwrap().expect("table exists")
}

#[test]
fn test_task_lifecycle_scenario() {
    let (registry, backend) = registry_with_users();

    registry
        .define_entity("tasks", NewEntity::new("Task").field(NewField::new("title", "text")))
        .unwrap();

    let tasks = table(&backend, "tasks_task");
    assert_eq!(tasks.column_names(), vec!["id", "title"]);
    let title = tasks.column("title").unwrap();
    assert_eq!(title.storage, StorageType::Varchar(255));
    assert!(title.nullable);

    let (_, report) = registry
        .add_field("tasks", "Task", NewField::new("owner", "user"))
        .unwrap();
    assert!(report.index_failures.is_empty());

    let tasks = table(&backend, "tasks_task");
    assert_eq!(tasks.column_names(), vec!["id", "title", "owner_id"]);
    assert_eq!(tasks.foreign_key("owner_id").unwrap().target_table, "auth_user");
    assert!(tasks.index("tasks_task_owner_id").is_some());

    registry.delete_field("tasks", "Task", "title").unwrap();

    let tasks = table(&backend, "tasks_task");
    assert_eq!(tasks.column_names(), vec!["id", "owner_id"]);

    let schema = registry.schema("tasks", "Task").unwrap();
    assert_eq!(schema.column_names(), vec!["id", "owner_id"]);
    let owner = schema.column("owner").unwrap();
    assert_eq!(owner.reference().unwrap().table, "auth_user");
    assert!(!owner.reference().unwrap().dynamic);
}

#[test]
fn test_table_has_one_column_per_field_plus_id() {
    let (registry, backend) = registry_with_users();
    let draft = NewEntity::new("Project")
        .field(NewField::new("name", "text").required())
        .field(NewField::new("budget", "decimal"))
        .field(NewField::new("active", "boolean"))
        .field(NewField::new("lead", "user"));

    registry.define_entity("tasks", draft).unwrap();

    let project = table(&backend, "tasks_project");
    assert_eq!(project.columns.len(), 5);
    assert_eq!(registry.schema("tasks", "Project").unwrap().columns.len(), 5);
    assert!(!project.column("name").unwrap().nullable);
    assert_eq!(
        project.column("budget").unwrap().storage,
        StorageType::Numeric { precision: 12, scale: 2 }
    );
}

#[test]
fn test_schema_reads_share_one_descriptor_until_mutation() {
    let (registry, _) = registry_with_users();
    registry
        .define_entity("tasks", NewEntity::new("Task").field(NewField::new("title", "text")))
        .unwrap();

    let first = registry.schema("tasks", "Task").unwrap();
    let second = registry.schema("tasks", "task").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    registry
        .add_field("tasks", "Task", NewField::new("done", "boolean"))
        .unwrap();
    let third = registry.schema("tasks", "Task").unwrap();

    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(first.column_names(), vec!["id", "title"]);
    assert_eq!(third.column_names(), vec!["id", "title", "done"]);
}

#[test]
fn test_metadata_only_updates_refresh_schema() {
    let (registry, backend) = registry_with_users();
    registry
        .define_entity("tasks", NewEntity::new("Task").field(NewField::new("title", "text")))
        .unwrap();
    let before = registry.schema("tasks", "Task").unwrap();

    registry
        .update_entity(
            "tasks",
            "Task",
            EntityPatch {
                display_name: Some("To-do".into()),
                ordering: Some(Some("title".into())),
                ..EntityPatch::default()
            },
        )
        .unwrap();
    registry
        .update_field(
            "tasks",
            "Task",
            "title",
            FieldPatch {
                field_type: Some("integer".into()),
                ..FieldPatch::default()
            },
        )
        .unwrap();

    let after = registry.schema("tasks", "Task").unwrap();
    assert_eq!(before.display_name, "Task");
    assert_eq!(after.display_name, "To-do");
    assert_eq!(after.ordering[0].field, "title");
    assert!(!after.ordering[0].descending);
    assert_eq!(after.column("title").unwrap().storage_type(), StorageType::Integer);

    // the live column is untouched
    assert_eq!(
        table(&backend, "tasks_task").column("title").unwrap().storage,
        StorageType::Varchar(255)
    );
}

#[test]
fn test_existing_table_is_a_silent_no_op() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_tables("CREATE TABLE tasks_task (id INTEGER PRIMARY KEY, legacy TEXT)")
            .unwrap(),
    );
    let content_types = Arc::new(MemoryContentTypes::new());
    let registry = SchemaRegistry::builder()
        .backend(backend.clone())
        .content_types(content_types.clone())
        .build();
    registry.create_application("tasks", "Tasks").unwrap();

    let (_, report) = registry
        .define_entity("tasks", NewEntity::new("Task").field(NewField::new("title", "text")))
        .unwrap();

    assert_eq!(report.skipped, vec!["tasks_task"]);
    assert!(report.created.is_empty());
    assert!(report.statements.is_empty());
    assert_eq!(backend.list_tables().unwrap().len(), 1);
    assert_eq!(table(&backend, "tasks_task").column_names(), vec!["id", "legacy"]);
    assert!(content_types.all().unwrap().is_empty());
}

#[test]
fn test_content_type_registered_once() {
    let content_types = Arc::new(MemoryContentTypes::new());
    let registry = SchemaRegistry::builder().content_types(content_types.clone()).build();
    registry.create_application("tasks", "Tasks").unwrap();

    registry.define_entity("tasks", NewEntity::new("Task")).unwrap();
    registry.sync_storage().unwrap();
    registry.sync_storage().unwrap();

    let all = content_types.all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].app_label, "tasks");
    assert!(all[0].table.is_none());
}

#[test]
fn test_batch_forward_reference_is_constrained() {
    let notifier = Arc::new(RecordingNotifier::new());
    let backend = Arc::new(MemoryBackend::new());
    let registry = SchemaRegistry::builder()
        .backend(backend.clone())
        .notifier(notifier.clone())
        .build();
    registry.create_application("shop", "Shop").unwrap();

    let (entities, report) = registry
        .define_entities(
            "shop",
            vec![
                NewEntity::new("Order").field(NewField::new("customer", "customer")),
                NewEntity::new("Customer").field(NewField::new("name", "text")),
            ],
        )
        .unwrap();

    assert_eq!(entities.len(), 2);
    assert_eq!(report.created, vec!["shop_order", "shop_customer"]);
    assert!(
        report
            .statements
            .iter()
            .any(|s| s.contains("ADD CONSTRAINT \"fk_shop_order_customer_id_shop_customer\""))
    );

    let order = table(&backend, "shop_order");
    assert_eq!(order.foreign_key("customer_id").unwrap().target_table, "shop_customer");
    assert!(order.index("shop_order_customer_id").is_some());
    assert!(registry.engine().pending_references().unwrap().is_empty());

    assert_eq!(notifier.batches().unwrap(), vec![vec!["shop.order".to_string(), "shop.customer".to_string()]]);

    let customer = registry.schema("shop", "Order").unwrap();
    let target = customer.column("customer").unwrap().reference().unwrap().clone();
    assert!(target.dynamic);
    assert_eq!(target.table, "shop_customer");
}

#[test]
fn test_self_reference_resolves_in_same_pass() {
    let backend = Arc::new(MemoryBackend::new());
    let registry = SchemaRegistry::builder().backend(backend.clone()).build();
    registry.create_application("shop", "Shop").unwrap();

    registry
        .define_entity(
            "shop",
            NewEntity::new("Category")
                .field(NewField::new("name", "text"))
                .field(NewField::new("parent", "category")),
        )
        .unwrap();

    let category = table(&backend, "shop_category");
    assert_eq!(category.foreign_key("parent_id").unwrap().target_table, "shop_category");
    assert!(registry.engine().pending_references().unwrap().is_empty());
}

#[test]
fn test_digit_leading_application_materializes() {
    let backend = Arc::new(MemoryBackend::new());
    let registry = SchemaRegistry::builder().backend(backend.clone()).build();
    registry.create_application("2024", "Season 2024").unwrap();

    let (_, report) = registry
        .define_entities(
            "2024",
            vec![
                NewEntity::new("Task").field(NewField::new("milestone", "milestone")),
                NewEntity::new("Milestone").field(NewField::new("title", "text")),
            ],
        )
        .unwrap();

    assert_eq!(report.created, vec!["2024_task", "2024_milestone"]);
    assert!(report.index_failures.is_empty());
    let task = table(&backend, "2024_task");
    assert_eq!(task.foreign_key("milestone_id").unwrap().target_table, "2024_milestone");
    assert!(task.index("2024_task_milestone_id").is_some());

    registry
        .add_field("2024", "Milestone", NewField::new("due", "date"))
        .unwrap();
    registry.delete_field("2024", "Milestone", "title").unwrap();
    assert_eq!(table(&backend, "2024_milestone").column_names(), vec!["id", "due"]);
}

#[test]
fn test_delete_field_leaves_other_columns_and_tables() {
    let (registry, backend) = registry_with_users();
    registry
        .define_entities(
            "tasks",
            vec![
                NewEntity::new("Task")
                    .field(NewField::new("title", "text"))
                    .field(NewField::new("notes", "longtext"))
                    .field(NewField::new("owner", "user")),
                NewEntity::new("Label").field(NewField::new("title", "text")),
            ],
        )
        .unwrap();
    let label_before = table(&backend, "tasks_label");

    registry.delete_field("tasks", "Task", "notes").unwrap();
    assert_eq!(table(&backend, "tasks_task").column_names(), vec!["id", "title", "owner_id"]);
    assert_eq!(table(&backend, "tasks_label"), label_before);

    // reference fields drop their physical column
    let (_, report) = registry.delete_field("tasks", "Task", "owner").unwrap();
    assert_eq!(report.statements, vec!["ALTER TABLE \"tasks_task\" DROP COLUMN \"owner_id\""]);
    let task = table(&backend, "tasks_task");
    assert_eq!(task.column_names(), vec!["id", "title"]);
    assert!(task.foreign_keys.is_empty());
    assert!(task.indexes.is_empty());
}

#[test]
fn test_unknown_type_degrades_to_text() {
    let (registry, backend) = registry_with_users();
    registry
        .define_entity(
            "tasks",
            NewEntity::new("Task").field(NewField::new("colour", "paint").required().unique()),
        )
        .unwrap();

    let schema = registry.schema("tasks", "Task").unwrap();
    let colour = schema.column("colour").unwrap();
    assert!(colour.degraded.is_some());
    assert!(colour.is_generic_text());
    assert!(colour.constraints.nullable);
    assert!(!colour.constraints.unique);

    let live = table(&backend, "tasks_task");
    assert_eq!(live.column("colour").unwrap().storage, StorageType::Varchar(255));
    assert!(live.column("colour").unwrap().nullable);
}

#[test]
fn test_schema_follows_newly_defined_entity_types() {
    let (registry, _) = registry_with_users();
    registry
        .define_entity("tasks", NewEntity::new("Task").field(NewField::new("sprint", "sprint")))
        .unwrap();
    let before = registry.schema("tasks", "Task").unwrap();
    assert!(before.column("sprint").unwrap().degraded.is_some());

    registry.define_entity("tasks", NewEntity::new("Sprint")).unwrap();

    let after = registry.schema("tasks", "Task").unwrap();
    assert!(matches!(after.column("sprint").unwrap().kind, ColumnKind::Reference { .. }));
    assert_eq!(after.column("sprint").unwrap().column, "sprint_id");
}

#[test]
fn test_api_settings_report_every_unknown_field() {
    let (registry, _) = registry_with_users();
    registry
        .define_entity("tasks", NewEntity::new("Task").field(NewField::new("title", "text")))
        .unwrap();

    let err = registry
        .set_api_settings(
            "tasks",
            "Task",
            Some(ApiSettings {
                fields: Some("id,title,bogus".into()),
                filter_fields: Some("nope".into()),
                nested: false,
            }),
        )
        .unwrap_err();

    match err {
        SchemaError::ValidationFailure { fields, .. } => assert_eq!(fields, vec!["nope", "bogus"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(registry.entity("tasks", "Task").unwrap().api.is_none());
}

#[test]
fn test_invalid_draft_records_nothing() {
    let (registry, backend) = registry_with_users();

    let err = registry
        .define_entity(
            "tasks",
            NewEntity::new("Task")
                .field(NewField::new("title", "text"))
                .api(ApiSettings {
                    fields: Some("summary".into()),
                    ..ApiSettings::default()
                }),
        )
        .unwrap_err();
    assert!(matches!(err, SchemaError::ValidationFailure { .. }));

    let err = registry
        .define_entity("tasks", NewEntity::new("Task").field(NewField::new("Bad Name", "text")))
        .unwrap_err();
    assert!(matches!(err, SchemaError::ValidationFailure { .. }));

    assert!(registry.store().entity("tasks", "Task").unwrap().is_none());
    assert!(!backend.table_exists("tasks_task").unwrap());
}

#[test]
fn test_delete_entity_keeps_table() {
    let (registry, backend) = registry_with_users();
    registry.define_entity("tasks", NewEntity::new("Task")).unwrap();
    registry.schema("tasks", "Task").unwrap();

    registry.delete_entity("tasks", "Task").unwrap();

    assert!(backend.table_exists("tasks_task").unwrap());
    assert!(matches!(registry.schema("tasks", "Task"), Err(SchemaError::NotFound(_))));
    assert!(!registry.cache().contains("tasks", "Task").unwrap());
}

#[test]
fn test_delete_application_cascades_metadata() {
    let (registry, _) = registry_with_users();
    registry
        .define_entities("tasks", vec![NewEntity::new("Task"), NewEntity::new("Label")])
        .unwrap();

    let removed = registry.delete_application("tasks").unwrap();
    assert_eq!(removed.len(), 2);
    assert!(registry.store().entities().unwrap().is_empty());
    assert!(registry.store().application("tasks").unwrap().is_none());
}

#[test]
fn test_snapshot_restores_registry_and_storage() {
    let temp_dir = TempDir::new().unwrap();
    let snapshot = SnapshotFile::new(temp_dir.path().join("registry.snapshot"));

    let original = SchemaRegistry::in_memory();
    original.create_application("shop", "Shop").unwrap();
    original
        .define_entities(
            "shop",
            vec![
                NewEntity::new("Customer").field(NewField::new("name", "text")),
                NewEntity::new("Order").field(NewField::new("customer", "customer")),
            ],
        )
        .unwrap();
    original.save_snapshot(&snapshot).unwrap();

    let backend = Arc::new(MemoryBackend::new());
    let restored = SchemaRegistry::builder()
        .store(snapshot.load().unwrap().unwrap())
        .backend(backend.clone())
        .build();
    let report = restored.sync_storage().unwrap();

    assert_eq!(report.created.len(), 2);
    assert_eq!(
        table(&backend, "shop_order").foreign_key("customer_id").unwrap().target_table,
        "shop_customer"
    );
    assert_eq!(
        restored.schema("shop", "Order").unwrap().column_names(),
        original.schema("shop", "Order").unwrap().column_names()
    );
}

#[test]
fn test_record_validation_against_schema() {
    let (registry, _) = registry_with_users();
    registry
        .define_entity(
            "tasks",
            NewEntity::new("Task")
                .field(NewField::new("title", "text").required())
                .field(NewField::new("done", "boolean").default_value("false"))
                .field(NewField::new("owner", "user")),
        )
        .unwrap();
    let schema = registry.schema("tasks", "Task").unwrap();

    let mut record = instantschema::Record::new();
    record.insert("title".into(), "Write docs".into());
    let prepared = schema.prepare_insert(record).unwrap();
    assert_eq!(prepared.get("done"), Some(&instantschema::Value::Boolean(false)));

    let mut bad = instantschema::Record::new();
    bad.insert("title".into(), "".into());
    bad.insert("owner_id".into(), "alice".into());
    bad.insert("colour".into(), "red".into());
    match schema.validate_record(&bad).unwrap_err() {
        SchemaError::ValidationFailure { fields, .. } => {
            assert!(fields.contains(&"colour".to_string()));
            assert!(fields.contains(&"title".to_string()));
            assert!(fields.contains(&"owner_id".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}
