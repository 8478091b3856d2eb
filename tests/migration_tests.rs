use instantschema::storage::TableInfo;
use instantschema::{
    ContentTypeRegistry, FieldTypeResolver, MemoryBackend, MemoryContentTypes, MetadataStore, MigrationEngine, NewEntity, NewField,
    RecordingNotifier, RegistryConfig, Result, SchemaError, SchemaSynthesizer, StorageBackend, SynthesizedSchema,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Delegates to an in-memory backend but rejects statements containing a marker.
struct FailingBackend {
    inner: MemoryBackend,
    marker: String,
}

impl StorageBackend for FailingBackend {
    fn list_tables(&self) -> Result<BTreeSet<String>> {
        self.inner.list_tables()
    }

    fn execute_ddl(&self, statement: &str) -> Result<()> {
        if statement.contains(&self.marker) {
            return Err(SchemaError::StorageUnavailable(format!("injected failure: {}", statement)));
        }
        self.inner.execute_ddl(statement)
    }

    fn begin(&self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> Result<()> {
        self.inner.rollback()
    }

    fn describe_table(&self, name: &str) -> Result<Option<TableInfo>> {
        self.inner.describe_table(name)
    }
}

struct Fixture {
    config: RegistryConfig,
    store: MetadataStore,
    content_types: Arc<MemoryContentTypes>,
    notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    fn shop() -> Self {
        let store = MetadataStore::new();
        store.create_application("shop", "Shop").unwrap();
        Self {
            config: RegistryConfig::new(),
            store,
            content_types: Arc::new(MemoryContentTypes::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    fn entity(&self, name: &str, fields: &[(&str, &str)]) {
        let entity = self.store.insert_entity("shop", &NewEntity::new(name)).unwrap();
        for (field, token) in fields {
            self.store.insert_field(entity.id, &NewField::new(field, token)).unwrap();
        }
    }

    fn schema(&self, name: &str) -> SynthesizedSchema {
        let resolver = FieldTypeResolver::new(&self.config, self.content_types.as_ref(), &self.store);
        SchemaSynthesizer::new(&self.store, resolver)
            .synthesize("shop", name)
            .unwrap()
    }

    fn engine(&self, backend: Arc<dyn StorageBackend>) -> MigrationEngine {
        MigrationEngine::new(
            self.config.clone(),
            backend,
            self.content_types.clone(),
            self.notifier.clone(),
        )
    }

    fn create(&self, engine: &MigrationEngine, name: &str) -> Result<instantschema::MigrationReport> {
        let entity = self.store.entity("shop", name).unwrap().unwrap();
        engine.create_table(&entity, &self.schema(name))
    }
}

#[test]
fn test_pending_reference_resolved_by_later_create() {
    let fixture = Fixture::shop();
    fixture.entity("Order", &[("customer", "customer")]);
    fixture.entity("Customer", &[("name", "text")]);

    let backend = Arc::new(MemoryBackend::new());
    let engine = fixture.engine(backend.clone());

    let first = fixture.create(&engine, "Order").unwrap();
    assert_eq!(
        first.statements[0],
        "CREATE TABLE \"shop_order\" (\"id\" INTEGER PRIMARY KEY, \"customer_id\" INTEGER)"
    );
    let pending = engine.pending_references().unwrap();
    assert_eq!(pending.waiting_on("shop_customer").len(), 1);
    assert!(backend.describe_table("shop_order").unwrap().unwrap().foreign_keys.is_empty());

    let second = fixture.create(&engine, "Customer").unwrap();
    assert_eq!(
        second.statements[1],
        "ALTER TABLE \"shop_order\" ADD CONSTRAINT \"fk_shop_order_customer_id_shop_customer\" FOREIGN KEY (\"customer_id\") REFERENCES \"shop_customer\" (\"id\")"
    );
    assert!(engine.pending_references().unwrap().is_empty());

    let order = backend.describe_table("shop_order").unwrap().unwrap();
    assert_eq!(order.foreign_key("customer_id").unwrap().target_table, "shop_customer");
    assert_eq!(
        fixture.notifier.batches().unwrap(),
        vec![vec!["shop.order".to_string()], vec!["shop.customer".to_string()]]
    );
}

#[test]
fn test_column_add_defers_until_target_exists() {
    let fixture = Fixture::shop();
    fixture.entity("Order", &[]);
    fixture.entity("Customer", &[]);

    let backend = Arc::new(MemoryBackend::new());
    let engine = fixture.engine(backend.clone());
    fixture.create(&engine, "Order").unwrap();

    let order = fixture.store.entity("shop", "Order").unwrap().unwrap();
    fixture
        .store
        .insert_field(order.id, &NewField::new("customer", "customer").required())
        .unwrap();
    let schema = fixture.schema("Order");
    let column = schema.column("customer").unwrap();

    let report = engine.add_column(&schema, column).unwrap();
    assert_eq!(
        report.statements,
        vec![
            "ALTER TABLE \"shop_order\" ADD COLUMN \"customer_id\" INTEGER".to_string(),
            "CREATE INDEX \"shop_order_customer_id\" ON \"shop_order\" (\"customer_id\")".to_string(),
        ]
    );
    assert_eq!(engine.pending_references().unwrap().len(), 1);

    fixture.create(&engine, "Customer").unwrap();
    let live = backend.describe_table("shop_order").unwrap().unwrap();
    assert_eq!(live.foreign_key("customer_id").unwrap().target_table, "shop_customer");
    // added columns never carry NOT NULL
    assert!(live.column("customer_id").unwrap().nullable);
}

#[test]
fn test_dropping_column_forgets_its_obligation() {
    let fixture = Fixture::shop();
    fixture.entity("Order", &[("customer", "customer")]);
    fixture.entity("Customer", &[]);

    let backend = Arc::new(MemoryBackend::new());
    let engine = fixture.engine(backend.clone());
    fixture.create(&engine, "Order").unwrap();
    assert_eq!(engine.pending_references().unwrap().len(), 1);

    engine.drop_column("shop_order", "customer_id").unwrap();
    assert!(engine.pending_references().unwrap().is_empty());

    let report = fixture.create(&engine, "Customer").unwrap();
    assert_eq!(report.statements.len(), 1);
}

#[test]
fn test_failed_create_rolls_back_whole_batch() {
    let fixture = Fixture::shop();
    fixture.entity("Order", &[("customer", "customer")]);
    fixture.entity("Customer", &[("name", "text")]);

    let backend = Arc::new(FailingBackend {
        inner: MemoryBackend::new(),
        marker: "CREATE TABLE \"shop_customer\"".to_string(),
    });
    let engine = fixture.engine(backend.clone());

    let order = fixture.store.entity("shop", "Order").unwrap().unwrap();
    let customer = fixture.store.entity("shop", "Customer").unwrap().unwrap();
    let (order_schema, customer_schema) = (fixture.schema("Order"), fixture.schema("Customer"));

    let err = engine
        .create_tables(&[(&order, &order_schema), (&customer, &customer_schema)])
        .unwrap_err();

    assert!(matches!(err, SchemaError::StorageUnavailable(_)));
    assert!(backend.list_tables().unwrap().is_empty());
    assert!(!backend.inner.in_transaction().unwrap());
    assert!(backend.inner.statements().unwrap().is_empty());
    assert!(engine.pending_references().unwrap().is_empty());
    assert!(fixture.content_types.all().unwrap().is_empty());
    assert!(fixture.notifier.batches().unwrap().is_empty());
}

#[test]
fn test_index_failure_is_isolated() {
    let fixture = Fixture::shop();
    fixture.entity("Customer", &[]);
    fixture.entity("Product", &[]);
    fixture.entity("Order", &[("customer", "customer"), ("product", "product")]);

    // an unrelated table already owns the name of one of the order's indexes
    let backend = Arc::new(
        MemoryBackend::new()
            .with_tables(
                "CREATE TABLE legacy (id INTEGER PRIMARY KEY, x INTEGER); CREATE INDEX shop_order_customer_id ON legacy (x)",
            )
            .unwrap(),
    );
    let engine = fixture.engine(backend.clone());
    fixture.create(&engine, "Customer").unwrap();
    fixture.create(&engine, "Product").unwrap();

    let report = fixture.create(&engine, "Order").unwrap();

    assert_eq!(report.created, vec!["shop_order"]);
    assert_eq!(report.index_failures.len(), 1);
    match &report.index_failures[0] {
        SchemaError::IndexInstallFailure { app, entity, column, .. } => {
            assert_eq!(app, "shop");
            assert_eq!(entity, "Order");
            assert_eq!(column, "customer_id");
        }
        other => panic!("unexpected failure: {other}"),
    }

    let order = backend.describe_table("shop_order").unwrap().unwrap();
    assert!(order.index("shop_order_product_id").is_some());
    assert!(order.index("shop_order_customer_id").is_none());
    assert_eq!(order.foreign_keys.len(), 2);
    assert!(!backend.in_transaction().unwrap());
}

#[test]
fn test_existing_table_skipped_without_registration() {
    let fixture = Fixture::shop();
    fixture.entity("Customer", &[("name", "text")]);

    let backend = Arc::new(MemoryBackend::new());
    let engine = fixture.engine(backend.clone());
    fixture.create(&engine, "Customer").unwrap();
    let again = fixture.create(&engine, "Customer").unwrap();

    assert!(again.is_empty());
    assert_eq!(again.skipped, vec!["shop_customer"]);
    assert_eq!(fixture.content_types.all().unwrap().len(), 1);
    assert_eq!(backend.statements().unwrap().len(), 1);
    assert_eq!(fixture.notifier.batches().unwrap().len(), 1);
}
