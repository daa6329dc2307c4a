//! End-to-end tests for the migration engine.

use driftgate_core::{
    CancelToken, ChangeSet, ColumnDef, ColumnType, ConnectionKind, EngineBuilder, EngineConfig,
    EngineError, EntityEntry, EntityState, ForeignKeyDef, IndexDef, MemoryStore, MigrationOutcome,
    MigrationStore, PropertyEntry, RecordingExecutor, SchemaModel, SequentialIds, SledStore,
    TableDef, TenantDescriptor,
};
use std::sync::Arc;

struct TestContext {
    store: Arc<MemoryStore>,
    executor: Arc<RecordingExecutor>,
    engine: driftgate_core::MigrationEngine,
}

impl TestContext {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let executor = Arc::new(RecordingExecutor::new());
        let engine = EngineBuilder::new(
            EngineConfig::new("host-db").with_actor("deploy"),
            store.clone(),
            executor.clone(),
        )
        .ids(Arc::new(SequentialIds::new()))
        .build();

        Self {
            store,
            executor,
            engine,
        }
    }
}

fn blog_model() -> SchemaModel {
    SchemaModel::new()
        .with_table(
            TableDef::new("Users")
                .with_column(ColumnDef::new("Id", ColumnType::Uuid))
                .with_column(ColumnDef::new("Email", ColumnType::Text).with_max_length(320))
                .with_primary_key(["Id"]),
        )
        .with_table(
            TableDef::new("Posts")
                .with_column(ColumnDef::new("Id", ColumnType::Uuid))
                .with_column(ColumnDef::new("AuthorId", ColumnType::Uuid))
                .with_column(ColumnDef::optional("Title", ColumnType::Text))
                .with_primary_key(["Id"]),
        )
        .with_index(IndexDef::new("IX_Posts_AuthorId", "Posts", ["AuthorId"]))
        .with_foreign_key(ForeignKeyDef::new(
            "FK_Posts_Users",
            "Posts",
            ["AuthorId"],
            "Users",
            ["Id"],
        ))
}

#[test]
fn fresh_database_gets_baseline_then_idles() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    let outcome = ctx
        .engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap();
    let MigrationOutcome::Applied {
        baseline, commands, ..
    } = outcome
    else {
        panic!("expected applied outcome");
    };
    assert!(baseline);
    // Two tables, one index, one foreign key.
    assert_eq!(commands.len(), 4);
    assert_eq!(ctx.executor.executed_count(), 4);

    let record = ctx.store.latest_migration("default").unwrap().unwrap();
    assert_eq!(record.created_by, "deploy");
    assert!(!record.snapshot_hash.is_empty());

    // Same model again: nothing runs, nothing new is stored.
    let outcome = ctx
        .engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap();
    assert!(matches!(outcome, MigrationOutcome::NoChange));
    assert_eq!(ctx.executor.executed_count(), 4);
    assert_eq!(ctx.store.list_migrations("default").unwrap().len(), 1);
}

#[test]
fn incremental_change_executes_only_the_diff() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    ctx.engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap();
    let before = ctx.executor.executed_count();

    let mut next = blog_model();
    let users = next.tables.get_mut("Users").unwrap();
    users
        .columns
        .push(ColumnDef::optional("DisplayName", ColumnType::Text));

    let outcome = ctx.engine.migrate("default", &next, None, &cancel).unwrap();
    let MigrationOutcome::Applied {
        operations,
        baseline,
        ..
    } = outcome
    else {
        panic!("expected applied outcome");
    };
    assert!(!baseline);
    assert_eq!(operations.len(), 1);
    assert_eq!(ctx.executor.executed_count(), before + 1);

    let executed = ctx.executor.executed();
    assert!(executed
        .last()
        .unwrap()
        .1
        .text
        .contains("ADD COLUMN \"DisplayName\""));
    assert_eq!(ctx.store.list_migrations("default").unwrap().len(), 2);

    // The persisted snapshot restores to exactly the migrated model.
    let record = ctx.store.latest_migration("default").unwrap().unwrap();
    let restored =
        driftgate_core::snapshot::restore(&record.snapshot_body, &record.snapshot_type_name)
            .unwrap();
    assert_eq!(restored, next);
}

#[test]
fn primary_key_change_is_migrated() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    ctx.engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap();

    let mut next = blog_model();
    next.tables.get_mut("Users").unwrap().primary_key = vec!["Id".into(), "Email".into()];

    let outcome = ctx.engine.migrate("default", &next, None, &cancel).unwrap();
    let MigrationOutcome::Applied {
        operations,
        commands,
        ..
    } = outcome
    else {
        panic!("expected applied outcome");
    };
    assert_eq!(operations.len(), 1);
    assert_eq!(commands.len(), 1);
    assert!(commands[0]
        .text
        .contains("ADD PRIMARY KEY (\"Id\", \"Email\")"));

    // The stored snapshot moved to the new key.
    assert_eq!(ctx.store.list_migrations("default").unwrap().len(), 2);
    let record = ctx.store.latest_migration("default").unwrap().unwrap();
    let restored =
        driftgate_core::snapshot::restore(&record.snapshot_body, &record.snapshot_type_name)
            .unwrap();
    assert_eq!(restored, next);
}

#[test]
fn column_reorder_persists_without_commands() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    ctx.engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap();
    let before = ctx.executor.executed_count();

    let mut next = blog_model();
    next.tables.get_mut("Users").unwrap().columns.reverse();

    let outcome = ctx.engine.migrate("default", &next, None, &cancel).unwrap();
    let MigrationOutcome::Applied {
        operations,
        commands,
        ..
    } = outcome
    else {
        panic!("expected applied outcome");
    };
    assert_eq!(operations.len(), 1);
    assert!(commands.is_empty());
    assert_eq!(ctx.executor.executed_count(), before);

    // The new snapshot carries the change, so a rerun has nothing to do.
    assert_eq!(ctx.store.list_migrations("default").unwrap().len(), 2);
    let outcome = ctx.engine.migrate("default", &next, None, &cancel).unwrap();
    assert!(matches!(outcome, MigrationOutcome::NoChange));
}

#[test]
fn concurrent_runs_yield_exactly_one_record() {
    let ctx = TestContext::new();
    let model = blog_model();

    let outcomes: Vec<MigrationOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    let cancel = CancelToken::new();
                    ctx.engine
                        .migrate("default", &model, None, &cancel)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // Exactly one run persisted; the other saw the work already done.
    let applied = outcomes
        .iter()
        .filter(|o| matches!(o, MigrationOutcome::Applied { .. }))
        .count();
    assert_eq!(applied, 1);
    assert_eq!(ctx.store.list_migrations("default").unwrap().len(), 1);

    // Commands ran in whole batches, never interleaved.
    let executed = ctx.executor.executed();
    assert!(!executed.is_empty());
    assert_eq!(executed.len() % 4, 0);
    for batch in executed.chunks(4).skip(1) {
        assert_eq!(batch, &executed[..4]);
    }
}

#[test]
fn read_only_tenant_connection_is_left_alone() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    // Writing separation on, the unit of work holds the read-only
    // default connection, and structure sync is off.
    let tenant = TenantDescriptor::new("acme", "acme-replica")
        .with_writing_connection("acme-primary")
        .structure_sync(false);
    let outcome = ctx
        .engine
        .migrate_on(
            "acme",
            &blog_model(),
            Some(&tenant),
            ConnectionKind::Default,
            &cancel,
        )
        .unwrap();

    let MigrationOutcome::SkippedReadOnly { operations } = outcome else {
        panic!("expected skip");
    };
    assert!(!operations.is_empty());
    assert_eq!(ctx.executor.executed_count(), 0);
    assert!(ctx.store.latest_migration("acme").unwrap().is_none());
}

#[test]
fn tenant_with_writing_separation_uses_primary() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    let tenant =
        TenantDescriptor::new("acme", "acme-replica").with_writing_connection("acme-primary");
    let outcome = ctx
        .engine
        .migrate("acme", &blog_model(), Some(&tenant), &cancel)
        .unwrap();
    assert!(matches!(outcome, MigrationOutcome::Applied { .. }));

    for (connection, _) in ctx.executor.executed() {
        assert_eq!(connection, "acme-primary");
    }
}

#[test]
fn shardable_table_indexes_are_not_created() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    let model = SchemaModel::new()
        .with_table(
            TableDef::new("Events")
                .with_column(ColumnDef::new("Id", ColumnType::Uuid))
                .with_primary_key(["Id"])
                .shardable(),
        )
        .with_index(IndexDef::new("IX_Events_Id", "Events", ["Id"]));

    let outcome = ctx.engine.migrate("default", &model, None, &cancel).unwrap();
    let MigrationOutcome::Applied { commands, .. } = outcome else {
        panic!("expected applied outcome");
    };
    assert_eq!(commands.len(), 1);
    assert!(commands[0].text.starts_with("CREATE TABLE"));
}

#[test]
fn persist_failure_retry_does_not_rerun_commands() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    ctx.store.fail_writes(true);
    let err = ctx
        .engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    let executed = ctx.executor.executed_count();
    assert!(executed > 0);

    ctx.store.fail_writes(false);
    let outcome = ctx
        .engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap();
    assert!(matches!(outcome, MigrationOutcome::Applied { .. }));
    // The previously executed batch was recognized and skipped.
    assert_eq!(ctx.executor.executed_count(), executed);
    assert_eq!(ctx.store.list_migrations("default").unwrap().len(), 1);
}

#[test]
fn partial_failure_stops_at_failing_command() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    ctx.executor.fail_at(2);
    let err = ctx
        .engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap_err();

    let EngineError::PartialMigration {
        applied, failed, ..
    } = err
    else {
        panic!("expected partial migration");
    };
    assert_eq!(applied, 2);
    assert!(!failed.is_empty());
    assert_eq!(ctx.executor.executed_count(), 2);
    assert!(ctx.store.latest_migration("default").unwrap().is_none());
}

#[test]
fn cancellation_between_commands_reports_progress() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = ctx
        .engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Cancelled {
            commands_applied: 0
        }
    ));
    assert_eq!(ctx.executor.executed_count(), 0);
}

#[test]
fn audits_flow_through_the_engine() {
    let ctx = TestContext::new();

    let set = ChangeSet::new().with_entry(
        EntityEntry::new("User", EntityState::Modified)
            .with_property(PropertyEntry::new("Id").original("42").current("42").key())
            .with_property(
                PropertyEntry::new("Email")
                    .original("old@example.com")
                    .current("new@example.com"),
            )
            .with_property(
                PropertyEntry::new("RowVersion")
                    .original("1")
                    .current("2")
                    .concurrency_token(),
            )
            .updated_by("alice", chrono::Utc::now()),
    );

    assert_eq!(ctx.engine.record_audits(&set), 1);

    let audits = ctx.store.list_audits("User").unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].entity_key, "42");
    assert_eq!(audits[0].created_by, "alice");
    assert_eq!(audits[0].properties.len(), 1);
    assert_eq!(audits[0].properties[0].name, "Email");
}

#[test]
fn audit_store_failure_is_swallowed() {
    let ctx = TestContext::new();
    ctx.store.fail_writes(true);

    let set = ChangeSet::new().with_entry(
        EntityEntry::new("User", EntityState::Added)
            .with_property(PropertyEntry::new("Id").current("1").key()),
    );

    assert_eq!(ctx.engine.record_audits(&set), 0);
}

#[test]
fn snapshots_survive_process_restart_on_sled() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancelToken::new();

    {
        let store = Arc::new(SledStore::open(dir.path()).unwrap());
        let engine = EngineBuilder::new(
            EngineConfig::new("host-db"),
            store,
            Arc::new(RecordingExecutor::new()),
        )
        .build();
        let outcome = engine
            .migrate("default", &blog_model(), None, &cancel)
            .unwrap();
        assert!(matches!(
            outcome,
            MigrationOutcome::Applied { baseline: true, .. }
        ));
    }

    // A fresh engine on the same database sees the stored snapshot and
    // has nothing to do.
    let store = Arc::new(SledStore::open(dir.path()).unwrap());
    let executor = Arc::new(RecordingExecutor::new());
    let engine = EngineBuilder::new(EngineConfig::new("host-db"), store, executor.clone()).build();

    let outcome = engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap();
    assert!(matches!(outcome, MigrationOutcome::NoChange));
    assert_eq!(executor.executed_count(), 0);
}

#[test]
fn corrupt_snapshot_falls_back_to_baseline() {
    let ctx = TestContext::new();
    let cancel = CancelToken::new();

    // Seed a record whose body is not a valid snapshot.
    ctx.store
        .insert_migration(&driftgate_core::MigrationRecord {
            id: [1u8; 16],
            accessor_name: "default".to_string(),
            snapshot_type_name: driftgate_core::SNAPSHOT_TYPE_NAME.to_string(),
            snapshot_body: b"garbage".to_vec(),
            snapshot_hash: "bogus".to_string(),
            created_by: "system".to_string(),
            created_at: chrono::Utc::now(),
        })
        .unwrap();

    let outcome = ctx
        .engine
        .migrate("default", &blog_model(), None, &cancel)
        .unwrap();
    assert!(matches!(
        outcome,
        MigrationOutcome::Applied { baseline: true, .. }
    ));
    assert_eq!(ctx.store.list_migrations("default").unwrap().len(), 2);
}
