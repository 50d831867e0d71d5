#[cfg(test)]
mod tests {
    use crate::{
        TEST_DATABASE,
        utils::{
            FixtureSource, Warehouse, fast_settings, find_row, get_cell_as_i64,
            get_cell_as_string, incident, raw_args, run_tables,
        },
    };
    use engine_config::{error::ConfigError, job::RawJobArgs, settings::SyncSettings};
    use engine_core::transform::EXTRACT_TIMESTAMP_COLUMN;
    use engine_runtime::{
        error::SyncError,
        execution::{
            executor,
            factory::{ComponentFactory, JobComponents},
        },
    };
    use model::{
        core::value::Value,
        execution::outcome::{TableOutcome, TableStage},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    struct FixedFactory(JobComponents);

    #[async_trait::async_trait]
    impl ComponentFactory for FixedFactory {
        async fn build(
            &self,
            _args: &engine_config::job::JobArgs,
            _settings: &SyncSettings,
        ) -> Result<JobComponents, SyncError> {
            Ok(self.0.clone())
        }
    }

    // Scenario: The source table exists but has no rows, and the destination does not exist.
    // Expected Outcome:
    // - No publish call reaches the sink.
    // - No destination table is created.
    // - The run is still finalized with an `empty` outcome.
    #[traced_test]
    #[tokio::test]
    async fn tc01() {
        let warehouse = Warehouse::new();
        let source = Arc::new(FixtureSource::new().with_table("problem", json!([])));

        let report = run_tables(&warehouse, source, &["problem"], fast_settings()).await;

        assert_eq!(report.tables[0].outcome, TableOutcome::Empty);
        assert_eq!(warehouse.sink.publishes(), 0);
        assert!(!warehouse.table_exists("problem").await);
        assert!(logs_contain("No data found for table problem"));

        let marker = warehouse.latest_marker().await.unwrap();
        assert_eq!(marker.run_id, report.run_id);
        assert_eq!(marker.summary().empty, 1);
    }

    // Scenario: A table with N rows is synced into an absent destination.
    // Expected Outcome:
    // - The table is created with exactly N rows.
    // - Every row carries a timestamp `extract_timestamp` no earlier than the run start.
    // - All rows share the same timestamp.
    // - Reference fields are flattened to their sys_id.
    #[traced_test]
    #[tokio::test]
    async fn tc02() {
        let warehouse = Warehouse::new();
        let source = Arc::new(FixtureSource::new().with_table(
            "incident",
            json!([
                incident("a1", "INC0001", 1),
                incident("a2", "INC0002", 2),
                incident("a3", "INC0003", 6),
            ]),
        ));

        let report = run_tables(&warehouse, source, &["incident"], fast_settings()).await;

        assert_eq!(
            report.tables[0].outcome,
            TableOutcome::Written {
                rows: 3,
                created: true
            }
        );
        assert!(logs_contain(
            "Successfully wrote 3 records to servicenow_raw.incident"
        ));

        let rows = warehouse.rows("incident").await;
        assert_eq!(rows.len(), 3);

        let stamps: Vec<_> = rows
            .iter()
            .map(|r| match r.get_value(EXTRACT_TIMESTAMP_COLUMN) {
                Value::Timestamp(ts) => ts,
                other => panic!("extract_timestamp is not a timestamp: {other:?}"),
            })
            .collect();
        assert!(stamps.iter().all(|ts| *ts == stamps[0]));
        assert!(stamps[0].timestamp_micros() >= report.started_at.timestamp_micros());

        assert_eq!(
            get_cell_as_string(&rows, "a2", "assigned_to").as_deref(),
            Some("6816f79cc0a8016401c5a33be04be441")
        );
        assert_eq!(get_cell_as_i64(&rows, "a3", "state"), Some(6));
    }

    // Scenario: Table names are supplied in mixed case.
    // Expected Outcome: Destinations are always `{database_name}.{lowercase(name)}`.
    #[tokio::test]
    async fn tc03() {
        let warehouse = Warehouse::new();
        let source = Arc::new(
            FixtureSource::new()
                .with_table("Change_Request", json!([incident("c1", "CHG0001", 1)]))
                .with_table("SYS_USER", json!([{ "sys_id": "u1", "user_name": "admin" }])),
        );

        let report = run_tables(
            &warehouse,
            source.clone(),
            &["Change_Request", "SYS_USER"],
            fast_settings(),
        )
        .await;

        let destinations: Vec<_> = report
            .tables
            .iter()
            .map(|t| t.destination.to_string())
            .collect();
        assert_eq!(
            destinations,
            vec![
                format!("{TEST_DATABASE}.change_request"),
                format!("{TEST_DATABASE}.sys_user"),
            ]
        );
        // The source is still addressed by the name as given.
        assert_eq!(source.calls(), vec!["Change_Request", "SYS_USER"]);
        assert!(warehouse.table_exists("change_request").await);
        assert!(warehouse.table_exists("sys_user").await);
    }

    // Scenario: The first table cannot be fetched and the second one is rejected by the sink.
    // Expected Outcome:
    // - Both failures are recorded with their stage.
    // - The third table is still written.
    // - The run finalizes without an error.
    #[traced_test]
    #[tokio::test]
    async fn tc04() {
        let warehouse = Warehouse::rejecting("problem");
        let source = Arc::new(
            FixtureSource::new()
                .unreachable("incident")
                .with_table("problem", json!([{ "sys_id": "p1" }]))
                .with_table("sys_user", json!([{ "sys_id": "u1" }])),
        );

        let report = run_tables(
            &warehouse,
            source.clone(),
            &["incident", "problem", "sys_user"],
            fast_settings(),
        )
        .await;

        assert!(matches!(
            report.tables[0].outcome,
            TableOutcome::Failed {
                stage: TableStage::Fetching,
                ..
            }
        ));
        assert!(matches!(
            report.tables[1].outcome,
            TableOutcome::Failed {
                stage: TableStage::Publishing,
                ..
            }
        ));
        assert_eq!(report.tables[2].outcome.rows_written(), 1);

        // Connection failures are transient: two attempts for incident.
        assert_eq!(
            source.calls(),
            vec!["incident", "incident", "problem", "sys_user"]
        );
        assert_eq!(report.retries, 1);
        assert!(logs_contain("Error processing table incident: Connection failed"));
        assert!(!warehouse.table_exists("problem").await);
        assert_eq!(warehouse.latest_marker().await.unwrap().summary().failed, 2);
    }

    // Scenario: `["Incident", "incident"]` both resolve to the same destination table.
    // Expected Outcome:
    // - Both entries target `servicenow_raw.incident`.
    // - The second merge replaces rows with matching sys_id and keeps the others.
    #[tokio::test]
    async fn tc05() {
        let warehouse = Warehouse::new();
        let source = Arc::new(
            FixtureSource::new()
                .with_table(
                    "Incident",
                    json!([incident("a1", "INC0001", 1), incident("a2", "INC0002", 1)]),
                )
                .with_table(
                    "incident",
                    json!([incident("a2", "INC0002", 7), incident("a3", "INC0003", 1)]),
                ),
        );

        let report = run_tables(
            &warehouse,
            source,
            &["Incident", "incident"],
            fast_settings(),
        )
        .await;

        assert_eq!(report.tables[0].destination, report.tables[1].destination);
        assert_eq!(
            report.tables[1].outcome,
            TableOutcome::Written {
                rows: 2,
                created: false
            }
        );

        let rows = warehouse.rows("incident").await;
        assert_eq!(rows.len(), 3);
        assert!(find_row(&rows, "a1").is_some());
        assert_eq!(get_cell_as_i64(&rows, "a2", "state"), Some(7));
        assert_eq!(warehouse.version("incident").await, Some(2));
    }

    // Scenario: Each of the six run parameters is missing in turn.
    // Expected Outcome: The run aborts with a configuration error before anything is fetched or written.
    #[tokio::test]
    async fn tc06() {
        let clears: [fn(&mut RawJobArgs); 6] = [
            |r| r.job_name = None,
            |r| r.database_name = None,
            |r| r.connection_name = None,
            |r| r.output_bucket = None,
            |r| r.output_prefix = None,
            |r| r.tables = None,
        ];

        for clear in clears {
            let warehouse = Warehouse::new();
            let source = Arc::new(
                FixtureSource::new().with_table("incident", json!([incident("a1", "INC1", 1)])),
            );
            let factory = FixedFactory(warehouse.components(source.clone()));

            let mut raw = raw_args(&["incident"]);
            clear(&mut raw);

            let err = executor::launch(raw, fast_settings(), &factory, CancellationToken::new())
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                SyncError::Config(ConfigError::MissingParameter(_))
            ));
            assert!(source.calls().is_empty());
            assert_eq!(warehouse.sink.publishes(), 0);
            assert_eq!(warehouse.object_count().await, 0);
        }
    }

    // Scenario: A later run brings a new column and omits a previously seen one.
    // Expected Outcome:
    // - The schema gains the new column.
    // - Rows from the earlier run keep their values.
    // - The omitted column is null on the new rows.
    #[tokio::test]
    async fn tc07() {
        let warehouse = Warehouse::new();
        let first = Arc::new(FixtureSource::new().with_table(
            "sys_user",
            json!([{ "sys_id": "u1", "user_name": "admin", "active": true }]),
        ));
        run_tables(&warehouse, first, &["sys_user"], fast_settings()).await;

        let second = Arc::new(FixtureSource::new().with_table(
            "sys_user",
            json!([{ "sys_id": "u2", "user_name": "itil", "email": "itil@example.com" }]),
        ));
        let report = run_tables(&warehouse, second, &["sys_user"], fast_settings()).await;
        assert_eq!(report.tables[0].outcome.rows_written(), 1);

        let rows = warehouse.rows("sys_user").await;
        assert_eq!(rows.len(), 2);
        assert_eq!(
            get_cell_as_string(&rows, "u1", "active").as_deref(),
            Some("true")
        );
        assert_eq!(get_cell_as_string(&rows, "u1", "email"), None);
        assert_eq!(
            get_cell_as_string(&rows, "u2", "email").as_deref(),
            Some("itil@example.com")
        );
        assert_eq!(get_cell_as_string(&rows, "u2", "active"), None);
    }

    // Scenario: Several destinations are synced with concurrency enabled, including two
    // case variants of the same table.
    // Expected Outcome:
    // - Outcomes are reported in list order.
    // - The case variants are merged one after the other without losing rows.
    #[tokio::test]
    async fn tc08() {
        let warehouse = Warehouse::new();
        let source = Arc::new(
            FixtureSource::new()
                .with_table("incident", json!([incident("a1", "INC1", 1)]))
                .with_table("problem", json!([{ "sys_id": "p1" }, { "sys_id": "p2" }]))
                .with_table("INCIDENT", json!([incident("a2", "INC2", 1)]))
                .with_table("task", json!([])),
        );
        let settings = SyncSettings::builder()
            .concurrency(4)
            .fetch_timeout(std::time::Duration::from_secs(5))
            .build();

        let report = run_tables(
            &warehouse,
            source,
            &["incident", "problem", "INCIDENT", "task"],
            settings,
        )
        .await;

        let labels: Vec<_> = report.tables.iter().map(|t| t.outcome.label()).collect();
        assert_eq!(labels, vec!["written", "written", "written", "empty"]);
        assert_eq!(warehouse.rows("incident").await.len(), 2);
        assert_eq!(warehouse.rows("problem").await.len(), 2);
        assert!(!warehouse.table_exists("task").await);
    }
}
