use crate::{error::ConfigError, job::JobArgs, settings::SyncSettings};
use connectors::lakehouse::config::{CatalogConfig, StorageLocation};
use tracing::info;

/// Builds the catalog configuration every publish of this run writes
/// through. Only the location is checked here; the store itself is opened
/// by the catalog.
pub fn catalog_config(args: &JobArgs, settings: &SyncSettings) -> Result<CatalogConfig, ConfigError> {
    let location = StorageLocation::parse(&args.output_bucket, &args.output_prefix)?;

    let config = CatalogConfig::new(location)
        .with_identifier_columns(settings.identifier_columns.clone())
        .with_upsert(true)
        .with_property("snowsync.job-name", args.job_name.clone());

    info!(
        "Catalog {} configured at {} (format-version {}, merge key {:?})",
        config.catalog_name,
        config.location,
        config.format_version,
        config.identifier_columns
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::lakehouse::config::PROP_UPSERT_ENABLED;
    use model::core::identifiers::TableName;

    fn args(bucket: &str) -> JobArgs {
        JobArgs {
            job_name: "nightly".into(),
            database_name: "raw".into(),
            connection_name: "snow".into(),
            output_bucket: bucket.into(),
            output_prefix: "/servicenow/".into(),
            tables: vec![TableName::from("incident")],
        }
    }

    #[test]
    fn test_s3_catalog_config() {
        let settings = SyncSettings::builder().identifier_columns(["number"]).build();
        let config = catalog_config(&args("analytics-lake"), &settings).unwrap();

        assert_eq!(config.location.warehouse_url(), "s3://analytics-lake/servicenow");
        assert_eq!(config.format_version, 2);
        assert_eq!(config.identifier_columns, vec!["number".to_string()]);

        let props = config.table_properties();
        assert_eq!(props.get(PROP_UPSERT_ENABLED).map(String::as_str), Some("true"));
        assert_eq!(props.get("snowsync.job-name").map(String::as_str), Some("nightly"));
    }

    #[test]
    fn test_invalid_bucket_is_fatal() {
        let err = catalog_config(&args("file://"), &SyncSettings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Catalog(_)));
    }
}
