use crate::lakehouse::error::LakehouseError;
use std::{collections::BTreeMap, fmt, path::PathBuf};

pub const DEFAULT_CATALOG_NAME: &str = "glue_catalog";
pub const DEFAULT_FORMAT_VERSION: u8 = 2;
pub const DEFAULT_IDENTIFIER_COLUMN: &str = "sys_id";

pub const PROP_WRITE_FORMAT: &str = "write.format.default";
pub const PROP_UPSERT_ENABLED: &str = "write.upsert.enabled";
pub const PROP_COMPRESSION: &str = "write.parquet.compression-codec";

/// Where the warehouse lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    S3 { bucket: String, prefix: String },
    Local { root: PathBuf, prefix: String },
    Memory { prefix: String },
}

impl StorageLocation {
    /// Interprets the `output_bucket` / `output_prefix` pair.
    ///
    /// `file:///abs/path` selects the local filesystem, `memory://` an
    /// in-process store and a bare bucket name (or `s3://bucket`) S3.
    pub fn parse(bucket: &str, prefix: &str) -> Result<Self, LakehouseError> {
        let bucket = bucket.trim();
        let prefix = prefix.trim().trim_matches('/').to_string();

        if let Some(path) = bucket.strip_prefix("file://") {
            if path.is_empty() {
                return Err(LakehouseError::InvalidLocation(
                    "file:// location needs a path".to_string(),
                ));
            }
            return Ok(StorageLocation::Local {
                root: PathBuf::from(path),
                prefix,
            });
        }

        if bucket.starts_with("memory://") {
            return Ok(StorageLocation::Memory { prefix });
        }

        let name = bucket.strip_prefix("s3://").unwrap_or(bucket).trim_end_matches('/');
        if name.is_empty() || name.contains('/') || name.contains("://") {
            return Err(LakehouseError::InvalidLocation(format!(
                "invalid bucket name {bucket:?}"
            )));
        }

        Ok(StorageLocation::S3 {
            bucket: name.to_string(),
            prefix,
        })
    }

    pub fn prefix(&self) -> &str {
        match self {
            StorageLocation::S3 { prefix, .. }
            | StorageLocation::Local { prefix, .. }
            | StorageLocation::Memory { prefix } => prefix,
        }
    }

    pub fn warehouse_url(&self) -> String {
        let base = match self {
            StorageLocation::S3 { bucket, .. } => format!("s3://{bucket}"),
            StorageLocation::Local { root, .. } => format!("file://{}", root.display()),
            StorageLocation::Memory { .. } => "memory://".to_string(),
        };
        match self.prefix() {
            "" => base,
            prefix if base.ends_with('/') => format!("{base}{prefix}"),
            prefix => format!("{base}/{prefix}"),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.warehouse_url())
    }
}

/// Catalog and write policy handed to the lakehouse sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub catalog_name: String,
    pub location: StorageLocation,
    pub format_version: u8,
    pub upsert_enabled: bool,
    /// Merge key, tried in order against the table schema.
    pub identifier_columns: Vec<String>,
    /// Extra table properties written on table creation.
    pub properties: BTreeMap<String, String>,
}

impl CatalogConfig {
    pub fn new(location: StorageLocation) -> Self {
        CatalogConfig {
            catalog_name: DEFAULT_CATALOG_NAME.to_string(),
            location,
            format_version: DEFAULT_FORMAT_VERSION,
            upsert_enabled: true,
            identifier_columns: vec![DEFAULT_IDENTIFIER_COLUMN.to_string()],
            properties: BTreeMap::new(),
        }
    }

    pub fn with_identifier_columns(mut self, columns: Vec<String>) -> Self {
        self.identifier_columns = columns;
        self
    }

    pub fn with_upsert(mut self, enabled: bool) -> Self {
        self.upsert_enabled = enabled;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Properties stored in every table created through this catalog.
    pub fn table_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::from([
            (PROP_WRITE_FORMAT.to_string(), "parquet".to_string()),
            (PROP_UPSERT_ENABLED.to_string(), self.upsert_enabled.to_string()),
            (PROP_COMPRESSION.to_string(), "snappy".to_string()),
        ]);
        props.extend(self.properties.clone());
        props
    }
}
