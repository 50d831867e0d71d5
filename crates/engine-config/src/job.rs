use crate::{env::EnvManager, error::ConfigError};
use model::core::identifiers::{TableIdent, TableName};
use tracing::debug;

pub const PARAM_JOB_NAME: &str = "JOB_NAME";
pub const PARAM_DATABASE_NAME: &str = "database_name";
pub const PARAM_CONNECTION_NAME: &str = "connection_name";
pub const PARAM_OUTPUT_BUCKET: &str = "output_bucket";
pub const PARAM_OUTPUT_PREFIX: &str = "output_prefix";
pub const PARAM_TABLES: &str = "tables";

/// Prefix of the environment variables that back the run parameters.
pub const ENV_PREFIX: &str = "SNOWSYNC_";

/// Run parameters as received, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawJobArgs {
    pub job_name: Option<String>,
    pub database_name: Option<String>,
    pub connection_name: Option<String>,
    pub output_bucket: Option<String>,
    pub output_prefix: Option<String>,
    /// JSON-encoded array of table names.
    pub tables: Option<String>,
}

impl RawJobArgs {
    /// Fills every parameter that was not given explicitly from
    /// `SNOWSYNC_<PARAM>` in `env`.
    pub fn with_env_fallback(mut self, env: &EnvManager) -> Self {
        let fill = |slot: &mut Option<String>, param: &str| {
            if slot.as_deref().is_none_or(|v| v.trim().is_empty()) {
                let key = format!("{ENV_PREFIX}{}", param.to_ascii_uppercase());
                if let Some(value) = env.get_non_empty(&key) {
                    debug!("Using {} from environment", key);
                    *slot = Some(value);
                }
            }
        };

        fill(&mut self.job_name, PARAM_JOB_NAME);
        fill(&mut self.database_name, PARAM_DATABASE_NAME);
        fill(&mut self.connection_name, PARAM_CONNECTION_NAME);
        fill(&mut self.output_bucket, PARAM_OUTPUT_BUCKET);
        fill(&mut self.output_prefix, PARAM_OUTPUT_PREFIX);
        fill(&mut self.tables, PARAM_TABLES);
        self
    }
}

/// Validated, immutable run parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobArgs {
    pub job_name: String,
    pub database_name: String,
    pub connection_name: String,
    pub output_bucket: String,
    pub output_prefix: String,
    pub tables: Vec<TableName>,
}

impl JobArgs {
    pub fn resolve(raw: RawJobArgs) -> Result<Self, ConfigError> {
        let job_name = required(raw.job_name, PARAM_JOB_NAME)?;
        let database_name = required(raw.database_name, PARAM_DATABASE_NAME)?;
        let connection_name = required(raw.connection_name, PARAM_CONNECTION_NAME)?;
        let output_bucket = required(raw.output_bucket, PARAM_OUTPUT_BUCKET)?;
        let output_prefix = required(raw.output_prefix, PARAM_OUTPUT_PREFIX)?;
        let tables = required(raw.tables, PARAM_TABLES)?;

        let tables = parse_tables(&tables)?;

        if !database_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidParameter {
                name: PARAM_DATABASE_NAME,
                reason: format!("{database_name:?} may only contain letters, digits and '_'"),
            });
        }

        Ok(JobArgs {
            job_name,
            database_name,
            connection_name,
            output_bucket,
            output_prefix,
            tables,
        })
    }

    /// Destination identifier of every table, in list order.
    pub fn destinations(&self) -> Vec<TableIdent> {
        self.tables
            .iter()
            .map(|t| t.destination(&self.database_name))
            .collect()
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingParameter(name)),
    }
}

fn parse_tables(raw: &str) -> Result<Vec<TableName>, ConfigError> {
    let names: Vec<String> = serde_json::from_str(raw)
        .map_err(|e| ConfigError::InvalidTables(format!("expected a JSON array of strings: {e}")))?;

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                Err(ConfigError::InvalidParameter {
                    name: PARAM_TABLES,
                    reason: format!("entry {i} is blank"),
                })
            } else {
                Ok(TableName::from(trimmed))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> RawJobArgs {
        RawJobArgs {
            job_name: Some("servicenow_nightly".into()),
            database_name: Some("servicenow_raw".into()),
            connection_name: Some("snow_prod".into()),
            output_bucket: Some("analytics-lake".into()),
            output_prefix: Some("servicenow/".into()),
            tables: Some(r#"["incident", "Problem"]"#.into()),
        }
    }

    #[test]
    fn test_resolve_full_args() {
        let args = JobArgs::resolve(full()).unwrap();
        assert_eq!(args.job_name, "servicenow_nightly");
        assert_eq!(
            args.tables,
            vec![TableName::from("incident"), TableName::from("Problem")]
        );
        assert_eq!(
            args.destinations(),
            vec![
                TableIdent::new("servicenow_raw", "incident"),
                TableIdent::new("servicenow_raw", "problem"),
            ]
        );
    }

    #[test]
    fn test_each_missing_param_is_reported() {
        let cases: [(fn(&mut RawJobArgs), &str); 6] = [
            (|r| r.job_name = None, PARAM_JOB_NAME),
            (|r| r.database_name = None, PARAM_DATABASE_NAME),
            (|r| r.connection_name = None, PARAM_CONNECTION_NAME),
            (|r| r.output_bucket = Some("  ".into()), PARAM_OUTPUT_BUCKET),
            (|r| r.output_prefix = None, PARAM_OUTPUT_PREFIX),
            (|r| r.tables = None, PARAM_TABLES),
        ];

        for (clear, expected) in cases {
            let mut raw = full();
            clear(&mut raw);
            match JobArgs::resolve(raw) {
                Err(ConfigError::MissingParameter(name)) => assert_eq!(name, expected),
                other => panic!("expected missing {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_tables_must_be_json_string_array() {
        for bad in ["incident,problem", r#"{"t": 1}"#, "[1, 2]", "["] {
            let raw = RawJobArgs {
                tables: Some(bad.into()),
                ..full()
            };
            assert!(
                matches!(JobArgs::resolve(raw), Err(ConfigError::InvalidTables(_))),
                "{bad} should be rejected"
            );
        }

        let raw = RawJobArgs {
            tables: Some(r#"["incident", " "]"#.into()),
            ..full()
        };
        assert!(matches!(
            JobArgs::resolve(raw),
            Err(ConfigError::InvalidParameter { name: PARAM_TABLES, .. })
        ));
    }

    #[test]
    fn test_empty_table_list_is_valid() {
        let raw = RawJobArgs {
            tables: Some("[]".into()),
            ..full()
        };
        assert!(JobArgs::resolve(raw).unwrap().tables.is_empty());
    }

    #[test]
    fn test_namespace_characters_are_checked() {
        let raw = RawJobArgs {
            database_name: Some("raw-data".into()),
            ..full()
        };
        assert!(matches!(
            JobArgs::resolve(raw),
            Err(ConfigError::InvalidParameter {
                name: PARAM_DATABASE_NAME,
                ..
            })
        ));
    }

    #[test]
    fn test_env_fallback_only_fills_gaps() {
        let mut env = EnvManager::empty();
        env.set("SNOWSYNC_JOB_NAME", "from_env");
        env.set("SNOWSYNC_DATABASE_NAME", "env_db");
        env.set("SNOWSYNC_TABLES", r#"["sys_user"]"#);

        let raw = RawJobArgs {
            job_name: None,
            ..full()
        }
        .with_env_fallback(&env);

        assert_eq!(raw.job_name.as_deref(), Some("from_env"));
        assert_eq!(raw.database_name.as_deref(), Some("servicenow_raw"));
        assert_eq!(raw.tables.as_deref(), Some(r#"["incident", "Problem"]"#));
    }
}
