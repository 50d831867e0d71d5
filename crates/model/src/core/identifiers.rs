use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Arc<str>);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Fresh identifier for a single invocation of the job.
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self::new(format!("run-{}", &id[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source table name exactly as it was supplied in the table list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(Arc<str>);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Destination identifier for this table inside `namespace`.
    /// The table part is always lower-cased, the namespace is kept as is.
    pub fn destination(&self, namespace: &str) -> TableIdent {
        TableIdent::new(namespace, self.0.to_lowercase())
    }
}

impl From<String> for TableName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for TableName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully-qualified destination table, `{namespace}.{name}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableIdent {
    namespace: Arc<str>,
    name: Arc<str>,
}

impl TableIdent {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Arc::from(namespace.into()),
            name: Arc::from(name.into()),
        }
    }

    /// Parses `namespace.name`. The first dot separates the two parts.
    pub fn parse(ident: &str) -> Option<Self> {
        let (namespace, name) = ident.split_once('.')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl TryFrom<String> for TableIdent {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TableIdent::parse(&value).ok_or_else(|| format!("Invalid table identifier: {value}"))
    }
}

impl From<TableIdent> for String {
    fn from(ident: TableIdent) -> Self {
        ident.to_string()
    }
}
