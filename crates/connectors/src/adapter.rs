use crate::{
    error::AdapterError,
    lakehouse::{catalog::WarehouseCatalog, config::CatalogConfig},
    servicenow::{adapter::ServiceNowAdapter, params::ConnectionProfile},
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub enum Adapter {
    ServiceNow(ServiceNowAdapter),
    Lakehouse(Arc<WarehouseCatalog>),
}

impl Adapter {
    pub fn servicenow(profile: ConnectionProfile) -> Result<Self, AdapterError> {
        let adapter = ServiceNowAdapter::connect(profile)?;
        Ok(Adapter::ServiceNow(adapter))
    }

    pub fn lakehouse(config: CatalogConfig) -> Result<Self, AdapterError> {
        let catalog = WarehouseCatalog::connect(config)?;
        Ok(Adapter::Lakehouse(Arc::new(catalog)))
    }

    pub fn get_servicenow(&self) -> Result<&ServiceNowAdapter, AdapterError> {
        match self {
            Adapter::ServiceNow(adapter) => Ok(adapter),
            other => Err(AdapterError::UnexpectedKind {
                expected: "servicenow",
                found: other.kind(),
            }),
        }
    }

    pub fn get_lakehouse(&self) -> Result<Arc<WarehouseCatalog>, AdapterError> {
        match self {
            Adapter::Lakehouse(catalog) => Ok(catalog.clone()),
            other => Err(AdapterError::UnexpectedKind {
                expected: "lakehouse",
                found: other.kind(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Adapter::ServiceNow(_) => "servicenow",
            Adapter::Lakehouse(_) => "lakehouse",
        }
    }
}
