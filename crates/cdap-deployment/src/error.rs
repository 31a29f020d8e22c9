//! Build errors
//!
//! Every variant is a configuration problem: rebuilding the same CDAPMaster
//! fails the same way, so none are retried here.

use cdap_common::quantity::ParseError;
use cdap_common::ServiceName;
use thiserror::Error;

use crate::reconcile::ReconcileError;
use crate::strategy::StrategyError;

/// Errors building the spec bundle for a CDAPMaster
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// The pod count has no placement strategy
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Services in one group disagree on a pod-level field
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// A size or memory quantity could not be parsed
    #[error("service {service}: {field}: {source}")]
    Quantity {
        /// Service declaring the quantity
        service: ServiceName,
        /// Field path relative to the service, e.g. `storageSize`
        field: &'static str,
        /// Parse failure
        source: ParseError,
    },

    /// Stateful services in one group request different storage classes
    #[error("StorageClassName inconsistent across services in group {group} ({})", join(.services))]
    StorageClassConflict {
        /// Group name
        group: String,
        /// Stateful services in the group
        services: Vec<ServiceName>,
    },

    /// The group's summed storage does not fit in 64 bits
    #[error("total storage size of group {group} overflows")]
    StorageOverflow {
        /// Group name
        group: String,
    },

    /// A network service targets a service without a container port
    #[error("network service {name} targets {service} which exposes no port")]
    NotExposable {
        /// Network service name
        name: String,
        /// Target service
        service: ServiceName,
    },

    /// The CDAPMaster lacks a name or namespace
    #[error("CDAPMaster metadata.{field} is required")]
    MissingMetadata {
        /// `name` or `namespace`
        field: &'static str,
    },
}

fn join(services: &[ServiceName]) -> String {
    services
        .iter()
        .map(ServiceName::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Key of a service's sub-object in the CDAPMaster spec (`appFabric`, `logs`)
fn spec_key(service: ServiceName) -> String {
    let name = service.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

impl BuildError {
    /// Path of the offending CDAPMaster field, when one field is to blame
    pub fn field_path(&self) -> Option<String> {
        match self {
            Self::Quantity { service, field, .. } => {
                Some(format!("spec.{}.{}", spec_key(*service), field))
            }
            Self::Strategy(_) => Some("spec.numPods".to_string()),
            Self::MissingMetadata { field } => Some(format!("metadata.{}", field)),
            _ => None,
        }
    }

    /// Convert into the workspace error, attributed to CDAPMaster `app`
    pub fn into_error(self, app: impl Into<String>) -> cdap_common::Error {
        let app = app.into();
        match self.field_path() {
            Some(field) => cdap_common::Error::validation_for_field(app, field, self.to_string()),
            None => cdap_common::Error::validation_for(app, self.to_string()),
        }
    }
}

impl From<BuildError> for cdap_common::Error {
    fn from(err: BuildError) -> Self {
        match err.field_path() {
            Some(field) => Self::Validation {
                app: cdap_common::error::UNKNOWN_CONTEXT.to_string(),
                message: err.to_string(),
                field: Some(field),
            },
            None => Self::validation(err.to_string()),
        }
    }
}
