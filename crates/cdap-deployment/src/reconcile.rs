//! Cross-service field reconciliation
//!
//! Services co-located in one pod share pod-level settings (service account,
//! runtime class, priority class, node selector). Each service declares them
//! independently, so the builder asks every service in a group for the field
//! and requires that the ones with an opinion agree.
//!
//! Fields are addressed by [`ServiceField`]. Each field resolves to an
//! accessor over [`ServiceConfig`]; shapes lacking the field (storage class on
//! Router, service type on Logs) fail the lookup instead of silently reading
//! nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use cdap_common::crd::{CDAPMasterSpec, ServiceConfig};
use cdap_common::ServiceName;
use thiserror::Error;

/// Errors reconciling a field across a group
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Two services in the group declare different values
    #[error("value of field {field} not the same across ({})", join(.services))]
    Divergent {
        /// The reconciled field
        field: ServiceField,
        /// Every service in the group
        services: Vec<ServiceName>,
    },

    /// The field does not exist on the service's configuration shape
    #[error("field {field} not valid{}", .service.map(|s| format!(" for service {}", s)).unwrap_or_default())]
    FieldLookup {
        /// Requested field identifier
        field: String,
        /// Service whose configuration lacks it, if the field name itself is known
        service: Option<ServiceName>,
    },
}

fn join(services: &[ServiceName]) -> String {
    services
        .iter()
        .map(ServiceName::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// A per-service configuration field that can be reconciled across a group
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceField {
    /// `serviceAccountName`, any shape
    ServiceAccountName,
    /// `runtimeClassName`, any shape
    RuntimeClassName,
    /// `priorityClassName`, any shape
    PriorityClassName,
    /// `nodeSelector`, any shape
    NodeSelector,
    /// `storageClassName`, stateful shape only
    StorageClassName,
    /// `serviceType`, external shape only
    ServiceType,
}

/// A reconciled value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    /// Scalar string field
    Text(String),
    /// Map field
    Map(BTreeMap<String, String>),
}

impl FieldValue {
    /// Zero-length values express no opinion
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Map(m) => m.is_empty(),
        }
    }

    /// The string, if this is a scalar value
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Map(_) => None,
        }
    }

    /// The map, if this is a map value
    pub fn into_map(self) -> Option<BTreeMap<String, String>> {
        match self {
            Self::Map(m) => Some(m),
            Self::Text(_) => None,
        }
    }
}

/// Reads a field from one service sub-object.
///
/// Outer `None`: the shape has no such field. Inner `None`: the field is unset.
type Accessor = fn(&ServiceConfig<'_>) -> Option<Option<FieldValue>>;

fn text(value: &Option<String>) -> Option<FieldValue> {
    value.clone().map(FieldValue::Text)
}

fn service_account_name(config: &ServiceConfig<'_>) -> Option<Option<FieldValue>> {
    Some(text(&config.common().service_account_name))
}

fn runtime_class_name(config: &ServiceConfig<'_>) -> Option<Option<FieldValue>> {
    Some(text(&config.common().runtime_class_name))
}

fn priority_class_name(config: &ServiceConfig<'_>) -> Option<Option<FieldValue>> {
    Some(text(&config.common().priority_class_name))
}

fn node_selector(config: &ServiceConfig<'_>) -> Option<Option<FieldValue>> {
    Some(Some(FieldValue::Map(config.common().node_selector.clone())))
}

fn storage_class_name(config: &ServiceConfig<'_>) -> Option<Option<FieldValue>> {
    match config {
        ServiceConfig::Stateful(spec) => Some(text(&spec.storage_class_name)),
        _ => None,
    }
}

fn service_type(config: &ServiceConfig<'_>) -> Option<Option<FieldValue>> {
    match config {
        ServiceConfig::External(spec) => Some(text(&spec.service_type)),
        _ => None,
    }
}

impl ServiceField {
    /// Every reconcilable field
    pub const ALL: [ServiceField; 6] = [
        ServiceField::ServiceAccountName,
        ServiceField::RuntimeClassName,
        ServiceField::PriorityClassName,
        ServiceField::NodeSelector,
        ServiceField::StorageClassName,
        ServiceField::ServiceType,
    ];

    /// Field identifier as it appears in configuration and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceAccountName => "ServiceAccountName",
            Self::RuntimeClassName => "RuntimeClassName",
            Self::PriorityClassName => "PriorityClassName",
            Self::NodeSelector => "NodeSelector",
            Self::StorageClassName => "StorageClassName",
            Self::ServiceType => "ServiceType",
        }
    }

    fn accessor(&self) -> Accessor {
        match self {
            Self::ServiceAccountName => service_account_name,
            Self::RuntimeClassName => runtime_class_name,
            Self::PriorityClassName => priority_class_name,
            Self::NodeSelector => node_selector,
            Self::StorageClassName => storage_class_name,
            Self::ServiceType => service_type,
        }
    }
}

impl fmt::Display for ServiceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceField {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| ReconcileError::FieldLookup {
                field: s.to_string(),
                service: None,
            })
    }
}

/// Return the value every opinionated service in `services` agrees on.
///
/// Unset and zero-length values are skipped. Returns `Ok(None)` when no
/// service has an opinion, so the caller's default applies.
pub fn reconcile(
    spec: &CDAPMasterSpec,
    services: &[ServiceName],
    field: ServiceField,
) -> Result<Option<FieldValue>, ReconcileError> {
    let accessor = field.accessor();
    let mut agreed: Option<FieldValue> = None;

    for &service in services {
        let value = accessor(&spec.service(service)).ok_or_else(|| ReconcileError::FieldLookup {
            field: field.as_str().to_string(),
            service: Some(service),
        })?;
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            continue;
        };
        match &agreed {
            None => agreed = Some(value),
            Some(existing) if *existing == value => {}
            Some(_) => {
                return Err(ReconcileError::Divergent {
                    field,
                    services: services.to_vec(),
                })
            }
        }
    }

    Ok(agreed)
}

/// [`reconcile`] with the field given by its identifier string
pub fn reconcile_named(
    spec: &CDAPMasterSpec,
    services: &[ServiceName],
    field_name: &str,
) -> Result<Option<FieldValue>, ReconcileError> {
    reconcile(spec, services, field_name.parse()?)
}

/// [`reconcile`] for scalar fields.
///
/// A map-valued field such as [`ServiceField::NodeSelector`] is a lookup
/// error rather than a silent `None`.
pub fn reconcile_text(
    spec: &CDAPMasterSpec,
    services: &[ServiceName],
    field: ServiceField,
) -> Result<Option<String>, ReconcileError> {
    match reconcile(spec, services, field)? {
        None => Ok(None),
        Some(FieldValue::Text(text)) => Ok(Some(text)),
        Some(FieldValue::Map(_)) => Err(ReconcileError::FieldLookup {
            field: field.as_str().to_string(),
            service: None,
        }),
    }
}
