//! Render error types

use thiserror::Error;

/// Errors turning a spec into a platform object
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template failed to render
    #[error("template {template} failed for {object}: {source}")]
    Template {
        /// Template name
        template: &'static str,
        /// Name of the object being rendered
        object: String,
        /// Underlying template error
        source: minijinja::Error,
    },

    /// The rendered manifest is not a valid object of its kind
    #[error("rendered {kind} {object} is invalid: {source}")]
    Parse {
        /// Kubernetes kind
        kind: &'static str,
        /// Name of the object being rendered
        object: String,
        /// Underlying YAML error
        source: serde_yaml::Error,
    },
}

impl RenderError {
    /// Kubernetes kind of the object that failed
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Template { template, .. } => template_kind(template),
            Self::Parse { kind, .. } => kind,
        }
    }

    /// Name of the object that failed
    pub fn object(&self) -> &str {
        match self {
            Self::Template { object, .. } | Self::Parse { object, .. } => object,
        }
    }
}

fn template_kind(template: &str) -> &'static str {
    match template {
        super::STATEFULSET_TEMPLATE => "StatefulSet",
        super::DEPLOYMENT_TEMPLATE => "Deployment",
        super::SERVICE_TEMPLATE => "Service",
        _ => "Unknown",
    }
}

impl From<RenderError> for cdap_common::Error {
    fn from(err: RenderError) -> Self {
        Self::render(err.kind(), err.object(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_kind_and_object() {
        let source = serde_yaml::from_str::<u32>("nope").unwrap_err();
        let err = RenderError::Parse {
            kind: "Service",
            object: "demo-router".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("rendered Service demo-router is invalid"));

        let err: cdap_common::Error = err.into();
        match err {
            cdap_common::Error::Render { kind, object, .. } => {
                assert_eq!(kind, "Service");
                assert_eq!(object, "demo-router");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_template_error_maps_to_kind() {
        let err = RenderError::Template {
            template: super::super::STATEFULSET_TEMPLATE,
            object: "demo-logs".to_string(),
            source: minijinja::Error::new(minijinja::ErrorKind::UndefinedError, "spec.name"),
        };
        assert_eq!(err.kind(), "StatefulSet");
        assert_eq!(err.object(), "demo-logs");
    }
}
