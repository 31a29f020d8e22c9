//! CDAPMaster to spec bundle
//!
//! [`SpecBuilder::build`] resolves the placement strategy for the CDAPMaster's
//! pod count and expands each group into a workload spec:
//!
//! - pod-level fields (service account, runtime class, priority class, node
//!   selector) are reconciled across the group's services
//! - each service contributes one container with heap sizing applied
//! - each service labels the pod `cdap.container.<Service>=<app>` so Services
//!   can select it however services are grouped
//! - stateful groups get the storage init container and the summed storage
//!   of their stateful members, which must agree on a storage class
//!
//! The build is all-or-nothing: any error discards the partial bundle.

use std::collections::BTreeMap;

use cdap_common::catalog::{STORAGE_INIT_CONTAINER, STORAGE_INIT_MAIN};
use cdap_common::crd::{CDAPMaster, ResolvedImages, ServiceConfig};
use cdap_common::{
    container_label_key, object_name, quantity, ServiceName, ServiceShape, CONFIG_MAP_CCONF,
    CONFIG_MAP_HCONF, LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_MANAGED_BY_CDAP, LOCAL_DATA_DIR,
};
use tracing::{debug, info};

use crate::error::BuildError;
use crate::heap::HeapSizing;
use crate::reconcile::{reconcile, reconcile_text, FieldValue, ReconcileError, ServiceField};
use crate::spec::{
    ContainerSpec, DeploymentSpec, DeploymentSpecBundle, NetworkServiceSpec, StatefulSpec,
    WorkloadSpec,
};
use crate::strategy::{ServiceGroup, StrategyTable};

const UI_WORKING_DIR: &str = "/opt/cdap/ui";
const UI_COMMAND: &str = "bin/node";
const UI_ARGS: [&str; 2] = ["index.js", "start"];

/// Expands CDAPMasters into spec bundles
#[derive(Clone, Copy, Debug)]
pub struct SpecBuilder<'a> {
    strategies: &'a StrategyTable,
    heap: HeapSizing,
}

impl Default for SpecBuilder<'static> {
    fn default() -> Self {
        Self::new(StrategyTable::shared())
    }
}

impl<'a> SpecBuilder<'a> {
    /// Create a builder over `strategies` with default heap sizing
    pub fn new(strategies: &'a StrategyTable) -> Self {
        Self {
            strategies,
            heap: HeapSizing::default(),
        }
    }

    /// Override heap sizing
    pub fn with_heap_sizing(mut self, heap: HeapSizing) -> Self {
        self.heap = heap;
        self
    }

    /// Build the spec bundle for `master`.
    ///
    /// `labels` are added to every object. Returns an empty bundle while the
    /// CDAPMaster status has no resolved images.
    pub fn build(
        &self,
        master: &CDAPMaster,
        labels: &BTreeMap<String, String>,
    ) -> Result<DeploymentSpecBundle, BuildError> {
        let Some(images) = master.resolved_images() else {
            debug!(
                app = master.metadata.name.as_deref().unwrap_or_default(),
                "images not resolved yet, nothing to build"
            );
            return Ok(DeploymentSpecBundle::default());
        };

        let app = required(master.metadata.name.as_deref(), "name")?;
        let namespace = required(master.metadata.namespace.as_deref(), "namespace")?;
        let num_pods = master.spec.num_pods();
        let partition = self.strategies.resolve(num_pods)?;

        let ctx = BuildContext {
            master,
            app,
            namespace,
            images,
            labels: base_labels(labels, app),
            heap: self.heap,
        };

        let mut bundle = DeploymentSpecBundle::default();
        for group in partition.stateful() {
            bundle.stateful.push(ctx.stateful(group)?);
        }
        for group in partition.stateless() {
            bundle.deployments.push(DeploymentSpec {
                workload: ctx.workload(group)?,
            });
        }
        for (name, target) in partition.network_services() {
            bundle.network_services.push(ctx.network_service(name, *target)?);
        }

        info!(
            app,
            namespace,
            num_pods,
            stateful = bundle.stateful.len(),
            deployments = bundle.deployments.len(),
            services = bundle.network_services.len(),
            "built CDAPMaster spec bundle"
        );
        Ok(bundle)
    }
}

fn required<'m>(value: Option<&'m str>, field: &'static str) -> Result<&'m str, BuildError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(BuildError::MissingMetadata { field })
}

fn base_labels(extra: &BTreeMap<String, String>, app: &str) -> BTreeMap<String, String> {
    let mut labels = extra.clone();
    labels.insert(LABEL_INSTANCE.to_string(), app.to_string());
    labels.insert(
        LABEL_MANAGED_BY.to_string(),
        LABEL_MANAGED_BY_CDAP.to_string(),
    );
    labels
}

/// Per-build inputs shared by every group
struct BuildContext<'m> {
    master: &'m CDAPMaster,
    app: &'m str,
    namespace: &'m str,
    images: ResolvedImages,
    labels: BTreeMap<String, String>,
    heap: HeapSizing,
}

impl BuildContext<'_> {
    fn stateful(&self, group: &ServiceGroup) -> Result<StatefulSpec, BuildError> {
        let workload = self.workload(group)?;
        let init = ContainerSpec::new(STORAGE_INIT_CONTAINER, &self.images.image, LOCAL_DATA_DIR)
            .with_image_pull_policy(self.master.spec.image_pull_policy.clone())
            .with_args([STORAGE_INIT_MAIN]);
        let (storage_size, storage_class_name) = self.storage(group)?;

        debug!(
            app = self.app,
            group = %group.name,
            storage_size = storage_size.as_deref().unwrap_or("none"),
            "built stateful workload"
        );
        Ok(StatefulSpec {
            workload,
            init_containers: vec![init],
            storage_size,
            storage_class_name,
        })
    }

    fn workload(&self, group: &ServiceGroup) -> Result<WorkloadSpec, BuildError> {
        let spec = &self.master.spec;
        let services = group.services.as_slice();

        let service_account_name =
            reconcile_text(spec, services, ServiceField::ServiceAccountName)?
                .or_else(|| spec.service_account_name.clone())
                .filter(|sa| !sa.is_empty());
        let runtime_class_name = reconcile_text(spec, services, ServiceField::RuntimeClassName)?;
        let priority_class_name = reconcile_text(spec, services, ServiceField::PriorityClassName)?;
        let node_selector = reconcile(spec, services, ServiceField::NodeSelector)?
            .and_then(FieldValue::into_map)
            .unwrap_or_default();

        let mut workload = WorkloadSpec {
            name: object_name(self.app, &group.name),
            namespace: self.namespace.to_string(),
            labels: self.labels.clone(),
            selector: BTreeMap::new(),
            replicas: 1,
            service_account_name,
            runtime_class_name,
            priority_class_name,
            node_selector,
            cconf: object_name(self.app, CONFIG_MAP_CCONF),
            hconf: object_name(self.app, CONFIG_MAP_HCONF),
            data_dir: LOCAL_DATA_DIR.to_string(),
            containers: Vec::with_capacity(services.len()),
        };
        workload.add_selector_label(LABEL_INSTANCE, self.app);

        for &service in services {
            workload.containers.push(self.container(service)?);
            workload.add_selector_label(container_label_key(service), self.app);
        }

        debug!(
            app = self.app,
            group = %group.name,
            containers = workload.containers.len(),
            service_account = workload.service_account_name.as_deref().unwrap_or("default"),
            "built workload"
        );
        Ok(workload)
    }

    fn container(&self, service: ServiceName) -> Result<ContainerSpec, BuildError> {
        let common = self.master.spec.service(service).common();
        let env = self
            .heap
            .advise(common.env.clone(), common.resources.as_ref())
            .map_err(|source| BuildError::Quantity {
                service,
                field: "resources.memory",
                source,
            })?;

        let container =
            ContainerSpec::new(service.container_name(), &self.images.image, LOCAL_DATA_DIR)
                .with_image_pull_policy(self.master.spec.image_pull_policy.clone())
                .with_args([service.main_class()])
                .with_resources(common.resources.clone())
                .with_env(env);

        if service != ServiceName::UserInterface {
            return Ok(container);
        }
        Ok(container
            .with_image(&self.images.user_interface_image)
            .with_working_dir(UI_WORKING_DIR)
            .with_command([UI_COMMAND])
            .with_args(UI_ARGS)
            .add_env("NODE_ENV", "production"))
    }

    /// Summed storage size and the shared storage class of the group's
    /// stateful members
    fn storage(
        &self,
        group: &ServiceGroup,
    ) -> Result<(Option<String>, Option<String>), BuildError> {
        let stateful: Vec<ServiceName> = group
            .services
            .iter()
            .copied()
            .filter(|s| s.shape() == ServiceShape::Stateful)
            .collect();

        let mut total: u64 = 0;
        for &service in &stateful {
            let ServiceConfig::Stateful(config) = self.master.spec.service(service) else {
                continue;
            };
            let Some(size) = config.storage_size.as_deref().filter(|s| !s.is_empty()) else {
                continue;
            };
            let bytes = quantity::parse(size).map_err(|source| BuildError::Quantity {
                service,
                field: "storageSize",
                source,
            })?;
            total = total
                .checked_add(bytes)
                .ok_or_else(|| BuildError::StorageOverflow {
                    group: group.name.clone(),
                })?;
        }

        let class = match reconcile_text(&self.master.spec, &stateful, ServiceField::StorageClassName)
        {
            Ok(class) => class,
            Err(ReconcileError::Divergent { .. }) => {
                return Err(BuildError::StorageClassConflict {
                    group: group.name.clone(),
                    services: stateful,
                })
            }
            Err(err) => return Err(err.into()),
        };

        let size = (total > 0).then(|| quantity::format(total));
        if size.is_none() {
            if let Some(class) = &class {
                debug!(
                    app = self.app,
                    group = %group.name,
                    storage_class = %class,
                    "storage class set without a storage size, no volume claim"
                );
            }
        }
        Ok((size, class))
    }

    fn network_service(
        &self,
        name: &str,
        target: ServiceName,
    ) -> Result<NetworkServiceSpec, BuildError> {
        let target_port = target.exposed_port().ok_or_else(|| BuildError::NotExposable {
            name: name.to_string(),
            service: target,
        })?;
        let service_type = reconcile_text(&self.master.spec, &[target], ServiceField::ServiceType)?;
        let service_port = match self.master.spec.service(target) {
            ServiceConfig::External(config) => config.service_port,
            _ => None,
        };

        Ok(NetworkServiceSpec {
            name: object_name(self.app, name),
            namespace: self.namespace.to_string(),
            labels: self.labels.clone(),
            service_type,
            service_port,
            target_port,
            selector: BTreeMap::from([(container_label_key(target), self.app.to_string())]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::JAVA_MAX_HEAP_ENV_VAR;
    use crate::strategy::StrategyError;

    const MASTER: &str = r#"
apiVersion: cdap.cdap.io/v1alpha1
kind: CDAPMaster
metadata:
  name: demo
  namespace: cdap
spec:
  image: gcr.io/cdapio/cdap:6.1.0
  userInterfaceImage: gcr.io/cdapio/cdap-ui:6.1.0
  serviceAccountName: cdap
  imagePullPolicy: IfNotPresent
  logs:
    storageSize: 10Gi
    storageClassName: standard
  messaging:
    storageSize: 5Gi
    storageClassName: standard
  metrics:
    storageSize: 1Gi
  preview:
    storageSize: 512Mi
  appFabric:
    resources:
      requests:
        memory: "2000000000"
  router:
    serviceType: NodePort
    servicePort: 31000
status:
  imageToUse: gcr.io/cdapio/cdap:6.1.0
  userInterfaceImageToUse: gcr.io/cdapio/cdap-ui:6.1.0
"#;

    fn master() -> CDAPMaster {
        serde_yaml::from_str(MASTER).unwrap()
    }

    fn build(master: &CDAPMaster) -> Result<DeploymentSpecBundle, BuildError> {
        SpecBuilder::default().build(master, &BTreeMap::new())
    }

    fn with_pods(num_pods: i32) -> CDAPMaster {
        let mut m = master();
        m.spec.num_pods = Some(num_pods);
        m
    }

    #[test]
    fn test_unresolved_images_is_a_no_op() {
        let mut m = master();
        m.status = None;
        assert!(build(&m).unwrap().is_empty());

        let mut m = master();
        if let Some(status) = m.status.as_mut() {
            status.user_interface_image_to_use = Some(String::new());
        }
        assert!(build(&m).unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_images_skips_metadata_checks() {
        let mut m = master();
        m.status = None;
        m.metadata.namespace = None;
        assert!(build(&m).unwrap().is_empty());
    }

    #[test]
    fn test_missing_metadata() {
        let mut m = master();
        m.metadata.namespace = None;
        assert_eq!(
            build(&m).unwrap_err(),
            BuildError::MissingMetadata { field: "namespace" }
        );
    }

    #[test]
    fn test_unsupported_pod_count() {
        let err = build(&with_pods(99)).unwrap_err();
        assert_eq!(
            err,
            BuildError::Strategy(StrategyError::NotSupported { num_pods: 99 })
        );
    }

    #[test]
    fn test_default_strategy_one_workload_per_service() {
        let bundle = build(&master()).unwrap();
        let stateful: Vec<&str> = bundle
            .stateful
            .iter()
            .map(|s| s.workload.name.as_str())
            .collect();
        assert_eq!(
            stateful,
            vec!["demo-logs", "demo-messaging", "demo-metrics", "demo-preview"]
        );
        let deployments: Vec<&str> = bundle
            .deployments
            .iter()
            .map(|d| d.workload.name.as_str())
            .collect();
        assert_eq!(
            deployments,
            vec!["demo-appfabric", "demo-metadata", "demo-router", "demo-userinterface"]
        );
        let services: Vec<&str> = bundle
            .network_services
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(services, vec!["demo-router", "demo-userinterface"]);
    }

    #[test]
    fn test_storage_aggregated_across_group() {
        let mut m = with_pods(3);
        m.spec.metrics.storage_size = None;
        m.spec.preview.storage_size = None;
        let bundle = build(&m).unwrap();
        let backend = &bundle.stateful[0];
        assert_eq!(backend.workload.name, "demo-backend");
        assert_eq!(backend.storage_size.as_deref(), Some("15Gi"));
        assert_eq!(backend.storage_class_name.as_deref(), Some("standard"));
    }

    #[test]
    fn test_storage_class_conflict_fails_whole_build() {
        let mut m = with_pods(1);
        m.spec.metrics.storage_class_name = Some("ssd".to_string());
        match build(&m).unwrap_err() {
            BuildError::StorageClassConflict { group, services } => {
                assert_eq!(group, "standalone");
                assert_eq!(
                    services,
                    vec![
                        ServiceName::Logs,
                        ServiceName::Messaging,
                        ServiceName::Metrics,
                        ServiceName::Preview
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_storage_size() {
        let mut m = master();
        m.spec.preview.storage_size = Some("big".to_string());
        let err = build(&m).unwrap_err();
        assert_eq!(err.field_path().as_deref(), Some("spec.preview.storageSize"));
    }

    #[test]
    fn test_no_storage_declared() {
        let mut m = master();
        m.spec.logs.storage_size = None;
        m.spec.logs.storage_class_name = None;
        let bundle = build(&m).unwrap();
        let logs = &bundle.stateful[0];
        assert!(logs.storage_size.is_none());
        assert!(logs.storage_class_name.is_none());
    }

    #[test]
    fn test_storage_class_without_size_has_no_claim_size() {
        let mut m = master();
        m.spec.logs.storage_size = None;
        let bundle = build(&m).unwrap();
        let logs = &bundle.stateful[0];
        assert!(logs.storage_size.is_none());
        assert_eq!(logs.storage_class_name.as_deref(), Some("standard"));
    }

    #[test]
    fn test_fractional_memory_request_still_builds() {
        let mut m = master();
        m.spec.app_fabric.resources = serde_yaml::from_str(
            "requests:\n  memory: 1.3Gi\nlimits:\n  memory: 100m\n",
        )
        .unwrap();
        let bundle = build(&m).unwrap();
        let appfabric = &bundle.deployments[0].workload.containers[0];
        let heap = appfabric
            .env
            .iter()
            .find(|e| e.name == JAVA_MAX_HEAP_ENV_VAR)
            .unwrap();
        assert_eq!(heap.value.as_deref(), Some("-Xmx837518623"));
    }

    #[test]
    fn test_stateful_groups_get_storage_init_first() {
        let bundle = build(&with_pods(2)).unwrap();
        let backend = &bundle.stateful[0];
        assert_eq!(backend.init_containers.len(), 1);
        let init = &backend.init_containers[0];
        assert_eq!(init.name, "storageinit");
        assert_eq!(init.args, vec![STORAGE_INIT_MAIN.to_string()]);
        assert_eq!(init.image, "gcr.io/cdapio/cdap:6.1.0");
    }

    #[test]
    fn test_containers_follow_group_order() {
        let bundle = build(&with_pods(2)).unwrap();
        let names: Vec<&str> = bundle.stateful[0]
            .workload
            .containers
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["logs", "messaging", "metrics", "preview", "appfabric", "metadata", "router"]
        );
        let logs = &bundle.stateful[0].workload.containers[0];
        assert_eq!(
            logs.args,
            vec!["io.cdap.cdap.master.environment.k8s.LogsServiceMain".to_string()]
        );
        assert_eq!(logs.image_pull_policy.as_deref(), Some("IfNotPresent"));
        assert_eq!(logs.data_dir, "/data");
    }

    #[test]
    fn test_user_interface_overrides_apply_in_any_group() {
        for num_pods in [0, 1] {
            let bundle = build(&with_pods(num_pods)).unwrap();
            let ui = bundle
                .stateful
                .iter()
                .map(|s| &s.workload)
                .chain(bundle.deployments.iter().map(|d| &d.workload))
                .flat_map(|w| w.containers.iter())
                .find(|c| c.name == "userinterface")
                .unwrap();
            assert_eq!(ui.image, "gcr.io/cdapio/cdap-ui:6.1.0");
            assert_eq!(ui.working_dir.as_deref(), Some("/opt/cdap/ui"));
            assert_eq!(ui.command, vec!["bin/node".to_string()]);
            assert_eq!(ui.args, vec!["index.js".to_string(), "start".to_string()]);
            assert_eq!(ui.env.last().map(|e| e.name.as_str()), Some("NODE_ENV"));
        }
    }

    #[test]
    fn test_heap_advised_from_memory() {
        let bundle = build(&master()).unwrap();
        let appfabric = &bundle.deployments[0].workload.containers[0];
        let heap = appfabric
            .env
            .iter()
            .find(|e| e.name == JAVA_MAX_HEAP_ENV_VAR)
            .unwrap();
        // 2e9 * 0.6 beats 2e9 - 768Mi
        assert_eq!(heap.value.as_deref(), Some("-Xmx1200000000"));

        let sized = SpecBuilder::default()
            .with_heap_sizing(HeapSizing {
                reserved_non_heap: 500_000_000,
                min_heap_ratio: 0.6,
            })
            .build(&master(), &BTreeMap::new())
            .unwrap();
        let heap = &sized.deployments[0].workload.containers[0].env[0];
        assert_eq!(heap.value.as_deref(), Some("-Xmx1500000000"));
    }

    #[test]
    fn test_labels_and_selectors() {
        let extra = BTreeMap::from([("team".to_string(), "data".to_string())]);
        let bundle = SpecBuilder::default().build(&with_pods(3), &extra).unwrap();

        let router = &bundle.deployments[0].workload;
        assert_eq!(router.name, "demo-router");
        assert_eq!(router.labels.get("team").map(String::as_str), Some("data"));
        assert_eq!(
            router.labels.get("cdap.container.Router").map(String::as_str),
            Some("demo")
        );
        assert!(!router.selector.contains_key("team"));

        let service = &bundle.network_services[0];
        assert_eq!(service.name, "demo-router");
        assert_eq!(
            service.selector,
            BTreeMap::from([("cdap.container.Router".to_string(), "demo".to_string())])
        );
        assert_eq!(service.service_type.as_deref(), Some("NodePort"));
        assert_eq!(service.service_port, Some(31000));
        assert_eq!(service.target_port, 11015);

        let ui = &bundle.network_services[1];
        assert!(ui.service_type.is_none());
        assert_eq!(ui.target_port, 11011);
    }

    #[test]
    fn test_service_account_default_and_override() {
        let mut m = master();
        m.spec.logs.service.service_account_name = Some("logs-sa".to_string());
        let bundle = build(&m).unwrap();
        assert_eq!(
            bundle.stateful[0].workload.service_account_name.as_deref(),
            Some("logs-sa")
        );
        assert_eq!(
            bundle.stateful[1].workload.service_account_name.as_deref(),
            Some("cdap")
        );
        assert_eq!(bundle.stateful[0].workload.cconf, "demo-cconf");
        assert_eq!(bundle.stateful[0].workload.hconf, "demo-hconf");
    }

    #[test]
    fn test_divergent_field_aborts_build() {
        let mut m = with_pods(1);
        m.spec.router.service.priority_class_name = Some("high".to_string());
        m.spec.metadata.priority_class_name = Some("low".to_string());
        let err = build(&m).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Reconcile(ReconcileError::Divergent {
                field: ServiceField::PriorityClassName,
                ..
            })
        ));
    }

    #[test]
    fn test_identical_input_identical_output() {
        let m = with_pods(0);
        assert_eq!(build(&m).unwrap(), build(&m).unwrap());
    }
}
