//! End-to-end tests: CDAPMaster YAML through the builder and renderer

use std::collections::BTreeMap;

use cdap_operator::crd::CDAPMaster;
use cdap_operator::{generate_manifests, Error, ManifestRenderer, RenderedObject, SpecBuilder};
use k8s_openapi::api::core::v1::Container;

const FIXTURE: &str = include_str!("fixtures/cdapmaster.yaml");

fn master(num_pods: Option<i32>) -> CDAPMaster {
    let mut master: CDAPMaster = serde_yaml::from_str(FIXTURE).expect("fixture parses");
    master.spec.num_pods = num_pods;
    master
}

fn generate(master: &CDAPMaster) -> Result<Vec<RenderedObject>, Error> {
    let labels = BTreeMap::from([("team".to_string(), "data".to_string())]);
    generate_manifests(
        &SpecBuilder::default(),
        &ManifestRenderer::new(),
        master,
        &labels,
    )
}

fn names(objects: &[RenderedObject], kind: &str) -> Vec<String> {
    objects
        .iter()
        .filter(|o| o.kind() == kind)
        .filter_map(|o| o.name().map(str::to_string))
        .collect()
}

fn containers(object: &RenderedObject) -> Vec<Container> {
    let pod = match object {
        RenderedObject::StatefulSet(o) => o.spec.as_ref().and_then(|s| s.template.spec.clone()),
        RenderedObject::Deployment(o) => o.spec.as_ref().and_then(|s| s.template.spec.clone()),
        RenderedObject::Service(_) => None,
    };
    pod.map(|p| p.containers).unwrap_or_default()
}

#[test]
fn test_default_strategy_renders_every_object() {
    let objects = generate(&master(None)).unwrap();
    assert_eq!(objects.len(), 10);
    assert_eq!(
        names(&objects, "StatefulSet"),
        vec!["demo-logs", "demo-messaging", "demo-metrics", "demo-preview"]
    );
    assert_eq!(
        names(&objects, "Deployment"),
        vec!["demo-appfabric", "demo-metadata", "demo-router", "demo-userinterface"]
    );
    assert_eq!(
        names(&objects, "Service"),
        vec!["demo-router", "demo-userinterface"]
    );
}

#[test]
fn test_every_supported_pod_count_places_all_containers() {
    for num_pods in [0, 1, 2, 3] {
        let objects = generate(&master(Some(num_pods))).unwrap();
        let mut placed: Vec<String> = objects
            .iter()
            .flat_map(containers)
            .map(|c| c.name)
            .collect();
        placed.sort();
        assert_eq!(
            placed,
            vec![
                "appfabric",
                "logs",
                "messaging",
                "metadata",
                "metrics",
                "preview",
                "router",
                "userinterface"
            ],
            "numPods {num_pods}"
        );
    }
}

#[test]
fn test_single_pod_aggregates_storage() {
    let objects = generate(&master(Some(1))).unwrap();
    let RenderedObject::StatefulSet(sts) = &objects[0] else {
        panic!("expected a StatefulSet first");
    };
    assert_eq!(sts.metadata.name.as_deref(), Some("demo-standalone"));
    let spec = sts.spec.as_ref().unwrap();
    let claim = spec.volume_claim_templates.as_ref().unwrap()[0]
        .spec
        .as_ref()
        .unwrap();
    assert_eq!(claim.storage_class_name.as_deref(), Some("standard"));
    let storage = claim
        .resources
        .as_ref()
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .unwrap();
    // 10Gi + 5Gi + 1Gi + 512Mi
    assert_eq!(storage.0, "16896Mi");

    let pod = spec.template.spec.as_ref().unwrap();
    assert_eq!(pod.service_account_name.as_deref(), Some("cdap"));
    assert_eq!(pod.priority_class_name.as_deref(), Some("cdap-high"));
    assert_eq!(
        pod.node_selector
            .as_ref()
            .and_then(|n| n.get("pool"))
            .map(String::as_str),
        Some("storage")
    );
    let init = pod.init_containers.as_ref().unwrap();
    assert_eq!(init[0].name, "storageinit");
}

#[test]
fn test_services_select_owning_pod_across_strategies() {
    for num_pods in [0, 1, 2, 3] {
        let objects = generate(&master(Some(num_pods))).unwrap();
        for object in &objects {
            let RenderedObject::Service(service) = object else {
                continue;
            };
            let selector = service
                .spec
                .as_ref()
                .and_then(|s| s.selector.clone())
                .unwrap();
            let (key, value) = selector.iter().next().unwrap();
            assert_eq!(value, "demo");

            // exactly one workload carries the selected label
            let owners = objects
                .iter()
                .filter(|o| {
                    let labels = match o {
                        RenderedObject::StatefulSet(s) => s
                            .spec
                            .as_ref()
                            .and_then(|s| s.template.metadata.as_ref())
                            .and_then(|m| m.labels.clone()),
                        RenderedObject::Deployment(d) => d
                            .spec
                            .as_ref()
                            .and_then(|s| s.template.metadata.as_ref())
                            .and_then(|m| m.labels.clone()),
                        RenderedObject::Service(_) => None,
                    };
                    labels.is_some_and(|l| l.get(key) == Some(value))
                })
                .count();
            assert_eq!(owners, 1, "numPods {num_pods} selector {key}");
        }
    }
}

#[test]
fn test_container_details() {
    let objects = generate(&master(Some(0))).unwrap();
    let all: Vec<Container> = objects.iter().flat_map(containers).collect();

    let appfabric = all.iter().find(|c| c.name == "appfabric").unwrap();
    let heap = appfabric
        .env
        .as_ref()
        .and_then(|env| env.iter().find(|e| e.name == "JAVA_HEAPMAX"))
        .and_then(|e| e.value.clone());
    // 4Gi - 768Mi
    assert_eq!(heap.as_deref(), Some("-Xmx3489660928"));
    assert_eq!(appfabric.image_pull_policy.as_deref(), Some("IfNotPresent"));

    let ui = all.iter().find(|c| c.name == "userinterface").unwrap();
    assert_eq!(ui.image.as_deref(), Some("gcr.io/cdapio/cdap-ui:6.1.0"));
    assert_eq!(ui.working_dir.as_deref(), Some("/opt/cdap/ui"));
    let env: Vec<&str> = ui
        .env
        .as_ref()
        .unwrap()
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(env, vec!["CDAP_UI_THEME", "NODE_ENV"]);
}

#[test]
fn test_unresolved_images_render_nothing() {
    let mut master = master(None);
    master.status = None;
    assert!(generate(&master).unwrap().is_empty());
}

#[test]
fn test_errors_are_attributed_to_master() {
    let unsupported = master(Some(7));
    match generate(&unsupported).unwrap_err() {
        Error::Validation { app, field, message } => {
            assert_eq!(app, "demo");
            assert_eq!(field.as_deref(), Some("spec.numPods"));
            assert!(message.contains("numPods 7"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let mut conflict = master(Some(2));
    conflict.spec.preview.storage_class_name = Some("ssd".to_string());
    let err = generate(&conflict).unwrap_err();
    assert!(err.to_string().contains("StorageClassName inconsistent"));
    assert!(!err.is_retryable());
}

#[test]
fn test_manifests_serialize_as_yaml_documents() {
    let objects = generate(&master(Some(3))).unwrap();
    for object in &objects {
        let yaml = serde_yaml::to_string(object).unwrap();
        assert!(yaml.contains(&format!("kind: {}", object.kind())));
        assert!(yaml.contains("team: data"));
    }
}
