//! Builds preview copies of an origin's Service and Deployment.

use crate::{
    naming::{self, Version},
    selector::SelectorPair,
    validation::{validate_dns_label, validate_dns_subdomain, NameError},
};
use preview_k8s_api::{labels, Deployment, ObjectMeta, ResourceExt, Service};

/// Builds the preview copy of `origin`.
///
/// The copy selects pods labeled with the retagged selector value, so it never
/// captures traffic meant for the origin's pods.
pub fn preview_service(
    origin: &Service,
    selector: &SelectorPair,
    version: &Version,
    managed_by: &str,
) -> Result<Service, NameError> {
    let name = naming::encode(&origin.name_any(), version);
    validate_dns_label(&name)?;
    let retagged = selector.retag(version);

    let mut svc = origin.clone();
    reset_metadata(&mut svc.metadata, name, version, managed_by);
    labels::set(&mut svc.metadata.labels, &retagged.key, &retagged.value);
    svc.status = None;

    let spec = svc.spec.get_or_insert_with(Default::default);
    labels::set(&mut spec.selector, &retagged.key, &retagged.value);
    // Addresses and node ports are allocated by the API server per Service.
    spec.cluster_ip = None;
    spec.cluster_ips = None;
    spec.health_check_node_port = None;
    for port in spec.ports.iter_mut().flatten() {
        port.node_port = None;
    }

    Ok(svc)
}

/// Finds the Deployment whose pod selector binds `selector.key` to
/// `selector.value`.
pub fn find_workload<'d>(
    deployments: impl IntoIterator<Item = &'d Deployment>,
    selector: &SelectorPair,
) -> Option<&'d Deployment> {
    deployments.into_iter().find(|deploy| {
        deploy
            .spec
            .as_ref()
            .is_some_and(|s| labels::selects(&s.selector, &selector.key, &selector.value))
    })
}

/// Builds the preview copy of `origin`, whose pods carry the retagged selector
/// value.
pub fn preview_deployment(
    origin: &Deployment,
    selector: &SelectorPair,
    version: &Version,
    managed_by: &str,
) -> Result<Deployment, NameError> {
    let name = naming::encode(&origin.name_any(), version);
    validate_dns_subdomain(&name)?;
    let retagged = selector.retag(version);

    let mut deploy = origin.clone();
    reset_metadata(&mut deploy.metadata, name, version, managed_by);
    deploy.status = None;

    let spec = deploy.spec.get_or_insert_with(Default::default);
    labels::set(
        &mut spec.selector.match_labels,
        &retagged.key,
        &retagged.value,
    );
    let template = spec.template.metadata.get_or_insert_with(Default::default);
    labels::replace(&mut template.labels, &retagged.key, &retagged.value);
    labels::set(&mut template.labels, labels::PREVIEW_VERSION, version);

    Ok(deploy)
}

/// Renames the object and drops everything the API server assigns.
fn reset_metadata(meta: &mut ObjectMeta, name: String, version: &Version, managed_by: &str) {
    *meta = ObjectMeta {
        name: Some(name),
        namespace: meta.namespace.take(),
        labels: meta.labels.take(),
        annotations: meta.annotations.take(),
        ..Default::default()
    };
    if let Some(annotations) = meta.annotations.as_mut() {
        annotations.remove("kubectl.kubernetes.io/last-applied-configuration");
        annotations.remove("deployment.kubernetes.io/revision");
    }
    labels::set(&mut meta.labels, labels::PREVIEW_VERSION, version);
    labels::set(&mut meta.labels, labels::MANAGED_BY, managed_by);
}
