//! Creates a preview: clones the origin's Service and Deployment, adds the
//! preview route to the origin's route table, and exposes the preview through
//! the gateway.
//!
//! Stages run in order and stop at the first error. Each completed stage
//! records how to undo it; on failure the recorded compensations run in
//! reverse unless rollback is disabled.

use crate::{
    apply::PatchApplier,
    core::{
        clone, gateway, route_table, selector, Origin, RouteChange, RouteTableUpdate,
        SelectorPair, Version,
    },
    k8s::{istio::HttpRoute, Deployment, ResourceExt, Service, VirtualService},
    registry::{RoutingRegistry, WorkloadRegistry},
    Error, Result,
};
use anyhow::Context;
use tracing::{info, info_span, warn, Instrument};

#[derive(Clone, Debug)]
pub struct Config {
    pub origin: Origin,
    pub version: Version,
    pub url: String,
    pub gateway: String,
    pub routing_namespace: String,
    pub header: String,
    pub selector_key: Option<String>,
    pub field_manager: String,
    pub rollback: bool,
}

/// The objects written by a successful run.
#[derive(Clone, Debug)]
pub struct Created {
    pub selector: SelectorPair,
    pub service: Service,
    pub deployment: Deployment,
    pub route_table: VirtualService,
    pub route_changes: Vec<RouteChange>,
    pub gateway_route: VirtualService,
}

/// Undoes one completed stage.
#[derive(Clone, Debug)]
enum Compensation {
    DeleteService { name: String },
    DeleteDeployment { name: String },
    /// The route table was created by this run.
    DeleteRouteTable { namespace: String, name: String },
    /// The preview route was appended to an existing table.
    RemoveRoute,
    /// The preview route replaced a route that existed before this run.
    RestoreRoute { previous: Box<HttpRoute> },
    DeleteGatewayRoute { namespace: String, name: String },
}

pub async fn create<W, R>(config: &Config, workloads: &W, routes: &R) -> anyhow::Result<Created>
where
    W: WorkloadRegistry + Sync + ?Sized,
    R: RoutingRegistry + Sync + ?Sized,
{
    let mut saga = Vec::new();
    match run(config, workloads, routes, &mut saga).await {
        Ok(created) => {
            info!(
                origin = %config.origin,
                version = %config.version,
                url = %config.url,
                "Preview created"
            );
            Ok(created)
        }
        Err(error) => {
            if config.rollback {
                compensate(config, workloads, routes, saga)
                    .instrument(info_span!("rollback"))
                    .await;
            } else if !saga.is_empty() {
                warn!(completed = ?saga, "Leaving partially created preview in place");
            }
            Err(error)
        }
    }
}

async fn run<W, R>(
    config: &Config,
    workloads: &W,
    routes: &R,
    saga: &mut Vec<Compensation>,
) -> anyhow::Result<Created>
where
    W: WorkloadRegistry + Sync + ?Sized,
    R: RoutingRegistry + Sync + ?Sized,
{
    let Config { origin, .. } = config;

    let (origin_svc, selector) = resolve_selector(config, workloads)
        .instrument(info_span!("selector"))
        .await
        .with_context(|| format!("failed to resolve the pod selector of {origin}"))?;
    info!(%selector, "Resolved selector");

    let service = clone_service(config, workloads, &origin_svc, &selector)
        .instrument(info_span!("service"))
        .await
        .with_context(|| format!("failed to create the preview Service for {origin}"))?;
    saga.push(Compensation::DeleteService {
        name: service.name_any(),
    });

    let deployment = clone_deployment(config, workloads, &selector)
        .instrument(info_span!("deployment"))
        .await
        .with_context(|| format!("failed to create the preview Deployment for {origin}"))?;
    saga.push(Compensation::DeleteDeployment {
        name: deployment.name_any(),
    });

    let applier = PatchApplier::new(&config.field_manager);
    let (route_table, route_changes, undo) = compose_routes(config, routes, &applier)
        .instrument(info_span!("routes", host = %origin.host()))
        .await
        .with_context(|| format!("failed to update the route table of {}", origin.host()))?;
    saga.push(undo);

    let gateway_route = expose(config, routes)
        .instrument(info_span!("gateway", gateway = %config.gateway))
        .await
        .with_context(|| format!("failed to create the gateway route for {}", config.url))?;
    saga.push(Compensation::DeleteGatewayRoute {
        namespace: gateway_route.namespace().unwrap_or_default(),
        name: gateway_route.name_any(),
    });

    Ok(Created {
        selector,
        service,
        deployment,
        route_table,
        route_changes,
        gateway_route,
    })
}

async fn resolve_selector<W>(config: &Config, workloads: &W) -> Result<(Service, SelectorPair)>
where
    W: WorkloadRegistry + Sync + ?Sized,
{
    let name = &config.origin.service;
    let origin = workloads
        .list_services()
        .await?
        .into_iter()
        .find(|svc| svc.name_any() == *name)
        .ok_or_else(|| Error::NotFound {
            kind: "Service",
            namespace: workloads.namespace().to_string(),
            name: name.clone(),
        })?;
    let selector = selector::resolve(&origin, config.selector_key.as_deref())?;
    Ok((origin, selector))
}

async fn clone_service<W>(
    config: &Config,
    workloads: &W,
    origin: &Service,
    selector: &SelectorPair,
) -> Result<Service>
where
    W: WorkloadRegistry + Sync + ?Sized,
{
    let svc = clone::preview_service(origin, selector, &config.version, &config.field_manager)?;
    workloads.create_service(&svc).await
}

async fn clone_deployment<W>(
    config: &Config,
    workloads: &W,
    selector: &SelectorPair,
) -> Result<Deployment>
where
    W: WorkloadRegistry + Sync + ?Sized,
{
    let deployments = workloads.list_deployments().await?;
    let origin = clone::find_workload(&deployments, selector).ok_or_else(|| {
        Error::WorkloadNotFound {
            namespace: workloads.namespace().to_string(),
            selector: selector.clone(),
        }
    })?;
    let deploy =
        clone::preview_deployment(origin, selector, &config.version, &config.field_manager)?;
    workloads.create_deployment(&deploy).await
}

async fn compose_routes<R>(
    config: &Config,
    routes: &R,
    applier: &PatchApplier,
) -> Result<(VirtualService, Vec<RouteChange>, Compensation)>
where
    R: RoutingRegistry + Sync + ?Sized,
{
    let tables = routes.list_virtual_services().await?;
    let existing = route_table::find(&config.origin, &tables).cloned();
    let mut update = RouteTableUpdate::begin(&config.origin, &config.routing_namespace, existing);
    let is_new = update.is_new();
    let previous = update
        .route(&config.origin.preview_host(&config.version))
        .cloned();
    update.upsert_preview(&config.version, &config.header);

    let (table, changes) = update.finish();
    for change in &changes {
        info!(?change, table = %table.name_any(), "Updating route table");
    }
    let undo = if is_new {
        Compensation::DeleteRouteTable {
            namespace: table.namespace().unwrap_or_default(),
            name: table.name_any(),
        }
    } else if let Some(previous) = previous {
        Compensation::RestoreRoute {
            previous: Box::new(previous),
        }
    } else {
        Compensation::RemoveRoute
    };
    let applied = applier.apply(routes, &table).await?;
    Ok((applied, changes, undo))
}

async fn expose<R>(config: &Config, routes: &R) -> Result<VirtualService>
where
    R: RoutingRegistry + Sync + ?Sized,
{
    let vs = gateway::gateway_route(
        &config.origin,
        &config.version,
        &config.url,
        &config.gateway,
        &config.routing_namespace,
        &config.header,
    )?;
    routes.create_virtual_service(&vs).await
}

/// Removes this run's preview route from the route table, putting back
/// `previous` if the run replaced it.
async fn revert_route<R>(config: &Config, routes: &R, previous: Option<&HttpRoute>) -> Result<()>
where
    R: RoutingRegistry + Sync + ?Sized,
{
    let tables = routes.list_virtual_services().await?;
    let Some(existing) = route_table::find(&config.origin, &tables).cloned() else {
        return Ok(());
    };
    let mut update =
        RouteTableUpdate::begin(&config.origin, &config.routing_namespace, Some(existing));
    match previous {
        Some(route) => {
            update.upsert_route(route.clone());
        }
        None => {
            if !update.remove_preview(&config.version) {
                return Ok(());
            }
        }
    }
    let (table, _) = update.finish();
    PatchApplier::new(&config.field_manager)
        .apply(routes, &table)
        .await
        .map(|_| ())
}

/// Runs compensations in reverse order. Failures are logged so that they do
/// not mask the error that triggered the rollback.
async fn compensate<W, R>(config: &Config, workloads: &W, routes: &R, saga: Vec<Compensation>)
where
    W: WorkloadRegistry + Sync + ?Sized,
    R: RoutingRegistry + Sync + ?Sized,
{
    for step in saga.into_iter().rev() {
        let res = match &step {
            Compensation::DeleteGatewayRoute { namespace, name } => {
                routes.delete_virtual_service(namespace, name).await
            }
            Compensation::RestoreRoute { previous } => {
                revert_route(config, routes, Some(&**previous)).await
            }
            Compensation::RemoveRoute => revert_route(config, routes, None).await,
            Compensation::DeleteRouteTable { namespace, name } => {
                routes.delete_virtual_service(namespace, name).await
            }
            Compensation::DeleteDeployment { name } => workloads.delete_deployment(name).await,
            Compensation::DeleteService { name } => workloads.delete_service(name).await,
        };
        match res {
            Ok(()) => info!(?step, "Rolled back"),
            Err(error) => warn!(?step, %error, "Failed to roll back"),
        }
    }
}
