//! The mesh-internal route table shared by all previews of an origin.
//!
//! Each origin host has one sidecar `VirtualService` holding a header-matched
//! route per preview and a single default route to the origin. The traffic
//! layer picks the first route that matches, so preview routes are always
//! kept ahead of the default route.

use crate::naming::{self, Origin, Version};
use preview_k8s_api::{
    istio::{HttpMatchRequest, HttpRoute, HttpRouteDestination, StringMatch},
    ObjectMeta, ResourceExt, VirtualService, VirtualServiceSpec,
};


/// A read-modify-write transaction against one origin's route table.
///
/// The transaction starts from the fetched object (or nothing), accumulates
/// edits and records each of them, and yields a document suitable for
/// server-side apply.
#[derive(Clone, Debug)]
pub struct RouteTableUpdate {
    origin: Origin,
    table: VirtualService,
    changes: Vec<RouteChange>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteChange {
    Created { table: String },
    Appended { route: String },
    Replaced { route: String },
    Removed { route: String },
    Reordered,
}

/// Finds the existing route table for `origin` among `candidates`.
///
/// Only mesh-internal objects serving the origin host qualify. If several do,
/// the one with the conventional table name wins, then the first in
/// namespace/name order.
pub fn find<'v>(
    origin: &Origin,
    candidates: impl IntoIterator<Item = &'v VirtualService>,
) -> Option<&'v VirtualService> {
    let host = origin.host();
    let mut found = candidates
        .into_iter()
        .filter(|vs| vs.is_mesh_internal() && vs.serves_host(&host))
        .collect::<Vec<_>>();
    if found.len() > 1 {
        tracing::warn!(
            %host,
            tables = found.len(),
            "Several mesh-internal VirtualServices serve the origin host"
        );
    }

    let name = origin.route_table_name();
    found.sort_by_key(|vs| (vs.name_any() != name, vs.namespace(), vs.name_any()));
    found.into_iter().next()
}

/// Returns true if `route` is the preview route of some version of
/// `origin_host`.
pub fn is_preview_route(origin_host: &str, route: &HttpRoute) -> bool {
    route
        .name()
        .and_then(|name| naming::decode_for(origin_host, name))
        .is_some()
}

/// Moves preview routes ahead of all other routes, keeping the relative order
/// within each group.
///
/// Returns true if the order changed.
pub fn sort_routes(origin_host: &str, routes: &mut [HttpRoute]) -> bool {
    let before = routes
        .iter()
        .map(|r| is_preview_route(origin_host, r))
        .collect::<Vec<_>>();
    // `sort_by_key` is stable.
    routes.sort_by_key(|r| !is_preview_route(origin_host, r));
    let after = routes.iter().map(|r| is_preview_route(origin_host, r));
    !before.into_iter().eq(after)
}

/// Builds the route that sends requests tagged for `version` to its preview
/// host.
pub fn preview_route(origin: &Origin, version: &Version, header: &str) -> HttpRoute {
    let host = origin.preview_host(version);
    HttpRoute {
        name: Some(host.clone()),
        matches: vec![HttpMatchRequest::header(
            header,
            StringMatch::prefix(naming::header_prefix(version)),
        )],
        route: vec![HttpRouteDestination::to_host(host)],
        ..Default::default()
    }
}

// === impl RouteTableUpdate ===

impl RouteTableUpdate {
    /// Starts a transaction on `existing`, or on a new table holding only the
    /// default route when the origin has no table yet.
    pub fn begin(origin: &Origin, namespace: &str, existing: Option<VirtualService>) -> Self {
        let mut changes = Vec::new();
        let table = match existing {
            Some(table) => table,
            None => {
                let name = origin.route_table_name();
                let host = origin.host();
                let mut table = VirtualService::new(
                    &name,
                    VirtualServiceSpec {
                        hosts: vec![host.clone()],
                        http: vec![HttpRoute::to_host(&host, &host)],
                        ..Default::default()
                    },
                );
                table.metadata.namespace = Some(namespace.to_string());
                changes.push(RouteChange::Created { table: name });
                table
            }
        };

        Self {
            origin: origin.clone(),
            table,
            changes,
        }
    }

    /// Adds the preview route for `version`, replacing a route of the same
    /// name if one exists.
    pub fn upsert_preview(&mut self, version: &Version, header: &str) -> &mut Self {
        self.upsert_route(preview_route(&self.origin, version, header))
    }

    /// Adds `route`, replacing a route of the same name if one exists.
    pub fn upsert_route(&mut self, route: HttpRoute) -> &mut Self {
        let name = route.name.clone().unwrap_or_default();
        match self
            .table
            .spec
            .http
            .iter_mut()
            .find(|r| r.name.is_some() && r.name == route.name)
        {
            Some(existing) => {
                *existing = route;
                self.changes.push(RouteChange::Replaced { route: name });
            }
            None => {
                self.table.spec.http.push(route);
                self.changes.push(RouteChange::Appended { route: name });
            }
        }
        self
    }

    /// Returns the route named `name`, if any.
    pub fn route(&self, name: &str) -> Option<&HttpRoute> {
        self.table.spec.http.iter().find(|r| r.name() == Some(name))
    }

    /// Removes the preview route for `version`.
    ///
    /// Returns true if a route was removed.
    pub fn remove_preview(&mut self, version: &Version) -> bool {
        let name = self.origin.preview_host(version);
        let len = self.table.spec.http.len();
        self.table
            .spec
            .http
            .retain(|r| r.name() != Some(name.as_str()));
        let removed = self.table.spec.http.len() != len;
        if removed {
            self.changes.push(RouteChange::Removed { route: name });
        }
        removed
    }

    pub fn is_new(&self) -> bool {
        matches!(self.changes.first(), Some(RouteChange::Created { .. }))
    }

    pub fn changes(&self) -> &[RouteChange] {
        &self.changes
    }

    pub fn routes(&self) -> &[HttpRoute] {
        &self.table.spec.http
    }

    /// Orders the routes and returns a client-owned copy of the table.
    ///
    /// Server-managed metadata (managed fields, resource version, uid,
    /// timestamps, status) is dropped; the kind and API version are stamped
    /// by serialization.
    pub fn finish(mut self) -> (VirtualService, Vec<RouteChange>) {
        if sort_routes(&self.origin.host(), &mut self.table.spec.http) {
            self.changes.push(RouteChange::Reordered);
        }

        let VirtualService { metadata, spec, .. } = self.table;
        let mut table = VirtualService::new(&metadata.name.unwrap_or_default(), spec);
        table.metadata = ObjectMeta {
            name: table.metadata.name,
            namespace: metadata.namespace,
            labels: metadata.labels,
            annotations: metadata.annotations.map(|mut a| {
                a.remove("kubectl.kubernetes.io/last-applied-configuration");
                a
            }),
            ..Default::default()
        };

        (table, self.changes)
    }
}
