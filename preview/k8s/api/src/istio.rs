//! Istio `networking.istio.io` resources.
//!
//! Only the fields this tool reads or writes are modeled. Everything else is
//! captured in `other` maps so that a fetched object survives a
//! deserialize/serialize round trip without losing configuration owned by
//! someone else.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const API_GROUP: &str = "networking.istio.io";
pub const API_VERSION: &str = "networking.istio.io/v1beta1";

/// Fields that are carried through untouched.
pub type Other = BTreeMap<String, serde_json::Value>;

/// Configures routing for a set of hosts, either inside the mesh (no
/// `gateways`) or at an ingress gateway.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "networking.istio.io",
    version = "v1beta1",
    kind = "VirtualService",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// Gateways the routes apply to. An empty list means the object only
    /// configures sidecars.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,

    /// Ordered HTTP routes. The first route whose match succeeds is used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http: Vec<HttpRoute>,

    #[serde(flatten)]
    pub other: Other,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRoute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Match conditions; the route applies when any of them matches. An empty
    /// list matches every request.
    #[serde(default, rename = "match", skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<HttpMatchRequest>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<HttpRouteDestination>,

    #[serde(flatten)]
    pub other: Other,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpMatchRequest {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, StringMatch>,

    #[serde(flatten)]
    pub other: Other,
}

/// A string condition. At most one of `exact`, `prefix` and `regex` is set;
/// a match with none of them only requires the header to be present.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StringMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    #[serde(flatten)]
    pub other: Other,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteDestination {
    pub destination: Destination,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,

    #[serde(flatten)]
    pub other: Other,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,

    #[serde(flatten)]
    pub other: Other,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Headers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<HeaderOperations>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<HeaderOperations>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeaderOperations {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

// === impl VirtualService ===

impl VirtualService {
    /// Returns true if the object only configures sidecars, i.e. it is not
    /// bound to any gateway.
    pub fn is_mesh_internal(&self) -> bool {
        self.spec.gateways.is_empty()
    }

    pub fn serves_host(&self, host: &str) -> bool {
        self.spec.hosts.iter().any(|h| h == host)
    }
}

// === impl HttpRoute ===

impl HttpRoute {
    /// A route without match conditions that sends everything to `host`.
    pub fn to_host(name: impl ToString, host: impl ToString) -> Self {
        Self {
            name: Some(name.to_string()),
            route: vec![HttpRouteDestination::to_host(host)],
            ..Default::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

// === impl HttpMatchRequest ===

impl HttpMatchRequest {
    pub fn header(name: impl ToString, matches: StringMatch) -> Self {
        Self {
            headers: Some((name.to_string(), matches)).into_iter().collect(),
            ..Default::default()
        }
    }
}

// === impl StringMatch ===

impl StringMatch {
    pub fn exact(value: impl ToString) -> Self {
        Self {
            exact: Some(value.to_string()),
            ..Default::default()
        }
    }

    pub fn prefix(value: impl ToString) -> Self {
        Self {
            prefix: Some(value.to_string()),
            ..Default::default()
        }
    }
}

// === impl HttpRouteDestination ===

impl HttpRouteDestination {
    pub fn to_host(host: impl ToString) -> Self {
        Self {
            destination: Destination {
                host: host.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn preserves_unmodeled_fields() {
        let json = serde_json::json!({
            "apiVersion": "networking.istio.io/v1beta1",
            "kind": "VirtualService",
            "metadata": { "name": "reviews", "namespace": "istio-system" },
            "spec": {
                "hosts": ["reviews.default.svc.cluster.local"],
                "exportTo": ["."],
                "http": [{
                    "name": "reviews-debug",
                    "match": [{ "headers": { "x-debug": {} } }],
                    "route": [{ "destination": { "host": "reviews-debug" } }]
                }, {
                    "name": "reviews.default.svc.cluster.local",
                    "timeout": "5s",
                    "route": [{
                        "destination": {
                            "host": "reviews.default.svc.cluster.local",
                            "port": { "number": 9080 }
                        }
                    }]
                }]
            }
        });

        let vs = serde_json::from_value::<VirtualService>(json.clone()).expect("must parse");
        assert!(vs.is_mesh_internal());
        assert!(vs.serves_host("reviews.default.svc.cluster.local"));
        assert_eq!(
            vs.spec.other,
            btreemap! { "exportTo".to_string() => serde_json::json!(["."]) }
        );
        assert_eq!(
            vs.spec.http[0].matches[0].headers,
            btreemap! { "x-debug".to_string() => StringMatch::default() }
        );
        assert_eq!(
            vs.spec.http[1].other,
            btreemap! { "timeout".to_string() => serde_json::json!("5s") }
        );

        assert_eq!(serde_json::to_value(&vs).expect("must serialize"), json);
    }

    #[test]
    fn header_match_wire_format() {
        let route = HttpRoute {
            name: Some("pr42-checkout.default.svc.cluster.local".to_string()),
            matches: vec![HttpMatchRequest::header(
                "X-PREVIEW",
                StringMatch::prefix("pr42-"),
            )],
            route: vec![HttpRouteDestination::to_host(
                "pr42-checkout.default.svc.cluster.local",
            )],
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&route).expect("must serialize"),
            serde_json::json!({
                "name": "pr42-checkout.default.svc.cluster.local",
                "match": [{ "headers": { "X-PREVIEW": { "prefix": "pr42-" } } }],
                "route": [{
                    "destination": { "host": "pr42-checkout.default.svc.cluster.local" }
                }]
            })
        );
    }
}
