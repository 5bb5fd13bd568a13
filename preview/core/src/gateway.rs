use crate::naming::{Origin, Version};
use http::Uri;
use preview_k8s_api::{
    istio::{HeaderOperations, Headers, HttpRoute, HttpRouteDestination},
    VirtualService, VirtualServiceSpec,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid preview URL {url:?}: {reason}")]
pub struct InvalidUrl {
    pub url: String,
    pub reason: String,
}

/// Extracts the host name from a preview URL.
///
/// Bare host names (`pr42.example.com`) are accepted as well as full URLs.
pub fn external_host(url: &str) -> Result<String, InvalidUrl> {
    let invalid = |reason: String| InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let uri = if url.contains("://") {
        url.parse::<Uri>()
    } else {
        format!("https://{url}").parse::<Uri>()
    }
    .map_err(|e| invalid(e.to_string()))?;

    match uri.host() {
        Some(host) if !host.is_empty() => Ok(host.to_ascii_lowercase()),
        _ => Err(invalid("missing host".to_string())),
    }
}

/// Builds the gateway route that sends requests for `url` to the preview of
/// `origin` and tags them with the preview header.
pub fn gateway_route(
    origin: &Origin,
    version: &Version,
    url: &str,
    gateway: &str,
    namespace: &str,
    header: &str,
) -> Result<VirtualService, InvalidUrl> {
    let host = external_host(url)?;
    let preview_host = origin.preview_host(version);

    let tag = Headers {
        request: Some(HeaderOperations {
            set: Some((header.to_string(), origin.preview_name(version)))
                .into_iter()
                .collect(),
            ..Default::default()
        }),
        ..Default::default()
    };

    let mut vs = VirtualService::new(
        &origin.gateway_route_name(version),
        VirtualServiceSpec {
            hosts: vec![host],
            gateways: vec![gateway.to_string()],
            http: vec![HttpRoute {
                name: Some(preview_host.clone()),
                route: vec![HttpRouteDestination {
                    headers: Some(tag),
                    ..HttpRouteDestination::to_host(preview_host)
                }],
                ..Default::default()
            }],
            ..Default::default()
        },
    );
    vs.metadata.namespace = Some(namespace.to_string());
    Ok(vs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::{btreemap, convert_args};
    use pretty_assertions::assert_eq;

    #[test]
    fn hosts() {
        for (url, host) in [
            ("https://pr42.example.com", "pr42.example.com"),
            ("http://pr42.example.com:8080/app?x=1", "pr42.example.com"),
            ("pr42.example.com", "pr42.example.com"),
            ("PR42.Example.com", "pr42.example.com"),
        ] {
            assert_eq!(external_host(url).as_deref(), Ok(host), "{url}");
        }
        assert!(external_host("https://").is_err());
        assert!(external_host("").is_err());
    }

    #[test]
    fn routes_external_host_to_preview() {
        let origin = Origin::new("checkout", "default", "cluster.local");
        let version = "42".parse().expect("valid version");
        let vs = gateway_route(
            &origin,
            &version,
            "https://pr42.example.com",
            "my-gateway",
            "istio-system",
            "X-PREVIEW",
        )
        .expect("URL must be valid");

        assert_eq!(
            vs.metadata.name.as_deref(),
            Some("pr42-checkout-gateway-virtual-service")
        );
        assert_eq!(vs.metadata.namespace.as_deref(), Some("istio-system"));
        assert_eq!(vs.spec.hosts, vec!["pr42.example.com"]);
        assert_eq!(vs.spec.gateways, vec!["my-gateway"]);

        let [route] = vs.spec.http.as_slice() else {
            panic!("expected a single route: {:?}", vs.spec.http);
        };
        assert_eq!(
            route.name(),
            Some("pr42-checkout.default.svc.cluster.local")
        );
        assert!(route.matches.is_empty());
        assert_eq!(
            route.route[0].destination.host,
            "pr42-checkout.default.svc.cluster.local"
        );
        assert_eq!(
            route.route[0]
                .headers
                .as_ref()
                .and_then(|h| h.request.as_ref())
                .map(|r| r.set.clone()),
            Some(convert_args!(btreemap!("X-PREVIEW" => "pr42-checkout")))
        );
    }
}
