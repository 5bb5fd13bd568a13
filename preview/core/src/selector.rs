use crate::naming::{self, Version};
use preview_k8s_api::{labels::Labels, ResourceExt, Service};
use std::fmt;
use thiserror::Error;

/// The label that binds a Service to the pods it routes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorPair {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorNotFound {
    #[error("service {service} does not declare a pod selector")]
    Empty { service: String },

    #[error("service {service} does not select pods by {key:?}")]
    MissingKey { service: String, key: String },
}

/// Resolves the selector pair of `service`.
///
/// When `key` is given, that key must be present. Otherwise the service is
/// expected to declare exactly one selector entry; if it declares several,
/// the first in key order is used.
pub fn resolve(service: &Service, key: Option<&str>) -> Result<SelectorPair, SelectorNotFound> {
    let labels = Labels::from(service.spec.as_ref().and_then(|s| s.selector.clone()));
    resolve_labels(&service.name_any(), &labels, key)
}

pub fn resolve_labels(
    service: &str,
    labels: &Labels,
    key: Option<&str>,
) -> Result<SelectorPair, SelectorNotFound> {
    if let Some(key) = key {
        let value = labels.get(key).ok_or_else(|| SelectorNotFound::MissingKey {
            service: service.to_string(),
            key: key.to_string(),
        })?;
        return Ok(SelectorPair::new(key, value));
    }

    let mut entries = labels.iter();
    let (key, value) = entries.next().ok_or_else(|| SelectorNotFound::Empty {
        service: service.to_string(),
    })?;
    let ignored = entries.count();
    if ignored > 0 {
        tracing::warn!(
            %service,
            %key,
            selectors = ignored + 1,
            "Service declares several selector labels; using the first"
        );
    }
    Ok(SelectorPair::new(key, value))
}

// === impl SelectorPair ===

impl SelectorPair {
    pub fn new(key: impl ToString, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// The pair that selects the preview copy for `version`.
    pub fn retag(&self, version: &Version) -> Self {
        Self {
            key: self.key.clone(),
            value: naming::encode(&self.value, version),
        }
    }
}

impl fmt::Display for SelectorPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::{btreemap, convert_args};
    use preview_k8s_api::{ObjectMeta, ServiceSpec};

    fn mk_service(selector: Option<preview_k8s_api::labels::Map>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("checkout".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn single_selector() {
        let svc = mk_service(Some(convert_args!(btreemap!("app" => "checkout"))));
        let pair = resolve(&svc, None).expect("selector must resolve");
        assert_eq!(pair, SelectorPair::new("app", "checkout"));

        let version = "42".parse().expect("valid version");
        assert_eq!(pair.retag(&version), SelectorPair::new("app", "pr42-checkout"));
    }

    #[test]
    fn empty_selector() {
        for svc in [mk_service(None), mk_service(Some(Default::default()))] {
            assert_eq!(
                resolve(&svc, None),
                Err(SelectorNotFound::Empty {
                    service: "checkout".to_string()
                })
            );
        }
        let svc = Service {
            metadata: ObjectMeta {
                name: Some("checkout".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(resolve(&svc, None).is_err(), "missing spec");
    }

    #[test]
    fn several_selectors_pick_first_key() {
        let svc = mk_service(Some(convert_args!(btreemap!(
            "version" => "v1",
            "app" => "checkout",
        ))));
        assert_eq!(
            resolve(&svc, None),
            Ok(SelectorPair::new("app", "checkout"))
        );
    }

    #[test]
    fn explicit_key() {
        let svc = mk_service(Some(convert_args!(btreemap!(
            "version" => "v1",
            "app" => "checkout",
        ))));
        assert_eq!(
            resolve(&svc, Some("version")),
            Ok(SelectorPair::new("version", "v1"))
        );
        assert_eq!(
            resolve(&svc, Some("tier")),
            Err(SelectorNotFound::MissingKey {
                service: "checkout".to_string(),
                key: "tier".to_string(),
            })
        );
    }
}
