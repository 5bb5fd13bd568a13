//! Names and tags for preview resources.
//!
//! A preview name is the reserved [`PREFIX`], the version tag, the
//! [`SEPARATOR`], and the original name: `checkout` at version `42` becomes
//! `pr42-checkout`. Version tags never contain the separator, so the first
//! separator after the prefix always terminates the version.

use crate::validation::{self, NameError};
use std::{fmt, str::FromStr};

pub const PREFIX: &str = "pr";
pub const SEPARATOR: char = '-';

/// Identifies one preview instance of an origin, e.g. a pull-request number.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(String);

/// The stable service that previews are derived from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    pub service: String,
    pub namespace: String,
    pub cluster_domain: String,
}

pub fn encode(name: &str, version: &Version) -> String {
    format!("{PREFIX}{version}{SEPARATOR}{name}")
}

/// Recovers the version tag from a preview name.
///
/// Names without the reserved prefix are returned unchanged.
pub fn decode(name: &str) -> &str {
    match name.strip_prefix(PREFIX) {
        Some(rest) => rest.split_once(SEPARATOR).map_or(rest, |(version, _)| version),
        None => name,
    }
}

/// Returns the version if `candidate` is exactly `encode(origin, version)`
/// for a well-formed version.
pub fn decode_for(origin: &str, candidate: &str) -> Option<Version> {
    let rest = candidate.strip_prefix(PREFIX)?;
    let (version, name) = rest.split_once(SEPARATOR)?;
    if name != origin {
        return None;
    }
    version.parse().ok()
}

/// The header value prefix shared by every tag of `version`.
pub fn header_prefix(version: &Version) -> String {
    encode("", version)
}

// === impl Version ===

impl Version {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Version {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validation::validate_version(s)?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// === impl Origin ===

impl Origin {
    pub fn new(
        service: impl ToString,
        namespace: impl ToString,
        cluster_domain: impl ToString,
    ) -> Self {
        Self {
            service: service.to_string(),
            namespace: namespace.to_string(),
            cluster_domain: cluster_domain.to_string(),
        }
    }

    /// The fully-qualified in-cluster host name of the origin service.
    pub fn host(&self) -> String {
        format!(
            "{}.{}.svc.{}",
            self.service, self.namespace, self.cluster_domain
        )
    }

    /// The host name of the preview service for `version`.
    pub fn preview_host(&self, version: &Version) -> String {
        encode(&self.host(), version)
    }

    /// The name of the preview Service and Deployment for `version`. This is
    /// also the value stamped into the preview header.
    pub fn preview_name(&self, version: &Version) -> String {
        encode(&self.service, version)
    }

    /// The name of the mesh-internal routing object shared by all previews of
    /// this origin.
    pub fn route_table_name(&self) -> String {
        format!("{PREFIX}{}-virtual-service", self.service)
    }

    /// The name of the gateway routing object dedicated to `version`.
    pub fn gateway_route_name(&self, version: &Version) -> String {
        format!("{}-gateway-virtual-service", self.preview_name(version))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.service)
    }
}
