use crate::core::{InvalidUrl, NameError, SelectorNotFound, SelectorPair};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    SelectorNotFound(#[from] SelectorNotFound),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("no Deployment in {namespace} is selected by {selector}")]
    WorkloadNotFound {
        namespace: String,
        selector: SelectorPair,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("failed to {verb} {kind}")]
    RemoteTransport {
        verb: &'static str,
        kind: &'static str,
        #[source]
        source: kube::Error,
    },

    #[error("failed to serialize VirtualService")]
    SerializationFailure(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error(transparent)]
    InvalidUrl(#[from] InvalidUrl),
}

impl Error {
    pub(crate) fn transport(verb: &'static str, kind: &'static str, source: kube::Error) -> Self {
        Self::RemoteTransport { verb, kind, source }
    }
}
