#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod apply;
mod args;
pub mod create;
mod error;
pub mod registry;


pub use self::{
    apply::PatchApplier,
    args::Args,
    create::{Config, Created},
    error::{Error, Result},
    registry::{KubeRegistry, RoutingRegistry, WorkloadRegistry},
};
pub use preview_core as core;
pub use preview_k8s_api as k8s;
