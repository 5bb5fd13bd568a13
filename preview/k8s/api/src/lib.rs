#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod istio;
pub mod labels;

pub use self::{
    istio::{VirtualService, VirtualServiceSpec},
    labels::Labels,
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{PodTemplateSpec, Service, ServicePort, ServiceSpec},
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
pub use kube::{
    api::{
        Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt,
    },
    core::ErrorResponse,
    Client, Error, Resource,
};
