#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod clone;
pub mod gateway;
pub mod naming;
pub mod route_table;
pub mod selector;
mod validation;

pub use self::{
    gateway::InvalidUrl,
    naming::{Origin, Version},
    route_table::{RouteChange, RouteTableUpdate},
    selector::{SelectorNotFound, SelectorPair},
    validation::{validate_dns_label, NameError},
};

/// The header that carries a request's preview tag.
pub const DEFAULT_HEADER: &str = "X-PREVIEW";

/// The field manager identity used for server-side apply.
pub const DEFAULT_FIELD_MANAGER: &str = "preview";
