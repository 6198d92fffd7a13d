//! Core configuration types: scopes, paths, fields, values and the service.

mod builder;
mod path;
mod schema;
mod scope;
mod service;
mod value;

pub use builder::ServiceBuilder;
pub use path::{MIN_SEGMENTS, Path, SEPARATOR, validate_route};
pub use schema::{Field, FieldRegistry};
pub use scope::{ScopePerm, ScopeType, ScopeTypeID};
pub use service::Service;
pub use value::{Origin, Value};

pub(crate) use value::parse_bool;
