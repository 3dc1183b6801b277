//! Role administration: data model, static catalogs, input normalization,
//! inheritance validation and the orchestrating service.
//! Keep the public surface thin and split implementation across sub-modules.

pub mod actions;
pub mod builtin;
pub mod model;
pub mod normalize;
pub mod service;
pub mod validate;

pub use model::{Privilege, PrivilegeResource, RoleDoc, RoleRef, RoleRefInput};
pub use service::RoleService;
