//! Session construction and sizing profiles.

pub mod factory;
pub mod profiles;

pub use factory::SessionFactory;
pub use profiles::{EnvironmentClass, EnvironmentProfile};
