//! Client SDK for the control plane that manages routers, router versions,
//! traffic rules, ensemblers, ensembling jobs and ensembler images.
//!
//! Every call is a blocking HTTP request; a non-2xx answer surfaces as
//! [`SdkError::Api`] carrying the status and raw body.

pub mod client;
pub mod error;
pub mod models;

pub use client::{ClientBuilder, ControlPlaneClient};
pub use error::SdkError;
pub use models::*;
