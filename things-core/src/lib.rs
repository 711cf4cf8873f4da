pub mod crd;
pub mod discovery;
pub mod error;
pub mod rest;
pub mod storage;
pub mod table;

pub use error::{AppError, AppResult};

/// The API group under which all resources of this crate are served.
pub const GROUP_NAME: &str = "things.myorg.io";
/// The API version under which all resources of this crate are served.
pub const API_VERSION: &str = "v1alpha1";
