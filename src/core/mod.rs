pub mod blob_store;
pub mod config;
pub mod jwt_auth;
mod responses;
mod telementry;

pub use self::config::AppConfig;
pub use blob_store::BlobStore;
pub use responses::*;
pub use telementry::*;
