pub mod auth;
pub mod client;
pub mod error;
pub mod properties;
pub mod sas;

pub use auth::StorageCredential;
pub use client::{BlobClient, BlobServiceClient};
pub use error::{BlobError, Result};
pub use properties::{BlobProperties, Metadata};
pub use sas::{generate_blob_sas, SasWindow};
