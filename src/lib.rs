pub mod access;
pub mod azure;
pub mod config;
pub mod locator;
pub mod metadata;

pub use access::{
    resolve_and_sign, resolve_and_sign_with_display, sign_blob, sign_blob_with_display, BlobStore,
    DisplayBlob, SignedBlob,
};
pub use azure::{BlobError, BlobServiceClient};
pub use config::Config;
pub use locator::BlobRef;
pub use metadata::{normalize, DisplayMetadata};
