pub mod gcs;
pub mod google_auth;
pub mod vertex;

pub use gcs::GcsClient;
pub use google_auth::{
    AccessToken, GcloudCliToken, GoogleAuth, MetadataServerToken, StaticToken, TokenSource,
};
pub use vertex::{display_name_filter, OperationPolicy, VertexClient};
