//! Source adapter contract and the filesystem/wiki/forge/http
//! implementations (spec §4.C6-C7).

pub mod adapter;
pub mod config;
pub mod error;
pub mod forge;
pub mod fs;
pub mod http;
pub mod wiki;

pub use adapter::{apply_filters, categories_excluded, SourceAdapter};
pub use config::{
    ForgeAdapterConfig, FsAdapterConfig, HttpAdapterConfig, HttpAuthConfig, HttpAuthMode,
    HttpContentType, HttpEndpointConfig, HttpMethod, WikiAdapterConfig, WikiAuth,
};
pub use error::{into_core_error, AdapterError};
pub use forge::ForgeAdapter;
pub use fs::FilesystemAdapter;
pub use http::HttpAdapter;
pub use wiki::WikiAdapter;
