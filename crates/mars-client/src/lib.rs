pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod files;
pub mod generation;

pub use api::ApiClient;
pub use auth::AuthService;
pub use config::ClientConfig;
pub use credentials::{Credential, CredentialProvider, FileCredentialStore, MemoryCredentials};
pub use files::FileService;
pub use generation::GenerationService;
