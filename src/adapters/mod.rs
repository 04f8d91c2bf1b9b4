// Adapters: concrete implementations of the domain ports (HTTP APIs, filesystem).

pub mod ecosystems;
pub mod github;
pub mod http;
pub mod storage;

pub use ecosystems::{parse_github_url, EcosystemsClient};
pub use github::GitHubClient;
pub use http::{ApiClient, RetryPolicy};
pub use storage::LocalStorage;
