// Adapters layer: concrete implementations of the domain ports for external systems.

pub mod email_api;
pub mod http_store;
pub mod local_store;

pub use email_api::HttpEmailTransport;
pub use http_store::HttpTableStore;
pub use local_store::LocalStore;
