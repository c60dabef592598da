pub mod errors;
pub mod models;
pub mod providers;

pub use errors::{ProviderError, ProviderResult};
pub use providers::base::Provider;
pub use providers::factory::{create_provider, ProviderFactory};
