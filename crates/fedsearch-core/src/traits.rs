use async_trait::async_trait;

use crate::error::FetchError;
use crate::hit::Hit;
use crate::resource::Resource;

/// Runs a query against a remote resource. Receives the credential-bearing
/// descriptor.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, resource: &Resource, query: &str) -> Result<Vec<Hit>, FetchError>;
}

/// Asks the mother resource about an id this instance does not know.
/// `Ok(None)` means the mother does not know it either.
#[async_trait]
pub trait Suggester: Send + Sync {
    async fn suggest(&self, mother: &Resource, unknown_id: &str) -> Result<Option<Resource>, FetchError>;
}
