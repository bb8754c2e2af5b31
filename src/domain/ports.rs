use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Extract → transform → load, one implementation per data source.
/// `Raw` is whatever extraction yields per unit of input; `Output` is the
/// transformed dataset handed to the load stage.
#[async_trait]
pub trait Pipeline: Send + Sync {
    type Raw: Send;
    type Output: Send;

    async fn extract(&self) -> Result<Vec<Self::Raw>>;
    async fn transform(&self, data: Vec<Self::Raw>) -> Result<Self::Output>;
    async fn load(&self, result: Self::Output) -> Result<String>;

    fn name(&self) -> &str;
}
