use async_trait::async_trait;
use serde_json::Value;

use crate::domain::entity::drink::Drink;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("drink with title {0} already exists")]
    DuplicateTitle(String),

    #[error("drink {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DrinkRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Drink>, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Drink>, RepositoryError>;
    async fn create(&self, title: &str, recipe: &Value) -> Result<Drink, RepositoryError>;
    async fn update(&self, drink: &Drink) -> Result<(), RepositoryError>;
    async fn delete(&self, id: i64) -> Result<bool, RepositoryError>;
}
