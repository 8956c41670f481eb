use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::entity::drink::Drink;
use crate::domain::repository::{DrinkRepository, RepositoryError};

struct Store {
    next_id: i64,
    drinks: BTreeMap<i64, Drink>,
}

/// InMemoryDrinkRepository はプロセス内にドリンクを保持するリポジトリ。
/// 再起動で内容は失われる。タイトルは一意。
pub struct InMemoryDrinkRepository {
    store: RwLock<Store>,
}

impl InMemoryDrinkRepository {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(Store {
                next_id: 1,
                drinks: BTreeMap::new(),
            }),
        }
    }
}

impl Default for InMemoryDrinkRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DrinkRepository for InMemoryDrinkRepository {
    async fn find_all(&self) -> Result<Vec<Drink>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.drinks.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Drink>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.drinks.get(&id).cloned())
    }

    async fn create(&self, title: &str, recipe: &Value) -> Result<Drink, RepositoryError> {
        let mut store = self.store.write().await;
        if store.drinks.values().any(|d| d.title == title) {
            return Err(RepositoryError::DuplicateTitle(title.to_string()));
        }

        let drink = Drink::new(store.next_id, title.to_string(), recipe.clone());
        store.next_id += 1;
        store.drinks.insert(drink.id, drink.clone());
        Ok(drink)
    }

    async fn update(&self, drink: &Drink) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        if store
            .drinks
            .values()
            .any(|d| d.id != drink.id && d.title == drink.title)
        {
            return Err(RepositoryError::DuplicateTitle(drink.title.clone()));
        }

        match store.drinks.get_mut(&drink.id) {
            Some(existing) => {
                *existing = drink.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(drink.id)),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        Ok(store.drinks.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe() -> Value {
        serde_json::json!([{"name": "water", "color": "blue", "parts": 1}])
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let repo = InMemoryDrinkRepository::new();
        let a = repo.create("water", &recipe()).await.unwrap();
        let b = repo.create("latte", &recipe()).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(repo.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_duplicate_title() {
        let repo = InMemoryDrinkRepository::new();
        repo.create("water", &recipe()).await.unwrap();

        let result = repo.create("water", &recipe()).await;
        assert!(matches!(result, Err(RepositoryError::DuplicateTitle(t)) if t == "water"));
    }

    #[tokio::test]
    async fn test_update_and_find() {
        let repo = InMemoryDrinkRepository::new();
        let mut drink = repo.create("water", &recipe()).await.unwrap();
        drink.apply(Some("sparkling water".into()), None);
        repo.update(&drink).await.unwrap();

        let found = repo.find_by_id(drink.id).await.unwrap().unwrap();
        assert_eq!(found.title, "sparkling water");
    }

    #[tokio::test]
    async fn test_update_to_existing_title_is_rejected() {
        let repo = InMemoryDrinkRepository::new();
        repo.create("water", &recipe()).await.unwrap();
        let mut latte = repo.create("latte", &recipe()).await.unwrap();
        latte.apply(Some("water".into()), None);

        let result = repo.update(&latte).await;
        assert!(matches!(result, Err(RepositoryError::DuplicateTitle(_))));
    }

    #[tokio::test]
    async fn test_update_deleted_drink_is_not_found() {
        let repo = InMemoryDrinkRepository::new();
        let drink = repo.create("water", &recipe()).await.unwrap();
        repo.delete(drink.id).await.unwrap();

        let result = repo.update(&drink).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(id)) if id == drink.id));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryDrinkRepository::new();
        let drink = repo.create("water", &recipe()).await.unwrap();

        assert!(repo.delete(drink.id).await.unwrap());
        assert!(!repo.delete(drink.id).await.unwrap());
        assert!(repo.find_by_id(drink.id).await.unwrap().is_none());
    }
}
