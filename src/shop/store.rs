use tokio::sync::RwLock;

use super::Shop;

/// Append-only, in-memory history of accepted shops.
///
/// Lives as long as the owning service; nothing is persisted.
#[derive(Default)]
pub struct ShopStore {
    shops: RwLock<Vec<Shop>>,
}

impl ShopStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted shop.  Callers must have validated it already.
    pub async fn append(&self, shop: Shop) {
        self.shops.write().await.push(shop);
    }

    /// Every accepted shop, oldest first.
    pub async fn list_all(&self) -> Vec<Shop> {
        self.shops.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.shops.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::shop::Item;

    fn shop(id: i64) -> Shop {
        Shop {
            id,
            name: format!("Shop {id}"),
            shopkeeper_description: "Keeper".into(),
            goods: vec![Item {
                name: "Rope".into(),
                level: 1,
                damage: None,
                armor: None,
            }],
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        let store = ShopStore::new();
        assert!(store.list_all().await.is_empty());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn append_keeps_insertion_order() {
        let store = ShopStore::new();
        for id in [3, 1, 2] {
            store.append(shop(id)).await;
            assert_eq!(store.list_all().await.last(), Some(&shop(id)));
        }
        let ids: Vec<i64> = store.list_all().await.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn duplicates_are_kept() {
        let store = ShopStore::new();
        store.append(shop(1)).await;
        store.append(shop(1)).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn list_all_is_idempotent() {
        let store = ShopStore::new();
        store.append(shop(1)).await;
        store.append(shop(2)).await;
        assert_eq!(store.list_all().await, store.list_all().await);
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_recorded() {
        let store = Arc::new(ShopStore::new());
        let handles: Vec<_> = (0..32)
            .map(|id| {
                let store = store.clone();
                tokio::spawn(async move { store.append(shop(id)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut ids: Vec<i64> = store.list_all().await.iter().map(|s| s.id).collect();
        ids.sort();
        assert_eq!(ids, (0..32).collect::<Vec<_>>());
    }
}
