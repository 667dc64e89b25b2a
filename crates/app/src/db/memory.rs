//! In-memory shop store.
//!
//! Process-local and lost on restart. Useful for local development against a
//! development store and as the backend for end-to-end tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use product_merge_core::{Email, ShopDomain, ShopId, UserId};

use crate::models::{Credential, ShopProfile, ShopRecord};

use super::{RepositoryError, ShopStore};

#[derive(Debug, Clone)]
struct StoredShop {
    id: ShopId,
    credential: Credential,
    owner_user_id: Option<UserId>,
    profile: Option<ShopProfile>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredShop {
    fn to_record(&self) -> ShopRecord {
        ShopRecord {
            id: self.id,
            shop: self.credential.shop.clone(),
            scopes: self.credential.scopes.clone(),
            issued_at: self.credential.issued_at,
            owner_user_id: self.owner_user_id,
            profile: self.profile.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    shops: HashMap<ShopDomain, StoredShop>,
    users: HashMap<Email, UserId>,
    next_shop_id: i32,
    next_user_id: i32,
}

impl Tables {
    fn resolve_user(&mut self, email: Email) -> UserId {
        if let Some(id) = self.users.get(&email) {
            return *id;
        }
        self.next_user_id += 1;
        let id = UserId::new(self.next_user_id);
        self.users.insert(email, id);
        id
    }
}

/// Shop store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryShopStore {
    tables: RwLock<Tables>,
}

impl MemoryShopStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The user created for a contact email, if any.
    pub async fn user_for_email(&self, email: &Email) -> Option<UserId> {
        self.tables.read().await.users.get(email).copied()
    }

    /// Number of installed shops.
    pub async fn shop_count(&self) -> usize {
        self.tables.read().await.shops.len()
    }
}

#[async_trait]
impl ShopStore for MemoryShopStore {
    async fn upsert_shop(
        &self,
        credential: &Credential,
        profile: Option<&ShopProfile>,
    ) -> Result<ShopId, RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        let owner = profile.map(|p| {
            p.contact_email
                .as_deref()
                .and_then(|e| Email::parse(e).ok())
                .map(|email| tables.resolve_user(email))
        });

        if let Some(existing) = tables.shops.get_mut(&credential.shop) {
            existing.credential = credential.clone();
            if let Some(profile) = profile {
                existing.profile = Some(profile.clone());
                existing.owner_user_id = owner.flatten();
            }
            existing.updated_at = now;
            return Ok(existing.id);
        }

        tables.next_shop_id += 1;
        let id = ShopId::new(tables.next_shop_id);
        tables.shops.insert(
            credential.shop.clone(),
            StoredShop {
                id,
                credential: credential.clone(),
                owner_user_id: owner.flatten(),
                profile: profile.cloned(),
                created_at: now,
                updated_at: now,
            },
        );

        Ok(id)
    }

    async fn get_credential(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<Credential>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .shops
            .get(shop)
            .map(|s| s.credential.clone()))
    }

    async fn get_shop(&self, shop: &ShopDomain) -> Result<Option<ShopRecord>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .shops
            .get(shop)
            .map(StoredShop::to_record))
    }

    async fn list_shops(&self) -> Result<Vec<ShopRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut shops: Vec<ShopRecord> = tables.shops.values().map(StoredShop::to_record).collect();
        shops.sort_by(|a, b| a.shop.cmp(&b.shop));
        Ok(shops)
    }

    async fn delete_shop(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        Ok(self.tables.write().await.shops.remove(shop).is_some())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
