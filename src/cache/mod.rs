//! Balance cache — the derived side of the dual-store design
//!
//! The relational ledger is the source of truth; this cache is a
//! read-optimized, eventually-consistent projection kept in a document
//! store. It is disposable: replaying the ledger rebuilds it. Mirror-write
//! failures never fail the authoritative commit — they surface as
//! `MirrorStatus::Drifted` so drift is observable instead of silently
//! discarded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Per-user cached snapshot. Amounts are stored as floats in the document
/// store; the relational ledger keeps the exact figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedBalance {
    pub user_id: i64,
    pub available_balance: f64,
    pub total_deposits: f64,
}

/// Result of a best-effort mirror write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorStatus {
    /// The cache was updated in step with the ledger.
    Applied,
    /// The cache write failed; the cached value now lags the ledger until
    /// the next rebuild.
    Drifted(String),
}

impl MirrorStatus {
    pub fn is_drifted(&self) -> bool {
        matches!(self, MirrorStatus::Drifted(_))
    }
}

/// Document-store operations for the per-user balance snapshots.
#[async_trait]
pub trait BalanceCache: Send + Sync {
    /// Upsert-increment on deposit completion.
    async fn credit_deposit(&self, user_id: i64, amount: Decimal) -> Result<(), String>;

    /// Read the cached snapshot, if any. May be stale.
    async fn snapshot(&self, user_id: i64) -> Result<Option<CachedBalance>, String>;

    /// Replace a user's snapshot wholesale (rebuild from ledger replay).
    async fn replace(&self, snapshot: CachedBalance) -> Result<(), String>;
}

/// Mirror a deposit credit, absorbing failures into an observable status.
pub async fn mirror_deposit_credit(
    cache: &dyn BalanceCache,
    user_id: i64,
    amount: Decimal,
) -> MirrorStatus {
    match cache.credit_deposit(user_id, amount).await {
        Ok(()) => MirrorStatus::Applied,
        Err(reason) => {
            tracing::warn!(user_id, %amount, %reason, "Balance cache mirror write failed");
            MirrorStatus::Drifted(reason)
        }
    }
}

/// MongoDB-backed balance cache (`balances` collection, one document per
/// user).
pub struct MongoBalanceCache {
    collection: mongodb::Collection<mongodb::bson::Document>,
}

impl MongoBalanceCache {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, mongodb::error::Error> {
        let client = mongodb::Client::with_uri_str(uri).await?;
        let collection = client.database(database).collection("balances");
        tracing::info!(database, "MongoDB balance cache connected");
        Ok(Self { collection })
    }
}

#[async_trait]
impl BalanceCache for MongoBalanceCache {
    async fn credit_deposit(&self, user_id: i64, amount: Decimal) -> Result<(), String> {
        let amount_f = amount
            .to_f64()
            .ok_or_else(|| format!("amount {} not representable", amount))?;

        let filter = mongodb::bson::doc! { "user_id": user_id };
        let update = mongodb::bson::doc! {
            "$inc": { "available_balance": amount_f, "total_deposits": amount_f },
            "$setOnInsert": { "user_id": user_id },
        };
        let options = mongodb::options::UpdateOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .update_one(filter, update, options)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn snapshot(&self, user_id: i64) -> Result<Option<CachedBalance>, String> {
        let filter = mongodb::bson::doc! { "user_id": user_id };
        let doc = self
            .collection
            .find_one(filter, None)
            .await
            .map_err(|e| e.to_string())?;

        Ok(doc.map(|d| CachedBalance {
            user_id,
            available_balance: d.get_f64("available_balance").unwrap_or(0.0),
            total_deposits: d.get_f64("total_deposits").unwrap_or(0.0),
        }))
    }

    async fn replace(&self, snapshot: CachedBalance) -> Result<(), String> {
        let filter = mongodb::bson::doc! { "user_id": snapshot.user_id };
        let replacement = mongodb::bson::doc! {
            "user_id": snapshot.user_id,
            "available_balance": snapshot.available_balance,
            "total_deposits": snapshot.total_deposits,
        };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .replace_one(filter, replacement, options)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// In-process balance cache. Used when no document store is configured,
/// and as the test double.
#[derive(Default)]
pub struct MemoryBalanceCache {
    balances: RwLock<HashMap<i64, CachedBalance>>,
}

impl MemoryBalanceCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceCache for MemoryBalanceCache {
    async fn credit_deposit(&self, user_id: i64, amount: Decimal) -> Result<(), String> {
        let amount_f = amount
            .to_f64()
            .ok_or_else(|| format!("amount {} not representable", amount))?;

        let mut balances = self.balances.write().await;
        let entry = balances.entry(user_id).or_insert_with(|| CachedBalance {
            user_id,
            ..Default::default()
        });
        entry.available_balance += amount_f;
        entry.total_deposits += amount_f;
        Ok(())
    }

    async fn snapshot(&self, user_id: i64) -> Result<Option<CachedBalance>, String> {
        Ok(self.balances.read().await.get(&user_id).cloned())
    }

    async fn replace(&self, snapshot: CachedBalance) -> Result<(), String> {
        self.balances
            .write()
            .await
            .insert(snapshot.user_id, snapshot);
        Ok(())
    }
}

#[cfg(test)]
pub mod faulty {
    //! Cache double whose writes always fail, for drift-observability tests.

    use super::*;

    pub struct FaultyBalanceCache;

    #[async_trait]
    impl BalanceCache for FaultyBalanceCache {
        async fn credit_deposit(&self, _user_id: i64, _amount: Decimal) -> Result<(), String> {
            Err("document store unreachable".to_string())
        }

        async fn snapshot(&self, _user_id: i64) -> Result<Option<CachedBalance>, String> {
            Err("document store unreachable".to_string())
        }

        async fn replace(&self, _snapshot: CachedBalance) -> Result<(), String> {
            Err("document store unreachable".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_increments() {
        let cache = MemoryBalanceCache::new();
        cache
            .credit_deposit(7, Decimal::from(100))
            .await
            .expect("credit");
        cache
            .credit_deposit(7, Decimal::from(50))
            .await
            .expect("credit");

        let snapshot = cache.snapshot(7).await.expect("snapshot").expect("present");
        assert_eq!(snapshot.available_balance, 150.0);
        assert_eq!(snapshot.total_deposits, 150.0);
    }

    #[tokio::test]
    async fn test_mirror_reports_drift() {
        let cache = faulty::FaultyBalanceCache;
        let status = mirror_deposit_credit(&cache, 7, Decimal::from(100)).await;
        assert!(status.is_drifted());
    }

    #[tokio::test]
    async fn test_replace_overwrites() {
        let cache = MemoryBalanceCache::new();
        cache
            .credit_deposit(3, Decimal::from(999))
            .await
            .expect("credit");

        cache
            .replace(CachedBalance {
                user_id: 3,
                available_balance: 250.0,
                total_deposits: 400.0,
            })
            .await
            .expect("replace");

        let snapshot = cache.snapshot(3).await.expect("snapshot").expect("present");
        assert_eq!(snapshot.available_balance, 250.0);
        assert_eq!(snapshot.total_deposits, 400.0);
    }
}
