// src/api/cache.rs

use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::RwLock;

use crate::extract::ExtractionResult;

/// Last successful extraction per source, owned by the HTTP layer.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    inner: Arc<RwLock<BTreeMap<String, ExtractionResult>>>,
}

/// What `/api/status` reports for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub fetched_at: DateTime<Utc>,
    pub record_count: usize,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was stored for the result's source.
    pub async fn insert(&self, result: ExtractionResult) {
        self.inner
            .write()
            .await
            .insert(result.source_id.clone(), result);
    }

    pub async fn get(&self, source_id: &str) -> Option<ExtractionResult> {
        self.inner.read().await.get(source_id).cloned()
    }

    pub async fn info(&self, source_id: &str) -> Option<CacheEntryInfo> {
        self.inner
            .read()
            .await
            .get(source_id)
            .map(|r| CacheEntryInfo {
                fetched_at: r.fetched_at,
                record_count: r.records.len(),
            })
    }

    /// Every cached result, ordered by source id.
    pub async fn snapshot(&self) -> Vec<ExtractionResult> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Record;

    fn result(id: &str, n: usize) -> ExtractionResult {
        ExtractionResult {
            source_id: id.to_string(),
            columns: vec!["Term".to_string()],
            records: (0..n)
                .map(|i| Record::from_pairs([("Term", i.to_string())]))
                .collect(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_replace_clear() {
        let cache = ResultCache::new();
        let shared = cache.clone();
        assert!(cache.is_empty().await);

        cache.insert(result("SMIB", 2)).await;
        cache.insert(result("HDFC", 1)).await;
        shared.insert(result("SMIB", 5)).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.info("SMIB").await.unwrap().record_count, 5);
        assert!(cache.get("NSB").await.is_none());

        let ids: Vec<_> = cache
            .snapshot()
            .await
            .into_iter()
            .map(|r| r.source_id)
            .collect();
        assert_eq!(ids, vec!["HDFC", "SMIB"]);

        shared.clear().await;
        assert!(cache.is_empty().await);
    }
}
