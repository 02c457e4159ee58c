//! Read-through cache for the published content lists.
//!
//! Each slot holds one whole list. Writes invalidate the slot; the next read
//! refills it from the database. Another process writing to the same database
//! is only seen once the TTL expires.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Book, BlogPostResponse, Engagement, Product};

struct Entry<T> {
    value: Arc<T>,
    filled_at: Instant,
}

/// A single cached value with a time-to-live
pub struct CacheSlot<T> {
    name: &'static str,
    ttl: Duration,
    entry: RwLock<Option<Entry<T>>>,
}

impl<T> CacheSlot<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entry: RwLock::new(None),
        }
    }

    fn fresh(&self, entry: &Option<Entry<T>>) -> Option<Arc<T>> {
        entry
            .as_ref()
            .filter(|e| e.filled_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.value))
    }

    /// Return the cached value, refilling it with `load` when cold or stale
    ///
    /// A failed load leaves the slot untouched and returns the error.
    pub async fn get_or_refill<F, Fut>(&self, load: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.fresh(&*self.entry.read().await) {
            return Ok(value);
        }

        let mut guard = self.entry.write().await;
        // another request may have refilled while we waited for the lock
        if let Some(value) = self.fresh(&guard) {
            return Ok(value);
        }

        let value = Arc::new(load().await?);
        *guard = Some(Entry {
            value: Arc::clone(&value),
            filled_at: Instant::now(),
        });
        tracing::debug!("Cache slot {} refilled", self.name);
        Ok(value)
    }

    pub async fn invalidate(&self) {
        let mut guard = self.entry.write().await;
        if guard.take().is_some() {
            tracing::debug!("Cache slot {} invalidated", self.name);
        }
    }

    pub async fn is_warm(&self) -> bool {
        self.fresh(&*self.entry.read().await).is_some()
    }
}

/// Published content lists shared by all request handlers
pub struct ContentCache {
    pub posts: CacheSlot<Vec<BlogPostResponse>>,
    pub books: CacheSlot<Vec<Book>>,
    pub engagements: CacheSlot<Vec<Engagement>>,
    pub products: CacheSlot<Vec<Product>>,
}

impl ContentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            posts: CacheSlot::new("posts", ttl),
            books: CacheSlot::new("books", ttl),
            engagements: CacheSlot::new("engagements", ttl),
            products: CacheSlot::new("products", ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_refills_only_when_cold() {
        let slot: CacheSlot<Vec<u32>> = CacheSlot::new("test", Duration::from_secs(60));
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = slot
                .get_or_refill(|| async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(*value, vec![1, 2, 3]);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        slot.invalidate().await;
        assert!(!slot.is_warm().await);
        slot.get_or_refill(|| async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![4])
        })
        .await
        .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_entry_is_reloaded() {
        let slot: CacheSlot<u32> = CacheSlot::new("test", Duration::ZERO);
        slot.get_or_refill(|| async { Ok(1) }).await.unwrap();
        let value = slot.get_or_refill(|| async { Ok(2) }).await.unwrap();
        assert_eq!(*value, 2);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_slot_cold() {
        let slot: CacheSlot<u32> = CacheSlot::new("test", Duration::from_secs(60));
        let err = slot
            .get_or_refill(|| async { Err(AppError::Internal("db down".to_string())) })
            .await;
        assert!(err.is_err());
        assert!(!slot.is_warm().await);
    }
}
