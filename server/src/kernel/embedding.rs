//! Embedding provider abstraction (component B) — text to fixed-dim vector.
//!
//! The provider itself (the HTTP call to an embeddings API) is an external
//! collaborator and out of scope here; this module only specifies the trait
//! boundary the hybrid search engine depends on, plus the query-embedding
//! cache the search engine is required to maintain.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Wraps an `EmbeddingClient`, caching query embeddings for up to `ttl`
/// (default 5 minutes) keyed on normalized query text, per §4.C.1.
pub struct CachedEmbeddingClient<C: EmbeddingClient> {
    inner: C,
    ttl: Duration,
    cache: Mutex<HashMap<String, (Vec<f32>, Instant)>>,
}

impl<C: EmbeddingClient> CachedEmbeddingClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            ttl: Duration::from_secs(300),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn normalize(text: &str) -> String {
        text.trim().to_lowercase()
    }

    pub async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let key = Self::normalize(text);

        if let Some((vector, inserted_at)) = self.cache.lock().unwrap().get(&key).cloned() {
            if inserted_at.elapsed() < self.ttl {
                return Ok(vector);
            }
        }

        let vector = self.inner.embed(text).await?;
        self.cache
            .lock()
            .unwrap()
            .insert(key, (vector.clone(), Instant::now()));
        Ok(vector)
    }
}

/// Object-safe facade over `CachedEmbeddingClient<C>` so the search engine can
/// depend on `dyn QueryEmbedder` without naming the concrete provider type.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

#[async_trait]
impl<C: EmbeddingClient> QueryEmbedder for CachedEmbeddingClient<C> {
    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        CachedEmbeddingClient::embed_query(self, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingClient {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingClient for CountingClient {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    #[tokio::test]
    async fn caches_repeated_normalized_queries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cached = CachedEmbeddingClient::new(CountingClient {
            calls: calls.clone(),
        });

        cached.embed_query("  Hello World  ").await.unwrap();
        cached.embed_query("hello world").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
