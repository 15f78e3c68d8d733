//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, a local implementation using
//! bge-small-en-v1.5 (384 dimensions, L2-normalized), and [`EmbeddingEngine`],
//! which owns the provider's lifecycle.
//!
//! The embedding model is optional. A missing model file or a disabled provider
//! leaves the engine [`EngineStatus::Unavailable`]; every vector-dependent
//! feature then degrades to keyword-only behavior instead of failing.

pub mod local;

use anyhow::Result;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::config::EmbeddingConfig;

/// Number of dimensions in the embedding vectors (bge-small-en-v1.5).
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Implementations produce L2-normalized vectors of exactly [`EMBEDDING_DIM`] dimensions.
/// All methods are synchronous. Callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Only `"local"` loads a model (ONNX Runtime + bge-small-en-v1.5). Returns an
/// error if model files are not found; run `memoir model download` first.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Arc::new(provider))
        }
        "none" => anyhow::bail!("embedding disabled by configuration"),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local, none"),
    }
}

type Loader = Box<dyn Fn() -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync>;

/// Loader for engines built already settled; never invoked.
fn settled_loader() -> Result<Arc<dyn EmbeddingProvider>> {
    anyhow::bail!("engine was constructed in a settled state")
}

enum EngineState {
    Uninitialized,
    Loading,
    Ready(Arc<dyn EmbeddingProvider>),
    Unavailable(String),
}

/// Observable lifecycle state of an [`EmbeddingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Loading,
    Ready,
    Unavailable(String),
}

/// Lazily-initialized owner of the embedding provider.
///
/// The provider is loaded on first use. Concurrent first callers block on a
/// condition variable while one of them runs the loader, so the loader runs at
/// most once. A failed load is terminal: the engine stays `Unavailable` and is
/// never retried for the lifetime of the process.
pub struct EmbeddingEngine {
    state: Mutex<EngineState>,
    settled: Condvar,
    loader: Loader,
}

impl EmbeddingEngine {
    /// An engine that runs `loader` on first use.
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(EngineState::Uninitialized),
            settled: Condvar::new(),
            loader: Box::new(loader),
        }
    }

    /// An engine that loads the provider named in `config` on first use.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let config = config.clone();
        Self::new(move || create_provider(&config))
    }

    /// An engine that is already ready with the given provider.
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            state: Mutex::new(EngineState::Ready(provider)),
            settled: Condvar::new(),
            loader: Box::new(settled_loader),
        }
    }

    /// An engine that is permanently unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(EngineState::Unavailable(reason.into())),
            settled: Condvar::new(),
            loader: Box::new(settled_loader),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state without triggering a load.
    pub fn status(&self) -> EngineStatus {
        match &*self.lock() {
            EngineState::Uninitialized => EngineStatus::Uninitialized,
            EngineState::Loading => EngineStatus::Loading,
            EngineState::Ready(_) => EngineStatus::Ready,
            EngineState::Unavailable(reason) => EngineStatus::Unavailable(reason.clone()),
        }
    }

    /// Resolve the provider, loading it on first call.
    pub fn provider(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        let mut state = self.lock();
        loop {
            match &*state {
                EngineState::Ready(provider) => return Some(Arc::clone(provider)),
                EngineState::Unavailable(_) => return None,
                EngineState::Uninitialized => break,
                EngineState::Loading => {}
            }
            state = self
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        *state = EngineState::Loading;
        drop(state);

        tracing::info!("loading embedding provider");
        let mut guard = LoadGuard {
            engine: self,
            armed: true,
        };
        let loaded = (self.loader)();
        guard.armed = false;

        let mut state = self.lock();
        let provider = match loaded {
            Ok(provider) => {
                tracing::info!(dims = provider.dimensions(), "embedding provider ready");
                *state = EngineState::Ready(Arc::clone(&provider));
                Some(provider)
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding unavailable; vector memory disabled");
                *state = EngineState::Unavailable(e.to_string());
                None
            }
        };
        self.settled.notify_all();
        provider
    }

    /// `true` once the provider is loaded. Triggers the load if needed.
    pub fn is_available(&self) -> bool {
        self.provider().is_some()
    }

    /// Embed `text`, or `None` when the engine is unavailable or the call fails.
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let provider = self.provider()?;
        match provider.embed(text) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!(error = %e, "embedding call failed");
                None
            }
        }
    }
}

/// Settles a `Loading` engine as unavailable if the loader unwinds, so
/// waiters are released instead of blocking forever.
struct LoadGuard<'a> {
    engine: &'a EmbeddingEngine,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!("embedding loader panicked; vector memory disabled");
            *self.engine.lock() = EngineState::Unavailable("embedding loader panicked".into());
            self.engine.settled.notify_all();
        }
    }
}

static SHARED_ENGINE: OnceLock<Arc<EmbeddingEngine>> = OnceLock::new();

/// The process-wide engine. The first caller's config wins; later calls
/// return the same instance.
pub fn shared_engine(config: &EmbeddingConfig) -> Arc<EmbeddingEngine> {
    Arc::clone(SHARED_ENGINE.get_or_init(|| Arc::new(EmbeddingEngine::from_config(config))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConstantProvider;

    impl EmbeddingProvider for ConstantProvider {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; EMBEDDING_DIM];
            v[0] = 1.0;
            Ok(v)
        }
    }

    #[test]
    fn engine_starts_uninitialized_and_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let engine = EmbeddingEngine::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ConstantProvider) as Arc<dyn EmbeddingProvider>)
        });

        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert!(engine.embed("hello").is_some());
        assert!(engine.embed("again").is_some());
        assert_eq!(engine.status(), EngineStatus::Ready);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_never_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let engine = EmbeddingEngine::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("model files missing")
        });

        assert!(engine.embed("a").is_none());
        assert!(engine.embed("b").is_none());
        assert!(!engine.is_available());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            engine.status(),
            EngineStatus::Unavailable("model files missing".into())
        );
    }

    #[test]
    fn concurrent_first_access_runs_loader_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let engine = Arc::new(EmbeddingEngine::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok(Arc::new(ConstantProvider) as Arc<dyn EmbeddingProvider>)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.is_available())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_loader_settles_as_unavailable() {
        let engine = Arc::new(EmbeddingEngine::new(|| -> Result<Arc<dyn EmbeddingProvider>> {
            panic!("onnx runtime exploded")
        }));

        let first = Arc::clone(&engine);
        assert!(std::thread::spawn(move || first.embed("a")).join().is_err());
        assert_eq!(
            engine.status(),
            EngineStatus::Unavailable("embedding loader panicked".into())
        );

        // Later callers return immediately instead of waiting on the condvar.
        let (tx, rx) = std::sync::mpsc::channel();
        let second = Arc::clone(&engine);
        std::thread::spawn(move || tx.send(second.embed("b")).ok());
        let result = rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn disabled_provider_is_an_error() {
        let config = EmbeddingConfig {
            provider: "none".into(),
            ..EmbeddingConfig::default()
        };
        assert!(create_provider(&config).is_err());

        let engine = EmbeddingEngine::from_config(&config);
        assert!(!engine.is_available());
    }
}
