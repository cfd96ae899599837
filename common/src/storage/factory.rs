//! Backend registry for creating storage backends by name.
//!
//! Every variant is registered under a name together with an async
//! constructor. Callers pick a variant through [`BackendConfig::kind`] and
//! only ever see the resulting `Arc<dyn StorageBackend>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::config::{BackendConfig, IN_MEMORY, SLATEDB};
use super::in_memory::InMemoryBackend;
use super::slate::SlateDbBackend;
use super::{BackendError, BackendResult, StorageBackend};

/// Async constructor producing a backend from its configuration.
pub type BackendConstructor = Arc<
    dyn Fn(BackendConfig) -> BoxFuture<'static, BackendResult<Arc<dyn StorageBackend>>>
        + Send
        + Sync,
>;

/// Named backend constructors.
///
/// # Examples
///
/// ```rust,ignore
/// use common::{BackendConfig, BackendRegistry};
///
/// let registry = BackendRegistry::with_defaults();
/// let backend = registry.create(&BackendConfig::named("in_memory")).await?;
/// backend.raw_command("ping").await?;
/// ```
#[derive(Clone, Default)]
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `in_memory` and `slatedb` variants.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(IN_MEMORY, |config| {
            async move {
                let backend = InMemoryBackend::new(config.downsample_buckets);
                Ok(Arc::new(backend) as Arc<dyn StorageBackend>)
            }
            .boxed()
        });
        registry.register(SLATEDB, |config| {
            async move {
                let backend =
                    SlateDbBackend::open(&config.slatedb, config.downsample_buckets).await?;
                Ok(Arc::new(backend) as Arc<dyn StorageBackend>)
            }
            .boxed()
        });
        registry
    }

    /// Registers a constructor, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(BackendConfig) -> BoxFuture<'static, BackendResult<Arc<dyn StorageBackend>>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Creates the backend selected by `config.kind`.
    pub async fn create(&self, config: &BackendConfig) -> BackendResult<Arc<dyn StorageBackend>> {
        let constructor = self
            .constructors
            .get(&config.kind)
            .ok_or_else(|| BackendError::UnknownBackend(config.kind.clone()))?
            .clone();
        tracing::info!(backend = %config.kind, "Creating storage backend");
        constructor(config.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sample;
    use crate::serde::Batch;
    use async_trait::async_trait;

    struct NamedStub;

    #[async_trait]
    impl StorageBackend for NamedStub {
        fn name(&self) -> &str {
            "stub"
        }

        async fn write_batch(&self, _batch: &Batch) -> BackendResult<()> {
            Ok(())
        }

        async fn read_interval(&self, _: &str, _: i64, _: i64) -> BackendResult<Vec<Sample>> {
            Ok(vec![])
        }

        async fn read_last_in_window(
            &self,
            _: &str,
            _: i64,
            _: i64,
        ) -> BackendResult<Option<Sample>> {
            Ok(None)
        }

        async fn raw_command(&self, _: &str) -> BackendResult<()> {
            Ok(())
        }
    }

    #[test]
    fn should_register_builtin_backends() {
        // given/when
        let registry = BackendRegistry::with_defaults();

        // then
        assert_eq!(registry.names(), vec![IN_MEMORY, SLATEDB]);
    }

    #[tokio::test]
    async fn should_create_backend_selected_by_name() {
        // given
        let registry = BackendRegistry::with_defaults();

        // when
        let in_memory = registry.create(&BackendConfig::named(IN_MEMORY)).await.unwrap();
        let slatedb = registry.create(&BackendConfig::named(SLATEDB)).await.unwrap();

        // then
        assert_eq!(in_memory.name(), IN_MEMORY);
        assert_eq!(slatedb.name(), SLATEDB);
    }

    #[tokio::test]
    async fn should_fail_for_unknown_backend() {
        // given
        let registry = BackendRegistry::with_defaults();

        // when
        let result = registry.create(&BackendConfig::named("kdb")).await;

        // then
        assert_eq!(
            result.err(),
            Some(BackendError::UnknownBackend("kdb".to_string()))
        );
    }

    #[tokio::test]
    async fn should_create_custom_registered_backend() {
        // given
        let mut registry = BackendRegistry::new();
        registry.register("stub", |_| {
            async { Ok(Arc::new(NamedStub) as Arc<dyn StorageBackend>) }.boxed()
        });

        // when
        let backend = registry.create(&BackendConfig::named("stub")).await.unwrap();

        // then
        assert_eq!(backend.name(), "stub");
        assert!(!registry.contains(IN_MEMORY));
    }
}
