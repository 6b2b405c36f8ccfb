//! Ordered provider fallback.
//!
//! A [`FallbackChain`] tries each constructed provider in order, skipping the
//! ones whose availability probe fails and the ones whose call errors or
//! comes back flagged as degraded. When every provider has been tried it
//! runs a network-independent terminal generator, so `execute` always
//! produces a value.

use crate::domain::entities::market::{CompanyInfo, PriceBar, PriceQuote};
use crate::domain::entities::prediction::Prediction;
use crate::domain::error::{ConstructionError, ProviderError};
use crate::domain::ports::chain_provider::{ChainProvider, ProviderDescriptor, ProviderHealth};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lets a provider flag its own result as a fallback that should not count
/// as success.
pub trait ChainResult {
    fn is_degraded(&self) -> bool {
        false
    }
}

impl ChainResult for PriceQuote {}
impl ChainResult for Vec<PriceBar> {}
impl ChainResult for CompanyInfo {}

impl ChainResult for Prediction {
    fn is_degraded(&self) -> bool {
        self.fallback_mode
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureKind {
    /// Availability probe said no; the operation was not attempted.
    Unavailable,
    OperationFailed(String),
    /// The provider answered but flagged its own result as a fallback.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub failure: FailureKind,
}

/// A value plus where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutcome<T> {
    pub value: T,
    pub provider_used: String,
    /// True only when the terminal generator produced the value.
    pub degraded: bool,
    /// Providers that were tried and skipped before `provider_used`.
    pub attempts: Vec<AttemptRecord>,
    /// Served from the cache rather than a live call.
    #[serde(default)]
    pub cached: bool,
}

impl<T> ChainOutcome<T> {
    pub fn from_cache(value: T, provider_used: impl Into<String>) -> Self {
        Self {
            value,
            provider_used: provider_used.into(),
            degraded: false,
            attempts: Vec::new(),
            cached: true,
        }
    }
}

type Factory<P, C> = Box<dyn Fn(&C) -> Result<Arc<P>, ProviderError> + Send + Sync>;

/// Maps provider names to constructors. `C` is the application config; each
/// factory picks its own section out of it.
pub struct ProviderRegistry<P: ?Sized, C> {
    factories: Vec<(String, Factory<P, C>)>,
}

impl<P: ?Sized, C> ProviderRegistry<P, C> {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    pub fn register<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&C) -> Result<Arc<P>, ProviderError> + Send + Sync + 'static,
    {
        self.factories.push((name.to_string(), Box::new(factory)));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn factory(&self, name: &str) -> Option<&Factory<P, C>> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }
}

impl<P: ?Sized, C> Default for ProviderRegistry<P, C> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FallbackChain<P: ?Sized> {
    providers: Vec<Arc<P>>,
    terminal: String,
}

impl<P: ?Sized + ChainProvider> FallbackChain<P> {
    /// Chain over already constructed providers, in order. `terminal` names
    /// the emergency generator for provenance.
    pub fn new(providers: Vec<Arc<P>>, terminal: impl Into<String>) -> Self {
        Self {
            providers,
            terminal: terminal.into(),
        }
    }

    /// Builds every provider named in `chain` eagerly.
    ///
    /// Unknown names and an empty chain are construction errors. A provider
    /// whose factory fails (typically missing credentials) is logged and
    /// left out. The terminal name may appear in the chain; it ends the
    /// chain, and anything listed after it is ignored.
    pub fn build<C>(
        chain: &[String],
        registry: &ProviderRegistry<P, C>,
        config: &C,
        terminal: &str,
    ) -> Result<Self, ConstructionError> {
        if chain.is_empty() {
            return Err(ConstructionError::EmptyChain);
        }

        for name in chain {
            if name != terminal && registry.factory(name).is_none() {
                return Err(ConstructionError::UnknownProvider(name.clone()));
            }
        }

        let mut providers: Vec<Arc<P>> = Vec::new();
        for (position, name) in chain.iter().enumerate() {
            if name == terminal {
                if position + 1 < chain.len() {
                    warn!(
                        terminal = %terminal,
                        ignored = ?&chain[position + 1..],
                        "Providers listed after the terminal tier are never reached"
                    );
                }
                break;
            }
            if providers.iter().any(|p| p.name() == name) {
                warn!(provider = %name, "Duplicate provider in chain, keeping first");
                continue;
            }
            let Some(factory) = registry.factory(name) else {
                continue;
            };
            match factory(config) {
                Ok(provider) => {
                    info!(provider = %name, "Provider initialized");
                    providers.push(provider);
                }
                Err(e) => warn!(provider = %name, error = %e, "Provider skipped"),
            }
        }

        let chain = Self::new(providers, terminal);
        info!(chain = %chain.chain_names().join(" -> "), "Fallback chain ready");
        Ok(chain)
    }

    /// Runs `operation` against each provider in order until one succeeds
    /// with a non-degraded result. Never fails: exhaustion falls through to
    /// `emergency`.
    pub async fn execute<T, F, Fut, E>(&self, label: &str, operation: F, emergency: E) -> ChainOutcome<T>
    where
        T: ChainResult,
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
        E: FnOnce() -> T,
    {
        let mut attempts = Vec::new();

        for provider in &self.providers {
            let name = provider.name().to_string();

            if !provider.is_available().await {
                warn!(provider = %name, operation = label, "Provider not available, trying next");
                attempts.push(AttemptRecord {
                    provider: name,
                    failure: FailureKind::Unavailable,
                });
                continue;
            }

            debug!(provider = %name, operation = label, "Attempting provider");
            match operation(provider.clone()).await {
                Ok(value) if value.is_degraded() => {
                    warn!(provider = %name, operation = label, "Provider returned a fallback result, trying next");
                    attempts.push(AttemptRecord {
                        provider: name,
                        failure: FailureKind::Degraded,
                    });
                }
                Ok(value) => {
                    info!(provider = %name, operation = label, "Provider succeeded");
                    return ChainOutcome {
                        value,
                        provider_used: name,
                        degraded: false,
                        attempts,
                        cached: false,
                    };
                }
                Err(e) => {
                    warn!(provider = %name, operation = label, error = %e, "Provider failed, trying next");
                    attempts.push(AttemptRecord {
                        provider: name,
                        failure: FailureKind::OperationFailed(e.to_string()),
                    });
                }
            }
        }

        error!(
            operation = label,
            terminal = %self.terminal,
            tried = attempts.len(),
            "All providers failed, using terminal fallback"
        );
        ChainOutcome {
            value: emergency(),
            provider_used: self.terminal.clone(),
            degraded: true,
            attempts,
            cached: false,
        }
    }

    /// Provider names in order, terminal last.
    pub fn chain_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.name().to_string())
            .chain(std::iter::once(self.terminal.clone()))
            .collect()
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    pub fn providers(&self) -> &[Arc<P>] {
        &self.providers
    }

    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.providers.iter().map(|p| p.descriptor()).collect()
    }

    /// Names of the providers whose probe currently succeeds.
    pub async fn available_providers(&self) -> Vec<String> {
        let mut available = Vec::new();
        for provider in &self.providers {
            if provider.is_available().await {
                available.push(provider.name().to_string());
            }
        }
        available
    }

    pub async fn health_check_all(&self) -> Vec<ProviderHealth> {
        let mut report = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            report.push(provider.health_check().await);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::chain_provider::Capability;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Stub {
        name: &'static str,
        available: bool,
        fails: bool,
        calls: AtomicUsize,
    }

    impl Stub {
        fn new(name: &'static str, available: bool, fails: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                available,
                fails,
                calls: AtomicUsize::new(0),
            })
        }

        fn answer(&self) -> Result<u32, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fails {
                Err(ProviderError::failed(self.name, "boom"))
            } else {
                Ok(7)
            }
        }
    }

    impl ChainResult for u32 {}

    #[async_trait::async_trait]
    impl ChainProvider for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn capabilities(&self) -> Vec<Capability> {
            vec![Capability::Price, Capability::Probe]
        }
        async fn is_available(&self) -> bool {
            self.available
        }
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let a = Stub::new("a", true, false);
        let b = Stub::new("b", true, false);
        let chain = FallbackChain::new(vec![a.clone(), b.clone()], "mock");

        let outcome = chain.execute("test", |p| async move { p.answer() }, || 0).await;

        assert_eq!(outcome.provider_used, "a");
        assert!(!outcome.degraded);
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_is_not_invoked() {
        let a = Stub::new("a", false, false);
        let b = Stub::new("b", true, false);
        let chain = FallbackChain::new(vec![a.clone(), b.clone()], "mock");

        let outcome = chain.execute("test", |p| async move { p.answer() }, || 0).await;

        assert_eq!(outcome.provider_used, "b");
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.attempts[0].failure, FailureKind::Unavailable);
    }

    #[tokio::test]
    async fn test_empty_provider_list_goes_straight_to_terminal() {
        let chain: FallbackChain<Stub> = FallbackChain::new(vec![], "emergency_rules");
        let outcome = chain.execute("test", |p| async move { p.answer() }, || 42).await;
        assert_eq!(outcome.value, 42);
        assert_eq!(outcome.provider_used, "emergency_rules");
        assert!(outcome.degraded);
        assert!(outcome.attempts.is_empty());
    }

    #[test]
    fn test_build_rejects_empty_and_unknown() {
        let registry: ProviderRegistry<Stub, ()> =
            ProviderRegistry::new().register("a", |_| Ok(Stub::new("a", true, false)));

        assert_eq!(
            FallbackChain::build(&[], &registry, &(), "mock").err(),
            Some(ConstructionError::EmptyChain)
        );
        assert_eq!(
            FallbackChain::build(&["a".into(), "zzz".into()], &registry, &(), "mock").err(),
            Some(ConstructionError::UnknownProvider("zzz".into()))
        );
    }

    #[test]
    fn test_build_skips_providers_without_credentials() {
        let registry: ProviderRegistry<Stub, ()> = ProviderRegistry::new()
            .register("a", |_| {
                Err(ProviderError::MissingCredentials {
                    provider: "a".into(),
                    missing: "A_KEY".into(),
                })
            })
            .register("b", |_| Ok(Stub::new("b", true, false)));

        let chain = FallbackChain::build(&["a".into(), "b".into()], &registry, &(), "mock").unwrap();
        assert_eq!(chain.chain_names(), vec!["b", "mock"]);
    }

    #[test]
    fn test_terminal_name_ends_the_chain() {
        let registry: ProviderRegistry<Stub, ()> = ProviderRegistry::new()
            .register("a", |_| Ok(Stub::new("a", true, false)))
            .register("b", |_| Ok(Stub::new("b", true, false)));

        let names: Vec<String> = vec!["a".into(), "mock".into(), "b".into()];
        let chain = FallbackChain::build(&names, &registry, &(), "mock").unwrap();
        assert_eq!(chain.chain_names(), vec!["a", "mock"]);
    }
}
