//! Model identifier resolution and provider credentials.

use std::fmt;

use anyhow::{Result, anyhow};
use serde::Serialize;
use tracing::debug;

use crate::io::config::ProviderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelLimit {
    pub context: u32,
    pub output: u32,
}

pub const DEFAULT_LIMIT: ModelLimit = ModelLimit {
    context: 128_000,
    output: 8_192,
};

/// Static metadata for a known model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ModelMeta {
    id: &'static str,
    reasoning: bool,
    limit: ModelLimit,
}

const BUILTIN_MODELS: &[ModelMeta] = &[
    ModelMeta {
        id: "glm-4.6",
        reasoning: false,
        limit: DEFAULT_LIMIT,
    },
    ModelMeta {
        id: "claude-sonnet-4-5",
        reasoning: true,
        limit: ModelLimit {
            context: 200_000,
            output: 64_000,
        },
    },
    ModelMeta {
        id: "claude-opus-4-1",
        reasoning: true,
        limit: ModelLimit {
            context: 200_000,
            output: 32_000,
        },
    },
];

/// A resolved, callable model.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub reasoning: bool,
    pub limit: ModelLimit,
    #[serde(skip)]
    pub api_key: String,
    pub base_url: Option<String>,
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("id", &self.id)
            .field("reasoning", &self.reasoning)
            .field("limit", &self.limit)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ModelDescriptor {
    /// Builtin metadata for `id`, or default limits for unknown models.
    pub fn with_metadata(id: &str, api_key: String, base_url: Option<String>) -> Self {
        let meta = BUILTIN_MODELS.iter().find(|meta| meta.id == id);
        Self {
            id: id.to_string(),
            reasoning: meta.is_some_and(|meta| meta.reasoning),
            limit: meta.map_or(DEFAULT_LIMIT, |meta| meta.limit),
            api_key,
            base_url,
        }
    }
}

/// Turns a model identifier into a callable descriptor.
pub trait ModelResolver {
    /// Resolve `explicit`, falling back to `fallback`.
    ///
    /// Fails when neither names a model or when credentials are missing.
    fn resolve(&self, explicit: Option<&str>, fallback: Option<&str>) -> Result<ModelDescriptor>;
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolver reading credentials from environment variables.
pub struct EnvModelResolver {
    provider: ProviderConfig,
    lookup: EnvLookup,
}

impl EnvModelResolver {
    pub fn new(provider: ProviderConfig) -> Self {
        Self::with_lookup(provider, |name| std::env::var(name).ok())
    }

    /// Resolver with an injected variable lookup.
    pub fn with_lookup<F>(provider: ProviderConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            provider,
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.trim().is_empty())
    }
}

impl ModelResolver for EnvModelResolver {
    fn resolve(&self, explicit: Option<&str>, fallback: Option<&str>) -> Result<ModelDescriptor> {
        let id = explicit
            .or(fallback)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("a language model must be specified in config or arguments"))?;
        let api_key = self.var(&self.provider.api_key_env).ok_or_else(|| {
            anyhow!(
                "{} is required to call the model '{id}'",
                self.provider.api_key_env
            )
        })?;
        let base_url = self
            .provider
            .base_url_env
            .as_deref()
            .and_then(|name| self.var(name));
        debug!(model = id, base_url = ?base_url, "model resolved");
        Ok(ModelDescriptor::with_metadata(id, api_key, base_url))
    }
}
