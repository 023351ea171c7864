//! Static model catalog, keyed by provider.
//!
//! Not backed by a store: the set of models a provider exposes is build-time
//! configuration, not session state, so it's compiled in rather than given
//! its own table the way `relay-storage` would model actual rows.

use serde::{Deserialize, Serialize};

/// A single selectable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Provider key, e.g. `"anthropic"`.
    pub provider: String,
    /// Model id within that provider, e.g. `"claude-opus-4"`.
    pub id: String,
    /// Display label for client UIs.
    pub display_name: String,
}

fn model(provider: &str, id: &str, display_name: &str) -> ModelInfo {
    ModelInfo {
        provider: provider.to_string(),
        id: id.to_string(),
        display_name: display_name.to_string(),
    }
}

/// The full static catalog across every known provider.
#[must_use]
pub fn all_models() -> Vec<ModelInfo> {
    let mut models = for_provider("anthropic");
    models.extend(for_provider("openai"));
    models
}

/// The catalog for a single provider key. Empty if the provider is unknown.
#[must_use]
pub fn for_provider(provider: &str) -> Vec<ModelInfo> {
    match provider {
        "anthropic" => vec![
            model("anthropic", "claude-opus-4", "Claude Opus 4"),
            model("anthropic", "claude-sonnet-4", "Claude Sonnet 4"),
            model("anthropic", "claude-haiku-4", "Claude Haiku 4"),
        ],
        "openai" => vec![model("openai", "gpt-5", "GPT-5"), model("openai", "gpt-5-mini", "GPT-5 Mini")],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_returns_empty() {
        assert!(for_provider("does-not-exist").is_empty());
    }

    #[test]
    fn all_models_covers_every_known_provider() {
        let all = all_models();
        assert!(all.iter().any(|m| m.provider == "anthropic"));
        assert!(all.iter().any(|m| m.provider == "openai"));
    }
}
