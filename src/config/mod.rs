pub(crate) mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use std::path::Path;

impl Default for Config {
    fn default() -> Self {
        Self {
            version: defaults::default_version(),
            route: RouteConfig::default(),
            plan: PlanConfig::default(),
            retrieve: RetrieveConfig::default(),
            synthesize: SynthesizeConfig::default(),
            validate: ValidateConfig::default(),
            caches: CachesConfig::default(),
            retry: crate::retry::RetryPolicy::default(),
            timeouts: TimeoutsConfig::default(),
            extraction: ExtractionConfig::default(),
            generator: GeneratorConfig::default(),
            corpus: None,
        }
    }
}

impl Config {
    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieve.strategies.is_empty() {
            return Err(ConfigError::NoStrategiesEnabled);
        }

        let mut seen = std::collections::HashSet::new();
        for strategy in &self.retrieve.strategies {
            if !seen.insert(strategy) {
                return Err(ConfigError::InvalidValue {
                    field: "retrieve.strategies",
                    reason: format!("duplicate strategy '{}'", strategy),
                });
            }
        }

        if self.retrieve.top_k == 0 || self.retrieve.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieve.top_k",
                reason: "top_k and max_results must be at least 1".into(),
            });
        }

        if self.retrieve.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieve.concurrency",
                reason: "must be at least 1".into(),
            });
        }

        if self.retrieve.semantic_weight <= 0.0 || self.retrieve.lexical_weight <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieve.semantic_weight",
                reason: "strategy weights must be positive".into(),
            });
        }

        if self.retrieve.rrf_k <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieve.rrf_k",
                reason: "must be positive".into(),
            });
        }

        if self.plan.expansions == 0 || self.plan.max_queries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "plan.expansions",
                reason: "expansions and max_queries must be at least 1".into(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts",
                reason: "must be at least 1".into(),
            });
        }

        if self.synthesize.max_context_chars > crate::state::MAX_CONTEXT_CHARS {
            return Err(ConfigError::InvalidValue {
                field: "synthesize.max_context_chars",
                reason: format!("must not exceed {}", crate::state::MAX_CONTEXT_CHARS),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn load_applies_defaults_for_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "retrieve:\n  strategies: [lexical]\n  top_k: 5\nplan:\n  use_hyde: false"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.retrieve.strategies, vec![StrategyKind::Lexical]);
        assert_eq!(config.retrieve.top_k, 5);
        assert!(!config.plan.use_hyde);
        // Untouched sections keep defaults.
        assert_eq!(config.retrieve.rrf_k, 60.0);
        assert_eq!(config.validate.min_docs, 2);
        assert_eq!(config.caches.embedding.capacity, 100);
    }

    #[test]
    fn empty_strategies_are_rejected() {
        let mut config = Config::default();
        config.retrieve.strategies.clear();
        assert!(matches!(
            config.validate(),
            Err(crate::error::ConfigError::NoStrategiesEnabled)
        ));
    }

    #[test]
    fn duplicate_strategies_are_rejected() {
        let mut config = Config::default();
        config.retrieve.strategies = vec![StrategyKind::Lexical, StrategyKind::Lexical];
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_weight_is_rejected() {
        let mut config = Config::default();
        config.retrieve.lexical_weight = 0.0;
        assert!(config.validate().is_err());
    }
}
