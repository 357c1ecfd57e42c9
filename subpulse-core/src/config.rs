use crate::{
    CategoryRule, ConfigError, CoreError, Taxonomy, AUTO_REFRESH_THRESHOLD_SECS,
    REFETCH_THRESHOLD_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const DATABASE_URL_ENV: &str = "SUBPULSE_DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Tokens available per interval.
    pub limit: u64,
    /// Estimated tokens spent classifying one post.
    pub cost_per_post: u64,
    pub interval_secs: u64,
    /// Upper bound on a single wait while the budget is exhausted.
    pub max_backoff_ms: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            limit: 200_000,
            cost_per_post: 1_500,
            interval_secs: 60,
            max_backoff_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub user_agent: String,
    pub database_url: String,
    pub post_limit: u32,
    pub keyword_limit: usize,
    pub refetch_threshold_secs: i64,
    pub auto_refresh_threshold_secs: i64,
    pub auto_refresh_interval_secs: u64,
    pub budget: BudgetConfig,
    pub taxonomy: Vec<CategoryRule>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: "subpulse/0.1.0".to_string(),
            database_url: "sqlite://subpulse.db".to_string(),
            post_limit: 100,
            keyword_limit: 10,
            refetch_threshold_secs: REFETCH_THRESHOLD_SECS,
            auto_refresh_threshold_secs: AUTO_REFRESH_THRESHOLD_SECS,
            auto_refresh_interval_secs: 300,
            budget: BudgetConfig::default(),
            taxonomy: Taxonomy::default_rules(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        let config: AppConfig = toml::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env_overrides();
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` when given, otherwise falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CoreError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                debug!("No configuration file given, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                debug!("Database URL overridden by {}", DATABASE_URL_ENV);
                self.database_url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "user_agent".to_string(),
            }
            .into());
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database_url".to_string(),
            }
            .into());
        }
        if self.post_limit == 0 {
            return Err(invalid("post_limit", self.post_limit));
        }
        if self.keyword_limit == 0 {
            return Err(invalid("keyword_limit", self.keyword_limit));
        }
        if self.refetch_threshold_secs <= 0 {
            return Err(invalid("refetch_threshold_secs", self.refetch_threshold_secs));
        }
        if self.auto_refresh_threshold_secs <= 0 {
            return Err(invalid(
                "auto_refresh_threshold_secs",
                self.auto_refresh_threshold_secs,
            ));
        }
        if self.auto_refresh_interval_secs == 0 {
            return Err(invalid(
                "auto_refresh_interval_secs",
                self.auto_refresh_interval_secs,
            ));
        }
        if self.budget.limit == 0 || self.budget.interval_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "budget limit and interval must be positive".to_string(),
            }
            .into());
        }
        if self.budget.cost_per_post > self.budget.limit {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "budget cost_per_post ({}) exceeds limit ({})",
                    self.budget.cost_per_post, self.budget.limit
                ),
            }
            .into());
        }

        self.build_taxonomy().map(|_| ())
    }

    pub fn build_taxonomy(&self) -> Result<Taxonomy, CoreError> {
        Taxonomy::new(self.taxonomy.clone())
    }
}

fn invalid(field: &str, value: impl ToString) -> CoreError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.post_limit, 100);
        assert_eq!(config.keyword_limit, 10);
        assert_eq!(config.build_taxonomy().unwrap(), Taxonomy::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            keyword_limit = 5

            [budget]
            limit = 3000
            "#,
        )
        .unwrap();

        assert_eq!(config.keyword_limit, 5);
        assert_eq!(config.budget.limit, 3000);
        assert_eq!(config.budget.cost_per_post, 1_500);
        assert_eq!(config.taxonomy, Taxonomy::default_rules());
    }

    #[test]
    fn test_custom_taxonomy() {
        let config = AppConfig::from_toml_str(
            r#"
            [[taxonomy]]
            name = "Shipping"
            keywords = ["delivery", "tracking number"]

            [[taxonomy]]
            name = "Praise"
            keywords = ["thank you"]
            "#,
        )
        .unwrap();

        let taxonomy = config.build_taxonomy().unwrap();
        let names: Vec<&str> = taxonomy.category_names().collect();
        assert_eq!(names, vec!["Shipping", "Praise"]);
    }

    #[test]
    fn test_misconfigured_taxonomy_is_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
            [[taxonomy]]
            name = "Nothing"
            keywords = []
            "#,
        );
        assert!(matches!(
            result,
            Err(CoreError::TaxonomyMisconfigured { .. })
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            AppConfig::from_toml_str("post_limit = 0"),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[budget]\nlimit = 10\ncost_per_post = 20"),
            Err(CoreError::Config(ConfigError::ValidationFailed { .. }))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("post_limit = \"lots\""),
            Err(CoreError::Config(ConfigError::Parse(_)))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = AppConfig::load(Path::new("/definitely/not/here/subpulse.toml"));
        assert!(matches!(
            result,
            Err(CoreError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
