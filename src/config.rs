//! Rule settings loaded from the environment or from JSON.
//!
//! Only the plain switches of [`Rules`] are configurable this way; resolvers,
//! selectors and observers are code and stay in the builder.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};
use crate::registration::IfAlreadyRegistered;
use crate::rules::Rules;

/// Prefix used by [`RulesConfig::from_env`].
pub const ENV_PREFIX: &str = "FERROUS_RESOLVER";

/// Serializable subset of [`Rules`].
///
/// # Examples
///
/// ```rust
/// use ferrous_resolver::{IfAlreadyRegistered, Rules, RulesConfig};
///
/// let config = RulesConfig {
///     default_if_already_registered: IfAlreadyRegistered::Replace,
///     ..RulesConfig::default()
/// };
/// let rules = config.apply(&Rules::default());
/// assert_eq!(rules.default_if_already_registered(), IfAlreadyRegistered::Replace);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RulesConfig {
    pub default_if_already_registered: IfAlreadyRegistered,
    pub throw_on_registering_disposable_transient: bool,
    pub track_disposable_transients: bool,
    pub eager_caching_singletons: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self::from_rules(&Rules::default())
    }
}

impl RulesConfig {
    /// Captures the switches of existing rules.
    pub fn from_rules(rules: &Rules) -> Self {
        Self {
            default_if_already_registered: rules.default_if_already_registered(),
            throw_on_registering_disposable_transient: rules.throw_on_registering_disposable_transient(),
            track_disposable_transients: rules.track_disposable_transients(),
            eager_caching_singletons: rules.eager_caching_singletons(),
        }
    }

    /// Reads `FERROUS_RESOLVER_*` variables; unset variables keep defaults.
    pub fn from_env() -> DiResult<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Reads `<PREFIX>_DEFAULT_IF_ALREADY_REGISTERED`,
    /// `<PREFIX>_THROW_ON_REGISTERING_DISPOSABLE_TRANSIENT`,
    /// `<PREFIX>_TRACK_DISPOSABLE_TRANSIENTS` and
    /// `<PREFIX>_EAGER_CACHING_SINGLETONS`.
    pub fn from_env_with_prefix(prefix: &str) -> DiResult<Self> {
        let mut config = Self::default();
        let prefix = prefix.to_uppercase();

        if let Some(value) = var(&prefix, "DEFAULT_IF_ALREADY_REGISTERED") {
            config.default_if_already_registered = value.parse().map_err(|message| DiError::InvalidConfiguration {
                name: format!("{}_DEFAULT_IF_ALREADY_REGISTERED", prefix),
                message,
            })?;
        }
        if let Some(flag) = flag(&prefix, "THROW_ON_REGISTERING_DISPOSABLE_TRANSIENT")? {
            config.throw_on_registering_disposable_transient = flag;
        }
        if let Some(flag) = flag(&prefix, "TRACK_DISPOSABLE_TRANSIENTS")? {
            config.track_disposable_transients = flag;
        }
        if let Some(flag) = flag(&prefix, "EAGER_CACHING_SINGLETONS")? {
            config.eager_caching_singletons = flag;
        }

        tracing::debug!(?config, prefix = %prefix, "rules configuration loaded from environment");
        Ok(config)
    }

    /// Parses a JSON object; missing fields keep defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::InvalidConfiguration {
            name: "json".to_string(),
            message: e.to_string(),
        })
    }

    #[cfg(feature = "config")]
    pub fn to_json(&self) -> DiResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiError::InvalidConfiguration {
            name: "json".to_string(),
            message: e.to_string(),
        })
    }

    /// Copy of `rules` with these switches applied.
    pub fn apply(&self, rules: &Rules) -> Rules {
        let rules = rules.with_default_if_already_registered(self.default_if_already_registered);
        let rules = if self.throw_on_registering_disposable_transient {
            rules.with_throw_on_registering_disposable_transient()
        } else {
            rules.without_throw_on_registering_disposable_transient()
        };
        let rules = if self.track_disposable_transients {
            rules.with_tracking_disposable_transients()
        } else {
            rules.without_tracking_disposable_transients()
        };
        if self.eager_caching_singletons {
            rules.with_eager_caching_singletons()
        } else {
            rules.without_eager_caching_singletons()
        }
    }
}

impl Rules {
    /// Default rules with `config` applied.
    pub fn from_config(config: &RulesConfig) -> Self {
        config.apply(&Rules::default())
    }
}

fn var(prefix: &str, name: &str) -> Option<String> {
    env::var(format!("{}_{}", prefix, name)).ok()
}

fn flag(prefix: &str, name: &str) -> DiResult<Option<bool>> {
    let Some(value) = var(prefix, name) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(DiError::InvalidConfiguration {
            name: format!("{}_{}", prefix, name),
            message: format!("expected a boolean, got '{}'", value),
        }),
    }
}
