//! Grounding configuration.
//!
//! Selects the similarity backend once, when a resolver is constructed, and
//! carries the ranking knobs the backends read. Values come from defaults,
//! environment variables, or CLI flags layered on top.

use serde::{Deserialize, Serialize};

use crate::pipeline::grounding::GroundingError;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Enum with `as_str` and a `FromStr` that reports a configuration error.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = GroundingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($s => Ok(Self::$variant)),+,
                    other => Err(GroundingError::Config(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(IndexBackend {
    Lexical => "lexical",
    Embedding => "embedding",
});

str_enum!(LexicalOrdering {
    StoreOrder => "store_order",
    SharedTokens => "shared_tokens",
});

/// Environment variable names read by [`GroundingConfig::from_env`].
pub const ENV_INDEX_BACKEND: &str = "GROUNDCITE_INDEX_BACKEND";
pub const ENV_LEXICAL_ORDERING: &str = "GROUNDCITE_LEXICAL_ORDERING";
pub const ENV_TOP_K: &str = "GROUNDCITE_TOP_K";
pub const ENV_MIN_SCORE: &str = "GROUNDCITE_MIN_SCORE";

/// Matches kept per embedding query, the retriever default of the
/// upstream extraction service.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingConfig {
    pub backend: IndexBackend,
    /// Lexical backend only.
    pub lexical_ordering: LexicalOrdering,
    /// Embedding backend only: maximum matches per query.
    pub top_k: usize,
    /// Embedding backend only: matches must score strictly above this.
    pub min_score: f32,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Lexical,
            lexical_ordering: LexicalOrdering::SharedTokens,
            top_k: DEFAULT_TOP_K,
            min_score: 0.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl GroundingConfig {
    /// Defaults overridden by `GROUNDCITE_*` environment variables.
    pub fn from_env() -> Result<Self, GroundingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GroundingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_INDEX_BACKEND) {
            config.backend = v.parse()?;
        }
        if let Some(v) = lookup(ENV_LEXICAL_ORDERING) {
            config.lexical_ordering = v.parse()?;
        }
        if let Some(v) = lookup(ENV_TOP_K) {
            config.top_k = v.trim().parse().map_err(|_| {
                GroundingError::Config(format!("{ENV_TOP_K} must be a positive integer, got '{v}'"))
            })?;
        }
        if let Some(v) = lookup(ENV_MIN_SCORE) {
            config.min_score = v.trim().parse().map_err(|_| {
                GroundingError::Config(format!("{ENV_MIN_SCORE} must be a number, got '{v}'"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GroundingError> {
        if self.top_k == 0 {
            return Err(GroundingError::Config("top_k must be at least 1".into()));
        }
        if !self.min_score.is_finite() {
            return Err(GroundingError::Config("min_score must be finite".into()));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
