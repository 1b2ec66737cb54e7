//! Application-level configuration loading, including the trivia category table.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_BACK_CONFIG_PATH";
const DEFAULT_ANSWER_WINDOW_SECS: u64 = 16;
const DEFAULT_REVEAL_LINGER_SECS: u64 = 3;
const DEFAULT_QUESTION_DIR: &str = "data/questions";
const DEFAULT_SCOREBOARD_ICON: &str =
    "https://raw.githubusercontent.com/MitchellAW/MitchellAW.github.io/master/images/flanders-square.png";

/// Display and source metadata for one trivia category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Stable key used by the command surface (`simpsons`, `futurama`, ...).
    pub key: String,
    /// Name recorded on matches and shown to players.
    pub name: String,
    /// Alternative command names resolving to this category.
    pub aliases: Vec<String>,
    /// Accent color applied to cards (RGB).
    pub color: u32,
    /// Thumbnail shown on question cards.
    pub thumbnail_url: Option<String>,
    /// File name of the question set inside the question directory.
    pub question_file: String,
}

impl Category {
    /// Whether `key` names this category, either directly or through an alias.
    pub fn matches(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
            || self
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(key))
    }
}

/// Per-channel rate limit applied to one command bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRule {
    /// Number of invocations allowed inside the window.
    pub uses: u32,
    /// Sliding window length.
    pub per: Duration,
}

/// Rate limits for the command buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownConfig {
    /// Applied to every trivia start command.
    pub start: CooldownRule,
    /// Applied to the informational stop command.
    pub stop: CooldownRule,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            start: CooldownRule {
                uses: 10,
                per: Duration::from_secs(300),
            },
            stop: CooldownRule {
                uses: 1,
                per: Duration::from_secs(3),
            },
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    answer_window: Duration,
    reveal_linger: Duration,
    question_dir: PathBuf,
    bot_user_id: Option<u64>,
    scoreboard_icon_url: String,
    categories: Vec<Category>,
    cooldowns: CooldownConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        categories = app_config.categories.len(),
                        answer_window_secs = app_config.answer_window.as_secs(),
                        "loaded trivia config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Resolve a category by key or alias (case-insensitive).
    pub fn category(&self, key: &str) -> Option<&Category> {
        let key = key.trim();
        self.categories.iter().find(|category| category.matches(key))
    }

    /// Every configured category, in configuration order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Fixed duration of every answer window.
    pub fn answer_window(&self) -> Duration {
        self.answer_window
    }

    /// How long question and reveal cards stay visible (window plus linger).
    pub fn card_lifetime(&self) -> Duration {
        self.answer_window + self.reveal_linger
    }

    /// Directory holding the category question files.
    pub fn question_dir(&self) -> &PathBuf {
        &self.question_dir
    }

    /// The bot's own user id, when known.
    pub fn bot_user_id(&self) -> Option<u64> {
        self.bot_user_id
    }

    /// Icon shown on scoreboard and leaderboard cards.
    pub fn scoreboard_icon_url(&self) -> &str {
        &self.scoreboard_icon_url
    }

    /// Command rate limits.
    pub fn cooldowns(&self) -> CooldownConfig {
        self.cooldowns
    }

    /// Override the question directory.
    pub fn with_question_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.question_dir = dir.into();
        self
    }

    /// Override command rate limits.
    pub fn with_cooldowns(mut self, cooldowns: CooldownConfig) -> Self {
        self.cooldowns = cooldowns;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            answer_window: Duration::from_secs(DEFAULT_ANSWER_WINDOW_SECS),
            reveal_linger: Duration::from_secs(DEFAULT_REVEAL_LINGER_SECS),
            question_dir: PathBuf::from(DEFAULT_QUESTION_DIR),
            bot_user_id: None,
            scoreboard_icon_url: DEFAULT_SCOREBOARD_ICON.to_owned(),
            categories: default_categories(),
            cooldowns: CooldownConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    answer_window_secs: Option<u64>,
    #[serde(default)]
    reveal_linger_secs: Option<u64>,
    #[serde(default)]
    question_dir: Option<PathBuf>,
    #[serde(default)]
    bot_user_id: Option<u64>,
    #[serde(default)]
    scoreboard_icon_url: Option<String>,
    #[serde(default)]
    categories: Option<Vec<RawCategory>>,
    #[serde(default)]
    cooldowns: Option<RawCooldowns>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            answer_window: value
                .answer_window_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.answer_window),
            reveal_linger: value
                .reveal_linger_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.reveal_linger),
            question_dir: value.question_dir.unwrap_or(defaults.question_dir),
            bot_user_id: value.bot_user_id,
            scoreboard_icon_url: value
                .scoreboard_icon_url
                .unwrap_or(defaults.scoreboard_icon_url),
            categories: value
                .categories
                .map(|categories| categories.into_iter().map(Into::into).collect())
                .unwrap_or(defaults.categories),
            cooldowns: value
                .cooldowns
                .map(|raw| CooldownConfig {
                    start: raw.start.map(Into::into).unwrap_or(defaults.cooldowns.start),
                    stop: raw.stop.map(Into::into).unwrap_or(defaults.cooldowns.stop),
                })
                .unwrap_or(defaults.cooldowns),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single category entry.
struct RawCategory {
    key: String,
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    color: u32,
    #[serde(default)]
    thumbnail_url: Option<String>,
    question_file: String,
}

impl From<RawCategory> for Category {
    fn from(value: RawCategory) -> Self {
        Self {
            key: value.key,
            name: value.name,
            aliases: value.aliases,
            color: value.color,
            thumbnail_url: value.thumbnail_url,
            question_file: value.question_file,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCooldowns {
    #[serde(default)]
    start: Option<RawCooldownRule>,
    #[serde(default)]
    stop: Option<RawCooldownRule>,
}

#[derive(Debug, Deserialize)]
struct RawCooldownRule {
    uses: u32,
    per_secs: u64,
}

impl From<RawCooldownRule> for CooldownRule {
    fn from(value: RawCooldownRule) -> Self {
        Self {
            uses: value.uses.max(1),
            per: Duration::from_secs(value.per_secs),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in category table shipped with the binary.
fn default_categories() -> Vec<Category> {
    vec![
        Category {
            key: "simpsons".into(),
            name: "simpsons".into(),
            aliases: vec!["strivia".into(), "simpsonstrivia".into(), "simpsontrivia".into()],
            color: 0xFF_D9_0F,
            thumbnail_url: None,
            question_file: "simpsons.json".into(),
        },
        Category {
            key: "futurama".into(),
            name: "futurama".into(),
            aliases: vec!["ftrivia".into(), "futuramatrivia".into()],
            color: 0x6A_9F_D8,
            thumbnail_url: None,
            question_file: "futurama.json".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_lookup_accepts_key_and_alias_case_insensitively() {
        let config = AppConfig::default();
        assert_eq!(config.category("simpsons").map(|c| c.key.as_str()), Some("simpsons"));
        assert_eq!(config.category("STRIVIA").map(|c| c.key.as_str()), Some("simpsons"));
        assert_eq!(config.category(" ftrivia ").map(|c| c.key.as_str()), Some("futurama"));
        assert!(config.category("rickandmorty").is_none());
    }

    #[test]
    fn raw_config_overrides_only_provided_fields() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "answer_window_secs": 5,
                "cooldowns": { "stop": { "uses": 2, "per_secs": 10 } }
            }"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();

        assert_eq!(config.answer_window(), Duration::from_secs(5));
        assert_eq!(config.card_lifetime(), Duration::from_secs(8));
        assert_eq!(config.cooldowns().start, CooldownConfig::default().start);
        assert_eq!(
            config.cooldowns().stop,
            CooldownRule {
                uses: 2,
                per: Duration::from_secs(10)
            }
        );
        assert_eq!(config.categories().len(), 2);
    }

    #[test]
    fn zero_answer_window_falls_back_to_default() {
        let raw: RawConfig = serde_json::from_str(r#"{ "answer_window_secs": 0 }"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(
            config.answer_window(),
            Duration::from_secs(DEFAULT_ANSWER_WINDOW_SECS)
        );
    }
}
