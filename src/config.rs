use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use teloxide::types::ChatId;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} is required")]
    Missing(&'static str),
    /// A variable is set to something unusable.
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid { name: &'static str, value: String, reason: String },
}

/// Where the bot reports its weather.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
}

impl Default for WeatherLocation {
    fn default() -> Self {
        Self { latitude: 55.7558, longitude: 37.6173, city: "Москва".to_string() }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    /// OpenRouter key; without it the estimator skips the remote tier and `/ask` is off.
    pub openrouter_api_key: Option<String>,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    /// Chat receiving WARN/ERROR alerts.
    pub log_chat_id: Option<ChatId>,
    /// Timezone that defines calendar days of the diary.
    pub timezone: Tz,
    pub llm_timeout: Duration,
    pub weather: WeatherLocation,
}

impl Config {
    /// Load from the process environment (after an optional `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_bot_token = var("TELEGRAM_BOT_TOKEN")
            .or_else(|| var("TOKEN"))
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        match telegram_bot_token.split_once(':') {
            Some((id, secret)) if id.parse::<u64>().is_ok() && !secret.is_empty() && !secret.contains(':') => {}
            _ => {
                return Err(ConfigError::Invalid {
                    name: "TELEGRAM_BOT_TOKEN",
                    value: "<hidden>".into(),
                    reason: "expected format 123456789:ABCdefGHI...".into(),
                });
            }
        }

        let timezone = match var("BOT_TIMEZONE") {
            Some(name) => Tz::from_str(&name).map_err(|e| ConfigError::Invalid {
                name: "BOT_TIMEZONE",
                value: name.clone(),
                reason: e.to_string(),
            })?,
            None => chrono_tz::Europe::Moscow,
        };

        let llm_timeout = Duration::from_secs(parse_or("LLM_TIMEOUT_SECS", var("LLM_TIMEOUT_SECS"), 15u64)?);
        if llm_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "LLM_TIMEOUT_SECS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let defaults = WeatherLocation::default();
        let weather = WeatherLocation {
            latitude: parse_or("WEATHER_LATITUDE", var("WEATHER_LATITUDE"), defaults.latitude)?,
            longitude: parse_or("WEATHER_LONGITUDE", var("WEATHER_LONGITUDE"), defaults.longitude)?,
            city: var("WEATHER_CITY").unwrap_or(defaults.city),
        };

        let log_chat_id = var("LOG_CHAT_ID")
            .map(|raw| parse_or("LOG_CHAT_ID", Some(raw), 0i64).map(ChatId))
            .transpose()?;

        Ok(Self {
            telegram_bot_token,
            openrouter_api_key: var("OPENROUTER_API_KEY"),
            database_path: var("DATABASE_PATH").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data/diary.db")),
            log_dir: var("LOG_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data/logs")),
            log_chat_id,
            timezone,
            llm_timeout,
            weather,
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid { name, reason: e.to_string(), value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TOKEN: &str = "123456789:ABCdefGHIjklMNOpqrsTUVwxyz";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    fn assert_err(result: Result<Config, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("Expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("TELEGRAM_BOT_TOKEN", TOKEN)]).unwrap();
        assert_eq!(config.telegram_bot_token, TOKEN);
        assert!(config.openrouter_api_key.is_none());
        assert_eq!(config.database_path, PathBuf::from("data/diary.db"));
        assert_eq!(config.log_dir, PathBuf::from("data/logs"));
        assert!(config.log_chat_id.is_none());
        assert_eq!(config.timezone, chrono_tz::Europe::Moscow);
        assert_eq!(config.llm_timeout, Duration::from_secs(15));
        assert_eq!(config.weather, WeatherLocation::default());
    }

    #[test]
    fn test_token_alias() {
        let config = load(&[("TOKEN", TOKEN)]).unwrap();
        assert_eq!(config.telegram_bot_token, TOKEN);
    }

    #[test]
    fn test_missing_token() {
        let err = assert_err(load(&[("TELEGRAM_BOT_TOKEN", "  ")]));
        assert!(matches!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN")));
    }

    #[test]
    fn test_invalid_token_format() {
        for token in ["no-colon", "abc:secret", "123:", "1:2:3"] {
            let err = assert_err(load(&[("TELEGRAM_BOT_TOKEN", token)]));
            assert!(matches!(err, ConfigError::Invalid { name: "TELEGRAM_BOT_TOKEN", .. }), "{token}");
        }
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("TELEGRAM_BOT_TOKEN", TOKEN),
            ("OPENROUTER_API_KEY", "sk-or-test"),
            ("DATABASE_PATH", "/tmp/x.db"),
            ("LOG_CHAT_ID", "-100123"),
            ("BOT_TIMEZONE", "Asia/Yekaterinburg"),
            ("LLM_TIMEOUT_SECS", "30"),
            ("WEATHER_CITY", "Казань"),
            ("WEATHER_LATITUDE", "55.79"),
            ("WEATHER_LONGITUDE", "49.12"),
        ])
        .unwrap();
        assert_eq!(config.openrouter_api_key.as_deref(), Some("sk-or-test"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.log_chat_id, Some(ChatId(-100123)));
        assert_eq!(config.timezone, chrono_tz::Asia::Yekaterinburg);
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert_eq!(config.weather.city, "Казань");
        assert_eq!(config.weather.latitude, 55.79);
    }

    #[test]
    fn test_invalid_values() {
        let err = assert_err(load(&[("TELEGRAM_BOT_TOKEN", TOKEN), ("BOT_TIMEZONE", "Mars/Base")]));
        assert!(matches!(err, ConfigError::Invalid { name: "BOT_TIMEZONE", .. }));

        let err = assert_err(load(&[("TELEGRAM_BOT_TOKEN", TOKEN), ("LLM_TIMEOUT_SECS", "0")]));
        assert!(matches!(err, ConfigError::Invalid { name: "LLM_TIMEOUT_SECS", .. }));

        let err = assert_err(load(&[("TELEGRAM_BOT_TOKEN", TOKEN), ("LOG_CHAT_ID", "chat")]));
        assert!(matches!(err, ConfigError::Invalid { name: "LOG_CHAT_ID", .. }));
    }
}
