use crate::api::{ApiConfig, DEFAULT_API_BASE_URL};
use crate::chat::{ChatConfig, DEFAULT_SOCKET_URL};
use crate::db::Database;
use serde::Serialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Keys accepted by the settings table.
pub const SETTING_KEYS: &[&str] = &[
    "api_base_url",
    "socket_url",
    "typing_timeout_secs",
    "reconnect_attempts",
    "reconnect_delay_ms",
    "connect_timeout_ms",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub socket_url: String,
    pub typing_timeout: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            typing_timeout: Duration::from_secs(5),
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Stored settings over defaults. Unparseable numbers fall back to the
    /// default with a warning.
    pub fn load(db: &Database) -> rusqlite::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_base_url: db
                .get_setting("api_base_url")?
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.api_base_url),
            socket_url: db
                .get_setting("socket_url")?
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.socket_url),
            typing_timeout: number(db, "typing_timeout_secs")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.typing_timeout),
            reconnect_attempts: number(db, "reconnect_attempts")?
                .unwrap_or(defaults.reconnect_attempts),
            reconnect_delay: number(db, "reconnect_delay_ms")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_delay),
            connect_timeout: number(db, "connect_timeout_ms")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
        })
    }

    pub fn api_config(&self, token: Option<String>) -> ApiConfig {
        ApiConfig {
            base_url: self.api_base_url.clone(),
            token,
        }
    }

    pub fn chat_config(&self, user_id: &str, conversation_id: &str) -> ChatConfig {
        ChatConfig {
            typing_timeout: self.typing_timeout,
            reconnect_attempts: self.reconnect_attempts,
            reconnect_delay: self.reconnect_delay,
            connect_timeout: self.connect_timeout,
            ..ChatConfig::new(self.socket_url.clone(), user_id, conversation_id)
        }
    }
}

fn number<T: FromStr>(db: &Database, key: &str) -> rusqlite::Result<Option<T>> {
    Ok(db.get_setting(key)?.and_then(|raw| match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid numeric setting");
            None
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(ClientConfig::load(&db).unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("socket_url", "wss://learn.example/ws").unwrap();
        db.set_setting("reconnect_attempts", "2").unwrap();
        db.set_setting("typing_timeout_secs", "soon").unwrap();
        db.set_setting("connect_timeout_ms", "250").unwrap();
        let config = ClientConfig::load(&db).unwrap();
        assert_eq!(config.socket_url, "wss://learn.example/ws");
        assert_eq!(config.reconnect_attempts, 2);
        assert_eq!(config.typing_timeout, Duration::from_secs(5));

        let chat = config.chat_config("u1", "c1");
        assert_eq!(chat.socket_url, "wss://learn.example/ws");
        assert_eq!(chat.reconnect_attempts, 2);
        assert_eq!(chat.conversation_id, "c1");
        assert_eq!(chat.connect_timeout, Duration::from_millis(250));
    }
}
