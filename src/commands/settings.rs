use crate::config::{ClientConfig, SETTING_KEYS};
use crate::error::AppError;
use crate::AppState;
use std::collections::HashMap;

pub fn get_settings(state: &AppState) -> Result<HashMap<String, String>, AppError> {
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = state.db.get_setting(key)? {
            map.insert(key.to_string(), value);
        }
    }
    Ok(map)
}

pub fn set_setting(state: &AppState, key: &str, value: &str) -> Result<(), AppError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(AppError::Invalid(format!("Unknown setting key: {}", key)));
    }
    if key.ends_with("_url") {
        url::Url::parse(value)
            .map_err(|e| AppError::Invalid(format!("Invalid URL for {}: {}", key, e)))?;
    }
    state.db.set_setting(key, value)?;
    Ok(())
}

pub fn delete_setting(state: &AppState, key: &str) -> Result<(), AppError> {
    state.db.delete_setting(key)?;
    Ok(())
}

/// Settings as the client will actually use them, defaults filled in.
pub fn effective_config(state: &AppState) -> Result<ClientConfig, AppError> {
    state.config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_rejected() {
        let state = AppState::in_memory().unwrap();
        let err = set_setting(&state, "theme", "dark").unwrap_err();
        assert_eq!(err.to_string(), "Unknown setting key: theme");
    }

    #[test]
    fn test_url_settings_validated() {
        let state = AppState::in_memory().unwrap();
        assert!(set_setting(&state, "socket_url", "not a url").is_err());
        set_setting(&state, "socket_url", "wss://learn.example/ws").unwrap();
        set_setting(&state, "reconnect_attempts", "3").unwrap();
        let settings = get_settings(&state).unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(effective_config(&state).unwrap().reconnect_attempts, 3);

        delete_setting(&state, "socket_url").unwrap();
        assert!(!get_settings(&state).unwrap().contains_key("socket_url"));
    }
}
