use crate::db::models::Session;
use crate::error::AppError;
use crate::AppState;
use tracing::info;

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<Session, AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Invalid("Email and password are required".into()));
    }
    let auth = state.api()?.login(email.trim(), password).await?;
    let session = state.db.save_session(
        &auth.user_id,
        &auth.access_token,
        auth.refresh_token.as_deref(),
    )?;
    info!(user = %session.user_id, "signed in");
    Ok(session)
}

/// Swaps the stored refresh token for a new access token.
pub async fn refresh_session(state: &AppState) -> Result<Session, AppError> {
    let current = state.db.load_session()?.ok_or(AppError::NotSignedIn)?;
    let refresh_token = current.refresh_token.ok_or(AppError::NotSignedIn)?;
    let auth = state.api()?.refresh(&refresh_token).await?;
    let session = state.db.save_session(
        &auth.user_id,
        &auth.access_token,
        auth.refresh_token.as_deref().or(Some(refresh_token.as_str())),
    )?;
    Ok(session)
}

/// Drops the session, the open chat, and the per-user caches.
pub async fn logout(state: &AppState) -> Result<(), AppError> {
    super::chat::close_chat(state).await;
    state.db.clear_session()?;
    state.db.clear_cart()?;
    state.db.clear_purchases()?;
    info!("signed out");
    Ok(())
}

pub fn current_session(state: &AppState) -> Result<Option<Session>, AppError> {
    Ok(state.db.load_session()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_validates_input_locally() {
        let state = AppState::in_memory().unwrap();
        assert!(matches!(
            login(&state, "  ", "pw").await,
            Err(AppError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_clears_local_state() {
        let state = AppState::in_memory().unwrap();
        state.db.save_session("u1", "tok", Some("ref")).unwrap();
        state.db.add_cart_item("c1", "Rust", 100, None).unwrap();
        state.db.record_purchases(&["c2".to_string()], None).unwrap();
        logout(&state).await.unwrap();
        assert!(current_session(&state).unwrap().is_none());
        assert!(state.db.cart_items().unwrap().is_empty());
        assert!(!state.db.is_purchased("c2").unwrap());
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let state = AppState::in_memory().unwrap();
        assert!(matches!(
            refresh_session(&state).await,
            Err(AppError::NotSignedIn)
        ));
    }
}
