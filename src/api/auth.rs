use super::models::AuthSession;
use super::{ApiClient, ApiError};
use serde::Serialize;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        self.post("/auth/login", &LoginRequest { email, password })
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, ApiError> {
        self.post("/auth/refresh", &RefreshRequest { refresh_token })
            .await
    }
}
