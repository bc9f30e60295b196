use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CartItem {
    pub course_id: String,
    pub title: String,
    pub price_cents: i64,
    pub thumbnail: Option<String>,
    pub added_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total_cents: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Purchase {
    pub course_id: String,
    pub payment_intent_id: Option<String>,
    pub purchased_at: String,
}
