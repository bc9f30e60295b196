use crate::api::models::{Course, Enrollment, PaymentIntent};
use crate::db::models::{CartSummary, Purchase};
use crate::error::AppError;
use crate::AppState;
use tracing::{info, warn};

/// Adds a course to the device cart. Owned courses are refused; adding a
/// course twice is a no-op.
pub async fn add_to_cart(state: &AppState, course: &Course) -> Result<CartSummary, AppError> {
    if state.db.is_purchased(&course.id)? {
        return Err(AppError::Invalid(format!(
            "You already own \"{}\"",
            course.title
        )));
    }
    let price_cents = course.price_cents();
    if price_cents < 0 {
        return Err(AppError::Invalid("Course has an invalid price".into()));
    }
    let added = state.db.add_cart_item(
        &course.id,
        &course.title,
        price_cents,
        course.thumbnail.as_deref(),
    )?;
    if added {
        sync_cart(state).await;
    }
    Ok(state.db.cart_summary()?)
}

pub async fn remove_from_cart(state: &AppState, course_id: &str) -> Result<CartSummary, AppError> {
    if state.db.remove_cart_item(course_id)? {
        sync_cart(state).await;
    }
    Ok(state.db.cart_summary()?)
}

pub fn get_cart(state: &AppState) -> Result<CartSummary, AppError> {
    Ok(state.db.cart_summary()?)
}

pub fn purchases(state: &AppState) -> Result<Vec<Purchase>, AppError> {
    Ok(state.db.purchases()?)
}

/// Best effort: the device cart stays authoritative when offline or
/// signed out.
async fn sync_cart(state: &AppState) {
    let Ok((api, _)) = state.authed_api() else {
        return;
    };
    let ids = match state.db.cart_items() {
        Ok(items) => items.into_iter().map(|i| i.course_id).collect::<Vec<_>>(),
        Err(e) => {
            warn!(error = %e, "could not read cart for sync");
            return;
        }
    };
    if let Err(e) = api.sync_cart(&ids).await {
        warn!(error = %e, "cart sync failed");
    }
}

/// Creates the payment intent for everything in the cart; the payment
/// sheet itself is handled by the provider SDK.
pub async fn checkout(state: &AppState) -> Result<PaymentIntent, AppError> {
    let (api, _) = state.authed_api()?;
    let summary = state.db.cart_summary()?;
    if summary.items.is_empty() {
        return Err(AppError::Invalid("Your cart is empty".into()));
    }
    let ids: Vec<String> = summary.items.iter().map(|i| i.course_id.clone()).collect();
    let intent = api.create_payment_intent(&ids).await?;
    if intent.amount != summary.total_cents {
        warn!(
            server = intent.amount,
            local = summary.total_cents,
            "payment amount differs from cart total"
        );
    }
    Ok(intent)
}

/// Confirms a paid intent, caches the purchases, and empties the cart.
pub async fn complete_checkout(state: &AppState, payment_intent_id: &str) -> Result<Vec<Enrollment>, AppError> {
    let (api, _) = state.authed_api()?;
    let enrollments = api.confirm_purchase(payment_intent_id).await?;
    let mut course_ids: Vec<String> = enrollments.iter().map(|e| e.course_id.clone()).collect();
    if course_ids.is_empty() {
        course_ids = state
            .db
            .cart_items()?
            .into_iter()
            .map(|i| i.course_id)
            .collect();
    }
    state.db.record_purchases(&course_ids, Some(payment_intent_id))?;
    state.db.clear_cart()?;
    info!(count = course_ids.len(), "purchase completed");
    Ok(enrollments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str, price: f64) -> Course {
        Course {
            id: id.into(),
            title: format!("Course {id}"),
            description: String::new(),
            price,
            instructor: None,
            category: None,
            thumbnail: None,
            rating: None,
            lessons: vec![],
        }
    }

    #[tokio::test]
    async fn test_cart_totals() {
        let state = AppState::in_memory().unwrap();
        add_to_cart(&state, &course("c1", 19.99)).await.unwrap();
        let summary = add_to_cart(&state, &course("c2", 5.0)).await.unwrap();
        assert_eq!(summary.total_cents, 2499);
        let summary = add_to_cart(&state, &course("c1", 19.99)).await.unwrap();
        assert_eq!(summary.items.len(), 2);
        let summary = remove_from_cart(&state, "c1").await.unwrap();
        assert_eq!(summary.total_cents, 500);
    }

    #[tokio::test]
    async fn test_owned_course_refused() {
        let state = AppState::in_memory().unwrap();
        state.db.record_purchases(&["c1".to_string()], None).unwrap();
        let err = add_to_cart(&state, &course("c1", 10.0)).await.unwrap_err();
        assert!(err.to_string().contains("already own"));
        assert!(get_cart(&state).unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_requires_sign_in() {
        let state = AppState::in_memory().unwrap();
        add_to_cart(&state, &course("c1", 1.0)).await.unwrap();
        assert!(matches!(checkout(&state).await, Err(AppError::NotSignedIn)));
    }
}
