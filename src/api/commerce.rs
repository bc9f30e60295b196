use super::models::{Enrollment, PaymentIntent};
use super::{ApiClient, ApiError};
use reqwest::Method;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseIds<'a> {
    course_ids: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequest<'a> {
    payment_intent_id: &'a str,
}

impl ApiClient {
    /// Mirrors the local cart on the server so other devices see it.
    pub async fn sync_cart(&self, course_ids: &[String]) -> Result<(), ApiError> {
        let req = self
            .request(Method::PUT, "/cart")
            .json(&CourseIds { course_ids });
        self.send_empty(req).await
    }

    pub async fn create_payment_intent(&self, course_ids: &[String]) -> Result<PaymentIntent, ApiError> {
        self.post("/payments/intent", &CourseIds { course_ids })
            .await
    }

    /// Returns the enrollments created by the purchase.
    pub async fn confirm_purchase(&self, payment_intent_id: &str) -> Result<Vec<Enrollment>, ApiError> {
        self.post("/payments/confirm", &ConfirmRequest { payment_intent_id })
            .await
    }
}
