use super::models::{Course, CourseQuery, NewReview, Question, Review};
use super::{ApiClient, ApiError};
use reqwest::Method;
use serde::Serialize;

#[derive(Serialize)]
struct NewQuestion<'a> {
    text: &'a str,
}

impl ApiClient {
    pub async fn list_courses(&self, query: &CourseQuery) -> Result<Vec<Course>, ApiError> {
        self.send(self.request(Method::GET, "/courses").query(query))
            .await
    }

    pub async fn get_course(&self, course_id: &str) -> Result<Course, ApiError> {
        self.get(&format!("/courses/{}", course_id)).await
    }

    pub async fn list_reviews(&self, course_id: &str) -> Result<Vec<Review>, ApiError> {
        self.get(&format!("/courses/{}/reviews", course_id)).await
    }

    pub async fn add_review(&self, course_id: &str, review: &NewReview) -> Result<Review, ApiError> {
        self.post(&format!("/courses/{}/reviews", course_id), review)
            .await
    }

    pub async fn list_questions(&self, course_id: &str) -> Result<Vec<Question>, ApiError> {
        self.get(&format!("/courses/{}/questions", course_id)).await
    }

    pub async fn ask_question(&self, course_id: &str, text: &str) -> Result<Question, ApiError> {
        self.post(&format!("/courses/{}/questions", course_id), &NewQuestion { text })
            .await
    }
}
