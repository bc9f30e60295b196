use super::models::{
    Certificate, Course, Enrollment, NewNote, Note, Progress, QuizAnswer, QuizResult,
};
use super::{ApiClient, ApiError};
use serde::Serialize;

#[derive(Serialize)]
struct QuizSubmission<'a> {
    answers: &'a [QuizAnswer],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseRef<'a> {
    course_id: &'a str,
}

impl ApiClient {
    pub async fn enroll(&self, course_id: &str) -> Result<Enrollment, ApiError> {
        self.post("/enrollments", &CourseRef { course_id }).await
    }

    pub async fn my_enrollments(&self) -> Result<Vec<Enrollment>, ApiError> {
        self.get("/enrollments/me").await
    }

    pub async fn get_progress(&self, course_id: &str) -> Result<Progress, ApiError> {
        self.get(&format!("/progress/{}", course_id)).await
    }

    pub async fn complete_lesson(&self, course_id: &str, lesson_id: &str) -> Result<Progress, ApiError> {
        self.post(
            &format!("/progress/{}/lessons/{}/complete", course_id, lesson_id),
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn submit_quiz(&self, quiz_id: &str, answers: &[QuizAnswer]) -> Result<QuizResult, ApiError> {
        self.post(&format!("/quizzes/{}/submit", quiz_id), &QuizSubmission { answers })
            .await
    }

    pub async fn list_certificates(&self) -> Result<Vec<Certificate>, ApiError> {
        self.get("/certificates").await
    }

    pub async fn get_certificate(&self, course_id: &str) -> Result<Certificate, ApiError> {
        self.get(&format!("/certificates/{}", course_id)).await
    }

    // ── Notes ──

    pub async fn list_notes(&self, course_id: &str) -> Result<Vec<Note>, ApiError> {
        let req = self
            .request(reqwest::Method::GET, "/notes")
            .query(&[("courseId", course_id)]);
        self.send(req).await
    }

    pub async fn add_note(&self, note: &NewNote) -> Result<Note, ApiError> {
        self.post("/notes", note).await
    }

    pub async fn delete_note(&self, note_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/notes/{}", note_id)).await
    }

    // ── Wishlist ──

    pub async fn wishlist(&self) -> Result<Vec<Course>, ApiError> {
        self.get("/wishlist").await
    }

    pub async fn add_to_wishlist(&self, course_id: &str) -> Result<(), ApiError> {
        let req = self
            .request(reqwest::Method::POST, "/wishlist")
            .json(&CourseRef { course_id });
        self.send_empty(req).await
    }

    pub async fn remove_from_wishlist(&self, course_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/wishlist/{}", course_id)).await
    }
}
