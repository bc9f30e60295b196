use crate::api::models::{Certificate, Course, Enrollment, NewNote, Note, Progress, QuizAnswer, QuizResult};
use crate::error::AppError;
use crate::quiz::{Quiz, QuizScore};
use crate::AppState;
use tracing::info;

pub async fn enroll(state: &AppState, course_id: &str) -> Result<Enrollment, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.enroll(course_id).await?)
}

pub async fn my_enrollments(state: &AppState) -> Result<Vec<Enrollment>, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.my_enrollments().await?)
}

pub async fn get_progress(state: &AppState, course_id: &str) -> Result<Progress, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.get_progress(course_id).await?)
}

pub async fn complete_lesson(state: &AppState, course_id: &str, lesson_id: &str) -> Result<Progress, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.complete_lesson(course_id, lesson_id).await?)
}

/// Local preview of a quiz result before it is submitted.
pub fn grade_quiz(quiz: &Quiz, answers: &[QuizAnswer]) -> QuizScore {
    quiz.score(answers)
}

pub async fn submit_quiz(state: &AppState, quiz: &Quiz, answers: &[QuizAnswer]) -> Result<QuizResult, AppError> {
    let (api, _) = state.authed_api()?;
    let result = api.submit_quiz(&quiz.id, answers).await?;
    let local = quiz.score(answers);
    if local.correct != result.score {
        info!(quiz = %quiz.id, local = local.correct, server = result.score, "server grading differs from local preview");
    }
    Ok(result)
}

pub async fn list_certificates(state: &AppState) -> Result<Vec<Certificate>, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.list_certificates().await?)
}

pub async fn get_certificate(state: &AppState, course_id: &str) -> Result<Certificate, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.get_certificate(course_id).await?)
}

// ── Notes ──

pub async fn list_notes(state: &AppState, course_id: &str) -> Result<Vec<Note>, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.list_notes(course_id).await?)
}

pub async fn add_note(state: &AppState, note: NewNote) -> Result<Note, AppError> {
    if note.content.trim().is_empty() {
        return Err(AppError::Invalid("Note cannot be empty".into()));
    }
    let (api, _) = state.authed_api()?;
    Ok(api.add_note(&note).await?)
}

pub async fn delete_note(state: &AppState, note_id: &str) -> Result<(), AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.delete_note(note_id).await?)
}

// ── Wishlist ──

pub async fn wishlist(state: &AppState) -> Result<Vec<Course>, AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.wishlist().await?)
}

pub async fn add_to_wishlist(state: &AppState, course_id: &str) -> Result<(), AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.add_to_wishlist(course_id).await?)
}

pub async fn remove_from_wishlist(state: &AppState, course_id: &str) -> Result<(), AppError> {
    let (api, _) = state.authed_api()?;
    Ok(api.remove_from_wishlist(course_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuizQuestion;

    #[test]
    fn test_grade_quiz() {
        let quiz = Quiz {
            id: "quiz1".into(),
            questions: vec![QuizQuestion {
                id: "q1".into(),
                prompt: "2 + 2".into(),
                options: vec!["3".into(), "4".into()],
                correct_option: 1,
            }],
            pass_percentage: 70,
        };
        let score = grade_quiz(
            &quiz,
            &[QuizAnswer {
                question_id: "q1".into(),
                option_index: 1,
            }],
        );
        assert_eq!(score.percentage, 100);
        assert!(score.passed);
    }

    #[tokio::test]
    async fn test_empty_note_rejected() {
        let state = AppState::in_memory().unwrap();
        let note = NewNote {
            course_id: "c1".into(),
            lesson_id: None,
            content: " ".into(),
            timestamp_secs: None,
        };
        assert!(matches!(add_note(&state, note).await, Err(AppError::Invalid(_))));
    }
}
