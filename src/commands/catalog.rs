use crate::api::models::{Course, CourseQuery, NewReview, Question, Review};
use crate::error::AppError;
use crate::AppState;

pub async fn list_courses(state: &AppState, query: CourseQuery) -> Result<Vec<Course>, AppError> {
    Ok(state.api()?.list_courses(&query).await?)
}

pub async fn get_course(state: &AppState, course_id: &str) -> Result<Course, AppError> {
    Ok(state.api()?.get_course(course_id).await?)
}

pub async fn list_reviews(state: &AppState, course_id: &str) -> Result<Vec<Review>, AppError> {
    Ok(state.api()?.list_reviews(course_id).await?)
}

pub async fn add_review(
    state: &AppState,
    course_id: &str,
    rating: u8,
    comment: String,
) -> Result<Review, AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Invalid("Rating must be between 1 and 5".into()));
    }
    let (api, _) = state.authed_api()?;
    Ok(api.add_review(course_id, &NewReview { rating, comment }).await?)
}

pub async fn list_questions(state: &AppState, course_id: &str) -> Result<Vec<Question>, AppError> {
    Ok(state.api()?.list_questions(course_id).await?)
}

pub async fn ask_question(state: &AppState, course_id: &str, text: &str) -> Result<Question, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Invalid("Question cannot be empty".into()));
    }
    let (api, _) = state.authed_api()?;
    Ok(api.ask_question(course_id, text.trim()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_review_rating_bounds() {
        let state = AppState::in_memory().unwrap();
        assert!(matches!(
            add_review(&state, "c1", 0, String::new()).await,
            Err(AppError::Invalid(_))
        ));
        // valid rating gets as far as the sign-in check
        assert!(matches!(
            add_review(&state, "c1", 5, "great".into()).await,
            Err(AppError::NotSignedIn)
        ));
    }
}
