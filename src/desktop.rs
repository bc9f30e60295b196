//! Tauri shell: IPC bindings for `commands::*` and the app entry point.
//! Chat events reach the webview as `chat-event`.

use crate::api::models::{
    Certificate, Course, CourseQuery, Enrollment, NewNote, Note, PaymentIntent, Progress,
    Question, QuizAnswer, QuizResult, Review,
};
use crate::chat::{ChatEvent, Conversation, DateGroup, LocalFile, Message};
use crate::commands::{auth, cart, catalog, chat, learning, settings};
use crate::config::ClientConfig;
use crate::db::models::{CartSummary, Purchase, Session};
use crate::error::AppError;
use crate::quiz::{Quiz, QuizScore};
use crate::AppState;
use std::collections::HashMap;
use tauri::{AppHandle, Emitter, Manager, Runtime, State};
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const CHAT_EVENT: &str = "chat-event";

/// Re-emits one conversation's events to the webview until it closes.
pub async fn forward_chat_events<R: Runtime>(
    app: AppHandle<R>,
    mut events: broadcast::Receiver<ChatEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let closed = matches!(event, ChatEvent::Closed);
                if let Err(e) = app.emit(CHAT_EVENT, &event) {
                    warn!(error = %e, "chat event not delivered to webview");
                }
                if closed {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "webview fell behind on chat events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("chat event forwarding stopped");
}

// ── settings ──

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<HashMap<String, String>, AppError> {
    settings::get_settings(&state)
}

#[tauri::command]
pub fn set_setting(state: State<'_, AppState>, key: String, value: String) -> Result<(), AppError> {
    settings::set_setting(&state, &key, &value)
}

#[tauri::command]
pub fn delete_setting(state: State<'_, AppState>, key: String) -> Result<(), AppError> {
    settings::delete_setting(&state, &key)
}

#[tauri::command]
pub fn effective_config(state: State<'_, AppState>) -> Result<ClientConfig, AppError> {
    settings::effective_config(&state)
}

// ── auth ──

#[tauri::command]
pub async fn login(
    state: State<'_, AppState>,
    email: String,
    password: String,
) -> Result<Session, AppError> {
    auth::login(&state, &email, &password).await
}

#[tauri::command]
pub async fn refresh_session(state: State<'_, AppState>) -> Result<Session, AppError> {
    auth::refresh_session(&state).await
}

#[tauri::command]
pub async fn logout(state: State<'_, AppState>) -> Result<(), AppError> {
    auth::logout(&state).await
}

#[tauri::command]
pub fn current_session(state: State<'_, AppState>) -> Result<Option<Session>, AppError> {
    auth::current_session(&state)
}

// ── catalog ──

#[tauri::command]
pub async fn list_courses(
    state: State<'_, AppState>,
    query: Option<CourseQuery>,
) -> Result<Vec<Course>, AppError> {
    catalog::list_courses(&state, query.unwrap_or_default()).await
}

#[tauri::command]
pub async fn get_course(state: State<'_, AppState>, course_id: String) -> Result<Course, AppError> {
    catalog::get_course(&state, &course_id).await
}

#[tauri::command]
pub async fn list_reviews(
    state: State<'_, AppState>,
    course_id: String,
) -> Result<Vec<Review>, AppError> {
    catalog::list_reviews(&state, &course_id).await
}

#[tauri::command]
pub async fn add_review(
    state: State<'_, AppState>,
    course_id: String,
    rating: u8,
    comment: String,
) -> Result<Review, AppError> {
    catalog::add_review(&state, &course_id, rating, comment).await
}

#[tauri::command]
pub async fn list_questions(
    state: State<'_, AppState>,
    course_id: String,
) -> Result<Vec<Question>, AppError> {
    catalog::list_questions(&state, &course_id).await
}

#[tauri::command]
pub async fn ask_question(
    state: State<'_, AppState>,
    course_id: String,
    text: String,
) -> Result<Question, AppError> {
    catalog::ask_question(&state, &course_id, &text).await
}

// ── learning ──

#[tauri::command]
pub async fn enroll(state: State<'_, AppState>, course_id: String) -> Result<Enrollment, AppError> {
    learning::enroll(&state, &course_id).await
}

#[tauri::command]
pub async fn my_enrollments(state: State<'_, AppState>) -> Result<Vec<Enrollment>, AppError> {
    learning::my_enrollments(&state).await
}

#[tauri::command]
pub async fn get_progress(state: State<'_, AppState>, course_id: String) -> Result<Progress, AppError> {
    learning::get_progress(&state, &course_id).await
}

#[tauri::command]
pub async fn complete_lesson(
    state: State<'_, AppState>,
    course_id: String,
    lesson_id: String,
) -> Result<Progress, AppError> {
    learning::complete_lesson(&state, &course_id, &lesson_id).await
}

#[tauri::command]
pub fn grade_quiz(quiz: Quiz, answers: Vec<QuizAnswer>) -> QuizScore {
    learning::grade_quiz(&quiz, &answers)
}

#[tauri::command]
pub async fn submit_quiz(
    state: State<'_, AppState>,
    quiz: Quiz,
    answers: Vec<QuizAnswer>,
) -> Result<QuizResult, AppError> {
    learning::submit_quiz(&state, &quiz, &answers).await
}

#[tauri::command]
pub async fn list_certificates(state: State<'_, AppState>) -> Result<Vec<Certificate>, AppError> {
    learning::list_certificates(&state).await
}

#[tauri::command]
pub async fn get_certificate(
    state: State<'_, AppState>,
    course_id: String,
) -> Result<Certificate, AppError> {
    learning::get_certificate(&state, &course_id).await
}

#[tauri::command]
pub async fn list_notes(state: State<'_, AppState>, course_id: String) -> Result<Vec<Note>, AppError> {
    learning::list_notes(&state, &course_id).await
}

#[tauri::command]
pub async fn add_note(state: State<'_, AppState>, note: NewNote) -> Result<Note, AppError> {
    learning::add_note(&state, note).await
}

#[tauri::command]
pub async fn delete_note(state: State<'_, AppState>, note_id: String) -> Result<(), AppError> {
    learning::delete_note(&state, &note_id).await
}

#[tauri::command]
pub async fn wishlist(state: State<'_, AppState>) -> Result<Vec<Course>, AppError> {
    learning::wishlist(&state).await
}

#[tauri::command]
pub async fn add_to_wishlist(state: State<'_, AppState>, course_id: String) -> Result<(), AppError> {
    learning::add_to_wishlist(&state, &course_id).await
}

#[tauri::command]
pub async fn remove_from_wishlist(
    state: State<'_, AppState>,
    course_id: String,
) -> Result<(), AppError> {
    learning::remove_from_wishlist(&state, &course_id).await
}

// ── cart ──

#[tauri::command]
pub async fn add_to_cart(state: State<'_, AppState>, course: Course) -> Result<CartSummary, AppError> {
    cart::add_to_cart(&state, &course).await
}

#[tauri::command]
pub async fn remove_from_cart(
    state: State<'_, AppState>,
    course_id: String,
) -> Result<CartSummary, AppError> {
    cart::remove_from_cart(&state, &course_id).await
}

#[tauri::command]
pub fn get_cart(state: State<'_, AppState>) -> Result<CartSummary, AppError> {
    cart::get_cart(&state)
}

#[tauri::command]
pub fn purchases(state: State<'_, AppState>) -> Result<Vec<Purchase>, AppError> {
    cart::purchases(&state)
}

#[tauri::command]
pub async fn checkout(state: State<'_, AppState>) -> Result<PaymentIntent, AppError> {
    cart::checkout(&state).await
}

#[tauri::command]
pub async fn complete_checkout(
    state: State<'_, AppState>,
    payment_intent_id: String,
) -> Result<Vec<Enrollment>, AppError> {
    cart::complete_checkout(&state, &payment_intent_id).await
}

// ── chat ──

#[tauri::command]
pub async fn list_conversations(state: State<'_, AppState>) -> Result<Vec<Conversation>, AppError> {
    chat::list_conversations(&state).await
}

#[tauri::command]
pub async fn start_conversation(
    state: State<'_, AppState>,
    mentor_id: String,
) -> Result<Conversation, AppError> {
    chat::start_conversation(&state, &mentor_id).await
}

/// Opens the conversation and streams its events to the webview.
#[tauri::command]
pub async fn open_chat<R: Runtime>(
    app: AppHandle<R>,
    state: State<'_, AppState>,
    conversation_id: String,
) -> Result<(), AppError> {
    let events = chat::open_chat(&state, &conversation_id).await?;
    tauri::async_runtime::spawn(forward_chat_events(app, events));
    Ok(())
}

#[tauri::command]
pub async fn send_chat_message(
    state: State<'_, AppState>,
    text: String,
    files: Option<Vec<LocalFile>>,
) -> Result<Message, AppError> {
    chat::send_chat_message(&state, text, files.unwrap_or_default()).await
}

#[tauri::command]
pub async fn set_typing(state: State<'_, AppState>, is_typing: bool) -> Result<(), AppError> {
    chat::set_typing(&state, is_typing).await
}

#[tauri::command]
pub async fn typing_users(state: State<'_, AppState>) -> Result<Vec<String>, AppError> {
    chat::typing_users(&state).await
}

#[tauri::command]
pub async fn chat_messages(
    state: State<'_, AppState>,
    utc_offset_minutes: i32,
) -> Result<Vec<DateGroup>, AppError> {
    chat::chat_messages(&state, utc_offset_minutes).await
}

#[tauri::command]
pub async fn close_chat(state: State<'_, AppState>) -> Result<(), AppError> {
    chat::close_chat(&state).await;
    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    crate::init_tracing();
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let app_dir = app.path().app_data_dir()?;
            let state = AppState::new(&app_dir)?;
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_settings,
            set_setting,
            delete_setting,
            effective_config,
            login,
            refresh_session,
            logout,
            current_session,
            list_courses,
            get_course,
            list_reviews,
            add_review,
            list_questions,
            ask_question,
            enroll,
            my_enrollments,
            get_progress,
            complete_lesson,
            grade_quiz,
            submit_quiz,
            list_certificates,
            get_certificate,
            list_notes,
            add_note,
            delete_note,
            wishlist,
            add_to_wishlist,
            remove_from_wishlist,
            add_to_cart,
            remove_from_cart,
            get_cart,
            purchases,
            checkout,
            complete_checkout,
            list_conversations,
            start_conversation,
            open_chat,
            send_chat_message,
            set_typing,
            typing_users,
            chat_messages,
            close_chat,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(all(test, feature = "desktop-test"))]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tauri::Listener;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_chat_events_reach_the_webview() {
        let app = tauri::test::mock_app();
        let (seen_tx, seen) = mpsc::channel();
        app.listen_any(CHAT_EVENT, move |event| {
            let _ = seen_tx.send(event.payload().to_string());
        });

        let (events, receiver) = broadcast::channel(4);
        events.send(ChatEvent::Reconnecting { attempt: 1 }).unwrap();
        events.send(ChatEvent::Closed).unwrap();
        // also proves forwarding stops on Closed although `events` is alive
        forward_chat_events(app.handle().clone(), receiver).await;

        let first: serde_json::Value =
            serde_json::from_str(&seen.recv_timeout(Duration::from_secs(1)).unwrap()).unwrap();
        assert_eq!(first, serde_json::json!({"type": "reconnecting", "attempt": 1}));
        let last = seen.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(last, r#"{"type":"closed"}"#);
    }
}
