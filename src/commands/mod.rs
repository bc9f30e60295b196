//! Operations the UI shell calls. Every command returns `AppError` on
//! failure, which serialises to a user-facing message.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod learning;
pub mod settings;
