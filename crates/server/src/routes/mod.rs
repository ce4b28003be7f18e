use serde::Serialize;

pub mod auth;
pub mod docs;
pub mod health;
pub mod members;
pub mod notifications;
pub mod projects;
pub mod sprints;
pub mod sub_tasks;
pub mod tasks;

/// Body of responses that carry only a confirmation.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
