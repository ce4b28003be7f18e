pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod docs;
pub mod error;
pub mod image;
pub mod notification;
pub mod postman;
pub mod project;
pub mod sprint;
pub mod sub_task;
pub mod task;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_db;
