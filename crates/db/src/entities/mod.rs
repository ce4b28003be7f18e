pub mod access_token;
pub mod notification;
pub mod project;
pub mod project_member;
pub mod sprint;
pub mod sub_task;
pub mod task;
pub mod task_activity;
pub mod task_asset;
pub mod user;
