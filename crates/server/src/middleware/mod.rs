pub mod model_loaders;

pub use model_loaders::{
    load_notification_middleware, load_project_middleware, load_sprint_middleware,
    load_sub_task_middleware, load_task_middleware,
};
