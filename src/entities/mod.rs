pub mod prelude;

pub mod feedbacks;
pub mod global_provider_configs;
pub mod image_tasks;
pub mod user_provider_configs;
pub mod users;
pub mod video_tasks;
