pub mod feedback;
pub mod image_task;
pub mod provider_config;
pub mod user;
pub mod video_task;
