pub use super::feedbacks::Entity as Feedbacks;
pub use super::global_provider_configs::Entity as GlobalProviderConfigs;
pub use super::image_tasks::Entity as ImageTasks;
pub use super::user_provider_configs::Entity as UserProviderConfigs;
pub use super::users::Entity as Users;
pub use super::video_tasks::Entity as VideoTasks;
