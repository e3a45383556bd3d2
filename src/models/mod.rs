pub mod provider;
pub mod task;
pub mod user;

pub use provider::{Provider, ProviderPatch, ProviderSettings};
pub use task::{Platform, ProviderSnapshot, TaskStatus};
pub use user::{AuthUser, Role};
