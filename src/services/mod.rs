pub mod credentials;
pub use credentials::CredentialHasher;

pub mod token;
pub use token::{Subject, TokenService, UsernameResolver};

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, BootstrapCredentials, LoginResult, UserProfile};
pub use auth_service_impl::SeaOrmAuthService;

pub mod config_service;
pub mod config_service_impl;
pub use config_service::{ConfigError, ConfigService, SyncOptions};
pub use config_service_impl::SeaOrmConfigService;

pub mod task_ledger;
pub mod task_ledger_impl;
pub use task_ledger::{LedgerError, TaskLedger, TaskRecord, TaskSubmission};
pub use task_ledger_impl::SeaOrmTaskLedger;

pub mod background;
pub use background::BackgroundTasks;

pub mod assets;
pub use assets::{AssetStore, StoredImage};

pub mod gateway;
pub use gateway::{GatewayError, VideoGateway, VideoJobRequest};

pub mod image_service;
pub use image_service::{ImageError, ImageRequest, ImageService};

pub mod verification;
pub use verification::{
    CodeDelivery, CodeStore, LogDelivery, MemoryCodeStore, VerificationError, VerificationService,
};

pub mod feedback_service;
pub use feedback_service::{FeedbackError, FeedbackService, FeedbackStatus};

pub mod admin_service;
pub use admin_service::{AdminError, AdminService};
