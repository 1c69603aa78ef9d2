pub mod errors;
pub mod ids;
pub mod moderation;
pub mod provider;
pub mod roles;
pub mod security;

pub use errors::GatewayError;
pub use ids::{SessionId, UserId};
pub use moderation::{ModerationService, ModerationVerdict};
pub use provider::{GenerateOptions, LanguageModel};
pub use roles::Role;
