pub mod config;
pub mod cycle;
pub mod error;
mod json;
pub mod orchestrator;
pub mod prompts;
pub mod relevance;
pub mod response;
pub mod safety;
pub mod signals;
pub mod suggestions;
pub mod tone;

pub use config::{OrchestratorConfig, SafetyCopy, ToneMode};
pub use cycle::Round;
pub use error::EngineError;
pub use orchestrator::{IncomingMessage, RoundOrchestrator};
pub use response::RoundResponse;
