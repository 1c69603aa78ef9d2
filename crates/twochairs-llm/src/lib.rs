pub mod mock;
pub mod moderation;
pub mod openai;
pub mod reliable;

pub use mock::{MockModel, MockModeration, MockReply};
pub use moderation::OpenAiModeration;
pub use openai::OpenAiModel;
pub use reliable::{ReliableConfig, ReliableModel};
