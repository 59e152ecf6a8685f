pub mod errors;
pub mod events;
pub mod id;
pub mod notifications;
pub mod types;

pub use errors::{ConfigError, KbqaError};
pub use events::{Event, EventBus};
pub use id::{new_id, now_timestamp};
pub use notifications::{Notification, NotificationLevel, NotificationQueue};
pub use types::{
    Conversation, Document, DocumentStatus, KnowledgeBase, Message, Role, Source,
};

pub type Result<T> = std::result::Result<T, KbqaError>;
