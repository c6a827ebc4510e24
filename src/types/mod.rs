// Public modules
pub mod generate_content_request;
pub mod generate_content_response;
pub mod message;
pub mod part;
pub mod role;

// Re-exports
pub use generate_content_request::{Content, GenerateContentRequest};
pub use generate_content_response::{GenerateContentResponse, UsageMetadata};
pub use message::Message;
pub use part::{Part, TextPart};
pub use role::Role;
