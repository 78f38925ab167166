//! # apoyo-shared
//!
//! Types and pure logic shared by the storage layer and the server:
//! domain constants, the content moderation filter, and the inbound wire
//! requests together with their validation rules.

pub mod constants;
pub mod error;
pub mod moderation;
pub mod protocol;

pub use error::ValidationError;
pub use moderation::{ContentClassifier, TermListFilter};
pub use protocol::{CreateGroupRequest, NewGroup, SendMessageRequest, Submission};
