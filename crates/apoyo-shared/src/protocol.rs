//! Inbound request bodies and the rules that turn them into validated values.
//!
//! Request structs mirror the JSON sent by the web client; every field is
//! defaulted so that a missing field surfaces as a [`ValidationError`] rather
//! than a deserialization failure.

use serde::{Deserialize, Serialize};

use crate::constants::{ANONYMOUS_USERNAME, MAX_CONTENT_CHARS, MIN_GROUP_NAME_CHARS};
use crate::error::ValidationError;

/// Body of `POST /messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SendMessageRequest {
    pub group_id: i64,
    pub username: Option<String>,
    pub content: String,
}

/// A message submission that passed validation and is ready to be moderated
/// and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub group_id: i64,
    pub username: String,
    pub content: String,
}

impl SendMessageRequest {
    /// Check the request and fill in the anonymous display name.
    pub fn validate(self) -> Result<Submission, ValidationError> {
        if self.group_id <= 0 {
            return Err(ValidationError::MissingGroup);
        }
        if self.content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        let len = self.content.chars().count();
        if len > MAX_CONTENT_CHARS {
            return Err(ValidationError::ContentTooLong {
                len,
                max: MAX_CONTENT_CHARS,
            });
        }

        let username = match self.username {
            Some(name) if !name.is_empty() => name,
            _ => ANONYMOUS_USERNAME.to_string(),
        };

        Ok(Submission {
            group_id: self.group_id,
            username,
            content: self.content,
        })
    }
}

/// Body of `POST /groups`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
    pub topic: String,
}

/// A validated group ready to be inserted into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub topic: String,
}

impl CreateGroupRequest {
    pub fn validate(self) -> Result<NewGroup, ValidationError> {
        let name = self.name.trim();
        if name.chars().count() < MIN_GROUP_NAME_CHARS {
            return Err(ValidationError::GroupNameTooShort {
                min: MIN_GROUP_NAME_CHARS,
            });
        }
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(ValidationError::MissingTopic);
        }
        Ok(NewGroup {
            name: name.to_string(),
            description: self.description,
            topic: topic.to_string(),
        })
    }
}
