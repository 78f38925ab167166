use thiserror::Error;

/// A user-correctable problem with an inbound request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("group_id must be a positive integer")]
    MissingGroup,

    #[error("content must not be empty")]
    EmptyContent,

    #[error("content too long: {len} characters (max {max})")]
    ContentTooLong { len: usize, max: usize },

    #[error("group name must be at least {min} characters long")]
    GroupNameTooShort { min: usize },

    #[error("group topic is required")]
    MissingTopic,
}
