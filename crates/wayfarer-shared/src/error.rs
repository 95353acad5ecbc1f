use thiserror::Error;

/// Rejections produced by input validation.  The `Display` text is what the
/// UI shows to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name must be at least 3 characters")]
    TitleTooShort,

    #[error("Name cannot exceed 50 characters")]
    TitleTooLong,

    #[error("Name cannot contain special characters like < or >")]
    TitleSpecialCharacters,

    #[error("Name is required")]
    TitleRequired,

    #[error("Message cannot be empty")]
    EmptyContent,

    #[error("Message cannot exceed 4000 characters")]
    ContentTooLong,

    #[error("Link must start with http:// or https://")]
    InvalidUrl,

    #[error("A conversation needs at least one other participant")]
    NoParticipants,
}
