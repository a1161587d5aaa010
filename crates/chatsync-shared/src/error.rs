use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JidError {
    #[error("recipient is required")]
    Empty,

    #[error("unexpected number of @ in JID: {0}")]
    TooManyAt(String),

    #[error("unexpected number of dots in JID: {0}")]
    TooManyDots(String),

    #[error("unexpected number of colons in JID: {0}")]
    TooManyColons(String),

    #[error("invalid agent in JID: {0}")]
    InvalidAgent(String),

    #[error("invalid device in JID: {0}")]
    InvalidDevice(String),

    #[error("invalid phone number: {0}")]
    InvalidPhone(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown chat kind: {0}")]
pub struct UnknownChatKind(pub String);
