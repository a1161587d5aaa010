use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownChatKind;

/// What sort of conversation a chat is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Dm,
    Group,
    Broadcast,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dm => "dm",
            Self::Group => "group",
            Self::Broadcast => "broadcast",
        }
    }
}

impl FromStr for ChatKind {
    type Err = UnknownChatKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dm" => Ok(Self::Dm),
            "group" => Ok(Self::Group),
            "broadcast" => Ok(Self::Broadcast),
            other => Err(UnknownChatKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for ChatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_kind_text_roundtrip() {
        for kind in [ChatKind::Dm, ChatKind::Group, ChatKind::Broadcast] {
            assert_eq!(kind.as_str().parse::<ChatKind>().unwrap(), kind);
        }
        assert!("channel".parse::<ChatKind>().is_err());
    }

    #[test]
    fn test_chat_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ChatKind::Broadcast).unwrap();
        assert_eq!(json, "\"broadcast\"");
    }
}
