//! Chat addressing.
//!
//! A JID has the shape `user[.agent][:device]@server`. Bare servers (no `@`)
//! are valid too, e.g. `broadcast`.

use std::str::FromStr;

use crate::constants::{BROADCAST_SERVER, DEFAULT_USER_SERVER, GROUP_SERVER, STATUS_BROADCAST_USER};
use crate::error::JidError;
use crate::types::ChatKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Jid {
    pub user: String,
    pub agent: u8,
    pub device: u16,
    pub server: String,
}

impl Jid {
    /// A plain `user@server` JID.
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
            ..Self::default()
        }
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    /// Broadcast lists live on the broadcast server; `status@broadcast`
    /// is the status feed, not a list.
    pub fn is_broadcast_list(&self) -> bool {
        self.server == BROADCAST_SERVER && self.user != STATUS_BROADCAST_USER
    }

    pub fn chat_kind(&self) -> ChatKind {
        if self.is_group() {
            ChatKind::Group
        } else if self.is_broadcast_list() {
            ChatKind::Broadcast
        } else {
            ChatKind::Dm
        }
    }
}

impl std::fmt::Display for Jid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.agent > 0 {
            write!(f, "{}.{}:{}@{}", self.user, self.agent, self.device, self.server)
        } else if self.device > 0 {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        } else if !self.user.is_empty() {
            write!(f, "{}@{}", self.user, self.server)
        } else {
            f.write_str(&self.server)
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('@').collect();
        let (user_part, server) = match parts.as_slice() {
            [server] => return Ok(Self::new("", *server)),
            [user, server] => (*user, *server),
            _ => return Err(JidError::TooManyAt(s.to_string())),
        };

        let (user_agent, device) = match user_part.split(':').collect::<Vec<_>>().as_slice() {
            [ua] => (*ua, 0),
            [ua, device] => {
                let device = device
                    .parse::<u16>()
                    .map_err(|_| JidError::InvalidDevice(s.to_string()))?;
                (*ua, device)
            }
            _ => return Err(JidError::TooManyColons(s.to_string())),
        };

        let (user, agent) = match user_agent.split('.').collect::<Vec<_>>().as_slice() {
            [user] => (*user, 0),
            [user, agent] => {
                let agent = agent
                    .parse::<u8>()
                    .map_err(|_| JidError::InvalidAgent(s.to_string()))?;
                (*user, agent)
            }
            _ => return Err(JidError::TooManyDots(s.to_string())),
        };

        Ok(Self {
            user: user.to_string(),
            agent,
            device,
            server: server.to_string(),
        })
    }
}

/// Parse either a full JID or a phone number.
///
/// Phone numbers may carry a leading `+` and the usual separators
/// (spaces, dashes, parentheses); they are addressed at the default user
/// server.
pub fn parse_user_or_jid(input: &str) -> Result<Jid, JidError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(JidError::Empty);
    }
    if input.contains('@') {
        return input.parse();
    }

    let digits: String = input
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(JidError::InvalidPhone(input.to_string()));
    }

    Ok(Jid::new(digits, DEFAULT_USER_SERVER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_jid() {
        let jid: Jid = "123@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.user, "123");
        assert_eq!(jid.server, "s.whatsapp.net");
        assert_eq!(jid.to_string(), "123@s.whatsapp.net");
    }

    #[test]
    fn test_parse_device_and_agent() {
        let jid: Jid = "123.1:7@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.agent, 1);
        assert_eq!(jid.device, 7);
        assert_eq!(jid.to_string(), "123.1:7@s.whatsapp.net");

        let jid: Jid = "123:7@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.to_string(), "123:7@s.whatsapp.net");
    }

    #[test]
    fn test_parse_bare_server() {
        let jid: Jid = "broadcast".parse().unwrap();
        assert!(jid.user.is_empty());
        assert_eq!(jid.to_string(), "broadcast");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!("a@b@c".parse::<Jid>(), Err(JidError::TooManyAt(_))));
        assert!(matches!("1.2.3@s".parse::<Jid>(), Err(JidError::TooManyDots(_))));
        assert!(matches!("1:2:3@s".parse::<Jid>(), Err(JidError::TooManyColons(_))));
        assert!(matches!("1:x@s".parse::<Jid>(), Err(JidError::InvalidDevice(_))));
    }

    #[test]
    fn test_parse_user_or_jid_phone() {
        let jid = parse_user_or_jid(" +1 (555) 123-4567 ").unwrap();
        assert_eq!(jid.to_string(), "15551234567@s.whatsapp.net");

        let jid = parse_user_or_jid("123456789").unwrap();
        assert_eq!(jid.to_string(), "123456789@s.whatsapp.net");
    }

    #[test]
    fn test_parse_user_or_jid_errors() {
        assert_eq!(parse_user_or_jid("   "), Err(JidError::Empty));
        assert!(matches!(parse_user_or_jid("alice"), Err(JidError::InvalidPhone(_))));
        assert!(matches!(parse_user_or_jid("+"), Err(JidError::InvalidPhone(_))));
    }

    #[test]
    fn test_chat_kind_classification() {
        assert_eq!(parse_user_or_jid("1203630@g.us").unwrap().chat_kind(), ChatKind::Group);
        assert_eq!(parse_user_or_jid("1234@broadcast").unwrap().chat_kind(), ChatKind::Broadcast);
        assert_eq!(parse_user_or_jid("status@broadcast").unwrap().chat_kind(), ChatKind::Dm);
        assert_eq!(parse_user_or_jid("123456789").unwrap().chat_kind(), ChatKind::Dm);
    }
}
