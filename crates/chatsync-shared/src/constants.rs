/// Application name
pub const APP_NAME: &str = "chatsync";

/// Server part of a regular user JID
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";

/// Server part of a group chat JID
pub const GROUP_SERVER: &str = "g.us";

/// Server part of broadcast list and status JIDs
pub const BROADCAST_SERVER: &str = "broadcast";

/// User part of the status broadcast JID (`status@broadcast`)
pub const STATUS_BROADCAST_USER: &str = "status";

/// Default RPC listen address
pub const DEFAULT_RPC_ADDR: &str = "localhost:5555";

/// Default page size for chat, message and search listings
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Upper bound for a single outbound send, in seconds
pub const SEND_TIMEOUT_SECS: u64 = 30;

/// Sender name recorded for messages sent from this device
pub const SELF_SENDER_NAME: &str = "me";
