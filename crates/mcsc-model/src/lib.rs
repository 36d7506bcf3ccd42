use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod properties;

pub use properties::{Difficulty, Gamemode, RuntimeProperties};

/// Version selected when no config file exists yet.
pub const DEFAULT_VERSION: &str = "1.20.6";

/// A player identity as the server stores it in its JSON lists.
///
/// Lookups (disallow, pardon, deop) match on the `(name, uuid)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerRef {
    pub name: String,
    pub uuid: String,
}

impl PlayerRef {
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
        }
    }

    pub fn is_lookup_key(&self) -> bool {
        !self.name.is_empty() && !self.uuid.is_empty()
    }

    pub fn same_identity(&self, name: &str, uuid: &str) -> bool {
        self.name == name && self.uuid == uuid
    }
}

pub type AllowlistEntry = PlayerRef;
pub type Allowlist = Vec<AllowlistEntry>;

/// Ban metadata (`created`, `expires`, `reason`, `source`) may be omitted
/// on input; the controller fills in what is missing when banning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BannedIp {
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub expires: String,
    pub ip: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub source: String,
}

pub type BannedIpList = Vec<BannedIp>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BannedPlayer {
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub expires: String,
    pub name: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub source: String,
    pub uuid: String,
}

impl BannedPlayer {
    pub fn player(&self) -> PlayerRef {
        PlayerRef::new(&self.name, &self.uuid)
    }
}

pub type BannedPlayerList = Vec<BannedPlayer>;

/// Highest permission level the server understands.
pub const MAX_OPERATOR_LEVEL: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operator {
    #[serde(rename = "bypassesPlayerLimit", default)]
    pub bypasses_player_limit: bool,
    pub level: u8,
    pub name: String,
    pub uuid: String,
}

impl Operator {
    pub fn player(&self) -> PlayerRef {
        PlayerRef::new(&self.name, &self.uuid)
    }
}

pub type OperatorList = Vec<Operator>;

/// Command-line configuration for the server process.
///
/// Memory bounds are in GiB. Optional values are only passed to the server
/// when non-empty (strings) or non-zero (port).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchArguments {
    pub memory_start: u32,
    pub memory_max: u32,
    #[serde(default)]
    pub bonus_chest: bool,
    #[serde(default)]
    pub demo: bool,
    #[serde(default)]
    pub erase_cache: bool,
    #[serde(default)]
    pub force_upgrade: bool,
    #[serde(default)]
    pub safe_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_player: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Default for LaunchArguments {
    fn default() -> Self {
        Self {
            memory_start: 1,
            memory_max: 2,
            bonus_chest: false,
            demo: false,
            erase_cache: false,
            force_upgrade: false,
            safe_mode: false,
            server_id: None,
            single_player: None,
            universe: None,
            world: None,
            port: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub link: String,
    /// Hex MD5 or SHA-1 digest of the jar. Empty skips verification.
    pub sum: String,
}

/// Version string -> download info. Ordered so listings are stable.
pub type VersionCatalog = BTreeMap<String, VersionInfo>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub state: ServerState,
    pub pid: Option<u32>,
    pub version: Option<String>,
    pub exit_code: Option<i32>,
    pub message: Option<String>,
}
