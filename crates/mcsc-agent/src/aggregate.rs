//! Config aggregates: the independently persisted pieces of server state.
//!
//! Every aggregate kind implements [`Aggregate`] and is held in a [`Slot`],
//! which starts out empty. A slot must be provisioned with `create` before
//! anything can be loaded into it; `save` and `get` likewise refuse to run on
//! an empty slot.

use std::{
    collections::BTreeMap,
    fmt,
    io::{Read, Write},
};

use mcsc_model::{
    Allowlist, BannedIpList, BannedPlayerList, LaunchArguments, OperatorList, RuntimeProperties,
    ServerConfig, VersionCatalog,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Result, ServerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateKind {
    Allowlist,
    BannedIps,
    BannedPlayers,
    Operators,
    Properties,
    Arguments,
    Config,
    Versions,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 8] = [
        AggregateKind::Config,
        AggregateKind::Versions,
        AggregateKind::Arguments,
        AggregateKind::Properties,
        AggregateKind::Allowlist,
        AggregateKind::BannedIps,
        AggregateKind::BannedPlayers,
        AggregateKind::Operators,
    ];

    /// Backing file name inside the server directory.
    ///
    /// The list files use the names the game server itself reads.
    pub fn file_name(self) -> &'static str {
        match self {
            AggregateKind::Allowlist => "whitelist.json",
            AggregateKind::BannedIps => "banned-ips.json",
            AggregateKind::BannedPlayers => "banned-players.json",
            AggregateKind::Operators => "ops.json",
            AggregateKind::Properties => "properties.json",
            AggregateKind::Arguments => "args.json",
            AggregateKind::Config => "config.json",
            AggregateKind::Versions => "server-download-links.json",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateKind::Allowlist => "allowlist",
            AggregateKind::BannedIps => "banned IPs",
            AggregateKind::BannedPlayers => "banned players",
            AggregateKind::Operators => "operator list",
            AggregateKind::Properties => "server properties",
            AggregateKind::Arguments => "launch arguments",
            AggregateKind::Config => "server config",
            AggregateKind::Versions => "version catalog",
        };
        f.write_str(name)
    }
}

pub trait Aggregate: Clone + Serialize + DeserializeOwned + Send + 'static {
    const KIND: AggregateKind;

    /// Value installed by `create`.
    fn initial() -> Self;
}

impl Aggregate for Allowlist {
    const KIND: AggregateKind = AggregateKind::Allowlist;

    fn initial() -> Self {
        Vec::new()
    }
}

impl Aggregate for BannedIpList {
    const KIND: AggregateKind = AggregateKind::BannedIps;

    fn initial() -> Self {
        Vec::new()
    }
}

impl Aggregate for BannedPlayerList {
    const KIND: AggregateKind = AggregateKind::BannedPlayers;

    fn initial() -> Self {
        Vec::new()
    }
}

impl Aggregate for OperatorList {
    const KIND: AggregateKind = AggregateKind::Operators;

    fn initial() -> Self {
        Vec::new()
    }
}

impl Aggregate for RuntimeProperties {
    const KIND: AggregateKind = AggregateKind::Properties;

    fn initial() -> Self {
        RuntimeProperties::default()
    }
}

impl Aggregate for LaunchArguments {
    const KIND: AggregateKind = AggregateKind::Arguments;

    fn initial() -> Self {
        LaunchArguments::default()
    }
}

impl Aggregate for ServerConfig {
    const KIND: AggregateKind = AggregateKind::Config;

    fn initial() -> Self {
        ServerConfig::default()
    }
}

impl Aggregate for VersionCatalog {
    const KIND: AggregateKind = AggregateKind::Versions;

    fn initial() -> Self {
        VersionCatalog::new()
    }
}

#[derive(Debug, Clone)]
pub struct Slot<T> {
    value: Option<T>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: Aggregate> Slot<T> {
    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    pub fn create(&mut self) {
        self.value = Some(T::initial());
    }

    pub fn load(&mut self, reader: impl Read) -> Result<()> {
        let held = self.get_mut()?;
        let decoded: T = serde_json::from_reader(reader).map_err(|source| ServerError::Decode {
            kind: T::KIND,
            source,
        })?;
        *held = decoded;
        Ok(())
    }

    /// Compact JSON followed by a newline.
    pub fn save(&self, mut writer: impl Write) -> Result<()> {
        let held = self.get_ref()?;
        serde_json::to_writer(&mut writer, held).map_err(|source| ServerError::Encode {
            kind: T::KIND,
            source,
        })?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn get(&self) -> Result<T> {
        self.get_ref().cloned()
    }

    pub fn get_ref(&self) -> Result<&T> {
        self.value
            .as_ref()
            .ok_or(ServerError::NotInitialized(T::KIND))
    }

    pub fn get_mut(&mut self) -> Result<&mut T> {
        self.value
            .as_mut()
            .ok_or(ServerError::NotInitialized(T::KIND))
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }
}

/// Kind-erased view of a slot so the controller can create/load/save any
/// aggregate by [`AggregateKind`].
pub trait DynSlot {
    fn is_initialized(&self) -> bool;
    fn create(&mut self);
    fn load(&mut self, reader: &mut dyn Read) -> Result<()>;
    fn save(&self, writer: &mut dyn Write) -> Result<()>;
}

impl<T: Aggregate> DynSlot for Slot<T> {
    fn is_initialized(&self) -> bool {
        Slot::is_initialized(self)
    }

    fn create(&mut self) {
        Slot::create(self)
    }

    fn load(&mut self, reader: &mut dyn Read) -> Result<()> {
        Slot::load(self, reader)
    }

    fn save(&self, writer: &mut dyn Write) -> Result<()> {
        Slot::save(self, writer)
    }
}

/// Elements only in `old` and elements only in `new`, each ascending by
/// `key`. Duplicate keys collapse to their first occurrence.
pub(crate) fn sorted_diff<'a, T>(
    old: &'a [T],
    new: &'a [T],
    key: impl Fn(&T) -> &str,
) -> (Vec<&'a T>, Vec<&'a T>) {
    let index = |list: &'a [T]| {
        let mut map = BTreeMap::new();
        for item in list {
            map.entry(key(item)).or_insert(item);
        }
        map
    };
    let old_map = index(old);
    let new_map = index(new);

    let removed = old_map
        .iter()
        .filter(|(k, _)| !new_map.contains_key(*k))
        .map(|(_, v)| *v)
        .collect();
    let added = new_map
        .iter()
        .filter(|(k, _)| !old_map.contains_key(*k))
        .map(|(_, v)| *v)
        .collect();
    (removed, added)
}
