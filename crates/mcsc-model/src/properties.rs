use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Peaceful,
    Easy,
    Normal,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gamemode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

/// Declarative server configuration, one field per `server.properties` key.
///
/// Keys use the server's own spelling. Missing keys fall back to the value in
/// [`RuntimeProperties::default`]; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RuntimeProperties {
    pub accept_transfers: bool,
    pub allow_flight: bool,
    pub allow_nether: bool,
    pub broadcast_console_to_ops: bool,
    pub broadcast_rcon_to_ops: bool,
    pub difficulty: Difficulty,
    pub enable_command_block: bool,
    pub enable_jmx_monitoring: bool,
    pub enable_query: bool,
    pub enable_rcon: bool,
    pub enable_status: bool,
    pub enforce_secure_profile: bool,
    pub enforce_whitelist: bool,
    pub entity_broadcast_range_percentage: u32,
    pub force_gamemode: bool,
    pub function_permission_level: u8,
    pub gamemode: Gamemode,
    pub generate_structures: bool,
    pub generator_settings: String,
    pub hardcore: bool,
    pub hide_online_players: bool,
    pub initial_disabled_packs: String,
    pub initial_enabled_packs: String,
    pub level_name: String,
    pub level_seed: String,
    pub level_type: String,
    pub log_ips: bool,
    pub max_chained_neighbor_updates: i64,
    pub max_players: u32,
    pub max_tick_time: i64,
    pub max_world_size: u32,
    pub motd: String,
    pub network_compression_threshold: i32,
    pub online_mode: bool,
    pub op_permission_level: u8,
    pub player_idle_timeout: u32,
    pub prevent_proxy_connections: bool,
    pub previews_chat: bool,
    pub pvp: bool,
    #[serde(rename = "query.port")]
    pub query_port: u16,
    pub rate_limit: u32,
    #[serde(rename = "rcon.password")]
    pub rcon_password: String,
    #[serde(rename = "rcon.port")]
    pub rcon_port: u16,
    pub region_file_compression: String,
    pub require_resource_pack: bool,
    pub resource_pack: String,
    pub resource_pack_id: String,
    pub resource_pack_prompt: String,
    pub resource_pack_sha1: String,
    pub server_ip: String,
    pub server_port: u16,
    pub simulation_distance: u32,
    pub snooper_enabled: bool,
    pub spawn_animals: bool,
    pub spawn_monsters: bool,
    pub spawn_npcs: bool,
    pub spawn_protection: u32,
    pub sync_chunk_writes: bool,
    pub text_filtering_config: String,
    pub use_native_transport: bool,
    pub view_distance: u32,
    pub white_list: bool,
}

impl Default for RuntimeProperties {
    fn default() -> Self {
        Self {
            accept_transfers: false,
            allow_flight: false,
            allow_nether: true,
            broadcast_console_to_ops: true,
            broadcast_rcon_to_ops: true,
            difficulty: Difficulty::Easy,
            enable_command_block: false,
            enable_jmx_monitoring: false,
            enable_query: false,
            enable_rcon: false,
            enable_status: true,
            enforce_secure_profile: true,
            enforce_whitelist: false,
            entity_broadcast_range_percentage: 100,
            force_gamemode: false,
            function_permission_level: 2,
            gamemode: Gamemode::Survival,
            generate_structures: true,
            generator_settings: "{}".to_string(),
            hardcore: false,
            hide_online_players: false,
            initial_disabled_packs: String::new(),
            initial_enabled_packs: "vanilla".to_string(),
            level_name: "world".to_string(),
            level_seed: String::new(),
            level_type: "minecraft:normal".to_string(),
            log_ips: true,
            max_chained_neighbor_updates: 1_000_000,
            max_players: 20,
            max_tick_time: 60_000,
            max_world_size: 29_999_984,
            motd: "A Minecraft Server".to_string(),
            network_compression_threshold: 256,
            online_mode: true,
            op_permission_level: 4,
            player_idle_timeout: 0,
            prevent_proxy_connections: false,
            previews_chat: false,
            pvp: true,
            query_port: 25565,
            rate_limit: 0,
            rcon_password: String::new(),
            rcon_port: 25575,
            region_file_compression: "deflate".to_string(),
            require_resource_pack: false,
            resource_pack: String::new(),
            resource_pack_id: String::new(),
            resource_pack_prompt: String::new(),
            resource_pack_sha1: String::new(),
            server_ip: String::new(),
            server_port: 25565,
            simulation_distance: 10,
            snooper_enabled: true,
            spawn_animals: true,
            spawn_monsters: true,
            spawn_npcs: true,
            spawn_protection: 16,
            sync_chunk_writes: true,
            text_filtering_config: String::new(),
            use_native_transport: true,
            view_distance: 10,
            white_list: false,
        }
    }
}
