use std::net::IpAddr;

use mcsc_model::{BannedIp, BannedIpList, BannedPlayer, BannedPlayerList, PlayerRef};

use crate::{
    aggregate::sorted_diff,
    allowlist::require_player,
    controller::ServerController,
    error::{Result, ServerError},
};

const DEFAULT_BAN_REASON: &str = "Banned by an operator.";
const DEFAULT_BAN_SOURCE: &str = "Server";
const DEFAULT_BAN_EXPIRY: &str = "forever";

/// Same layout the game server writes into its own ban files.
fn ban_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S %z")
        .to_string()
}

fn fill_if_empty(field: &mut String, value: impl FnOnce() -> String) {
    if field.trim().is_empty() {
        *field = value();
    }
}

fn require_ip(ip: &str) -> Result<()> {
    ip.parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| ServerError::InvalidIp(ip.to_string()))
}

/// The reason trails the console command, so it must stay on one line.
fn require_reason(reason: &str) -> Result<()> {
    if reason.chars().any(char::is_control) {
        return Err(ServerError::InvalidBanReason(
            "must be a single line without control characters".to_string(),
        ));
    }
    Ok(())
}

fn with_reason(command: String, reason: &str) -> String {
    if reason.is_empty() {
        command
    } else {
        format!("{command} {reason}")
    }
}

fn ban_ip_command(ban: &BannedIp) -> String {
    with_reason(format!("/ban-ip {}", ban.ip), &ban.reason)
}

fn ban_player_command(ban: &BannedPlayer) -> String {
    with_reason(format!("/ban {}", ban.name), &ban.reason)
}

fn complete_ip_ban(mut ban: BannedIp) -> BannedIp {
    fill_if_empty(&mut ban.created, ban_timestamp);
    fill_if_empty(&mut ban.expires, || DEFAULT_BAN_EXPIRY.to_string());
    fill_if_empty(&mut ban.source, || DEFAULT_BAN_SOURCE.to_string());
    fill_if_empty(&mut ban.reason, || DEFAULT_BAN_REASON.to_string());
    ban
}

fn complete_player_ban(mut ban: BannedPlayer) -> BannedPlayer {
    fill_if_empty(&mut ban.created, ban_timestamp);
    fill_if_empty(&mut ban.expires, || DEFAULT_BAN_EXPIRY.to_string());
    fill_if_empty(&mut ban.source, || DEFAULT_BAN_SOURCE.to_string());
    fill_if_empty(&mut ban.reason, || DEFAULT_BAN_REASON.to_string());
    ban
}

impl ServerController {
    pub async fn banned_ips(&self) -> Result<BannedIpList> {
        self.state.lock().await.banned_ips.get()
    }

    pub async fn ban_ip(&self, ban: BannedIp) -> Result<()> {
        require_ip(&ban.ip)?;
        require_reason(&ban.reason)?;
        let ban = complete_ip_ban(ban);
        let mut state = self.state.lock().await;
        state.banned_ips.get_ref()?;

        self.push_live(&[ban_ip_command(&ban)]).await?;
        state.banned_ips.get_mut()?.push(ban);
        Ok(())
    }

    pub async fn pardon_ip(&self, ip: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let idx = state
            .banned_ips
            .get_ref()?
            .iter()
            .position(|b| b.ip == ip)
            .ok_or_else(|| ServerError::IpNotBanned { ip: ip.to_string() })?;

        self.push_live(&[format!("/pardon-ip {ip}")]).await?;
        state.banned_ips.get_mut()?.remove(idx);
        Ok(())
    }

    pub async fn set_banned_ips(&self, bans: BannedIpList) -> Result<()> {
        for b in &bans {
            require_ip(&b.ip)?;
            require_reason(&b.reason)?;
        }
        let mut state = self.state.lock().await;
        let old = state.banned_ips.get_ref().cloned().unwrap_or_default();

        let (removed, added) = sorted_diff(&old, &bans, |b| b.ip.as_str());
        let commands: Vec<String> = removed
            .into_iter()
            .map(|b| format!("/pardon-ip {}", b.ip))
            .chain(added.into_iter().map(ban_ip_command))
            .collect();

        self.push_live(&commands).await?;
        state.banned_ips.set(bans);
        Ok(())
    }

    pub async fn banned_players(&self) -> Result<BannedPlayerList> {
        self.state.lock().await.banned_players.get()
    }

    pub async fn ban_player(&self, ban: BannedPlayer) -> Result<()> {
        require_player(&ban.player())?;
        require_reason(&ban.reason)?;
        let ban = complete_player_ban(ban);
        let mut state = self.state.lock().await;
        state.banned_players.get_ref()?;

        self.push_live(&[ban_player_command(&ban)]).await?;
        state.banned_players.get_mut()?.push(ban);
        Ok(())
    }

    pub async fn pardon_player(&self, player: &PlayerRef) -> Result<()> {
        require_player(player)?;
        let mut state = self.state.lock().await;
        let idx = state
            .banned_players
            .get_ref()?
            .iter()
            .position(|b| b.player().same_identity(&player.name, &player.uuid))
            .ok_or_else(|| ServerError::PlayerNotBanned {
                name: player.name.clone(),
            })?;

        self.push_live(&[format!("/pardon {}", player.name)])
            .await?;
        state.banned_players.get_mut()?.remove(idx);
        Ok(())
    }

    pub async fn set_banned_players(&self, bans: BannedPlayerList) -> Result<()> {
        for b in &bans {
            require_player(&b.player())?;
            require_reason(&b.reason)?;
        }
        let mut state = self.state.lock().await;
        let old = state.banned_players.get_ref().cloned().unwrap_or_default();

        let (removed, added) = sorted_diff(&old, &bans, |b| b.name.as_str());
        let commands: Vec<String> = removed
            .into_iter()
            .map(|b| format!("/pardon {}", b.name))
            .chain(added.into_iter().map(ban_player_command))
            .collect();

        self.push_live(&commands).await?;
        state.banned_players.set(bans);
        Ok(())
    }
}
