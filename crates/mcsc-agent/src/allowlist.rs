use mcsc_model::{Allowlist, PlayerRef};

use crate::{
    aggregate::sorted_diff,
    controller::ServerController,
    error::{Result, ServerError},
};

/// Player names end up verbatim in console commands, so anything the console
/// would read as more than one name is refused before any state changes.
pub(crate) fn require_player(player: &PlayerRef) -> Result<()> {
    if !player.is_lookup_key() {
        return Err(ServerError::InvalidPlayer(
            "name and uuid must both be set".to_string(),
        ));
    }
    let name = &player.name;
    if name.starts_with('@') {
        return Err(ServerError::InvalidPlayer(format!(
            "{name:?} is a target selector, not a name"
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ServerError::InvalidPlayer(format!(
            "{name:?} contains whitespace or control characters"
        )));
    }
    Ok(())
}

impl ServerController {
    pub async fn allowlist(&self) -> Result<Allowlist> {
        self.state.lock().await.allowlist.get()
    }

    pub async fn allow_player(&self, player: PlayerRef) -> Result<()> {
        require_player(&player)?;
        let mut state = self.state.lock().await;
        state.allowlist.get_ref()?;

        self.push_live(&[format!("/whitelist add {}", player.name)])
            .await?;
        state.allowlist.get_mut()?.push(player);
        Ok(())
    }

    pub async fn disallow_player(&self, player: &PlayerRef) -> Result<()> {
        require_player(player)?;
        let mut state = self.state.lock().await;
        let idx = state
            .allowlist
            .get_ref()?
            .iter()
            .position(|p| p.same_identity(&player.name, &player.uuid))
            .ok_or_else(|| ServerError::NotInAllowlist {
                name: player.name.clone(),
            })?;

        self.push_live(&[format!("/whitelist remove {}", player.name)])
            .await?;
        state.allowlist.get_mut()?.remove(idx);
        Ok(())
    }

    /// Replaces the allowlist, telling a running server about every name that
    /// was added or dropped.
    pub async fn set_allowlist(&self, players: Allowlist) -> Result<()> {
        for p in &players {
            require_player(p)?;
        }
        let mut state = self.state.lock().await;
        let old = state.allowlist.get_ref().cloned().unwrap_or_default();

        let (removed, added) = sorted_diff(&old, &players, |p| p.name.as_str());
        let commands: Vec<String> = removed
            .into_iter()
            .map(|p| format!("/whitelist remove {}", p.name))
            .chain(added.into_iter().map(|p| format!("/whitelist add {}", p.name)))
            .collect();

        self.push_live(&commands).await?;
        state.allowlist.set(players);
        Ok(())
    }
}
