use mcsc_model::{MAX_OPERATOR_LEVEL, Operator, OperatorList, PlayerRef};

use crate::{
    aggregate::sorted_diff,
    allowlist::require_player,
    controller::ServerController,
    error::{Result, ServerError},
};

fn require_operator(op: &Operator) -> Result<()> {
    require_player(&op.player())?;
    if op.level > MAX_OPERATOR_LEVEL {
        return Err(ServerError::InvalidOperatorLevel(op.level));
    }
    Ok(())
}

impl ServerController {
    pub async fn operators(&self) -> Result<OperatorList> {
        self.state.lock().await.operators.get()
    }

    pub async fn op(&self, op: Operator) -> Result<()> {
        require_operator(&op)?;
        let mut state = self.state.lock().await;
        state.operators.get_ref()?;

        self.push_live(&[format!("/op {}", op.name)]).await?;
        state.operators.get_mut()?.push(op);
        Ok(())
    }

    pub async fn deop(&self, player: &PlayerRef) -> Result<()> {
        require_player(player)?;
        let mut state = self.state.lock().await;
        let idx = state
            .operators
            .get_ref()?
            .iter()
            .position(|o| o.player().same_identity(&player.name, &player.uuid))
            .ok_or_else(|| ServerError::NotAnOperator {
                name: player.name.clone(),
            })?;

        self.push_live(&[format!("/deop {}", player.name)]).await?;
        state.operators.get_mut()?.remove(idx);
        Ok(())
    }

    pub async fn set_operators(&self, ops: OperatorList) -> Result<()> {
        for op in &ops {
            require_operator(op)?;
        }
        let mut state = self.state.lock().await;
        let old = state.operators.get_ref().cloned().unwrap_or_default();

        let (removed, added) = sorted_diff(&old, &ops, |o| o.name.as_str());
        let commands: Vec<String> = removed
            .into_iter()
            .map(|o| format!("/deop {}", o.name))
            .chain(added.into_iter().map(|o| format!("/op {}", o.name)))
            .collect();

        self.push_live(&commands).await?;
        state.operators.set(ops);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::{attach, created};

    fn operator(name: &str, uuid: &str, level: u8) -> Operator {
        Operator {
            bypasses_player_limit: false,
            level,
            name: name.to_string(),
            uuid: uuid.to_string(),
        }
    }

    #[tokio::test]
    async fn op_then_deop() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;

        c.op(operator("admin", "1", 4)).await.unwrap();
        c.op(operator("mod", "2", 2)).await.unwrap();
        c.deop(&PlayerRef::new("admin", "1")).await.unwrap();

        assert_eq!(c.operators().await.unwrap(), vec![operator("mod", "2", 2)]);
        assert!(matches!(
            c.deop(&PlayerRef::new("admin", "1")).await,
            Err(ServerError::NotAnOperator { .. })
        ));
    }

    #[tokio::test]
    async fn level_above_four_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        assert!(matches!(
            c.op(operator("admin", "1", 5)).await,
            Err(ServerError::InvalidOperatorLevel(5))
        ));
        assert!(c.set_operators(vec![operator("x", "1", 9)]).await.is_err());
        assert!(c.operators().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn selector_is_never_opped() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        let mut console = attach(&c).await;

        let err = c.op(operator("@a", "1", 4)).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidPlayer(_)), "{err}");
        assert!(
            c.set_operators(vec![operator("some one", "2", 1)])
                .await
                .is_err()
        );

        assert!(c.operators().await.unwrap().is_empty());
        assert_eq!(console.received().await, "");
    }

    #[tokio::test]
    async fn live_server_receives_op_commands() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        c.set_operators(vec![operator("old", "1", 4)]).await.unwrap();

        let mut console = attach(&c).await;
        c.op(operator("admin", "2", 4)).await.unwrap();
        c.set_operators(vec![operator("admin", "2", 4), operator("new", "3", 1)])
            .await
            .unwrap();

        assert_eq!(
            console.received().await,
            "/op admin\n/deop old\n/op new\n"
        );
    }
}
