use mcsc_model::{LaunchArguments, ServerConfig, VersionCatalog};

use crate::{
    controller::ServerController,
    error::{Result, ServerError},
    launch::validate_arguments,
};

impl ServerController {
    /// Installable versions, ascending.
    pub async fn versions(&self) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .await
            .versions
            .get_ref()?
            .keys()
            .cloned()
            .collect())
    }

    pub async fn version_catalog(&self) -> Result<VersionCatalog> {
        self.state.lock().await.versions.get()
    }

    pub async fn set_version_catalog(&self, catalog: VersionCatalog) {
        self.state.lock().await.versions.set(catalog);
    }

    pub async fn config(&self) -> Result<ServerConfig> {
        self.state.lock().await.config.get()
    }

    /// Selects the server version started next. Only catalog keys are
    /// accepted; on failure the current selection stays.
    pub async fn set_version(&self, version: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.versions.get_ref()?.contains_key(version) {
            return Err(ServerError::UnsupportedVersion(version.to_string()));
        }
        state.config.get_mut()?.version = version.to_string();
        tracing::info!(version, "server version selected");
        Ok(())
    }

    pub async fn set_config(&self, config: ServerConfig) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.versions.get_ref()?.contains_key(&config.version) {
            return Err(ServerError::UnsupportedVersion(config.version));
        }
        state.config.set(config);
        Ok(())
    }

    pub async fn arguments(&self) -> Result<LaunchArguments> {
        self.state.lock().await.arguments.get()
    }

    pub async fn set_arguments(&self, args: LaunchArguments) -> Result<()> {
        validate_arguments(&args)?;
        self.state.lock().await.arguments.set(args);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mcsc_model::VersionInfo;

    use super::*;
    use crate::controller::test_support::created;

    fn catalog(versions: &[&str]) -> VersionCatalog {
        versions
            .iter()
            .map(|v| {
                (
                    v.to_string(),
                    VersionInfo {
                        link: format!("https://example.invalid/{v}.jar"),
                        sum: String::new(),
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn unknown_version_keeps_selection() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        c.set_version_catalog(catalog(&["1.20.6", "1.20.4"])).await;

        let err = c.set_version("1.8.9").await.unwrap_err();
        assert!(matches!(err, ServerError::UnsupportedVersion(v) if v == "1.8.9"));
        assert_eq!(c.config().await.unwrap().version, "1.20.6");

        c.set_version("1.20.4").await.unwrap();
        assert_eq!(c.config().await.unwrap().version, "1.20.4");
    }

    #[tokio::test]
    async fn versions_are_sorted_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        c.set_version_catalog(catalog(&["1.20.6", "1.19.2", "1.20.4"])).await;
        assert_eq!(c.versions().await.unwrap(), vec!["1.19.2", "1.20.4", "1.20.6"]);
    }

    #[tokio::test]
    async fn set_config_validates_version() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        let err = c
            .set_config(ServerConfig {
                version: "0.0.1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::UnsupportedVersion(_)));
    }

    #[tokio::test]
    async fn invalid_arguments_are_not_stored() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        let bad = LaunchArguments {
            memory_start: 4,
            memory_max: 2,
            ..LaunchArguments::default()
        };
        assert!(matches!(
            c.set_arguments(bad).await,
            Err(ServerError::InvalidArguments(_))
        ));
        assert_eq!(c.arguments().await.unwrap(), LaunchArguments::default());
    }
}
