//! The single entry point for everything callers can do to the server.
//!
//! All aggregates sit behind one async mutex. A mutation that affects a
//! running server is pushed to its console before the in-memory value
//! changes, so a failed write leaves the aggregate untouched. Start and
//! restart snapshot what they need and release the mutex before launching.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
};

use mcsc_model::{
    Allowlist, BannedIpList, BannedPlayerList, LaunchArguments, OperatorList, RuntimeProperties,
    ServerConfig, ServerStatus, VersionCatalog,
};
use tokio::sync::Mutex;

use crate::{
    aggregate::{AggregateKind, DynSlot, Slot},
    error::{Result, ServerError},
    layout::{ServerPaths, prepare_server_dir},
    properties::write_server_properties,
    settings::{LockRetry, Settings},
    supervisor::{LaunchPlan, Supervisor},
};

#[derive(Debug, Default)]
pub(crate) struct Aggregates {
    pub(crate) allowlist: Slot<Allowlist>,
    pub(crate) banned_ips: Slot<BannedIpList>,
    pub(crate) banned_players: Slot<BannedPlayerList>,
    pub(crate) operators: Slot<OperatorList>,
    pub(crate) properties: Slot<RuntimeProperties>,
    pub(crate) arguments: Slot<LaunchArguments>,
    pub(crate) config: Slot<ServerConfig>,
    pub(crate) versions: Slot<VersionCatalog>,
}

impl Aggregates {
    fn slot(&self, kind: AggregateKind) -> &dyn DynSlot {
        match kind {
            AggregateKind::Allowlist => &self.allowlist,
            AggregateKind::BannedIps => &self.banned_ips,
            AggregateKind::BannedPlayers => &self.banned_players,
            AggregateKind::Operators => &self.operators,
            AggregateKind::Properties => &self.properties,
            AggregateKind::Arguments => &self.arguments,
            AggregateKind::Config => &self.config,
            AggregateKind::Versions => &self.versions,
        }
    }

    fn slot_mut(&mut self, kind: AggregateKind) -> &mut dyn DynSlot {
        match kind {
            AggregateKind::Allowlist => &mut self.allowlist,
            AggregateKind::BannedIps => &mut self.banned_ips,
            AggregateKind::BannedPlayers => &mut self.banned_players,
            AggregateKind::Operators => &mut self.operators,
            AggregateKind::Properties => &mut self.properties,
            AggregateKind::Arguments => &mut self.arguments,
            AggregateKind::Config => &mut self.config,
            AggregateKind::Versions => &mut self.versions,
        }
    }
}

#[derive(Debug)]
pub struct ServerController {
    paths: ServerPaths,
    runtime: String,
    lock_retry: LockRetry,
    pub(crate) state: Mutex<Aggregates>,
    supervisor: Supervisor,
}

impl ServerController {
    pub fn new(
        paths: ServerPaths,
        runtime: impl Into<String>,
        lock_retry: LockRetry,
        log_max_lines: usize,
    ) -> Self {
        Self {
            paths,
            runtime: runtime.into(),
            lock_retry,
            state: Mutex::new(Aggregates::default()),
            supervisor: Supervisor::new(log_max_lines),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ServerPaths::new(&settings.data_dir, &settings.versions_file),
            settings.java.clone(),
            settings.console_lock,
            settings.log_max_lines,
        )
    }

    pub fn paths(&self) -> &ServerPaths {
        &self.paths
    }

    /// Replaces the held value of `kind` with its initial value.
    pub async fn create(&self, kind: AggregateKind) {
        self.state.lock().await.slot_mut(kind).create();
    }

    pub async fn load(&self, kind: AggregateKind, mut reader: impl Read) -> Result<()> {
        self.state.lock().await.slot_mut(kind).load(&mut reader)
    }

    pub async fn save(&self, kind: AggregateKind, mut writer: impl Write) -> Result<()> {
        self.state.lock().await.slot(kind).save(&mut writer)
    }

    pub async fn is_initialized(&self, kind: AggregateKind) -> bool {
        self.state.lock().await.slot(kind).is_initialized()
    }

    /// Provisions every aggregate from its backing file. A missing file is
    /// created from the initial value and written back.
    pub async fn load_configs(&self) -> Result<()> {
        prepare_server_dir(&self.paths.server_dir)?;

        let mut state = self.state.lock().await;
        for kind in AggregateKind::ALL {
            let path = self.paths.aggregate(kind);
            let slot = state.slot_mut(kind);
            slot.create();
            match File::open(&path) {
                Ok(file) => {
                    slot.load(&mut BufReader::new(file))?;
                    tracing::debug!(%kind, path = %path.display(), "loaded");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if let Some(parent) = path.parent()
                        && !parent.as_os_str().is_empty()
                    {
                        fs::create_dir_all(parent)?;
                    }
                    slot.save(&mut BufWriter::new(File::create(&path)?))?;
                    tracing::info!(%kind, path = %path.display(), "created with defaults");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Writes every aggregate back to its file and renders
    /// `server.properties`. The version catalog is never written.
    pub async fn save_all(&self) -> Result<()> {
        let state = self.state.lock().await;
        for kind in AggregateKind::ALL {
            if kind == AggregateKind::Versions {
                continue;
            }
            let path = self.paths.aggregate(kind);
            state
                .slot(kind)
                .save(&mut BufWriter::new(File::create(&path)?))?;
        }
        write_server_properties(
            &self.paths.server_properties(),
            state.properties.get_ref()?,
        )?;
        tracing::info!(dir = %self.paths.server_dir.display(), "configuration saved");
        Ok(())
    }

    fn launch_plan(&self, state: &Aggregates) -> Result<LaunchPlan> {
        let version = state.config.get_ref()?.version.clone();
        let version_info = state
            .versions
            .get_ref()?
            .get(&version)
            .cloned()
            .ok_or_else(|| ServerError::UnsupportedVersion(version.clone()))?;
        Ok(LaunchPlan {
            server_dir: self.paths.server_dir.clone(),
            jar: self.paths.server_jar(&version),
            runtime: self.runtime.clone(),
            version,
            version_info,
            arguments: state.arguments.get()?,
        })
    }

    /// Snapshots the launch inputs and renders `server.properties` while
    /// holding the aggregates. The lock is released on return.
    async fn prepare_launch(&self) -> Result<LaunchPlan> {
        let state = self.state.lock().await;
        let plan = self.launch_plan(&state)?;
        write_server_properties(
            &self.paths.server_properties(),
            state.properties.get_ref()?,
        )?;
        Ok(plan)
    }

    pub async fn start(&self) -> Result<ServerStatus> {
        let plan = self.prepare_launch().await?;
        self.supervisor.start(plan).await
    }

    pub async fn stop(&self) -> Result<ServerStatus> {
        let _state = self.state.lock().await;
        self.supervisor.stop().await
    }

    pub async fn restart(&self) -> Result<ServerStatus> {
        let plan = self.prepare_launch().await?;
        self.supervisor.restart(plan).await
    }

    pub async fn status(&self) -> ServerStatus {
        self.supervisor.status().await
    }

    /// Sends an arbitrary console command. The console lock is try-locked
    /// with backoff rather than awaited.
    pub async fn run_command(&self, command: &str) -> Result<()> {
        let bridge = self
            .supervisor
            .bridge()
            .await
            .ok_or(ServerError::NotRunning)?;
        let mut guard = bridge.lock_with_retry(self.lock_retry).await?;
        guard.send_command(command).await
    }

    pub async fn console_log(&self, cursor: u64, limit: usize) -> (Vec<String>, u64) {
        self.supervisor.console_log(cursor, limit).await
    }

    /// Sends `commands` in order to the live console, if there is one,
    /// holding the console lock for the whole batch.
    pub(crate) async fn push_live(&self, commands: &[String]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        let Some(bridge) = self.supervisor.bridge().await else {
            return Ok(());
        };
        let mut guard = bridge.lock().await;
        for command in commands {
            guard.send_command(command).await?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn attach_console(
        &self,
        bridge: std::sync::Arc<crate::console::ConsoleBridge>,
    ) {
        self.supervisor.attach_bridge(bridge).await;
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mcsc_model::{PlayerRef, VersionInfo};

    use super::{test_support::*, *};

    #[tokio::test]
    async fn load_configs_creates_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let c = controller(tmp.path());
        c.load_configs().await.unwrap();

        let server = tmp.path().join("server");
        assert_eq!(fs::read_to_string(server.join("whitelist.json")).unwrap(), "[]\n");
        assert_eq!(
            fs::read_to_string(server.join("config.json")).unwrap(),
            "{\"version\":\"1.20.6\"}\n"
        );
        assert_eq!(fs::read_to_string(tmp.path().join("versions.json")).unwrap(), "{}\n");
        assert_eq!(fs::read_to_string(server.join("eula.txt")).unwrap(), "eula=TRUE\n");
        for kind in AggregateKind::ALL {
            assert!(c.is_initialized(kind).await, "{kind}");
        }
    }

    #[tokio::test]
    async fn load_configs_reads_existing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let server = tmp.path().join("server");
        fs::create_dir_all(&server).unwrap();
        fs::write(
            server.join("whitelist.json"),
            r#"[{"name":"player1","uuid":"052acc86-065d-49f6-b518-c508a7cf55ae"}]"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join("versions.json"),
            r#"{"1.20.4":{"link":"https://example.invalid/a.jar","sum":""}}"#,
        )
        .unwrap();

        let c = controller(tmp.path());
        c.load_configs().await.unwrap();
        assert_eq!(
            c.allowlist().await.unwrap(),
            vec![PlayerRef::new("player1", "052acc86-065d-49f6-b518-c508a7cf55ae")]
        );
        assert_eq!(c.versions().await.unwrap(), vec!["1.20.4".to_string()]);
    }

    #[tokio::test]
    async fn load_configs_surfaces_decode_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let server = tmp.path().join("server");
        fs::create_dir_all(&server).unwrap();
        fs::write(server.join("ops.json"), "{not json").unwrap();

        let err = controller(tmp.path()).load_configs().await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Decode {
                kind: AggregateKind::Operators,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn generic_operations_refuse_uninitialized_aggregates() {
        let tmp = tempfile::tempdir().unwrap();
        let c = controller(tmp.path());
        let err = c.load(AggregateKind::Operators, "[]".as_bytes()).await.unwrap_err();
        assert!(matches!(err, ServerError::NotInitialized(AggregateKind::Operators)));
        assert!(c.save(AggregateKind::Config, Vec::new()).await.is_err());
        assert!(c.allowlist().await.is_err());

        c.create(AggregateKind::Operators).await;
        c.load(AggregateKind::Operators, "[]".as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn save_all_writes_files_and_properties() {
        let tmp = tempfile::tempdir().unwrap();
        let c = controller(tmp.path());
        c.load_configs().await.unwrap();
        c.allow_player(PlayerRef::new("a", "1")).await.unwrap();
        c.save_all().await.unwrap();

        let server = tmp.path().join("server");
        assert_eq!(
            fs::read_to_string(server.join("whitelist.json")).unwrap(),
            "[{\"name\":\"a\",\"uuid\":\"1\"}]\n"
        );
        let props = fs::read_to_string(server.join("server.properties")).unwrap();
        assert!(props.contains("\nmotd=A Minecraft Server\n"), "{props}");
    }

    #[tokio::test]
    async fn start_with_unknown_version_fails_before_spawning() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        let err = c.start().await.unwrap_err();
        assert!(matches!(err, ServerError::UnsupportedVersion(v) if v == "1.20.6"));
        assert_eq!(c.status().await.state, mcsc_model::ServerState::Stopped);
    }

    #[tokio::test]
    async fn run_command_requires_a_running_server() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        assert!(matches!(
            c.run_command("/list").await,
            Err(ServerError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn run_command_writes_one_line() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        let mut console = attach(&c).await;
        c.run_command("/say hello").await.unwrap();
        assert_eq!(console.received().await, "/say hello\n");
    }

    #[tokio::test]
    async fn run_command_times_out_on_a_busy_console() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        let console = attach(&c).await;

        let _held = console.bridge.lock().await;
        let err = tokio::time::timeout(Duration::from_secs(5), c.run_command("/list"))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ServerError::LockTimeout { attempts: 2 }));
    }

    #[tokio::test]
    async fn start_uses_catalog_entry_for_selected_version() {
        let tmp = tempfile::tempdir().unwrap();
        let c = created(tmp.path()).await;
        {
            let mut state = c.state.lock().await;
            state.versions.set(
                [(
                    "1.20.6".to_string(),
                    VersionInfo {
                        link: "https://example.invalid/server.jar".to_string(),
                        sum: String::new(),
                    },
                )]
                .into(),
            );
            let plan = c.launch_plan(&state).unwrap();
            assert_eq!(plan.version, "1.20.6");
            assert_eq!(plan.runtime, "java");
            assert_eq!(plan.server_dir, tmp.path().join("server"));
            assert_eq!(plan.jar, tmp.path().join("server/server-1.20.6.jar"));
        }
    }

    #[tokio::test]
    async fn aggregates_stay_available_while_a_start_downloads() {
        let tmp = tempfile::tempdir().unwrap();
        let c = std::sync::Arc::new(controller(tmp.path()));
        c.load_configs().await.unwrap();
        c.set_version_catalog(
            [(
                "1.20.6".to_string(),
                VersionInfo {
                    link: crate::download::stalled_link().await,
                    sum: String::new(),
                },
            )]
            .into(),
        )
        .await;

        let starting = tokio::spawn({
            let c = c.clone();
            async move { c.start().await }
        });
        for _ in 0..100 {
            if c.status().await.state == mcsc_model::ServerState::Starting {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(c.status().await.state, mcsc_model::ServerState::Starting);

        let read = tokio::time::timeout(Duration::from_secs(2), c.allowlist()).await;
        assert!(read.expect("allowlist read blocked by start").unwrap().is_empty());
        tokio::time::timeout(Duration::from_secs(2), c.allow_player(PlayerRef::new("a", "1")))
            .await
            .expect("allowlist write blocked by start")
            .unwrap();

        starting.abort();
    }
}
