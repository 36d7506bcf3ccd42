//! Supervision of the single game-server subprocess.
//!
//! Lifecycle: Stopped -> Starting -> Running -> Stopping -> Stopped. Entering
//! Starting bumps a run generation so the exit watcher of an old run never
//! touches the state of a newer one, even while that one is still starting.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use mcsc_model::{LaunchArguments, ServerState, ServerStatus, VersionInfo};
use tokio::{
    process::Command,
    sync::{Mutex, watch},
};

use crate::{
    console::{ConsoleBridge, LogBuffer, LogSource, spawn_output_pumps},
    download::ensure_server_jar,
    error::{Result, ServerError},
    launch::resolve_launch_spec,
};

/// How long `restart` waits for the previous run to exit before the stray
/// reaper takes over.
const RESTART_GRACE: Duration = Duration::from_secs(30);

/// Everything needed to bring a server up, snapshotted from the aggregates.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub server_dir: PathBuf,
    pub jar: PathBuf,
    pub runtime: String,
    pub version: String,
    pub version_info: VersionInfo,
    pub arguments: LaunchArguments,
}

#[derive(Debug)]
struct Run {
    state: ServerState,
    generation: u64,
    pid: Option<u32>,
    version: Option<String>,
    exit_code: Option<i32>,
    message: Option<String>,
    bridge: Option<Arc<ConsoleBridge>>,
    exited: Option<watch::Receiver<bool>>,
}

impl Run {
    fn status(&self) -> ServerStatus {
        ServerStatus {
            state: self.state,
            pid: self.pid,
            version: self.version.clone(),
            exit_code: self.exit_code,
            message: self.message.clone(),
        }
    }

    fn revert(&mut self, message: String) {
        self.state = ServerState::Stopped;
        self.pid = None;
        self.bridge = None;
        self.message = Some(message);
    }
}

#[derive(Debug, Clone)]
pub struct Supervisor {
    inner: Arc<Mutex<Run>>,
    log: Arc<Mutex<LogBuffer>>,
}

impl Supervisor {
    pub fn new(log_max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Run {
                state: ServerState::Stopped,
                generation: 0,
                pid: None,
                version: None,
                exit_code: None,
                message: None,
                bridge: None,
                exited: None,
            })),
            log: Arc::new(Mutex::new(LogBuffer::new(log_max_lines))),
        }
    }

    pub async fn status(&self) -> ServerStatus {
        self.inner.lock().await.status()
    }

    /// The console of the current run, if one is attached.
    pub async fn bridge(&self) -> Option<Arc<ConsoleBridge>> {
        self.inner.lock().await.bridge.clone()
    }

    pub async fn console_log(&self, cursor: u64, limit: usize) -> (Vec<String>, u64) {
        self.log.lock().await.tail_after(cursor, limit)
    }

    pub async fn start(&self, plan: LaunchPlan) -> Result<ServerStatus> {
        let spec = resolve_launch_spec(&plan.runtime, &plan.version, &plan.arguments)?;

        let generation = {
            let mut run = self.inner.lock().await;
            match run.state {
                ServerState::Running if run.pid.is_some_and(pid_alive) => {
                    return Ok(run.status());
                }
                ServerState::Starting | ServerState::Stopping => return Ok(run.status()),
                _ => {}
            }
            run.generation = run.generation.wrapping_add(1);
            run.state = ServerState::Starting;
            run.pid = None;
            run.bridge = None;
            run.exit_code = None;
            run.version = Some(plan.version.clone());
            run.message = Some("preparing server jar".to_string());
            run.generation
        };

        if let Err(e) = ensure_server_jar(&plan.jar, &plan.version, &plan.version_info).await
        {
            let detail = format!("{e:#}");
            tracing::warn!(version = %plan.version, error = %detail, "server jar unavailable");
            self.inner
                .lock()
                .await
                .revert(format!("server jar unavailable: {detail}"));
            return Err(ServerError::Artifact(e));
        }

        reap_strays(&plan.runtime).await;

        let mut cmd = Command::new(&spec.exec);
        cmd.current_dir(&plan.server_dir)
            .args(&spec.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        #[cfg(unix)]
        {
            unsafe {
                cmd.pre_exec(|| {
                    set_parent_death_signal()?;
                    if libc::setsid() == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let msg = format!("spawn {} (cwd {}): {e}", spec.exec, plan.server_dir.display());
                self.inner.lock().await.revert(msg.clone());
                return Err(ServerError::Launch(msg));
            }
        };
        let bridge = match ConsoleBridge::from_child(&mut child) {
            Ok(bridge) => Arc::new(bridge),
            Err(e) => {
                let _ = child.start_kill();
                self.inner.lock().await.revert(e.to_string());
                return Err(e);
            }
        };
        let pid = child.id();

        let command_line = spec.command_line();
        tracing::info!(pid, command = %command_line, cwd = %plan.server_dir.display(), "server started");
        self.log
            .lock()
            .await
            .push(LogSource::Supervisor, format!("exec: {command_line}"));
        spawn_output_pumps(bridge.clone(), self.log.clone());

        let (exited_tx, exited_rx) = watch::channel(false);
        let status = {
            let mut run = self.inner.lock().await;
            run.state = ServerState::Running;
            run.pid = pid;
            run.message = None;
            run.bridge = Some(bridge);
            run.exited = Some(exited_rx);
            run.status()
        };

        let inner = self.inner.clone();
        let log = self.log.clone();
        tokio::spawn(async move {
            let res = child.wait().await;
            let detached = {
                let mut run = inner.lock().await;
                if run.generation != generation {
                    None
                } else {
                    match &res {
                        Ok(status) => run.exit_code = status.code(),
                        Err(e) => run.message = Some(format!("wait failed: {e}")),
                    }
                    if run.state == ServerState::Running {
                        run.message = Some(match run.exit_code {
                            Some(code) => format!("exited with code {code}"),
                            None => "exited".to_string(),
                        });
                    }
                    run.state = ServerState::Stopped;
                    run.pid = None;
                    run.bridge.take()
                }
            };
            if let Some(bridge) = detached {
                bridge.lock().await.close().await;
            }
            match res {
                Ok(status) => {
                    tracing::info!(pid, code = status.code(), "server exited");
                    log.lock()
                        .await
                        .push(LogSource::Supervisor, format!("server exited ({status})"));
                }
                Err(e) => tracing::warn!(pid, error = %e, "waiting on server failed"),
            }
            let _ = exited_tx.send(true);
        });

        Ok(status)
    }

    /// Asks the server to stop and detaches its console.
    ///
    /// `/stop` is only sent when the console lock is free right now; a busy
    /// console skips the graceful command. No signal is ever sent.
    pub async fn stop(&self) -> Result<ServerStatus> {
        let (bridge, pid) = {
            let mut run = self.inner.lock().await;
            if run.state != ServerState::Running {
                return Ok(run.status());
            }
            run.state = ServerState::Stopping;
            (run.bridge.take(), run.pid)
        };

        if let Some(bridge) = bridge {
            match bridge.try_lock() {
                Some(mut guard) => {
                    if let Err(e) = guard.send_command("/stop").await {
                        tracing::warn!(pid, error = %e, "failed to send /stop");
                    }
                    guard.close().await;
                }
                None => {
                    tracing::warn!(pid, "console busy, skipping graceful /stop");
                }
            }
        }

        let mut run = self.inner.lock().await;
        if run.state == ServerState::Stopping {
            run.state = ServerState::Stopped;
            run.pid = None;
            run.message = Some("stop requested".to_string());
        }
        tracing::info!(pid, "server stop requested");
        Ok(run.status())
    }

    /// Stop, give the old process a bounded grace period to exit, then start.
    pub async fn restart(&self, plan: LaunchPlan) -> Result<ServerStatus> {
        let exited = self.inner.lock().await.exited.clone();
        self.stop().await?;
        if let Some(mut exited) = exited
            && tokio::time::timeout(RESTART_GRACE, exited.wait_for(|done| *done))
                .await
                .is_err()
        {
            tracing::warn!("previous server run did not exit in time");
        }
        self.start(plan).await
    }

    #[cfg(test)]
    pub(crate) async fn attach_bridge(&self, bridge: Arc<ConsoleBridge>) {
        let mut run = self.inner.lock().await;
        run.generation = run.generation.wrapping_add(1);
        run.state = ServerState::Running;
        run.bridge = Some(bridge);
    }
}

#[cfg(target_os = "linux")]
unsafe fn set_parent_death_signal() -> std::io::Result<()> {
    // NOTE: `unsafe fn` bodies are not implicitly unsafe in Rust 2024.
    let rc = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) };
    if rc == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
unsafe fn set_parent_death_signal() -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    true
}

fn is_server_jar(arg: &str) -> bool {
    Path::new(arg)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("server-") && n.ends_with(".jar"))
}

/// True for `<runtime> ... -jar server-<version>.jar ...`.
fn is_server_command(args: &str, runtime: &str) -> bool {
    let mut tokens = args.split_whitespace();
    let Some(exe) = tokens.next() else {
        return false;
    };
    if Path::new(exe).file_name() != Path::new(runtime).file_name() {
        return false;
    }
    let mut after_jar = false;
    for token in tokens {
        if after_jar {
            return is_server_jar(token);
        }
        after_jar = token == "-jar";
    }
    false
}

/// Parses `ps -eo pid=,args=` output into pids of server instances other
/// than `own_pid`.
fn find_stray_pids(ps_output: &str, runtime: &str, own_pid: u32) -> Vec<u32> {
    ps_output
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (pid, args) = line.split_once(char::is_whitespace)?;
            let pid = pid.parse::<u32>().ok()?;
            (pid != own_pid && is_server_command(args.trim(), runtime)).then_some(pid)
        })
        .collect()
}

/// Kills server instances left over from an earlier controller. Best-effort.
#[cfg(unix)]
async fn reap_strays(runtime: &str) {
    let out = match Command::new("ps").args(["-eo", "pid=,args="]).output().await {
        Ok(out) if out.status.success() => out,
        Ok(out) => {
            tracing::warn!(status = %out.status, "ps failed, skipping stray scan");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "ps unavailable, skipping stray scan");
            return;
        }
    };
    let listing = String::from_utf8_lossy(&out.stdout);
    for pid in find_stray_pids(&listing, runtime, std::process::id()) {
        let Ok(raw) = i32::try_from(pid) else {
            continue;
        };
        tracing::warn!(pid, "killing stray server instance");
        if unsafe { libc::kill(raw, libc::SIGKILL) } == -1 {
            tracing::warn!(pid, error = %std::io::Error::last_os_error(), "failed to kill stray server");
        }
    }
}

#[cfg(not(unix))]
async fn reap_strays(_runtime: &str) {}
