use std::{path::PathBuf, time::Duration};

const DEFAULT_LOG_MAX_LINES: usize = 1000;
const DEFAULT_LOCK_ATTEMPTS: u32 = 4;
const DEFAULT_LOCK_BACKOFF_MS: u64 = 1000;

pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn env_usize(name: &str) -> Option<usize> {
    env_string(name).and_then(|v| v.parse::<usize>().ok())
}

pub(crate) fn env_u64(name: &str) -> Option<u64> {
    env_string(name).and_then(|v| v.parse::<u64>().ok())
}

/// Retry policy for taking the console lock without blocking forever.
///
/// Attempt `n` (0-based) that fails sleeps `base * 10^(n/2)` before the next
/// try, i.e. 1s, ~3.2s, 10s with the default base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRetry {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for LockRetry {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_LOCK_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_LOCK_BACKOFF_MS),
        }
    }
}

impl LockRetry {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 10f64.powf(f64::from(attempt.min(16)) / 2.0);
        self.base_delay.mul_f64(factor)
    }
}

/// Runtime settings, read from `MCSC_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub versions_file: PathBuf,
    pub java: String,
    pub console_lock: LockRetry,
    pub log_max_lines: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            data_dir: PathBuf::from("server-data"),
            versions_file: PathBuf::from("data/server-download-links.json"),
            java: "java".to_string(),
            console_lock: LockRetry::default(),
            log_max_lines: DEFAULT_LOG_MAX_LINES,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("MCSC_HOST").unwrap_or(defaults.host),
            port: env_string("MCSC_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            data_dir: env_string("MCSC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            versions_file: env_string("MCSC_VERSIONS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.versions_file),
            java: env_string("MCSC_JAVA").unwrap_or(defaults.java),
            console_lock: LockRetry {
                attempts: env_u64("MCSC_CONSOLE_LOCK_ATTEMPTS")
                    .map(|v| v.clamp(1, 10) as u32)
                    .unwrap_or(DEFAULT_LOCK_ATTEMPTS),
                base_delay: Duration::from_millis(
                    env_u64("MCSC_CONSOLE_LOCK_BACKOFF_MS")
                        .map(|v| v.clamp(10, 60_000))
                        .unwrap_or(DEFAULT_LOCK_BACKOFF_MS),
                ),
            },
            log_max_lines: env_usize("MCSC_LOG_MAX_LINES")
                .map(|v| v.clamp(100, 50_000))
                .unwrap_or(DEFAULT_LOG_MAX_LINES),
        }
    }
}
