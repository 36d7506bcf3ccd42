use crate::aggregate::AggregateKind;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Coarse classification callers can branch on (e.g. to pick an HTTP status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotInitialized,
    NotFound,
    UnsupportedVersion,
    InvalidInput,
    Decode,
    Encode,
    Io,
    Artifact,
    Launch,
    Transport,
    LockTimeout,
    NotRunning,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0} has not been created or loaded")]
    NotInitialized(AggregateKind),

    #[error("player {name} is not in the server allowlist")]
    NotInAllowlist { name: String },

    #[error("IP {ip} is not in the ban list")]
    IpNotBanned { ip: String },

    #[error("player {name} is not in the banned players list")]
    PlayerNotBanned { name: String },

    #[error("player {name} is not in the server operator list")]
    NotAnOperator { name: String },

    #[error("unsupported server version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid launch arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid player: {0}")]
    InvalidPlayer(String),

    #[error("invalid IP address: {0}")]
    InvalidIp(String),

    #[error("invalid console command: {0}")]
    InvalidCommand(String),

    #[error("invalid ban reason: {0}")]
    InvalidBanReason(String),

    #[error("operator level {0} is out of range (0-4)")]
    InvalidOperatorLevel(u8),

    #[error("failed to decode {kind}: {source}")]
    Decode {
        kind: AggregateKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {kind}: {source}")]
    Encode {
        kind: AggregateKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server artifact unavailable: {0:#}")]
    Artifact(anyhow::Error),

    #[error("failed to launch server: {0}")]
    Launch(String),

    #[error("failed to write to server console: {0}")]
    Transport(#[source] std::io::Error),

    #[error("server console busy after {attempts} attempts")]
    LockTimeout { attempts: u32 },

    #[error("server is not running")]
    NotRunning,
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized(_) => ErrorKind::NotInitialized,
            Self::NotInAllowlist { .. }
            | Self::IpNotBanned { .. }
            | Self::PlayerNotBanned { .. }
            | Self::NotAnOperator { .. } => ErrorKind::NotFound,
            Self::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Self::InvalidArguments(_)
            | Self::InvalidPlayer(_)
            | Self::InvalidIp(_)
            | Self::InvalidCommand(_)
            | Self::InvalidBanReason(_)
            | Self::InvalidOperatorLevel(_) => ErrorKind::InvalidInput,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Encode { .. } => ErrorKind::Encode,
            Self::Io(_) => ErrorKind::Io,
            Self::Artifact(_) => ErrorKind::Artifact,
            Self::Launch(_) => ErrorKind::Launch,
            Self::Transport(_) => ErrorKind::Transport,
            Self::LockTimeout { .. } => ErrorKind::LockTimeout,
            Self::NotRunning => ErrorKind::NotRunning,
        }
    }

    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotInitialized => "not_initialized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UnsupportedVersion => "unsupported_version",
            ErrorKind::InvalidInput => "invalid_param",
            ErrorKind::Decode => "decode_failed",
            ErrorKind::Encode => "encode_failed",
            ErrorKind::Io => "io_error",
            ErrorKind::Artifact => "download_failed",
            ErrorKind::Launch => "spawn_failed",
            ErrorKind::Transport => "console_write_failed",
            ErrorKind::LockTimeout => "console_busy",
            ErrorKind::NotRunning => "not_running",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_errors_share_not_found_kind() {
        let errs = [
            ServerError::NotInAllowlist {
                name: "a".to_string(),
            },
            ServerError::IpNotBanned {
                ip: "127.0.0.1".to_string(),
            },
            ServerError::PlayerNotBanned {
                name: "a".to_string(),
            },
            ServerError::NotAnOperator {
                name: "a".to_string(),
            },
        ];
        for err in errs {
            assert!(err.is_not_found(), "{err}");
            assert_eq!(err.code(), "not_found");
        }
    }

    #[test]
    fn not_initialized_names_the_aggregate() {
        let err = ServerError::NotInitialized(AggregateKind::BannedIps);
        assert_eq!(err.to_string(), "banned IPs has not been created or loaded");
    }
}
