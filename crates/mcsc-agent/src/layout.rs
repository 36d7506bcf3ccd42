use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::aggregate::AggregateKind;

/// Where each aggregate lives on disk.
#[derive(Debug, Clone)]
pub struct ServerPaths {
    pub server_dir: PathBuf,
    pub versions_file: PathBuf,
}

impl ServerPaths {
    pub fn new(server_dir: impl Into<PathBuf>, versions_file: impl Into<PathBuf>) -> Self {
        Self {
            server_dir: server_dir.into(),
            versions_file: versions_file.into(),
        }
    }

    pub fn aggregate(&self, kind: AggregateKind) -> PathBuf {
        match kind {
            AggregateKind::Versions => self.versions_file.clone(),
            _ => self.server_dir.join(kind.file_name()),
        }
    }

    /// The rendered file the game server reads at boot.
    pub fn server_properties(&self) -> PathBuf {
        self.server_dir.join("server.properties")
    }

    pub fn server_jar(&self, version: &str) -> PathBuf {
        self.server_dir.join(server_jar_name(version))
    }
}

pub fn server_jar_name(version: &str) -> String {
    format!("server-{version}.jar")
}

/// Creates the server directory. The EULA file is only written when the
/// directory is new, so an operator can still edit it afterwards.
pub fn prepare_server_dir(dir: &Path) -> io::Result<()> {
    match fs::create_dir(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir)?;
        }
        Err(e) => return Err(e),
    }

    fs::write(dir.join("eula.txt"), b"eula=TRUE\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_writes_eula_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("server-data");

        prepare_server_dir(&dir).unwrap();
        assert_eq!(fs::read_to_string(dir.join("eula.txt")).unwrap(), "eula=TRUE\n");

        fs::write(dir.join("eula.txt"), "eula=false\n").unwrap();
        prepare_server_dir(&dir).unwrap();
        assert_eq!(fs::read_to_string(dir.join("eula.txt")).unwrap(), "eula=false\n");
    }

    #[test]
    fn aggregate_paths_follow_server_file_names() {
        let paths = ServerPaths::new("/srv/mc", "/etc/mcsc/versions.json");
        assert_eq!(
            paths.aggregate(AggregateKind::Allowlist),
            PathBuf::from("/srv/mc/whitelist.json")
        );
        assert_eq!(
            paths.aggregate(AggregateKind::Versions),
            PathBuf::from("/etc/mcsc/versions.json")
        );
        assert_eq!(
            paths.server_jar("1.20.6"),
            PathBuf::from("/srv/mc/server-1.20.6.jar")
        );
    }
}
