use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use anyhow::Context;
use mcsc_model::VersionInfo;
use reqwest::Url;
use sha1::Digest;

const DOWNLOAD_ATTEMPTS: u32 = 3;

/// Expected digest of a server jar, picked by the length of the hex string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksum {
    Md5(String),
    Sha1(String),
}

impl Checksum {
    /// `Ok(None)` for an empty sum, which disables verification.
    pub fn parse(sum: &str) -> anyhow::Result<Option<Self>> {
        let sum = sum.trim().to_ascii_lowercase();
        if sum.is_empty() {
            return Ok(None);
        }
        if !sum.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("checksum is not hex: {sum}");
        }
        match sum.len() {
            32 => Ok(Some(Self::Md5(sum))),
            40 => Ok(Some(Self::Sha1(sum))),
            n => anyhow::bail!("unsupported checksum length {n} (expected md5 or sha1)"),
        }
    }

    fn expected(&self) -> &str {
        match self {
            Self::Md5(s) | Self::Sha1(s) => s,
        }
    }

    fn compute(&self, bytes: &[u8]) -> String {
        match self {
            Self::Md5(_) => hex::encode(md5::Md5::digest(bytes)),
            Self::Sha1(_) => hex::encode(sha1::Sha1::digest(bytes)),
        }
    }

    pub fn verify(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let got = self.compute(bytes);
        if got != self.expected() {
            anyhow::bail!(
                "checksum mismatch: expected {}, got {got}",
                self.expected()
            );
        }
        Ok(())
    }
}

fn http_client() -> anyhow::Result<&'static reqwest::Client> {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }
    let client = reqwest::Client::builder()
        .user_agent("mcsc-agent")
        .timeout(Duration::from_secs(15 * 60))
        .build()
        .context("build http client")?;
    Ok(CLIENT.get_or_init(|| client))
}

async fn fetch(url: &Url) -> anyhow::Result<Vec<u8>> {
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=DOWNLOAD_ATTEMPTS {
        let res: anyhow::Result<Vec<u8>> = async {
            let resp = http_client()?
                .get(url.clone())
                .send()
                .await
                .context("download server jar")?
                .error_for_status()
                .context("download server jar (status)")?;
            let b = resp.bytes().await.context("read server jar body")?;
            Ok(b.to_vec())
        }
        .await;

        match res {
            Ok(b) => return Ok(b),
            Err(e) => {
                tracing::warn!(%url, attempt, error = %e, "server jar download failed");
                last_err = Some(e);
                if attempt < DOWNLOAD_ATTEMPTS {
                    tokio::time::sleep(Duration::from_millis(
                        200_u64.saturating_mul(2_u64.pow(attempt - 1)),
                    ))
                    .await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("download failed")))
}

fn existing_jar_is_valid(path: &Path, checksum: Option<&Checksum>) -> anyhow::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let Some(checksum) = checksum else {
        return Ok(true);
    };
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    match checksum.verify(&bytes) {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "stale server jar, downloading again");
            Ok(false)
        }
    }
}

/// Makes sure `jar_path` exists and matches the catalog digest of
/// `version`, downloading it when missing or stale.
pub async fn ensure_server_jar(
    jar_path: &Path,
    version: &str,
    info: &VersionInfo,
) -> anyhow::Result<PathBuf> {
    let jar_path = jar_path.to_path_buf();
    let checksum = Checksum::parse(&info.sum)?;

    if existing_jar_is_valid(&jar_path, checksum.as_ref())? {
        return Ok(jar_path);
    }

    let url = Url::parse(&info.link)
        .with_context(|| format!("invalid download link for {version}: {}", info.link))?;
    tracing::info!(version, %url, "downloading server jar");
    let bytes = fetch(&url).await?;

    if let Some(checksum) = &checksum {
        checksum
            .verify(&bytes)
            .with_context(|| format!("server jar {version} from {url}"))?;
    }

    if let Some(dir) = jar_path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = jar_path.with_extension("jar.tmp");
    let mut f = fs::File::create(&tmp_path)?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    fs::rename(&tmp_path, &jar_path)?;
    tracing::info!(version, path = %jar_path.display(), bytes = bytes.len(), "server jar ready");
    Ok(jar_path)
}

/// A download link whose server accepts connections and never answers, for
/// holding a start in the jar download.
#[cfg(test)]
pub(crate) async fn stalled_link() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}/server.jar")
}
