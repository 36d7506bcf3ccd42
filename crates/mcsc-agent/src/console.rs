//! Console bridge over the server's stdin/stdout/stderr.

use std::{collections::VecDeque, io, sync::Arc};

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    process::Child,
    sync::{Mutex, MutexGuard},
};

use crate::{
    error::{Result, ServerError},
    settings::LockRetry,
};

type Writer = Box<dyn AsyncWrite + Send + Unpin>;
type Reader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Line-oriented access to a live server process.
///
/// Writers must hold the bridge lock ([`ConsoleBridge::lock`] or
/// [`ConsoleBridge::try_lock`]) so commands from different callers never
/// interleave. Dropping the guard releases the lock.
pub struct ConsoleBridge {
    stdin: Mutex<Option<Writer>>,
    stdout: Mutex<Reader>,
    stderr: Mutex<Reader>,
}

impl std::fmt::Debug for ConsoleBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleBridge").finish_non_exhaustive()
    }
}

pub struct ConsoleGuard<'a> {
    stdin: MutexGuard<'a, Option<Writer>>,
}

impl ConsoleBridge {
    pub fn new<W, O, E>(stdin: W, stdout: O, stderr: E) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        O: AsyncRead + Send + Unpin + 'static,
        E: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            stdin: Mutex::new(Some(Box::new(stdin))),
            stdout: Mutex::new(Box::new(BufReader::new(stdout))),
            stderr: Mutex::new(Box::new(BufReader::new(stderr))),
        }
    }

    /// Takes the piped streams out of a freshly spawned child.
    pub fn from_child(child: &mut Child) -> Result<Self> {
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        match (stdin, stdout, stderr) {
            (Some(i), Some(o), Some(e)) => Ok(Self::new(i, o, e)),
            _ => Err(ServerError::Launch(
                "server process was spawned without piped stdio".to_string(),
            )),
        }
    }

    pub async fn lock(&self) -> ConsoleGuard<'_> {
        ConsoleGuard {
            stdin: self.stdin.lock().await,
        }
    }

    pub fn try_lock(&self) -> Option<ConsoleGuard<'_>> {
        self.stdin
            .try_lock()
            .ok()
            .map(|stdin| ConsoleGuard { stdin })
    }

    /// Try-locks up to `retry.attempts` times, backing off between attempts.
    pub async fn lock_with_retry(&self, retry: LockRetry) -> Result<ConsoleGuard<'_>> {
        let attempts = retry.attempts.max(1);
        for attempt in 0..attempts {
            if let Some(guard) = self.try_lock() {
                return Ok(guard);
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(retry.delay_after(attempt)).await;
            }
        }
        Err(ServerError::LockTimeout { attempts })
    }

    /// Locks, writes one command line, unlocks.
    pub async fn send_command(&self, command: &str) -> Result<()> {
        self.lock().await.send_command(command).await
    }

    /// Next line of server output without its terminator; `None` at EOF.
    pub async fn read_line(&self) -> io::Result<Option<String>> {
        let mut reader = self.stdout.lock().await;
        read_trimmed_line(&mut *reader).await
    }

    pub async fn read_error(&self) -> io::Result<Option<String>> {
        let mut reader = self.stderr.lock().await;
        read_trimmed_line(&mut *reader).await
    }
}

async fn read_trimmed_line(reader: &mut Reader) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

impl ConsoleGuard<'_> {
    pub fn is_closed(&self) -> bool {
        self.stdin.is_none()
    }

    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        if command.trim().is_empty() {
            return Err(ServerError::InvalidCommand("empty command".to_string()));
        }
        if command.contains(['\n', '\r']) {
            return Err(ServerError::InvalidCommand(
                "must be a single line".to_string(),
            ));
        }
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            ServerError::Transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "console input is closed",
            ))
        })?;

        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');

        tracing::debug!(command, "console command");
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(ServerError::Transport)?;
        stdin.flush().await.map_err(ServerError::Transport)?;
        Ok(())
    }

    /// Shuts down the server's stdin. Later sends fail with a transport error.
    pub async fn close(mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
    }
}

/// Which stream a console log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
    /// Lines the supervisor records itself, such as the exec line.
    Supervisor,
}

impl LogSource {
    fn tag(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
            Self::Supervisor => "mcsc",
        }
    }
}

#[derive(Debug)]
struct LogLine {
    seq: u64,
    source: LogSource,
    text: String,
}

impl LogLine {
    fn render(&self) -> String {
        format!("[{}] {}", self.source.tag(), self.text)
    }
}

/// Bounded ring of console output with monotonically increasing sequence
/// numbers, for cursor-based polling. Lines are rendered as `[source] text`.
#[derive(Debug)]
pub struct LogBuffer {
    next_seq: u64,
    max_lines: usize,
    lines: VecDeque<LogLine>,
}

impl LogBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            next_seq: 1,
            max_lines: max_lines.max(1),
            lines: VecDeque::new(),
        }
    }

    pub fn push(&mut self, source: LogSource, text: impl Into<String>) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        self.lines.push_back(LogLine {
            seq,
            source,
            text: text.into(),
        });
        if self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    /// Rendered lines after `cursor` (at most `limit`) and the new cursor.
    /// A zero cursor returns the most recent `limit` lines.
    pub fn tail_after(&self, cursor: u64, limit: usize) -> (Vec<String>, u64) {
        let picked: Vec<&LogLine> = if cursor == 0 {
            let skip = self.lines.len().saturating_sub(limit);
            self.lines.iter().skip(skip).collect()
        } else {
            self.lines
                .iter()
                .filter(|l| l.seq > cursor)
                .take(limit)
                .collect()
        };
        let next = picked.last().map_or(cursor, |l| l.seq);
        (picked.into_iter().map(LogLine::render).collect(), next)
    }
}

/// Drains stdout and stderr into the log buffer and `tracing` until EOF.
///
/// Without a reader the pipes fill up and the server blocks on output.
pub(crate) fn spawn_output_pumps(bridge: Arc<ConsoleBridge>, log: Arc<Mutex<LogBuffer>>) {
    tokio::spawn({
        let bridge = bridge.clone();
        let log = log.clone();
        async move {
            while let Ok(Some(line)) = bridge.read_line().await {
                tracing::info!(target: "mcsc::console", "{line}");
                log.lock().await.push(LogSource::Stdout, line);
            }
        }
    });
    tokio::spawn(async move {
        while let Ok(Some(line)) = bridge.read_error().await {
            tracing::warn!(target: "mcsc::console", "{line}");
            log.lock().await.push(LogSource::Stderr, line);
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, DuplexStream, duplex};

    use super::*;

    struct Harness {
        bridge: ConsoleBridge,
        server_stdin: DuplexStream,
        server_stdout: DuplexStream,
        server_stderr: DuplexStream,
    }

    fn harness() -> Harness {
        let (stdin_w, stdin_r) = duplex(1024);
        let (stdout_w, stdout_r) = duplex(1024);
        let (stderr_w, stderr_r) = duplex(1024);
        Harness {
            bridge: ConsoleBridge::new(stdin_w, stdout_r, stderr_r),
            server_stdin: stdin_r,
            server_stdout: stdout_w,
            server_stderr: stderr_w,
        }
    }

    async fn read_available(stream: &mut DuplexStream) -> String {
        let mut buf = vec![0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    #[tokio::test]
    async fn send_command_appends_newline() {
        let mut h = harness();
        h.bridge.send_command("/whitelist add player1").await.unwrap();
        assert_eq!(read_available(&mut h.server_stdin).await, "/whitelist add player1\n");
    }

    #[tokio::test]
    async fn multi_line_commands_are_rejected() {
        let h = harness();
        let err = h.bridge.send_command("say hi\n/stop").await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn read_line_and_read_error_strip_terminators() {
        let mut h = harness();
        h.server_stdout
            .write_all(b"[Server thread/INFO]: Done (3.2s)!\r\n")
            .await
            .unwrap();
        h.server_stderr.write_all(b"warning\n").await.unwrap();

        assert_eq!(
            h.bridge.read_line().await.unwrap().as_deref(),
            Some("[Server thread/INFO]: Done (3.2s)!")
        );
        assert_eq!(h.bridge.read_error().await.unwrap().as_deref(), Some("warning"));

        drop(h.server_stdout);
        assert_eq!(h.bridge.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn try_lock_fails_while_held() {
        let h = harness();
        let guard = h.bridge.lock().await;
        assert!(h.bridge.try_lock().is_none());
        drop(guard);
        assert!(h.bridge.try_lock().is_some());
    }

    #[tokio::test]
    async fn lock_with_retry_times_out_when_contended() {
        let h = harness();
        let _held = h.bridge.lock().await;
        let retry = LockRetry {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let err = h.bridge.lock_with_retry(retry).await.err().unwrap();
        assert!(matches!(err, ServerError::LockTimeout { attempts: 3 }));
    }

    #[tokio::test]
    async fn lock_with_retry_succeeds_once_released() {
        let h = Arc::new(harness());
        let guard_holder = h.clone();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let holder = tokio::spawn(async move {
            let _guard = guard_holder.bridge.lock().await;
            let _ = tx.send(());
            tokio::time::sleep(Duration::from_millis(20)).await;
        });
        rx.await.unwrap();

        let retry = LockRetry {
            attempts: 4,
            base_delay: Duration::from_millis(10),
        };
        assert!(h.bridge.lock_with_retry(retry).await.is_ok());
        holder.await.unwrap();
    }

    #[tokio::test]
    async fn closed_console_reports_transport_error() {
        let h = harness();
        h.bridge.lock().await.close().await;
        let mut guard = h.bridge.lock().await;
        assert!(guard.is_closed());
        let err = guard.send_command("/list").await.unwrap_err();
        assert!(matches!(err, ServerError::Transport(_)));
    }

    #[test]
    fn log_buffer_is_bounded_and_tails_from_cursor() {
        let mut log = LogBuffer::new(3);
        for i in 1..=5 {
            log.push(LogSource::Stdout, format!("line {i}"));
        }

        let (lines, cursor) = log.tail_after(0, 10);
        assert_eq!(
            lines,
            vec!["[stdout] line 3", "[stdout] line 4", "[stdout] line 5"]
        );
        assert_eq!(cursor, 5);

        let (lines, cursor) = log.tail_after(3, 1);
        assert_eq!(lines, vec!["[stdout] line 4"]);
        assert_eq!(cursor, 4);

        let (lines, cursor) = log.tail_after(5, 10);
        assert!(lines.is_empty());
        assert_eq!(cursor, 5);
    }

    #[test]
    fn log_lines_are_tagged_with_their_source() {
        let mut log = LogBuffer::new(10);
        log.push(LogSource::Supervisor, "exec: java -jar server-1.20.6.jar");
        log.push(LogSource::Stderr, "WARNING: low memory");
        log.push(LogSource::Stdout, "Done (3.2s)!");

        let (lines, _) = log.tail_after(0, 10);
        assert_eq!(
            lines,
            vec![
                "[mcsc] exec: java -jar server-1.20.6.jar",
                "[stderr] WARNING: low memory",
                "[stdout] Done (3.2s)!",
            ]
        );
        assert_eq!(log.tail_after(0, 0), (Vec::new(), 0));
    }

    #[tokio::test]
    async fn output_pumps_tag_each_stream() {
        let mut h = harness();
        h.server_stdout.write_all(b"hello\n").await.unwrap();
        h.server_stderr.write_all(b"oops\n").await.unwrap();
        drop(h.server_stdout);
        drop(h.server_stderr);

        let log = Arc::new(Mutex::new(LogBuffer::new(10)));
        spawn_output_pumps(Arc::new(h.bridge), log.clone());

        for _ in 0..100 {
            let (mut lines, _) = log.lock().await.tail_after(0, 10);
            if lines.len() == 2 {
                lines.sort();
                assert_eq!(lines, vec!["[stderr] oops", "[stdout] hello"]);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("pumps never drained both streams");
    }
}
