//! Security audit trail.
//!
//! Every event is formatted as one line, kept in a bounded in-memory cache and
//! appended to a per-day file under the configured directory. Disk failures
//! never propagate to the caller: they are reported through `tracing` and the
//! event remains available from the cache.
//!
//! ```no_run
//! # async fn run() {
//! use warden_core::{audit::AuditLogger, config::AuditConfig};
//!
//! let audit = AuditLogger::open(AuditConfig::in_dir("/var/log/warden")).await;
//! audit.log_login_failure("alice", "1.2.3.4", "Invalid password").await;
//!
//! for line in audit.get_recent_events(10) {
//!     println!("{line}");
//! }
//! # }
//! ```

mod event;
mod files;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::Mutex,
};

use crate::{config::AuditConfig, error::AuditError, ring_buffer::RingBuffer};

pub use event::{AuditEvent, AuditEventType};
use files::{FileKind, active_file_name, parse_file_name, rotated_file_name};

/// Records security events to a bounded cache and daily log files.
pub struct AuditLogger {
    config: AuditConfig,
    cache: RingBuffer<String>,
    writer: Mutex<LogWriter>,
}

impl AuditLogger {
    /// Open the audit trail described by `config`.
    ///
    /// Creates the log directory if needed, purges files older than the
    /// retention period and loads the tail of today's file into the cache.
    /// None of these steps can fail the call; problems are logged and later
    /// writes are retried against the directory.
    pub async fn open(config: AuditConfig) -> Self {
        if let Err(source) = fs::create_dir_all(&config.log_dir).await {
            let error = AuditError::CreateDir {
                path: config.log_dir.clone(),
                source,
            };
            tracing::error!(error = %error, "Audit trail will be kept in memory only");
        }

        let logger = Self::new(config);
        logger.purge_expired_logs().await;
        logger.load_today().await;
        logger
    }

    /// Build a logger over `config` without touching the disk.
    ///
    /// Nothing is created, purged or loaded; the first write opens the
    /// day's file. Suited to read-only tooling over an existing directory.
    pub fn new(config: AuditConfig) -> Self {
        Self {
            cache: RingBuffer::new(config.cache_capacity.max(1)),
            writer: Mutex::new(LogWriter {
                dir: config.log_dir.clone(),
                prefix: config.file_prefix.clone(),
                max_file_size: config.max_file_size,
                active: None,
            }),
            config,
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Append an event to the cache and the current day's file.
    ///
    /// Writes are serialized, so concurrent callers never interleave lines.
    pub async fn record(&self, event: AuditEvent) {
        let line = event.format_line();
        self.cache.add(line.clone());

        let mut writer = self.writer.lock().await;
        if let Err(error) = writer.append(&line, event.timestamp).await {
            tracing::error!(
                error = %error,
                event_type = %event.event_type,
                "Failed to persist audit event"
            );
        }
    }

    pub async fn log_event(
        &self,
        event_type: AuditEventType,
        username: &str,
        ip_address: &str,
        message: &str,
    ) {
        self.record(AuditEvent::new(event_type, username, ip_address, message))
            .await;
    }

    pub async fn log_login_success(&self, username: &str, ip_address: &str) {
        self.log_event(
            AuditEventType::LoginSuccess,
            username,
            ip_address,
            "Successful login",
        )
        .await;
    }

    pub async fn log_login_failure(&self, username: &str, ip_address: &str, reason: &str) {
        self.log_event(
            AuditEventType::LoginFailure,
            username,
            ip_address,
            &format!("Failed login attempt: {reason}"),
        )
        .await;
    }

    pub async fn log_account_lockout(&self, username: &str, ip_address: &str, duration: Duration) {
        self.log_event(
            AuditEventType::AccountLockout,
            username,
            ip_address,
            &format!("Account locked out for {} minutes", duration.num_minutes()),
        )
        .await;
    }

    pub async fn log_logout(&self, username: &str, ip_address: &str) {
        self.log_event(AuditEventType::Logout, username, ip_address, "User logged out")
            .await;
    }

    pub async fn log_session_expired(&self, username: &str, ip_address: &str) {
        self.log_event(
            AuditEventType::SessionExpired,
            username,
            ip_address,
            "Session expired",
        )
        .await;
    }

    pub async fn log_suspicious_activity(&self, username: &str, ip_address: &str, details: &str) {
        self.log_event(
            AuditEventType::SuspiciousActivity,
            username,
            ip_address,
            details,
        )
        .await;
    }

    /// The last `count` cached lines, oldest first.
    pub fn get_recent_events(&self, count: usize) -> Vec<String> {
        self.cache.get_last(count)
    }

    /// Search the files of the last `search_days` days for lines containing
    /// `term`, ignoring case.
    ///
    /// Days are visited newest first; within a day the active file comes
    /// before rotated ones. Scanning stops once `max_results` lines have been
    /// collected. Files are streamed line by line, never loaded whole.
    pub async fn search_historical_events(&self, term: &str, max_results: usize) -> Vec<String> {
        self.search_historical_events_on(term, max_results, Utc::now().date_naive())
            .await
    }

    pub async fn search_historical_events_on(
        &self,
        term: &str,
        max_results: usize,
        today: NaiveDate,
    ) -> Vec<String> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() || max_results == 0 {
            return Vec::new();
        }

        // A window reaching past the calendar has no lower bound.
        let oldest = today
            .checked_sub_days(Days::new(
                u64::from(self.config.search_days).saturating_sub(1),
            ))
            .unwrap_or(NaiveDate::MIN);
        let mut candidates: Vec<_> = self
            .list_files()
            .await
            .into_iter()
            .filter(|file| file.day >= oldest && file.day <= today)
            .collect();
        candidates.sort_by(|a, b| {
            b.day
                .cmp(&a.day)
                .then(a.kind.cmp(&b.kind))
                .then(b.name.cmp(&a.name))
        });

        let mut matches = Vec::new();
        for file in candidates {
            if let Err(error) = scan_file(&file.path, &needle, max_results, &mut matches).await {
                tracing::warn!(error = %error, "Skipping unreadable audit file");
            }
            if matches.len() >= max_results {
                break;
            }
        }
        matches
    }

    /// Delete audit files whose day is older than the retention period.
    ///
    /// Returns the number of files removed.
    pub async fn purge_expired_logs(&self) -> usize {
        self.purge_expired_logs_on(Utc::now().date_naive()).await
    }

    pub async fn purge_expired_logs_on(&self, today: NaiveDate) -> usize {
        let Some(cutoff) =
            today.checked_sub_days(Days::new(u64::from(self.config.retention_days)))
        else {
            // Retention longer than the calendar keeps everything.
            return 0;
        };
        let mut removed = 0;

        for file in self.list_files().await {
            if file.day >= cutoff {
                continue;
            }
            match fs::remove_file(&file.path).await {
                Ok(()) => removed += 1,
                Err(source) => {
                    let error = AuditError::Retention {
                        path: file.path,
                        source,
                    };
                    tracing::warn!(error = %error, "Failed to purge expired audit file");
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, cutoff = %cutoff, "Purged expired audit files");
        }
        removed
    }

    /// Replay today's active file into the cache so recent events survive a
    /// restart. Only the last `cache_capacity` lines are retained.
    async fn load_today(&self) {
        let path = self.config.log_dir.join(active_file_name(
            &self.config.file_prefix,
            Utc::now().date_naive(),
        ));
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(source) => {
                let error = AuditError::Read { path, source };
                tracing::warn!(error = %error, "Could not load today's audit file");
                return;
            }
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            match read_line_lossy(&mut reader, &mut buf).await {
                Ok(Some(line)) => self.cache.add(line),
                Ok(None) => break,
                Err(source) => {
                    let error = AuditError::Read { path, source };
                    tracing::warn!(error = %error, "Stopped loading today's audit file");
                    break;
                }
            }
        }
    }

    /// Audit files in the log directory belonging to this prefix.
    async fn list_files(&self) -> Vec<LogFile> {
        let dir = &self.config.log_dir;
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(source) => {
                let error = AuditError::Read {
                    path: dir.clone(),
                    source,
                };
                tracing::debug!(error = %error, "Audit directory not readable");
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    let error = AuditError::Read {
                        path: dir.clone(),
                        source,
                    };
                    tracing::warn!(error = %error, "Failed to list audit directory");
                    break;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some((day, kind)) = parse_file_name(&self.config.file_prefix, &name) {
                files.push(LogFile {
                    path: entry.path(),
                    name,
                    day,
                    kind,
                });
            }
        }
        files
    }
}

struct LogFile {
    path: PathBuf,
    name: String,
    day: NaiveDate,
    kind: FileKind,
}

async fn scan_file(
    path: &Path,
    needle: &str,
    max_results: usize,
    matches: &mut Vec<String>,
) -> Result<(), AuditError> {
    let read_error = |source| AuditError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).await.map_err(read_error)?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    while let Some(line) = read_line_lossy(&mut reader, &mut buf)
        .await
        .map_err(read_error)?
    {
        if line.to_lowercase().contains(needle) {
            matches.push(line);
            if matches.len() >= max_results {
                break;
            }
        }
    }
    Ok(())
}

/// Read one line without its terminator. Invalid UTF-8 is replaced rather
/// than reported, so one damaged line cannot hide the rest of a file.
async fn read_line_lossy<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Sole writer of the audit files. Always accessed under the logger's mutex.
struct LogWriter {
    dir: PathBuf,
    prefix: String,
    max_file_size: u64,
    active: Option<ActiveFile>,
}

struct ActiveFile {
    day: NaiveDate,
    path: PathBuf,
    file: File,
    size: u64,
}

impl LogWriter {
    async fn append(&mut self, line: &str, timestamp: DateTime<Utc>) -> Result<(), AuditError> {
        let day = timestamp.date_naive();
        let mut active = match self.active.take() {
            Some(active) if active.day == day => active,
            _ => self.open_active(day).await?,
        };
        if active.size > self.max_file_size {
            active = self.rotate(active).await?;
        }

        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let written = async {
            active.file.write_all(&bytes).await?;
            active.file.flush().await
        }
        .await;

        // On failure the handle is dropped so the next event reopens the file.
        match written {
            Ok(()) => {
                active.size += bytes.len() as u64;
                self.active = Some(active);
                Ok(())
            }
            Err(source) => Err(AuditError::Write {
                path: active.path,
                source,
            }),
        }
    }

    async fn open_active(&self, day: NaiveDate) -> Result<ActiveFile, AuditError> {
        let path = self.dir.join(active_file_name(&self.prefix, day));
        let write_error = |source| AuditError::Write {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(write_error)?;
        let size = file.metadata().await.map_err(write_error)?.len();

        Ok(ActiveFile {
            day,
            path,
            file,
            size,
        })
    }

    async fn rotate(&self, active: ActiveFile) -> Result<ActiveFile, AuditError> {
        let ActiveFile {
            day, path, file, ..
        } = active;
        drop(file);

        let rotated_at = Utc::now();
        let mut attempt = 0;
        let target = loop {
            let candidate = self
                .dir
                .join(rotated_file_name(&self.prefix, day, rotated_at, attempt));
            match fs::try_exists(&candidate).await {
                Ok(false) => break candidate,
                Ok(true) => attempt += 1,
                Err(source) => return Err(AuditError::Rotate { path, source }),
            }
        };

        fs::rename(&path, &target)
            .await
            .map_err(|source| AuditError::Rotate {
                path: path.clone(),
                source,
            })?;
        tracing::info!(from = %path.display(), to = %target.display(), "Rotated audit file");

        self.open_active(day).await
    }
}
