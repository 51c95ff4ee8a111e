use cardgraph_core::error::{CardgraphError, ErrorCode};
use crc32fast::Hasher;
use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// `[lsn: u64][crc32: u32][len: u32]`
pub const FRAME_HEADER_LEN: u64 = 16;

#[derive(Error, Debug)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("data integrity error (CRC mismatch) at lsn {0}")]
    CrcMismatch(u64),
    #[error("corrupt entry at lsn {0}")]
    CorruptEntry(u64),
    #[error("payload of {0} bytes does not fit in one frame")]
    PayloadTooLarge(usize),
    #[error("log could not be rolled back after a failed write; reopen it")]
    Poisoned,
}

impl CardgraphError for WalError {
    fn error_code(&self) -> ErrorCode {
        match self {
            WalError::PayloadTooLarge(_) => ErrorCode::InvalidArgument,
            WalError::Poisoned => ErrorCode::FailedPrecondition,
            _ => ErrorCode::Internal,
        }
    }
}

/// Backing file of a [`Wal`]. Writes always land at the end of the file.
pub trait LogFile: AsyncRead + AsyncWrite + AsyncSeek + Unpin + Send {
    fn sync(&mut self) -> impl Future<Output = std::io::Result<()>> + Send;
    fn truncate(&mut self, len: u64) -> impl Future<Output = std::io::Result<()>> + Send;
    fn byte_len(&mut self) -> impl Future<Output = std::io::Result<u64>> + Send;
}

impl LogFile for File {
    async fn sync(&mut self) -> std::io::Result<()> {
        self.sync_all().await
    }

    async fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len).await
    }

    async fn byte_len(&mut self) -> std::io::Result<u64> {
        Ok(self.metadata().await?.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayStats {
    pub last_lsn: u64,
    pub entries: usize,
    /// Bytes of a torn trailing frame that were cut off.
    pub truncated_bytes: u64,
}

/// Append-only log of opaque payloads, framed with a sequence number and CRC.
///
/// Frames are staged in memory by [`Wal::append`] and reach the file in one
/// [`Wal::flush`]. A failed flush discards the staged frames and cuts the file
/// back to the last durable frame, so a write reported as failed never shows
/// up on replay.
pub struct Wal<F = File> {
    path: PathBuf,
    file: F,
    pending: Vec<u8>,
    current_lsn: u64,
    durable_lsn: u64,
    durable_len: u64,
    poisoned: bool,
}

impl Wal<File> {
    /// Opens (or creates) the log file. Call [`Wal::replay`] before appending
    /// to an existing log so sequence numbers continue where it left off.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .await?;

        Self::from_file(path, file).await
    }
}

impl<F: LogFile> Wal<F> {
    pub async fn from_file(path: impl AsRef<Path>, mut file: F) -> Result<Self, WalError> {
        let durable_len = file.byte_len().await?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            file,
            pending: Vec::new(),
            current_lsn: 0,
            durable_lsn: 0,
            durable_len,
            poisoned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Stages one frame and returns its sequence number. Not durable until
    /// [`Wal::flush`].
    pub fn append(&mut self, payload: &[u8]) -> Result<u64, WalError> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }
        let len = u32::try_from(payload.len()).map_err(|_| WalError::PayloadTooLarge(payload.len()))?;
        let lsn = self.current_lsn + 1;

        let mut hasher = Hasher::new();
        hasher.update(payload);

        self.pending.extend_from_slice(&lsn.to_be_bytes());
        self.pending.extend_from_slice(&hasher.finalize().to_be_bytes());
        self.pending.extend_from_slice(&len.to_be_bytes());
        self.pending.extend_from_slice(payload);

        self.current_lsn = lsn;
        Ok(lsn)
    }

    pub async fn flush(&mut self) -> Result<(), WalError> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        match self.write_pending().await {
            Ok(()) => {
                self.durable_len += self.pending.len() as u64;
                self.durable_lsn = self.current_lsn;
                self.pending.clear();
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %rollback_err,
                        "WAL rollback failed"
                    );
                    self.poisoned = true;
                }
                Err(WalError::Io(err))
            }
        }
    }

    async fn write_pending(&mut self) -> std::io::Result<()> {
        self.file.write_all(&self.pending).await?;
        self.file.flush().await?;
        self.file.sync().await
    }

    /// Drops staged frames and cuts the file back to the last durable frame.
    async fn rollback(&mut self) -> Result<(), WalError> {
        self.pending.clear();
        self.current_lsn = self.durable_lsn;
        self.file.truncate(self.durable_len).await?;
        self.file.seek(SeekFrom::End(0)).await?;
        tracing::warn!(
            path = %self.path.display(),
            lsn = self.durable_lsn,
            "WAL write failed; rolled back to last durable frame"
        );
        Ok(())
    }

    /// Feeds every intact frame to `apply` in log order. A torn frame at the
    /// tail (crash mid-write) is truncated; a CRC mismatch anywhere is fatal.
    pub async fn replay<A>(&mut self, mut apply: A) -> Result<ReplayStats, WalError>
    where
        A: FnMut(u64, &[u8]) -> Result<(), WalError>,
    {
        self.flush().await?;
        let file_len = self.file.byte_len().await?;
        let file = &mut self.file;
        file.seek(SeekFrom::Start(0)).await?;

        let mut stats = ReplayStats::default();
        let mut valid_end = 0u64;

        while file_len - valid_end >= FRAME_HEADER_LEN {
            let lsn = file.read_u64().await?;
            let crc = file.read_u32().await?;
            let len = file.read_u32().await? as u64;

            // A header claiming more bytes than remain is a torn tail.
            if len > file_len - valid_end - FRAME_HEADER_LEN {
                break;
            }

            let mut payload = vec![0u8; len as usize];
            file.read_exact(&mut payload).await?;

            let mut hasher = Hasher::new();
            hasher.update(&payload);
            if hasher.finalize() != crc {
                return Err(WalError::CrcMismatch(lsn));
            }

            apply(lsn, &payload)?;
            stats.last_lsn = lsn;
            stats.entries += 1;
            valid_end += FRAME_HEADER_LEN + len;
        }

        if valid_end < file_len {
            tracing::warn!(
                path = %self.path.display(),
                bytes = file_len - valid_end,
                "truncating torn WAL tail"
            );
            file.truncate(valid_end).await?;
            stats.truncated_bytes = file_len - valid_end;
        }

        file.seek(SeekFrom::End(0)).await?;
        self.current_lsn = stats.last_lsn;
        self.durable_lsn = stats.last_lsn;
        self.durable_len = valid_end;

        Ok(stats)
    }
}
