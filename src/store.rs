//! The piece store: completion bitmap plus the output file.
//!
//! The store is the single arbiter of what work remains. A piece moves
//! through three states guarded by one lock:
//!
//! * **free**: neither claimed nor done, returned by [`PieceStore::claim_next`];
//! * **claimed**: held by exactly one worker for the duration of its fetch;
//! * **done**: written and committed, never handed out again.
//!
//! While a claimed piece is being written it is also marked as writing, so a
//! second commit or a release cannot slip in between the write and the
//! commit. [`PieceStore::release`] moves a claimed piece back to free after a
//! failed fetch or write. File content is never locked: pieces cover disjoint byte
//! ranges and every write goes through its own file handle and cursor.
use crate::error::PieceError;
use crate::layout::PieceLayout;
use bitvec::prelude::*;
use parking_lot::Mutex;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::watch;

#[derive(Debug)]
struct Bitmap {
    done: BitVec,
    claimed: BitVec,
    /// Claimed pieces whose write is in flight. Neither a second commit nor
    /// a release may touch them until the write settles.
    writing: BitVec,
}

impl Bitmap {
    fn new(len: usize) -> Self {
        Self {
            done: bitvec![0; len],
            claimed: bitvec![0; len],
            writing: bitvec![0; len],
        }
    }

    fn first_free(&self) -> Option<usize> {
        self.done.iter_zeros().find(|&i| !self.claimed[i])
    }
}

/// Progress bitmap and output file for one download run.
#[derive(Debug)]
pub struct PieceStore {
    layout: PieceLayout,
    path: PathBuf,
    bitmap: Mutex<Bitmap>,
    completed: watch::Sender<usize>,
}

impl PieceStore {
    /// Creates (or truncates) the output file at `path`, sized to the total
    /// size when it is known.
    pub async fn create(path: impl AsRef<Path>, layout: PieceLayout) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        if let Some(total) = layout.total_size() {
            file.set_len(total).await?;
        }

        let (completed, _) = watch::channel(0);
        Ok(Self {
            layout,
            path,
            bitmap: Mutex::new(Bitmap::new(layout.piece_count())),
            completed,
        })
    }

    pub fn layout(&self) -> &PieceLayout {
        &self.layout
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Claims the lowest-numbered piece that is neither done nor held by
    /// another worker.
    ///
    /// `None` means there is nothing left to hand out, which is the signal for
    /// a worker to stop. Pieces still in flight elsewhere are not returned;
    /// if one of them fails, the worker holding it releases it and claims it
    /// again itself.
    pub fn claim_next(&self) -> Option<usize> {
        let mut bitmap = self.bitmap.lock();
        let index = bitmap.first_free()?;
        bitmap.claimed.set(index, true);
        tracing::debug!(index, "claimed piece");
        Some(index)
    }

    /// Writes `data` at the offset of piece `index` and marks it done.
    ///
    /// Fails without marking if the piece is not currently claimed (or
    /// another commit of it is in flight), if the payload length is wrong,
    /// or if the write itself fails. On failure the piece stays claimed; the
    /// caller is expected to [`release`] it.
    ///
    /// [`release`]: PieceStore::release
    pub async fn write_and_mark(&self, index: usize, data: &[u8]) -> Result<(), PieceError> {
        if index >= self.layout.piece_count() {
            return Err(PieceError::OutOfRange(index));
        }

        if let Some(expected) = self.layout.expected_len(index)
            && data.len() as u64 != expected
        {
            return Err(PieceError::LengthMismatch {
                index,
                expected,
                actual: data.len() as u64,
            });
        }

        {
            let mut bitmap = self.bitmap.lock();
            if bitmap.done[index] || !bitmap.claimed[index] || bitmap.writing[index] {
                return Err(PieceError::NotClaimed(index));
            }
            bitmap.writing.set(index, true);
        }

        let written = self.write_at(self.layout.offset(index), data).await;

        let newly_done = {
            let mut bitmap = self.bitmap.lock();
            bitmap.writing.set(index, false);
            match written {
                Ok(()) => {
                    let newly_done = !bitmap.done[index];
                    bitmap.done.set(index, true);
                    bitmap.claimed.set(index, false);
                    newly_done
                }
                Err(source) => return Err(PieceError::Io { index, source }),
            }
        };

        if newly_done {
            self.completed.send_modify(|n| *n += 1);
        }
        tracing::debug!(index, bytes = data.len(), "committed piece");
        Ok(())
    }

    async fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    /// Hands a claimed piece back so any worker can claim it again.
    /// Releasing a piece that is done or mid-write has no effect.
    pub fn release(&self, index: usize) {
        let mut bitmap = self.bitmap.lock();
        if index < bitmap.claimed.len() && !bitmap.done[index] && !bitmap.writing[index] {
            bitmap.claimed.set(index, false);
        }
    }

    pub fn is_done(&self, index: usize) -> bool {
        let bitmap = self.bitmap.lock();
        index < bitmap.done.len() && bitmap.done[index]
    }

    /// Number of committed pieces.
    pub fn completed_count(&self) -> usize {
        *self.completed.borrow()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_count() == self.layout.piece_count()
    }

    /// Copy of the completion bitmap.
    pub fn snapshot(&self) -> BitVec {
        self.bitmap.lock().done.clone()
    }

    /// Waits until every piece is committed.
    pub async fn wait_complete(&self) {
        let total = self.layout.piece_count();
        let mut rx = self.completed.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|n| *n >= total).await;
    }

    /// Flushes the output file to disk once everything is written.
    pub async fn sync(&self) -> std::io::Result<()> {
        let file = OpenOptions::new().write(true).open(&self.path).await?;
        file.sync_all().await
    }
}
