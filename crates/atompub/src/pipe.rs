//! # Streaming Transcoder
//!
//! Turns a function that writes a serialized representation into a [`Read`]
//! stream. The producer runs on its own thread and hands its output to the
//! reader through a bounded channel, so arbitrarily large documents are never
//! held in memory at once.
//!
//! A failing producer surfaces its error as the reader's next read error, and
//! every read after that fails the same way. `Interrupted` never crosses the
//! pipe, since readers retry it. If the reader is dropped early, every further write by the producer fails with
//! [`io::ErrorKind::BrokenPipe`] so it can unwind instead of blocking forever.

use std::io::{self, BufWriter, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

/// Chunks buffered between producer and reader before the producer blocks.
const PIPE_DEPTH: usize = 4;
/// Size of the write buffer in front of the channel.
const CHUNK_SIZE: usize = 8 * 1024;

type Chunk = io::Result<Vec<u8>>;

/// The read half of a [`pipe`].
#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<Chunk>,
    chunk: Vec<u8>,
    pos: usize,
    failed: Option<(io::ErrorKind, String)>,
}

struct PipeWriter {
    tx: SyncSender<Chunk>,
}

/// Run `producer` concurrently and return a stream over the bytes it writes.
pub fn pipe<F>(producer: F) -> PipeReader
where
    F: FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(PIPE_DEPTH);

    let spawned = thread::Builder::new()
        .name("atompub-pipe".into())
        .spawn(move || {
            let mut writer = BufWriter::with_capacity(CHUNK_SIZE, PipeWriter { tx: tx.clone() });
            let result = panic::catch_unwind(AssertUnwindSafe(|| producer(&mut writer)))
                .unwrap_or_else(|_| Err(io::Error::other("pipe producer panicked")))
                .and_then(|()| writer.flush());
            drop(writer);
            if let Err(mut e) = result {
                if e.kind() == io::ErrorKind::Interrupted {
                    e = io::Error::other(e);
                }
                if e.kind() != io::ErrorKind::BrokenPipe {
                    tracing::trace!(error = %e, "pipe producer failed");
                }
                // the reader may already be gone, in which case nobody cares
                let _ = tx.send(Err(e));
            }
        });

    PipeReader {
        rx,
        chunk: Vec::new(),
        pos: 0,
        failed: spawned.err().map(|e| (e.kind(), e.to_string())),
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(Ok(buf.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some((kind, message)) = &self.failed {
            return Err(io::Error::new(*kind, message.clone()));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pos == self.chunk.len() {
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => {
                    self.failed = Some((e.kind(), e.to_string()));
                    return Err(e);
                }
                // every sender is gone: the producer finished cleanly
                Err(mpsc::RecvError) => return Ok(0),
            }
        }

        let n = (self.chunk.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
