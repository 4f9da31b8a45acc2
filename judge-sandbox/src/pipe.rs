//! FIFO plumbing (spec §4.D). `read_bounded` caps how much of a stream is
//! captured and stops reading promptly once the cap is hit so a runaway
//! writer fails fast on a broken pipe rather than blocking forever.
//! `write_from` streams a producer into a FIFO and silently swallows
//! broken-pipe errors: judged programs are free to close stdin early.

use std::io::ErrorKind;
use std::path::Path;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

const CHUNK_SIZE: usize = 32 * 1024;

/// Creates a named pipe at `path`, replacing anything already there.
/// `judge-core` calls this for each stdio FIFO it wires into a `CallArgs`
/// before spawning — kept here so callers don't need their own `nix`
/// dependency just to make a fifo.
pub fn make_fifo(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    nix::unistd::mkfifo(path, nix::sys::stat::Mode::S_IRWXU)?;
    Ok(())
}

/// Read up to `cap` bytes from the FIFO at `path`, then stop — whether or
/// not the writer is done. Bytes written after the cap was hit are
/// discarded without ever blocking the writer, because the reader closes
/// its end as soon as it returns.
pub async fn read_bounded(path: impl AsRef<Path>, cap: usize) -> Result<Vec<u8>> {
    let file = tokio::fs::File::open(path.as_ref()).await?;
    let mut reader = tokio::io::BufReader::new(file);
    let mut out = Vec::with_capacity(cap.min(1 << 20));
    let mut chunk = [0u8; CHUNK_SIZE];
    while out.len() < cap {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let take = (cap - out.len()).min(n);
        out.extend_from_slice(&chunk[..take]);
    }
    Ok(out)
}

/// Stream `producer` into the FIFO at `path`. When `strip_cr` is set, `\r`
/// bytes are dropped on the way in — the judge operates on LF-terminated
/// text (spec §4.D). A broken pipe (the child closed its stdin) ends the
/// stream quietly; it is not an error for a producer to outlive its reader.
pub async fn write_from(
    path: impl AsRef<Path>,
    mut producer: impl AsyncRead + Unpin,
    strip_cr: bool,
) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(path.as_ref())
        .await?;
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match producer.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(e.into()),
        };
        let chunk: &[u8] = &buf[..n];
        let result = if strip_cr {
            let filtered: Vec<u8> = chunk.iter().copied().filter(|&b| b != b'\r').collect();
            file.write_all(&filtered).await
        } else {
            file.write_all(chunk).await
        };
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn read_bounded_stops_at_cap() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("fifo");
        nix::unistd::mkfifo(&fifo, nix::sys::stat::Mode::S_IRWXU).unwrap();

        let fifo_writer = fifo.clone();
        let writer = tokio::spawn(async move {
            write_from(&fifo_writer, Cursor::new(b"hello world".to_vec()), false)
                .await
                .unwrap();
        });
        let out = read_bounded(&fifo, 5).await.unwrap();
        assert_eq!(out, b"hello");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn write_from_strips_carriage_returns() {
        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("fifo");
        nix::unistd::mkfifo(&fifo, nix::sys::stat::Mode::S_IRWXU).unwrap();

        let fifo_writer = fifo.clone();
        let writer = tokio::spawn(async move {
            write_from(&fifo_writer, Cursor::new(b"a\r\nb\r\n".to_vec()), true)
                .await
                .unwrap();
        });
        let out = read_bounded(&fifo, 64).await.unwrap();
        assert_eq!(out, b"a\nb\n");
        writer.await.unwrap();
    }
}
