use std::io::{Result, Write};

use crate::hash::algorithm::{Checksum, StreamingHash};

/// Write adapter feeding every byte to a set of hashers before passing it on.
pub struct HashingForward<W: Write> {
    inner: W,
    hashers: Vec<StreamingHash>,
    // Total bytes that reached the inner writer
    pub counted: u64,
}

impl<W: Write> HashingForward<W> {
    pub fn new(inner: W, hashers: Vec<StreamingHash>) -> Self {
        Self {
            inner,
            hashers,
            counted: 0,
        }
    }

    /// Flush the inner writer and hand back the finished checksums.
    pub fn finish(mut self) -> Result<(W, Vec<Checksum>)> {
        self.inner.flush()?;
        let sums = self.hashers.into_iter().map(StreamingHash::finalize).collect();
        Ok((self.inner, sums))
    }
}

impl<W: Write> Write for HashingForward<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        // only hash what the inner writer accepted
        let n = self.inner.write(buf)?;
        for h in &mut self.hashers {
            h.update(&buf[..n]);
        }
        self.counted += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
