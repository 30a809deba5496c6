//! C7 - Async Reader/Writer.
//!
//! Stateless chunking helpers bound to a `(facade, fd)` pair, sitting on
//! top of [`crate::facade::Facade`]. Translate between the SRT payload
//! MTU and arbitrary-sized application buffers.

use crate::{error::FacadeError, facade::Facade, native::SRTSOCKET};

/// How [`write_chunks`] paces submissions against the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePacing {
    /// After every `writes_per_tick` submissions, yield to the runtime
    /// (a minimum-delay timer reschedule) before continuing.
    YieldingLoop,
    /// Submit exactly `writes_per_tick` chunks per runtime turn,
    /// scheduling the next batch onto the task queue.
    ExplicitScheduling,
}

/// A stateless `(facade, fd)` pair offering chunked I/O. Cheap to
/// construct; [`crate::connection::Connection::get_reader_writer`] hands
/// one out per call rather than caching it.
#[derive(Clone)]
pub struct ChunkedIo {
    facade: Facade,
    fd: SRTSOCKET,
}

impl ChunkedIo {
    pub fn new(facade: Facade, fd: SRTSOCKET) -> Self {
        Self { facade, fd }
    }

    /// Splits `buffer` into `mtu`-sized slices (the last may be short)
    /// and submits them in order. The input is consumed: every slice
    /// moves into its own write call via ownership-transfer, so nothing
    /// of the original buffer remains accessible to the caller once this
    /// returns.
    pub async fn write_chunks(
        &self,
        buffer: Vec<u8>,
        mtu: usize,
        writes_per_tick: usize,
        pacing: WritePacing,
    ) -> Result<usize, FacadeError> {
        assert!(mtu > 0, "mtu must be positive");
        let writes_per_tick = writes_per_tick.max(1);

        let chunks: Vec<Vec<u8>> = buffer
            .chunks(mtu)
            .map(|slice| slice.to_vec())
            .collect();

        let mut total = 0usize;
        match pacing {
            WritePacing::YieldingLoop => {
                for (i, chunk) in chunks.into_iter().enumerate() {
                    total += self.facade.write(self.fd, chunk).await?;
                    if (i + 1) % writes_per_tick == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }
            WritePacing::ExplicitScheduling => {
                for batch in chunks.chunks(writes_per_tick) {
                    for chunk in batch {
                        total += self.facade.write(self.fd, chunk.clone()).await?;
                    }
                    // Hand control back to the runtime's task queue
                    // between batches rather than running the whole
                    // write to completion in one poll.
                    tokio::task::yield_now().await;
                }
            }
        }

        Ok(total)
    }

    /// Repeatedly reads up to `read_buf_size` bytes, accumulating until
    /// at least `min_bytes` have been observed or the facade reports
    /// EOF/`ERROR`. Returns the sequence of buffers collected, in
    /// arrival order.
    pub async fn read_chunks(
        &self,
        min_bytes: usize,
        read_buf_size: usize,
        mut on_read: impl FnMut(&[u8]),
        mut on_error: impl FnMut(&FacadeError),
    ) -> Vec<Vec<u8>> {
        let mut collected = Vec::new();
        let mut total = 0usize;

        while total < min_bytes {
            match self.facade.read(self.fd, read_buf_size).await {
                Ok(Some(buf)) => {
                    total += buf.len();
                    on_read(&buf);
                    collected.push(buf);
                }
                Ok(None) => break,
                Err(e) => {
                    on_error(&e);
                    break;
                }
            }
        }

        collected
    }
}

/// Concatenates a sequence of chunks back into one buffer. Used by tests
/// to verify the round-trip property; not part of the runtime path.
#[cfg(test)]
pub(crate) fn concat(chunks: &[Vec<u8>]) -> Vec<u8> {
    chunks.iter().flat_map(|c| c.iter().copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice_mtu(buffer: &[u8], mtu: usize) -> Vec<Vec<u8>> {
        buffer.chunks(mtu).map(|s| s.to_vec()).collect()
    }

    #[test]
    fn round_trip_slicing_preserves_bytes() {
        for len in [0usize, 1, 1315, 1316, 1317, 60000] {
            for mtu in [1usize, 7, 1316, 4096] {
                let buffer: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let chunks = slice_mtu(&buffer, mtu);
                assert_eq!(concat(&chunks), buffer, "len={len} mtu={mtu}");
            }
        }
    }

    #[test]
    fn slicing_preserves_order_and_last_chunk_may_be_short() {
        let buffer: Vec<u8> = (0..10u8).collect();
        let chunks = slice_mtu(&buffer, 3);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3], vec![9]);
    }
}
