//! Background prefetching for chunk streams.

use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use crate::error::Result;

/// Runs an iterator on a worker thread, keeping up to `depth` items ready.
///
/// The worker blocks once the bounded channel is full, so at most `depth`
/// items are ever decoded ahead of the consumer. Dropping the prefetcher
/// closes the channel, which unblocks and stops the worker even when the
/// wrapped stream is endless.
#[derive(Debug)]
pub struct Prefetcher<T> {
    rx: Option<Receiver<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Prefetcher<T> {
    /// Spawns the worker thread and starts filling the buffer.
    pub fn spawn<I>(source: I, depth: usize) -> Result<Self>
    where
        I: Iterator<Item = T> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(depth.max(1));
        let handle = thread::Builder::new()
            .name("chunk-prefetch".to_string())
            .spawn(move || {
                for item in source {
                    if tx.send(item).is_err() {
                        break;
                    }
                }
            })?;
        log::debug!("prefetcher started with depth {}", depth);
        Ok(Self {
            rx: Some(rx),
            handle: Some(handle),
        })
    }
}

impl<T> Iterator for Prefetcher<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.as_ref().and_then(|rx| rx.recv().ok())
    }
}

impl<T> Drop for Prefetcher<T> {
    fn drop(&mut self) {
        // Close the receiving side first so a blocked worker send fails
        // instead of deadlocking the join.
        self.rx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_order() {
        let source = (0..100).collect::<Vec<i32>>().into_iter();
        let prefetcher = Prefetcher::spawn(source, 2).unwrap();

        let collected: Vec<i32> = prefetcher.collect();
        assert_eq!(collected, (0..100).collect::<Vec<i32>>());
    }

    #[test]
    fn test_ends_when_source_ends() {
        let mut prefetcher = Prefetcher::spawn(std::iter::once(7), 4).unwrap();
        assert_eq!(prefetcher.next(), Some(7));
        assert_eq!(prefetcher.next(), None);
        assert_eq!(prefetcher.next(), None);
    }

    #[test]
    fn test_drop_stops_endless_source() {
        let mut prefetcher = Prefetcher::spawn(0u64.., 2).unwrap();
        assert_eq!(prefetcher.next(), Some(0));
        // Dropping must join the worker without hanging.
        drop(prefetcher);
    }

    #[test]
    fn test_partial_consumption() {
        let prefetcher = Prefetcher::spawn(0..1000, 3).unwrap();
        let first: Vec<i32> = prefetcher.take(10).collect();
        assert_eq!(first, (0..10).collect::<Vec<i32>>());
    }
}
