use std::io::{self, Read};
use std::sync::Arc;

/// Receives byte counts while a transfer streams.
pub trait TransferObserver: Send + Sync {
    fn on_progress(&self, _transferred: u64, _total: u64) {}

    fn on_finish(&self, _transferred: u64, _total: u64) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransferObserver;

impl TransferObserver for NoopTransferObserver {}

/// `Read` proxy that reports cumulative bytes read to a [`TransferObserver`].
///
/// Errors from the inner reader pass through untouched.
pub struct ProgressReader<R> {
    inner: R,
    transferred: u64,
    total: u64,
    observer: Arc<dyn TransferObserver>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, total: u64, observer: Arc<dyn TransferObserver>) -> Self {
        Self {
            inner,
            transferred: 0,
            total,
            observer,
        }
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Report completion and hand back the inner reader
    pub fn finish(self) -> R {
        self.observer.on_finish(self.transferred, self.total);
        self.inner
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.transferred += n as u64;
            self.observer.on_progress(self.transferred, self.total);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Cursor;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u64, u64)>>,
        finished: Mutex<Option<u64>>,
    }

    impl TransferObserver for Recorder {
        fn on_progress(&self, transferred: u64, total: u64) {
            self.seen.lock().push((transferred, total));
        }

        fn on_finish(&self, transferred: u64, _total: u64) {
            *self.finished.lock() = Some(transferred);
        }
    }

    #[test]
    fn test_reports_cumulative_bytes() {
        let recorder = Arc::new(Recorder::default());
        let mut reader = ProgressReader::new(Cursor::new(vec![7u8; 10]), 10, recorder.clone());

        let mut buf = [0u8; 4];
        while reader.read(&mut buf).unwrap() > 0 {}
        assert_eq!(reader.transferred(), 10);
        reader.finish();

        assert_eq!(*recorder.seen.lock(), vec![(4, 10), (8, 10), (10, 10)]);
        assert_eq!(*recorder.finished.lock(), Some(10));
    }

    #[test]
    fn test_passes_bytes_through() {
        let mut reader =
            ProgressReader::new(Cursor::new(b"payload".to_vec()), 7, Arc::new(NoopTransferObserver));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"payload");
    }
}
