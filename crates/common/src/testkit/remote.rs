use std::io::{self, Read};

use parking_lot::Mutex;

use crate::transfer::{RemoteCopy, TransferError};

/// A completed upload held by [`MemoryRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub dest: String,
    pub size: u64,
    pub bytes: Vec<u8>,
}

/// Accepts every copy and keeps the bytes in memory
#[derive(Debug, Default)]
pub struct MemoryRemote {
    uploads: Mutex<Vec<Upload>>,
}

impl MemoryRemote {
    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().clone()
    }
}

impl RemoteCopy for MemoryRemote {
    fn copy(&self, src: &mut dyn Read, dest: &str, size: u64) -> Result<(), TransferError> {
        let mut bytes = Vec::new();
        src.take(size)
            .read_to_end(&mut bytes)
            .map_err(|source| TransferError::Copy {
                dest: dest.to_string(),
                source,
            })?;
        if bytes.len() as u64 != size {
            return Err(TransferError::ShortRead {
                expected: size,
                copied: bytes.len() as u64,
            });
        }
        self.uploads.lock().push(Upload {
            dest: dest.to_string(),
            size,
            bytes,
        });
        Ok(())
    }
}

/// Remote whose connection always times out
#[derive(Debug, Clone)]
pub struct UnreachableRemote(pub String);

impl RemoteCopy for UnreachableRemote {
    fn copy(&self, _src: &mut dyn Read, _dest: &str, _size: u64) -> Result<(), TransferError> {
        Err(TransferError::Connect {
            remote: self.0.clone(),
            source: io::Error::new(io::ErrorKind::TimedOut, "connection timed out"),
        })
    }
}
