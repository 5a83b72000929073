//! Order-sensitive change detection over raw plaintext bytes.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use zeroize::Zeroize;

/// A blake3 digest plus the byte count it covers.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    digest: blake3::Hash,
    size: u64,
}

impl Fingerprint {
    /// Fingerprint of an in-memory buffer.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut builder = FingerprintBuilder::default();
        builder.update(bytes);
        builder.finish()
    }

    /// Fingerprint of a file's current contents.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut builder = FingerprintBuilder::default();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            builder.update(&buf[..n]);
        }
        buf.zeroize();
        Ok(builder.finish())
    }

    /// Number of bytes covered.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.digest.to_hex();
        f.debug_struct("Fingerprint")
            .field("digest", &&hex.as_str()[..16])
            .field("size", &self.size)
            .finish()
    }
}

/// Incrementally folds bytes into a [`Fingerprint`].
#[derive(Default)]
pub struct FingerprintBuilder {
    hasher: blake3::Hasher,
    size: u64,
}

impl FingerprintBuilder {
    /// Folds `bytes` in after everything seen so far.
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
        self.size += bytes.len() as u64;
    }

    /// Completes the fingerprint.
    pub fn finish(&self) -> Fingerprint {
        Fingerprint {
            digest: self.hasher.finalize(),
            size: self.size,
        }
    }
}
