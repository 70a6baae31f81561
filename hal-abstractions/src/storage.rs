//! Persistent blob storage capability

/// Byte blobs addressed by name
///
/// Each call is a complete open / transfer / close cycle; no handles are kept
/// between calls.
pub trait BlobStore {
    type Error: core::fmt::Debug;

    /// Read the whole blob into `buf`, returning the number of bytes read.
    /// A blob larger than `buf` is an error, never a silent truncation.
    fn read(&mut self, name: &str, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Replace the blob with `bytes`.
    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), Self::Error>;
}
