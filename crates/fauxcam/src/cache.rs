use fauxcam_core::prelude::{Resolution, WireFormat};

/// Identity of an encoded frame: target geometry, format and source generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resolution: Resolution,
    pub format: WireFormat,
    pub version: u64,
}

/// Single-slot encoded frame cache, last-used-wins.
///
/// The byte buffer is kept across invalidations so the next encode reuses its capacity.
#[derive(Default)]
pub struct EncodedFrameCache {
    bytes: Vec<u8>,
    key: Option<CacheKey>,
}

impl EncodedFrameCache {
    /// Cached bytes if they were encoded for exactly `key`.
    pub fn get(&self, key: &CacheKey) -> Option<&[u8]> {
        (self.key.as_ref() == Some(key)).then_some(self.bytes.as_slice())
    }

    /// Hand the buffer out for re-encoding; the slot is invalid until [`Self::commit`].
    pub fn begin(&mut self) -> &mut Vec<u8> {
        self.key = None;
        &mut self.bytes
    }

    /// Mark the buffer filled by [`Self::begin`] as valid for `key`.
    pub fn commit(&mut self, key: CacheKey) {
        self.key = Some(key);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
