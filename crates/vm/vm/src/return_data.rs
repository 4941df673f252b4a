//! Return data buffer shared between a frame and its child calls.

use std::ops::Deref;

/// Untrusted data returned by a sub-call, cropped to the region the caller
/// actually asked for (spec.md §3 "Frame invariant set": `return_data`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReturnData {
    mem: Vec<u8>,
    offset: usize,
    size: usize,
}

impl ReturnData {
    /// Create empty `ReturnData`.
    pub fn empty() -> Self {
        ReturnData {
            mem: Vec::new(),
            offset: 0,
            size: 0,
        }
    }

    /// Create `ReturnData` from give buffer and slice.
    pub fn new(mem: Vec<u8>, offset: usize, size: usize) -> Self {
        ReturnData { mem, offset, size }
    }
}

impl Deref for ReturnData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.mem[self.offset..self.offset + self.size]
    }
}
