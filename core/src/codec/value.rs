/// Binary value marshalling between application byte sequences and stack buffers
///
/// Stack buffers have a fixed capacity (`MAX_ATTR_LEN`). Outbound values that
/// exceed a call's limit are rejected, never truncated.

use crate::error::BridgeError;

/// Fixed attribute value capacity of the stack
pub const MAX_ATTR_LEN: usize = 600;

/// Status code the stack uses for success
pub const GATT_SUCCESS: i32 = 0;

/// Byte surfaced in place of a value when a read fails
pub const READ_FAILURE_SENTINEL: u8 = 0;

/// Length-carrying copy of a value destined for the stack
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackBuffer {
    len: u16,
    data: Vec<u8>,
}

impl StackBuffer {
    /// Copy `bytes` into a stack buffer bounded by `limit` (itself capped at `MAX_ATTR_LEN`)
    pub fn to_stack(bytes: &[u8], limit: usize) -> Result<Self, BridgeError> {
        let max = limit.min(MAX_ATTR_LEN);
        if bytes.len() > max {
            return Err(BridgeError::ValueTooLong {
                len: bytes.len(),
                max,
            });
        }
        Ok(Self {
            len: bytes.len() as u16,
            data: bytes.to_vec(),
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Decode a value delivered with a read completion.
///
/// A successful read yields the exact bytes, so an empty value stays empty.
/// A failed read yields a single `READ_FAILURE_SENTINEL` byte. The same rule
/// applies to characteristic and descriptor reads.
pub fn from_stack(status: i32, value: &[u8]) -> Vec<u8> {
    if status == GATT_SUCCESS {
        value.to_vec()
    } else {
        vec![READ_FAILURE_SENTINEL]
    }
}

/// Copy `bytes` into a fixed-length report, zero padding or truncating
pub fn fixed_report(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut report = vec![0u8; len];
    let n = bytes.len().min(len);
    report[..n].copy_from_slice(&bytes[..n]);
    report
}
