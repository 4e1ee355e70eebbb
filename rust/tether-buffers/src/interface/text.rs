//! Transcoding between Rust strings and fixed-width code-unit buffers.

use tether_common::{Result, error::Error};

use crate::heap::{Handle, Heap};

impl Heap {
    /// A new `u16` owner holding the UTF-16 code units of `text`.
    pub fn encode_utf16(&mut self, text: &str) -> Result<Handle<u16>> {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.from_slice(&units)
    }

    pub fn decode_utf16(&self, handle: Handle<u16>) -> Result<String> {
        String::from_utf16(self.array(handle, "decode_utf16")?)
            .map_err(|e| Error::invalid_encoding(e.to_string()))
    }

    /// A new `u32` owner holding the Unicode scalar values of `text`.
    pub fn encode_utf32(&mut self, text: &str) -> Result<Handle<u32>> {
        let units: Vec<u32> = text.chars().map(u32::from).collect();
        self.from_slice(&units)
    }

    pub fn decode_utf32(&self, handle: Handle<u32>) -> Result<String> {
        self.array(handle, "decode_utf32")?
            .iter()
            .enumerate()
            .map(|(i, &unit)| {
                char::from_u32(unit).ok_or_else(|| {
                    Error::invalid_encoding(format!(
                        "code unit {} ({unit:#x}) is not a Unicode scalar value",
                        i + 1
                    ))
                })
            })
            .collect()
    }
}
