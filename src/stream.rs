//! Binary Stream Primitives
//!
//! Big-endian primitive encoding shared by every node in the cluster. Each
//! stream carries the wire version negotiated for the payload so that record
//! codecs can pick the matching shape.

use crate::error::WireError;
use crate::version::Version;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Growable output stream tagged with the target wire version.
#[derive(Debug)]
pub struct StreamOutput {
    buf: BytesMut,
    version: Version,
}

impl StreamOutput {
    pub fn new(version: Version) -> Self {
        Self {
            buf: BytesMut::with_capacity(128),
            version,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Finish writing and hand over the encoded bytes.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn write_int(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_long(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_double(&mut self, value: f64) {
        self.buf.put_i64(value.to_bits() as i64);
    }

    pub fn write_optional_double(&mut self, value: Option<f64>) {
        self.write_bool(value.is_some());
        if let Some(v) = value {
            self.write_double(v);
        }
    }

    /// Variable-length int: seven bits per byte, low bits first.
    pub fn write_vint(&mut self, value: i32) {
        let mut v = value as u32;
        while v & !0x7F != 0 {
            self.buf.put_u8(((v & 0x7F) | 0x80) as u8);
            v >>= 7;
        }
        self.buf.put_u8(v as u8);
    }

    /// Length in UTF-16 units, then each unit in one to three bytes.
    pub fn write_string(&mut self, value: &str) {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.write_vint(units.len() as i32);
        for unit in units {
            let c = unit as u32;
            if c <= 0x007F {
                self.buf.put_u8(c as u8);
            } else if c > 0x07FF {
                self.buf.put_u8((0xE0 | ((c >> 12) & 0x0F)) as u8);
                self.buf.put_u8((0x80 | ((c >> 6) & 0x3F)) as u8);
                self.buf.put_u8((0x80 | (c & 0x3F)) as u8);
            } else {
                self.buf.put_u8((0xC0 | ((c >> 6) & 0x1F)) as u8);
                self.buf.put_u8((0x80 | (c & 0x3F)) as u8);
            }
        }
    }

    pub fn write_optional_string(&mut self, value: Option<&str>) {
        self.write_bool(value.is_some());
        if let Some(v) = value {
            self.write_string(v);
        }
    }
}

/// Input stream over an encoded payload, tagged with the sender's wire version.
#[derive(Debug)]
pub struct StreamInput {
    buf: Bytes,
    version: Version,
}

impl StreamInput {
    pub fn new(buf: impl Into<Bytes>, version: Version) -> Self {
        Self {
            buf: buf.into(),
            version,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), WireError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(WireError::UnexpectedEof { needed, remaining });
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, WireError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_byte()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBoolean(other)),
        }
    }

    pub fn read_int(&mut self) -> Result<i32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_long(&mut self) -> Result<i64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    pub fn read_double(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_bits(self.read_long()? as u64))
    }

    pub fn read_optional_double(&mut self) -> Result<Option<f64>, WireError> {
        if self.read_bool()? {
            Ok(Some(self.read_double()?))
        } else {
            Ok(None)
        }
    }

    pub fn read_vint(&mut self) -> Result<i32, WireError> {
        let mut result: u32 = 0;
        for shift in (0..35).step_by(7) {
            let b = self.read_byte()?;
            result |= ((b & 0x7F) as u32) << shift;
            if b & 0x80 == 0 {
                return Ok(result as i32);
            }
        }
        Err(WireError::MalformedVInt)
    }

    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_vint()?;
        if len < 0 {
            return Err(WireError::NegativeLength(len));
        }
        let mut units = Vec::with_capacity((len as usize).min(self.remaining()));
        for _ in 0..len {
            let b = self.read_byte()? as u16;
            let unit = match b >> 4 {
                0..=7 => b,
                12 | 13 => ((b & 0x1F) << 6) | (self.continuation()? & 0x3F),
                14 => {
                    let hi = self.continuation()? & 0x3F;
                    let lo = self.continuation()? & 0x3F;
                    ((b & 0x0F) << 12) | (hi << 6) | lo
                }
                _ => {
                    return Err(WireError::InvalidString(format!(
                        "unexpected lead byte [{:#04x}]",
                        b
                    )));
                }
            };
            units.push(unit);
        }
        String::from_utf16(&units).map_err(|e| WireError::InvalidString(e.to_string()))
    }

    fn continuation(&mut self) -> Result<u16, WireError> {
        let b = self.read_byte()?;
        if b & 0xC0 != 0x80 {
            return Err(WireError::InvalidString(format!(
                "unexpected continuation byte [{:#04x}]",
                b
            )));
        }
        Ok(b as u16)
    }

    pub fn read_optional_string(&mut self) -> Result<Option<String>, WireError> {
        if self.read_bool()? {
            Ok(Some(self.read_string()?))
        } else {
            Ok(None)
        }
    }
}
