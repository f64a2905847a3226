// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA binary encoding primitives (Part 6, 5.2) for record bodies.
//!
//! Numbers are little-endian. Strings, byte strings and arrays carry an
//! `Int32` length prefix where `-1` means null.

use uuid::Uuid;

use crate::error::CodecError;
use crate::types::{LocalizedText, NodeId, NodeIdentifier};

const LOCALE_MASK: u8 = 0x01;
const TEXT_MASK: u8 = 0x02;

const NODE_ID_TWO_BYTE: u8 = 0x00;
const NODE_ID_FOUR_BYTE: u8 = 0x01;
const NODE_ID_NUMERIC: u8 = 0x02;
const NODE_ID_STRING: u8 = 0x03;
const NODE_ID_GUID: u8 = 0x04;
const NODE_ID_BYTE_STRING: u8 = 0x05;

// =============================================================================
// BinaryReader
// =============================================================================

/// Cursor over an encoded body.
#[derive(Debug)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    /// Creates a reader at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails unless the whole body was consumed.
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::invalid_encoding(format!("{n} trailing bytes"))),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads a byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Reads a `UInt16`.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// Reads an `Int32`.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Reads a `UInt32`.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Reads a `Float`.
    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    /// Reads a `Double`.
    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Reads a length prefix; `None` for null.
    fn read_length(&mut self) -> Result<Option<usize>, CodecError> {
        match self.read_i32()? {
            -1 => Ok(None),
            n if n < 0 => Err(CodecError::invalid_encoding(format!("negative length {n}"))),
            n => Ok(Some(n as usize)),
        }
    }

    /// Reads a `ByteString`.
    pub fn read_byte_string(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        match self.read_length()? {
            None => Ok(None),
            Some(n) => Ok(Some(self.take(n)?.to_vec())),
        }
    }

    /// Reads a UTF-8 `String`.
    pub fn read_string(&mut self) -> Result<Option<String>, CodecError> {
        match self.read_byte_string()? {
            None => Ok(None),
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| CodecError::invalid_encoding(format!("invalid UTF-8: {e}"))),
        }
    }

    /// Reads a `LocalizedText`.
    pub fn read_localized_text(&mut self) -> Result<LocalizedText, CodecError> {
        let mask = self.read_u8()?;
        if mask & !(LOCALE_MASK | TEXT_MASK) != 0 {
            return Err(CodecError::invalid_encoding(format!(
                "invalid LocalizedText mask {mask:#04x}"
            )));
        }
        let locale = if mask & LOCALE_MASK != 0 {
            self.read_string()?
        } else {
            None
        };
        let text = if mask & TEXT_MASK != 0 {
            self.read_string()?
        } else {
            None
        };
        Ok(LocalizedText { locale, text })
    }

    /// Reads a `NodeId` in any of its compact forms.
    pub fn read_node_id(&mut self) -> Result<NodeId, CodecError> {
        let encoding = self.read_u8()?;
        let node_id = match encoding {
            NODE_ID_TWO_BYTE => NodeId::numeric(0, u32::from(self.read_u8()?)),
            NODE_ID_FOUR_BYTE => {
                let ns = u16::from(self.read_u8()?);
                NodeId::numeric(ns, u32::from(self.read_u16()?))
            }
            NODE_ID_NUMERIC => {
                let ns = self.read_u16()?;
                NodeId::numeric(ns, self.read_u32()?)
            }
            NODE_ID_STRING => {
                let ns = self.read_u16()?;
                NodeId::string(ns, self.read_string()?.unwrap_or_default())
            }
            NODE_ID_GUID => {
                let ns = self.read_u16()?;
                let d1 = self.read_u32()?;
                let d2 = self.read_u16()?;
                let d3 = self.read_u16()?;
                let d4: [u8; 8] = self.take_array()?;
                NodeId::guid(ns, Uuid::from_fields(d1, d2, d3, &d4))
            }
            NODE_ID_BYTE_STRING => {
                let ns = self.read_u16()?;
                NodeId::opaque(ns, self.read_byte_string()?.unwrap_or_default())
            }
            other => {
                return Err(CodecError::invalid_encoding(format!(
                    "unknown NodeId encoding {other:#04x}"
                )))
            }
        };
        Ok(node_id)
    }

    /// Reads an array of `Double`.
    pub fn read_f64_array(&mut self) -> Result<Option<Vec<f64>>, CodecError> {
        self.read_array(Self::read_f64)
    }

    /// Reads an array of `UInt32`.
    pub fn read_u32_array(&mut self) -> Result<Option<Vec<u32>>, CodecError> {
        self.read_array(Self::read_u32)
    }

    fn read_array<T>(
        &mut self,
        mut read: impl FnMut(&mut Self) -> Result<T, CodecError>,
    ) -> Result<Option<Vec<T>>, CodecError> {
        let Some(len) = self.read_length()? else {
            return Ok(None);
        };
        // Cap the preallocation by what the body could possibly hold.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(read(self)?);
        }
        Ok(Some(items))
    }
}

// =============================================================================
// BinaryWriter
// =============================================================================

/// Growable encoded body.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Writes a byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Writes a `UInt16`.
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an `Int32`.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a `UInt32`.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a `Float`.
    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a `Double`.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn write_length(&mut self, len: Option<usize>) -> Result<(), CodecError> {
        match len {
            None => self.write_i32(-1),
            Some(n) => {
                let n = i32::try_from(n).map_err(|_| {
                    CodecError::invalid_encoding(format!("length {n} exceeds Int32"))
                })?;
                self.write_i32(n);
            }
        }
        Ok(())
    }

    /// Writes a `ByteString`.
    pub fn write_byte_string(&mut self, value: Option<&[u8]>) -> Result<(), CodecError> {
        self.write_length(value.map(<[u8]>::len))?;
        if let Some(bytes) = value {
            self.buf.extend_from_slice(bytes);
        }
        Ok(())
    }

    /// Writes a `String`.
    pub fn write_string(&mut self, value: Option<&str>) -> Result<(), CodecError> {
        self.write_byte_string(value.map(str::as_bytes))
    }

    /// Writes a `LocalizedText`.
    pub fn write_localized_text(&mut self, value: &LocalizedText) -> Result<(), CodecError> {
        let mut mask = 0u8;
        if value.locale.is_some() {
            mask |= LOCALE_MASK;
        }
        if value.text.is_some() {
            mask |= TEXT_MASK;
        }
        self.write_u8(mask);
        if let Some(locale) = &value.locale {
            self.write_string(Some(locale))?;
        }
        if let Some(text) = &value.text {
            self.write_string(Some(text))?;
        }
        Ok(())
    }

    /// Writes a `NodeId` using the most compact form.
    pub fn write_node_id(&mut self, value: &NodeId) -> Result<(), CodecError> {
        let ns = value.namespace_index;
        match &value.identifier {
            NodeIdentifier::Numeric(id) if ns == 0 && *id <= 0xFF => {
                self.write_u8(NODE_ID_TWO_BYTE);
                self.write_u8(*id as u8);
            }
            NodeIdentifier::Numeric(id) if ns <= 0xFF && *id <= 0xFFFF => {
                self.write_u8(NODE_ID_FOUR_BYTE);
                self.write_u8(ns as u8);
                self.write_u16(*id as u16);
            }
            NodeIdentifier::Numeric(id) => {
                self.write_u8(NODE_ID_NUMERIC);
                self.write_u16(ns);
                self.write_u32(*id);
            }
            NodeIdentifier::String(s) => {
                self.write_u8(NODE_ID_STRING);
                self.write_u16(ns);
                self.write_string(Some(s))?;
            }
            NodeIdentifier::Guid(guid) => {
                self.write_u8(NODE_ID_GUID);
                self.write_u16(ns);
                let (d1, d2, d3, d4) = guid.as_fields();
                self.write_u32(d1);
                self.write_u16(d2);
                self.write_u16(d3);
                self.buf.extend_from_slice(d4);
            }
            NodeIdentifier::Opaque(bytes) => {
                self.write_u8(NODE_ID_BYTE_STRING);
                self.write_u16(ns);
                self.write_byte_string(Some(bytes))?;
            }
        }
        Ok(())
    }

    /// Writes an array of `Double`.
    pub fn write_f64_array(&mut self, values: Option<&[f64]>) -> Result<(), CodecError> {
        self.write_length(values.map(<[f64]>::len))?;
        for v in values.unwrap_or_default() {
            self.write_f64(*v);
        }
        Ok(())
    }

    /// Writes an array of `UInt32`.
    pub fn write_u32_array(&mut self, values: Option<&[u32]>) -> Result<(), CodecError> {
        self.write_length(values.map(<[u32]>::len))?;
        for v in values.unwrap_or_default() {
            self.write_u32(*v);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_compact_forms() {
        let cases = [
            (NodeId::numeric(0, 84), vec![0x00, 84]),
            (NodeId::numeric(2, 1001), vec![0x01, 2, 0xE9, 0x03]),
            (
                NodeId::numeric(300, 70_000),
                vec![0x02, 0x2C, 0x01, 0x70, 0x11, 0x01, 0x00],
            ),
        ];
        for (node, expected) in cases {
            let mut writer = BinaryWriter::new();
            writer.write_node_id(&node).unwrap();
            let bytes = writer.into_bytes();
            assert_eq!(bytes, expected, "{node}");
            let mut reader = BinaryReader::new(&bytes);
            assert_eq!(reader.read_node_id().unwrap(), node);
            reader.finish().unwrap();
        }
    }

    #[test]
    fn test_guid_field_order() {
        let guid = Uuid::parse_str("72962b91-fa75-4ae6-8d28-b404dc7daf63").unwrap();
        let mut writer = BinaryWriter::new();
        writer.write_node_id(&NodeId::guid(1, guid)).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..7], &[0x04, 0x01, 0x00, 0x91, 0x2B, 0x96, 0x72]);
        assert_eq!(BinaryReader::new(&bytes).read_node_id().unwrap(), NodeId::guid(1, guid));
    }

    #[test]
    fn test_null_and_empty_strings_differ() {
        let mut writer = BinaryWriter::new();
        writer.write_string(None).unwrap();
        writer.write_string(Some("")).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes, [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);

        let mut reader = BinaryReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), None);
        assert_eq!(reader.read_string().unwrap(), Some(String::new()));
    }

    #[test]
    fn test_localized_text_mask() {
        let mut writer = BinaryWriter::new();
        writer.write_localized_text(&LocalizedText::text("Hi")).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(bytes[0], TEXT_MASK);
        assert_eq!(
            BinaryReader::new(&bytes).read_localized_text().unwrap(),
            LocalizedText::text("Hi")
        );

        let mut reader = BinaryReader::new(&[0x04]);
        assert!(reader.read_localized_text().is_err());
    }

    #[test]
    fn test_truncated_body() {
        let mut reader = BinaryReader::new(&[1, 2, 3]);
        assert!(matches!(
            reader.read_f64(),
            Err(CodecError::Truncated { needed: 8, remaining: 3 })
        ));
    }

    #[test]
    fn test_huge_array_length_does_not_preallocate() {
        let mut writer = BinaryWriter::new();
        writer.write_i32(i32::MAX);
        let bytes = writer.into_bytes();
        assert!(BinaryReader::new(&bytes).read_f64_array().is_err());
    }
}
