//! Little-endian structured readers and writers.
//!
//! [`StructWriter`] tracks the number of bytes written so callers can record
//! offsets into the stream without requiring `Seek`.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{LoupeError, Result};
use crate::util::varint;

/// Writes primitive values to an underlying stream.
pub struct StructWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> StructWriter<W> {
    pub fn new(inner: W) -> Self {
        StructWriter { inner, position: 0 }
    }

    /// Bytes written since creation (or since the last seek).
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.inner.write_u8(value)?;
        self.position += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(value)?;
        self.position += 2;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.inner.write_u64::<LittleEndian>(value)?;
        self.position += 8;
        Ok(())
    }

    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let bytes = varint::encode_u64(value);
        self.write_raw(&bytes)
    }

    /// Write raw bytes with no length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Write a varint length followed by the bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_varint(bytes.len() as u64)?;
        self.write_raw(bytes)
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Flush and return the underlying stream.
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Seek> StructWriter<W> {
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let position = self.inner.seek(pos)?;
        self.position = position;
        Ok(position)
    }

    pub fn stream_position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }
}

/// Reads primitive values written by [`StructWriter`].
pub struct StructReader<R: Read> {
    inner: R,
    position: u64,
}

impl<R: Read> StructReader<R> {
    pub fn new(inner: R) -> Self {
        StructReader { inner, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.inner.read_u8()?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.inner.read_u16::<LittleEndian>()?;
        self.position += 2;
        Ok(value)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.inner.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let value = self.inner.read_u64::<LittleEndian>()?;
        self.position += 8;
        Ok(value)
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            if shift >= 64 {
                return Err(LoupeError::corruption("VarInt overflow"));
            }
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Read exactly `len` raw bytes.
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf)?;
        self.position += len as u64;
        Ok(buf)
    }

    /// Read a varint length followed by that many bytes.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_varint()? as usize;
        self.read_raw(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| LoupeError::corruption(format!("invalid UTF-8: {e}")))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> StructReader<R> {
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let position = self.inner.seek(pos)?;
        self.position = position;
        Ok(position)
    }
}
