//! Most-significant-bit-first bit packing used by the gamma codec.

use crate::error::{LoupeError, Result};

/// Accumulates bits into a byte vector, MSB first within each byte.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    used: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        BitWriter {
            bytes: Vec::with_capacity(bytes),
            current: 0,
            used: 0,
        }
    }

    pub fn put_bit(&mut self, bit: bool) {
        self.current = (self.current << 1) | bit as u8;
        self.used += 1;

        if self.used == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.used = 0;
        }
    }

    /// Write the low `width` bits of `value`, most significant first.
    pub fn put(&mut self, value: u64, width: u32) {
        debug_assert!(width <= 64);
        for i in (0..width).rev() {
            self.put_bit((value >> i) & 1 == 1);
        }
    }

    /// Elias-gamma code a strictly positive value.
    pub fn put_gamma(&mut self, value: u64) {
        assert!(value > 0, "gamma coding requires a positive value");
        let bits = 64 - value.leading_zeros();
        self.put(0, bits - 1);
        self.put(value, bits);
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.used as usize
    }

    /// Pad the last partial byte with zeros and return the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.bytes.push(self.current << (8 - self.used));
        }
        self.bytes
    }
}

/// Reads bits written by [`BitWriter`].
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, bit_pos: 0 }
    }

    pub fn remaining_bits(&self) -> usize {
        (self.bytes.len() * 8).saturating_sub(self.bit_pos)
    }

    pub fn get_bit(&mut self) -> Result<bool> {
        let byte = self
            .bytes
            .get(self.bit_pos / 8)
            .ok_or_else(|| LoupeError::corruption("bit stream exhausted"))?;
        let bit = (byte >> (7 - (self.bit_pos % 8))) & 1 == 1;
        self.bit_pos += 1;
        Ok(bit)
    }

    pub fn get(&mut self, width: u32) -> Result<u64> {
        let mut value = 0u64;
        for _ in 0..width {
            value = (value << 1) | self.get_bit()? as u64;
        }
        Ok(value)
    }

    pub fn get_gamma(&mut self) -> Result<u64> {
        let mut zeros = 0u32;
        while !self.get_bit()? {
            zeros += 1;
            if zeros >= 64 {
                return Err(LoupeError::corruption("gamma code too long"));
            }
        }
        let rest = self.get(zeros)?;
        Ok((1u64 << zeros) | rest)
    }
}
