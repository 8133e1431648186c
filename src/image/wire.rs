//! Little-endian byte codec for payloads exchanged between ranks.

use crate::foundation::error::{SortlastError, SortlastResult};

#[derive(Debug, Default)]
pub(crate) struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub(crate) fn magic(&mut self, magic: [u8; 4]) {
        self.buf.extend_from_slice(&magic);
    }

    pub(crate) fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn bytes(&mut self, v: &[u8]) {
        self.u64(v.len() as u64);
        self.buf.extend_from_slice(v);
    }

    pub(crate) fn f32s(&mut self, v: &[f32]) {
        self.u64(v.len() as u64);
        for x in v {
            self.buf.extend_from_slice(&x.to_le_bytes());
        }
    }

    pub(crate) fn f64s(&mut self, v: &[f64]) {
        self.u64(v.len() as u64);
        for x in v {
            self.buf.extend_from_slice(&x.to_le_bytes());
        }
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> SortlastResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                SortlastError::transfer(format!(
                    "payload truncated: need {n} bytes at offset {}, have {}",
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn expect_magic(&mut self, magic: [u8; 4]) -> SortlastResult<()> {
        let got = self.take(4)?;
        if got != magic {
            return Err(SortlastError::transfer(format!(
                "unexpected payload magic {got:?}, expected {magic:?}"
            )));
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> SortlastResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> SortlastResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> SortlastResult<u64> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    fn len_prefix(&mut self, elem_size: usize) -> SortlastResult<usize> {
        let n = self.u64()?;
        let n = usize::try_from(n)
            .map_err(|_| SortlastError::transfer("length prefix exceeds address space"))?;
        if n.saturating_mul(elem_size) > self.buf.len().saturating_sub(self.pos) {
            return Err(SortlastError::transfer(format!(
                "length prefix {n} exceeds remaining payload"
            )));
        }
        Ok(n)
    }

    pub(crate) fn bytes(&mut self) -> SortlastResult<Vec<u8>> {
        let n = self.len_prefix(1)?;
        Ok(self.take(n)?.to_vec())
    }

    pub(crate) fn f32s(&mut self) -> SortlastResult<Vec<f32>> {
        let n = self.len_prefix(4)?;
        let raw = self.take(n * 4)?;
        Ok(raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub(crate) fn f64s(&mut self) -> SortlastResult<Vec<f64>> {
        let n = self.len_prefix(8)?;
        let raw = self.take(n * 8)?;
        Ok(raw
            .chunks_exact(8)
            .map(|c| {
                let mut a = [0u8; 8];
                a.copy_from_slice(c);
                f64::from_le_bytes(a)
            })
            .collect())
    }

    pub(crate) fn finish(self) -> SortlastResult<()> {
        if self.pos != self.buf.len() {
            return Err(SortlastError::transfer(format!(
                "{} trailing bytes after payload",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}
