//! Bounds-checked reader over a `.dta` byte buffer

use super::DtaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    Big,
    Little,
}

pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            order: ByteOrder::Little,
        }
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DtaError> {
        if self.remaining() < n {
            return Err(DtaError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DtaError> {
        self.take(n).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DtaError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DtaError> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8, DtaError> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> Result<u16, DtaError> {
        let b = self.array::<2>()?;
        Ok(match self.order {
            ByteOrder::Big => u16::from_be_bytes(b),
            ByteOrder::Little => u16::from_le_bytes(b),
        })
    }

    pub fn i16(&mut self) -> Result<i16, DtaError> {
        Ok(self.u16()? as i16)
    }

    pub fn u32(&mut self) -> Result<u32, DtaError> {
        let b = self.array::<4>()?;
        Ok(match self.order {
            ByteOrder::Big => u32::from_be_bytes(b),
            ByteOrder::Little => u32::from_le_bytes(b),
        })
    }

    pub fn i32(&mut self) -> Result<i32, DtaError> {
        Ok(self.u32()? as i32)
    }

    pub fn u64(&mut self) -> Result<u64, DtaError> {
        let b = self.array::<8>()?;
        Ok(match self.order {
            ByteOrder::Big => u64::from_be_bytes(b),
            ByteOrder::Little => u64::from_le_bytes(b),
        })
    }

    pub fn f32(&mut self) -> Result<f32, DtaError> {
        Ok(f32::from_bits(self.u32()?))
    }

    pub fn f64(&mut self) -> Result<f64, DtaError> {
        Ok(f64::from_bits(self.u64()?))
    }

    /// Unsigned integer stored in `width` bytes (1..=8), in file byte order
    pub fn uint(&mut self, width: usize) -> Result<u64, DtaError> {
        debug_assert!((1..=8).contains(&width));
        let bytes = self.take(width)?;
        let fold = |acc: u64, &b: &u8| (acc << 8) | u64::from(b);
        Ok(match self.order {
            ByteOrder::Big => bytes.iter().fold(0, fold),
            ByteOrder::Little => bytes.iter().rev().fold(0, fold),
        })
    }

    /// Whether the next bytes are `tag`, without consuming them
    pub fn at(&self, tag: &str) -> bool {
        self.buf[self.pos.min(self.buf.len())..].starts_with(tag.as_bytes())
    }

    /// Consume `tag` or fail
    pub fn expect(&mut self, tag: &'static str) -> Result<(), DtaError> {
        if !self.at(tag) {
            return Err(DtaError::MissingTag {
                expected: tag,
                offset: self.pos,
            });
        }
        self.pos += tag.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_order() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut little = Cursor::new(&data);
        assert_eq!(little.u32().unwrap(), 0x0403_0201);

        let mut big = Cursor::new(&data);
        big.set_order(ByteOrder::Big);
        assert_eq!(big.u32().unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_uint_widths() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut c = Cursor::new(&data);
        assert_eq!(c.uint(2).unwrap(), 1);
        assert_eq!(c.uint(6).unwrap(), 2);

        let mut c = Cursor::new(&data);
        c.set_order(ByteOrder::Big);
        assert_eq!(c.uint(3).unwrap(), 0x01_0002);
    }

    #[test]
    fn test_truncated() {
        let mut c = Cursor::new(&[0u8; 3]);
        c.skip(2).unwrap();
        let err = c.u16().unwrap_err();
        assert!(matches!(err, DtaError::Truncated { offset: 2, needed: 1 }));
    }

    #[test]
    fn test_tags() {
        let mut c = Cursor::new(b"<data>xyz");
        assert!(c.at("<data>"));
        c.expect("<data>").unwrap();
        assert!(matches!(
            c.expect("</data>"),
            Err(DtaError::MissingTag { offset: 6, .. })
        ));
    }
}
