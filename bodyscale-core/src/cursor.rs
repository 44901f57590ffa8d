//! Byte cursor for flag-gated frame layouts
//!
//! Scale frames start with a mandatory prefix followed by optional fields,
//! each present only when its flag bit is set. Devices sometimes truncate the
//! tail, so every optional read is also gated on the bytes that remain: a
//! field whose flag is set but which does not fit is absent, never zero.

use bytes::Buf;
use chrono::{NaiveDate, NaiveDateTime};

use crate::constants::size;
use crate::error::{Error, Result};

/// Little-endian reader over a notification payload
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    frame: &'static str,
    buf: &'a [u8],
    prefix: usize,
}

impl<'a> FrameReader<'a> {
    /// Create a reader, failing if `buf` cannot hold the mandatory prefix
    pub fn new(frame: &'static str, buf: &'a [u8], prefix: usize) -> Result<Self> {
        if buf.len() < prefix {
            return Err(Error::FrameTooShort {
                frame,
                expected: prefix,
                actual: buf.len(),
            });
        }

        Ok(Self {
            frame,
            buf,
            prefix,
        })
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Read a mandatory u8
    pub fn u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Read a mandatory little-endian u16
    pub fn u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    /// Read `width` bytes with `read` if `present` and they fit
    ///
    /// This is the single primitive every optional field goes through.
    pub fn read_if<T>(
        &mut self,
        present: bool,
        width: usize,
        read: impl FnOnce(&mut &'a [u8]) -> T,
    ) -> Option<T> {
        if !present || self.buf.remaining() < width {
            return None;
        }
        Some(read(&mut self.buf))
    }

    pub fn u8_if(&mut self, present: bool) -> Option<u8> {
        self.read_if(present, 1, |b| b.get_u8())
    }

    pub fn u16_if(&mut self, present: bool) -> Option<u16> {
        self.read_if(present, 2, |b| b.get_u16_le())
    }

    /// Optional u16 scaled by `factor`
    pub fn scaled_if(&mut self, present: bool, factor: f64) -> Option<f64> {
        self.u16_if(present).map(|raw| f64::from(raw) * factor)
    }

    /// Optional 7-byte date-time
    ///
    /// The bytes are consumed whenever they fit; an impossible calendar
    /// value yields `None` without shifting the following fields.
    pub fn date_time_if(&mut self, present: bool) -> Option<NaiveDateTime> {
        self.read_if(present, size::DATE_TIME, |b| {
            let year = b.get_u16_le();
            let month = b.get_u8();
            let day = b.get_u8();
            let hour = b.get_u8();
            let minute = b.get_u8();
            let second = b.get_u8();

            NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|d| d.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)))
        })
        .flatten()
    }

    fn ensure(&self, width: usize) -> Result<()> {
        if self.buf.remaining() < width {
            return Err(Error::FrameTooShort {
                frame: self.frame,
                expected: self.prefix.max(width),
                actual: self.buf.remaining(),
            });
        }
        Ok(())
    }
}
