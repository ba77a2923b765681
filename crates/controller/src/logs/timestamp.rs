// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-width timestamp prefix of API server log lines.
//!
//! UTC sources render `2006-01-02T15:04:05.000000000Z ` (31 bytes); sources
//! with an offset render `...000000000+00:00 ` (36 bytes). The format is
//! detected on the first valid line and assumed for the rest of the stream.

use chrono::{DateTime, Utc};
use futures_util::io::{AsyncBufRead, AsyncBufReadExt};
use std::io;
use twc_core::time::{format_precise, Timestamp};

const UTC_LEN: usize = 31;
const OFFSET_LEN: usize = 36;
const ZONE_BYTE: usize = 29;

/// Outcome of reading one prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prefix {
    Valid(Timestamp),
    /// Bytes were read but do not form a timestamp; see [`TimestampReader::raw`].
    Invalid,
    Eof,
}

#[derive(Debug, Default)]
pub(crate) struct TimestampReader {
    buf: Vec<u8>,
    utc: Option<bool>,
}

impl TimestampReader {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::with_capacity(OFFSET_LEN), utc: None }
    }

    /// Bytes consumed by the last read.
    pub(crate) fn raw(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) async fn read<R>(&mut self, reader: &mut R) -> io::Result<Prefix>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        self.buf.clear();
        let expected = match self.utc {
            Some(false) => OFFSET_LEN,
            _ => UTC_LEN,
        };
        fill(reader, &mut self.buf, expected).await?;
        if self.buf.is_empty() {
            return Ok(Prefix::Eof);
        }
        if self.buf.len() < expected {
            return Ok(Prefix::Invalid);
        }

        let utc = match self.utc {
            Some(utc) => utc,
            None => self.buf[ZONE_BYTE] == b'Z',
        };
        if !utc && self.buf.len() < OFFSET_LEN {
            fill(reader, &mut self.buf, OFFSET_LEN).await?;
            if self.buf.len() < OFFSET_LEN {
                return Ok(Prefix::Invalid);
            }
        }

        let width = if utc { UTC_LEN } else { OFFSET_LEN } - 1;
        let parsed = std::str::from_utf8(&self.buf[..width])
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .filter(|_| self.buf[width] == b' ');
        match parsed {
            Some(ts) => {
                self.utc = Some(utc);
                Ok(Prefix::Valid(ts.with_timezone(&Utc)))
            }
            None => Ok(Prefix::Invalid),
        }
    }

    /// Render `ts` the way the source renders its prefixes.
    pub(crate) fn format(&self, ts: Timestamp) -> String {
        match self.utc {
            Some(false) => ts.format("%Y-%m-%dT%H:%M:%S%.9f%:z").to_string(),
            _ => format_precise(ts),
        }
    }
}

/// Read until `buf` holds `len` bytes, a newline was consumed, or EOF.
async fn fill<R>(reader: &mut R, buf: &mut Vec<u8>, len: usize) -> io::Result<()>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    while buf.len() < len {
        let (taken, newline) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            let want = (len - buf.len()).min(available.len());
            let chunk = &available[..want];
            match chunk.iter().position(|b| *b == b'\n') {
                Some(i) => {
                    buf.extend_from_slice(&chunk[..=i]);
                    (i + 1, true)
                }
                None => {
                    buf.extend_from_slice(chunk);
                    (want, false)
                }
            }
        };
        reader.consume_unpin(taken);
        if newline {
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "timestamp_tests.rs"]
mod tests;
