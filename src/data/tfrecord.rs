// ============================================================
// Layer 4 — TFRecord Container
// ============================================================
// Record files are a plain sequence of frames:
//
//   u64 LE   length of the payload
//   u32 LE   masked crc32c of the 8 length bytes
//   [u8]     payload (one serialized Example)
//   u32 LE   masked crc32c of the payload
//
// Masking: rotate right by 15 bits, then add 0xa282ead8.
//
// A truncated frame or a checksum mismatch is reported as a
// Corrupt error; the reader stops after the first error.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::domain::error::{Result, VocoderError};

const MASK_DELTA: u32 = 0xa282_ead8;

/// CRC32-C with the TFRecord mask applied.
pub fn masked_crc(bytes: &[u8]) -> u32 {
    let crc = crc32c::crc32c(bytes);
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

// ─── Reader ───────────────────────────────────────────────────────────────────
/// Iterates over the raw payloads of one record file.
pub struct TfRecordReader<R: Read> {
    inner: R,
    path: PathBuf,
    done: bool,
}

impl TfRecordReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: Read> TfRecordReader<R> {
    pub fn new(inner: R, path: impl Into<PathBuf>) -> Self {
        Self { inner, path: path.into(), done: false }
    }

    fn corrupt(&self, reason: impl Into<String>) -> VocoderError {
        VocoderError::Corrupt { path: self.path.clone(), reason: reason.into() }
    }

    fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut header = [0u8; 8];
        // A clean end of file lands exactly on a frame boundary.
        let mut filled = 0;
        while filled < header.len() {
            let n = self.inner.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < header.len() {
            return Err(self.corrupt("truncated length header"));
        }

        let len_crc = self.read_u32("length checksum")?;
        if masked_crc(&header) != len_crc {
            return Err(self.corrupt("length checksum mismatch"));
        }

        // The length is untrusted; the buffer only grows as bytes arrive.
        let len = u64::from_le_bytes(header);
        let mut payload = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut payload)?;
        if (payload.len() as u64) < len {
            return Err(self.corrupt("truncated payload"));
        }

        let data_crc = self.read_u32("payload checksum")?;
        if masked_crc(&payload) != data_crc {
            return Err(self.corrupt("payload checksum mismatch"));
        }
        Ok(Some(payload))
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| self.eof_or_io(e, &format!("truncated {what}")))?;
        Ok(u32::from_le_bytes(buf))
    }

    fn eof_or_io(&self, e: io::Error, reason: &str) -> VocoderError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            self.corrupt(reason)
        } else {
            VocoderError::Io(e)
        }
    }
}

impl<R: Read> Iterator for TfRecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ─── Writer ───────────────────────────────────────────────────────────────────
/// Appends framed payloads to a record file.
pub struct TfRecordWriter<W: Write> {
    inner: W,
}

impl TfRecordWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> TfRecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_record(&mut self, payload: &[u8]) -> Result<()> {
        let header = (payload.len() as u64).to_le_bytes();
        self.inner.write_all(&header)?;
        self.inner.write_all(&masked_crc(&header).to_le_bytes())?;
        self.inner.write_all(payload)?;
        self.inner.write_all(&masked_crc(payload).to_le_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn framed(payloads: &[&[u8]]) -> Vec<u8> {
        let mut writer = TfRecordWriter::new(Vec::new());
        for p in payloads {
            writer.write_record(p).unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn test_known_masked_crc() {
        // crc32c("123456789") = 0xe3069283
        let crc = 0xe306_9283u32;
        let expected = ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA);
        assert_eq!(masked_crc(b"123456789"), expected);
    }

    #[test]
    fn test_reads_back_all_payloads() {
        let bytes = framed(&[b"first", b"", b"third record"]);
        let reader = TfRecordReader::new(Cursor::new(bytes), "mem");
        let payloads: Vec<Vec<u8>> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(payloads, vec![b"first".to_vec(), Vec::new(), b"third record".to_vec()]);
    }

    #[test]
    fn test_empty_file_yields_nothing() {
        let mut reader = TfRecordReader::new(Cursor::new(Vec::new()), "mem");
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_checksum_mismatch_is_corrupt() {
        let mut bytes = framed(&[b"payload"]);
        let last = bytes.len() - 5;
        bytes[last] ^= 0xff; // flip a payload byte
        let mut reader = TfRecordReader::new(Cursor::new(bytes), "mem");
        assert!(matches!(reader.next(), Some(Err(VocoderError::Corrupt { .. }))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_frame_is_corrupt() {
        let mut bytes = framed(&[b"payload"]);
        bytes.truncate(bytes.len() - 2);
        let mut reader = TfRecordReader::new(Cursor::new(bytes), "mem");
        assert!(matches!(reader.next(), Some(Err(VocoderError::Corrupt { .. }))));
    }

    #[test]
    fn test_oversized_length_header_is_corrupt() {
        // A well-checksummed header announcing far more bytes than follow.
        let header = (u64::MAX / 2).to_le_bytes();
        let mut bytes = header.to_vec();
        bytes.extend_from_slice(&masked_crc(&header).to_le_bytes());
        bytes.extend_from_slice(b"short");
        let mut reader = TfRecordReader::new(Cursor::new(bytes), "mem");
        match reader.next() {
            Some(Err(VocoderError::Corrupt { reason, .. })) => assert_eq!(reason, "truncated payload"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(reader.next().is_none());
    }
}
