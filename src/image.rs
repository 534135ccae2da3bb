//! Glulx image header, checksum and the final byte stream.

use serde::{Deserialize, Serialize};

use crate::error::{AsmError, Result, SourceLoc};
use crate::sink::{read_be_u32, write_be_u32};
use crate::unit::Unit;

pub const MAGIC: u32 = 0x476C_756C; // "Glul"
pub const VERSION: u32 = 0x0003_0102;
pub const HEADER_SIZE: usize = 36;
pub const CHECKSUM_OFFSET: usize = 32;
/// Image length and RAMSTART are multiples of this.
pub const PAGE: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub ram_start: u32,
    pub ext_start: u32,
    pub end_mem: u32,
    pub stack_size: u32,
    pub start_func: u32,
    pub decoding_table: u32,
    pub checksum: u32,
}

impl Header {
    /// Header for an image whose units end at `code_size`; the image length
    /// fields use the page-padded size. The checksum starts out zero.
    pub fn new(rom_end: u32, code_size: u32, stack_size: u32, entry: u32) -> Self {
        let padded = code_size.next_multiple_of(PAGE);
        Self {
            magic: MAGIC,
            version: VERSION,
            ram_start: rom_end,
            ext_start: padded,
            end_mem: padded,
            stack_size,
            start_func: entry,
            decoding_table: 0,
            checksum: 0,
        }
    }

    fn words(&self) -> [u32; 9] {
        [
            self.magic,
            self.version,
            self.ram_start,
            self.ext_start,
            self.end_mem,
            self.stack_size,
            self.start_func,
            self.decoding_table,
            self.checksum,
        ]
    }

    /// Writes the header into the first 36 bytes of `bytes`.
    pub fn write(&self, bytes: &mut [u8]) {
        for (i, word) in self.words().into_iter().enumerate() {
            write_be_u32(bytes, i * 4, word);
        }
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let w = |i: usize| read_be_u32(bytes, i * 4);
        Some(Self {
            magic: w(0)?,
            version: w(1)?,
            ram_start: w(2)?,
            ext_start: w(3)?,
            end_mem: w(4)?,
            stack_size: w(5)?,
            start_func: w(6)?,
            decoding_table: w(7)?,
            checksum: w(8)?,
        })
    }
}

/// Wrapping sum of every big-endian word, reading the checksum field as zero.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .chunks(4)
        .enumerate()
        .filter(|(i, _)| i * 4 != CHECKSUM_OFFSET)
        .fold(0u32, |sum, (_, chunk)| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            sum.wrapping_add(u32::from_be_bytes(word))
        })
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image is {len} bytes, shorter than the header")]
    TooShort { len: usize },
    #[error("bad magic {found:#010x}")]
    BadMagic { found: u32 },
    #[error("{what} {value:#x} is not a multiple of 256")]
    Misaligned { what: &'static str, value: u32 },
    #[error("EXTSTART {ext_start:#x} does not match image length {len:#x}")]
    LengthMismatch { ext_start: u32, len: usize },
    #[error("checksum {stored:#010x} does not match computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// A finished game file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlulxImage {
    bytes: Vec<u8>,
    header: Header,
}

impl GlulxImage {
    /// Wraps bytes read from disk. Only the header is parsed; see
    /// [`verify`](Self::verify) for the full checks.
    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<Self, ImageError> {
        let header = Header::parse(&bytes).ok_or(ImageError::TooShort { len: bytes.len() })?;
        Ok(Self { bytes, header })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn verify(&self) -> std::result::Result<(), ImageError> {
        let h = &self.header;
        if h.magic != MAGIC {
            return Err(ImageError::BadMagic { found: h.magic });
        }
        if h.ram_start % PAGE != 0 {
            return Err(ImageError::Misaligned {
                what: "RAMSTART",
                value: h.ram_start,
            });
        }
        let len = self.bytes.len();
        if len % PAGE as usize != 0 {
            return Err(ImageError::Misaligned {
                what: "image length",
                value: len as u32,
            });
        }
        if h.ext_start as usize != len {
            return Err(ImageError::LengthMismatch {
                ext_start: h.ext_start,
                len,
            });
        }
        let computed = checksum(&self.bytes);
        if computed != h.checksum {
            return Err(ImageError::ChecksumMismatch {
                stored: h.checksum,
                computed,
            });
        }
        Ok(())
    }
}

/// Emits ROM from offset 0, stamps the header over the reserved space, emits
/// RAM from `header.ram_start`, pads to a page and stores the checksum.
pub fn write_image(rom: &[Unit], ram: &[Unit], mut header: Header) -> Result<GlulxImage> {
    let loc = SourceLoc::default();
    let mut out: Vec<u8> = Vec::with_capacity(header.ext_start as usize);
    for unit in rom {
        unit.emit(&mut out)?;
    }
    if out.len() != header.ram_start as usize || out.len() < HEADER_SIZE {
        return Err(AsmError::internal(
            &loc,
            format!(
                "ROM ends at {:#x}, expected {:#x}",
                out.len(),
                header.ram_start
            ),
        ));
    }
    header.checksum = 0;
    header.write(&mut out);
    for unit in ram {
        unit.emit(&mut out)?;
    }
    if out.len() > header.ext_start as usize {
        return Err(AsmError::internal(
            &loc,
            format!("RAM ran past the image end {:#x}", header.ext_start),
        ));
    }
    out.resize(header.ext_start as usize, 0);
    header.checksum = checksum(&out);
    write_be_u32(&mut out, CHECKSUM_OFFSET, header.checksum);
    Ok(GlulxImage { bytes: out, header })
}
