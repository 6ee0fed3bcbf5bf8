//! Chunk-level walking of PNG/APNG byte streams.
//!
//! A PNG stream is an 8-byte signature followed by a sequence of
//! self-describing records:
//!
//! ```text
//! u32 length (BE) | 4-byte type | length bytes of data | u32 CRC32 (BE, type + data)
//! ```
//!
//! Chunks are never materialized as owned structs. A [`ChunkRef`] is a
//! validated byte offset into an immutable buffer together with the decoded
//! length and type; accessors slice the buffer on demand. Any structural
//! problem (short header, non-alphabetic type, length running past the end)
//! ends the scan with `None`. End of stream and a corrupt stream are not
//! distinguished here.

use byteorder_lite::{BigEndian, ByteOrder};

/// The fixed 8-byte magic prefix of every PNG stream.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Size of the length + type prefix of a chunk record.
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Size of the trailing CRC of a chunk record.
pub const CHUNK_CRC_SIZE: usize = 4;

/// The complete `IEND` record. It carries no data, so its CRC is a constant.
pub const IEND_CHUNK: [u8; 12] = [
    0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
];

/// Chunk types this crate distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    /// `IHDR`: image header (dimensions, bit depth, color type).
    Ihdr,
    /// `acTL`: animation control (frame count, play count).
    Actl,
    /// `fcTL`: per-frame control (extent, offset, timing, disposal, blend).
    Fctl,
    /// `fdAT`: frame data, prefixed by a 4-byte sequence number.
    Fdat,
    /// `IDAT`: image data of the default image.
    Idat,
    /// `IEND`: stream trailer.
    Iend,
    /// Any other chunk, passed through untouched.
    Other([u8; 4]),
}

impl ChunkKind {
    /// Classify a four-character chunk type.
    pub const fn from_fourcc(fourcc: [u8; 4]) -> Self {
        match &fourcc {
            b"IHDR" => Self::Ihdr,
            b"acTL" => Self::Actl,
            b"fcTL" => Self::Fctl,
            b"fdAT" => Self::Fdat,
            b"IDAT" => Self::Idat,
            b"IEND" => Self::Iend,
            _ => Self::Other(fourcc),
        }
    }

    /// The four-character type of this chunk kind.
    pub const fn to_fourcc(self) -> [u8; 4] {
        match self {
            Self::Ihdr => *b"IHDR",
            Self::Actl => *b"acTL",
            Self::Fctl => *b"fcTL",
            Self::Fdat => *b"fdAT",
            Self::Idat => *b"IDAT",
            Self::Iend => *b"IEND",
            Self::Other(fourcc) => fourcc,
        }
    }
}

/// A validated chunk position inside a byte buffer.
///
/// A `ChunkRef` only means something together with the buffer it was
/// produced from (or a longer buffer sharing the same prefix, which is how
/// progressive input keeps cursors valid while bytes are appended).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRef {
    offset: usize,
    length: u32,
    kind: ChunkKind,
}

impl ChunkRef {
    /// Byte offset of the record (its length field) in the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Declared data length.
    pub fn data_length(&self) -> usize {
        self.length as usize
    }

    /// Chunk type.
    pub fn kind(&self) -> ChunkKind {
        self.kind
    }

    /// Raw four-character type.
    pub fn fourcc(&self) -> [u8; 4] {
        self.kind.to_fourcc()
    }

    /// Size of the whole record: header, data and CRC.
    pub fn record_size(&self) -> usize {
        CHUNK_HEADER_SIZE + self.data_length() + CHUNK_CRC_SIZE
    }

    /// Offset one past the end of the record, where the next chunk starts.
    pub fn end(&self) -> usize {
        self.offset + self.record_size()
    }

    /// The chunk's data bytes.
    pub fn data<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        let start = self.offset + CHUNK_HEADER_SIZE;
        &buf[start..start + self.data_length()]
    }

    /// The complete record: length, type, data and CRC.
    pub fn record<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.offset..self.end()]
    }

    /// The CRC stored in the stream.
    pub fn stored_crc(&self, buf: &[u8]) -> u32 {
        BigEndian::read_u32(&buf[self.end() - CHUNK_CRC_SIZE..])
    }

    /// Whether the stored CRC matches the type and data.
    ///
    /// Scanning never calls this; it is available for callers that want
    /// byte-level integrity checks.
    pub fn crc_matches(&self, buf: &[u8]) -> bool {
        self.stored_crc(buf) == crc32(self.fourcc(), self.data(buf))
    }

    /// Ancillary bit (lowercase first letter). Advisory only.
    pub fn is_ancillary(&self) -> bool {
        self.fourcc()[0] & 0x20 != 0
    }

    /// Safe-to-copy bit (lowercase fourth letter). Advisory only.
    pub fn is_safe_to_copy(&self) -> bool {
        self.fourcc()[3] & 0x20 != 0
    }
}

/// Check the fixed magic prefix.
pub fn validate_signature(buf: &[u8]) -> bool {
    buf.len() >= PNG_SIGNATURE.len() && buf[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
}

/// Whether a structurally valid chunk record starts at `offset`.
///
/// The header must lie inside `buf`, the type must consist of ASCII
/// letters, and `header + data + crc` must end within `buf`.
pub fn is_chunk_valid(buf: &[u8], offset: usize) -> bool {
    chunk_at(buf, offset).is_some()
}

/// Decode the chunk record starting at `offset`, if it is valid.
pub fn chunk_at(buf: &[u8], offset: usize) -> Option<ChunkRef> {
    let header_end = offset.checked_add(CHUNK_HEADER_SIZE)?;
    if header_end > buf.len() {
        return None;
    }
    let length = BigEndian::read_u32(&buf[offset..]);
    let mut fourcc = [0u8; 4];
    fourcc.copy_from_slice(&buf[offset + 4..header_end]);
    if !fourcc.iter().all(u8::is_ascii_alphabetic) {
        return None;
    }
    let end = header_end
        .checked_add(length as usize)?
        .checked_add(CHUNK_CRC_SIZE)?;
    if end > buf.len() {
        return None;
    }
    Some(ChunkRef {
        offset,
        length,
        kind: ChunkKind::from_fourcc(fourcc),
    })
}

/// The first chunk after the signature.
pub fn first_chunk(buf: &[u8]) -> Option<ChunkRef> {
    if !validate_signature(buf) {
        return None;
    }
    chunk_at(buf, PNG_SIGNATURE.len())
}

/// The chunk following `current`, located at
/// `current + header + data_length + crc` and validated before returning.
pub fn next_chunk(buf: &[u8], current: &ChunkRef) -> Option<ChunkRef> {
    chunk_at(buf, current.end())
}

/// Iterate over all valid chunks after the signature, stopping at the first
/// invalid or incomplete record.
pub fn chunks(buf: &[u8]) -> Chunks<'_> {
    Chunks {
        buf,
        next: first_chunk(buf),
    }
}

/// Iterator returned by [`chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    buf: &'a [u8],
    next: Option<ChunkRef>,
}

impl Iterator for Chunks<'_> {
    type Item = ChunkRef;

    fn next(&mut self) -> Option<ChunkRef> {
        let current = self.next?;
        self.next = next_chunk(self.buf, &current);
        Some(current)
    }
}

/// CRC32 over a chunk type and its data.
pub fn crc32(fourcc: [u8; 4], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&fourcc);
    hasher.update(data);
    hasher.finalize()
}

/// Append a complete chunk record with a freshly computed CRC.
pub fn write_chunk(out: &mut Vec<u8>, fourcc: [u8; 4], data: &[u8]) {
    let mut len = [0u8; 4];
    BigEndian::write_u32(&mut len, data.len() as u32);
    out.extend_from_slice(&len);
    out.extend_from_slice(&fourcc);
    out.extend_from_slice(data);
    let mut crc = [0u8; 4];
    BigEndian::write_u32(&mut crc, crc32(fourcc, data));
    out.extend_from_slice(&crc);
}

/// Convert one whole `fdAT` record into the equivalent `IDAT` record.
///
/// The 4-byte sequence number is dropped from the data, the declared length
/// shrinks by 4, and the CRC is recomputed over the new type and data.
/// Returns `None` if the input is not a complete `fdAT` record.
pub fn rewrite_frame_data_as_image_data(record: &[u8]) -> Option<Vec<u8>> {
    let chunk = chunk_at(record, 0)?;
    if chunk.kind() != ChunkKind::Fdat || chunk.end() != record.len() {
        return None;
    }
    let data = chunk.data(record);
    let payload = data.get(4..)?;
    let mut out = Vec::with_capacity(chunk.record_size() - 4);
    write_chunk(&mut out, *b"IDAT", payload);
    Some(out)
}
