//! Container file header definition.

/// Magic bytes for chunk files.
pub const CHUNK_MAGIC: [u8; 4] = *b"PCCK";

/// Magic bytes for scene files.
pub const SCENE_MAGIC: [u8; 4] = *b"PCSC";

/// Current container format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Flag bit: the payload carries a labels section.
pub const FLAG_LABELS: u16 = 1 << 0;

/// Flag bit: the payload carries a provenance section (scene name,
/// valid mask, origin indices).
pub const FLAG_PROVENANCE: u16 = 1 << 1;

/// Container file header.
///
/// Layout (16 bytes total):
/// - Bytes 0-3: Magic ("PCCK" for chunks, "PCSC" for scenes)
/// - Bytes 4-5: version (u16 LE)
/// - Bytes 6-7: flags (u16 LE)
/// - Bytes 8-11: count (u32 LE) = points in the payload
/// - Bytes 12-15: reserved (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    /// Magic bytes identifying the payload kind.
    pub magic: [u8; 4],
    /// Format version.
    pub version: u16,
    /// Section flags.
    pub flags: u16,
    /// Number of points in the payload.
    pub count: u32,
    /// Reserved bytes for future expansion.
    pub reserved: [u8; 4],
}

impl FileHeader {
    /// Create a new header with the given magic, flags, and point count.
    pub fn new(magic: [u8; 4], flags: u16, count: u32) -> Self {
        Self {
            magic,
            version: FORMAT_VERSION,
            flags,
            count,
            reserved: [0; 4],
        }
    }

    /// Check whether a flag bit is set.
    #[inline]
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// Serialize the header to a byte array.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];

        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.flags.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.reserved);

        bytes
    }

    /// Deserialize a header from a byte array.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        let mut reserved = [0u8; 4];
        reserved.copy_from_slice(&bytes[12..16]);

        Self {
            magic,
            version,
            flags,
            count,
            reserved,
        }
    }
}
