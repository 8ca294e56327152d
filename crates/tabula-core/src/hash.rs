//! Key hashes and content digests.
//!
//! Every hash or digest a column can select lives in [`KeyHash`]. Dispatch
//! happens in one place ([`KeyHash::digest`]) and output widths are
//! compile-time constants, so a resolved column knows its storage width
//! before any cell is converted.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::value::Value;

/// Byte width of an MD5 digest.
pub const MD5_LEN: usize = 16;
/// Byte width of a SHA-1 digest.
pub const SHA1_LEN: usize = 20;
/// Byte width of a SHA-256 digest.
pub const SHA256_LEN: usize = 32;

// ---------------------------------------------------------------------------
// FNV-1a
// ---------------------------------------------------------------------------

/// Streaming FNV-1a (64-bit).
///
/// Stands in for the platform "native" string hash, which is neither stable
/// across runs nor portable. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv64(pub u64);

impl Fnv64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for Fnv64 {
    fn default() -> Self {
        Self::new()
    }
}

/// Streaming FNV-1a (32-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv32(pub u32);

impl Fnv32 {
    const OFFSET: u32 = 0x811c9dc5;
    const PRIME: u32 = 0x01000193;

    pub fn new() -> Self {
        Self(Self::OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u32;
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    pub fn finish(self) -> u32 {
        self.0
    }
}

impl Default for Fnv32 {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// Adler-32 of the UTF-8 bytes of `text`. This is the localization key hash.
pub fn adler32(text: &str) -> u32 {
    adler2::adler32_slice(text.as_bytes())
}

/// CRC-32 (IEEE) of the UTF-8 bytes of `text`.
pub fn crc32(text: &str) -> u32 {
    crc32fast::hash(text.as_bytes())
}

// ---------------------------------------------------------------------------
// KeyHash
// ---------------------------------------------------------------------------

/// A hash or digest selectable from a type expression (`str:pk:md5`,
/// `str:sha1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyHash {
    /// FNV-1a 64-bit.
    Hash64,
    /// FNV-1a 32-bit.
    Hash32,
    Adler32,
    Crc32,
    Md5,
    Sha1,
    Sha256,
}

impl KeyHash {
    pub const ALL: [KeyHash; 7] = [
        KeyHash::Hash64,
        KeyHash::Hash32,
        KeyHash::Adler32,
        KeyHash::Crc32,
        KeyHash::Md5,
        KeyHash::Sha1,
        KeyHash::Sha256,
    ];

    /// Parse the attribute spelling used in type expressions.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hash64" => Some(KeyHash::Hash64),
            "hash32" => Some(KeyHash::Hash32),
            "adler32" => Some(KeyHash::Adler32),
            "crc32" => Some(KeyHash::Crc32),
            "md5" => Some(KeyHash::Md5),
            "sha1" => Some(KeyHash::Sha1),
            "sha256" => Some(KeyHash::Sha256),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyHash::Hash64 => "hash64",
            KeyHash::Hash32 => "hash32",
            KeyHash::Adler32 => "adler32",
            KeyHash::Crc32 => "crc32",
            KeyHash::Md5 => "md5",
            KeyHash::Sha1 => "sha1",
            KeyHash::Sha256 => "sha256",
        }
    }

    /// Number of bytes the hash occupies once dumped.
    pub const fn width(self) -> usize {
        match self {
            KeyHash::Hash64 => 8,
            KeyHash::Hash32 | KeyHash::Adler32 | KeyHash::Crc32 => 4,
            KeyHash::Md5 => MD5_LEN,
            KeyHash::Sha1 => SHA1_LEN,
            KeyHash::Sha256 => SHA256_LEN,
        }
    }

    /// True for the integer-valued hashes (stored as unsigned integers rather
    /// than raw digest bytes).
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            KeyHash::Hash64 | KeyHash::Hash32 | KeyHash::Adler32 | KeyHash::Crc32
        )
    }

    /// Hash `text` (as UTF-8) into a typed value: `Value::UInt` for the
    /// integer hashes, `Value::Bytes` for the cryptographic digests.
    pub fn digest(self, text: &str) -> Value {
        let bytes = text.as_bytes();
        match self {
            KeyHash::Hash64 => {
                let mut h = Fnv64::new();
                h.write(bytes);
                Value::UInt(h.finish())
            }
            KeyHash::Hash32 => {
                let mut h = Fnv32::new();
                h.write(bytes);
                Value::UInt(h.finish() as u64)
            }
            KeyHash::Adler32 => Value::UInt(adler32(text) as u64),
            KeyHash::Crc32 => Value::UInt(crc32(text) as u64),
            KeyHash::Md5 => Value::Bytes(Md5::digest(bytes).to_vec()),
            KeyHash::Sha1 => Value::Bytes(Sha1::digest(bytes).to_vec()),
            KeyHash::Sha256 => Value::Bytes(Sha256::digest(bytes).to_vec()),
        }
    }
}

impl std::fmt::Display for KeyHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
