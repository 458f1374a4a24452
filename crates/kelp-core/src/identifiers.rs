//! The 160-bit peer identifier.
//!
//! Peer ids and content keys share one 160-bit space. Distance between
//! two ids is their XOR, interpreted as an unsigned integer; the
//! bit-length of that distance determines which routing bucket a peer
//! falls into.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 160-bit identifier (peer id or content key).
///
/// Stored big-endian, so the derived ordering is the unsigned-magnitude
/// ordering of the 160-bit value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    /// Number of bits in an identifier.
    pub const BITS: usize = 160;

    /// The all-zero identifier. Not a valid peer id.
    pub const ZERO: PeerId = PeerId([0u8; 20]);

    /// The all-ones identifier.
    pub const MAX: PeerId = PeerId([0xFF; 20]);

    /// Creates a new identifier from a 20-byte array.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the inner bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Creates from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 20 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Returns as a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Computes the XOR of two identifiers, the distance metric of the
    /// overlay.
    pub fn xor(&self, other: &Self) -> Self {
        let mut result = [0u8; 20];
        for i in 0..20 {
            result[i] = self.0[i] ^ other.0[i];
        }
        Self(result)
    }

    /// Returns the number of leading zero bits.
    pub fn leading_zeros(&self) -> u32 {
        let mut zeros = 0u32;
        for byte in &self.0 {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }

    /// Returns the index of the most-significant set bit plus one, or
    /// zero when no bit is set.
    pub fn bit_length(&self) -> u32 {
        Self::BITS as u32 - self.leading_zeros()
    }

    /// Generates a random identifier.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl From<[u8; 20]> for PeerId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl From<PeerId> for [u8; 20] {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

impl AsRef<[u8]> for PeerId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
