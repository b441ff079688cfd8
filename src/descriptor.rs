use bitvec::{order::Msb0, view::BitView};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{convert::TryInto, fmt};

/// A fixed size binary keypoint descriptor that can be clustered into a vocabulary.
pub trait BinaryDescriptor:
    Copy + PartialEq + fmt::Debug + Serialize + DeserializeOwned
{
    /// Size of the descriptor in bytes.
    const BYTES: usize;

    /// Hamming distance between two descriptors.
    fn distance(&self, other: &Self) -> u32;

    /// Bitwise majority vote of a collection of descriptors.
    ///
    /// A bit is set in the result iff it is set in at least half of the inputs, so two
    /// descriptors average to their bitwise or. No inputs give all zeros.
    fn mean(descriptors: &[&Self]) -> Self;

    fn from_bytes(bytes: &[u8]) -> Option<Self>;

    fn as_bytes(&self) -> &[u8];
}

/// Binary descriptor of `B` bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinDesc<const B: usize>(pub [u8; B]);

/// 512 bit descriptor produced by BRISK.
pub type BriskDesc = BinDesc<64>;

/// 256 bit descriptor produced by ORB and BRIEF.
pub type OrbDesc = BinDesc<32>;

impl<const B: usize> BinaryDescriptor for BinDesc<B> {
    const BYTES: usize = B;

    #[inline]
    fn distance(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0, |a, (b, c)| a + (*b ^ *c).count_ones())
    }

    fn mean(descriptors: &[&Self]) -> Self {
        let mut result = [0u8; B];
        if descriptors.is_empty() {
            return BinDesc(result);
        }
        let n = descriptors.len();
        let threshold = n / 2 + n % 2;
        let mut counts = vec![0usize; B * 8];
        for d in descriptors {
            for (i, b) in d.0[..].view_bits::<Msb0>().iter().enumerate() {
                if *b {
                    counts[i] += 1;
                }
            }
        }
        let result_bits = result[..].view_bits_mut::<Msb0>();
        for (i, &c) in counts.iter().enumerate() {
            if c >= threshold {
                result_bits.set(i, true);
            }
        }
        BinDesc(result)
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(BinDesc)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl<const B: usize> Default for BinDesc<B> {
    fn default() -> Self {
        BinDesc([0; B])
    }
}

impl<const B: usize> From<[u8; B]> for BinDesc<B> {
    fn from(bytes: [u8; B]) -> Self {
        BinDesc(bytes)
    }
}

impl<const B: usize> fmt::Debug for BinDesc<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// serde only derives arrays up to 32 elements, BRISK needs 64.
impl<const B: usize> Serialize for BinDesc<B> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de, const B: usize> Deserialize<'de> for BinDesc<B> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DescVisitor<const N: usize>;

        impl<'de, const N: usize> serde::de::Visitor<'de> for DescVisitor<N> {
            type Value = BinDesc<N>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a binary descriptor of {} bytes", N)
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                BinDesc::from_bytes(v).ok_or_else(|| E::invalid_length(v.len(), &self))
            }

            fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                self.visit_bytes(&v)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut out = [0u8; N];
                for (i, byte) in out.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| serde::de::Error::invalid_length(i, &self))?;
                }
                Ok(BinDesc(out))
            }
        }

        deserializer.deserialize_bytes(DescVisitor::<B>)
    }
}
