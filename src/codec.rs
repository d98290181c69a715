//! Compact binary-to-text encoding for ledger payloads
//!
//! Numeric arrays are stored as Ascii85 text of their little-endian IEEE-754
//! bytes. This keeps checkpoint files small and reloads bit-for-bit, which
//! plain JSON numbers cannot do for infinities and NaN.
//!
//! Scalars stay readable: finite values are JSON numbers, non-finite values
//! are the strings `"inf"`, `"-inf"` and `"nan"`.

use crate::{Error, Result};

const A85_OFFSET: u8 = b'!';
const A85_ZERO_GROUP: char = 'z';

/// Encode bytes as Ascii85 (no `<~ ~>` delimiters).
#[must_use]
pub fn a85_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 5 / 4 + 5);
    for chunk in bytes.chunks(4) {
        let mut group = [0u8; 4];
        group[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(group);

        if chunk.len() == 4 && value == 0 {
            out.push(A85_ZERO_GROUP);
            continue;
        }

        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            #[allow(clippy::cast_possible_truncation)]
            let d = (value % 85) as u8;
            *digit = d + A85_OFFSET;
            value /= 85;
        }
        // A partial group of n bytes needs only n + 1 digits.
        for &d in &digits[..=chunk.len()] {
            out.push(char::from(d));
        }
    }
    out
}

/// Decode Ascii85 text produced by [`a85_encode`]. Whitespace is ignored.
///
/// # Errors
///
/// Returns `Error::Decode` on characters outside the alphabet, a misplaced
/// `z`, an overflowing group, or a truncated final group.
pub fn a85_decode(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 4 / 5 + 4);
    let mut digits = [0u32; 5];
    let mut filled = 0;

    for c in text.bytes().filter(|c| !c.is_ascii_whitespace()) {
        match c {
            b'z' if filled == 0 => out.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                digits[filled] = u32::from(c - A85_OFFSET);
                filled += 1;
                if filled == 5 {
                    out.extend_from_slice(&group_value(&digits)?.to_be_bytes());
                    filled = 0;
                }
            }
            _ => {
                return Err(Error::Decode(format!(
                    "invalid Ascii85 character {:?}",
                    char::from(c)
                )))
            }
        }
    }

    match filled {
        0 => {}
        1 => return Err(Error::Decode("truncated Ascii85 group".to_string())),
        n => {
            for d in &mut digits[n..] {
                *d = 84;
            }
            let value = group_value(&digits)?;
            out.extend_from_slice(&value.to_be_bytes()[..n - 1]);
        }
    }
    Ok(out)
}

fn group_value(digits: &[u32; 5]) -> Result<u32> {
    let value = digits.iter().fold(0u64, |acc, &d| acc * 85 + u64::from(d));
    u32::try_from(value).map_err(|_| Error::Decode("Ascii85 group overflows 32 bits".to_string()))
}

/// Encode a float slice bit-exactly.
#[must_use]
pub fn encode_f64s(values: &[f64]) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    a85_encode(&bytes)
}

/// Decode a float array written by [`encode_f64s`].
///
/// # Errors
///
/// Returns `Error::Decode` if the text is not Ascii85 or the byte count is
/// not a multiple of 8
pub fn decode_f64s(text: &str) -> Result<Vec<f64>> {
    let bytes = a85_decode(text)?;
    if bytes.len() % 8 != 0 {
        return Err(Error::Decode(format!(
            "float payload has {} bytes, not a multiple of 8",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect())
}

/// Encode an index array (stored as little-endian `u64`).
#[must_use]
pub fn encode_indices(values: &[usize]) -> String {
    let bytes: Vec<u8> = values
        .iter()
        .flat_map(|&v| (v as u64).to_le_bytes())
        .collect();
    a85_encode(&bytes)
}

/// Decode an index array written by [`encode_indices`].
///
/// # Errors
///
/// Returns `Error::Decode` on malformed text or out-of-range indices
pub fn decode_indices(text: &str) -> Result<Vec<usize>> {
    let bytes = a85_decode(text)?;
    if bytes.len() % 8 != 0 {
        return Err(Error::Decode(format!(
            "index payload has {} bytes, not a multiple of 8",
            bytes.len()
        )));
    }
    bytes
        .chunks_exact(8)
        .map(|c| {
            let v = u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]);
            usize::try_from(v).map_err(|_| Error::Decode(format!("index {v} out of range")))
        })
        .collect()
}

/// Serde adapter: `Vec<f64>` as one Ascii85 string.
pub mod f64_array {
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors
    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::encode_f64s(values))
    }

    /// Deserialize.
    ///
    /// # Errors
    ///
    /// Fails on malformed payloads
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let text = String::deserialize(d)?;
        super::decode_f64s(&text).map_err(de::Error::custom)
    }
}

/// Serde adapter: `Option<Vec<f64>>` as an Ascii85 string or `null`.
pub mod opt_f64_array {
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(values: &Option<Vec<f64>>, s: S) -> Result<S::Ok, S::Error> {
        match values {
            Some(v) => s.serialize_some(&super::encode_f64s(v)),
            None => s.serialize_none(),
        }
    }

    /// Deserialize.
    ///
    /// # Errors
    ///
    /// Fails on malformed payloads
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<f64>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| super::decode_f64s(&text).map_err(de::Error::custom))
            .transpose()
    }
}

/// Serde adapter: `Vec<Vec<f64>>` as a list of Ascii85 strings.
pub mod f64_arrays {
    use serde::ser::SerializeSeq;
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors
    pub fn serialize<S: Serializer>(values: &[Vec<f64>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&super::encode_f64s(v))?;
        }
        seq.end()
    }

    /// Deserialize.
    ///
    /// # Errors
    ///
    /// Fails on malformed payloads
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<f64>>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|text| super::decode_f64s(text).map_err(de::Error::custom))
            .collect()
    }
}

/// Serde adapter: `Vec<Vec<usize>>` as a list of Ascii85 strings.
pub mod index_arrays {
    use serde::ser::SerializeSeq;
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors
    pub fn serialize<S: Serializer>(values: &[Vec<usize>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&super::encode_indices(v))?;
        }
        seq.end()
    }

    /// Deserialize.
    ///
    /// # Errors
    ///
    /// Fails on malformed payloads
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<usize>>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|text| super::decode_indices(text).map_err(de::Error::custom))
            .collect()
    }
}

/// Serde adapter: `f64` as a JSON number, or `"inf"`/`"-inf"`/`"nan"`.
pub mod float {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    /// Serialize.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_f64(*value)
        } else if value.is_nan() {
            s.serialize_str("nan")
        } else if value.is_sign_positive() {
            s.serialize_str("inf")
        } else {
            s.serialize_str("-inf")
        }
    }

    /// Deserialize.
    ///
    /// # Errors
    ///
    /// Fails on anything that is neither a number nor a known non-finite token
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        d.deserialize_any(FloatVisitor)
    }

    pub(super) struct FloatVisitor;

    impl de::Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or one of \"inf\", \"-inf\", \"nan\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        #[allow(clippy::cast_precision_loss)]
        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        #[allow(clippy::cast_precision_loss)]
        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                "nan" | "NaN" => Ok(f64::NAN),
                other => Err(E::custom(format!("unknown float token {other:?}"))),
            }
        }
    }
}

/// Serde adapter: `Option<f64>` with the same scalar rules as [`float`].
pub mod opt_float {
    use std::fmt;

    use serde::{de, Deserializer, Serializer};

    /// Serialize.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors
    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::float::serialize(v, s),
            None => s.serialize_none(),
        }
    }

    /// Deserialize.
    ///
    /// # Errors
    ///
    /// Fails on anything that is neither null, a number, nor a known token
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        d.deserialize_option(OptVisitor)
    }

    struct OptVisitor;

    impl<'de> de::Visitor<'de> for OptVisitor {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("null, a number, or a non-finite float token")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(super::float::FloatVisitor).map(Some)
        }
    }
}
