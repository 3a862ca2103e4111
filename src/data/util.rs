//! Utilities for on-disk data that don't warrant their own modules.

use std::str::FromStr;

use q2model_macros::BspVariableValue;
#[cfg(feature = "serde")]
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
	reader::{BspValue, ByteReader, ParseContext},
	ModelError, ModelResult,
};

/// An unsigned variable integer parsed from a BSP. u16 in the legacy layout, u32 in the extended one.
#[derive(BspVariableValue, Hash, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[legacy(u16)]
#[extended(u32)]
pub struct UBspValue(pub u32);

/// A signed variable integer parsed from a BSP. i16 in the legacy layout, i32 in the extended one.
#[derive(BspVariableValue, Hash, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[legacy(i16)]
#[extended(i32)]
pub struct IBspValue(pub i32);

/// Fixed-sized UTF-8 string. Zero-padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedStr<const N: usize> {
	data: [u8; N],
}

impl<const N: usize> BspValue for FixedStr<N> {
	fn bsp_parse(reader: &mut ByteReader) -> ModelResult<Self> {
		let data = reader.read()?;
		Self::new(data).map_err(ModelError::map_utf8_error(&data))
	}
	#[inline]
	fn bsp_struct_size(_ctx: &ParseContext) -> usize {
		N
	}
}

impl<const N: usize> FixedStr<N> {
	pub fn new(mut data: [u8; N]) -> Result<Self, std::str::Utf8Error> {
		// Clear any garbage after the '\0' terminator.
		if let Some(index) = data.iter().position(|b| *b == 0) {
			data[index..].fill(0);
		}
		std::str::from_utf8(&data)?;
		Ok(Self { data })
	}

	pub fn as_str(&self) -> &str {
		// SAFETY: This is checked when a FixedStr is created
		unsafe { std::str::from_utf8_unchecked(&self.data) }.trim_end_matches('\0')
	}

	/// The raw zero-padded bytes, as they would be written to disk.
	pub fn as_bytes(&self) -> &[u8; N] {
		&self.data
	}
}

impl<const N: usize> Default for FixedStr<N> {
	fn default() -> Self {
		Self { data: [0; N] }
	}
}

impl<const N: usize> std::fmt::Debug for FixedStr<N> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

impl<const N: usize> std::fmt::Display for FixedStr<N> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

impl<const N: usize> FromStr for FixedStr<N> {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.len() > N {
			return Err(());
		}
		let mut data = [0; N];
		data[..s.len()].copy_from_slice(s.as_bytes());

		Ok(Self { data })
	}
}

#[cfg(feature = "serde")]
impl<const N: usize> Serialize for FixedStr<N> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

#[cfg(feature = "serde")]
impl<'de, const N: usize> Deserialize<'de> for FixedStr<N> {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct DataVisitor<const N: usize>;
		impl<const N: usize> de::Visitor<'_> for DataVisitor<N> {
			type Value = FixedStr<N>;
			fn expecting(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
				write!(fmt, "string of at most {N} bytes")
			}

			fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
				FixedStr::from_str(v).map_err(|_| E::custom(format_args!("string was of len {}, when max len is {N}", v.len())))
			}
		}

		deserializer.deserialize_str(DataVisitor::<N>)
	}
}
