//! Strict hex codec.
//!
//! Every hex payload that crosses a process boundary (relay responses, plugin
//! responses, configuration) goes through these functions. Encoding always
//! produces lowercase digits with a "0x" prefix. Decoding accepts an optional
//! prefix and rejects odd lengths and non-hex characters instead of skipping them.

use super::formatting::without_0x_prefix;
use thiserror::Error;

/// Errors produced when decoding hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
	/// The digit count (after the prefix) is odd.
	#[error("Malformed hex: odd number of digits ({0})")]
	OddLength(usize),
	/// A character outside `[0-9a-fA-F]` was found.
	#[error("Malformed hex: invalid character {character:?} at position {index}")]
	InvalidCharacter { character: char, index: usize },
	/// The decoded byte length differs from the expected fixed width.
	#[error("Malformed hex: expected {expected} bytes, got {actual}")]
	InvalidLength { expected: usize, actual: usize },
}

impl HexError {
	/// Returns true when the input had an odd number of digits.
	pub fn is_odd_length(&self) -> bool {
		matches!(self, HexError::OddLength(_))
	}
}

/// Encodes bytes as a lowercase, "0x"-prefixed hex string.
pub fn encode_hex(bytes: impl AsRef<[u8]>) -> String {
	format!("0x{}", hex::encode(bytes))
}

/// Decodes a hex string with an optional "0x" prefix.
///
/// `""` and `"0x"` decode to an empty vector.
pub fn decode_hex(input: &str) -> Result<Vec<u8>, HexError> {
	let digits = without_0x_prefix(input);
	if digits.len() % 2 != 0 {
		return Err(HexError::OddLength(digits.len()));
	}

	hex::decode(digits).map_err(|e| match e {
		hex::FromHexError::InvalidHexCharacter { c, index } => HexError::InvalidCharacter {
			character: c,
			index,
		},
		hex::FromHexError::OddLength => HexError::OddLength(digits.len()),
		hex::FromHexError::InvalidStringLength => HexError::OddLength(digits.len()),
	})
}

/// Decodes a hex string into a fixed-size array.
pub fn decode_fixed<const N: usize>(input: &str) -> Result<[u8; N], HexError> {
	let bytes = decode_hex(input)?;
	let actual = bytes.len();
	bytes.try_into().map_err(|_| HexError::InvalidLength {
		expected: N,
		actual,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_encode_is_prefixed_lowercase() {
		assert_eq!(encode_hex([0xAB, 0x01, 0xff]), "0xab01ff");
		assert_eq!(encode_hex([]), "0x");
	}

	#[test]
	fn test_decode_empty_inputs() {
		assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
		assert_eq!(decode_hex("0x").unwrap(), Vec::<u8>::new());
	}

	#[test]
	fn test_decode_accepts_optional_prefix_and_mixed_case() {
		assert_eq!(decode_hex("0xDEADbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
		assert_eq!(decode_hex("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
	}

	#[test]
	fn test_decode_rejects_odd_length() {
		let err = decode_hex("0xabc").unwrap_err();
		assert_eq!(err, HexError::OddLength(3));
		assert!(err.is_odd_length());
	}

	#[test]
	fn test_decode_rejects_invalid_characters() {
		let err = decode_hex("0xzz").unwrap_err();
		assert!(matches!(
			err,
			HexError::InvalidCharacter { character: 'z', index: 0 }
		));
		assert!(!err.is_odd_length());
	}

	#[test]
	fn test_round_trip() {
		let samples: Vec<Vec<u8>> = vec![
			vec![],
			vec![0],
			vec![0, 0, 1],
			(0u8..=255).collect(),
			vec![0xff; 3309],
		];
		for bytes in samples {
			assert_eq!(decode_hex(&encode_hex(&bytes)).unwrap(), bytes);
		}
	}

	#[test]
	fn test_decode_fixed() {
		let word: [u8; 4] = decode_fixed("0x01020304").unwrap();
		assert_eq!(word, [1, 2, 3, 4]);

		let err = decode_fixed::<32>("0x0102").unwrap_err();
		assert_eq!(
			err,
			HexError::InvalidLength {
				expected: 32,
				actual: 2
			}
		);
	}
}
