//! Utility functions for hex conversion and string formatting.

pub mod formatting;
pub mod hex_codec;

pub use formatting::{truncate_id, without_0x_prefix};
pub use hex_codec::{decode_fixed, decode_hex, encode_hex, HexError};
