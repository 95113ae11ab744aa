//! Configuration validation for pluggable implementations.
//!
//! Every signer backend and relay receives its own raw TOML table. Before an
//! implementation is constructed, its table is checked against a [`Schema`]
//! so that a typo in an address or a seed of the wrong width is reported at
//! startup with the offending field name rather than deep inside the pipeline.

use crate::utils::decode_hex;
use alloy_primitives::Address;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field has the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// Any string.
	String,
	/// An integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	/// A boolean.
	Boolean,
	/// A 20-byte hex address.
	Address,
	/// A hex string, optionally of an exact decoded byte length.
	Hex { bytes: Option<usize> },
	/// An http(s) URL.
	Url,
	/// One of a fixed set of strings.
	OneOf(&'static [&'static str]),
}

/// Custom validator run after the type check.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field with its expected type.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Required and optional fields of one implementation table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	///
	/// Required fields must be present; optional fields are checked only when
	/// present. Unknown keys are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			validate_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				validate_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn validate_field(field: &Field, value: &toml::Value) -> Result<(), ValidationError> {
	validate_field_type(&field.name, value, &field.field_type)?;

	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| ValidationError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}

	Ok(())
}

fn expect_str<'a>(field_name: &str, value: &'a toml::Value) -> Result<&'a str, ValidationError> {
	value.as_str().ok_or_else(|| ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: "string".to_string(),
		actual: value.type_str().to_string(),
	})
}

fn invalid(field_name: &str, message: impl Into<String>) -> ValidationError {
	ValidationError::InvalidValue {
		field: field_name.to_string(),
		message: message.into(),
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			expect_str(field_name, value)?;
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| ValidationError::TypeMismatch {
					field: field_name.to_string(),
					expected: "integer".to_string(),
					actual: value.type_str().to_string(),
				})?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(invalid(
						field_name,
						format!("Value {} is less than minimum {}", int_val, min_val),
					));
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(invalid(
						field_name,
						format!("Value {} is greater than maximum {}", int_val, max_val),
					));
				}
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(ValidationError::TypeMismatch {
					field: field_name.to_string(),
					expected: "boolean".to_string(),
					actual: value.type_str().to_string(),
				});
			}
		},
		FieldType::Address => {
			let s = expect_str(field_name, value)?;
			s.parse::<Address>()
				.map_err(|e| invalid(field_name, format!("Invalid address '{}': {}", s, e)))?;
		},
		FieldType::Hex { bytes } => {
			let s = expect_str(field_name, value)?;
			let decoded = decode_hex(s).map_err(|e| invalid(field_name, e.to_string()))?;
			if let Some(expected) = bytes {
				if decoded.len() != *expected {
					return Err(invalid(
						field_name,
						format!("Expected {} bytes, got {}", expected, decoded.len()),
					));
				}
			}
		},
		FieldType::Url => {
			let s = expect_str(field_name, value)?;
			if !(s.starts_with("http://") || s.starts_with("https://")) {
				return Err(invalid(
					field_name,
					format!("URL must start with http:// or https://, got '{}'", s),
				));
			}
		},
		FieldType::OneOf(options) => {
			let s = expect_str(field_name, value)?;
			if !options.contains(&s) {
				return Err(invalid(
					field_name,
					format!("Expected one of {:?}, got '{}'", options, s),
				));
			}
		},
	}

	Ok(())
}

/// A schema that can validate an implementation's TOML table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(s: &str) -> toml::Value {
		toml::from_str(s).unwrap()
	}

	fn schema() -> Schema {
		Schema::new(
			vec![
				Field::new("url", FieldType::Url),
				Field::new("scheme", FieldType::OneOf(&["ml-dsa-65", "ecdsa"])),
			],
			vec![
				Field::new("seed", FieldType::Hex { bytes: Some(32) }),
				Field::new("owner", FieldType::Address),
				Field::new(
					"timeout",
					FieldType::Integer {
						min: Some(1),
						max: Some(600),
					},
				),
			],
		)
	}

	#[test]
	fn test_valid_table() {
		let config = parse(
			r#"
url = "http://localhost:4337"
scheme = "ml-dsa-65"
seed = "0x000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"
owner = "0x3333333333333333333333333333333333333333"
timeout = 30
"#,
		);
		assert!(schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_required_field() {
		let config = parse(r#"url = "http://localhost:4337""#);
		let err = schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(ref f) if f == "scheme"));
	}

	#[test]
	fn test_wrong_seed_width_is_rejected() {
		let config = parse(
			r#"
url = "http://localhost:4337"
scheme = "ecdsa"
seed = "0x0102"
"#,
		);
		let err = schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("seed"));
		assert!(err.to_string().contains("Expected 32 bytes"));
	}

	#[test]
	fn test_unknown_option_and_bad_url() {
		let config = parse(
			r#"
url = "localhost:4337"
scheme = "ecdsa"
"#,
		);
		assert!(schema().validate(&config).is_err());

		let config = parse(
			r#"
url = "http://localhost:4337"
scheme = "rsa"
"#,
		);
		let err = schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("rsa"));
	}

	#[test]
	fn test_integer_bounds() {
		let config = parse(
			r#"
url = "http://localhost:4337"
scheme = "ecdsa"
timeout = 0
"#,
		);
		let err = schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("less than minimum"));
	}
}
