//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable module (signer backends, relays) provides a `Registry` struct
/// implementing this trait, declaring the name used in configuration and the
/// factory that builds the implementation from its TOML table.
pub trait ImplementationRegistry {
	/// Key under `<section>.implementations` in the configuration, e.g. "seed"
	/// for `signer.implementations.seed`.
	const NAME: &'static str;

	/// Factory function type, defined by each module.
	type Factory;

	/// Returns the factory for this implementation.
	fn factory() -> Self::Factory;
}
