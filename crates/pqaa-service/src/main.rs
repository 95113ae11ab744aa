//! Command-line entry point for the post-quantum operation relay.
//!
//! Offline tools (key generation, hashing, signing, verification) work from
//! files and the configuration alone. `send` builds the full pipeline, runs a
//! single request through the session engine and prints the outcome.

use alloy_primitives::{Address, Bytes, U256};
use clap::{Args as ClapArgs, Parser, Subcommand};
use pqaa_config::Config;
use pqaa_core::{PipelineBuilder, PipelineFactories, SessionEngine};
use pqaa_signer::implementations::seed::SeedScheme;
use pqaa_signer::SignerService;
use pqaa_types::{decode_hex, HexError, Intent, SecretHex, SessionRequest, UserDecision};
use serde_json::json;
use std::path::PathBuf;
use tokio::sync::mpsc;

mod commands;

use pqaa_relay::implementations::bundler::create_bundler_relay;
use pqaa_signer::implementations::remote::create_remote_signer;
use pqaa_signer::implementations::seed::create_seed_signer;

/// Command-line arguments for the relay tools.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

/// Call requested by the user.
#[derive(ClapArgs, Debug, Clone)]
struct IntentArgs {
	/// Call target
	#[arg(long)]
	to: Address,

	/// Native value in wei (decimal or 0x-hex)
	#[arg(long, default_value = "0")]
	value: U256,

	/// Call data as 0x-hex
	#[arg(long, default_value = "0x", value_parser = parse_data)]
	data: Bytes,
}

fn parse_data(s: &str) -> Result<Bytes, HexError> {
	decode_hex(s).map(Bytes::from)
}

impl From<IntentArgs> for Intent {
	fn from(args: IntentArgs) -> Self {
		Intent {
			destination: args.to,
			value: args.value,
			data: args.data,
		}
	}
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Generate a seed and write sk.bin and pk.bin to a directory
	Keygen {
		#[arg(long, default_value = "ml-dsa-65")]
		scheme: SeedScheme,
		#[arg(long)]
		output: PathBuf,
	},
	/// Print the operation hash and relay shape for an intent
	Hash {
		#[command(flatten)]
		intent: IntentArgs,
		#[arg(long, default_value = "ml-dsa-65")]
		scheme: SeedScheme,
		/// Sequence number placed in the low 64 bits of the nonce
		#[arg(long, default_value_t = 0)]
		sequence: u64,
	},
	/// Sign a 32-byte hash with a seed file
	Sign {
		#[arg(long, default_value = "ml-dsa-65")]
		scheme: SeedScheme,
		#[arg(long)]
		key: PathBuf,
		#[arg(long)]
		hash: String,
		#[arg(long)]
		output: PathBuf,
	},
	/// Verify a signature file against a public key file
	Verify {
		#[arg(long, default_value = "ml-dsa-65")]
		scheme: SeedScheme,
		#[arg(long)]
		key: PathBuf,
		#[arg(long)]
		hash: String,
		#[arg(long)]
		sig: PathBuf,
	},
	/// Show the configured signer
	SignerInfo,
	/// Build, sign and relay one operation
	Send {
		#[command(flatten)]
		intent: IntentArgs,
		/// Answer the request with a decline instead of an approval
		#[arg(long)]
		decline: bool,
		/// Load this 32-byte seed into the active signer before sending
		#[arg(long)]
		seed_file: Option<PathBuf>,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	match args.command {
		Command::Keygen { scheme, output } => {
			let files = commands::keygen(scheme, &output).await?;
			println!("Seed written to {}", files.seed.display());
			println!(
				"Public key ({} bytes) written to {}",
				files.public_key_len,
				files.public_key.display()
			);
		},
		Command::Hash {
			intent,
			scheme,
			sequence,
		} => {
			let config = load_config(&args.config).await?;
			let hashed = commands::hash(&config, &intent.into(), scheme, sequence).await?;
			println!(
				"{}",
				serde_json::to_string_pretty(&commands::hashed_to_json(&hashed))?
			);
		},
		Command::Sign {
			scheme,
			key,
			hash,
			output,
		} => {
			let len = commands::sign(scheme, &key, &hash, &output).await?;
			println!("Signature ({} bytes) written to {}", len, output.display());
		},
		Command::Verify {
			scheme,
			key,
			hash,
			sig,
		} => {
			commands::verify(scheme, &key, &hash, &sig)?;
			println!("Valid");
		},
		Command::SignerInfo => {
			let config = load_config(&args.config).await?;
			let signer = PipelineBuilder::new(config).build_signer(&signer_factories())?;
			signer.connect().await?;
			let backend = signer.active().await?;
			let info = signer.info().await?;
			let output = json!({
				"name": signer.active_name().await,
				"kind": backend.kind().to_string(),
				"ready": backend.is_ready().await,
				"info": info,
			});
			println!("{}", serde_json::to_string_pretty(&output)?);
		},
		Command::Send {
			intent,
			decline,
			seed_file,
		} => {
			let config = load_config(&args.config).await?;
			let engine = build_engine(config)?;
			if let Some(path) = seed_file {
				load_seed_file(engine.lifecycle().signer(), &path).await?;
			}
			engine.initialize().await?;

			let request = SessionRequest {
				request_id: 1,
				intent: intent.into(),
				decision: if decline {
					UserDecision::Declined
				} else {
					UserDecision::Approved
				},
			};
			let outcome = run_once(&engine, request).await?;
			println!("{}", serde_json::to_string_pretty(&outcome)?);
			if let Err(rejection) = outcome.result {
				return Err(rejection.message.into());
			}
		},
	}

	Ok(())
}

async fn load_config(path: &std::path::Path) -> Result<Config, Box<dyn std::error::Error>> {
	let config = Config::from_file(&path.to_string_lossy()).await?;
	tracing::info!(
		chain_id = config.network.chain_id,
		account = %config.account.address,
		"Loaded configuration"
	);
	Ok(config)
}

/// Loads a seed file into the active signer backend.
async fn load_seed_file(
	signer: &SignerService,
	path: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
	let seed = commands::read_seed(path)?;
	let name = signer.active_name().await;
	signer
		.configure(&name, &SecretHex::from(seed.as_str()))
		.await?;
	tracing::info!(signer = %name, "Loaded seed file");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

fn signer_factories() -> std::collections::HashMap<String, pqaa_signer::SignerFactory> {
	create_factory_map!(
		pqaa_signer::SignerInterface,
		pqaa_signer::SignerError,
		"seed" => create_seed_signer,
		"remote" => create_remote_signer,
	)
}

/// Builds the session engine with every available implementation.
fn build_engine(config: Config) -> Result<SessionEngine, Box<dyn std::error::Error>> {
	let relay_factories = create_factory_map!(
		pqaa_relay::RelayInterface,
		pqaa_relay::RelayError,
		"bundler" => create_bundler_relay,
	);

	let factories = PipelineFactories {
		signer_factories: signer_factories(),
		relay_factories,
	};
	Ok(PipelineBuilder::new(config).build(factories)?)
}

/// Pushes one request through the engine and waits for its outcome.
async fn run_once(
	engine: &SessionEngine,
	request: SessionRequest,
) -> Result<pqaa_types::SessionOutcome, Box<dyn std::error::Error>> {
	let (request_tx, request_rx) = mpsc::channel(1);
	let (outcome_tx, mut outcome_rx) = mpsc::channel(1);

	let worker = engine.clone();
	let handle = tokio::spawn(async move { worker.run(request_rx, outcome_tx).await });

	request_tx.send(request).await?;
	drop(request_tx);

	let outcome = outcome_rx
		.recv()
		.await
		.ok_or("Session engine stopped without an outcome")?;
	handle.await?;
	Ok(outcome)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parses_global_options() {
		let args = Args::try_parse_from(["pqaa", "-c", "dev.toml", "-l", "debug", "signer-info"])
			.unwrap();
		assert_eq!(args.config, PathBuf::from("dev.toml"));
		assert_eq!(args.log_level, "debug");
		assert!(matches!(args.command, Command::SignerInfo));
	}

	#[test]
	fn test_parses_intent() {
		let args = Args::try_parse_from([
			"pqaa",
			"hash",
			"--to",
			"0x1111111111111111111111111111111111111111",
			"--value",
			"1000000000000000",
			"--scheme",
			"ecdsa",
		])
		.unwrap();
		assert_eq!(args.config, PathBuf::from("config.toml"));

		let Command::Hash {
			intent,
			scheme,
			sequence,
		} = args.command
		else {
			panic!("expected hash command");
		};
		assert_eq!(scheme, SeedScheme::Ecdsa);
		assert_eq!(sequence, 0);

		let intent = Intent::from(intent);
		assert_eq!(intent.value, U256::from(1_000_000_000_000_000u64));
		assert!(intent.data.is_empty());
	}

	#[test]
	fn test_rejects_unknown_scheme() {
		let result = Args::try_parse_from([
			"pqaa", "keygen", "--scheme", "rsa", "--output", "keys",
		]);
		assert!(result.is_err());
	}

	#[test]
	fn test_send_decline_flag() {
		let args = Args::try_parse_from([
			"pqaa",
			"send",
			"--to",
			"0x1111111111111111111111111111111111111111",
			"--data",
			"0xdeadbeef",
			"--decline",
		])
		.unwrap();
		let Command::Send {
			intent,
			decline,
			seed_file,
		} = args.command
		else {
			panic!("expected send command");
		};
		assert!(decline);
		assert!(seed_file.is_none());
		assert_eq!(intent.data.to_vec(), vec![0xde, 0xad, 0xbe, 0xef]);
	}

	#[test]
	fn test_data_is_decoded_as_hex() {
		let parse = |data: &str| {
			Args::try_parse_from([
				"pqaa",
				"send",
				"--to",
				"0x1111111111111111111111111111111111111111",
				"--data",
				data,
			])
		};

		let Command::Send { intent, .. } = parse("0xa9059cbb").unwrap().command else {
			panic!("expected send command");
		};
		assert_eq!(intent.data.len(), 4);
		assert_eq!(intent.data[0], 0xa9);

		assert!(parse("0x123").is_err());
		assert!(parse("0xzz").is_err());
		assert!(parse("transfer").is_err());
	}

	#[tokio::test]
	async fn test_seed_file_configures_active_backend() {
		use pqaa_signer::implementations::seed::SeedSigner;
		use std::sync::Arc;

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("sk.bin");
		std::fs::write(&path, (0u8..32).collect::<Vec<_>>()).unwrap();

		let signer = SignerService::single("seed", Arc::new(SeedSigner::new(SeedScheme::Ecdsa)));
		assert!(!signer.active().await.unwrap().is_ready().await);

		load_seed_file(&signer, &path).await.unwrap();
		assert!(signer.active().await.unwrap().is_ready().await);

		std::fs::write(&path, [7u8; 16]).unwrap();
		assert!(load_seed_file(&signer, &path).await.is_err());
	}

	#[test]
	fn test_factory_maps_cover_registered_implementations() {
		let names: Vec<_> = pqaa_signer::get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		let factories = signer_factories();
		for name in names {
			assert!(factories.contains_key(name));
		}
	}
}
