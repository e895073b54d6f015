//! `safer` command-line tool: generates deployment keys, seals scripts into
//! envelopes, and runs the loader against the filesystem for inspection.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use safer_loader::config::{load_config, LoaderConfig};
use safer_loader::crypto::integrity::sha256_hex;
use safer_loader::crypto::keyfile::KeyFile;
use safer_loader::crypto::keys::{initialize, WordOrder};
use safer_loader::crypto::seal::SealingKeys;
use safer_loader::crypto::unlock::unlock;
use safer_loader::loader::Loader;
use tracing::info;
use tracing_subscriber::EnvFilter;

const PASSPHRASE_VAR: &str = "SAFER_PASSPHRASE";

fn print_usage() {
    eprintln!(
        "Commands:\n  keygen <key-file> <embedded-rs-out>\n  seal <key-file> <input> <output>\n  open <sealed-file>\n  load <module> [config.json]\n  fingerprint\n\nKey files are protected with the passphrase in ${PASSPHRASE_VAR}."
    );
}

fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn passphrase() -> Result<String, String> {
    env::var(PASSPHRASE_VAR).map_err(|e| format!("{PASSPHRASE_VAR}: {e}"))
}

fn keygen(key_path: &str, embedded_path: &str) -> Result<(), String> {
    let keys = SealingKeys::generate();
    KeyFile::create(&keys, &passphrase()?)
        .and_then(|file| file.write(key_path))
        .map_err(|e| format!("key file: {e}"))?;

    let constants = keys.embedded_constants(WordOrder::native());
    fs::write(embedded_path, constants.render()).map_err(|e| format!("{embedded_path}: {e}"))?;

    info!(key_file = key_path, embedded = embedded_path, "generated deployment keys");
    println!("public key sha256: {}", sha256_hex(&keys.public_key()));
    Ok(())
}

fn seal(key_path: &str, input: &str, output: &str) -> Result<(), String> {
    let passphrase = passphrase()?;
    let keys = KeyFile::read(key_path)
        .and_then(|file| file.unseal(&passphrase))
        .map_err(|e| format!("key file: {e}"))?;
    let plaintext = fs::read(input).map_err(|e| format!("{input}: {e}"))?;
    let sealed = keys.seal(&plaintext).map_err(|e| format!("sealing: {e}"))?;
    fs::write(output, &sealed).map_err(|e| format!("{output}: {e}"))?;

    info!(input, output, len = sealed.len(), "sealed script");
    Ok(())
}

fn open(path: &str) -> Result<(), String> {
    let keys = initialize().map_err(|e| format!("key material: {e}"))?;
    let bytes = fs::read(path).map_err(|e| format!("{path}: {e}"))?;
    let plaintext = unlock(keys, &bytes).map_err(|e| format!("{path}: {e}"))?;
    io::stdout()
        .write_all(&plaintext)
        .map_err(|e| format!("stdout: {e}"))
}

fn load(module: &str, config: &LoaderConfig) -> Result<(), String> {
    let keys = initialize().map_err(|e| format!("key material: {e}"))?;
    let loader = Loader::new(keys, config.byte_source(), config.search_path.as_str());
    let chunk = loader
        .load(module)
        .map_err(|e| format!("module '{module}' not found:{e}"))?;

    println!("-- {}", chunk.name);
    io::stdout()
        .write_all(&chunk.source)
        .map_err(|e| format!("stdout: {e}"))
}

fn fingerprint() -> Result<(), String> {
    let keys = initialize().map_err(|e| format!("key material: {e}"))?;
    println!("{}", sha256_hex(&keys.public_key()));
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::FAILURE;
    }

    let config = if args[1] == "load" && args.len() == 4 {
        load_config(&args[3])
    } else {
        LoaderConfig::from_env()
    };
    let config = match config {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("config load failed: {err}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_level.as_deref());

    let result = match (args[1].as_str(), args.len()) {
        ("keygen", 4) => keygen(&args[2], &args[3]),
        ("seal", 5) => seal(&args[2], &args[3], &args[4]),
        ("open", 3) => open(&args[2]),
        ("load", 3) | ("load", 4) => load(&args[2], &config),
        ("fingerprint", 2) => fingerprint(),
        _ => {
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
