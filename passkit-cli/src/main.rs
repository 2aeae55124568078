//! Developer CLI for PassKit.
//!
//! Works offline on the JSON a platform bridge produced for a passkey
//! ceremony: inspect attestations, derive accounts, verify assertions and
//! keep a local credential record.

use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr as _};
use serde::Serialize;
use tracing::{debug, info};

use passkit_core::verifier::verify_challenge;
use passkit_core::{
    derive_address, verify_signature, Assertion, AttestationResponse, AuthenticatorResponse,
    CredentialStore, PublicKey, SignatureData, StoredCredential,
};

mod store;
use store::FileStore;

/// Inspect passkey responses, derive accounts and verify assertions.
#[derive(Parser, Debug)]
#[command(name = "passkit", version, about, long_about = None)]
struct Cli {
    /// Credential record file. Defaults to `<data dir>/passkit/credential.json`.
    #[arg(long, global = true, env = "PASSKIT_STORE")]
    store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Derive the account address of a public key
    Address {
        /// Hex `x || y` (128 chars) or `04 || x || y` (130 chars), `0x` optional
        public_key: String,
    },

    /// Decode an attestation response and show the derived account
    Inspect {
        /// Response JSON file, `-` for stdin
        response: String,
    },

    /// Decode an attestation response and store it as the local credential
    Register {
        /// Response JSON file, `-` for stdin
        response: String,
    },

    /// Verify an assertion response
    Verify {
        /// Response JSON file, `-` for stdin
        response: String,

        /// Verify against this public key instead of the stored credential
        #[arg(long)]
        public_key: Option<String>,

        /// Also require the assertion to answer this hex challenge
        #[arg(long)]
        challenge: Option<String>,
    },

    /// Split an assertion into on-chain verifier inputs
    SignatureData {
        /// Response JSON file, `-` for stdin
        response: String,
    },

    /// Show the stored credential
    Show,

    /// Delete the stored credential
    Clear,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialReport {
    credential_id: String,
    raw_id_base64: String,
    public_key: String,
    x: String,
    y: String,
    address: String,
}

impl From<&StoredCredential> for CredentialReport {
    fn from(record: &StoredCredential) -> Self {
        let (x, y) = record.public_key.coordinates_hex();
        Self {
            credential_id: record.credential_id.clone(),
            raw_id_base64: record.raw_id_base64(),
            public_key: record.public_key.to_hex(),
            x,
            y,
            address: record.account.to_hex(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignatureReport {
    r: String,
    s: String,
    authenticator_data: String,
    #[serde(rename = "clientDataJSON")]
    client_data_json: String,
    challenge_index: usize,
    type_index: usize,
}

impl From<SignatureData> for SignatureReport {
    fn from(data: SignatureData) -> Self {
        Self {
            r: data.r.to_string(),
            s: data.s.to_string(),
            authenticator_data: format!("0x{}", hex::encode(&data.authenticator_data)),
            client_data_json: data.client_data_json,
            challenge_index: data.challenge_index,
            type_index: data.type_index,
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("passkit=debug,passkit_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("passkit=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli)
}

fn run(cli: Cli) -> eyre::Result<()> {
    match cli.command {
        Commands::Address { public_key } => {
            let public_key = PublicKey::from_hex(&public_key)?;
            let (x, y) = public_key.coordinates_hex();
            print_json(&serde_json::json!({
                "publicKey": public_key.to_hex(),
                "x": x,
                "y": y,
                "address": derive_address(&public_key).to_hex(),
            }))
        }
        Commands::Inspect { response } => {
            let attestation = read_attestation(&response)?;
            let record = StoredCredential::from_attestation(&attestation)?;
            print_json(&CredentialReport::from(&record))
        }
        Commands::Register { response } => {
            let attestation = read_attestation(&response)?;
            let record = StoredCredential::from_attestation(&attestation)?;
            let (path, credentials) = open_store(cli.store)?;
            credentials.save(&record)?;
            info!("stored credential {} in {}", record.credential_id, path.display());
            print_json(&CredentialReport::from(&record))
        }
        Commands::Verify {
            response,
            public_key,
            challenge,
        } => {
            let assertion = read_assertion(&response)?;
            let public_key = match public_key {
                Some(hex) => PublicKey::from_hex(&hex)?,
                None => open_store(cli.store)?
                    .1
                    .public_key_for(&assertion.credential_id)?,
            };
            cmd_verify(&public_key, &assertion, challenge.as_deref())
        }
        Commands::SignatureData { response } => {
            let assertion = read_assertion(&response)?;
            print_json(&SignatureReport::from(SignatureData::from_assertion(
                &assertion,
            )?))
        }
        Commands::Show => {
            let (path, credentials) = open_store(cli.store)?;
            let record = credentials
                .load()?
                .ok_or_else(|| eyre!("no credential stored in {}", path.display()))?;
            print_json(&CredentialReport::from(&record))
        }
        Commands::Clear => {
            let (path, credentials) = open_store(cli.store)?;
            credentials.clear()?;
            info!("cleared credential in {}", path.display());
            Ok(())
        }
    }
}

fn cmd_verify(
    public_key: &PublicKey,
    assertion: &Assertion,
    challenge: Option<&str>,
) -> eyre::Result<()> {
    let signature_valid = verify_signature(public_key, assertion)?;
    let challenge_valid = challenge
        .map(|hex| -> eyre::Result<bool> {
            let expected = passkit_core::encoding::hex_decode(hex, "challenge")?;
            Ok(verify_challenge(assertion, &expected)?)
        })
        .transpose()?;

    print_json(&serde_json::json!({
        "credentialId": assertion.credential_id,
        "signatureValid": signature_valid,
        "challengeValid": challenge_valid,
    }))?;

    if signature_valid && challenge_valid.unwrap_or(true) {
        Ok(())
    } else {
        Err(eyre!("assertion did not verify"))
    }
}

fn open_store(path: Option<PathBuf>) -> eyre::Result<(PathBuf, CredentialStore)> {
    let path = path
        .or_else(FileStore::default_path)
        .ok_or_else(|| eyre!("no data directory; pass --store"))?;
    debug!("using credential store {}", path.display());
    let store = CredentialStore::new(Arc::new(FileStore::new(&path)));
    Ok((path, store))
}

fn read_response(source: &str) -> eyre::Result<AuthenticatorResponse> {
    let blob = if source == "-" {
        let mut blob = String::new();
        std::io::stdin()
            .read_to_string(&mut blob)
            .wrap_err("failed to read stdin")?;
        blob
    } else {
        std::fs::read_to_string(source).wrap_err_with(|| format!("failed to read {source}"))?
    };
    Ok(AuthenticatorResponse::from_json(&blob)?)
}

fn read_attestation(source: &str) -> eyre::Result<AttestationResponse> {
    Ok(read_response(source)?.into_attestation()?)
}

fn read_assertion(source: &str) -> eyre::Result<Assertion> {
    Ok(read_response(source)?.into_assertion()?)
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
