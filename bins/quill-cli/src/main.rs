//! quill-cli — Command-line driver for the Quill wallet core.
//!
//! Generates backup phrases, derives and validates addresses, and builds
//! (optionally signs) transactions from JSON requests. Nothing is persisted
//! and nothing is broadcast.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use quill_core::address::{Address, Network};
use quill_core::crypto::XPrv;
use quill_core::derivation::Chain;
use quill_core::types::{Hash256, TxOutput, UtxoRef};
use quill_wallet::{
    entropy_to_mnemonic, Addressing, Entropy, SelectionStrategy, TransactionBuilder, TxRequest,
    Wallet, WalletConfig, WalletError,
};
use tracing::debug;
use zeroize::Zeroizing;

/// Quill HD wallet command-line interface.
#[derive(Parser)]
#[command(name = "quill-cli")]
#[command(version, about = "Keys, addresses and transactions without a node.")]
struct Cli {
    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that take precedence over `QUILL_*` environment variables.
#[derive(Args)]
struct ConfigOverrides {
    /// Network (mainnet or testnet).
    #[arg(long, global = true)]
    network: Option<String>,

    /// Constant term of the linear fee, in base units.
    #[arg(long, global = true)]
    fee_constant: Option<u64>,

    /// Per-byte fee coefficient, in thousandths of a base unit.
    #[arg(long, global = true)]
    fee_coefficient_milli: Option<u64>,

    /// Maximum fee/change recomputation rounds.
    #[arg(long, global = true)]
    max_fee_iterations: Option<usize>,

    /// Coin selection strategy (first-match or largest-first).
    #[arg(long, global = true)]
    selection: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup phrase subcommands.
    Mnemonic {
        #[command(subcommand)]
        action: MnemonicAction,
    },
    /// Derive addresses for an account.
    Addresses(AddressesArgs),
    /// Check whether an address string is well formed.
    Validate(ValidateArgs),
    /// Build a balanced transaction from a JSON request.
    BuildTx(BuildTxArgs),
    /// Run the fixed wallet and builder scenario and print the results.
    Conformance,
}

#[derive(Subcommand)]
enum MnemonicAction {
    /// Generate a new phrase from OS entropy.
    New(MnemonicNewArgs),
}

#[derive(Args)]
struct MnemonicNewArgs {
    /// Number of words (12, 15, 18, 21 or 24).
    #[arg(short, long, default_value = "24")]
    words: usize,
}

/// Where the wallet secret comes from. Prompted for if neither is given.
#[derive(Args)]
struct SecretArgs {
    /// Hex-encoded entropy (16 to 32 bytes).
    #[arg(long, conflicts_with = "mnemonic")]
    entropy: Option<String>,

    /// BIP-39 English phrase.
    #[arg(long)]
    mnemonic: Option<String>,

    /// Wallet passphrase (default: empty).
    #[arg(long, conflicts_with = "prompt_passphrase")]
    passphrase: Option<String>,

    /// Prompt for the passphrase without echo.
    #[arg(long)]
    prompt_passphrase: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChainArg {
    External,
    Internal,
}

impl From<ChainArg> for Chain {
    fn from(arg: ChainArg) -> Self {
        match arg {
            ChainArg::External => Chain::External,
            ChainArg::Internal => Chain::Internal,
        }
    }
}

#[derive(Args)]
struct AddressesArgs {
    #[command(flatten)]
    secret: SecretArgs,

    /// Account index.
    #[arg(short, long, default_value = "0")]
    account: u32,

    /// Address chain.
    #[arg(short, long, value_enum, default_value = "external")]
    chain: ChainArg,

    /// First address index.
    #[arg(short, long, default_value = "0")]
    start: u32,

    /// Number of addresses.
    #[arg(short = 'n', long, default_value = "1")]
    count: u32,

    /// Print JSON instead of one address per line.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ValidateArgs {
    /// Address to check.
    address: String,
}

#[derive(Args)]
struct BuildTxArgs {
    /// Request file, or `-` for stdin.
    #[arg(short, long, default_value = "-")]
    request: PathBuf,

    /// Spend only the request inputs that coin selection picks.
    #[arg(long)]
    select: bool,

    #[command(flatten)]
    secret: SecretArgs,

    /// Sign with this account after building.
    #[arg(long)]
    sign: bool,

    /// Account index used for signing.
    #[arg(short, long, default_value = "0")]
    account: u32,

    /// Signing key per input as `chain/index` (0 external, 1 internal).
    #[arg(long = "signer", value_parser = parse_addressing)]
    signers: Vec<Addressing>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.overrides)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(network = %config.network, "cli: config loaded");

    match cli.command {
        Commands::Mnemonic { action } => match action {
            MnemonicAction::New(args) => mnemonic_new(args),
        },
        Commands::Addresses(args) => addresses(args, &config),
        Commands::Validate(args) => validate(args),
        Commands::BuildTx(args) => build_tx(args, &config),
        Commands::Conformance => conformance(&config),
    }
}

/// Environment first, then command-line overrides.
fn load_config(overrides: &ConfigOverrides) -> Result<WalletConfig> {
    let mut config = WalletConfig::from_env().context("Invalid QUILL_* environment")?;
    if let Some(name) = &overrides.network {
        config.network = parse_network(name)?;
    }
    if let Some(constant) = overrides.fee_constant {
        config.fee.constant = constant;
    }
    if let Some(coefficient) = overrides.fee_coefficient_milli {
        config.fee.coefficient_milli = coefficient;
    }
    if let Some(iterations) = overrides.max_fee_iterations {
        if iterations == 0 {
            bail!("--max-fee-iterations must be at least 1");
        }
        config.max_fee_iterations = iterations;
    }
    if let Some(name) = &overrides.selection {
        config.selection = SelectionStrategy::from_name(name)
            .with_context(|| format!("Unknown selection strategy {name:?}"))?;
    }
    Ok(config)
}

/// Print a fresh backup phrase.
fn mnemonic_new(args: MnemonicNewArgs) -> Result<()> {
    let entropy = Entropy::generate(args.words).context("Failed to generate entropy")?;
    let phrase = entropy_to_mnemonic(&entropy)?;

    println!("\n=== NEW BACKUP PHRASE ({} WORDS) ===", args.words);
    println!("  {}", phrase.as_str());
    println!("\nAdvanced: hex entropy = {}", hex::encode(entropy.as_bytes()));
    println!("\nWARNING: Anyone with this phrase and passphrase can spend your funds.");
    Ok(())
}

/// Derive and print a run of addresses.
fn addresses(args: AddressesArgs, config: &WalletConfig) -> Result<()> {
    let wallet = open_wallet(&args.secret, config.network)?;
    let account = wallet
        .create_account(format!("account {}", args.account), args.account)
        .context("Failed to derive account")?;

    let derived = account
        .generate_addresses(args.chain.into(), args.start, args.count)?
        .collect::<Result<Vec<_>, WalletError>>()
        .context("Failed to derive addresses")?;

    if args.json {
        let out = serde_json::json!({
            "account": account.public(),
            "addresses": derived,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for d in &derived {
            println!("{}/{}  {}", d.chain, d.index, d.address);
        }
    }
    Ok(())
}

/// Report whether an address decodes; exits non-zero when it does not.
fn validate(args: ValidateArgs) -> Result<()> {
    match Address::decode(&args.address) {
        Ok(address) => {
            println!("valid ({})", address.network());
            Ok(())
        }
        Err(e) => bail!("invalid address: {e}"),
    }
}

/// Build a skeleton from a request, sign it if asked, and print it as JSON.
fn build_tx(args: BuildTxArgs, config: &WalletConfig) -> Result<()> {
    let text = read_request(&args.request)?;
    let request = TxRequest::from_json(&text)?;
    let builder = TransactionBuilder::new().with_max_fee_iterations(config.max_fee_iterations);
    let builder = if args.select {
        request
            .select(builder, &config.fee, config.selection)
            .context("Coin selection failed")?
    } else {
        request.apply(builder)?
    };
    let skeleton = builder
        .finalize(&config.fee)
        .context("Failed to finalize transaction")?;
    let txid = skeleton.txid()?;

    if !args.sign {
        let out = serde_json::json!({ "txid": txid, "skeleton": skeleton });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let wallet = open_wallet(&args.secret, config.network)?;
    let account = wallet.create_account("signer", args.account)?;
    let signed = account
        .sign(&skeleton, &args.signers)
        .context("Failed to sign transaction")?;
    signed.verify().context("Signed transaction failed verification")?;

    let out = serde_json::json!({ "txid": txid, "transaction": signed });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Fixed wallet, address and builder scenario used to compare builds.
fn conformance(config: &WalletConfig) -> Result<()> {
    const ENTROPY: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
    const ROOT_KEY: &str = "d8a7234357dcfc003c99ac410262de9bf2b43c1886939045012d270de6cb2f4360453ef620552718dece81b9b0efcc55a71a5b9a417ccf772fe90ec857c2f0da77794c3cacfc998a9f2ad30f17b6370a9a56695aa35ea702e7abd430d7615637";
    const TXID: &str = "678f01893645b40557166a52637e6a5db048d34f09da6096a7ceb63abfeb5187";

    let wallet = Wallet::create(&ENTROPY, "abc", config.network)?;
    let account = wallet.create_account("Test Wallet", 0)?;
    let address = account
        .generate_addresses(Chain::External, 0, 1)?
        .next()
        .context("Address iterator was empty")??
        .address
        .encode();

    println!("address generated: {address}");
    println!(
        "address is valid: {}",
        if Address::is_valid(&address) { "YES" } else { "NO" }
    );

    let root = XPrv::from_hex(ROOT_KEY).context("Bad root key")?;
    let to = Address::from_xpub(&root.public(), config.network);
    let change = Address::from_xpub(&root.public(), config.network);

    let mut builder = TransactionBuilder::new().with_max_fee_iterations(config.max_fee_iterations);
    builder
        .add_output(TxOutput { address: to, value: 1_000_000 })?
        .add_input(UtxoRef::new(Hash256::from_hex(TXID)?, 0), 600_000)?
        .set_change_address(change);

    match builder.finalize(&config.fee) {
        Ok(skeleton) => println!(
            "transaction finalized: txid {} fee {}",
            skeleton.txid()?,
            skeleton.fee()
        ),
        Err(e) => println!("transaction rejected: {e}"),
    }
    Ok(())
}

/// Build the wallet from the secret flags, prompting when none are given.
fn open_wallet(secret: &SecretArgs, network: Network) -> Result<Wallet> {
    let passphrase = if secret.prompt_passphrase {
        Zeroizing::new(prompt_password("Wallet passphrase")?)
    } else {
        Zeroizing::new(secret.passphrase.clone().unwrap_or_default())
    };

    let input = match (&secret.entropy, &secret.mnemonic) {
        (Some(hex), _) => Zeroizing::new(hex.clone()),
        (None, Some(phrase)) => Zeroizing::new(phrase.clone()),
        (None, None) => Zeroizing::new(prompt_password("Enter mnemonic or hex entropy")?),
    };

    let trimmed = input.trim();
    if trimmed.split_whitespace().count() > 1 {
        Wallet::from_mnemonic(trimmed, &passphrase, network).context("Invalid mnemonic")
    } else {
        let bytes = Zeroizing::new(hex::decode(trimmed).context("Invalid hex entropy")?);
        Wallet::create(&bytes, &passphrase, network).context("Invalid entropy")
    }
}

fn read_request(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read request from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request: {}", path.display()))
    }
}

/// Parse `chain/index`, e.g. `0/3` or `internal/0`.
fn parse_addressing(s: &str) -> Result<Addressing, String> {
    let (chain, index) = s
        .split_once('/')
        .ok_or_else(|| format!("expected chain/index, got {s:?}"))?;
    let chain = match chain {
        "0" | "external" => Chain::External,
        "1" | "internal" => Chain::Internal,
        other => return Err(format!("unknown chain {other:?}")),
    };
    let index = index
        .parse()
        .map_err(|_| format!("invalid address index {index:?}"))?;
    Ok(Addressing::new(chain, index))
}

/// Prompt for a secret without echo.
fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(format!("{}: ", prompt)).context("Failed to read input")
}

/// Parse network string to Network enum.
fn parse_network(s: &str) -> Result<Network> {
    Network::from_name(s).context("Invalid network (must be 'mainnet' or 'testnet')")
}
