//! pcdt: packd archive tool
//!
//! Commands:
//!   pack -i <dir> [-o <file>] [-e]     - pack a directory into a .pakd archive
//!   unpack -f <file> -d <dir>          - extract an archive
//!   list -f <file>                     - show archive entries
//!   verify -f <file>                   - decode every entry without writing
//!   keygen -o <prefix>                 - write an RSA key pair as PEM files
//!   config show                        - display the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use packd_archive::{
    Identity, PackOptions, ReadOptions, Recipient, UnpackOptions, WalkOptions,
};
use packd_core::config::{expand_tilde, PackdConfig};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "pcdt",
    version,
    about = "packd archive tool",
    long_about = "pcdt: pack directory trees into single-file zstd archives, optionally sealed for an RSA recipient"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "PACKD_CONFIG",
        default_value = "~/.config/packd/config.toml",
        global = true
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log].level
    #[arg(long, env = "PACKD_LOG", global = true)]
    log: Option<String>,

    /// Log format; overrides [log].format
    #[arg(long, env = "PACKD_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack a directory into a .pakd archive
    Pack {
        /// Directory to pack
        #[arg(long, short = 'i')]
        input: PathBuf,
        /// Output file (default: <input name>.pakd in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Seal the archive for the recipient public key
        #[arg(long, short = 'e')]
        encrypt: bool,
        /// Recipient public key PEM (overrides [keys].public_key)
        #[arg(long)]
        public_key: Option<PathBuf>,
        /// zstd level 1-22 (overrides [archive].compression_level)
        #[arg(long)]
        level: Option<i32>,
        /// Compression threads, 0 = one per cpu (overrides [archive].workers)
        #[arg(long)]
        workers: Option<usize>,
        /// Glob matched against file and directory names; repeatable
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Extract an archive into a directory
    Unpack {
        /// Archive to extract
        #[arg(long, short = 'f')]
        file: PathBuf,
        /// Destination directory (created if missing)
        #[arg(long, short = 'd')]
        dest: PathBuf,
        /// Private key PEM for sealed archives (overrides [keys].private_key)
        #[arg(long)]
        private_key: Option<PathBuf>,
    },

    /// List archive entries
    List {
        #[arg(long, short = 'f')]
        file: PathBuf,
        #[arg(long)]
        private_key: Option<PathBuf>,
        /// Show sizes and BLAKE3 digests
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode (and open) an archive without writing anything
    Verify {
        #[arg(long, short = 'f')]
        file: PathBuf,
        #[arg(long)]
        private_key: Option<PathBuf>,
    },

    /// Generate an RSA key pair: <prefix>.pub.pem and <prefix>.pem
    Keygen {
        /// Output path prefix
        #[arg(long, short = 'o')]
        out: PathBuf,
        /// Modulus size in bits
        #[arg(long, default_value_t = 3072)]
        bits: usize,
        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = PackdConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Pack {
            input,
            output,
            encrypt,
            public_key,
            level,
            workers,
            exclude,
        } => cmd_pack(
            &config,
            &input,
            output.as_deref(),
            encrypt,
            public_key.as_deref(),
            level,
            workers,
            exclude,
        ),
        Commands::Unpack {
            file,
            dest,
            private_key,
        } => cmd_unpack(&config, &file, &dest, private_key.as_deref()),
        Commands::List {
            file,
            private_key,
            verbose,
            json,
        } => cmd_list(&config, &file, private_key.as_deref(), verbose, json),
        Commands::Verify { file, private_key } => {
            cmd_verify(&config, &file, private_key.as_deref())
        }
        Commands::Keygen { out, bits, force } => cmd_keygen(&out, bits, force),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

/// Logs go to stderr so `list --json` output stays machine-readable.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Key resolution ────────────────────────────────────────────────────────────

/// CLI flag > config > none
fn resolve_key_path(flag: Option<&Path>, configured: Option<&PathBuf>) -> Option<PathBuf> {
    flag.map(Path::to_path_buf)
        .or_else(|| configured.map(|p| expand_tilde(p)))
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `pcdt pack` ───────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn cmd_pack(
    config: &PackdConfig,
    input: &Path,
    output: Option<&Path>,
    encrypt: bool,
    public_key: Option<&Path>,
    level: Option<i32>,
    workers: Option<usize>,
    exclude: Vec<String>,
) -> Result<()> {
    if !input.is_dir() {
        anyhow::bail!("input directory not found: {}", input.display());
    }

    let output = match output {
        Some(p) => p.to_path_buf(),
        None => default_output_path(input)?,
    };

    let recipient = resolve_key_path(public_key, config.keys.public_key.as_ref());
    if encrypt && recipient.is_none() {
        anyhow::bail!("--encrypt needs a public key: pass --public-key or set keys.public_key");
    }

    let mut exclude_patterns = config.archive.exclude_patterns.clone();
    exclude_patterns.extend(exclude);

    let archive_config = packd_core::config::ArchiveConfig {
        compression_level: level.unwrap_or(config.archive.compression_level),
        ..config.archive.clone()
    };

    let options = PackOptions {
        compression_level: archive_config.level(),
        workers: workers.unwrap_or(config.archive.workers),
        walk: WalkOptions { exclude_patterns },
        encrypt,
        recipient: recipient.map(Recipient::Pem),
        ..PackOptions::new(input, &output)
    };

    let pb = make_spinner("pack");
    pb.set_message(format!("{} → {}", input.display(), output.display()));
    let result = packd_archive::pack(&options);
    pb.finish_and_clear();

    let summary = result.with_context(|| format!("packing {}", input.display()))?;

    println!("Packed {} → {}", input.display(), output.display());
    println!("  entries:    {}", summary.entries);
    println!("  raw size:   {}", fmt_bytes(summary.raw_bytes));
    println!(
        "  archive:    {} ({})",
        fmt_bytes(summary.archive_bytes),
        fmt_ratio(summary.archive_bytes, summary.raw_bytes)
    );
    println!(
        "  encrypted:  {}",
        if summary.encrypted { "yes" } else { "no" }
    );
    Ok(())
}

/// `./<input dir name>.pakd`
fn default_output_path(input: &Path) -> Result<PathBuf> {
    let absolute = std::fs::canonicalize(input)
        .with_context(|| format!("resolving input path: {}", input.display()))?;
    let name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    Ok(PathBuf::from(format!("{name}.pakd")))
}

// ── `pcdt unpack` ─────────────────────────────────────────────────────────────

fn cmd_unpack(
    config: &PackdConfig,
    file: &Path,
    dest: &Path,
    private_key: Option<&Path>,
) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("archive not found: {}", file.display());
    }

    let identity = resolve_key_path(private_key, config.keys.private_key.as_ref());
    let options = UnpackOptions {
        identity: identity.map(Identity::Pem),
        max_entry_size: config.archive.entry_limit(),
        ..UnpackOptions::new(file, dest)
    };

    let pb = make_spinner("unpack");
    pb.set_message(format!("{} → {}", file.display(), dest.display()));
    let result = packd_archive::unpack(&options);
    pb.finish_and_clear();

    let summary = result.with_context(|| format!("unpacking {}", file.display()))?;
    println!("Unpacked {} → {}", file.display(), dest.display());
    println!("  entries: {}", summary.entries);
    println!("  written: {}", fmt_bytes(summary.bytes_written));
    Ok(())
}

// ── `pcdt list` ───────────────────────────────────────────────────────────────

fn cmd_list(
    config: &PackdConfig,
    file: &Path,
    private_key: Option<&Path>,
    verbose: bool,
    json: bool,
) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("archive not found: {}", file.display());
    }

    let entries = packd_archive::list(file, &read_options(config, private_key))
        .with_context(|| format!("reading {}", file.display()))?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&entries).context("serializing entries to JSON")?;
        println!("{rendered}");
        return Ok(());
    }

    if verbose {
        println!(
            "{:>10}  {:>10}  {:<16}  PATH",
            "SIZE", "PACKED", "BLAKE3"
        );
        for entry in &entries {
            println!(
                "{:>10}  {:>10}  {:<16}  {}",
                fmt_bytes(entry.raw_size),
                fmt_bytes(entry.compressed_size),
                entry.blake3.get(..16).unwrap_or(&entry.blake3),
                entry.path
            );
        }
        let raw: u64 = entries.iter().map(|e| e.raw_size).sum();
        let packed: u64 = entries.iter().map(|e| e.compressed_size).sum();
        println!();
        println!(
            "{} entries, {} → {} ({})",
            entries.len(),
            fmt_bytes(raw),
            fmt_bytes(packed),
            fmt_ratio(packed, raw)
        );
    } else {
        for entry in &entries {
            println!("{}", entry.path);
        }
    }
    Ok(())
}

// ── `pcdt verify` ─────────────────────────────────────────────────────────────

fn cmd_verify(config: &PackdConfig, file: &Path, private_key: Option<&Path>) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("archive not found: {}", file.display());
    }

    let entries = packd_archive::verify(file, &read_options(config, private_key))
        .with_context(|| format!("verifying {}", file.display()))?;
    println!("OK: {} ({} entries)", file.display(), entries);
    Ok(())
}

fn read_options(config: &PackdConfig, private_key: Option<&Path>) -> ReadOptions {
    ReadOptions {
        identity: resolve_key_path(private_key, config.keys.private_key.as_ref())
            .map(Identity::Pem),
        max_entry_size: config.archive.entry_limit(),
    }
}

// ── `pcdt keygen` ─────────────────────────────────────────────────────────────

fn cmd_keygen(prefix: &Path, bits: usize, force: bool) -> Result<()> {
    let (private_path, public_path) = key_pair_paths(prefix);
    if !force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                anyhow::bail!(
                    "refusing to overwrite {} (use --force)",
                    path.display()
                );
            }
        }
    }

    let pb = make_spinner("keygen");
    pb.set_message(format!("generating {bits}-bit RSA key"));
    let result = packd_crypto::generate_key_pair(bits);
    pb.finish_and_clear();
    let (private, _public) = result.context("generating key pair")?;

    packd_crypto::write_key_pair(&private, &private_path, &public_path)
        .context("writing key pair")?;
    info!(
        bits,
        public = %public_path.display(),
        private = %private_path.display(),
        "key pair written"
    );

    println!("Public key:  {}", public_path.display());
    println!("Private key: {} (keep this secret)", private_path.display());
    Ok(())
}

/// `<prefix>` → (`<prefix>.pem`, `<prefix>.pub.pem`)
fn key_pair_paths(prefix: &Path) -> (PathBuf, PathBuf) {
    let base = prefix.as_os_str().to_string_lossy();
    (
        PathBuf::from(format!("{base}.pem")),
        PathBuf::from(format!("{base}.pub.pem")),
    )
}

// ── `pcdt config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &PackdConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Formatting ────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Packed size as a percentage of raw size.
fn fmt_ratio(packed: u64, raw: u64) -> String {
    if raw == 0 {
        return "n/a".to_string();
    }
    format!("{:.1}%", packed as f64 * 100.0 / raw as f64)
}
