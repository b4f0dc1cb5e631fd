use clap::{Parser, Subcommand};
use ocf::codec::DEFAULT_COMPRESSION_LEVEL;
use ocf::datafile::DataFile;
use ocf::io_stream::{ReaderOptions, WriterOptions};
use ocf::recovery;
use ocf::Schema;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ocf", about = "Object container file inspection and conversion")]
struct Cli {
    /// JSON file with reader options (datum and resolution settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header metadata
    Info {
        input: PathBuf,
    },
    /// Print every record as one JSON line
    Cat {
        input: PathBuf,
        /// Schema JSON file to read the records through
        #[arg(short, long)]
        reader_schema: Option<PathBuf>,
    },
    /// Count records
    Count {
        input: PathBuf,
    },
    /// Rewrite a file with another codec
    Recodec {
        input:  PathBuf,
        output: PathBuf,
        /// Codec: null, zstandard, xz, lz4, brotli
        #[arg(short, long, default_value = "null")]
        codec: String,
        /// Compression level (zstandard 1-19; brotli 0-11; ignored otherwise)
        #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
        level: i32,
    },
    /// Check every block and report damage
    Scan {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let options = load_options(cli.config.as_deref())?;

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let df = DataFile::open_with(&input, None, options)?;
            let header = df.header();
            println!("── Object container ─────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Codec          {}", df.codec_name());
            println!("  Sync marker    {}", df.sync_hex());
            println!("  Fingerprint    {}", hex::encode(df.schema().fingerprint()));
            println!("  Schema         {}", df.schema().to_json_string());
            let user = header.user_metadata();
            println!("  Metadata ({}):", user.len());
            for (k, v) in &user {
                match std::str::from_utf8(v) {
                    Ok(text) => println!("    {k} = {text}"),
                    Err(_)   => println!("    {k} = 0x{}", hex::encode(v)),
                }
            }
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { input, reader_schema } => {
            let reader = reader_schema.as_deref().map(load_schema).transpose()?;
            let mut df = DataFile::open_with(&input, reader, options)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            while let Some(value) = df.next_record()? {
                serde_json::to_writer(&mut out, &value.to_json())?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
        }

        // ── Count ────────────────────────────────────────────────────────────
        Commands::Count { input } => {
            let mut df = DataFile::open_with(&input, None, options)?;
            let mut n = 0u64;
            while df.next_record()?.is_some() {
                n += 1;
            }
            println!("{n}");
        }

        // ── Recodec ──────────────────────────────────────────────────────────
        Commands::Recodec { input, output, codec, level } => {
            let mut src = DataFile::open_with(&input, None, options)?;
            let wopts = WriterOptions {
                codec,
                compression_level: level,
                metadata: src.header().user_metadata(),
                ..WriterOptions::default()
            };
            let mut dst = DataFile::create(&output, Arc::clone(src.schema()), wopts)?;
            let mut n = 0u64;
            while let Some(value) = src.next_record()? {
                dst.append(&value)?;
                n += 1;
            }
            let codec = dst.codec_name().to_string();
            dst.close()?;
            println!("Recoded {n} record(s) → {} ({codec})", output.display());
        }

        // ── Scan ─────────────────────────────────────────────────────────────
        Commands::Scan { input } => {
            let report = recovery::scan_file(&input)?;
            println!("{}", report.summary());
            for b in &report.blocks {
                let records = b.records.map_or_else(|| "?".to_string(), |n| n.to_string());
                let size = b.payload_size.map_or_else(|| "?".to_string(), |n| n.to_string());
                println!("  @{:<10} records={:<8} payload={:<10} {:?}", b.offset, records, size, b.health);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn load_options(path: Option<&Path>) -> Result<ReaderOptions, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(p) => serde_json::from_slice(&std::fs::read(p)?)?,
        None    => ReaderOptions::default(),
    })
}

fn load_schema(path: &Path) -> Result<Arc<Schema>, Box<dyn std::error::Error>> {
    Ok(Arc::new(Schema::parse(&std::fs::read_to_string(path)?)?))
}
