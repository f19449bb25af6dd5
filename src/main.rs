use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use qrlink::config::{self, Config};
use qrlink::ops;

/// Move files and spreadsheet regions through QR barcodes.
#[derive(Parser, Debug)]
#[command(name = "qrlink", version, about)]
struct Cli {
    /// JSON config file; defaults to $QRLINK_CONFIG, then built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured output directory
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seal any file into a new session
    SerializeFile { path: PathBuf },
    /// Seal a cell range of an xlsx workbook into a new session
    SerializeExcel {
        path: PathBuf,
        /// e.g. "A1:C10"
        #[arg(long)]
        region: String,
        /// Defaults to the active sheet
        #[arg(long)]
        sheet: Option<String>,
    },
    /// List the sheets of an xlsx workbook
    Sheets { path: PathBuf },
    /// Render a session as PNG barcodes
    Generate {
        session_id: String,
        /// Symbol capacity in characters
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Restore from barcode images
    ScanImages {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Restore from a video recording of barcodes
    ScanVideo { path: PathBuf },
    /// Restore from decoded texts joined with ';'
    RestoreText {
        text: Option<String>,
        /// Read the texts from a file instead
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
}

fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log::LevelFilter::Info)
        .filter_module("qrlink", log::LevelFilter::Info)
        .filter_module("ffmpeg_next", log::LevelFilter::Warn)
        .filter_module("ffmpeg_bus", log::LevelFilter::Info);
    // RUST_LOG is parsed last so it wins
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .map_err(|e| anyhow::anyhow!("config {}: {}", path.display(), e))?,
        None => config::config().clone(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook.xlsx".to_string())
}

async fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
    let config = load_config(&cli)?;

    let value = match cli.command {
        Command::SerializeFile { path } => {
            let bytes = std::fs::read(&path)?;
            let session = ops::serialize_file(&config, &bytes)?;
            json!({ "success": true, "session": session })
        }
        Command::SerializeExcel {
            path,
            region,
            sheet,
        } => {
            let bytes = std::fs::read(&path)?;
            let session = ops::serialize_excel(
                &config,
                &bytes,
                &region,
                sheet.as_deref(),
                Some(file_name(&path).as_str()),
            )?;
            json!({ "success": true, "session": session })
        }
        Command::Sheets { path } => {
            let sheets = ops::list_sheets(&std::fs::read(&path)?)?;
            json!({ "success": true, "sheets": sheets })
        }
        Command::Generate {
            session_id,
            chunk_size,
        } => {
            let images = ops::generate_barcodes(&config, &session_id, chunk_size)?;
            json!({
                "success": true,
                "session_id": session_id,
                "count": images.len(),
                "images": images,
            })
        }
        Command::ScanImages { images } => {
            let restored = ops::scan_restore(&config, &images)?;
            json!({ "success": true, "restored": restored })
        }
        Command::ScanVideo { path } => {
            let cancel = CancellationToken::new();
            let scan = ops::scan_video(&config, &path, cancel.clone());
            tokio::pin!(scan);
            let restored = loop {
                tokio::select! {
                    result = &mut scan => break result?,
                    _ = tokio::signal::ctrl_c() => {
                        log::warn!("interrupt received, stopping the scan");
                        cancel.cancel();
                    },
                }
            };
            json!({ "success": true, "restored": restored })
        }
        Command::RestoreText { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => std::fs::read_to_string(&file)?,
                (None, None) => anyhow::bail!("pass the texts or --file"),
            };
            let restored = ops::restore_from_text(&config, &text)?;
            json!({ "success": true, "restored": restored })
        }
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{:#}", e);
            let value = json!({ "success": false, "error": e.to_string() });
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}
