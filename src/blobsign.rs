use anyhow::{Context, Result};
use blobsign::{
    sign_blob, sign_blob_with_display, BlobError, BlobRef, BlobServiceClient, Config, DisplayBlob,
    SignedBlob,
};
use clap::{Parser, Subcommand};
use console::style;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "blobsign",
    version = env!("CARGO_PKG_VERSION"),
    about = "Generate one-hour read-only signed URLs for Azure Blob Storage objects",
    long_about = "Looks up a blob, prints its metadata and a Shared Access Signature URL valid for one hour. \
                  The `show` command also renders the metadata for display (title, labels, dates). \
                  Configure via .env file with the storage account URL and key.",
    after_help = "Examples:\n  \
                  blobsign get docs/2024/report.pdf                     # Path form\n  \
                  blobsign get https://acct.blob.core.windows.net/docs/a%20b.pdf\n  \
                  blobsign show report.pdf -c docs -p 2024              # Display form\n  \
                  blobsign show report.pdf -c docs --json               # JSON output\n\n\
                  Configuration (.env):\n  \
                  AZURE_STORAGE_ACCOUNT_URL=https://myaccount.blob.core.windows.net\n  \
                  AZURE_STORAGE_ACCOUNT_KEY=<base64 key>\n  \
                  # or AZURE_STORAGE_CONNECTION_STRING=...\n  \
                  AZURE_STORAGE_TIMEOUT_SECS=30                         # optional\n  \
                  LOG_LEVEL=info"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Read configuration from this dotenv file instead of the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a blob given as <container>/<blob> or as a full blob URL
    Get {
        /// Blob path or URL
        reference: String,
    },

    /// Sign a blob given by name, and render its metadata for display
    Show {
        /// Blob name (without prefix)
        name: String,

        /// Container holding the blob
        #[arg(long, short = 'c')]
        container: String,

        /// Optional prefix ("virtual directory") joined to the name with '/'
        #[arg(long, short = 'p', default_value = "")]
        prefix: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file early to get LOG_LEVEL
    dotenv::dotenv().ok();

    // Initialize tracing/logging with support for LOG_LEVEL from .env
    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.env_file {
        Some(path) => Config::from_env_file(path)?,
        None => Config::from_env()?,
    };
    info!("Blob endpoint: {}", config.account_url);

    match run(&cli, &config).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<BlobError>() {
            Some(blob_error) => {
                eprintln!("{} {}", style("✗").red(), blob_error.user_message());
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}

async fn run(cli: &Cli, config: &Config) -> Result<()> {
    let service =
        BlobServiceClient::with_timeout(&config.account_url, &config.account_key, config.timeout)?;

    match &cli.command {
        Command::Get { reference } => {
            let blob = BlobRef::from_path(reference)?;
            let signed = sign_blob(&service, &blob).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&signed).context("Failed to serialize result")?
                );
            } else {
                print_signed(&blob, &signed);
            }
        }
        Command::Show {
            name,
            container,
            prefix,
        } => {
            let blob = BlobRef::from_parts(prefix, name, container);
            let display = sign_blob_with_display(&service, &blob, name).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&display).context("Failed to serialize result")?
                );
            } else {
                match display {
                    Some(display) => print_display(&display),
                    None => println!(
                        "{} {} {}",
                        style("⚠").yellow(),
                        style(&blob).yellow(),
                        style("(not found)").dim()
                    ),
                }
            }
        }
    }

    Ok(())
}

fn print_signed(blob: &BlobRef, signed: &SignedBlob) {
    println!("{} {}", style("✓").green(), style(blob).green());
    println!("  {} {}", style("🔗").blue(), style(&signed.url).dim());

    let mut details = Vec::new();
    if let Some(content_type) = &signed.content_type {
        details.push(content_type.clone());
    }
    if let Some(length) = signed.content_length {
        details.push(format!("{} bytes", length));
    }
    if let Some(modified) = signed.last_modified {
        details.push(format!("modified {}", modified.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if !details.is_empty() {
        println!("  {}", style(details.join(", ")).dim());
    }
    if let Some(etag) = &signed.etag {
        println!("  {} {}", style("ETag:").cyan(), etag);
    }

    let sorted: BTreeMap<_, _> = signed.metadata.iter().collect();
    print_fields(sorted.into_iter());
}

fn print_display(display: &DisplayBlob) {
    println!("{} {}", style("✓").green(), style(&display.title).green().bold());
    println!("  {} {}", style("🔗").blue(), style(&display.url).dim());
    print_fields(display.metadata.iter());
}

fn print_fields<'a>(fields: impl Iterator<Item = (&'a String, &'a String)>) {
    for (key, value) in fields {
        println!("  {} {}", style(format!("{}:", key)).cyan(), value);
    }
}
