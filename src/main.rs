//! Cloud Textract CLI - extract text from an image or PDF into a JSON file.

use clap::Parser;
use cloud_textract::config::Settings;
use cloud_textract::gcp_auth::GcpCredentials;
use cloud_textract::ocr::vision::VisionClient;
use cloud_textract::staging::GcsStagingStore;
use cloud_textract::{mime, output, ExtractError, ExtractionPath, Extractor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cloud-textract")]
#[command(about = "Extract text from images and PDFs with Google Cloud Vision", long_about = None)]
struct Cli {
    /// Input file in PDF/JPG/PNG format
    #[arg(long)]
    input: PathBuf,

    /// Output, in JSON format
    #[arg(long)]
    output: PathBuf,

    /// GCP bucket for temporary storage (required for PDFs; defaults to $GCP_BUCKET)
    #[arg(long = "gcp-bucket")]
    gcp_bucket: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloud_textract=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match run(&cli, &settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli, settings: &Settings) -> Result<(), ExtractError> {
    let mime_type = mime::guess(&cli.input);
    let bucket = settings.staging_bucket(cli.gcp_bucket.as_deref());

    // Decide before building any client so format/config errors never touch the network.
    let path = ExtractionPath::resolve(&cli.input, mime_type.as_deref(), bucket.as_deref())?;
    info!(
        "Processing {:?} ({}) via {:?}",
        cli.input,
        mime_type.as_deref().unwrap_or_default(),
        path
    );

    let credentials =
        Arc::new(GcpCredentials::from_settings(settings).map_err(ExtractError::Credentials)?);
    let client = reqwest::Client::new();

    let extractor = Extractor::new(
        Arc::new(GcsStagingStore::new(
            client.clone(),
            credentials.clone(),
            settings.storage_endpoint.clone(),
        )),
        Arc::new(VisionClient::new(
            client,
            credentials,
            settings.vision_endpoint.clone(),
        )),
    );

    let result = extractor.run(&cli.input, &path).await?;
    output::write_result(&cli.output, &result)?;

    info!("Text extraction done, results are at {:?}.", cli.output);
    Ok(())
}
