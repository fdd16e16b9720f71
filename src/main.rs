use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8Path;
use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use glean::batch::BatchExtractor;
use glean::capture::CaptureSource;
use glean::configuration::{self, Configuration, EngineKind};
use glean::extraction::Extractor;
use glean::image_processing::ocr::{OcrAdapter, OcrsEngine, TesseractEngine};
use glean::report::{ReportWriter, WriteOutcome};
use glean::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

mod cli;

fn build_extractor(configuration: &Configuration) -> Result<Extractor> {
    let adapter = match configuration.engine {
        EngineKind::Tesseract => {
            let engine = TesseractEngine::new(
                configuration.tesseract_path.clone(),
                configuration.language.clone(),
            );
            if engine.probe().is_none() {
                println!("Warning: tesseract could not be started; no text will be recognised.");
            }
            OcrAdapter::new(engine)
        }
        EngineKind::Ocrs => OcrAdapter::new(
            OcrsEngine::new(
                &configuration.detection_model,
                &configuration.recognition_model,
            )
            .wrap_err("failed to load ocrs models")?,
        ),
    };
    Ok(Extractor::new(adapter))
}

fn report_outcome(outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Written { path, entries } => {
            println!("Text data saved to {path}");
            println!("Total files processed: {entries}");
        }
        WriteOutcome::NothingToWrite => println!("No data to save!"),
    }
}

fn run_file(
    path: &Utf8Path,
    extractor: &Extractor,
    writer: &ReportWriter,
    output: &str,
) -> Result<ExitCode> {
    std::fs::File::open(path).map_err(|_| Error::InvalidInput(path.to_owned()))?;

    println!(
        "Processing single image: {}",
        path.file_name().unwrap_or(path.as_str())
    );
    let result = extractor.extract_file(path);
    if result.is_empty() {
        println!("No text extracted from the image.");
        return Ok(ExitCode::SUCCESS);
    }

    report_outcome(&writer.write([result], output)?);
    Ok(ExitCode::SUCCESS)
}

fn run_directory(
    path: &Utf8Path,
    extractor: &Extractor,
    writer: &ReportWriter,
    output: &str,
) -> Result<ExitCode> {
    println!("Processing images in folder: {path}");
    let mut results = BatchExtractor::new(extractor).extract_all(path)?;
    let outcome = writer.write(results.by_ref(), output)?;

    let stats = results.stats();
    println!(
        "Scanned {} images: {} with text, {} without",
        stats.scanned, stats.extracted, stats.empty
    );
    if outcome == WriteOutcome::NothingToWrite {
        println!("No text extracted from any images.");
    }
    report_outcome(&outcome);
    Ok(ExitCode::SUCCESS)
}

async fn run_screenshot(
    cli: &Cli,
    configuration: &Configuration,
    extractor: &Extractor,
    writer: &ReportWriter,
) -> Result<ExitCode> {
    let source = CaptureSource::detect(configuration.capture_directory.clone());
    if !source.is_available() {
        println!("Error: Screenshot mode is not available in this environment.");
        println!("Please use --input to process existing images instead.");
        return Err(Error::CaptureUnsupported.into());
    }

    let delay = Duration::from_secs(configuration.capture_delay_secs);
    println!("Taking screenshot in {} seconds...", delay.as_secs());
    let artifact = tokio::select! {
        artifact = source.capture(delay) => artifact?,
        _ = tokio::signal::ctrl_c() => {
            println!("\nOperation cancelled by user.");
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("Screenshot saved to: {}", artifact.path());

    println!("Extracting text from screenshot...");
    let result = extractor.extract_file(artifact.path());
    if result.is_empty() {
        println!("No text extracted from screenshot.");
        return Ok(ExitCode::FAILURE);
    }

    let characters = result.length();
    report_outcome(&writer.write([result], &cli.output)?);
    info!(characters, "screenshot text saved");

    if cli.keep_capture {
        println!("Screenshot kept at: {}", artifact.path());
    } else {
        let path = artifact.path().to_owned();
        if artifact.discard() {
            println!("Original screenshot deleted: {path}");
        } else {
            println!("Warning: Could not delete screenshot file: {path}");
        }
    }

    println!("Screenshot text extraction completed successfully!");
    Ok(ExitCode::SUCCESS)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut configuration = configuration::load(cli.config.as_deref())?;
    cli.apply(&mut configuration);
    info!(?configuration, "loaded configuration");

    let extractor = build_extractor(&configuration)?;
    let writer = ReportWriter::new(configuration.output_directory.clone());

    if cli.screenshot {
        println!("Screenshot mode activated!");
        return run_screenshot(&cli, &configuration, &extractor, &writer).await;
    }

    let Some(input) = cli.input.as_deref() else {
        return Err(eyre!("please provide --input to process existing images"));
    };

    if input.is_file() {
        run_file(input, &extractor, &writer, &cli.output)
    } else if input.is_dir() {
        run_directory(input, &extractor, &writer, &cli.output)
    } else {
        Err(Error::InvalidInput(input.to_owned()).into())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().compact().with_env_filter(filter).init();

    let cli = Cli::parse();
    println!("Image to Text Extractor");
    println!("{}", "=".repeat(50));
    info!("starting up");

    let code = run(cli).await?;
    Ok(code)
}
