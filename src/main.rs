use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use vidgrab::cli::{self, Cli, TerminalRenderer};
use vidgrab::downloader::models::{DownloadOptions, FormatOption};
use vidgrab::{logging, AppConfig, Downloader, FormatSelector, HttpBackend};

type Input = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.apply_env();
    cli.apply(&mut config);
    debug!(?config, "Configuration resolved");

    let backend = HttpBackend::new(&config.backend_url, &config.network)
        .context("Failed to set up the backend client")?;
    let downloader = Downloader::new(
        Box::new(backend),
        Box::new(TerminalRenderer::stdout()),
        DownloadOptions {
            output_dir: config.output_dir.clone(),
        },
    );
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let url = match cli.url {
        Some(url) => url,
        None => prompt(&mut input, "Media URL: ").await?.unwrap_or_default(),
    };

    // Errors are already on screen through the renderer.
    let result = match downloader.fetch_info(&url).await {
        Ok(Some(result)) => result,
        Ok(None) => return Ok(ExitCode::SUCCESS),
        Err(_) => return Ok(ExitCode::FAILURE),
    };
    if cli.info {
        return Ok(ExitCode::SUCCESS);
    }

    let format_id = match cli.format.as_deref() {
        Some(wanted) => FormatSelector::find(&result.formats, wanted)
            .map_or_else(|| wanted.to_string(), |option| option.format_id.clone()),
        None => match choose_format(&mut input, &result.formats).await? {
            Some(format_id) => format_id,
            None => return Ok(ExitCode::SUCCESS),
        },
    };

    match downloader.download(&format_id).await {
        Ok(Some(saved)) => {
            println!("{}", cli::saved_message(&saved));
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => Ok(ExitCode::SUCCESS),
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

async fn prompt(input: &mut Input, message: &str) -> anyhow::Result<Option<String>> {
    print!("{}", message);
    std::io::stdout().flush()?;
    input.next_line().await.context("Failed to read from stdin")
}

/// Ask until the user picks a listed format; None on empty input or EOF
async fn choose_format(input: &mut Input, formats: &[FormatOption]) -> anyhow::Result<Option<String>> {
    let message = format!("Select format [1-{}] (Enter to quit): ", formats.len());
    loop {
        let line = match prompt(input, &message).await? {
            Some(line) if !line.trim().is_empty() => line,
            _ => return Ok(None),
        };
        match cli::parse_choice(&line, formats) {
            Some(option) => return Ok(Some(option.format_id.clone())),
            None => println!("Invalid choice: {}", line.trim()),
        }
    }
}
