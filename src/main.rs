use std::path::PathBuf;

use clap::Parser;
use eyre::{Result, bail};
use log::{debug, info};

mod cli;

use cli::{Cli, Command, OutputFormat};
use ytscribe::client::{ApiClient, Session};
use ytscribe::config::{API_KEY_ENV, Config, ServerSettings};

fn setup_logging(to_stderr: bool) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if to_stderr {
        builder.target(env_logger::Target::Stderr).init();
        return Ok(());
    }

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytscribe.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytscribe")
        .join("logs")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_stderr)?;

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Serve { host, port } => {
            let settings = ServerSettings::resolve(&config, std::env::var(API_KEY_ENV).ok(), host.as_deref(), port)?;
            debug!("Server settings: addr={} timeout={:?}", settings.addr, settings.request_timeout);
            ytscribe::server::serve(settings).await
        }
        Command::Get {
            url,
            lang,
            format,
            no_timestamps,
            output,
            list_languages,
            server,
            verbose,
        } => {
            let client = reqwest::Client::builder().timeout(config.request_timeout() * 2).build()?;
            let server = server.as_deref().unwrap_or(config.server_url());
            let mut session = Session::new(ApiClient::new(client, server)?);

            let state = session.submit(&url).await;
            if let Some(ref error) = state.error {
                bail!("{error}");
            }

            if list_languages {
                if let Some(ref info) = state.video_info {
                    println!("{}", info.available_languages.join("\n"));
                }
                return Ok(());
            }

            if let Some(ref lang) = lang {
                if !ytscribe::is_default_language(lang) {
                    let state = session.change_language(lang).await;
                    if let Some(ref error) = state.error {
                        bail!("{error}");
                    }
                }
            }

            let state = session.state();
            let transcript = state.transcript.as_deref().unwrap_or_default();

            if verbose {
                if let Some(ref info) = state.video_info {
                    eprintln!("{}", ytscribe::output::render_header(info, &state.selected_language));
                }
                eprintln!("Segments: {}", transcript.len());
            }

            let rendered = match format {
                OutputFormat::Text => ytscribe::output::render_text(transcript, !no_timestamps),
                OutputFormat::Json => ytscribe::output::render_json(transcript),
                OutputFormat::Srt => ytscribe::output::render_srt(transcript),
            };

            if let Some(ref path) = output {
                std::fs::write(path, &rendered)?;
                if verbose {
                    eprintln!("Output written to: {}", path.display());
                }
            } else {
                println!("{rendered}");
            }
            Ok(())
        }
    }
}
