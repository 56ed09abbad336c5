use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mirror_bot::transform::{reverse_words, split_words};
use mirror_bot::voice::{AudioPipeline, Language, PollyClient, SpeechSynthesizer};
use mirror_bot::{Config, Daemon};

/// Mirror - Telegram bot that reverses every word and speaks the result
#[derive(Parser)]
#[command(name = "mirror", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the reversed text
    Reverse {
        /// Text to reverse
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Render the reversed text to an MP3 file through Polly
    Speak {
        /// Text to reverse and speak
        #[arg(required = true)]
        text: Vec<String>,
        /// Voice language (ru or en)
        #[arg(short, long, default_value = "en")]
        lang: String,
        /// Output file
        #[arg(short, long, default_value = "mirror.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,mirror_bot=info",
        1 => "info,mirror_bot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Reverse { text } => {
                println!("{}", reverse_words(&text.join(" ")));
                Ok(())
            }
            Command::Speak { text, lang, output } => speak(&text.join(" "), &lang, &output).await,
        };
    }

    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    tracing::info!(
        port = config.server.port,
        mode = ?config.telegram.mode,
        "starting mirror bot"
    );

    Daemon::new(config)?.run().await?;

    Ok(())
}

/// Run the audio pipeline once and write the result to disk
async fn speak(text: &str, lang: &str, output: &Path) -> anyhow::Result<()> {
    let language: Language = lang.parse()?;
    let config = Config::load()?;
    config.validate_for_synthesis()?;

    let words = split_words(text);
    if words.is_empty() {
        anyhow::bail!("nothing to speak");
    }

    let synthesizer: Arc<dyn SpeechSynthesizer> =
        Arc::new(PollyClient::new(&config.polly, config.audio.output_format)?);
    let pipeline = AudioPipeline::new(synthesizer, &config.audio);

    let artifact = pipeline.render(&words, language).await?;
    tokio::fs::write(output, &artifact.bytes).await?;

    println!(
        "{} -> {} ({} words, {:.2}s)",
        words.join(" "),
        output.display(),
        words.len(),
        artifact.duration.as_secs_f64()
    );

    Ok(())
}
