use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use punsmith::{JokeEngine, OpenAiModel, PhraseIndex, TopicValidator};
use serde_json::json;

#[cfg(feature = "web")]
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "punsmith", about = "Generate pun-based jokes", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Override the built-in short-word list.
    #[arg(long, global = true, value_name = "FILE")]
    short_words: Option<PathBuf>,

    /// Override the built-in long-phrase list.
    #[arg(long, global = true, value_name = "FILE")]
    long_phrases: Option<PathBuf>,

    /// Override the built-in topic blocklist.
    #[arg(long, global = true, value_name = "FILE")]
    blocklist: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a joke, optionally about a topic.
    Joke {
        /// Topic to joke about; omit for a joke from scratch.
        #[arg(long)]
        topic: Option<String>,

        /// Seed the engine for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Serve the HTTP front end.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let index = Arc::new(load_index(&cli)?);
    let validator = load_validator(&cli)?;
    let model = OpenAiModel::from_env()?;

    match cli.command {
        Command::Joke { topic, seed } => {
            let engine = match seed {
                Some(seed) => JokeEngine::with_seed(index, validator, model, seed),
                None => JokeEngine::new(index, validator, model),
            };
            let joke = match topic.as_deref() {
                Some(topic) => engine.tell_joke_about(topic)?,
                None => engine.tell_joke()?,
            };
            if cli.json {
                let payload = json!({
                    "setup": joke.setup,
                    "punchline": joke.punchline,
                    "nucleus": joke.nucleus,
                    "component": joke.component,
                    "change": joke.change,
                    "substitution": joke.substitution,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{}", joke.setup);
                println!("{}", joke.punchline);
                println!();
                println!("({} -> {})", joke.nucleus, joke.substitution);
            }
            Ok(())
        }
        #[cfg(feature = "web")]
        Command::Serve { addr } => {
            let engine = Arc::new(JokeEngine::new(index, validator, model));
            let config = punsmith::web::WebConfig { addr };
            tokio::runtime::Runtime::new()?.block_on(punsmith::web::serve(config, engine))?;
            Ok(())
        }
    }
}

fn load_index(cli: &Cli) -> Result<PhraseIndex, Box<dyn Error>> {
    match (&cli.short_words, &cli.long_phrases) {
        (None, None) => Ok(PhraseIndex::embedded()),
        (Some(short), Some(long)) => Ok(PhraseIndex::from_files(short, long)?),
        _ => Err("provide both --short-words and --long-phrases, or neither".into()),
    }
}

fn load_validator(cli: &Cli) -> Result<TopicValidator, Box<dyn Error>> {
    match &cli.blocklist {
        None => Ok(TopicValidator::embedded()),
        Some(path) => Ok(TopicValidator::from_file(path)?),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("punsmith=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
