mod process_cmd;
mod session;
mod status_cmd;
mod terminal_output;
mod ui_cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use lecturebuddy_config::{config_dir, config_file_path, load_and_prepare};
use tracing::info;

use process_cmd::{Source, Tasks};
use session::Session;

#[derive(Parser)]
#[command(name = "lecturebuddy")]
#[command(about = "Lecture Buddy: turn lecture photos and notes into chat, summaries and translations")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.lecturebuddy/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive wizard (default)
    Ui,
    /// Report which OCR engine and models are available
    Status,
    /// Run the wizard steps headlessly and print the results
    #[command(group(ArgGroup::new("source").required(true).args(["image", "text"])))]
    Process {
        /// Image of the board or slides
        #[arg(long)]
        image: Option<PathBuf>,
        /// Lecture text
        #[arg(long)]
        text: Option<String>,
        /// Summarize the extracted text
        #[arg(long)]
        summarize: bool,
        /// Translate the extracted text to this language code
        #[arg(long, value_name = "LANG")]
        translate_to: Option<String>,
    },
}

fn resolve_config_path(explicit: Option<PathBuf>) -> (PathBuf, PathBuf) {
    match explicit {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (path, dir)
        }
        None => {
            let dir = config_dir();
            (config_file_path(&dir), dir)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Ui);

    let (config_path, config_dir) = resolve_config_path(cli.config);
    let config = load_and_prepare(&config_path)
        .await
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    // The wizard owns the terminal, so it logs to file only.
    let console = !matches!(command, Commands::Ui);
    logging::init_logger(config.log_dir(&config_dir), config.log_level(), console)?;
    info!(config = %config_path.display(), "Lecture Buddy starting");

    let session = Session::build(&config, &config_dir)?;

    match command {
        Commands::Ui => ui_cmd::run(session).await,
        Commands::Status => status_cmd::run(&session).await,
        Commands::Process {
            image,
            text,
            summarize,
            translate_to,
        } => {
            let source = match (image, text) {
                (Some(path), _) => Source::Image(path),
                (None, Some(text)) => Source::Text(text),
                (None, None) => anyhow::bail!("Either --image or --text is required"),
            };
            let tasks = Tasks {
                summarize,
                translate_to,
            };
            process_cmd::run(session, source, tasks).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_resolves_its_directory() {
        let (path, dir) = resolve_config_path(Some(PathBuf::from("/tmp/lb/config.yaml")));
        assert_eq!(path, PathBuf::from("/tmp/lb/config.yaml"));
        assert_eq!(dir, PathBuf::from("/tmp/lb"));

        let (_, dir) = resolve_config_path(Some(PathBuf::from("config.yaml")));
        assert_eq!(dir, PathBuf::from("."));
    }

    #[test]
    fn process_requires_a_source() {
        assert!(Cli::try_parse_from(["lecturebuddy", "process", "--summarize"]).is_err());
        assert!(Cli::try_parse_from(["lecturebuddy", "process", "--image", "a.png", "--text", "x"]).is_err());
        let cli = Cli::try_parse_from(["lecturebuddy", "process", "--text", "notes"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Process { text: Some(_), .. })));
    }

    #[test]
    fn no_subcommand_means_ui() {
        let cli = Cli::try_parse_from(["lecturebuddy"]).unwrap();
        assert!(cli.command.is_none());
    }
}
