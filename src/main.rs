use clap::{Parser, Subcommand};
use mailrag::Result;
use mailrag::commands::{build_index, init_config, serve, show_config, show_status};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mailrag")]
#[command(about = "Retrieval-augmented question answering over an email archive")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build the retrieval index from a JSON email batch
    Build {
        /// Path to a JSON file holding an array of email documents
        #[arg(long)]
        input: PathBuf,
    },
    /// Create or inspect the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show Ollama connectivity and index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            serve(port).await?;
        }
        Commands::Build { input } => {
            build_index(&input).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                init_config()?;
            }
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["mailrag", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::Status);
        }
    }

    #[test]
    fn serve_command_with_port() {
        let cli = Cli::try_parse_from(["mailrag", "serve", "--port", "9090"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Serve { port } = parsed.command {
                assert_eq!(port, Some(9090));
            }
        }
    }

    #[test]
    fn build_command_requires_input() {
        let cli = Cli::try_parse_from(["mailrag", "build"]);
        assert!(cli.is_err());

        let cli = Cli::try_parse_from(["mailrag", "build", "--input", "emails.json"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Build { input } = parsed.command {
                assert_eq!(input, PathBuf::from("emails.json"));
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["mailrag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["mailrag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["mailrag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
