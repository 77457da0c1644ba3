//! PaperDesk - command-line client for the research paper service.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use paperdesk_config_and_utils::{init_logging, Config, Paths};
use paperdesk_stores::ResearchClient;

/// PaperDesk command-line interface.
#[derive(Parser)]
#[command(name = "paperdesk")]
#[command(about = "Manage research papers, references and citations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, logs and exports. Defaults to ~/.paperdesk
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// API base URL, overriding the config file
    #[arg(long, global = true)]
    base_url: Option<String>,
}

/// Login credentials, from flags or the environment.
#[derive(Args, Debug, Clone)]
struct Credentials {
    #[arg(long, env = "PAPERDESK_EMAIL")]
    email: String,

    #[arg(long, env = "PAPERDESK_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// List your papers
    Papers {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Create a paper
    AddPaper {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        /// Share the paper with other users
        #[arg(long)]
        shared: bool,
    },
    /// Edit the title or content of a paper
    UpdatePaper {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        paper_id: i64,
        /// New title. Unchanged when omitted
        #[arg(long)]
        title: Option<String>,
        /// New content. Unchanged when omitted
        #[arg(long)]
        content: Option<String>,
    },
    /// Flip the shared flag of a paper you own
    SharePaper {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        paper_id: i64,
    },
    /// Delete a paper
    DeletePaper {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        paper_id: i64,
    },
    /// Render a PDF and save it
    ExportPdf {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        /// Output file. Defaults to the exports directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List your references
    References {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Add a reference to your library
    AddReference {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        author: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        title: String,
    },
    /// Remove a reference from your library
    DeleteReference {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        reference_id: i64,
    },
    /// List citations of a paper
    Citations {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        paper_id: i64,
    },
    /// Generate a citation for a paper from free text
    GenerateCitation {
        #[command(flatten)]
        credentials: Credentials,
        #[arg(long)]
        paper_id: i64,
        #[arg(long)]
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(base_url) = cli.base_url {
        config.api_base_url = base_url;
        config.validate()?;
    }

    init_logging(&config.log_level, &paths)?;

    let client = ResearchClient::from_config(&config)?;
    commands::run(&client, &paths, cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_paper() {
        let cli = Cli::try_parse_from([
            "paperdesk",
            "--base-url",
            "http://localhost:5000",
            "add-paper",
            "--email",
            "a@b.com",
            "--password",
            "pw",
            "--title",
            "On Caches",
            "--shared",
        ])
        .unwrap();

        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:5000"));
        match cli.command {
            Commands::AddPaper {
                credentials,
                title,
                content,
                shared,
            } => {
                assert_eq!(credentials.email, "a@b.com");
                assert_eq!(title, "On Caches");
                assert_eq!(content, "");
                assert!(shared);
            }
            _ => panic!("expected add-paper"),
        }
    }

    #[test]
    fn test_parse_update_paper_with_partial_fields() {
        let cli = Cli::try_parse_from([
            "paperdesk",
            "update-paper",
            "--email",
            "a@b.com",
            "--password",
            "pw",
            "--paper-id",
            "3",
            "--content",
            "Revised body",
        ])
        .unwrap();

        match cli.command {
            Commands::UpdatePaper {
                paper_id,
                title,
                content,
                ..
            } => {
                assert_eq!(paper_id, 3);
                assert_eq!(title, None);
                assert_eq!(content.as_deref(), Some("Revised body"));
            }
            _ => panic!("expected update-paper"),
        }
    }

    #[test]
    fn test_export_pdf_needs_no_credentials() {
        let cli = Cli::try_parse_from([
            "paperdesk",
            "export-pdf",
            "--title",
            "T",
            "--content",
            "C",
            "-o",
            "out.pdf",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::ExportPdf { output: Some(ref path), .. } if path == &PathBuf::from("out.pdf")
        ));
    }
}
