//! Subcommand handlers.

use std::path::{Path, PathBuf};

use paperdesk_config_and_utils::Paths;
use paperdesk_stores::{NewReference, Paper, PdfDocument, ResearchClient, StoreError};
use tracing::{info, warn};

use crate::{Commands, Credentials};

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) async fn run(client: &ResearchClient, paths: &Paths, command: Commands) -> CliResult {
    match command {
        Commands::Register { name, credentials } => {
            client
                .auth()
                .register(&name, &credentials.email, &credentials.password)
                .await?;
            println!("Registered {}", credentials.email);
        }
        Commands::Papers { credentials } => {
            let user_id = login(client, &credentials).await?;
            let papers = client.papers().load().await?;
            if papers.is_empty() {
                println!("No papers");
            }
            for paper in papers {
                print_paper(&paper, user_id);
            }
        }
        Commands::AddPaper {
            credentials,
            title,
            content,
            shared,
        } => {
            let user_id = login(client, &credentials).await?;
            let draft = Paper::draft(user_id, title, content).with_shared(shared);
            let paper_id = client.papers().add(draft).await?;
            println!("Created paper {paper_id}");
        }
        Commands::UpdatePaper {
            credentials,
            paper_id,
            title,
            content,
        } => {
            login(client, &credentials).await?;
            client.papers().load().await?;
            let current = client
                .papers()
                .get(paper_id)
                .await
                .ok_or_else(|| StoreError::NotFound(paper_id.to_string()))?;
            let edited = apply_edits(current, title, content);
            client.papers().update(edited).await?;
            println!("Updated paper {paper_id}");
        }
        Commands::SharePaper {
            credentials,
            paper_id,
        } => {
            login(client, &credentials).await?;
            client.papers().load().await?;
            let shared = client.papers().toggle_shared(paper_id).await?;
            println!(
                "Paper {paper_id} is now {}",
                if shared { "shared" } else { "private" }
            );
        }
        Commands::DeletePaper {
            credentials,
            paper_id,
        } => {
            login(client, &credentials).await?;
            client.papers().load().await?;
            client.papers().remove(paper_id).await?;
            println!("Deleted paper {paper_id}");
        }
        Commands::ExportPdf {
            title,
            content,
            output,
        } => {
            let pdf = client.papers().export_pdf(&title, &content).await?;
            if !pdf.looks_like_pdf() {
                warn!(len = pdf.len(), "Export response does not look like a PDF");
            }
            let path = write_pdf(&pdf, output, &paths.exports_dir()).await?;
            println!("Saved {}", path.display());
        }
        Commands::References { credentials } => {
            login(client, &credentials).await?;
            let references = client.references().load().await?;
            if references.is_empty() {
                println!("No references");
            }
            for reference in references {
                println!(
                    "[{}] {} - {} ({})",
                    reference.id, reference.author, reference.title, reference.category
                );
            }
        }
        Commands::AddReference {
            credentials,
            author,
            category,
            title,
        } => {
            login(client, &credentials).await?;
            let id = client
                .references()
                .add(NewReference::new(author, category, title))
                .await?;
            match id {
                Some(id) => println!("Added reference {id}"),
                None => println!("Added reference"),
            }
        }
        Commands::DeleteReference {
            credentials,
            reference_id,
        } => {
            login(client, &credentials).await?;
            client.references().load().await?;
            client.references().remove(reference_id).await?;
            println!("Deleted reference {reference_id}");
        }
        Commands::Citations {
            credentials,
            paper_id,
        } => {
            login(client, &credentials).await?;
            let citations = client.open_paper(paper_id).await?;
            if citations.is_empty() {
                println!("No citations");
            }
            for citation in citations {
                println!("- {citation}");
            }
        }
        Commands::GenerateCitation {
            credentials,
            paper_id,
            text,
        } => {
            login(client, &credentials).await?;
            client.open_paper(paper_id).await?;
            let citation = client.citations().generate(paper_id, &text).await?;
            println!("{citation}");
        }
    }
    Ok(())
}

async fn login(
    client: &ResearchClient,
    credentials: &Credentials,
) -> Result<i64, Box<dyn std::error::Error>> {
    let user_id = client
        .auth()
        .login(&credentials.email, &credentials.password)
        .await?;
    info!(user_id, "Logged in from CLI");
    Ok(user_id)
}

/// `paper` with whichever fields were given on the command line replaced.
fn apply_edits(mut paper: Paper, title: Option<String>, content: Option<String>) -> Paper {
    if let Some(title) = title {
        paper.title = title;
    }
    if let Some(content) = content {
        paper.content = content;
    }
    paper
}

fn print_paper(paper: &Paper, user_id: i64) {
    let id = paper.id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
    let mut flags = Vec::new();
    if paper.shared {
        flags.push("shared");
    }
    if !paper.is_owned_by(user_id) {
        flags.push("not yours");
    }
    if flags.is_empty() {
        println!("[{id}] {}", paper.title);
    } else {
        println!("[{id}] {} ({})", paper.title, flags.join(", "));
    }
}

/// Write `pdf` to `output`, or to its suggested name under `exports_dir`.
async fn write_pdf(
    pdf: &PdfDocument,
    output: Option<PathBuf>,
    exports_dir: &Path,
) -> std::io::Result<PathBuf> {
    let path = output.unwrap_or_else(|| exports_dir.join(&pdf.file_name));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &pdf.bytes).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf() -> PdfDocument {
        PdfDocument {
            bytes: b"%PDF-1.4".to_vec(),
            file_name: "paper_1.pdf".into(),
        }
    }

    #[test]
    fn test_apply_edits_keeps_omitted_fields() {
        let paper = Paper {
            id: Some(3),
            ..Paper::draft(7, "Title", "Body")
        };

        let edited = apply_edits(paper.clone(), None, Some("New body".into()));
        assert_eq!(edited.title, "Title");
        assert_eq!(edited.content, "New body");
        assert_eq!(edited.id, Some(3));

        assert_eq!(apply_edits(paper.clone(), None, None), paper);
    }

    #[tokio::test]
    async fn test_write_pdf_to_exports_dir() {
        let temp = tempfile::tempdir().unwrap();
        let exports = temp.path().join("exports");

        let path = write_pdf(&pdf(), None, &exports).await.unwrap();
        assert_eq!(path, exports.join("paper_1.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_write_pdf_to_explicit_output() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("nested").join("mine.pdf");

        let path = write_pdf(&pdf(), Some(output.clone()), temp.path())
            .await
            .unwrap();
        assert_eq!(path, output);
        assert!(output.exists());
    }
}
