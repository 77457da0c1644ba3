//! Domain entities and their wire shapes.

use serde::{Deserialize, Serialize};
use view_state_cache::Keyed;

/// A research paper owned by one user, optionally shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    /// Server-assigned id; `None` until the server confirms creation.
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub owner_id: i64,
    #[serde(default)]
    pub shared: bool,
}

impl Paper {
    /// A paper that hasn't been sent to the server yet.
    pub fn draft(owner_id: i64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            owner_id,
            shared: false,
        }
    }

    pub fn with_shared(mut self, shared: bool) -> Self {
        self.shared = shared;
        self
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }
}

impl Keyed for Paper {
    type Key = i64;

    fn key(&self) -> Option<i64> {
        self.id
    }
}

/// A bibliographic reference in the user's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub title: String,
}

impl Keyed for Reference {
    type Key = i64;

    fn key(&self) -> Option<i64> {
        Some(self.id)
    }
}

/// Input for creating a reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewReference {
    pub author: String,
    pub category: String,
    pub title: String,
}

impl NewReference {
    pub fn new(
        author: impl Into<String>,
        category: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            author: author.into(),
            category: category.into(),
            title: title.into(),
        }
    }
}

/// Citations generated for one paper, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CitationList {
    pub paper_id: i64,
    pub citations: Vec<String>,
}

impl Keyed for CitationList {
    type Key = i64;

    fn key(&self) -> Option<i64> {
        Some(self.paper_id)
    }
}

/// A rendered PDF returned by the export endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDocument {
    pub bytes: Vec<u8>,
    /// Suggested file name, `paper_<unix-millis>.pdf`.
    pub file_name: String,
}

impl PdfDocument {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        let file_name = format!("paper_{}.pdf", chrono::Utc::now().timestamp_millis());
        Self { bytes, file_name }
    }

    /// Whether the payload starts with the PDF magic bytes.
    pub fn looks_like_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF-")
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
