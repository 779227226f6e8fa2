//! Document management workflow.
//!
//! Local state only ever changes from a confirmed server answer: the file list is
//! replaced wholesale by the server listing, never patched with what the client
//! thinks it just uploaded or deleted.
//!
//! Each operation runs in three steps so a front end can keep its event loop free
//! while the request is outstanding:
//!
//! 1. `begin_*` validates, records a provisional status and hands out a ticket.
//! 2. The ticket's `run` performs the network calls and produces an outcome.
//! 3. `apply_*` commits the outcome, unless the workflow was reset in between.
//!
//! [`DocumentWorkflow::upload`], [`DocumentWorkflow::delete`] and
//! [`DocumentWorkflow::refresh`] chain the three steps for callers that can await.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::api::Backend;
use crate::error::{ApiError, DocumentError};
use crate::session::Session;

/// Upload size limit enforced by the backend.
pub const MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024;

pub const UPLOAD_OK: &str = "File uploaded successfully";
pub const UPLOAD_FAILED: &str = "Upload failed. Please try again.";
pub const DELETE_OK: &str = "File deleted successfully";
pub const DELETE_FAILED: &str = "Delete failed. Please try again.";
pub const FETCH_FAILED: &str = "Failed to fetch documents";

const ACCEPTED_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
];

/// MIME type for an accepted document extension.
pub fn mime_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
    ACCEPTED_TYPES.iter().find(|(e, _)| *e == ext).map(|(_, mime)| *mime)
}

/// A file picked for upload, already read into memory.
#[derive(Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DocumentError> {
        let name = name.into();
        let mime = mime_for(&name).ok_or_else(|| DocumentError::UnsupportedType(name.clone()))?;
        check_size(&name, bytes.len() as u64)?;
        Ok(Self { name, mime, bytes })
    }

    /// Read a document from disk. Type and size are checked before the contents
    /// are loaded.
    pub async fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DocumentError::Io(format!("not a file: {}", path.display())))?
            .to_string();
        if mime_for(&name).is_none() {
            return Err(DocumentError::UnsupportedType(name));
        }

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| DocumentError::Io(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(DocumentError::Io(format!("not a file: {}", path.display())));
        }
        check_size(&name, metadata.len())?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DocumentError::Io(format!("{}: {}", path.display(), e)))?;
        Self::new(name, bytes)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

fn check_size(name: &str, size: u64) -> Result<(), DocumentError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(DocumentError::TooLarge {
            name: name.to_string(),
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Where a downloaded document should be written inside `dir`.
///
/// Only the final path component of the server name is used, so a name such as
/// `../../etc/passwd` cannot escape `dir`.
pub fn download_target(dir: &Path, filename: &str) -> Option<PathBuf> {
    let name = Path::new(filename).file_name()?;
    Some(dir.join(name))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DocumentStatus {
    #[default]
    Idle,
    Uploading(String),
    Deleting(String),
    Success(String),
    Error(String),
}

impl DocumentStatus {
    /// Text shown in the status line, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            DocumentStatus::Idle => None,
            DocumentStatus::Uploading(name) => Some(format!("Uploading {}...", name)),
            DocumentStatus::Deleting(name) => Some(format!("Deleting {}...", name)),
            DocumentStatus::Success(msg) | DocumentStatus::Error(msg) => Some(msg.clone()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DocumentStatus::Error(_))
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, DocumentStatus::Uploading(_) | DocumentStatus::Deleting(_))
    }
}

#[derive(Debug, Clone)]
pub struct RefreshTicket {
    generation: u64,
    sequence: u64,
    token: String,
}

#[derive(Debug, Clone)]
pub struct UploadTicket {
    generation: u64,
    sequence: u64,
    token: String,
    file: FileUpload,
}

#[derive(Debug, Clone)]
pub struct DeleteTicket {
    generation: u64,
    sequence: u64,
    token: String,
    filename: String,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    generation: u64,
    sequence: u64,
    result: Result<Vec<String>, ApiError>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    generation: u64,
    sequence: u64,
    filename: String,
    result: Result<String, ApiError>,
    /// Listing fetched after a successful upload.
    listing: Option<Result<Vec<String>, ApiError>>,
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    generation: u64,
    sequence: u64,
    filename: String,
    result: Result<String, ApiError>,
    listing: Option<Result<Vec<String>, ApiError>>,
}

impl RefreshTicket {
    /// Outcome for a request that never produced an answer.
    pub fn fail(self, error: ApiError) -> RefreshOutcome {
        RefreshOutcome { generation: self.generation, sequence: self.sequence, result: Err(error) }
    }

    pub async fn run(self, backend: &dyn Backend) -> RefreshOutcome {
        RefreshOutcome {
            generation: self.generation,
            sequence: self.sequence,
            result: backend.list(&self.token).await,
        }
    }
}

impl UploadTicket {
    pub fn filename(&self) -> &str {
        &self.file.name
    }

    pub fn fail(self, error: ApiError) -> UploadOutcome {
        UploadOutcome {
            generation: self.generation,
            sequence: self.sequence,
            filename: self.file.name,
            result: Err(error),
            listing: None,
        }
    }

    pub async fn run(self, backend: &dyn Backend) -> UploadOutcome {
        let result = backend.upload(&self.token, &self.file).await;
        let listing = match result {
            Ok(_) => Some(backend.list(&self.token).await),
            Err(_) => None,
        };
        UploadOutcome {
            generation: self.generation,
            sequence: self.sequence,
            filename: self.file.name,
            result,
            listing,
        }
    }
}

impl DeleteTicket {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn fail(self, error: ApiError) -> DeleteOutcome {
        DeleteOutcome {
            generation: self.generation,
            sequence: self.sequence,
            filename: self.filename,
            result: Err(error),
            listing: None,
        }
    }

    pub async fn run(self, backend: &dyn Backend) -> DeleteOutcome {
        let result = backend.delete(&self.token, &self.filename).await;
        let listing = match result {
            Ok(_) => Some(backend.list(&self.token).await),
            Err(_) => None,
        };
        DeleteOutcome {
            generation: self.generation,
            sequence: self.sequence,
            filename: self.filename,
            result,
            listing,
        }
    }
}

/// Local view of the server's document collection.
#[derive(Debug, Default)]
pub struct DocumentWorkflow {
    files: Vec<String>,
    status: DocumentStatus,
    selected: Option<FileUpload>,
    uploads_in_flight: HashSet<String>,
    generation: u64,
    /// Issue order of listing-bearing requests.
    next_sequence: u64,
    /// Sequence of the newest listing applied to `files`.
    listed_sequence: u64,
}

impl DocumentWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn status(&self) -> &DocumentStatus {
        &self.status
    }

    pub fn selected(&self) -> Option<&FileUpload> {
        self.selected.as_ref()
    }

    pub fn is_uploading(&self, filename: &str) -> bool {
        self.uploads_in_flight.contains(filename)
    }

    pub fn select_file(&mut self, file: FileUpload) {
        debug!("selected {:?}", file);
        self.selected = Some(file);
    }

    pub fn cancel_selection(&mut self) {
        self.selected = None;
    }

    /// Forget everything and ignore results of calls still outstanding.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.files.clear();
        self.status = DocumentStatus::Idle;
        self.selected = None;
        self.uploads_in_flight.clear();
    }

    fn token(&mut self, session: Option<&Session>) -> Result<String, DocumentError> {
        match session {
            Some(s) => Ok(s.token().to_string()),
            None => {
                let err = DocumentError::NoSession;
                self.status = DocumentStatus::Error(err.to_string());
                Err(err)
            }
        }
    }

    fn is_current(&self, generation: u64, what: &str) -> bool {
        if generation != self.generation {
            debug!("dropping stale {} result (generation {} != {})", what, generation, self.generation);
            return false;
        }
        true
    }

    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    /// Commit a listing unless one from a later request is already in place.
    fn apply_listing(&mut self, sequence: u64, listing: Result<Vec<String>, ApiError>) {
        if sequence < self.listed_sequence {
            debug!("dropping listing {} older than {}", sequence, self.listed_sequence);
            return;
        }
        match listing {
            Ok(files) => {
                let mut seen = HashSet::new();
                self.files = files.into_iter().filter(|f| seen.insert(f.clone())).collect();
                self.listed_sequence = sequence;
                debug!("listing refreshed: {} files", self.files.len());
            }
            Err(e) => {
                warn!("listing failed: {}", e);
                self.status = DocumentStatus::Error(FETCH_FAILED.to_string());
            }
        }
    }

    pub fn begin_refresh(&mut self, session: Option<&Session>) -> Result<RefreshTicket, DocumentError> {
        let token = self.token(session)?;
        let sequence = self.next_sequence();
        Ok(RefreshTicket { generation: self.generation, sequence, token })
    }

    /// Returns false when the outcome belongs to an earlier generation.
    pub fn apply_refresh(&mut self, outcome: RefreshOutcome) -> bool {
        if !self.is_current(outcome.generation, "refresh") {
            return false;
        }
        self.apply_listing(outcome.sequence, outcome.result);
        true
    }

    /// Start uploading the selected file.
    ///
    /// Without a selection this is a no-op returning [`DocumentError::NoFileSelected`].
    /// A second upload of a name already on its way is refused without touching
    /// the status.
    pub fn begin_upload(&mut self, session: Option<&Session>) -> Result<UploadTicket, DocumentError> {
        let file = self.selected.clone().ok_or(DocumentError::NoFileSelected)?;
        if self.uploads_in_flight.contains(&file.name) {
            return Err(DocumentError::UploadInFlight(file.name));
        }
        let token = self.token(session)?;

        self.uploads_in_flight.insert(file.name.clone());
        self.status = DocumentStatus::Uploading(file.name.clone());
        let sequence = self.next_sequence();
        Ok(UploadTicket { generation: self.generation, sequence, token, file })
    }

    pub fn apply_upload(&mut self, outcome: UploadOutcome) -> bool {
        if !self.is_current(outcome.generation, "upload") {
            return false;
        }
        self.uploads_in_flight.remove(&outcome.filename);

        match outcome.result {
            Ok(message) => {
                info!("uploaded {}: {}", outcome.filename, message);
                self.status = DocumentStatus::Success(UPLOAD_OK.to_string());
                if self.selected.as_ref().is_some_and(|f| f.name == outcome.filename) {
                    self.selected = None;
                }
                if let Some(listing) = outcome.listing {
                    self.apply_listing(outcome.sequence, listing);
                }
            }
            Err(e) => {
                warn!("upload of {} failed: {}", outcome.filename, e);
                self.status = DocumentStatus::Error(UPLOAD_FAILED.to_string());
            }
        }
        true
    }

    /// Start deleting `filename`. A name missing from the current listing is
    /// reported as not found without calling the server.
    pub fn begin_delete(
        &mut self,
        session: Option<&Session>,
        filename: &str,
    ) -> Result<DeleteTicket, DocumentError> {
        if !self.files.iter().any(|f| f == filename) {
            let err = DocumentError::NotFound(filename.to_string());
            self.status = DocumentStatus::Error(not_found_message(filename));
            return Err(err);
        }
        let token = self.token(session)?;

        self.status = DocumentStatus::Deleting(filename.to_string());
        Ok(DeleteTicket {
            generation: self.generation,
            sequence: self.next_sequence(),
            token,
            filename: filename.to_string(),
        })
    }

    pub fn apply_delete(&mut self, outcome: DeleteOutcome) -> bool {
        if !self.is_current(outcome.generation, "delete") {
            return false;
        }

        match outcome.result {
            Ok(message) => {
                info!("deleted {}: {}", outcome.filename, message);
                self.status = DocumentStatus::Success(DELETE_OK.to_string());
                if let Some(listing) = outcome.listing {
                    self.apply_listing(outcome.sequence, listing);
                }
            }
            Err(e) if e.is_not_found() => {
                warn!("delete of {}: already gone", outcome.filename);
                self.status = DocumentStatus::Error(not_found_message(&outcome.filename));
            }
            Err(e) => {
                warn!("delete of {} failed: {}", outcome.filename, e);
                self.status = DocumentStatus::Error(DELETE_FAILED.to_string());
            }
        }
        true
    }

    pub async fn refresh(
        &mut self,
        backend: &dyn Backend,
        session: Option<&Session>,
    ) -> Result<(), DocumentError> {
        let outcome = self.begin_refresh(session)?.run(backend).await;
        let result = outcome.result.clone().map(|_| ()).map_err(DocumentError::from);
        self.apply_refresh(outcome);
        result
    }

    pub async fn upload(
        &mut self,
        backend: &dyn Backend,
        session: Option<&Session>,
    ) -> Result<(), DocumentError> {
        let outcome = self.begin_upload(session)?.run(backend).await;
        let result = outcome.result.clone().map(|_| ()).map_err(DocumentError::from);
        self.apply_upload(outcome);
        result
    }

    pub async fn delete(
        &mut self,
        backend: &dyn Backend,
        session: Option<&Session>,
        filename: &str,
    ) -> Result<(), DocumentError> {
        let outcome = self.begin_delete(session, filename)?.run(backend).await;
        let result = match &outcome.result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Err(DocumentError::NotFound(outcome.filename.clone())),
            Err(e) => Err(DocumentError::Api(e.clone())),
        };
        self.apply_delete(outcome);
        result
    }
}

fn not_found_message(filename: &str) -> String {
    format!("File not found: {}", filename)
}
