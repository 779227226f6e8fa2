use std::path::{Path, PathBuf};
use std::sync::Arc;

use docbot_core::chat::{ChatOutcome, ChatTicket};
use docbot_core::documents::{
    download_target, DeleteOutcome, DeleteTicket, RefreshOutcome, RefreshTicket, UploadOutcome,
    UploadTicket,
};
use docbot_core::gate::{self, View};
use docbot_core::{
    ApiError, AuthError, Backend, ChatWorkflow, Config, Credentials, DemoAuthenticator,
    DocumentWorkflow, FileUpload, HttpBackend, Session, SessionStore,
};
use log::{error, info, warn};
use ratatui::widgets::ListState;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

pub const LOGIN_FAILED: &str = "Login failed. Try \"admin\" or \"user\" as username.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

/// A spawned request together with the ticket it was started from, so a task
/// that dies without answering can still be settled.
pub struct Pending<K, T> {
    pub ticket: K,
    handle: JoinHandle<T>,
}

impl<K, T> Pending<K, T> {
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn abort(&self) {
        self.handle.abort();
    }
}

fn task_failure(e: &JoinError) -> ApiError {
    error!("background task failed: {}", e);
    ApiError::Network(format!("request aborted: {}", e))
}

/// Take the pending request out of `slot` if its task has completed.
async fn take_finished<K, T>(slot: &mut Option<Pending<K, T>>) -> Option<(K, Result<T, JoinError>)> {
    if !slot.as_ref().is_some_and(|p| p.is_finished()) {
        return None;
    }
    let pending = slot.take()?;
    Some((pending.ticket, pending.handle.await))
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: View,
    pub input_mode: InputMode,

    // Collaborators
    pub sessions: Arc<SessionStore>,
    session_rx: watch::Receiver<Option<Session>>,
    pub backend: Arc<dyn Backend>,
    pub download_dir: PathBuf,

    // Login form
    pub username: String,
    pub password: String,
    pub login_field: LoginField,
    pub login_error: Option<String>,
    pub login_task: Option<JoinHandle<Result<Session, AuthError>>>,

    // Admin dashboard
    pub documents: DocumentWorkflow,
    pub files_state: ListState,
    pub path_input: String,
    pub path_cursor: usize,
    pub notice: Option<String>, // selection/download feedback, separate from workflow status
    pub refresh_task: Option<Pending<RefreshTicket, RefreshOutcome>>,
    pub upload_tasks: Vec<Pending<UploadTicket, UploadOutcome>>,
    pub delete_task: Option<Pending<DeleteTicket, DeleteOutcome>>,
    pub download_task: Option<JoinHandle<Result<PathBuf, String>>>,

    // Chat
    pub chat: ChatWorkflow,
    pub chat_cursor: usize,
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the transcript area
    pub chat_width: u16,  // inner width, for wrap estimates
    pub chat_task: Option<Pending<ChatTicket, ChatOutcome>>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let backend = HttpBackend::new(&config.api_base_url, config.request_timeout())?;
        info!("using backend at {}", backend.base_url());

        let sessions = SessionStore::new(Arc::new(DemoAuthenticator::default()))
            .with_session_ttl(config.session_ttl())
            .with_login_timeout(config.request_timeout());

        let download_dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));

        Ok(Self::with_parts(Arc::new(sessions), Arc::new(backend), download_dir))
    }

    pub fn with_parts(
        sessions: Arc<SessionStore>,
        backend: Arc<dyn Backend>,
        download_dir: PathBuf,
    ) -> Self {
        let session_rx = sessions.subscribe();

        Self {
            should_quit: false,
            screen: View::Login,
            input_mode: InputMode::Editing,

            sessions,
            session_rx,
            backend,
            download_dir,

            username: String::new(),
            password: String::new(),
            login_field: LoginField::Username,
            login_error: None,
            login_task: None,

            documents: DocumentWorkflow::new(),
            files_state: ListState::default(),
            path_input: String::new(),
            path_cursor: 0,
            notice: None,
            refresh_task: None,
            upload_tasks: Vec::new(),
            delete_task: None,
            download_task: None,

            chat: ChatWorkflow::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_task: None,

            animation_frame: 0,
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.current()
    }

    pub fn is_logging_in(&self) -> bool {
        self.login_task.is_some()
    }

    /// True when no request of any kind is outstanding.
    pub fn is_idle(&self) -> bool {
        self.login_task.is_none()
            && self.refresh_task.is_none()
            && self.upload_tasks.is_empty()
            && self.delete_task.is_none()
            && self.download_task.is_none()
            && self.chat_task.is_none()
    }

    // Navigation

    /// Switch to `requested`, or wherever the gate sends us instead.
    pub fn navigate(&mut self, requested: View) {
        let session = self.session();
        let target = gate::navigate(requested, session.as_ref());
        if target != requested {
            info!("access to {:?} denied, showing {:?}", requested, target);
        }

        let entering = target != self.screen;
        self.screen = target;
        self.input_mode = match target {
            View::Login | View::Chat => InputMode::Editing,
            View::Admin => InputMode::Normal,
        };

        if entering && target == View::Admin {
            self.refresh_documents();
        }
    }

    /// React to login, logout or expiry reported by the session store.
    pub fn sync_session(&mut self) {
        // Reading the store clears an expired session and notifies the channel.
        let _ = self.sessions.current();
        if self.session_rx.has_changed().unwrap_or(false) {
            self.session_changed();
            let screen = self.screen;
            self.navigate(screen);
        }
    }

    fn session_changed(&mut self) {
        let _ = self.session_rx.borrow_and_update();
        self.abort_requests();
        self.documents.reset();
        self.files_state.select(None);
        self.notice = None;
        self.chat.reset();
        self.chat_cursor = 0;
        self.chat_scroll = 0;
    }

    fn abort_requests(&mut self) {
        if let Some(p) = self.refresh_task.take() {
            p.abort();
        }
        for p in self.upload_tasks.drain(..) {
            p.abort();
        }
        if let Some(p) = self.delete_task.take() {
            p.abort();
        }
        if let Some(p) = self.chat_task.take() {
            p.abort();
        }
    }

    pub fn logout(&mut self) {
        self.sessions.logout();
        self.sync_session();
    }

    // Login

    pub fn submit_login(&mut self) {
        if self.login_task.is_some() {
            return;
        }
        let credentials = Credentials::new(self.username.trim(), self.password.clone());
        let sessions = Arc::clone(&self.sessions);
        self.login_error = None;
        self.login_task = Some(tokio::spawn(async move { sessions.login(&credentials).await }));
    }

    async fn poll_login(&mut self) {
        if !self.login_task.as_ref().is_some_and(|h| h.is_finished()) {
            return;
        }
        let Some(handle) = self.login_task.take() else {
            return;
        };

        match handle.await {
            Ok(Ok(session)) => {
                self.password.clear();
                self.login_field = LoginField::Username;
                self.session_changed();
                self.navigate(gate::landing_view(session.role()));
            }
            Ok(Err(e)) => {
                info!("login rejected: {}", e);
                self.login_error = Some(LOGIN_FAILED.to_string());
            }
            Err(e) => {
                error!("login task failed: {}", e);
                self.login_error = Some(LOGIN_FAILED.to_string());
            }
        }
    }

    // Documents

    pub fn selected_filename(&self) -> Option<&String> {
        self.files_state.selected().and_then(|i| self.documents.files().get(i))
    }

    pub fn files_nav_down(&mut self) {
        let len = self.documents.files().len();
        if len > 0 {
            let i = self.files_state.selected().map_or(0, |i| (i + 1).min(len - 1));
            self.files_state.select(Some(i));
        }
    }

    pub fn files_nav_up(&mut self) {
        if !self.documents.files().is_empty() {
            let i = self.files_state.selected().unwrap_or(0);
            self.files_state.select(Some(i.saturating_sub(1)));
        }
    }

    /// Keep the highlighted row inside the list after it was replaced.
    fn clamp_file_selection(&mut self) {
        let len = self.documents.files().len();
        let selected = match self.files_state.selected() {
            _ if len == 0 => None,
            Some(i) => Some(i.min(len - 1)),
            None => Some(0),
        };
        self.files_state.select(selected);
    }

    pub fn refresh_documents(&mut self) {
        if self.refresh_task.is_some() {
            return;
        }
        let session = self.session();
        let Ok(ticket) = self.documents.begin_refresh(session.as_ref()) else {
            return;
        };
        let job = ticket.clone();
        let backend = Arc::clone(&self.backend);
        let handle = tokio::spawn(async move { job.run(backend.as_ref()).await });
        self.refresh_task = Some(Pending { ticket, handle });
    }

    /// Read the file named in the path prompt and make it the upload selection.
    pub async fn select_file_from_input(&mut self) {
        let raw = self.path_input.trim();
        if raw.is_empty() {
            return;
        }
        let path = expand_home(raw);

        match FileUpload::from_path(&path).await {
            Ok(file) => {
                self.notice = None;
                self.documents.select_file(file);
                self.path_input.clear();
                self.path_cursor = 0;
            }
            Err(e) => {
                warn!("cannot select {}: {}", path.display(), e);
                self.notice = Some(format!("Cannot select file: {}", e));
            }
        }
    }

    pub fn confirm_upload(&mut self) {
        let session = self.session();
        match self.documents.begin_upload(session.as_ref()) {
            Ok(ticket) => {
                info!("uploading {}", ticket.filename());
                let job = ticket.clone();
                let backend = Arc::clone(&self.backend);
                let handle = tokio::spawn(async move { job.run(backend.as_ref()).await });
                self.upload_tasks.push(Pending { ticket, handle });
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    pub fn delete_selected(&mut self) {
        if self.delete_task.is_some() {
            return;
        }
        let Some(filename) = self.selected_filename().cloned() else {
            return;
        };
        let session = self.session();
        let Ok(ticket) = self.documents.begin_delete(session.as_ref(), &filename) else {
            return;
        };
        info!("deleting {}", ticket.filename());
        let job = ticket.clone();
        let backend = Arc::clone(&self.backend);
        let handle = tokio::spawn(async move { job.run(backend.as_ref()).await });
        self.delete_task = Some(Pending { ticket, handle });
    }

    pub fn download_selected(&mut self) {
        if self.download_task.is_some() {
            return;
        }
        let Some(filename) = self.selected_filename().cloned() else {
            return;
        };
        let Some(target) = download_target(&self.download_dir, &filename) else {
            self.notice = Some(format!("Cannot save {}", filename));
            return;
        };

        self.notice = Some(format!("Downloading {}...", filename));
        let backend = Arc::clone(&self.backend);
        self.download_task = Some(tokio::spawn(async move {
            let bytes = backend.download(&filename).await.map_err(|e| e.to_string())?;
            tokio::fs::write(&target, bytes)
                .await
                .map_err(|e| format!("{}: {}", target.display(), e))?;
            Ok(target)
        }));
    }

    async fn poll_documents(&mut self) {
        if let Some((ticket, joined)) = take_finished(&mut self.refresh_task).await {
            let outcome = joined.unwrap_or_else(|e| ticket.fail(task_failure(&e)));
            self.documents.apply_refresh(outcome);
            self.clamp_file_selection();
        }

        if self.upload_tasks.iter().any(|p| p.is_finished()) {
            let (done, pending): (Vec<_>, Vec<_>) =
                std::mem::take(&mut self.upload_tasks).into_iter().partition(|p| p.is_finished());
            self.upload_tasks = pending;
            for Pending { ticket, handle } in done {
                let outcome = handle.await.unwrap_or_else(|e| ticket.fail(task_failure(&e)));
                self.documents.apply_upload(outcome);
            }
            self.clamp_file_selection();
        }

        if let Some((ticket, joined)) = take_finished(&mut self.delete_task).await {
            let outcome = joined.unwrap_or_else(|e| ticket.fail(task_failure(&e)));
            self.documents.apply_delete(outcome);
            self.clamp_file_selection();
        }

        if self.download_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.download_task.take() {
                self.notice = Some(match handle.await {
                    Ok(Ok(path)) => format!("Saved to {}", path.display()),
                    Ok(Err(e)) => format!("Download failed: {}", e),
                    Err(e) => format!("Download failed: {}", e),
                });
            }
        }
    }

    // Chat

    pub fn send_chat(&mut self) {
        let session = self.session();
        let Some(ticket) = self.chat.begin_send(session.as_ref()) else {
            return;
        };
        self.chat_cursor = 0;
        self.scroll_chat_to_bottom();

        let job = ticket.clone();
        let backend = Arc::clone(&self.backend);
        let handle = tokio::spawn(async move { job.run(backend.as_ref()).await });
        self.chat_task = Some(Pending { ticket, handle });
    }

    async fn poll_chat(&mut self) {
        if let Some((ticket, joined)) = take_finished(&mut self.chat_task).await {
            let outcome = joined.unwrap_or_else(|e| ticket.fail(task_failure(&e)));
            if self.chat.apply_reply(outcome) {
                self.scroll_chat_to_bottom();
            }
        }
    }

    /// Rough count of rendered transcript lines at the current width.
    fn chat_line_count(&self) -> u16 {
        let width = self.chat_width.max(1) as usize;
        let wrapped = |text: &str| -> usize {
            text.lines()
                .map(|l| l.chars().count().max(1).div_ceil(width))
                .sum::<usize>()
                .max(1)
        };
        let mut total: usize = self
            .chat
            .transcript()
            .iter()
            .map(|m| 2 + wrapped(&m.text)) // label line, text, blank line
            .sum();
        if self.chat.is_awaiting_reply() {
            total += 2;
        }
        total.min(u16::MAX as usize) as u16
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.chat_line_count().saturating_sub(self.chat_height);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        let max = self.chat_line_count().saturating_sub(self.chat_height);
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
    }

    // Ticks

    pub async fn on_tick(&mut self) {
        self.poll_login().await;
        self.sync_session();
        self.poll_documents().await;
        self.poll_chat().await;
        self.tick_animation();
    }

    pub fn tick_animation(&mut self) {
        if self.chat.is_awaiting_reply() || self.is_logging_in() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

/// `~/docs/a.pdf` style paths typed into the prompt.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(raw), |home| home.join(rest)),
        None => Path::new(raw).to_path_buf(),
    }
}
