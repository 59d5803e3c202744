use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use arboard::Clipboard;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, trace};

use crate::api::FileApi;
use crate::domain::{HELP_TEXT, Message, RtvConfig, RtvError};
use crate::fetch::Fetcher;
use crate::filter::FilterStore;
use crate::inputter::{InputResult, Inputter};
use crate::pagination::PaginationState;
use crate::table::{FileEntry, FileTable, column_widths};
use crate::upload::{UploadCandidate, UploadSlot, declared_mime};

pub const MAX_COLUMN_WIDTH: usize = 32;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

/// Which screen has the keyboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    LISTING,
    TABLE,
    INPUT,
    POPUP,
}

/// What the inputter line is currently editing.
#[derive(Debug, Clone, PartialEq)]
enum InputTarget {
    FilterValue(String),
    UploadPath,
}

/// Application state: the file listing, the open file's table view
/// (filters + pagination + fetch orchestration) and the upload slot.
/// All remote results arrive as [`Message`]s from background tasks;
/// `update` is the only place state changes.
pub struct Model {
    config: RtvConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    files: Vec<FileEntry>,
    selected_file: usize,
    file_id: String,
    file_name: String,
    table: FileTable,
    rows: Vec<Vec<String>>,
    widths: Vec<usize>,
    filters: FilterStore,
    pagination: PaginationState,
    fetcher: Fetcher,
    upload: UploadSlot,
    selected_row: usize,
    selected_column: usize,
    clipboard: Option<Clipboard>,
    input: Inputter,
    input_target: Option<InputTarget>,
    last_input: InputResult,
    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &RtvConfig,
        api: Arc<dyn FileApi>,
        events: UnboundedSender<Message>,
    ) -> Self {
        let fetcher = Fetcher::new(api, events);
        fetcher.request_listing();

        Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::LISTING,
            previous_modus: Modus::LISTING,
            files: Vec::new(),
            selected_file: 0,
            file_id: String::new(),
            file_name: String::new(),
            table: FileTable::empty(config.page_size),
            rows: Vec::new(),
            widths: Vec::new(),
            filters: FilterStore::default(),
            pagination: PaginationState::new(config.page_size),
            fetcher,
            upload: UploadSlot::default(),
            selected_row: 0,
            selected_column: 0,
            clipboard: None,
            input: Inputter::default(),
            input_target: None,
            last_input: InputResult::default(),
            popup_message: String::new(),
            status_message: "Loading file listing ...".to_string(),
            last_status_message_update: Instant::now(),
        }
    }

    pub fn update(&mut self, message: Message) -> Result<(), RtvError> {
        // Network completions apply in any modus.
        match message {
            Message::Quit => {
                self.quit();
                return Ok(());
            }
            Message::FilesFetched(result) => {
                self.files_fetched(result);
                return Ok(());
            }
            Message::TableFetched { seq, result } => {
                self.table_fetched(seq, result);
                return Ok(());
            }
            Message::UploadFinished(result) => {
                self.upload_finished(result);
                return Ok(());
            }
            msg => self.handle_key_message(msg),
        }
        Ok(())
    }

    fn handle_key_message(&mut self, msg: Message) {
        match self.modus {
            Modus::LISTING => match msg {
                Message::MoveUp => self.move_file_selection(-1),
                Message::MoveDown => self.move_file_selection(1),
                Message::Enter => self.open_selected(),
                Message::Refresh => {
                    self.fetcher.request_listing();
                    self.set_status_message("Reloading file listing ...".to_string());
                }
                Message::Upload => self.enter_input(InputTarget::UploadPath),
                Message::ConfirmUpload => self.confirm_upload(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::TABLE => match msg {
                Message::MoveUp => self.move_row_selection(-1),
                Message::MoveDown => self.move_row_selection(1),
                Message::MoveLeft => self.move_column_selection(-1),
                Message::MoveRight => self.move_column_selection(1),
                Message::NextPage => self.next_page(),
                Message::PrevPage => self.prev_page(),
                Message::EditFilter => self.edit_filter(),
                Message::Refresh => self.fetch_current(),
                Message::Upload => self.enter_input(InputTarget::UploadPath),
                Message::ConfirmUpload => self.confirm_upload(),
                Message::CopyCell => self.copy_cell(),
                Message::Exit => self.back_to_listing(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::INPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key);
                }
            }
            Modus::POPUP => match msg {
                Message::Enter | Message::Exit | Message::Help => {
                    self.modus = self.previous_modus;
                    self.previous_modus = Modus::POPUP;
                }
                _ => (),
            },
        }
    }

    // -------------------- Listing ---------------------- //

    fn files_fetched(&mut self, result: Result<Vec<FileEntry>, RtvError>) {
        match result {
            Ok(files) => {
                info!("Loaded {} files", files.len());
                self.files = files;
                self.selected_file = self.selected_file.min(self.files.len().saturating_sub(1));
                self.set_status_message(format!("Loaded {} files", self.files.len()));
            }
            Err(e) => {
                error!("Error fetching file listing: {e}");
                self.set_status_message(format!("Error loading file listing: {e}"));
            }
        }
    }

    fn move_file_selection(&mut self, delta: isize) {
        if self.files.is_empty() {
            return;
        }
        let last = self.files.len() - 1;
        self.selected_file = self
            .selected_file
            .saturating_add_signed(delta)
            .min(last);
    }

    /// Open the highlighted file. This is where the file id becomes
    /// known; no table fetch happens before this point.
    fn open_selected(&mut self) {
        let Some(entry) = self.files.get(self.selected_file) else {
            return;
        };
        info!("Opening file {} ({})", entry.file_name, entry.id);
        self.file_id = entry.id.clone();
        self.file_name = entry.file_name.clone();
        self.filters.clear();
        self.pagination.reset();
        self.table = FileTable::empty(self.config.page_size);
        self.rows.clear();
        self.widths.clear();
        self.selected_row = 0;
        self.selected_column = 0;
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::LISTING;
        self.fetch_current();
    }

    fn back_to_listing(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::LISTING;
    }

    // -------------------- Table ---------------------- //

    fn fetch_current(&mut self) {
        self.fetcher.request_table(
            &self.file_id,
            self.pagination.page(),
            self.pagination.page_size(),
            &self.filters,
        );
    }

    fn table_fetched(&mut self, seq: u64, result: Result<FileTable, RtvError>) {
        if !self.fetcher.accept(seq) {
            return;
        }
        match result {
            Ok(table) => {
                self.pagination.apply(&table.meta);
                self.rows = table.row_matrix();
                self.widths = column_widths(&table.headers, &self.rows, MAX_COLUMN_WIDTH);
                self.table = table;
                self.selected_row = self.selected_row.min(self.rows.len().saturating_sub(1));
                self.selected_column = self
                    .selected_column
                    .min(self.table.headers.len().saturating_sub(1));
                self.set_status_message(format!(
                    "Page {} of {} | Total records: {}",
                    self.pagination.page(),
                    self.pagination.total_pages(),
                    self.pagination.total_records()
                ));
            }
            Err(e) => {
                // Keep the last-known-good table; only report.
                error!("Error fetching file details: {e}");
                self.set_status_message(format!("Error loading file details: {e}"));
            }
        }
    }

    fn next_page(&mut self) {
        if !self.pagination.can_next() {
            trace!("Already on the last page");
            return;
        }
        self.pagination.request(self.pagination.page() + 1);
        self.fetch_current();
    }

    fn prev_page(&mut self) {
        if !self.pagination.can_prev() {
            trace!("Already on the first page");
            return;
        }
        self.pagination.request(self.pagination.page() - 1);
        self.fetch_current();
    }

    fn move_row_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() - 1;
        self.selected_row = self.selected_row.saturating_add_signed(delta).min(last);
    }

    fn move_column_selection(&mut self, delta: isize) {
        if self.table.headers.is_empty() {
            return;
        }
        let last = self.table.headers.len() - 1;
        self.selected_column = self.selected_column.saturating_add_signed(delta).min(last);
    }

    fn edit_filter(&mut self) {
        let Some(column) = self.table.headers.get(self.selected_column).cloned() else {
            self.set_status_message("No column selected".to_string());
            return;
        };
        let current = self.filters.get(&column).unwrap_or("").to_string();
        self.enter_input(InputTarget::FilterValue(column));
        self.input.set(&current);
        self.last_input = self.input.get();
    }

    fn apply_filter(&mut self, column: String, value: String) {
        if self.filters.set(&column, &value) {
            if value.is_empty() {
                self.set_status_message(format!("Removed filter on {column}"));
            } else {
                self.set_status_message(format!("Filter {column}={value}"));
            }
            // Re-fetch at the current page; filter changes do not
            // jump back to page 1.
            self.fetch_current();
        }
    }

    fn copy_cell(&mut self) {
        let Some(cell) = self
            .rows
            .get(self.selected_row)
            .and_then(|row| row.get(self.selected_column))
            .cloned()
        else {
            return;
        };
        if self.clipboard.is_none() {
            self.clipboard = Clipboard::new().ok();
        }
        match self.clipboard.as_mut() {
            Some(clipboard) => match clipboard.set_text(cell) {
                Ok(_) => trace!("Copied cell content to clipboard."),
                Err(e) => trace!("Error copying to clipboard: {:?}", e),
            },
            None => trace!("Clipboard unavailable"),
        }
    }

    // -------------------- Upload ---------------------- //

    fn select_upload(&mut self, raw_path: &str) {
        let expanded = match shellexpand::full(raw_path) {
            Ok(p) => p.into_owned(),
            Err(e) => {
                self.set_status_message(format!("Bad path: {e}"));
                return;
            }
        };
        let path = PathBuf::from(expanded);
        let size = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                self.set_status_message(format!("Cannot read {}: {e}", path.display()));
                return;
            }
        };
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        let mime = declared_mime(&path);

        self.upload.select(UploadCandidate {
            path,
            file_name: file_name.clone(),
            mime,
            size,
        });
        match self.upload.validate() {
            Ok(()) => self.set_status_message(format!(
                "Ready to upload {file_name} ({size} bytes), press U to confirm"
            )),
            Err(reason) => self.set_status_message(format!("Invalid file: {reason}")),
        }
    }

    fn confirm_upload(&mut self) {
        if self.upload.is_uploading() {
            self.set_status_message("An upload is already in progress".to_string());
            return;
        }
        match self.upload.begin() {
            Some(candidate) => {
                debug!("Uploading {}", candidate.file_name);
                self.set_status_message(format!("Uploading {} ...", candidate.file_name));
                self.fetcher
                    .start_upload(candidate.path, candidate.file_name);
            }
            None => self.set_status_message("No validated file to upload".to_string()),
        }
    }

    fn upload_finished(&mut self, result: Result<FileEntry, RtvError>) {
        match result {
            Ok(entry) => {
                info!("Uploaded {} as id {}", entry.file_name, entry.id);
                self.upload.finish_ok();
                self.set_status_message(format!("Uploaded {}", entry.file_name));
                self.files.push(entry);
            }
            Err(e) => {
                error!("Upload failed: {e}");
                self.upload.finish_err();
                self.set_status_message(format!("Upload failed: {e} (press U to retry)"));
            }
        }
    }

    // -------------------- Input & popup ---------------------- //

    fn enter_input(&mut self, target: InputTarget) {
        trace!("Entering input mode for {target:?}");
        self.previous_modus = self.modus;
        self.modus = Modus::INPUT;
        self.input_target = Some(target);
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.handle_input();
        }
    }

    fn handle_input(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::INPUT;
        let Some(target) = self.input_target.take() else {
            return;
        };
        let result = self.last_input.clone();
        self.input.clear();
        if result.canceled {
            return;
        }
        match target {
            InputTarget::FilterValue(column) => self.apply_filter(column, result.input),
            // An empty path deselects any pending candidate.
            InputTarget::UploadPath if result.input.is_empty() => {
                self.upload.clear();
                self.set_status_message("Cleared pending upload".to_string());
            }
            InputTarget::UploadPath => self.select_upload(&result.input),
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: String) {
        debug!("Status: {message}");
        self.status_message = message;
        self.last_status_message_update = Instant::now();
    }

    // -------------------- View accessors ---------------------- //

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn selected_file(&self) -> usize {
        self.selected_file
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn headers(&self) -> &[String] {
        &self.table.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    pub fn selected_cell(&self) -> (usize, usize) {
        (self.selected_row, self.selected_column)
    }

    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    pub fn filters(&self) -> &FilterStore {
        &self.filters
    }

    pub fn loading(&self) -> bool {
        self.fetcher.loading()
    }

    pub fn uploading(&self) -> bool {
        self.upload.is_uploading()
    }

    pub fn input_line(&self) -> Option<(&'static str, &InputResult)> {
        let label = match self.input_target.as_ref()? {
            InputTarget::FilterValue(_) => "filter",
            InputTarget::UploadPath => "upload path",
        };
        Some((label, &self.last_input))
    }

    pub fn popup_message(&self) -> &str {
        &self.popup_message
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }
}
