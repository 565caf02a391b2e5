use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{Message, UDError, ViewerConfig};
use crate::inputter::{InputResult, Inputter};
use crate::record::UserRecord;
use crate::source::LoadResult;
use crate::table::{ColumnDescriptor, ColumnId, Field, SortSpec, TableState, VisibleWindow, column};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    Running,
    Quitting,
}

/// Where the record set is in its fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// First load, nothing to show yet.
    Loading,
    /// Reload while the previous record set stays on screen.
    Refreshing,
    Ready,
    Failed(String),
}

impl LoadStatus {
    pub fn in_flight(&self) -> bool {
        matches!(self, LoadStatus::Loading | LoadStatus::Refreshing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    Popup,
    CmdInput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Popup {
    Help,
    Details(UserRecord),
}

/// Everything the UI needs to draw one frame.
pub struct UIData {
    pub columns: Vec<&'static ColumnDescriptor>,
    pub window: VisibleWindow,
    pub total_users: usize,
    pub selected_row: usize,
    pub sort: Option<SortSpec>,
    pub filter_text: String,
    pub load: LoadStatus,
    pub popup: Option<Popup>,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub max_column_width: usize,
    pub last_update: Instant,
}

pub struct Model {
    config: ViewerConfig,
    pub status: Status,
    modus: Modus,
    records: Vec<UserRecord>,
    state: TableState,
    window: VisibleWindow,
    load: LoadStatus,
    fetch_requested: bool,
    selected_row: usize,
    popup: Option<Popup>,
    clipboard: Option<Clipboard>,
    input: Inputter,
    last_input: InputResult,
    filter_before_edit: String,
    status_message: String,
    uidata: UIData,
}

impl Model {
    /// A model waiting for its first load. The caller picks up the request with
    /// [`Model::take_fetch_request`].
    pub fn init(config: &ViewerConfig) -> Self {
        let state = TableState::new(config.page_size);
        let mut model = Self {
            config: config.clone(),
            status: Status::Running,
            modus: Modus::Table,
            records: Vec::new(),
            window: state.derive_window(&[]),
            state,
            load: LoadStatus::Loading,
            fetch_requested: true,
            selected_row: 0,
            popup: None,
            clipboard: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            filter_before_edit: String::new(),
            status_message: "Loading ...".to_string(),
            uidata: UIData {
                columns: Vec::new(),
                window: VisibleWindow::default(),
                total_users: 0,
                selected_row: 0,
                sort: None,
                filter_text: String::new(),
                load: LoadStatus::Loading,
                popup: None,
                cmdinput: InputResult::default(),
                active_cmdinput: false,
                status_message: String::new(),
                max_column_width: config.max_column_width,
                last_update: Instant::now(),
            },
        };
        model.update_uidata();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn table_state(&self) -> &TableState {
        &self.state
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.load
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CmdInput
    }

    /// Returns true once per requested fetch.
    pub fn take_fetch_request(&mut self) -> bool {
        std::mem::take(&mut self.fetch_requested)
    }

    pub fn selected_record(&self) -> Option<&UserRecord> {
        self.window.rows.get(self.selected_row)
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), UDError> {
        let Some(msg) = message else {
            return Ok(());
        };

        match (self.modus, msg) {
            (_, Message::Loaded(result)) => self.loaded(result),
            (_, Message::Quit) => self.quit(),
            (_, Message::Resize(width, height)) => trace!("UI was resized to {width}x{height}"),
            (Modus::CmdInput, Message::RawKey(key)) => self.raw_input(key),
            (Modus::Popup, Message::Exit) => self.close_popup(),
            (Modus::Table, msg) => match msg {
                Message::MoveDown => self.move_selection(1),
                Message::MoveUp => self.move_selection(-1),
                Message::NextPage => {
                    if !self.state.next_page(&self.records) {
                        trace!("Already on the last page");
                    }
                }
                Message::PreviousPage => {
                    if !self.state.previous_page() {
                        trace!("Already on the first page");
                    }
                }
                Message::FirstPage => self.state.set_page_index(&self.records, 0),
                Message::LastPage => self.state.last_page(&self.records),
                Message::SortByName => self.state.set_sort(Field::Name),
                Message::SortById => self.state.set_sort(Field::Id),
                Message::Filter => self.enter_cmd_mode(),
                Message::ResetFilters => {
                    self.state.reset_filters();
                    self.set_status_message("Filters cleared");
                }
                Message::ToggleColumn(id) => self.toggle_column(id),
                Message::Retry => self.retry(),
                Message::CopyId => self.copy_id(),
                Message::Details => self.show_details(),
                Message::Edit => self.edit(),
                Message::ToggleStatus => self.toggle_status(),
                Message::Help => self.show_popup(Popup::Help),
                _ => (),
            },
            (modus, msg) => trace!("Ignoring {msg:?} in {modus:?}"),
        }

        self.refresh();
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn loaded(&mut self, result: LoadResult) {
        match result {
            Ok(records) => {
                info!("Received {} users", records.len());
                self.records = records;
                self.state.clamp(&self.records);
                self.load = LoadStatus::Ready;
                let n = self.records.len();
                self.set_status_message(format!("Loaded {n} users"));
            }
            Err(e) => {
                error!("Loading users failed: {e}");
                self.load = LoadStatus::Failed(e.to_string());
                self.set_status_message("Error loading data, press r to retry");
            }
        }
    }

    fn retry(&mut self) {
        if self.load.in_flight() {
            debug!("Load already in flight, ignoring retry");
            return;
        }
        self.load = if self.records.is_empty() {
            LoadStatus::Loading
        } else {
            LoadStatus::Refreshing
        };
        self.fetch_requested = true;
        self.set_status_message("Loading ...");
    }

    fn move_selection(&mut self, step: isize) {
        let rows = self.window.rows.len();
        if rows == 0 {
            return;
        }
        self.selected_row = self.selected_row.saturating_add_signed(step).min(rows - 1);
    }

    fn toggle_column(&mut self, id: ColumnId) {
        if self.state.toggle_column_visibility(id) {
            let visible = if self.state.is_visible(id) { "shown" } else { "hidden" };
            self.set_status_message(format!("Column {} {visible}", column(id).header));
        } else {
            self.set_status_message("The actions column can not be hidden");
        }
    }

    fn copy_id(&mut self) {
        let Some(id) = self.selected_record().map(|r| r.id) else {
            self.set_status_message("No user selected");
            return;
        };
        if self.clipboard.is_none() {
            self.clipboard = Clipboard::new()
                .inspect_err(|e| warn!("Clipboard unavailable: {e:?}"))
                .ok();
        }
        let copied = self
            .clipboard
            .as_mut()
            .map(|c| c.set_text(id.to_string()));
        match copied {
            Some(Ok(_)) => self.set_status_message(format!("Copied user id {id}")),
            Some(Err(e)) => {
                trace!("Error copying to clipboard: {e:?}");
                self.set_status_message(format!("Could not copy user id {id}"));
            }
            None => self.set_status_message("Clipboard unavailable"),
        }
    }

    fn show_details(&mut self) {
        match self.selected_record().cloned() {
            Some(record) => self.show_popup(Popup::Details(record)),
            None => self.set_status_message("No user selected"),
        }
    }

    fn edit(&mut self) {
        if let Some(name) = self.selected_record().map(|r| r.name.clone()) {
            self.set_status_message(format!("Edit {name}: the directory is read-only"));
        }
    }

    // Only reports the intent, there is no write path.
    fn toggle_status(&mut self) {
        if let Some(r) = self.selected_record() {
            let message = format!(
                "{} {}: the directory is read-only, status stays {}",
                r.status.toggle_label(),
                r.name,
                r.status
            );
            info!("Status change requested for user {} ({} -> {})", r.id, r.status, r.status.toggled());
            self.set_status_message(message);
        }
    }

    fn show_popup(&mut self, popup: Popup) {
        self.popup = Some(popup);
        self.modus = Modus::Popup;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.popup = None;
        self.modus = Modus::Table;
    }

    fn enter_cmd_mode(&mut self) {
        trace!("Entering filter input ...");
        self.modus = Modus::CmdInput;
        self.filter_before_edit = self.state.filter_text().to_string();
        self.input.set(self.state.filter_text());
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        let text = if self.last_input.canceled {
            self.filter_before_edit.clone()
        } else {
            self.last_input.input.clone()
        };
        if text != self.state.filter_text() {
            self.state.set_filter_text(text);
        }
        if self.last_input.finished {
            self.modus = Modus::Table;
            self.input.clear();
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    /// Recomputes the visible window from scratch and publishes it.
    fn refresh(&mut self) {
        self.window = self.state.derive_window(&self.records);
        if self.selected_row >= self.window.rows.len() {
            self.selected_row = self.window.rows.len().saturating_sub(1);
        }
        self.update_uidata();
    }

    fn update_uidata(&mut self) {
        self.uidata = UIData {
            columns: self.state.visible_columns(),
            window: self.window.clone(),
            total_users: self.records.len(),
            selected_row: self.selected_row,
            sort: self.state.sort(),
            filter_text: self.state.filter_text().to_string(),
            load: self.load.clone(),
            popup: self.popup.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.modus == Modus::CmdInput,
            status_message: self.status_message.clone(),
            max_column_width: self.config.max_column_width,
            last_update: Instant::now(),
        };
    }
}
