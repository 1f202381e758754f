use std::path::{Path, PathBuf};
use std::sync::Arc;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use rayon::prelude::*;
use tracing::{debug, error, info, trace, warn};

use crate::csv::{Row, format_row};
use crate::domain::{CMDMode, DVConfig, DVError, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::insights::InsightService;
use crate::query::{QueryEngine, SortDirection};
use crate::table::RowStore;
use crate::ui::{
    COLUMN_WIDTH_MARGIN, INSIGHT_PANEL_RATIO, SEARCHLINE_HEIGHT, STATUSLINE_HEIGHT,
    TABLE_BORDER, TABLE_HEADER_HEIGHT,
};
use crate::worker::{JobId, JobResult, Worker};

#[derive(Debug)]
enum FileType {
    CSV,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    LOADING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsightState {
    Idle,
    Pending,
    Ready(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
pub struct HeaderView {
    pub name: String,
    pub width: usize,
    pub sort: Option<SortDirection>,
}

/// Everything the UI needs for one frame.
pub struct UIData {
    pub name: String,
    pub status: Status,
    pub headers: Vec<HeaderView>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub nrows_view: usize,
    pub nrows_total: usize,
    pub has_data: bool,
    pub query: String,
    pub cmd_mode: Option<CMDMode>,
    pub cmdinput: InputResult,
    pub insights: InsightState,
    pub popup_message: Option<String>,
    pub notification: Option<Notification>,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let panel_width = ui_width * INSIGHT_PANEL_RATIO / 100;
        let table_width = ui_width.saturating_sub(panel_width + 2 * TABLE_BORDER);
        let table_height = ui_height.saturating_sub(
            SEARCHLINE_HEIGHT + STATUSLINE_HEIGHT + TABLE_HEADER_HEIGHT + 2 * TABLE_BORDER,
        );
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width,
            table_height: table_height.max(1),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: DVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    store: RowStore,
    engine: QueryEngine,
    column_widths: Vec<usize>,
    worker: Worker,
    insight_service: Arc<dyn InsightService>,
    pending_load: Option<JobId>,
    pending_insights: Option<JobId>,
    insights: InsightState,
    curser_row: usize, // index into the view
    curser_column: usize,
    offset_row: usize,
    offset_column: usize,
    uilayout: UILayout,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    popup_message: Option<String>,
    notification: Option<Notification>,
}

impl Model {
    pub fn init(
        config: &DVConfig,
        insight_service: Arc<dyn InsightService>,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, DVError> {
        let mut model = Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            store: RowStore::default(),
            engine: QueryEngine::default(),
            column_widths: Vec::new(),
            worker: Worker::default(),
            insight_service,
            pending_load: None,
            pending_insights: None,
            insights: InsightState::Idle,
            curser_row: 0,
            curser_column: 0,
            offset_row: 0,
            offset_column: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            popup_message: None,
            notification: None,
        };
        model.notify_info("Welcome", "Press o to open a CSV file, ? for help");
        Ok(model)
    }

    pub fn has_data(&self) -> bool {
        !self.store.is_empty()
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    // -------------------- Loading ---------------------- //

    fn detect_file_type(path: &Path) -> Result<FileType, DVError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            _ => Err(DVError::InvalidFileType),
        }
    }

    fn check_file(path: &Path) -> Result<FileType, DVError> {
        let file_type = Model::detect_file_type(path)?;
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DVError::FileNotFound,
            std::io::ErrorKind::PermissionDenied => DVError::PermissionDenied,
            _ => DVError::FileReadError(e),
        })?;
        if !metadata.is_file() {
            return Err(DVError::FileReadError(std::io::Error::other("not a file")));
        }
        Ok(file_type)
    }

    pub fn expand_path(raw: &str) -> PathBuf {
        match shellexpand::full(raw.trim()) {
            Ok(expanded) => PathBuf::from(expanded.into_owned()),
            Err(e) => {
                debug!("Could not expand {raw}: {e}");
                PathBuf::from(raw.trim())
            }
        }
    }

    /// Starts a background load. Returns false when the file was rejected
    /// up front, in which case nothing about the session changes.
    pub fn open_file(&mut self, path: PathBuf) -> bool {
        let file_type = match Model::check_file(&path) {
            Ok(t) => t,
            Err(e) => {
                warn!("Rejected {}: {e}", path.display());
                let title = match e {
                    DVError::InvalidFileType => "Invalid File Type",
                    _ => "File Read Error",
                };
                self.notify_error(title, &e);
                return false;
            }
        };
        info!("Loading {:?} file {}", file_type, path.display());

        self.apply_query("");
        self.insights = InsightState::Idle;
        self.pending_insights = None;
        self.status = Status::LOADING;
        self.pending_load = Some(self.worker.spawn_load(path));
        self.notify_info("Loading", "Processing your data...");
        true
    }

    fn compute_column_widths(&mut self) {
        let rows = self.store.rows();
        let max_width = self.config.max_column_width;
        self.column_widths = self
            .store
            .headers()
            .par_iter()
            .enumerate()
            .map(|(idx, name)| {
                let data_width = rows
                    .iter()
                    .filter_map(|r| r.get(idx))
                    .map(|v| v.to_string().chars().count())
                    .max()
                    .unwrap_or(0);
                let width = std::cmp::max(name.chars().count() + 2, data_width);
                std::cmp::min(width + COLUMN_WIDTH_MARGIN, max_width).max(3)
            })
            .collect();
    }

    pub fn poll_background(&mut self) {
        while let Some(result) = self.worker.try_recv() {
            self.handle_job_result(result);
        }
    }

    fn handle_job_result(&mut self, result: JobResult) {
        match result {
            JobResult::Loaded {
                job,
                path,
                result,
                duration_ms,
            } => {
                if self.pending_load != Some(job) {
                    debug!("Dropping stale load result {job}");
                    return;
                }
                self.pending_load = None;
                match result {
                    Ok(parsed) => {
                        let nrows = parsed.rows.len();
                        self.store = RowStore::new(path, parsed);
                        self.pending_insights = None;
                        self.insights = InsightState::Idle;
                        self.engine.reset(self.store.rows(), self.store.ncols());
                        self.compute_column_widths();
                        self.curser_row = 0;
                        self.curser_column = 0;
                        self.offset_row = 0;
                        self.offset_column = 0;
                        self.status = if self.has_data() {
                            Status::READY
                        } else {
                            Status::EMPTY
                        };
                        self.notify_info(
                            "Loaded",
                            &format!("{} rows from {} in {}ms", nrows, self.store.name(), duration_ms),
                        );
                    }
                    Err(e) => {
                        error!("Loading {} failed: {e}", path.display());
                        self.status = if self.has_data() {
                            Status::READY
                        } else {
                            Status::EMPTY
                        };
                        let title = match e {
                            DVError::ParseError(_) => "Parsing Error",
                            _ => "File Read Error",
                        };
                        self.notify_error(title, &e);
                    }
                }
            }
            JobResult::Insights { job, result } => {
                if self.pending_insights != Some(job) {
                    debug!("Dropping stale insight result {job}");
                    return;
                }
                self.pending_insights = None;
                match result {
                    Ok(insights) => {
                        self.notify_info("Insights", &format!("{} insights generated", insights.len()));
                        self.insights = InsightState::Ready(insights);
                    }
                    Err(e) => {
                        error!("Generating insights failed: {e}");
                        self.insights = InsightState::Idle;
                        self.notify_error("AI Error", &e);
                    }
                }
            }
        }
    }

    pub fn generate_insights(&mut self) {
        if !self.has_data() {
            self.notify_info("Insights", "Load a CSV file first");
            return;
        }
        if self.status == Status::LOADING {
            self.notify_info("Insights", "Wait for the file to finish loading");
            return;
        }
        if self.pending_insights.is_some() {
            trace!("Insight request already in flight");
            return;
        }
        self.insights = InsightState::Pending;
        self.pending_insights = Some(self.worker.spawn_insights(
            Arc::clone(&self.insight_service),
            Arc::clone(self.store.headers()),
            Arc::clone(self.store.rows()),
        ));
    }

    // -------------------- Notifications ---------------------- //

    fn notify_info(&mut self, title: &str, message: &str) {
        self.notification = Some(Notification {
            title: title.to_string(),
            message: message.to_string(),
            is_error: false,
        });
    }

    fn notify_error(&mut self, title: &str, err: &DVError) {
        self.notification = Some(Notification {
            title: title.to_string(),
            message: err.to_string(),
            is_error: true,
        });
    }

    // -------------------- Update loop ---------------------- //

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DVError> {
        self.poll_background();

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::MovePageUp => self.move_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => {
                        self.move_selection_down(self.uilayout.table_height)
                    }
                    Message::MoveBeginning => self.move_selection_up(usize::MAX),
                    Message::MoveEnd => self.move_selection_down(usize::MAX),
                    Message::MoveToFirstColumn => self.select_column(0),
                    Message::MoveToLastColumn => {
                        self.select_column(self.store.ncols().saturating_sub(1))
                    }
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::OpenFile => self.enter_cmd_mode(CMDMode::OpenFile),
                    Message::Search => {
                        if self.has_data() {
                            self.enter_cmd_mode(CMDMode::Search)
                        }
                    }
                    Message::Sort => self.sort_current_column(),
                    Message::GenerateInsights => self.generate_insights(),
                    Message::CopyCell => self.copy_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_help(),
                    Message::Exit | Message::RawKey(_) => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }
        Ok(())
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.scroll_into_view();
    }

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
            self.popup_message = None;
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = Some(HELP_TEXT.to_string());
    }

    // -------------------- Command input ---------------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.clear();
        if mode == CMDMode::Search {
            for c in self.engine.query().to_string().chars() {
                self.input.read(KeyEvent::from(
                    ratatui::crossterm::event::KeyCode::Char(c),
                ));
            }
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.cmd_mode == Some(CMDMode::Search) {
            let query = self.last_input.input.clone();
            if query != self.engine.query() {
                self.apply_query(&query);
            }
        }
        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_input = self.last_input.input.clone();
        match self.cmd_mode {
            Some(CMDMode::OpenFile) => {
                if !self.last_input.canceled && !cmd_input.trim().is_empty() {
                    self.open_file(Model::expand_path(&cmd_input));
                }
            }
            Some(CMDMode::Search) => {
                // escape clears the query, the live filter already holds the rest
                if self.last_input.canceled {
                    self.apply_query("");
                }
            }
            None => info!("Cmd mode is none!"),
        }
        self.cmd_mode = None;
    }

    // -------------------- Query ---------------------- //

    fn apply_query(&mut self, query: &str) {
        self.engine.set_query(self.store.rows(), query);
        self.curser_row = 0;
        self.offset_row = 0;
    }

    fn sort_current_column(&mut self) {
        if !self.has_data() {
            return;
        }
        let sort = self.engine.toggle_sort(self.store.rows(), self.curser_column);
        let direction = match sort.direction {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        };
        let name = self.store.headers()[sort.column].clone();
        self.notify_info("Sorted", &format!("by {name} {direction}"));
        self.curser_row = 0;
        self.offset_row = 0;
    }

    // -------------------- Clipboard ---------------------- //

    fn selected_data_row(&self) -> Option<&Row> {
        let idx = *self.engine.view().get(self.curser_row)?;
        self.store.rows().get(idx)
    }

    fn copy_to_clipboard(&mut self, content: String, what: &str) {
        match Clipboard::new().and_then(|mut c| c.set_text(content)) {
            Ok(_) => self.notify_info("Copied", &format!("{what} copied to clipboard")),
            Err(e) => {
                warn!("Error copying to clipboard: {:?}", e);
                self.notify_error(
                    "Clipboard",
                    &DVError::IoError(std::io::Error::other(e.to_string())),
                );
            }
        }
    }

    fn copy_cell(&mut self) {
        let cell = self
            .selected_data_row()
            .and_then(|r| r.get(self.curser_column))
            .map(|v| v.to_string());
        if let Some(cell) = cell {
            trace!("Cell content: {}", cell);
            self.copy_to_clipboard(cell, "Cell");
        }
    }

    fn copy_row(&mut self) {
        if let Some(row) = self.selected_data_row().map(|r| format_row(r)) {
            self.copy_to_clipboard(row, "Row");
        }
    }

    // -------------------- Navigation ---------------------- //

    fn visible_columns(&self) -> Vec<usize> {
        let mut visible = Vec::new();
        let mut used = 0;
        for (idx, &width) in self.column_widths.iter().enumerate().skip(self.offset_column) {
            if used + width + 1 > self.uilayout.table_width && !visible.is_empty() {
                break;
            }
            visible.push(idx);
            used += width + 1;
        }
        visible
    }

    fn scroll_into_view(&mut self) {
        let nrows = self.engine.view().len();
        self.curser_row = std::cmp::min(self.curser_row, nrows.saturating_sub(1));
        let height = self.uilayout.table_height;
        if self.curser_row < self.offset_row {
            self.offset_row = self.curser_row;
        } else if self.curser_row >= self.offset_row + height {
            self.offset_row = self.curser_row + 1 - height;
        }

        self.curser_column = std::cmp::min(self.curser_column, self.store.ncols().saturating_sub(1));
        if self.curser_column < self.offset_column {
            self.offset_column = self.curser_column;
        }
        while self.offset_column < self.curser_column
            && !self.visible_columns().contains(&self.curser_column)
        {
            self.offset_column += 1;
        }
    }

    fn move_selection_up(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_sub(size);
        self.scroll_into_view();
    }

    fn move_selection_down(&mut self, size: usize) {
        self.curser_row = self.curser_row.saturating_add(size);
        self.scroll_into_view();
    }

    fn move_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        self.scroll_into_view();
    }

    fn move_selection_right(&mut self) {
        self.curser_column += 1;
        self.scroll_into_view();
    }

    fn select_column(&mut self, column: usize) {
        self.curser_column = column;
        self.scroll_into_view();
    }

    // -------------------- UI data ---------------------- //

    pub fn uidata(&self) -> UIData {
        let visible = self.visible_columns();
        let headers_all = self.store.headers();
        let sort = self.engine.sort();
        let headers = visible
            .iter()
            .map(|&c| HeaderView {
                name: headers_all[c].clone(),
                width: self.column_widths[c],
                sort: sort.filter(|s| s.column == c).map(|s| s.direction),
            })
            .collect();

        let view = self.engine.view();
        let rbegin = std::cmp::min(self.offset_row, view.len());
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, view.len());
        let data = self.store.rows();
        let rows = view[rbegin..rend]
            .iter()
            .map(|&ridx| {
                visible
                    .iter()
                    .map(|&c| data[ridx].get(c).map(|v| v.to_string()).unwrap_or_default())
                    .collect()
            })
            .collect();

        UIData {
            name: self.store.name(),
            status: self.status,
            headers,
            rows,
            selected_row: self.curser_row.saturating_sub(self.offset_row),
            selected_column: self.curser_column.saturating_sub(self.offset_column),
            abs_selected_row: self.curser_row,
            nrows_view: view.len(),
            nrows_total: data.len(),
            has_data: self.has_data(),
            query: self.engine.query().to_string(),
            cmd_mode: self.cmd_mode,
            cmdinput: self.last_input.clone(),
            insights: self.insights.clone(),
            popup_message: self.popup_message.clone(),
            notification: self.notification.clone(),
        }
    }
}

#[cfg(test)]
impl Model {
    fn wait_background(&mut self) {
        if let Some(result) = self.worker.recv_timeout(std::time::Duration::from_secs(5)) {
            self.handle_job_result(result);
        }
    }

    fn set_search(&mut self, query: &str) {
        self.apply_query(query);
    }

    fn view_rows(&self) -> Vec<&Row> {
        let rows = self.store.rows();
        self.engine.view().iter().map(|&i| &rows[i]).collect()
    }

    fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::Value;
    use crate::query::SortState;
    use crate::insights::tests::FakeService;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn model_with(service: FakeService) -> Model {
        model_sharing(Arc::new(service))
    }

    fn model_sharing(service: Arc<FakeService>) -> Model {
        Model::init(&DVConfig::default(), service, 120, 40).unwrap()
    }

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    fn loaded(content: &str) -> (Model, NamedTempFile) {
        let file = csv_file(content);
        let mut model = model_with(FakeService::answering(&["Two rows", "Column b is mixed"]));
        assert!(model.open_file(file.path().to_path_buf()));
        model.wait_background();
        (model, file)
    }

    fn key(model: &mut Model, code: KeyCode) {
        model
            .update(Some(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))))
            .unwrap();
    }

    fn first_column(model: &Model) -> Vec<Value> {
        model.view_rows().iter().map(|r| r[0].clone()).collect()
    }

    #[test]
    fn loads_file_and_defaults_sort() {
        let (model, _file) = loaded("a,b\n3,x\n1,2\n");
        assert_eq!(model.status, Status::READY);
        assert_eq!(model.engine.sort(), Some(SortState::ascending(0)));
        assert_eq!(first_column(&model), vec![Value::Number(1.0), Value::Number(3.0)]);
        let ui = model.uidata();
        assert_eq!(ui.headers[0].sort, Some(SortDirection::Ascending));
        assert_eq!(ui.rows[0], vec!["1", "2"]);
    }

    #[test]
    fn non_csv_file_is_rejected_without_state_change() {
        let (mut model, _file) = loaded("a,b\n1,2\n3,x\n");
        let mut other = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(other, "a,b\n9,9\n").unwrap();

        assert!(!model.open_file(other.path().to_path_buf()));
        assert_eq!(model.status, Status::READY);
        assert!(model.pending_load.is_none());
        assert_eq!(model.view_rows().len(), 2);
        let note = model.notification().unwrap();
        assert!(note.is_error);
        assert_eq!(note.title, "Invalid File Type");
    }

    #[test]
    fn missing_file_is_reported() {
        let mut model = model_with(FakeService::answering(&["x"]));
        assert!(!model.open_file("/no/such/file.csv".into()));
        assert_eq!(model.status, Status::EMPTY);
        assert!(model.notification().unwrap().is_error);
    }

    #[test]
    fn parse_failure_keeps_previous_data() {
        let (mut model, _file) = loaded("a,b\n1,2\n");
        let broken = csv_file(" , \n1,2\n");
        assert!(model.open_file(broken.path().to_path_buf()));
        assert_eq!(model.status, Status::LOADING);
        model.wait_background();
        assert_eq!(model.status, Status::READY);
        assert_eq!(model.view_rows().len(), 1);
        assert_eq!(model.notification().unwrap().title, "Parsing Error");
    }

    #[test]
    fn stale_load_results_are_dropped() {
        let first = csv_file("a\n1\n");
        let second = csv_file("b\n2\n3\n");
        let mut model = model_with(FakeService::answering(&["x"]));
        model.open_file(first.path().to_path_buf());
        model.open_file(second.path().to_path_buf());
        model.wait_background();
        model.wait_background();
        assert_eq!(model.store.headers().as_slice(), ["b"]);
        assert_eq!(model.view_rows().len(), 2);
    }

    #[test]
    fn search_filters_live_and_escape_clears() {
        let (mut model, _file) = loaded("a,b\n1,2\n3,x\n");
        model.update(Some(Message::Search)).unwrap();
        assert!(model.raw_keyevents());
        key(&mut model, KeyCode::Char('X'));
        assert_eq!(first_column(&model), vec![Value::Number(3.0)]);
        key(&mut model, KeyCode::Enter);
        assert!(!model.raw_keyevents());
        assert_eq!(model.uidata().query, "X");

        model.update(Some(Message::Search)).unwrap();
        key(&mut model, KeyCode::Esc);
        assert_eq!(model.view_rows().len(), 2);
    }

    #[test]
    fn search_is_inactive_without_data() {
        let mut model = model_with(FakeService::answering(&["x"]));
        model.update(Some(Message::Search)).unwrap();
        assert!(!model.raw_keyevents());
    }

    #[test]
    fn sort_toggles_on_selected_column() {
        let (mut model, _file) = loaded("a,b\n1,2\n3,x\n");
        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(first_column(&model), vec![Value::Number(3.0), Value::Number(1.0)]);
        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(first_column(&model), vec![Value::Number(1.0), Value::Number(3.0)]);

        model.update(Some(Message::MoveRight)).unwrap();
        model.update(Some(Message::Sort)).unwrap();
        assert_eq!(
            model.engine.sort(),
            Some(SortState::ascending(1))
        );
    }

    #[test]
    fn insights_are_generated_from_full_table() {
        let service = Arc::new(FakeService::answering(&["Two rows", "Column b is mixed"]));
        let file = csv_file("a,b\n1,2\n3,x\n");
        let mut model = model_sharing(service.clone());
        assert!(model.open_file(file.path().to_path_buf()));
        model.wait_background();
        model.set_search("x");
        assert_eq!(model.view_rows().len(), 1);
        model.update(Some(Message::GenerateInsights)).unwrap();
        assert_eq!(model.insights, InsightState::Pending);
        model.wait_background();
        assert_eq!(
            model.insights,
            InsightState::Ready(vec!["Two rows".into(), "Column b is mixed".into()])
        );
        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].csv_data, "a,b\n1,2\n3,x");
    }

    #[test]
    fn insights_from_previous_file_are_discarded() {
        let service = Arc::new(
            FakeService::answering(&["about the old file"]).slow(Duration::from_millis(300)),
        );
        let old = csv_file("old_col\n1\n");
        let new = csv_file("new_col\n2\n");
        let mut model = model_sharing(service.clone());
        assert!(model.open_file(old.path().to_path_buf()));
        model.wait_background();

        model.generate_insights();
        assert_eq!(model.insights, InsightState::Pending);
        assert!(model.open_file(new.path().to_path_buf()));
        assert_eq!(model.insights, InsightState::Idle);

        // rejected while the new file is still loading
        model.generate_insights();
        assert!(model.pending_insights.is_none());
        assert_eq!(model.insights, InsightState::Idle);

        // the new load and the stale insight job both report back
        model.wait_background();
        model.wait_background();
        assert_eq!(model.store.headers().as_slice(), ["new_col"]);
        assert_eq!(model.insights, InsightState::Idle);
        assert_eq!(service.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_insights_show_error_and_no_cards() {
        let file = csv_file("a\n1\n");
        let mut model = model_with(FakeService::answering(&[]));
        model.open_file(file.path().to_path_buf());
        model.wait_background();
        model.generate_insights();
        model.wait_background();
        assert_eq!(model.insights, InsightState::Idle);
        let note = model.notification().unwrap();
        assert!(note.is_error);
        assert!(note.message.contains("No insights"));
    }

    #[test]
    fn insights_need_data() {
        let mut model = model_with(FakeService::answering(&["x"]));
        model.generate_insights();
        assert_eq!(model.insights, InsightState::Idle);
        assert!(model.pending_insights.is_none());
    }

    #[test]
    fn navigation_scrolls_the_window() {
        let content: String = std::iter::once("n".to_string())
            .chain((0..200).map(|i| i.to_string()))
            .collect::<Vec<_>>()
            .join("\n");
        let (mut model, _file) = loaded(&content);
        model.update(Some(Message::MoveEnd)).unwrap();
        let ui = model.uidata();
        assert_eq!(ui.abs_selected_row, 199);
        assert_eq!(ui.rows.last().unwrap()[0], "199");
        assert_eq!(ui.selected_row, ui.rows.len() - 1);
        model.update(Some(Message::MoveBeginning)).unwrap();
        assert_eq!(model.uidata().rows[0][0], "0");
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = model_with(FakeService::answering(&["x"]));
        model.update(Some(Message::Help)).unwrap();
        assert!(model.uidata().popup_message.is_some());
        model.update(Some(Message::Exit)).unwrap();
        assert!(model.uidata().popup_message.is_none());
    }

    #[test]
    fn empty_view_still_renders_headers() {
        let (mut model, _file) = loaded("a,b\n1,2\n");
        model.set_search("nothing matches");
        let ui = model.uidata();
        assert_eq!(ui.nrows_view, 0);
        assert!(ui.rows.is_empty());
        assert_eq!(ui.headers.len(), 2);
    }
}
