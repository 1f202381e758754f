use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::{CMDMode, DVConfig};
use crate::model::{InsightState, Model, Status, UIData};
use crate::query::SortDirection;

pub const SEARCHLINE_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const TABLE_BORDER: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const INSIGHT_PANEL_RATIO: usize = 35; // percent of the screen width
pub const INSIGHT_PLACEHOLDERS: usize = 3;

pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(config: &DVConfig) -> Self {
        Self {
            max_column_width: config.max_column_width,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.uidata();

        let [search_area, main_area, status_area] = Layout::vertical([
            Constraint::Length(SEARCHLINE_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        let [table_area, panel_area] = Layout::horizontal([
            Constraint::Percentage(100 - INSIGHT_PANEL_RATIO as u16),
            Constraint::Percentage(INSIGHT_PANEL_RATIO as u16),
        ])
        .areas(main_area);

        self.draw_searchline(&uidata, frame, search_area);
        if uidata.has_data {
            self.draw_table(&uidata, frame, table_area);
        } else {
            self.draw_welcome(&uidata, frame, table_area);
        }
        self.draw_insights(&uidata, frame, panel_area);
        self.draw_statusline(&uidata, frame, status_area);

        if let Some(message) = &uidata.popup_message {
            self.draw_popup(message, frame);
        }
    }

    fn draw_searchline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let prompt = match uidata.cmd_mode {
            Some(CMDMode::OpenFile) => Some("Open: "),
            Some(CMDMode::Search) => Some("Search: "),
            None => None,
        };
        let line = match prompt {
            Some(p) => {
                let cursor_x = area.x + (p.len() + uidata.cmdinput.curser_pos) as u16;
                frame.set_cursor_position(Position::new(cursor_x.min(area.right()), area.y));
                Line::from(vec![p.bold().yellow(), Span::raw(uidata.cmdinput.input.clone())])
            }
            None if uidata.has_data && !uidata.query.is_empty() => Line::from(vec![
                "Search: ".bold(),
                Span::raw(uidata.query.clone()),
            ]),
            None if uidata.has_data => Line::from("Press / to search the table".dark_gray()),
            None => Line::from("Press o to open a CSV file".dark_gray()),
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn draw_welcome(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(Line::from(" dv ".bold()).centered())
            .border_set(border::ROUNDED);
        let text = if uidata.status == Status::LOADING {
            Text::from(vec![Line::from(""), Line::from("Processing your data...".bold())])
        } else {
            Text::from(vec![
                Line::from(""),
                Line::from("Welcome to dv".bold()),
                Line::from(""),
                Line::from("Start by opening a CSV file to visualize your data."),
                Line::from("You can then sort, search, and generate AI-powered insights."),
                Line::from(""),
                Line::from(vec!["Press ".into(), "o".blue().bold(), " to open a file".into()]),
            ])
        };
        frame.render_widget(
            Paragraph::new(text)
                .centered()
                .wrap(Wrap { trim: true })
                .block(block),
            area,
        );
    }

    fn header_label(&self, name: &str, sort: Option<SortDirection>) -> String {
        let arrow = match sort {
            Some(SortDirection::Ascending) => " ▲",
            Some(SortDirection::Descending) => " ▼",
            None => "",
        };
        let budget = self.max_column_width.saturating_sub(arrow.chars().count());
        let mut label: String = name.chars().take(budget).collect();
        label.push_str(arrow);
        label
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut title = format!(" {} ", uidata.name);
        if uidata.status == Status::LOADING {
            title.push_str("(loading...) ");
        }
        let block = Block::bordered()
            .title(Line::from(title.bold()).left_aligned())
            .border_set(border::ROUNDED);

        let widths: Vec<Constraint> = uidata
            .headers
            .iter()
            .map(|h| Constraint::Length(h.width as u16))
            .collect();

        let header = Row::new(
            uidata
                .headers
                .iter()
                .map(|h| Cell::from(self.header_label(&h.name, h.sort))),
        )
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan));

        if uidata.nrows_view == 0 {
            let table = Table::new(
                vec![Row::new(vec![Cell::from("No results found.".italic())])],
                [Constraint::Fill(1)],
            )
            .header(header)
            .block(block);
            frame.render_widget(table, area);
            return;
        }

        let rows = uidata
            .rows
            .iter()
            .map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(1)
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .cell_highlight_style(Style::default().reversed());

        let mut state = TableState::default()
            .with_selected(Some(uidata.selected_row))
            .with_selected_column(Some(uidata.selected_column));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_insights(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(Line::from(" ✦ Data Insights ".bold()).left_aligned())
            .border_set(border::ROUNDED);

        let mut lines: Vec<Line> = Vec::new();
        match &uidata.insights {
            InsightState::Idle => {
                lines.push(Line::from("Generate AI-powered insights from your data.".dark_gray()));
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    "Press ".into(),
                    "i".blue().bold(),
                    " to generate insights".into(),
                ]));
            }
            InsightState::Pending => {
                lines.push(Line::from("Generating...".yellow().bold()));
                for _ in 0..INSIGHT_PLACEHOLDERS {
                    lines.push(Line::from(""));
                    lines.push(Line::from("░".repeat(area.width.saturating_sub(4) as usize).dark_gray()));
                }
            }
            InsightState::Ready(insights) => {
                for insight in insights {
                    lines.push(Line::from(vec!["• ".cyan().bold(), Span::raw(insight.clone())]));
                    lines.push(Line::from(""));
                }
            }
        }

        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .wrap(Wrap { trim: true })
                .block(block),
            area,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans: Vec<Span> = Vec::new();
        if uidata.has_data {
            spans.push(format!(" {} ", uidata.name).bold().blue());
            spans.push(Span::raw(format!(
                " row {}/{} ({} of {} shown) ",
                if uidata.nrows_view == 0 { 0 } else { uidata.abs_selected_row + 1 },
                uidata.nrows_view,
                uidata.nrows_view,
                uidata.nrows_total
            )));
        }
        if let Some(note) = &uidata.notification {
            let text = format!(" {}: {} ", note.title, note.message);
            spans.push(if note.is_error {
                text.white().on_red()
            } else {
                text.dark_gray()
            });
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let area = popup_area(frame.area(), 60, 70);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> to close ".dark_gray()).centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(message.to_string()).block(block), area);
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(area);
    area
}
