use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState as RowSelection, Wrap},
};

use crate::domain::HELP_TEXT;
use crate::model::{LoadStatus, Popup, UIData};
use crate::record::{Status, UserRecord};
use crate::table::{CellKind, ColumnDescriptor, ColumnId, SortDirection};

pub const TITLE_HEIGHT: u16 = 1;
pub const FOOTER_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGHT: u16 = 1;
pub const SKELETON_ROWS: usize = 5;
const ACTIONS_WIDTH: u16 = 3;

#[derive(Default)]
pub struct TableUI {
    selection: RowSelection,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, uidata: &UIData, frame: &mut Frame) {
        let [title, body, footer, cmdline] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(FOOTER_HEIGHT),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        frame.render_widget(Self::title(uidata), title);
        self.draw_body(uidata, frame, body);
        frame.render_widget(Self::footer(uidata), footer);
        Self::draw_cmdline(uidata, frame, cmdline);

        if let Some(popup) = &uidata.popup {
            Self::draw_popup(popup, frame);
        }
    }

    fn title(uidata: &UIData) -> Line<'static> {
        let mut spans = vec![" User Management ".bold()];
        if uidata.load == LoadStatus::Refreshing {
            spans.push(" refreshing ...".dim());
        }
        if !uidata.filter_text.is_empty() {
            spans.push(format!("  name contains {:?}", uidata.filter_text).yellow());
        }
        Line::from(spans)
    }

    fn header_label(column: &ColumnDescriptor, uidata: &UIData) -> String {
        let arrow = match (column.field, uidata.sort) {
            (Some(field), Some(spec)) if spec.field == field => match spec.direction {
                SortDirection::Ascending => " ▲",
                SortDirection::Descending => " ▼",
            },
            _ if column.sortable => " ⇅",
            _ => "",
        };
        format!("{}{arrow}", column.header)
    }

    fn column_width(column: &ColumnDescriptor, uidata: &UIData) -> Constraint {
        match column.cell {
            CellKind::Menu => Constraint::Length(ACTIONS_WIDTH),
            CellKind::Badge => Constraint::Length(12),
            CellKind::Monospace => Constraint::Length(16),
            CellKind::Truncated => Constraint::Max(uidata.max_column_width as u16),
            CellKind::Text => Constraint::Fill(1),
        }
    }

    fn truncate(value: &str, width: usize) -> String {
        if value.chars().count() <= width || width < 2 {
            return value.to_string();
        }
        let mut reduced: String = value.chars().take(width - 1).collect();
        reduced.push('…');
        reduced
    }

    // Rendering is keyed by column id, the engine only knows descriptors.
    fn cell(column: &ColumnDescriptor, record: &UserRecord, uidata: &UIData) -> Cell<'static> {
        match column.id {
            ColumnId::Name => Cell::from(record.name.clone()).bold(),
            ColumnId::Email => {
                Cell::from(Self::truncate(&record.email.to_lowercase(), uidata.max_column_width))
            }
            ColumnId::Mobile => Cell::from(record.mobile.clone()),
            ColumnId::Status => match record.status {
                Status::Active => Cell::from(Line::from(vec!["● ".green(), "Active".into()])),
                Status::Inactive => Cell::from(Line::from(vec!["● ".red(), "Inactive".into()])),
            },
            ColumnId::Actions => Cell::from("⋯"),
        }
    }

    fn draw_body(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(
            uidata
                .columns
                .iter()
                .map(|c| Cell::from(Self::header_label(c, uidata)))
                .collect::<Vec<_>>(),
        )
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Gray));
        let widths = uidata
            .columns
            .iter()
            .map(|c| Self::column_width(c, uidata))
            .collect::<Vec<_>>();
        let block = Block::bordered();

        let rows: Vec<Row> = match &uidata.load {
            LoadStatus::Loading => (0..SKELETON_ROWS)
                .map(|_| {
                    Row::new(uidata.columns.iter().map(|_| Cell::from("░░░░░░░░").dim()))
                })
                .collect(),
            LoadStatus::Failed(message) => {
                let text = Text::from(vec![
                    Line::from("Error loading data".red()),
                    Line::from(message.clone().dim()),
                    Line::from("press r to retry"),
                ]);
                frame.render_widget(Self::centered(text, block), area);
                return;
            }
            _ if uidata.window.rows.is_empty() => {
                let text = Text::from(vec![
                    Line::from("No users found".gray()),
                    Line::from("press x to clear filters"),
                ]);
                frame.render_widget(Self::centered(text, block), area);
                return;
            }
            _ => uidata
                .window
                .rows
                .iter()
                .map(|r| {
                    Row::new(
                        uidata
                            .columns
                            .iter()
                            .map(|c| Self::cell(c, r, uidata))
                            .collect::<Vec<_>>(),
                    )
                })
                .collect(),
        };

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(2)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        if uidata.load == LoadStatus::Loading {
            self.selection.select(None);
        } else {
            self.selection.select(Some(uidata.selected_row));
        }
        frame.render_stateful_widget(table, area, &mut self.selection);
    }

    fn centered<'a>(text: Text<'a>, block: Block<'a>) -> Paragraph<'a> {
        Paragraph::new(text).centered().block(block)
    }

    fn footer(uidata: &UIData) -> Line<'static> {
        let window = &uidata.window;
        let nav = |label: &'static str, enabled: bool| -> Span<'static> {
            if enabled { label.bold() } else { label.dark_gray() }
        };
        Line::from(vec![
            " Showing ".into(),
            window.total_matching.to_string().bold(),
            " of ".into(),
            uidata.total_users.to_string().bold(),
            " users   ".into(),
            nav("◀ Previous", window.can_previous()),
            format!("  Page {} of {}  ", window.page_index + 1, window.total_pages).into(),
            nav("Next ▶", window.can_next()),
        ])
    }

    fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = "Search users by name: ";
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    prompt.blue().bold(),
                    uidata.cmdinput.input.clone().into(),
                ])),
                area,
            );
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.cursor_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        } else {
            let hint = " ? help ";
            let [message, help] =
                Layout::horizontal([Constraint::Min(0), Constraint::Length(hint.len() as u16)])
                    .areas(area);
            frame.render_widget(Paragraph::new(uidata.status_message.clone().italic()), message);
            frame.render_widget(Paragraph::new(hint.dark_gray()), help);
        }
    }

    fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
        let [area] = Layout::horizontal([Constraint::Length(width)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        area
    }

    fn draw_popup(popup: &Popup, frame: &mut Frame) {
        let (title, text) = match popup {
            Popup::Help => (" Help ", Text::from(HELP_TEXT)),
            Popup::Details(r) => (" User Details ", Self::details(r)),
        };
        let height = text.height() as u16 + 2;
        let width = (text.width() as u16 + 4).max(30);
        let area = Self::popup_area(frame.area(), width, height);
        let block = Block::bordered()
            .title(Line::from(title.bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered());
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
            area,
        );
    }

    fn details(r: &UserRecord) -> Text<'static> {
        let field = |name: &'static str, value: String| {
            Line::from(vec![format!("{name:>8}  ").dim(), value.into()])
        };
        Text::from(vec![
            field("ID", r.id.to_string()),
            field("Name", r.name.clone()),
            field("Email", r.email.clone()),
            field("Mobile", r.mobile.clone()),
            field("Status", r.status.to_string()),
            field("Avatar", r.avatar.clone()),
            Line::from(""),
            Line::from(vec!["  y ".blue().bold(), "Copy User ID".into()]),
            Line::from(vec!["  e ".blue().bold(), "Edit User".into()]),
            Line::from(vec!["  t ".blue().bold(), r.status.toggle_label().into()]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_values_are_truncated() {
        assert_eq!(TableUI::truncate("abcdef", 4), "abc…");
        assert_eq!(TableUI::truncate("abc", 4), "abc");
    }
}
