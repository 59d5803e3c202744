use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Stylize,
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Paragraph},
};

use crate::model::{Model, Modus};

pub const STATUSLINE_HEIGHT: u16 = 1;
pub const COLUMN_MARGIN: usize = 2;

pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        Self
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let [main, statusline] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(frame.area());

        match model.modus() {
            Modus::POPUP => self.draw_popup(model, frame, main),
            Modus::LISTING => self.draw_listing(model, frame, main),
            // The prompt lives in the status line; the grid (or the
            // listing, if no file is open yet) stays visible behind it.
            Modus::TABLE | Modus::INPUT => {
                if model.file_name().is_empty() {
                    self.draw_listing(model, frame, main);
                } else {
                    self.draw_table(model, frame, main);
                }
            }
        }
        self.draw_statusline(model, frame, statusline);
    }

    fn draw_listing(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let title = Line::from(" rtv - files ".bold());
        let instructions = Line::from(vec![
            " Open ".into(),
            "<Enter>".blue().bold(),
            " Upload ".into(),
            "<u>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<q> ".blue().bold(),
        ]);
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(instructions.centered())
            .border_set(border::THICK);

        let lines: Vec<Line> = model
            .files()
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let text = format!(" {}  ({})", entry.file_name, entry.id);
                if idx == model.selected_file() {
                    Line::from(text.reversed())
                } else {
                    Line::from(text)
                }
            })
            .collect();

        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let title = Line::from(format!(" {} ", model.file_name()).bold());
        let footer = Line::from(format!(
            " Page {} of {} | Total records: {} {}",
            model.pagination().page(),
            model.pagination().total_pages(),
            model.pagination().total_records(),
            filter_summary(model),
        ));
        let block = Block::bordered()
            .title(title.centered())
            .title_bottom(footer.centered())
            .border_set(border::THICK);

        let (selected_row, selected_column) = model.selected_cell();
        let mut lines = Vec::with_capacity(model.rows().len() + 1);

        let header_cells: Vec<Span> = model
            .headers()
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let text = pad(name, column_width(model, col));
                if col == selected_column {
                    text.bold().underlined()
                } else {
                    text.bold()
                }
            })
            .collect();
        lines.push(Line::from(header_cells));

        for (row_idx, row) in model.rows().iter().enumerate() {
            let cells: Vec<Span> = row
                .iter()
                .enumerate()
                .map(|(col, cell)| {
                    let text = pad(cell, column_width(model, col));
                    if row_idx == selected_row && col == selected_column {
                        text.reversed()
                    } else {
                        Span::from(text)
                    }
                })
                .collect();
            lines.push(Line::from(cells));
        }

        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    }

    fn draw_popup(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let block = Block::bordered()
            .title(Line::from(" help ".bold()).centered())
            .border_set(border::THICK);
        frame.render_widget(
            Paragraph::new(model.popup_message().to_string()).block(block),
            area,
        );
    }

    fn draw_statusline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let line = if let Some((label, input)) = model.input_line() {
            Line::from(vec![
                format!("{label}> ").yellow().bold(),
                input.input.clone().into(),
                "_".rapid_blink(),
            ])
        } else {
            let mut spans: Vec<Span> = Vec::new();
            if model.loading() {
                spans.push("[loading] ".yellow());
            }
            if model.uploading() {
                spans.push("[uploading] ".yellow());
            }
            spans.push(model.status_message().to_string().into());
            Line::from(spans)
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn column_width(model: &Model, col: usize) -> usize {
    model.widths().get(col).copied().unwrap_or(8) + COLUMN_MARGIN
}

fn filter_summary(model: &Model) -> String {
    if model.filters().is_empty() {
        String::new()
    } else {
        let parts: Vec<String> = model
            .filters()
            .active()
            .iter()
            .map(|f| format!("{}={}", f.col, f.val))
            .collect();
        format!("| Filters: {} ", parts.join(", "))
    }
}

/// Pad or truncate to `width` characters.
fn pad(s: &str, width: usize) -> String {
    let truncated: String = s.chars().take(width).collect();
    format!("{truncated:<width$}")
}
