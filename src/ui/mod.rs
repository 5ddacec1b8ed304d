use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use time::OffsetDateTime;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::state::PopupState;
use crate::drag::{HoverHint, RowHalf};
use crate::pins::Placement;

/// Terminal lines used by one link row (label line + URI line).
pub const ROW_HEIGHT: u16 = 2;

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub selected: usize,
    pub status: Option<String>,
}

/// Where the link list was drawn, for mapping pointer positions to rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListGeometry {
    pub inner: Rect,
    pub offset: usize,
    pub rows: usize,
}

impl ListGeometry {
    pub fn contains(&self, column: u16, row: u16) -> bool {
        column >= self.inner.x
            && column < self.inner.x.saturating_add(self.inner.width)
            && row >= self.inner.y
            && row < self.inner.y.saturating_add(self.inner.height)
    }

    pub fn row_at(&self, column: u16, row: u16) -> Option<(usize, RowHalf)> {
        if !self.contains(column, row) {
            return None;
        }
        let relative = row - self.inner.y;
        let index = self.offset + usize::from(relative / ROW_HEIGHT);
        if index >= self.rows {
            return None;
        }
        let half = if relative % ROW_HEIGHT < ROW_HEIGHT / 2 {
            RowHalf::Upper
        } else {
            RowHalf::Lower
        };
        Some((index, half))
    }
}

pub fn draw_app(
    frame: &mut Frame,
    popup: &PopupState,
    view: &ViewState,
    list_state: &mut ListState,
    now: OffsetDateTime,
) -> ListGeometry {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.size());

    let rows = popup.compose(now);
    let hint = popup.drag_hint();
    let source = popup.drag_source();
    let block = Block::default()
        .title("Shortcuts")
        .borders(Borders::ALL)
        .border_style(if source.is_some() {
            Style::default().fg(Color::Magenta)
        } else {
            Style::default().fg(Color::Cyan)
        });
    let inner = block.inner(vertical[0]);
    let label_width = usize::from(inner.width).saturating_sub(8);

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = &row.definition.id;
        let mut spans = Vec::new();
        if row.pinned {
            spans.push(Span::styled(
                "★ ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled("☆ ", Style::default().fg(Color::DarkGray)));
        }
        if row.recent {
            spans.push(Span::styled("● ", Style::default().fg(Color::Cyan)));
        }
        let mut label_style = Style::default().add_modifier(Modifier::BOLD);
        if source == Some(id) {
            label_style = label_style
                .fg(Color::Magenta)
                .add_modifier(Modifier::ITALIC);
        }
        spans.push(Span::styled(
            truncate_to_width(&row.definition.label, label_width),
            label_style,
        ));
        if let Some(HoverHint { placement, .. }) = hint.filter(|hint| &hint.target == id) {
            let marker = match placement {
                Placement::Before => "  ▲ drop above",
                Placement::After => "  ▼ drop below",
            };
            spans.push(Span::styled(marker, Style::default().fg(Color::Magenta)));
        }
        let uri_line = Line::from(Span::styled(
            format!("  {}", row.definition.target_uri),
            Style::default().fg(Color::Gray),
        ));
        items.push(ListItem::new(vec![Line::from(spans), uri_line]));
    }
    if items.is_empty() {
        items.push(ListItem::new("No shortcuts available."));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, vertical[0], list_state);

    let status = build_status_line(popup, view, rows.len());
    let status_paragraph = Paragraph::new(status)
        .style(Style::default().fg(Color::Gray))
        .wrap(Wrap { trim: true });
    frame.render_widget(status_paragraph, vertical[1]);

    ListGeometry {
        inner,
        offset: list_state.offset(),
        rows: rows.len(),
    }
}

fn build_status_line(popup: &PopupState, view: &ViewState, total: usize) -> Text<'static> {
    let position = if total == 0 {
        "0/0".to_string()
    } else {
        format!("{}/{}", view.selected + 1, total)
    };
    let mut spans = vec![
        Span::raw(format!("Pinned: {} ", popup.pins().len())),
        Span::raw(" | Selected: "),
        Span::styled(position, Style::default().add_modifier(Modifier::BOLD)),
    ];
    if let Some(source) = popup.drag_source() {
        spans.push(Span::raw(" | Dragging: "));
        spans.push(Span::styled(
            source.to_string(),
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if let Some(message) = &view.status {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::Yellow),
        ));
    }

    let help = Line::from(Span::styled(
        "j/k move • p pin • Enter open • K/J reorder • drag with mouse • Esc cancel drag • q quit",
        Style::default().fg(Color::DarkGray),
    ));
    Text::from(vec![Line::from(spans), help])
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::actions::LogTabOpener;
    use crate::catalog::{Catalog, LinkDefinition};
    use crate::config::RecencyOptions;
    use crate::storage::{MemoryStore, StoreAdapter, StoreArea};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::json;
    use std::sync::Arc;

    fn geometry() -> ListGeometry {
        ListGeometry {
            inner: Rect::new(1, 1, 30, 8),
            offset: 0,
            rows: 3,
        }
    }

    #[test]
    fn row_hit_testing_maps_lines_to_rows_and_halves() {
        let geometry = geometry();
        assert_eq!(geometry.row_at(5, 1), Some((0, RowHalf::Upper)));
        assert_eq!(geometry.row_at(5, 2), Some((0, RowHalf::Lower)));
        assert_eq!(geometry.row_at(5, 3), Some((1, RowHalf::Upper)));
        assert_eq!(geometry.row_at(5, 6), Some((2, RowHalf::Lower)));
    }

    #[test]
    fn row_hit_testing_rejects_points_outside_rows() {
        let geometry = geometry();
        assert_eq!(geometry.row_at(0, 1), None);
        assert_eq!(geometry.row_at(5, 0), None);
        assert_eq!(geometry.row_at(5, 7), None);
        assert_eq!(geometry.row_at(31, 2), None);
    }

    #[test]
    fn scrolled_list_offsets_row_indices() {
        let geometry = ListGeometry {
            offset: 4,
            rows: 10,
            ..geometry()
        };
        assert_eq!(geometry.row_at(2, 3), Some((5, RowHalf::Upper)));
    }

    #[test]
    fn long_labels_are_truncated_with_ellipsis() {
        assert_eq!(truncate_to_width("Net Internals", 20), "Net Internals");
        assert_eq!(truncate_to_width("Net Internals", 6), "Net I…");
        assert_eq!(truncate_to_width("Net Internals", 0), "");
    }

    #[test]
    fn pinned_rows_render_first_with_markers() -> anyhow::Result<()> {
        let catalog = Arc::new(Catalog::new(
            ["about", "history", "apps"]
                .into_iter()
                .map(|id| LinkDefinition::new(id, id.to_uppercase(), format!("chrome://{id}")))
                .collect(),
        )?);
        let backend = Arc::new(MemoryStore::with_values(
            StoreArea::Sync,
            [("pinned", json!(["apps"]))],
        ));
        let popup = PopupState::load(
            catalog,
            StoreAdapter::inline(backend),
            &RecencyOptions::default(),
            Box::new(LogTabOpener),
            OffsetDateTime::now_utc(),
        );

        let mut terminal = Terminal::new(TestBackend::new(48, 14))?;
        let mut list_state = ListState::default();
        let mut geometry = ListGeometry::default();
        terminal.draw(|frame| {
            geometry = draw_app(
                frame,
                &popup,
                &ViewState::default(),
                &mut list_state,
                OffsetDateTime::now_utc(),
            );
        })?;

        let buffer = terminal.backend().buffer();
        let line = |y: u16| -> String {
            (0..buffer.area.width)
                .map(|x| buffer.get(x, y).symbol().to_string())
                .collect()
        };
        assert!(line(1).contains("★ APPS"), "got {:?}", line(1));
        assert!(line(2).contains("chrome://apps"), "got {:?}", line(2));
        assert!(line(3).contains("☆ ABOUT"), "got {:?}", line(3));
        assert_eq!(geometry.rows, 3);
        assert_eq!(geometry.row_at(5, 3), Some((1, RowHalf::Upper)));
        Ok(())
    }
}
