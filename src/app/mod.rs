use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use time::OffsetDateTime;

use crate::catalog::LinkId;
use crate::config::AppConfig;
use crate::drag::{DragEvent, DragOutcome, RowHalf};
use crate::pins::{Placement, ReorderOutcome};
use crate::ui::{self, ListGeometry, ViewState};

pub mod actions;
pub mod state;

pub use actions::{opener_from_config, CommandTabOpener, LogTabOpener, TabOpener};
pub use state::PopupState;

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    TogglePin,
    OpenSelected,
    MoveUp,
    MoveDown,
    CancelDrag,
    Refresh,
}

/// Pointer bookkeeping between crossterm mouse events.
#[derive(Debug, Default)]
struct PointerState {
    pressed: Option<LinkId>,
    hovered: Option<(LinkId, RowHalf)>,
}

pub struct App {
    config: Arc<AppConfig>,
    popup: PopupState,
    view: ViewState,
    list_state: ListState,
    geometry: ListGeometry,
    pointer: PointerState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, popup: PopupState) -> Self {
        Self {
            config,
            popup,
            view: ViewState::default(),
            list_state: ListState::default(),
            geometry: ListGeometry::default(),
            pointer: PointerState::default(),
            should_quit: false,
            tick_rate: Duration::from_millis(500),
        }
    }

    pub fn popup(&self) -> &PopupState {
        &self.popup
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            let now = OffsetDateTime::now_utc();
            let total = self.popup.compose(now).len();
            self.clamp_selection(total);
            self.list_state
                .select((total > 0).then_some(self.view.selected));

            let mut geometry = self.geometry;
            terminal
                .draw(|frame| {
                    geometry =
                        ui::draw_app(frame, &self.popup, &self.view, &mut self.list_state, now);
                })
                .context("rendering frame")?;
            self.geometry = geometry;

            if self.should_quit {
                break;
            }

            // Redraw on every tick so recent markers expire on screen.
            if event::poll(self.tick_rate).context("polling for terminal events")? {
                let now = OffsetDateTime::now_utc();
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key, now),
                    Event::Mouse(mouse) => self.handle_mouse(mouse, now),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent, now: OffsetDateTime) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);

        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Char('J') => Some(Action::MoveDown),
            KeyCode::Char('K') => Some(Action::MoveUp),
            KeyCode::Char('p') if plain => Some(Action::TogglePin),
            KeyCode::Char('r') if plain => Some(Action::Refresh),
            KeyCode::Enter => Some(Action::OpenSelected),
            KeyCode::Esc => Some(Action::CancelDrag),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action, now);
        }
    }

    fn handle_action(&mut self, action: Action, now: OffsetDateTime) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.move_selection(1, now),
            Action::SelectPrevious => self.move_selection(-1, now),
            Action::TogglePin => self.handle_toggle_pin(now),
            Action::OpenSelected => self.handle_open(now),
            Action::MoveUp => self.handle_move_pinned(Placement::Before, now),
            Action::MoveDown => self.handle_move_pinned(Placement::After, now),
            Action::CancelDrag => {
                self.pointer = PointerState::default();
                if self.popup.drag(DragEvent::End).0 == DragOutcome::Abandoned {
                    self.set_status("Drag cancelled");
                }
            }
            Action::Refresh => {
                self.pointer = PointerState::default();
                self.popup.reload(&self.config.recency, now);
                self.set_status("Reloaded pins and recents");
            }
        }
    }

    fn handle_toggle_pin(&mut self, now: OffsetDateTime) {
        let Some(id) = self.row_id(self.view.selected, now) else {
            return;
        };
        match self.popup.toggle_pin(id.as_str()) {
            Some(true) => self.set_status(format!("Pinned {id}")),
            Some(false) => self.set_status(format!("Unpinned {id}")),
            None => return,
        }
        self.select_id(&id, now);
    }

    fn handle_open(&mut self, now: OffsetDateTime) {
        let Some(id) = self.row_id(self.view.selected, now) else {
            return;
        };
        let opened = self
            .popup
            .open_link(id.as_str(), now)
            .map(|link| format!("Opened {}", link.target_uri));
        if let Some(message) = opened {
            self.set_status(message);
            self.select_id(&id, now);
        }
    }

    /// Swaps the selected pinned row with its neighbour in `placement`
    /// direction.
    fn handle_move_pinned(&mut self, placement: Placement, now: OffsetDateTime) {
        let Some(id) = self.row_id(self.view.selected, now) else {
            return;
        };
        let pins = self.popup.pins();
        let Some(position) = pins.position(id.as_str()) else {
            self.set_status("Only pinned links can be reordered");
            return;
        };
        let neighbour = match placement {
            Placement::Before => position.checked_sub(1),
            Placement::After => position.checked_add(1),
        }
        .and_then(|index| pins.as_slice().get(index))
        .cloned();
        let Some(neighbour) = neighbour else {
            return;
        };
        if self.popup.reorder(id.as_str(), neighbour.as_str(), placement) == ReorderOutcome::Moved {
            self.select_id(&id, now);
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, now: OffsetDateTime) {
        let hit = self.geometry.row_at(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.pointer = PointerState::default();
                if let Some((index, _)) = hit {
                    self.view.selected = index;
                    self.pointer.pressed = self.row_id(index, now);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if self.geometry.contains(mouse.column, mouse.row) {
                    self.pointer_moved(hit, now);
                } else {
                    self.pointer_exited();
                }
            }
            MouseEventKind::Up(MouseButton::Left) => self.pointer_released(hit, now),
            MouseEventKind::ScrollDown => self.move_selection(1, now),
            MouseEventKind::ScrollUp => self.move_selection(-1, now),
            _ => {}
        }
    }

    fn pointer_moved(&mut self, hit: Option<(usize, RowHalf)>, now: OffsetDateTime) {
        if !self.popup.is_dragging() {
            let Some(source) = self.pointer.pressed.clone() else {
                return;
            };
            if !self.popup.pins().contains(source.as_str()) {
                return;
            }
            self.popup.drag(DragEvent::Start { id: source });
        }

        let target = hit.and_then(|(index, half)| self.row_id(index, now).map(|id| (id, half)));
        if target == self.pointer.hovered {
            return;
        }
        if let Some((previous, _)) = self.pointer.hovered.take() {
            if target.as_ref().map(|(id, _)| id) != Some(&previous) {
                self.popup.drag(DragEvent::Leave { id: previous });
            }
        }
        if let Some((id, half)) = &target {
            self.popup.drag(DragEvent::Over {
                id: id.clone(),
                half: Some(*half),
            });
        }
        self.pointer.hovered = target;
    }

    fn pointer_exited(&mut self) {
        self.pointer.pressed = None;
        if let Some((previous, _)) = self.pointer.hovered.take() {
            self.popup.drag(DragEvent::Leave { id: previous });
        }
        if self.popup.drag(DragEvent::PointerExit).0 == DragOutcome::Abandoned {
            self.set_status("Drag cancelled");
        }
    }

    fn pointer_released(&mut self, hit: Option<(usize, RowHalf)>, now: OffsetDateTime) {
        self.pointer = PointerState::default();
        if !self.popup.is_dragging() {
            return;
        }
        let event = match hit.and_then(|(index, half)| self.row_id(index, now).map(|id| (id, half)))
        {
            Some((id, half)) => DragEvent::Drop {
                id,
                half: Some(half),
            },
            None => DragEvent::End,
        };
        match self.popup.drag(event) {
            (DragOutcome::Dropped(command), Some(ReorderOutcome::Moved)) => {
                let side = match command.placement {
                    Placement::Before => "above",
                    Placement::After => "below",
                };
                self.set_status(format!(
                    "Moved {} {side} {}",
                    command.source, command.target
                ));
                self.select_id(&command.source, now);
            }
            (DragOutcome::Dropped(command), Some(ReorderOutcome::Unchanged)) => {
                self.select_id(&command.source, now);
            }
            (DragOutcome::Dropped(_), _) => self.set_status("Only pinned links can be reordered"),
            (DragOutcome::Abandoned, _) => self.set_status("Drag cancelled"),
            (DragOutcome::Ignored | DragOutcome::Tracking, _) => {}
        }
    }

    fn row_id(&self, index: usize, now: OffsetDateTime) -> Option<LinkId> {
        self.popup
            .compose(now)
            .get(index)
            .map(|row| row.definition.id.clone())
    }

    fn select_id(&mut self, id: &LinkId, now: OffsetDateTime) {
        if let Some(index) = self
            .popup
            .compose(now)
            .iter()
            .position(|row| &row.definition.id == id)
        {
            self.view.selected = index;
        }
    }

    fn move_selection(&mut self, delta: isize, now: OffsetDateTime) {
        let total = self.popup.compose(now).len();
        if total == 0 {
            return;
        }
        let next = self.view.selected.saturating_add_signed(delta);
        self.view.selected = next.min(total - 1);
    }

    fn clamp_selection(&mut self, total: usize) {
        if total == 0 {
            self.view.selected = 0;
        } else if self.view.selected >= total {
            self.view.selected = total - 1;
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.view.status = Some(message.into());
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, LinkDefinition};
    use crate::storage::{MemoryStore, StoreAdapter, StoreArea};
    use ratatui::layout::Rect;
    use serde_json::json;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
    }

    fn app() -> (Arc<MemoryStore>, App) {
        let catalog = Arc::new(
            Catalog::new(
                ["about", "history", "crashes", "apps"]
                    .into_iter()
                    .map(|id| LinkDefinition::new(id, id, format!("chrome://{id}")))
                    .collect(),
            )
            .expect("valid catalog"),
        );
        let backend = Arc::new(MemoryStore::with_values(
            StoreArea::Sync,
            [("pinned", json!(["about", "history", "crashes"]))],
        ));
        let config = Arc::new(AppConfig::default());
        let popup = PopupState::load(
            catalog,
            StoreAdapter::inline(backend.clone()),
            &config.recency,
            Box::new(LogTabOpener),
            now(),
        );
        let mut app = App::new(config, popup);
        app.geometry = ListGeometry {
            inner: Rect::new(1, 1, 40, 20),
            offset: 0,
            rows: 4,
        };
        (backend, app)
    }

    fn mouse(app: &mut App, kind: MouseEventKind, column: u16, row: u16) {
        app.handle_mouse(
            MouseEvent {
                kind,
                column,
                row,
                modifiers: KeyModifiers::NONE,
            },
            now(),
        );
    }

    fn key(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), now());
    }

    fn order(app: &App) -> Vec<String> {
        app.popup().pins().iter().map(ToString::to_string).collect()
    }

    const LEFT: MouseButton = MouseButton::Left;

    #[test]
    fn dragging_onto_lower_half_moves_below_target() {
        let (backend, mut app) = app();
        mouse(&mut app, MouseEventKind::Down(LEFT), 4, 1);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 3);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 6);
        assert!(app.popup().is_dragging());
        mouse(&mut app, MouseEventKind::Up(LEFT), 4, 6);

        assert_eq!(order(&app), ["history", "crashes", "about"]);
        assert_eq!(backend.set_calls(), 1);
        assert_eq!(app.view.selected, 2);
        assert_eq!(app.view.status.as_deref(), Some("Moved about below crashes"));
    }

    #[test]
    fn dropping_onto_unpinned_row_reports_rejection() {
        let (backend, mut app) = app();
        mouse(&mut app, MouseEventKind::Down(LEFT), 4, 1);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 3);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 7);
        mouse(&mut app, MouseEventKind::Up(LEFT), 4, 7);

        assert!(!app.popup().is_dragging());
        assert_eq!(order(&app), ["about", "history", "crashes"]);
        assert_eq!(backend.set_calls(), 0);
        assert_eq!(
            app.view.status.as_deref(),
            Some("Only pinned links can be reordered")
        );
    }

    #[test]
    fn releasing_outside_rows_abandons_without_saving() {
        let (backend, mut app) = app();
        mouse(&mut app, MouseEventKind::Down(LEFT), 4, 1);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 5);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 12);
        mouse(&mut app, MouseEventKind::Up(LEFT), 4, 12);

        assert!(!app.popup().is_dragging());
        assert_eq!(order(&app), ["about", "history", "crashes"]);
        assert_eq!(backend.set_calls(), 0);
    }

    #[test]
    fn leaving_the_list_area_abandons_the_drag() {
        let (backend, mut app) = app();
        mouse(&mut app, MouseEventKind::Down(LEFT), 4, 1);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 5);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 60, 5);
        assert!(!app.popup().is_dragging());
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 5);
        mouse(&mut app, MouseEventKind::Up(LEFT), 4, 5);

        assert_eq!(order(&app), ["about", "history", "crashes"]);
        assert_eq!(backend.set_calls(), 0);
        assert_eq!(app.view.status.as_deref(), Some("Drag cancelled"));
    }

    #[test]
    fn click_without_motion_only_selects() {
        let (backend, mut app) = app();
        mouse(&mut app, MouseEventKind::Down(LEFT), 4, 5);
        mouse(&mut app, MouseEventKind::Up(LEFT), 4, 5);
        assert_eq!(app.view.selected, 2);
        assert!(!app.popup().is_dragging());
        assert_eq!(backend.set_calls(), 0);
    }

    #[test]
    fn unpinned_rows_do_not_start_a_drag() {
        let (_backend, mut app) = app();
        mouse(&mut app, MouseEventKind::Down(LEFT), 4, 7);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 1);
        assert!(!app.popup().is_dragging());
    }

    #[test]
    fn keyboard_moves_pinned_rows() {
        let (backend, mut app) = app();
        key(&mut app, KeyCode::Char('j'));
        key(&mut app, KeyCode::Char('K'));
        assert_eq!(order(&app), ["history", "about", "crashes"]);
        assert_eq!(app.view.selected, 0);

        key(&mut app, KeyCode::Char('K'));
        assert_eq!(backend.set_calls(), 1);

        key(&mut app, KeyCode::Char('J'));
        key(&mut app, KeyCode::Char('J'));
        assert_eq!(order(&app), ["about", "crashes", "history"]);
        assert_eq!(app.view.selected, 2);
    }

    #[test]
    fn pin_toggle_keeps_selection_on_the_link() {
        let (_backend, mut app) = app();
        key(&mut app, KeyCode::Char('p'));
        assert_eq!(order(&app), ["history", "crashes"]);
        assert_eq!(app.view.selected, 2);
        assert_eq!(app.view.status.as_deref(), Some("Unpinned about"));
    }

    #[test]
    fn escape_cancels_an_active_drag() {
        let (backend, mut app) = app();
        mouse(&mut app, MouseEventKind::Down(LEFT), 4, 1);
        mouse(&mut app, MouseEventKind::Drag(LEFT), 4, 4);
        key(&mut app, KeyCode::Esc);
        assert!(!app.popup().is_dragging());
        mouse(&mut app, MouseEventKind::Up(LEFT), 4, 4);
        assert_eq!(backend.set_calls(), 0);
    }

    #[test]
    fn quit_key_stops_the_loop() {
        let (_backend, mut app) = app();
        key(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
