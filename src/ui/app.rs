//! Terminal application loop: key handling and frame drawing around the
//! conversation controller.

use std::io::{Stdout, stdout};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::api::KnowledgeSource;
use crate::conversation::ConversationController;
use crate::message::Sender;
use crate::ui::view::{ChatView, Viewport};

const TICK: Duration = Duration::from_millis(50);
/// Badge refresh cadence, in ticks.
const BADGE_POLL_TICKS: u32 = 200;

pub struct ChatApp {
    controller: Arc<Mutex<ConversationController>>,
    viewport: Viewport,
    input: String,
    ticks: u32,
}

impl ChatApp {
    pub fn new(controller: Arc<Mutex<ConversationController>>) -> Self {
        Self {
            controller,
            viewport: Viewport::default(),
            input: String::new(),
            ticks: 0,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(out);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

        ConversationController::load_initial(&self.controller).await;
        ConversationController::check_last_load_outcome(&self.controller).await;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode().ok();
        execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
        terminal.show_cursor().ok();
        result
    }

    async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.draw(terminal).await?;

            if event::poll(TICK).context("event poll failed")? {
                if let Event::Key(key) = event::read().context("event read failed")? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code, key.modifiers).await? {
                        return Ok(());
                    }
                }
            }

            self.ticks = self.ticks.wrapping_add(1);
            if self.ticks % BADGE_POLL_TICKS == 0 {
                let controller = Arc::clone(&self.controller);
                tokio::spawn(async move {
                    ConversationController::check_last_load_outcome(&controller).await;
                });
            }
        }
    }

    /// Returns `true` when the app should exit.
    async fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Result<bool> {
        match (code, modifiers) {
            (KeyCode::Esc, _) => return Ok(true),
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Ok(true),
            (KeyCode::Char('y'), KeyModifiers::CONTROL) => self.copy_last_reply().await?,
            (KeyCode::Enter, _) => {
                let text = std::mem::take(&mut self.input);
                ConversationController::send_message(&self.controller, &text).await;
            }
            (KeyCode::Backspace, _) => {
                self.input.pop();
            }
            (KeyCode::Up, _) | (KeyCode::PageUp, _) => {
                if self.viewport.at_top() {
                    ConversationController::load_more_older(&self.controller).await;
                } else {
                    let step = if code == KeyCode::PageUp { 10 } else { 1 };
                    self.viewport.scroll_up(step);
                }
            }
            (KeyCode::Down, _) | (KeyCode::PageDown, _) => {
                let step = if code == KeyCode::PageDown { 10 } else { 1 };
                self.viewport.scroll_down(step);
            }
            (KeyCode::F(6), _) => self.refresh(KnowledgeSource::Jira),
            (KeyCode::F(7), _) => self.refresh(KnowledgeSource::Github),
            (KeyCode::F(8), _) => self.refresh(KnowledgeSource::Confluence),
            (KeyCode::Char(c), KeyModifiers::ALT) if c.is_ascii_digit() => {
                // Alt+1 is the first suggestion; Alt+0 has nothing to map to.
                if let Some(index) = c.to_digit(10).and_then(|d| d.checked_sub(1)) {
                    self.click_suggestion(index as usize).await;
                }
            }
            (KeyCode::Char(c), _) => self.input.push(c),
            _ => {}
        }
        Ok(false)
    }

    fn refresh(&self, source: KnowledgeSource) {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move {
            ConversationController::refresh_source(&controller, source).await;
        });
    }

    async fn click_suggestion(&self, index: usize) {
        let text = {
            let guard = self.controller.lock().await;
            guard.suggestions.suggestions().get(index).cloned()
        };
        if let Some(text) = text {
            ConversationController::on_suggestion_click(&self.controller, &text).await;
        }
    }

    async fn copy_last_reply(&self) -> Result<()> {
        let id = {
            let guard = self.controller.lock().await;
            guard
                .history
                .messages()
                .iter()
                .rev()
                .find(|m| m.sender == Sender::Chatbot)
                .map(|m| m.id)
        };
        if let Some(id) = id {
            ConversationController::copy_message(&self.controller, id).await?;
        }
        Ok(())
    }

    async fn draw(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut guard = self.controller.lock().await;

        let size = terminal.size().context("failed to read terminal size")?;
        let pane_width = size.width.saturating_sub(2);
        let content_height = ChatView::content_height(guard.history.messages(), pane_width);
        self.viewport.view_height = size.height.saturating_sub(4) as usize;

        if let Some(intent) = guard.take_scroll_intent() {
            self.viewport.apply_intent(intent, content_height);
        } else {
            self.viewport.content_height = content_height;
        }
        guard.set_viewport_anchor(self.viewport.anchor());

        let view = ChatView {
            messages: guard.history.messages(),
            suggestions: guard.suggestions.suggestions(),
            badge: guard.badge().current(),
            error: guard
                .history
                .transient_error()
                .or(guard.suggestions.error_message()),
            is_loading: guard.is_loading(),
            input: &self.input,
            viewport: self.viewport,
        };

        terminal
            .draw(|frame| frame.render_widget(view, frame.size()))
            .context("failed to draw frame")?;
        Ok(())
    }
}
