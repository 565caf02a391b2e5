use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use crate::domain::{Message, UDError, ViewerConfig};
use crate::model::Model;
use crate::table::ColumnId;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &ViewerConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, UDError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(None);
        }
        let message = match event::read()? {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Some(Message::RawKey(key))
                } else {
                    self.handle_key(key)
                }
            }
            Event::Resize(width, height) => Some(Message::Resize(width as usize, height as usize)),
            _ => None,
        };
        Ok(message)
    }

    pub fn handle_key(&self, key: KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Char('n'), _) | (KeyCode::Right, _) | (KeyCode::PageDown, _) => {
                Some(Message::NextPage)
            }
            (KeyCode::Char('p'), _) | (KeyCode::Left, _) | (KeyCode::PageUp, _) => {
                Some(Message::PreviousPage)
            }
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Char('s'), _) => Some(Message::SortByName),
            (KeyCode::Char('i'), _) => Some(Message::SortById),
            (KeyCode::Char('/'), _) => Some(Message::Filter),
            (KeyCode::Char('x'), _) => Some(Message::ResetFilters),
            (KeyCode::Char('1'), _) => Some(Message::ToggleColumn(ColumnId::Name)),
            (KeyCode::Char('2'), _) => Some(Message::ToggleColumn(ColumnId::Email)),
            (KeyCode::Char('3'), _) => Some(Message::ToggleColumn(ColumnId::Mobile)),
            (KeyCode::Char('4'), _) => Some(Message::ToggleColumn(ColumnId::Status)),
            (KeyCode::Char('5'), _) => Some(Message::ToggleColumn(ColumnId::Actions)),
            (KeyCode::Char('r'), _) => Some(Message::Retry),
            (KeyCode::Char('y'), _) => Some(Message::CopyId),
            (KeyCode::Enter, _) => Some(Message::Details),
            (KeyCode::Char('e'), _) => Some(Message::Edit),
            (KeyCode::Char('t'), _) => Some(Message::ToggleStatus),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
