use std::time::Duration;
use tracing::trace;

use crate::domain::{DVConfig, DVError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(self.handle_key(model, key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, model: &Model, key: KeyEvent) -> Option<Message> {
        if model.raw_keyevents() {
            return Some(Message::RawKey(key));
        }
        let message = Controller::map_key(key);
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    fn map_key(key: KeyEvent) -> Option<Message> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Char('h'), _) | (KeyCode::Left, _) => Some(Message::MoveLeft),
            (KeyCode::Char('l'), _) | (KeyCode::Right, _) => Some(Message::MoveRight),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Message::MoveBeginning),
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Message::MoveEnd),
            (KeyCode::Char('0'), _) => Some(Message::MoveToFirstColumn),
            (KeyCode::Char('$'), _) => Some(Message::MoveToLastColumn),
            (KeyCode::Char('o'), _) => Some(Message::OpenFile),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char('i'), _) => Some(Message::GenerateInsights),
            (KeyCode::Char('c'), _) => Some(Message::CopyCell),
            (KeyCode::Char('C'), _) => Some(Message::CopyRow),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        }
    }
}
