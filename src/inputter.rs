use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Single line editor used for the open-file and search prompts.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize, // in chars, not bytes
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: KeyEvent) -> InputResult {
        let result = match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.move_to(0),
            (KeyCode::End, _) => self.move_to(self.len()),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.clear_line(),
            (kc, km) => self.key(kc, km),
        };
        trace!("Input {:?} at {}", result.input, result.curser_pos);
        result
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let pos = self.bytepos();
            self.current_input.remove(pos);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos < self.len() {
            let pos = self.bytepos();
            self.current_input.remove(pos);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.len() {
            self.curser_pos += 1;
        }
        self.get()
    }

    fn move_to(&mut self, pos: usize) -> InputResult {
        self.curser_pos = pos;
        self.get()
    }

    fn clear_line(&mut self) -> InputResult {
        self.current_input.clear();
        self.curser_pos = 0;
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if let Some(chr) = code.as_char()
            && !modifier.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
        {
            let pos = self.bytepos();
            self.current_input.insert(pos, chr);
            self.curser_pos += 1;
        }
        self.get()
    }

    fn bytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}
