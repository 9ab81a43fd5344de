use thiserror::Error;

/// Why a submit did not start a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("nothing to send")]
    Empty,
    #[error("no conversation selected")]
    NoConversation,
    #[error("a message is already being sent")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputState {
    #[default]
    Idle,
    Sending,
}

/// What a key press in the prompt box should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Submit,
    /// Let the text field insert the line break itself.
    Newline,
    Ignore,
}

/// Idle/Sending state of the prompt box and send button.
#[derive(Debug, Default)]
pub struct InputController {
    state: InputState,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == InputState::Sending
    }

    /// `ready` is whether there is something to send to (a selected
    /// conversation, or a processed document for RAG questions).
    /// On success the controller is `Sending` and the trimmed text is returned.
    pub fn submit(&mut self, text: &str, ready: bool) -> Result<String, SubmitRejection> {
        if self.is_sending() {
            return Err(SubmitRejection::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitRejection::Empty);
        }
        if !ready {
            return Err(SubmitRejection::NoConversation);
        }
        self.state = InputState::Sending;
        Ok(text.to_string())
    }

    /// Back to `Idle` after the request ended, successfully or not.
    pub fn finish(&mut self) {
        self.state = InputState::Idle;
    }

    pub fn can_edit(&self, ready: bool) -> bool {
        ready && !self.is_sending()
    }

    pub fn can_send(&self, draft: &str, ready: bool) -> bool {
        self.can_edit(ready) && !draft.trim().is_empty()
    }

    pub fn send_label(&self) -> &'static str {
        if self.is_sending() {
            "Sending…"
        } else {
            "Send"
        }
    }

    pub fn key_action(key: &str, shift: bool) -> KeyAction {
        match (key, shift) {
            ("Enter", false) => KeyAction::Submit,
            ("Enter", true) => KeyAction::Newline,
            _ => KeyAction::Ignore,
        }
    }

    /// Height for an auto-growing text area given its content height.
    pub fn fit_height(scroll_height: u32, cap: Option<u32>) -> u32 {
        match cap {
            Some(cap) => scroll_height.min(cap),
            None => scroll_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_moves_to_sending_and_trims() {
        let mut input = InputController::new();
        assert_eq!(input.submit("  hello \n", true), Ok("hello".to_string()));
        assert_eq!(input.state(), InputState::Sending);
        assert_eq!(input.send_label(), "Sending…");
    }

    #[test]
    fn rejected_submits_stay_idle() {
        let mut input = InputController::new();
        assert_eq!(input.submit("   ", true), Err(SubmitRejection::Empty));
        assert_eq!(input.submit("hi", false), Err(SubmitRejection::NoConversation));
        assert_eq!(input.state(), InputState::Idle);
    }

    #[test]
    fn reentrant_submit_is_busy_until_finish() {
        let mut input = InputController::new();
        input.submit("one", true).unwrap();
        assert_eq!(input.submit("two", true), Err(SubmitRejection::Busy));
        assert!(!input.can_edit(true));

        input.finish();
        assert!(input.can_send("two", true));
        assert_eq!(input.submit("two", true), Ok("two".to_string()));
    }

    #[test]
    fn enter_submits_and_shift_enter_breaks_lines() {
        assert_eq!(InputController::key_action("Enter", false), KeyAction::Submit);
        assert_eq!(InputController::key_action("Enter", true), KeyAction::Newline);
        assert_eq!(InputController::key_action("a", false), KeyAction::Ignore);
    }

    #[test]
    fn height_is_capped_when_configured() {
        assert_eq!(InputController::fit_height(300, Some(120)), 120);
        assert_eq!(InputController::fit_height(80, Some(120)), 80);
        assert_eq!(InputController::fit_height(300, None), 300);
    }
}
