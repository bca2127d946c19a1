//! Keyboard focus handling for the detail modal and the source tabs.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    ShiftTab,
    Escape,
    Enter,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapOutcome {
    /// Focus moved to this element inside the modal.
    Focus(String),
    /// The modal closes; focus goes back to the element, if any.
    Close(Option<String>),
    Ignored,
}

/// Tab and Shift+Tab cycle through the modal's focusable elements only.
#[derive(Debug, Clone, PartialEq)]
pub struct FocusTrap {
    focusables: Vec<String>,
    index: usize,
    restore_to: Option<String>,
}

impl FocusTrap {
    pub fn open(focusables: Vec<String>, previously_focused: Option<String>) -> Self {
        Self {
            focusables,
            index: 0,
            restore_to: previously_focused,
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focusables.get(self.index).map(String::as_str)
    }

    pub fn restore_to(&self) -> Option<&str> {
        self.restore_to.as_deref()
    }

    pub fn handle(&mut self, key: Key) -> TrapOutcome {
        let len = self.focusables.len();
        match key {
            Key::Escape => TrapOutcome::Close(self.restore_to.clone()),
            Key::Tab | Key::ShiftTab if len == 0 => TrapOutcome::Ignored,
            Key::Tab => {
                self.index = (self.index + 1) % len;
                TrapOutcome::Focus(self.focusables[self.index].clone())
            }
            Key::ShiftTab => {
                self.index = (self.index + len - 1) % len;
                TrapOutcome::Focus(self.focusables[self.index].clone())
            }
            _ => TrapOutcome::Ignored,
        }
    }

    /// A click on the backdrop closes like Escape.
    pub fn outside_click(&self) -> TrapOutcome {
        TrapOutcome::Close(self.restore_to.clone())
    }
}

/// Roving tabindex over a tab list: only the active tab sits in the Tab
/// order, arrows move focus and activation with wrap-around.
#[derive(Debug, Clone, PartialEq)]
pub struct RovingTabs<T> {
    items: Vec<T>,
    active: usize,
}

impl<T: Copy + PartialEq> RovingTabs<T> {
    pub fn new(items: Vec<T>, active: T) -> Self {
        let active = items.iter().position(|item| *item == active).unwrap_or(0);
        Self { items, active }
    }

    pub fn active(&self) -> Option<T> {
        self.items.get(self.active).copied()
    }

    /// `(item, tabindex)` pairs: 0 for the active tab, -1 for the rest.
    pub fn tab_indexes(&self) -> Vec<(T, i32)> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| (*item, if index == self.active { 0 } else { -1 }))
            .collect()
    }

    /// Returns the newly activated tab when the key moved activation.
    pub fn handle(&mut self, key: Key) -> Option<T> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        let next = match key {
            Key::ArrowRight => (self.active + 1) % len,
            Key::ArrowLeft => (self.active + len - 1) % len,
            Key::Home => 0,
            Key::End => len - 1,
            _ => return None,
        };
        if next == self.active {
            return None;
        }
        self.active = next;
        self.active()
    }
}
