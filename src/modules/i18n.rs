use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::debug;
use serde_json::Value;

const ENGLISH: &str = include_str!("../../i18n/en.json");

type Listener = Rc<dyn Fn(&str)>;

/// Translation lookup plus the `languageChanged` notification.
pub struct TranslationBridge {
    language: RefCell<String>,
    table: RefCell<Value>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
}

impl TranslationBridge {
    pub fn new(language: impl Into<String>, table: Value) -> Self {
        Self {
            language: RefCell::new(language.into()),
            table: RefCell::new(table),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Built-in English strings.
    pub fn english() -> Self {
        let table = serde_json::from_str(ENGLISH).unwrap_or(Value::Null);
        Self::new("en", table)
    }

    pub fn language(&self) -> String {
        self.language.borrow().clone()
    }

    /// Dotted-path lookup (`problems.tag_mode.any`). A missing key, or one
    /// that names a section instead of a string, yields the key itself.
    pub fn t(&self, key: &str) -> String {
        let table = self.table.borrow();
        let mut node = &*table;
        for part in key.split('.') {
            match node.get(part) {
                Some(next) => node = next,
                None => return key.to_string(),
            }
        }
        node.as_str().map(str::to_string).unwrap_or_else(|| key.to_string())
    }

    /// `t` with `{name}` placeholders filled in.
    pub fn t_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        args.iter().fold(self.t(key), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
    }

    /// Swap the table and tell every subscriber.
    pub fn set_language(&self, language: impl Into<String>, table: Value) {
        let language = language.into();
        debug!("language changed to {language}");
        *self.table.borrow_mut() = table;
        *self.language.borrow_mut() = language.clone();

        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&language);
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&str) + 'static) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        self.listeners.borrow_mut().retain(|(listener_id, _)| *listener_id != id);
    }
}
