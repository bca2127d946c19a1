use std::cell::RefCell;

/// The browser location as far as the console cares about it.
pub trait Location {
    /// Current query string without the leading `?`.
    fn query(&self) -> String;
    /// Replace the query of the current history entry (no new entry).
    fn replace_query(&self, query: &str);
    /// Navigate to `path`, pushing a new entry.
    fn assign(&self, path: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub path: String,
    pub query: String,
}

/// In-process history stack used by the terminal front end and tests.
#[derive(Debug)]
pub struct MemoryLocation {
    entries: RefCell<Vec<HistoryEntry>>,
}

impl MemoryLocation {
    pub fn new(path: impl Into<String>, query: impl Into<String>) -> Self {
        let query: String = query.into();
        Self {
            entries: RefCell::new(vec![HistoryEntry {
                path: path.into(),
                query: query.trim_start_matches('?').to_string(),
            }]),
        }
    }

    pub fn path(&self) -> String {
        self.current().path
    }

    pub fn history_len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// `path?query`, or just `path` when the query is empty.
    pub fn href(&self) -> String {
        let entry = self.current();
        if entry.query.is_empty() {
            entry.path
        } else {
            format!("{}?{}", entry.path, entry.query)
        }
    }

    fn current(&self) -> HistoryEntry {
        self.entries
            .borrow()
            .last()
            .cloned()
            .unwrap_or(HistoryEntry {
                path: "/".to_string(),
                query: String::new(),
            })
    }
}

impl Location for MemoryLocation {
    fn query(&self) -> String {
        self.current().query
    }

    fn replace_query(&self, query: &str) {
        let mut entries = self.entries.borrow_mut();
        let query = query.trim_start_matches('?').to_string();
        match entries.last_mut() {
            Some(entry) => entry.query = query,
            None => entries.push(HistoryEntry {
                path: "/".to_string(),
                query,
            }),
        }
    }

    fn assign(&self, path: &str) {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        self.entries.borrow_mut().push(HistoryEntry {
            path: path.to_string(),
            query: query.to_string(),
        });
    }
}
