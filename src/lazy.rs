use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub card_id: u64,
    pub url: String,
}

pub struct LazyLoader {
    margin_rows: u16,
    bypass: bool,
    pending: HashMap<u64, String>,
    fired: HashSet<u64>,
}

impl LazyLoader {
    pub fn new(margin_rows: u16, bypass: bool) -> Self {
        Self {
            margin_rows,
            bypass,
            pending: HashMap::new(),
            fired: HashSet::new(),
        }
    }

    pub fn margin_rows(&self) -> u16 {
        self.margin_rows
    }

    pub fn is_pending(&self, card_id: u64) -> bool {
        self.pending.contains_key(&card_id)
    }

    pub fn defer(&mut self, card_id: u64, url: String) -> Option<Assignment> {
        if self.fired.contains(&card_id) {
            return None;
        }
        if self.bypass {
            self.fired.insert(card_id);
            return Some(Assignment { card_id, url });
        }
        self.pending.insert(card_id, url);
        None
    }

    // Rebuilt feeds reuse card ids; a refresh must start from a clean
    // watcher or changed rows would never be deferred again.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.fired.clear();
    }

    pub fn observe(&mut self, intersecting: &[u64]) -> Vec<Assignment> {
        let mut released = Vec::new();
        for &card_id in intersecting {
            if let Some(url) = self.pending.remove(&card_id) {
                self.fired.insert(card_id);
                released.push(Assignment { card_id, url });
            }
        }
        released
    }
}
