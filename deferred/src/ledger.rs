//! Registry of the deferred slots of one invocation.

use crate::{path::display, slot::Record, Error};

/// Insertion-ordered registry of the slots allocated during one encode or decode.
///
/// A ledger belongs to exactly one invocation and is discarded with it.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    records: Vec<Record>,
}

impl Ledger {
    /// Registers a slot, returning its identifier.
    pub(crate) fn register(&mut self, record: Record) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// All slots, in allocation order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: usize) -> Option<&Record> {
        self.records.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: usize) -> Option<&mut Record> {
        self.records.get_mut(id)
    }

    /// Returns the identifier of the slot at `path`.
    ///
    /// If several slots share `path`, the first unresolved one is returned (or, if all are
    /// resolved, the first one).
    pub fn find(&self, path: &str) -> Option<usize> {
        let mut found = None;
        for (id, record) in self.records.iter().enumerate() {
            if record.path() != path {
                continue;
            }
            if !record.is_resolved() {
                return Some(id);
            }
            found.get_or_insert(id);
        }
        found
    }

    /// Slots that have not been resolved yet.
    pub fn pending(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|record| !record.is_resolved())
    }

    /// Fails with [Error::IncompleteLedger] if any slot has not been resolved.
    pub fn check_complete(&self) -> Result<(), Error> {
        let pending: Vec<String> = self
            .pending()
            .map(|record| display(record.path()).to_string())
            .collect();
        if !pending.is_empty() {
            return Err(Error::IncompleteLedger(pending));
        }
        Ok(())
    }
}
