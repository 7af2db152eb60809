use std::collections::{HashMap, HashSet};

use super::TransactionID;

/// Directed graph of blocked transactions. An edge `a -> b` means `a` is
/// waiting for a lock held by `b`.
pub(crate) struct WaitForGraph {
    // key: transaction id, value: the transactions that the key transaction is waiting for
    graph: HashMap<TransactionID, HashSet<TransactionID>>,
}

impl WaitForGraph {
    pub(crate) fn new() -> Self {
        Self {
            graph: HashMap::new(),
        }
    }

    /// Replace the outgoing edges of `waiter` with edges to `holders`.
    ///
    /// Returns true if at least one of the edges is new, which is the only
    /// case a new cycle may appear.
    pub(crate) fn set_waiting(
        &mut self,
        waiter: TransactionID,
        holders: &HashSet<TransactionID>,
    ) -> bool {
        let edges = self.graph.entry(waiter).or_insert_with(HashSet::new);
        let added = holders.iter().any(|h| !edges.contains(h));
        *edges = holders.clone();
        if edges.is_empty() {
            self.graph.remove(&waiter);
        }
        added
    }

    /// Remove the outgoing edges of the transaction, called once it stops
    /// waiting.
    pub(crate) fn remove_waiter(&mut self, tid: TransactionID) {
        self.graph.remove(&tid);
    }

    /// Remove every edge naming the transaction, in either direction.
    pub(crate) fn remove_transaction(&mut self, tid: TransactionID) {
        self.graph.remove(&tid);
        for transactions in self.graph.values_mut() {
            transactions.remove(&tid);
        }
        self.graph.retain(|_, transactions| !transactions.is_empty());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Search a cycle passing through `start`.
    ///
    /// Returns the transactions on the cycle, starting with `start`.
    pub(crate) fn find_cycle(&self, start: TransactionID) -> Option<Vec<TransactionID>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if self.search_path(start, start, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn search_path(
        &self,
        current: TransactionID,
        target: TransactionID,
        visited: &mut HashSet<TransactionID>,
        path: &mut Vec<TransactionID>,
    ) -> bool {
        visited.insert(current);
        path.push(current);

        if let Some(transactions) = self.graph.get(&current) {
            for &t in transactions {
                if t == target {
                    return true;
                }
                if !visited.contains(&t) && self.search_path(t, target, visited, path) {
                    return true;
                }
            }
        }

        path.pop();
        false
    }
}
