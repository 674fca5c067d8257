//! Lexical scope chain used during name resolution

use super::{Binding, NameKind};
use crate::ast::Position;
use std::collections::HashMap;

/// One declaration visible in a scope
#[derive(Debug, Clone)]
pub struct Entry {
    /// What the name is bound to
    pub binding: Binding,
    /// Kind of the declaration
    pub kind: NameKind,
    /// Declaration order within the scope
    pub order: usize,
    /// Declaration position
    pub position: Position,
}

/// Names declared by one function body or scoped block
#[derive(Debug, Default)]
pub struct Scope {
    entries: HashMap<String, Entry>,
    /// Order of the variable whose initializer is being resolved
    initializing: Option<usize>,
}

/// Stack of nested scopes (innermost last)
#[derive(Debug, Default)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
}

/// Outcome of a lookup
#[derive(Debug, Clone)]
pub struct Found<'a> {
    /// The declaration entry
    pub entry: &'a Entry,
    /// True if the entry lives in a scope whose initializer for the same or an
    /// earlier declaration is currently being resolved
    pub not_yet_initialized: bool,
}

impl ScopeChain {
    /// Creates an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new innermost scope
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Leave the innermost scope
    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Number of live scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Declare `name` in the innermost scope.
    ///
    /// Returns the previous entry's position if the name is already declared
    /// in that scope; the first declaration wins.
    pub fn declare(&mut self, name: &str, entry: Entry) -> Result<(), Position> {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => return Ok(()),
        };
        if let Some(previous) = scope.entries.get(name) {
            return Err(previous.position);
        }
        scope.entries.insert(name.to_string(), entry);
        Ok(())
    }

    /// Mark the innermost scope as resolving the initializer of declaration `order`.
    ///
    /// Only names written in the initializer are checked; reads made by a
    /// called function see the variable's zero-filled storage.
    pub fn begin_initializer(&mut self, order: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.initializing = Some(order);
        }
    }

    /// Clear the innermost scope's initializer marker
    pub fn end_initializer(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.initializing = None;
        }
    }

    /// Search innermost to outermost; the first match wins
    pub fn lookup(&self, name: &str) -> Option<Found<'_>> {
        self.scopes.iter().rev().find_map(|scope| {
            scope.entries.get(name).map(|entry| Found {
                entry,
                not_yet_initialized: entry.kind == NameKind::Variable
                    && scope.initializing.is_some_and(|current| entry.order >= current),
            })
        })
    }
}
