//! Ordered classification tables.

use std::fmt;

use crate::error::DomainError;

/// Predicate deciding whether a table row applies to an error.
pub type ErrorMatcher<E> = fn(&E) -> bool;

/// Converts a matched native error into a classified error.
pub type ErrorMapper<E> = fn(&E) -> DomainError;

/// An ordered list of `(matcher, mapper)` rows evaluated top to bottom.
///
/// Rows must be registered most specific first; the first matching row wins.
/// When no row matches, the fallback mapper produces the generic
/// "dependency exception" for the table's family.
pub struct ErrorTable<E> {
    name: &'static str,
    rows: Vec<(ErrorMatcher<E>, ErrorMapper<E>)>,
    fallback: ErrorMapper<E>,
}

impl<E> ErrorTable<E> {
    /// Creates an empty table that maps everything through `fallback`.
    pub fn new(name: &'static str, fallback: ErrorMapper<E>) -> Self {
        Self {
            name,
            rows: Vec::new(),
            fallback,
        }
    }

    /// Appends a row below the existing ones.
    pub fn on(mut self, matcher: ErrorMatcher<E>, mapper: ErrorMapper<E>) -> Self {
        self.rows.push((matcher, mapper));
        self
    }

    /// Returns a copy of this table with `rows` placed above the existing rows.
    ///
    /// Used to layer call-site specific mappings over a shared base table.
    pub fn overriding(&self, rows: &[(ErrorMatcher<E>, ErrorMapper<E>)]) -> Self {
        let mut merged = rows.to_vec();
        merged.extend(self.rows.iter().copied());
        Self {
            name: self.name,
            rows: merged,
            fallback: self.fallback,
        }
    }

    /// Classifies `err` with the first matching row, or the fallback.
    pub fn classify(&self, err: &E) -> DomainError {
        self.rows
            .iter()
            .find(|(matches, _)| matches(err))
            .map(|(_, map)| map(err))
            .unwrap_or_else(|| (self.fallback)(err))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<E> Clone for ErrorTable<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            rows: self.rows.clone(),
            fallback: self.fallback,
        }
    }
}

impl<E> fmt::Debug for ErrorTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTable")
            .field("name", &self.name)
            .field("rows", &self.rows.len())
            .finish()
    }
}
