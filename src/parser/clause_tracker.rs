//! Clause span bookkeeping for one query level.
//!
//! Clauses are recorded by start position as their keyword is seen. When the
//! level is finished every clause ends where the next one starts (the last
//! one at the end of the level), so spans are contiguous and ordered.

use std::collections::BTreeMap;

use crate::model::{Position, Span};

/// Separator between a clause key and its set-operation member number.
pub const MEMBER_SEPARATOR: char = '@';

#[derive(Debug, Default)]
pub struct ClauseTracker {
    starts: Vec<(String, Position)>,
    member: usize,
    joins: usize,
}

impl ClauseTracker {
    pub fn new() -> Self {
        Self {
            starts: Vec::new(),
            member: 1,
            joins: 0,
        }
    }

    /// Switch to the next member of a UNION/INTERSECT/EXCEPT chain.
    pub fn next_member(&mut self) {
        self.member += 1;
    }

    pub fn member(&self) -> usize {
        self.member
    }

    /// Number for the next JOIN of this level (shared by its ON clause).
    pub fn next_join(&mut self) -> usize {
        self.joins += 1;
        self.joins
    }

    /// Record the start of a clause, returning the key it was stored under.
    ///
    /// Clauses of later set-operation members get an `@N` suffix; a key seen
    /// twice in the same member (several `SET`s in a MERGE) gets `_N`.
    pub fn open(&mut self, name: &str, at: Position) -> String {
        let base = if self.member > 1 {
            format!("{name}{MEMBER_SEPARATOR}{}", self.member)
        } else {
            name.to_string()
        };
        let mut key = base.clone();
        let mut n = 1;
        while self.starts.iter().any(|(k, _)| *k == key) {
            n += 1;
            key = match base.split_once(MEMBER_SEPARATOR) {
                Some((head, member)) => format!("{head}_{n}{MEMBER_SEPARATOR}{member}"),
                None => format!("{base}_{n}"),
            };
        }
        // A clause can never start before the previous one.
        let at = self
            .starts
            .last()
            .map_or(at, |(_, previous)| at.max(*previous));
        self.starts.push((key.clone(), at));
        key
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Close every clause; the last one ends at `end`.
    pub fn finish(self, end: Position) -> BTreeMap<String, Span> {
        let mut spans = BTreeMap::new();
        let count = self.starts.len();
        for i in 0..count {
            let (key, start) = &self.starts[i];
            let stop = self
                .starts
                .get(i + 1)
                .map_or(end, |(_, next)| *next);
            spans.insert(key.clone(), Span::new(*start, stop));
        }
        spans
    }
}

/// Clause name without member suffix and numbering: `join_2@3` -> `join`.
pub fn clause_base(key: &str) -> &str {
    let key = key
        .split_once(MEMBER_SEPARATOR)
        .map_or(key, |(head, _)| head);
    match key.rsplit_once('_') {
        Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => head,
        _ => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    #[test]
    fn test_spans_are_contiguous() {
        let mut tracker = ClauseTracker::new();
        tracker.open("select", pos(1, 1));
        tracker.open("from", pos(1, 10));
        tracker.open("where", pos(2, 1));
        let spans = tracker.finish(pos(2, 20));

        assert_eq!(spans["select"].end(), pos(1, 10));
        assert_eq!(spans["from"].start(), pos(1, 10));
        assert_eq!(spans["from"].end(), pos(2, 1));
        assert_eq!(spans["where"].end(), pos(2, 20));
    }

    #[test]
    fn test_member_and_duplicate_keys() {
        let mut tracker = ClauseTracker::new();
        assert_eq!(tracker.open("set", pos(1, 1)), "set");
        assert_eq!(tracker.open("set", pos(2, 1)), "set_2");
        tracker.next_member();
        assert_eq!(tracker.open("from", pos(3, 1)), "from@2");
        assert_eq!(tracker.open("from", pos(3, 9)), "from_2@2");
    }

    #[test]
    fn test_clause_base() {
        assert_eq!(clause_base("where"), "where");
        assert_eq!(clause_base("group_by"), "group_by");
        assert_eq!(clause_base("join_12"), "join");
        assert_eq!(clause_base("on_3@2"), "on");
        assert_eq!(clause_base("from@2"), "from");
        assert_eq!(clause_base("insert_columns"), "insert_columns");
    }

    #[test]
    fn test_join_numbers_increase() {
        let mut tracker = ClauseTracker::new();
        assert_eq!(tracker.next_join(), 1);
        assert_eq!(tracker.next_join(), 2);
    }
}
