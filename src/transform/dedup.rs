use clap::ValueEnum;
use std::collections::HashSet;
use std::hash::Hash;

/// How rows sharing a primary key are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Keep every row, duplicates included.
    KeepAll,
    /// Keep the first row seen for each key.
    FirstWins,
    /// Keep the last row seen for each key.
    LastWins,
}

impl DedupPolicy {
    /// Collapses `rows` by `key`. Surviving rows keep their relative order.
    pub fn apply<T, K, F>(self, rows: Vec<T>, key: F) -> Vec<T>
    where
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        match self {
            DedupPolicy::KeepAll => rows,
            DedupPolicy::FirstWins => {
                let mut seen = HashSet::new();
                rows.into_iter().filter(|row| seen.insert(key(row))).collect()
            }
            DedupPolicy::LastWins => {
                let mut seen = HashSet::new();
                let mut kept: Vec<T> = rows
                    .into_iter()
                    .rev()
                    .filter(|row| seen.insert(key(row)))
                    .collect();
                kept.reverse();
                kept
            }
        }
    }
}
