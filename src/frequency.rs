//! Name counting: per-unit partial tables, their merge, and the final ranking.
//!
//! Every tally remembers where its token first appeared in the document
//! (unit index, offset within that unit's names). Merging keeps the smaller
//! position, so a merged table does not depend on how units were grouped or
//! in which order partial tables arrived. The ranking breaks count ties by
//! that position.

use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
};

use crate::common::NameToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub unit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tally {
    count: u64,
    first_seen: Position,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: HashMap<NameToken, Tally>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table of the names found in one unit.
    pub fn from_unit<I>(unit: usize, tokens: I) -> Self
    where
        I: IntoIterator<Item = NameToken>,
    {
        let mut table = Self::new();
        table.record_unit(unit, tokens);
        table
    }

    pub fn record(&mut self, token: NameToken, at: Position) {
        self.add(token, 1, at);
    }

    pub fn record_unit<I>(&mut self, unit: usize, tokens: I)
    where
        I: IntoIterator<Item = NameToken>,
    {
        for (offset, token) in tokens.into_iter().enumerate() {
            self.record(token, Position { unit, offset });
        }
    }

    fn add(&mut self, token: NameToken, count: u64, first_seen: Position) {
        self.entries
            .entry(token)
            .and_modify(|tally| {
                tally.count += count;
                tally.first_seen = tally.first_seen.min(first_seen);
            })
            .or_insert(Tally { count, first_seen });
    }

    /// Key-wise sum of `other` into `self`.
    pub fn absorb(&mut self, other: FrequencyTable) {
        for (token, tally) in other.entries {
            self.add(token, tally.count, tally.first_seen);
        }
    }

    pub fn merge(self, other: FrequencyTable) -> FrequencyTable {
        let (mut into, from) = if self.entries.len() >= other.entries.len() {
            (self, other)
        } else {
            (other, self)
        };
        into.absorb(from);
        into
    }

    /// Hash-partitions the table into `buckets` disjoint tables.
    pub fn split_by_key(self, buckets: usize) -> Vec<FrequencyTable> {
        let buckets = buckets.max(1);
        let mut parts = vec![FrequencyTable::new(); buckets];
        for (token, tally) in self.entries {
            let bucket = bucket_of(&token, buckets);
            parts[bucket].entries.insert(token, tally);
        }
        parts
    }

    pub fn get(&self, token: &str) -> Option<u64> {
        self.entries.get(token).map(|tally| tally.count)
    }

    pub fn first_seen(&self, token: &str) -> Option<Position> {
        self.entries.get(token).map(|tally| tally.first_seen)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of name occurrences counted.
    pub fn total(&self) -> u64 {
        self.entries.values().map(|tally| tally.count).sum()
    }

    pub fn counts(&self) -> HashMap<&str, u64> {
        self.entries
            .iter()
            .map(|(token, tally)| (token.as_str(), tally.count))
            .collect()
    }

    pub fn ranked(&self) -> RankedResult {
        let mut entries: Vec<(&NameToken, &Tally)> = self.entries.iter().collect();
        entries.sort_by(|a, b| {
            b.1.count
                .cmp(&a.1.count)
                .then(a.1.first_seen.cmp(&b.1.first_seen))
        });
        RankedResult(
            entries
                .into_iter()
                .map(|(token, tally)| (token.clone(), tally.count))
                .collect(),
        )
    }
}

impl FromIterator<FrequencyTable> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = FrequencyTable>>(iter: I) -> Self {
        iter.into_iter().fold(FrequencyTable::new(), FrequencyTable::merge)
    }
}

fn bucket_of(token: &str, buckets: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() % buckets as u64) as usize
}

/// Folds the name lists of consecutive units into one table.
pub fn aggregate<I, T>(token_lists: I) -> FrequencyTable
where
    I: IntoIterator<Item = T>,
    T: IntoIterator<Item = NameToken>,
{
    let mut table = FrequencyTable::new();
    for (unit, tokens) in token_lists.into_iter().enumerate() {
        table.record_unit(unit, tokens);
    }
    table
}

/// Names with their counts, most frequent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedResult(Vec<(NameToken, u64)>);

impl RankedResult {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(token, count)| (token.as_str(), *count))
    }

    pub fn as_slice(&self) -> &[(NameToken, u64)] {
        &self.0
    }
}

impl IntoIterator for RankedResult {
    type Item = (NameToken, u64);
    type IntoIter = std::vec::IntoIter<(NameToken, u64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<NameToken> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample_units() -> Vec<(usize, Vec<NameToken>)> {
        vec![
            (0, names(&["甲", "乙", "乙"])),
            (1, names(&["丙", "丙", "甲"])),
            (2, names(&[])),
            (3, names(&["丁", "乙", "丙", "戊"])),
            (4, names(&["戊"])),
        ]
    }

    #[test]
    fn ranks_ties_by_first_seen() {
        let table = aggregate([names(&["甲", "乙", "乙", "丙"]), names(&["丙"])]);
        let ranked: Vec<_> = table.ranked().into_iter().collect();
        assert_eq!(
            ranked,
            vec![
                ("乙".to_string(), 2),
                ("丙".to_string(), 2),
                ("甲".to_string(), 1),
            ]
        );
        assert_eq!(table.total(), 5);
    }

    #[test]
    fn merge_order_does_not_matter() {
        let partials: Vec<FrequencyTable> = sample_units()
            .into_iter()
            .map(|(unit, tokens)| FrequencyTable::from_unit(unit, tokens))
            .collect();
        let expected: FrequencyTable = partials.iter().cloned().collect();

        let mut reversed = partials.clone();
        reversed.reverse();
        assert_eq!(reversed.into_iter().collect::<FrequencyTable>(), expected);

        for shift in 1..partials.len() {
            let mut rotated = partials.clone();
            rotated.rotate_left(shift);
            assert_eq!(rotated.into_iter().collect::<FrequencyTable>(), expected);
        }

        // (a + b) + c == a + (b + c)
        let [a, b, c, ..] = &partials[..] else {
            unreachable!()
        };
        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.clone().merge(b.clone().merge(c.clone()));
        assert_eq!(left, right);
    }

    #[test]
    fn sequential_fold_matches_partial_merge() {
        let sequential = aggregate(sample_units().into_iter().map(|(_, tokens)| tokens));
        let merged: FrequencyTable = sample_units()
            .into_iter()
            .map(|(unit, tokens)| FrequencyTable::from_unit(unit, tokens))
            .collect();
        assert_eq!(sequential, merged);
        assert_eq!(sequential.get("乙"), Some(3));
        assert_eq!(
            sequential.first_seen("戊"),
            Some(Position { unit: 3, offset: 3 })
        );
    }

    #[test]
    fn split_buckets_are_disjoint_and_complete() {
        let table = aggregate(sample_units().into_iter().map(|(_, tokens)| tokens));
        let parts = table.clone().split_by_key(3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(FrequencyTable::len).sum::<usize>(), table.len());
        assert_eq!(parts.into_iter().collect::<FrequencyTable>(), table);
    }

    #[test]
    fn empty_table_ranks_empty() {
        assert!(FrequencyTable::new().ranked().is_empty());
        assert!(aggregate(Vec::<Vec<NameToken>>::new()).is_empty());
    }
}
