use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap};
use std::fmt;

/// Id of a word (leaf) in the vocabulary.
pub type WordId = u32;

/// Id of any node in the vocabulary tree. The root is node 0.
pub type NodeId = u32;

/// Weight of a word in a bag of words.
pub type WordValue = f64;

/// Id of an image added to a [`Database`](crate::Database).
pub type EntryId = u32;

/// Norm used to normalize a [`BowVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Norm {
    L1,
    L2,
}

/// Bag-of-Words representation of an image or descriptor set.
///
/// Sparse map from word id to the total weight of that word in the provided features,
/// ordered by word id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BowVector(BTreeMap<WordId, WordValue>);

impl BowVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `v` to the weight of word `id`, inserting it if missing.
    pub fn add_weight(&mut self, id: WordId, v: WordValue) {
        *self.0.entry(id).or_insert(0.) += v;
    }

    /// Insert word `id` with weight `v` unless it is already present.
    pub fn add_if_not_exist(&mut self, id: WordId, v: WordValue) {
        self.0.entry(id).or_insert(v);
    }

    /// Scale the vector to unit norm. A zero vector is left untouched.
    pub fn normalize(&mut self, norm: Norm) {
        let n: WordValue = match norm {
            Norm::L1 => self.0.values().map(|v| v.abs()).sum(),
            Norm::L2 => self.0.values().map(|v| v * v).sum::<WordValue>().sqrt(),
        };
        if n > 0. {
            let inv = 1. / n;
            for v in self.0.values_mut() {
                *v *= inv;
            }
        }
    }

    pub fn get(&self, id: WordId) -> Option<WordValue> {
        self.0.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(word, weight)` pairs in ascending word id.
    pub fn iter(&self) -> impl Iterator<Item = (WordId, WordValue)> + '_ {
        self.0.iter().map(|(&id, &v)| (id, v))
    }

    pub(crate) fn values_mut(&mut self) -> btree_map::ValuesMut<'_, WordId, WordValue> {
        self.0.values_mut()
    }
}

impl std::iter::FromIterator<(WordId, WordValue)> for BowVector {
    fn from_iter<I: IntoIterator<Item = (WordId, WordValue)>>(iter: I) -> Self {
        let mut bow = BowVector::new();
        for (id, v) in iter {
            bow.add_weight(id, v);
        }
        bow
    }
}

impl fmt::Display for BowVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (id, v) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "<{}, {}>", id, v)?;
            first = false;
        }
        Ok(())
    }
}

/// Direct index of one image: the features falling under each vocabulary node
/// of a chosen tree level.
///
/// Key: node id. Value: indices of the features, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector(BTreeMap<NodeId, Vec<usize>>);

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feature(&mut self, node: NodeId, feature: usize) {
        self.0.entry(node).or_insert_with(Vec::new).push(feature);
    }

    /// Features filed under `node`, if any.
    pub fn features(&self, node: NodeId) -> Option<&[usize]> {
        self.0.get(&node).map(|f| f.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[usize])> + '_ {
        self.0.iter().map(|(&id, f)| (id, f.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_weight_accumulates() {
        let mut bow = BowVector::new();
        bow.add_weight(3, 0.5);
        bow.add_weight(1, 1.);
        bow.add_weight(3, 0.25);
        assert_eq!(bow.len(), 2);
        assert_eq!(bow.get(3), Some(0.75));
        assert_eq!(bow.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn add_if_not_exist_keeps_first() {
        let mut bow = BowVector::new();
        bow.add_if_not_exist(7, 2.);
        bow.add_if_not_exist(7, 5.);
        assert_eq!(bow.get(7), Some(2.));
    }

    #[test]
    fn normalize_l1_and_l2() {
        let mut bow: BowVector = vec![(0, 3.), (1, -1.)].into_iter().collect();
        bow.normalize(Norm::L1);
        assert!((bow.get(0).unwrap() - 0.75).abs() < 1e-12);
        assert!((bow.get(1).unwrap() + 0.25).abs() < 1e-12);

        let mut bow: BowVector = vec![(0, 3.), (1, 4.)].into_iter().collect();
        bow.normalize(Norm::L2);
        assert!((bow.get(0).unwrap() - 0.6).abs() < 1e-12);
        assert!((bow.get(1).unwrap() - 0.8).abs() < 1e-12);

        let mut empty = BowVector::new();
        empty.normalize(Norm::L2);
        assert!(empty.is_empty());
    }

    #[test]
    fn display_lists_pairs() {
        let bow: BowVector = vec![(2, 0.5), (0, 1.)].into_iter().collect();
        assert_eq!(bow.to_string(), "<0, 1>, <2, 0.5>");
    }

    #[test]
    fn feature_vector_groups_by_node() {
        let mut fv = FeatureVector::new();
        fv.add_feature(4, 0);
        fv.add_feature(2, 1);
        fv.add_feature(4, 2);
        assert_eq!(fv.len(), 2);
        assert_eq!(fv.features(4), Some(&[0, 2][..]));
        assert_eq!(fv.features(9), None);
    }
}
