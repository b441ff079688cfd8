#[cfg(feature = "bincode")]
use bincode;
use log::{debug, info};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, ToSmallVec};
use std::fmt;

use crate::*;

/// Upper bound on assignment/update rounds of a single k-medians step.
const MAX_KMEANS_ITERS: usize = 100;

/// Node ids from level 1 down to a word, inclusive. The root (node 0) is implicit.
type NodePath<const L: usize> = SmallVec<[NodeId; L]>;

#[derive(Serialize, Deserialize, PartialEq, Clone)]
#[serde(bound = "D: BinaryDescriptor")]
/// Hierarchical feature vocabulary built from a collection of image keypoint descriptors,
/// with branching factor `k` and at most `L` levels below the root. Can be:
/// 1. Created from the descriptors of a set of training images.
/// 2. Saved to a file & loaded from a file (requires bincode feature, enabled by default).
/// 3. Used to transform a new set of descriptors into a BoW representation (and
///    optionally get the direct index from features to nodes).
pub struct Vocabulary<D: BinaryDescriptor, const L: usize> {
    blocks: Vec<Block<D, L>>,
    words: Vec<WordRef>,
    k: usize,
    levels: usize,
    num_nodes: usize,
    weighting: Weighting,
    scoring: Scoring,
}

/// Vocabulary API
impl<D: BinaryDescriptor, const L: usize> Vocabulary<D, { L }> {
    /// An empty vocabulary. Call [`Vocabulary::create`] to build it.
    ///
    /// Args: (k: Branching factor, weighting, scoring). The depth is `L`.
    pub fn new(k: usize, weighting: Weighting, scoring: Scoring) -> BowResult<Self> {
        if k < 2 || L < 1 {
            return Err(BowErr::InvalidShape { k, l: L });
        }
        Ok(Self {
            blocks: Vec::new(),
            words: Vec::new(),
            k,
            levels: L,
            num_nodes: 0,
            weighting,
            scoring,
        })
    }

    /// Build the vocabulary from the descriptors of a set of training images,
    /// replacing any previous tree.
    pub fn create(&mut self, training: &[Vec<D>]) -> BowResult<()> {
        self.create_with_rng(training, &mut thread_rng())
    }

    /// Same as [`Vocabulary::create`] with a caller provided source of randomness
    /// for seeding the clusters.
    pub fn create_with_rng<R: Rng + ?Sized>(
        &mut self,
        training: &[Vec<D>],
        rng: &mut R,
    ) -> BowResult<()> {
        let features: Vec<D> = training.iter().flatten().copied().collect();
        if features.is_empty() {
            return Err(BowErr::EmptyTraining);
        }
        info!(
            "Creating a {}^{} vocabulary from {} descriptors of {} images",
            self.k,
            L,
            features.len(),
            training.len()
        );

        self.blocks.clear();
        self.words.clear();
        // root is node 0
        self.num_nodes = 1;

        // Build with recursive k-medians clustering of features
        self.cluster(&features, 0, SmallVec::new(), 0, rng);

        self.set_word_weights(training);
        info!(
            "Vocabulary created with {} words and {} nodes",
            self.words.len(),
            self.num_nodes
        );
        Ok(())
    }

    /// Transform a set of binary descriptors into its bag of words
    /// representation with respect to the Vocabulary.
    pub fn transform(&self, features: &[D]) -> BowResult<BowVector> {
        self.transform_generic(features, None).map(|(bow, _)| bow)
    }

    /// Transform a set of binary descriptors into its bag of words
    /// representation with respect to the Vocabulary.
    ///
    /// Also provides the "direct index" from the features to their corresponding nodes in the
    /// Vocabulary tree: `feature[i]` is filed under its ancestor node at level `L - levels_up`
    /// (the root when that is not positive, the word itself when the word is shallower).
    pub fn transform_with_direct_idx(
        &self,
        features: &[D],
        levels_up: usize,
    ) -> BowResult<(BowVector, FeatureVector)> {
        self.transform_generic(features, Some(levels_up))
    }

    /// Quantize one descriptor: its word id, the word weight and the node path to the word.
    pub fn transform_one(&self, feature: &D) -> BowResult<(WordId, WordValue, &[NodeId])> {
        // start at root block
        let mut block = self.blocks.first().ok_or(BowErr::EmptyVocabulary)?;

        // traverse tree
        loop {
            let mut best_child: (u32, usize) = (u32::MAX, 0);
            for (child, child_feat) in block.children.features.iter().enumerate() {
                let d = feature.distance(child_feat);
                if d < best_child.0 {
                    best_child = (d, child)
                }
            }
            match &block.children.ids[best_child.1] {
                Child::Block(idx) => {
                    block = &self.blocks[*idx];
                }
                Child::Word(word_id, path) => {
                    let weight = block.children.weights[best_child.1];
                    return Ok((*word_id, weight, path.as_slice()));
                }
            }
        }
    }

    /// Similarity between two bag of words vectors with the vocabulary's scoring.
    pub fn score(&self, a: &BowVector, b: &BowVector) -> f64 {
        self.scoring.score(a, b)
    }

    /// Number of words.
    pub fn size(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn branching_factor(&self) -> usize {
        self.k
    }

    pub fn depth_levels(&self) -> usize {
        L
    }

    /// Depth of the deepest word actually created.
    pub fn effective_levels(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| b.children.ids.iter())
            .filter_map(|c| match c {
                Child::Word(_, path) => Some(path.len()),
                Child::Block(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    /// Changing the scoring does not require rebuilding the tree.
    pub fn set_scoring(&mut self, scoring: Scoring) {
        self.scoring = scoring;
    }

    /// Cluster center of a word.
    pub fn word(&self, id: WordId) -> Option<&D> {
        let w = self.words.get(id as usize)?;
        Some(&self.blocks[w.block].children.features[w.child])
    }

    pub fn word_weight(&self, id: WordId) -> Option<WordValue> {
        let w = self.words.get(id as usize)?;
        Some(self.blocks[w.block].children.weights[w.child])
    }

    /// Ancestor node of a word, `levels_up` levels above it. Root when it overshoots.
    pub fn parent_node(&self, id: WordId, levels_up: usize) -> BowResult<NodeId> {
        let path = self.word_path(id).ok_or(BowErr::InvalidWord(id))?;
        Ok(match path.len().checked_sub(levels_up) {
            Some(depth) if depth > 0 => path[depth - 1],
            _ => 0,
        })
    }

    /// All words below `node`, which may be a word itself.
    pub fn words_from_node(&self, node: NodeId) -> Vec<WordId> {
        (0..self.words.len() as WordId)
            .filter(|&id| {
                node == 0
                    || self
                        .word_path(id)
                        .map_or(false, |path| path.contains(&node))
            })
            .collect()
    }

    /// Zero the weight of every word weighing less than `min_weight`, so that
    /// it is ignored in bag of words vectors. Returns the number of words stopped.
    pub fn stop_words(&mut self, min_weight: WordValue) -> usize {
        let mut stopped = 0;
        for w in self.words.iter() {
            let weight = &mut self.blocks[w.block].children.weights[w.child];
            if *weight < min_weight {
                *weight = 0.;
                stopped += 1;
            }
        }
        stopped
    }

    /// Load a vocabulary from a file
    #[cfg(feature = "bincode")]
    pub fn load<P: AsRef<std::path::Path>>(file: P) -> BowResult<Self> {
        let mut file = std::fs::File::open(file)?;
        let mut buffer: Vec<u8> = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut buffer)?;
        let voc: Self = bincode::deserialize(&buffer)?;
        voc.check_levels()?;
        Ok(voc)
    }

    /// Save vocabulary to a file
    #[cfg(feature = "bincode")]
    pub fn save<P: AsRef<std::path::Path>>(&self, file: P) -> BowResult<()> {
        let serialized = bincode::serialize(&self)?;
        let mut file = std::fs::File::create(file)?;
        std::io::Write::write_all(&mut file, &serialized)?;
        Ok(())
    }
}

/////////////////////                Helpers                 ////////////////////////
/////////////////////////////////////////////////////////////////////////////////////

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(bound = "D: BinaryDescriptor")]
/// A unit representing a non-leaf node in the vocabulary
struct Block<D: BinaryDescriptor, const L: usize> {
    node: NodeId,
    children: Children<D, L>,
}

#[derive(Serialize, Deserialize, PartialEq, Clone)]
#[serde(bound = "D: BinaryDescriptor")]
/// Data structure representing the child nodes of a block, which may
/// or may not be leaves
struct Children<D: BinaryDescriptor, const L: usize> {
    features: Vec<D>,
    weights: Vec<WordValue>,
    cluster_size: Vec<usize>,
    nodes: Vec<NodeId>,
    ids: Vec<Child<L>>,
}

#[derive(Debug, Clone, PartialEq)]
/// A child is either another block (by index) or a word. The Word variant stores the
/// node path to it, which is what the direct index of any feature matching that word needs.
enum Child<const L: usize> {
    Block(usize),
    Word(WordId, NodePath<L>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum SerializableChild {
    Block(usize),
    Word(WordId, Vec<NodeId>),
}

/// Location of a word: block index and child position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct WordRef {
    block: usize,
    child: usize,
}

impl<const L: usize> Serialize for Child<{ L }> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let ser = match self {
            Child::Block(idx) => SerializableChild::Block(*idx),
            Child::Word(id, path) => SerializableChild::Word(*id, path.to_vec()),
        };

        ser.serialize(serializer)
    }
}
impl<'de, const L: usize> Deserialize<'de> for Child<{ L }> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ser = SerializableChild::deserialize(deserializer)?;

        Ok(match ser {
            SerializableChild::Block(idx) => Child::Block(idx),
            SerializableChild::Word(id, path) => Child::Word(id, path.to_smallvec()),
        })
    }
}

impl<D: BinaryDescriptor, const L: usize> Vocabulary<D, { L }> {
    pub(crate) fn check_levels(&self) -> BowResult<()> {
        if self.levels != L {
            return Err(BowErr::LevelMismatch {
                expected: L,
                found: self.levels,
            });
        }
        Ok(())
    }

    fn transform_generic(
        &self,
        features: &[D],
        levels_up: Option<usize>,
    ) -> BowResult<(BowVector, FeatureVector)> {
        if self.is_empty() {
            return Err(BowErr::EmptyVocabulary);
        }
        let mut bow = BowVector::new();
        let mut direct_idx = FeatureVector::new();
        let norm = self.scoring.norm();

        for (i, feature) in features.iter().enumerate() {
            let (word_id, weight, path) = self.transform_one(feature)?;
            if let Some(up) = levels_up {
                direct_idx.add_feature(Self::node_at_level(path, L as isize - up as isize), i);
            }
            if weight > 0. {
                match self.weighting {
                    Weighting::Tf | Weighting::TfIdf => bow.add_weight(word_id, weight),
                    Weighting::Idf | Weighting::Binary => bow.add_if_not_exist(word_id, weight),
                }
            }
        }

        match norm {
            Some(norm) => bow.normalize(norm),
            None => {
                if matches!(self.weighting, Weighting::Tf | Weighting::TfIdf) && !bow.is_empty() {
                    let nd = bow.len() as WordValue;
                    for w in bow.values_mut() {
                        *w /= nd;
                    }
                }
            }
        }

        Ok((bow, direct_idx))
    }

    /// Node of `path` at tree level `level`; root for levels up to 0, the last node
    /// of the path for levels beyond it.
    fn node_at_level(path: &[NodeId], level: isize) -> NodeId {
        if level <= 0 {
            return 0;
        }
        path.get(level as usize - 1)
            .or_else(|| path.last())
            .copied()
            .unwrap_or(0)
    }

    fn word_path(&self, id: WordId) -> Option<&[NodeId]> {
        let w = self.words.get(id as usize)?;
        match &self.blocks[w.block].children.ids[w.child] {
            Child::Word(_, path) => Some(path.as_slice()),
            Child::Block(_) => None,
        }
    }

    /// Split `features` under `node` (at `level`) into at most k children, recursing into
    /// the children that are not words. Returns the index of the new block.
    fn cluster<R: Rng + ?Sized>(
        &mut self,
        features: &[D],
        node: NodeId,
        parent_path: NodePath<L>,
        level: usize,
        rng: &mut R,
    ) -> usize {
        debug!(
            "KMeans step with {} features. node: {}, parents: {:?}, level {}",
            features.len(),
            node,
            parent_path,
            level
        );
        let mut clusters: Vec<D> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        if features.len() <= self.k {
            // Only one feature per cluster
            for (i, f) in features.iter().enumerate() {
                clusters.push(*f);
                groups.push(vec![i]);
            }
        } else {
            // Proceed with kmeans clustering
            clusters = self.initialize_clusters(features, rng);

            for iter in 0..MAX_KMEANS_ITERS {
                let mut new_groups: Vec<Vec<usize>> = vec![Vec::new(); clusters.len()];
                for (i, f) in features.iter().enumerate() {
                    let mut best: (usize, u32) = (0, u32::MAX);
                    for (j, c) in clusters.iter().enumerate() {
                        let d = c.distance(f);
                        if d < best.1 {
                            best = (j, d);
                        }
                    }
                    new_groups[best.0].push(i);
                }

                if groups == new_groups {
                    break; // converged
                }
                if iter + 1 == MAX_KMEANS_ITERS {
                    debug!("KMeans step stopped without converging at node {}", node);
                }

                // update clusters
                clusters = new_groups
                    .iter()
                    .map(|group| {
                        let desc = group.iter().map(|&i| &features[i]).collect::<Vec<&D>>();
                        D::mean(&desc)
                    })
                    .collect();
                groups = new_groups;
            }

            // Empty clusters do not become nodes
            let (kept_clusters, kept_groups): (Vec<D>, Vec<Vec<usize>>) = clusters
                .into_iter()
                .zip(groups.into_iter())
                .filter(|(_, g)| !g.is_empty())
                .unzip();
            clusters = kept_clusters;
            groups = kept_groups;
        }

        // Create block. Children get consecutive node ids before any of them is expanded.
        let block_idx = self.blocks.len();
        let nodes: Vec<NodeId> = groups.iter().map(|_| self.next_node_id()).collect();
        let mut ids: Vec<Child<L>> = Vec::with_capacity(groups.len());
        for (i, g) in groups.iter().enumerate() {
            if level + 1 >= L || g.len() == 1 {
                let mut path = parent_path.clone();
                path.push(nodes[i]);
                let word_id = self.words.len() as WordId;
                self.words.push(WordRef {
                    block: block_idx,
                    child: i,
                });
                ids.push(Child::Word(word_id, path));
            } else {
                // patched below once the child block exists
                ids.push(Child::Block(usize::MAX));
            }
        }

        let children = Children {
            weights: vec![1.; groups.len()],
            cluster_size: groups.iter().map(|g| g.len()).collect(),
            nodes: nodes.clone(),
            ids,
            features: clusters,
        };
        self.blocks.push(Block { node, children });

        // Recurse
        for (i, group) in groups.iter().enumerate() {
            if !matches!(self.blocks[block_idx].children.ids[i], Child::Block(_)) {
                continue;
            }
            // get features from child cluster
            let child_features: Vec<D> = group.iter().map(|&j| features[j]).collect();

            // update parent ids
            let mut path = parent_path.clone();
            path.push(nodes[i]);

            // cluster on child cluster
            let child_idx = self.cluster(&child_features, nodes[i], path, level + 1, rng);
            self.blocks[block_idx].children.ids[i] = Child::Block(child_idx);
        }

        block_idx
    }

    /// Initialize clusters for kmeans with kmeans++ seeding: the first center is chosen
    /// uniformly, the next ones with probability proportional to their squared distance
    /// to the closest center so far. Fewer than k centers are returned when the remaining
    /// features all coincide with a center.
    fn initialize_clusters<R: Rng + ?Sized>(&self, features: &[D], rng: &mut R) -> Vec<D> {
        let mut centers: Vec<D> = Vec::with_capacity(self.k);
        let first = features[rng.gen_range(0..features.len())];
        centers.push(first);
        let mut min_dists: Vec<u64> = features.iter().map(|f| sq_dist(f, &first)).collect();

        while centers.len() < self.k {
            let dist_sum: u64 = min_dists.iter().sum();
            if dist_sum == 0 {
                break;
            }
            let cut = rng.gen_range(0..dist_sum);
            let mut acc = 0;
            let mut chosen = features.len() - 1;
            for (i, &d) in min_dists.iter().enumerate() {
                acc += d;
                if acc > cut {
                    chosen = i;
                    break;
                }
            }
            let center = features[chosen];
            centers.push(center);
            for (d, f) in min_dists.iter_mut().zip(features) {
                *d = (*d).min(sq_dist(f, &center));
            }
        }
        centers
    }

    /// Compute word weights from the training images, after the tree is built.
    fn set_word_weights(&mut self, training: &[Vec<D>]) {
        let weights: Vec<WordValue> = match self.weighting {
            Weighting::Tf | Weighting::Binary => vec![1.; self.words.len()],
            Weighting::Idf | Weighting::TfIdf => {
                // number of images containing each word
                let mut n_i = vec![0usize; self.words.len()];
                let mut seen = vec![usize::MAX; self.words.len()];
                for (image, feats) in training.iter().enumerate() {
                    for f in feats {
                        if let Ok((id, _, _)) = self.transform_one(f) {
                            let id = id as usize;
                            if seen[id] != image {
                                seen[id] = image;
                                n_i[id] += 1;
                            }
                        }
                    }
                }
                let n = training.len() as WordValue;
                n_i.iter()
                    .map(|&c| if c > 0 { (n / c as WordValue).ln() } else { 0. })
                    .collect()
            }
        };
        for (w, weight) in self.words.iter().zip(weights) {
            self.blocks[w.block].children.weights[w.child] = weight;
        }
    }

    /// Provide the next node id.
    fn next_node_id(&mut self) -> NodeId {
        let id = self.num_nodes as NodeId;
        self.num_nodes += 1;
        id
    }
}

#[inline]
fn sq_dist<D: BinaryDescriptor>(a: &D, b: &D) -> u64 {
    let d = a.distance(b) as u64;
    d * d
}

impl<D: BinaryDescriptor, const L: usize> fmt::Debug for Children<D, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Children")
            .field("nodes", &self.nodes)
            .field("ids", &self.ids)
            .field("weights", &self.weights)
            .field("cluster size", &self.cluster_size)
            .finish()
    }
}

impl<D: BinaryDescriptor, const L: usize> fmt::Debug for Vocabulary<D, { L }> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clust_sizes: Vec<usize> = self
            .words
            .iter()
            .map(|w| self.blocks[w.block].children.cluster_size[w.child])
            .collect();
        let sum = clust_sizes.iter().sum::<usize>();
        f.debug_struct("Vocabulary")
            .field("Word/Leaf Nodes", &self.words.len())
            .field("Other Nodes", &self.blocks.len())
            .field("Levels", &L)
            .field("Effective Levels", &self.effective_levels())
            .field("Branching Factor", &self.k)
            .field("Weighting", &self.weighting)
            .field("Scoring", &self.scoring)
            .field("Total Training Features", &sum)
            .field(
                "Min Word Cluster Size",
                &clust_sizes.iter().min().copied().unwrap_or(0),
            )
            .field(
                "Max Word Cluster Size",
                &clust_sizes.iter().max().copied().unwrap_or(0),
            )
            .field(
                "Mean Word Cluster Size",
                &(sum / clust_sizes.len().max(1)),
            )
            .finish()
    }
}

impl<D: BinaryDescriptor, const L: usize> fmt::Display for Vocabulary<D, { L }> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Vocabulary: k = {}, L = {}, Weighting = {}, Scoring = {}, Number of words = {}",
            self.k,
            L,
            self.weighting,
            self.scoring,
            self.size()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    const REGION: usize = 170;

    /// Member `j` of group `g`: the bits of region `g` set, with bit `j` of the region
    /// cleared for `j > 0`. Members of a group are 1 or 2 bits apart, groups 340 bits.
    fn member(g: usize, j: usize) -> BriskDesc {
        let mut d = [0u8; 64];
        for i in g * REGION..(g + 1) * REGION {
            d[i / 8] |= 0x80 >> (i % 8);
        }
        if j > 0 {
            let i = g * REGION + j;
            d[i / 8] &= !(0x80 >> (i % 8));
        }
        BriskDesc::from(d)
    }

    /// Three images, each holding the four members of one group.
    fn three_groups() -> Vec<Vec<BriskDesc>> {
        (0..3)
            .map(|g| (0..4).map(|j| member(g, j)).collect())
            .collect()
    }

    fn build<const L: usize>(k: usize, w: Weighting, s: Scoring) -> Vocabulary<BriskDesc, L> {
        let mut voc = Vocabulary::<BriskDesc, L>::new(k, w, s).unwrap();
        voc.create_with_rng(&three_groups(), &mut StdRng::seed_from_u64(7))
            .unwrap();
        voc
    }

    #[test]
    fn rejects_bad_shape_and_empty_training() {
        assert!(matches!(
            Vocabulary::<BriskDesc, 3>::new(1, Weighting::Tf, Scoring::L1),
            Err(BowErr::InvalidShape { k: 1, l: 3 })
        ));
        let mut voc = Vocabulary::<BriskDesc, 3>::new(3, Weighting::Tf, Scoring::L1).unwrap();
        assert!(matches!(
            voc.create(&[vec![], vec![]]),
            Err(BowErr::EmptyTraining)
        ));
        assert!(matches!(
            voc.transform(&[member(0, 0)]),
            Err(BowErr::EmptyVocabulary)
        ));
    }

    #[test]
    fn few_features_become_words_directly() {
        let mut voc = Vocabulary::<BriskDesc, 2>::new(10, Weighting::Tf, Scoring::L1).unwrap();
        voc.create(&[vec![member(0, 0), member(1, 0), member(2, 0)]])
            .unwrap();
        assert_eq!(voc.size(), 3);
        assert_eq!(voc.effective_levels(), 1);
        for id in 0..3 {
            assert_eq!(voc.parent_node(id, 1).unwrap(), 0);
        }
        assert_eq!(voc.transform_one(&member(2, 3)).unwrap().0, 2);
    }

    #[test]
    fn separated_groups_land_in_different_subtrees() {
        // k = 4 > 3 groups: every feature ends up as its own word
        let voc = build::<2>(4, Weighting::Tf, Scoring::L1);
        assert_eq!(voc.size(), 12);
        assert_eq!(voc.effective_levels(), 2);

        let a = voc.transform_one(&member(0, 1)).unwrap().2.to_vec();
        let c = voc.transform_one(&member(2, 1)).unwrap().2.to_vec();
        assert_ne!(a[0], c[0]);
        // first level nodes are 1..=4
        assert!((1..=4).contains(&a[0]) && (1..=4).contains(&c[0]));
    }

    #[test]
    fn depth_one_vocabulary_has_k_words() {
        let voc = build::<1>(3, Weighting::Tf, Scoring::L1);
        assert_eq!(voc.size(), 3);
        let bow = voc
            .transform(&[member(0, 0), member(0, 1), member(1, 1)])
            .unwrap();
        assert_eq!(bow.len(), 2);
        let total: f64 = bow.iter().map(|(_, v)| v).sum();
        assert!((total - 1.).abs() < 1e-12);
    }

    #[test]
    fn create_replaces_previous_tree() {
        let mut voc = build::<2>(4, Weighting::TfIdf, Scoring::L1);
        assert_eq!(voc.size(), 12);

        voc.create_with_rng(
            &[vec![member(1, 0), member(1, 1)]],
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap();
        assert_eq!(voc.size(), 2);
        assert_eq!(voc.words_from_node(0).len(), 2);
        assert_eq!(voc.effective_levels(), 1);
        assert_eq!(voc.word(2), None);
        // single training image: idf is ln(1 / 1)
        assert_eq!(voc.word_weight(0), Some(0.));
        assert_eq!(voc.transform_one(&member(0, 0)).unwrap().2.len(), 1);
    }

    #[test]
    fn identical_features_are_not_split() {
        let mut voc = Vocabulary::<BriskDesc, 3>::new(2, Weighting::Tf, Scoring::L1).unwrap();
        voc.create(&[vec![member(1, 2); 9]]).unwrap();
        assert_eq!(voc.size(), 1);
        assert_eq!(voc.word(0), Some(&member(1, 2)));
    }

    #[test]
    fn idf_weights_count_images() {
        // word of group 0 appears in 2 of 3 images, the others in 1
        let mut training = three_groups();
        training[1].push(member(0, 0));
        let mut voc = Vocabulary::<BriskDesc, 1>::new(3, Weighting::TfIdf, Scoring::L1).unwrap();
        voc.create_with_rng(&training, &mut StdRng::seed_from_u64(1))
            .unwrap();

        let (w0, weight0, _) = voc.transform_one(&member(0, 0)).unwrap();
        let (_, weight2, _) = voc.transform_one(&member(2, 0)).unwrap();
        assert!((weight0 - (3f64 / 2.).ln()).abs() < 1e-12);
        assert!((weight2 - 3f64.ln()).abs() < 1e-12);
        assert_eq!(voc.word_weight(w0), Some(weight0));
    }

    #[test]
    fn stop_words_zero_low_weights() {
        let mut training = three_groups();
        training[1].push(member(0, 0));
        training[2].push(member(0, 0));
        let mut voc = Vocabulary::<BriskDesc, 1>::new(3, Weighting::Idf, Scoring::L1).unwrap();
        voc.create_with_rng(&training, &mut StdRng::seed_from_u64(3))
            .unwrap();

        // group 0 is in every image: idf = ln(1) = 0 already
        assert_eq!(voc.stop_words(0.5), 1);
        let bow = voc.transform(&[member(0, 0), member(1, 0)]).unwrap();
        assert_eq!(bow.len(), 1);
    }

    #[test]
    fn tf_without_norm_divides_by_distinct_words() {
        let voc = build::<1>(3, Weighting::Tf, Scoring::DotProduct);
        let bow = voc
            .transform(&[member(0, 0), member(0, 1), member(1, 0)])
            .unwrap();
        let mut values: Vec<f64> = bow.iter().map(|(_, v)| v).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![0.5, 1.]);
    }

    #[test]
    fn binary_weighting_ignores_repetitions() {
        let voc = build::<1>(3, Weighting::Binary, Scoring::L1);
        let bow = voc
            .transform(&[member(0, 0), member(0, 1), member(0, 2), member(1, 0)])
            .unwrap();
        assert_eq!(bow.len(), 2);
        for (_, v) in bow.iter() {
            assert!((v - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn direct_index_files_features_by_level() {
        let voc = build::<2>(4, Weighting::Tf, Scoring::L1);
        let feats = [member(0, 0), member(0, 0), member(2, 0)];

        let (_, by_top) = voc.transform_with_direct_idx(&feats, 1).unwrap();
        assert_eq!(by_top.len(), 2);
        let top = voc.transform_one(&member(0, 0)).unwrap().2[0];
        assert_eq!(by_top.features(top), Some(&[0, 1][..]));

        let (_, by_root) = voc.transform_with_direct_idx(&feats, 5).unwrap();
        assert_eq!(by_root.features(0), Some(&[0, 1, 2][..]));
    }

    #[test]
    fn words_from_node_and_parents_agree() {
        let voc = build::<2>(4, Weighting::Tf, Scoring::L1);
        let (word, _, path) = voc.transform_one(&member(1, 0)).unwrap();
        let expected = if path.len() > 1 { path[path.len() - 2] } else { 0 };
        let parent = voc.parent_node(word, 1).unwrap();
        assert_eq!(parent, expected);
        assert!(voc.words_from_node(parent).contains(&word));
        assert_eq!(voc.words_from_node(0).len(), voc.size());
        assert!(matches!(
            voc.parent_node(999, 1),
            Err(BowErr::InvalidWord(999))
        ));
    }

    #[test]
    fn same_image_scores_one() {
        let voc = build::<2>(4, Weighting::TfIdf, Scoring::L1);
        let img = three_groups()[0].clone();
        let a = voc.transform(&img).unwrap();
        assert!((voc.score(&a, &a) - 1.).abs() < 1e-9);
    }

    #[test]
    fn display_summary() {
        let voc = build::<2>(4, Weighting::TfIdf, Scoring::L1);
        assert_eq!(
            voc.to_string(),
            "Vocabulary: k = 4, L = 2, Weighting = tf-idf, Scoring = L1-norm, Number of words = 12"
        );
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn save_and_load() {
        let voc = build::<2>(4, Weighting::TfIdf, Scoring::L2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.voc");
        voc.save(&path).unwrap();

        let loaded = Vocabulary::<BriskDesc, 2>::load(&path).unwrap();
        assert_eq!(voc, loaded);
        assert!(matches!(
            Vocabulary::<BriskDesc, 3>::load(&path),
            Err(BowErr::LevelMismatch {
                expected: 3,
                found: 2
            })
        ));
    }
}
