#[cfg(feature = "bincode")]
use bincode;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::{fmt, ops::Deref};

use crate::*;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(bound = "D: BinaryDescriptor")]
/// Image database over a [`Vocabulary`]. Images are added as entries and can be queried
/// for the most similar entries. Keeps:
/// 1. An inverted index: for each word, the entries containing it and the word's weight there.
/// 2. Optionally a direct index: for each entry, its features grouped by vocabulary node
///    `direct_index_levels` levels above the words.
pub struct Database<D: BinaryDescriptor, const L: usize> {
    voc: Vocabulary<D, L>,
    use_di: bool,
    di_levels: usize,
    ifile: Vec<Vec<IfPair>>,
    dfile: Vec<FeatureVector>,
    n_entries: usize,
}

/// Row item of the inverted index.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
struct IfPair {
    entry: EntryId,
    value: WordValue,
}

/// A database entry returned by a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub entry_id: EntryId,
    pub score: f64,
    /// Number of words shared by the query and the entry.
    pub n_words: usize,
}

/// Query results, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResults(Vec<QueryResult>);

impl<D: BinaryDescriptor, const L: usize> Database<D, { L }> {
    /// Create an empty database that takes ownership of `voc`.
    ///
    /// `direct_index_levels` is only used when `use_direct_index` is set.
    pub fn new(voc: Vocabulary<D, L>, use_direct_index: bool, direct_index_levels: usize) -> Self {
        let words = voc.size();
        Self {
            voc,
            use_di: use_direct_index,
            di_levels: direct_index_levels,
            ifile: vec![Vec::new(); words],
            dfile: Vec::new(),
            n_entries: 0,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary<D, L> {
        &self.voc
    }

    /// Replace the vocabulary. All entries are removed.
    pub fn set_vocabulary(&mut self, voc: Vocabulary<D, L>) {
        self.voc = voc;
        self.clear();
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.n_entries
    }

    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    pub fn using_direct_index(&self) -> bool {
        self.use_di
    }

    pub fn direct_index_levels(&self) -> usize {
        self.di_levels
    }

    /// Remove all entries, keeping the vocabulary.
    pub fn clear(&mut self) {
        self.ifile = vec![Vec::new(); self.voc.size()];
        self.dfile.clear();
        self.n_entries = 0;
    }

    /// Reserve room for `entries` more entries, and `per_word` more entries in every
    /// row of the inverted index.
    pub fn allocate(&mut self, entries: usize, per_word: usize) {
        if self.use_di {
            self.dfile.reserve(entries);
        }
        if per_word > 0 {
            for row in self.ifile.iter_mut() {
                row.reserve(per_word);
            }
        }
    }

    /// Add the descriptors of an image. Returns the id of the new entry.
    pub fn add(&mut self, features: &[D]) -> BowResult<EntryId> {
        if self.use_di {
            let (bow, fvec) = self.voc.transform_with_direct_idx(features, self.di_levels)?;
            self.add_bow(&bow, Some(fvec))
        } else {
            let bow = self.voc.transform(features)?;
            self.add_bow(&bow, None)
        }
    }

    /// Add an image already transformed by the vocabulary. The feature vector is kept only
    /// when the direct index is in use.
    ///
    /// Fails with `DatabaseFull` once every `EntryId` is taken.
    pub fn add_bow(
        &mut self,
        bow: &BowVector,
        fvec: Option<FeatureVector>,
    ) -> BowResult<EntryId> {
        let entry =
            EntryId::try_from(self.n_entries).map_err(|_| BowErr::DatabaseFull(self.n_entries))?;
        self.n_entries += 1;

        for (word, value) in bow.iter() {
            let word = word as usize;
            if word >= self.ifile.len() {
                self.ifile.resize(word + 1, Vec::new());
            }
            self.ifile[word].push(IfPair { entry, value });
        }

        if self.use_di {
            self.dfile.push(fvec.unwrap_or_default());
        }
        Ok(entry)
    }

    /// Query the database with the descriptors of an image.
    ///
    /// Returns at most `max_results` entries (all if 0), only considering entries with
    /// id `<= max_id` when given.
    pub fn query(
        &self,
        features: &[D],
        max_results: usize,
        max_id: Option<EntryId>,
    ) -> BowResult<QueryResults> {
        let bow = self.voc.transform(features)?;
        Ok(self.query_bow(&bow, max_results, max_id))
    }

    /// Query the database with an image already transformed by the vocabulary.
    ///
    /// Only entries sharing at least one word with the query are scored. The score of each
    /// is the vocabulary's [`Scoring`] between `bow` and the entry.
    pub fn query_bow(
        &self,
        bow: &BowVector,
        max_results: usize,
        max_id: Option<EntryId>,
    ) -> QueryResults {
        let scoring = self.voc.scoring();
        let mut acc: HashMap<EntryId, (f64, usize)> = HashMap::new();
        let mut missing = 0.;

        for (word, qvalue) in bow.iter() {
            missing += scoring.missing_term(qvalue);
            let row = match self.ifile.get(word as usize) {
                Some(row) => row,
                None => continue,
            };
            for pair in row {
                if max_id.map_or(false, |max| pair.entry > max) {
                    continue;
                }
                let e = acc.entry(pair.entry).or_insert((0., 0));
                e.0 += scoring.common_term(qvalue, pair.value);
                e.1 += 1;
            }
        }

        let mut results: Vec<QueryResult> = acc
            .into_iter()
            .map(|(entry_id, (a, n_words))| QueryResult {
                entry_id,
                score: scoring.finish(a, missing),
                n_words,
            })
            .collect();

        // KL is a divergence, the others are similarities
        let ascending = matches!(scoring, Scoring::Kl);
        results.sort_by(|a, b| {
            let by_score = if ascending {
                a.score.partial_cmp(&b.score)
            } else {
                b.score.partial_cmp(&a.score)
            };
            by_score
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.entry_id.cmp(&b.entry_id))
        });
        if max_results > 0 {
            results.truncate(max_results);
        }
        QueryResults(results)
    }

    /// Direct index of an entry. Requires the database to use the direct index.
    pub fn retrieve_features(&self, entry: EntryId) -> BowResult<&FeatureVector> {
        if !self.use_di {
            return Err(BowErr::InvalidEntry(entry));
        }
        self.dfile
            .get(entry as usize)
            .ok_or(BowErr::InvalidEntry(entry))
    }

    /// Load a database, including its vocabulary, from a file
    #[cfg(feature = "bincode")]
    pub fn load<P: AsRef<std::path::Path>>(file: P) -> BowResult<Self> {
        let mut file = std::fs::File::open(file)?;
        let mut buffer: Vec<u8> = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut buffer)?;
        let db: Self = bincode::deserialize(&buffer)?;
        db.voc.check_levels()?;
        info!("Loaded database with {} entries", db.n_entries);
        Ok(db)
    }

    /// Save the database, including its vocabulary, to a file
    #[cfg(feature = "bincode")]
    pub fn save<P: AsRef<std::path::Path>>(&self, file: P) -> BowResult<()> {
        let serialized = bincode::serialize(&self)?;
        let mut file = std::fs::File::create(file)?;
        std::io::Write::write_all(&mut file, &serialized)?;
        info!("Saved database with {} entries", self.n_entries);
        Ok(())
    }
}

impl<D: BinaryDescriptor, const L: usize> fmt::Display for Database<D, { L }> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database: Entries = {}, Using direct index = ", self.n_entries)?;
        if self.use_di {
            write!(f, "yes (levels up = {}). ", self.di_levels)?;
        } else {
            write!(f, "no. ")?;
        }
        write!(f, "{}", self.voc)
    }
}

impl QueryResults {
    pub fn into_inner(self) -> Vec<QueryResult> {
        self.0
    }
}

impl Deref for QueryResults {
    type Target = [QueryResult];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<EntryId: {}, Score: {}>", self.entry_id, self.score)
    }
}

impl fmt::Display for QueryResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryResults: ")?;
        for (i, r) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}
