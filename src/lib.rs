use thiserror::Error;

/// Binary keypoint descriptors that can be clustered into a vocabulary.
pub mod descriptor;
pub use descriptor::{BinDesc, BinaryDescriptor, BriskDesc, OrbDesc};

/// Sparse bag of words vectors and per-image direct index.
pub mod bow;
pub use bow::{BowVector, EntryId, FeatureVector, NodeId, Norm, WordId, WordValue};

/// Word weighting schemes and similarity scores between bag of words vectors.
pub mod scoring;
pub use scoring::{Scoring, Weighting};

/// Implementation of a hierarchical visual bag-of-words vocabulary,
/// which provides the main functionality of this crate.
pub mod vocab;
pub use vocab::Vocabulary;

/// Image database with an inverted index over vocabulary words.
pub mod database;
pub use database::{Database, QueryResult, QueryResults};

/// Listing of the training/query images of a dataset directory.
pub mod dataset;
pub use dataset::ImageGlob;

/// Utilities for extracting BRISK keypoint descriptors using opencv.
#[cfg(feature = "opencv")]
pub mod opencv_utils;
#[cfg(feature = "opencv")]
pub use opencv_utils::*;

pub type BowResult<T> = std::result::Result<T, BowErr>;

#[derive(Error, Debug)]
pub enum BowErr {
    #[error("Io Error")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "bincode")]
    #[error("Serialization Error")]
    Bincode(#[from] bincode::Error),
    #[cfg(feature = "opencv")]
    #[error("Opencv Error")]
    OpenCvInternal(#[from] opencv::Error),
    #[cfg(feature = "opencv")]
    #[error("Opencv Descriptor decode error")]
    OpenCvDecode,
    #[error("Invalid vocabulary shape: k = {k}, L = {l}")]
    InvalidShape { k: usize, l: usize },
    #[error("Vocabulary has {found} levels, expected {expected}")]
    LevelMismatch { expected: usize, found: usize },
    #[error("No training descriptors")]
    EmptyTraining,
    #[error("Vocabulary is empty")]
    EmptyVocabulary,
    #[error("Unknown weighting type: {0}")]
    UnknownWeighting(String),
    #[error("Unknown scoring type: {0}")]
    UnknownScoring(String),
    #[error("No such database entry: {0}")]
    InvalidEntry(EntryId),
    #[error("No such word: {0}")]
    InvalidWord(WordId),
    #[error("Database is full: {0} entries")]
    DatabaseFull(usize),
}
