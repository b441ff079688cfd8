// Shared by every demo, each uses a part of it.
#![allow(dead_code)]

use bbow::{BowResult, BriskDesc, BriskParams, Database, ImageGlob, Vocabulary};
use std::path::{Path, PathBuf};
use structopt::StructOpt;

/// Depth of the vocabulary tree.
pub const LEVELS: usize = 6;

pub type BriskVocabulary = Vocabulary<BriskDesc, LEVELS>;
pub type BriskDatabase = Database<BriskDesc, LEVELS>;

/// Where the images are and how to describe them.
#[derive(Debug, StructOpt)]
pub struct ImageOpts {
    /// Directory holding the images.
    #[structopt(parse(from_os_str))]
    pub images: PathBuf,
    /// Extension of the images to use.
    #[structopt(long, default_value = "png")]
    pub ext: String,
    /// Use one image every `step`.
    #[structopt(long, default_value = "6")]
    pub step: usize,
    /// BRISK detection threshold.
    #[structopt(long, default_value = "20")]
    pub threshold: i32,
    /// BRISK detection octaves.
    #[structopt(long, default_value = "2")]
    pub octaves: i32,
    /// Maximum number of keypoints per image.
    #[structopt(long, default_value = "400")]
    pub max_keypoints: usize,
}

impl ImageOpts {
    /// BRISK descriptors of every selected image.
    pub fn load_features(&self) -> BowResult<Vec<Vec<BriskDesc>>> {
        let glob = ImageGlob::new(&self.images)
            .extension(&self.ext)
            .step(self.step);
        let params = BriskParams {
            threshold: self.threshold,
            octaves: self.octaves,
            max_keypoints: self.max_keypoints,
            ..Default::default()
        };
        println!("Extracting BRISK features...");
        bbow::load_features(&glob, &params)
    }
}

pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Build a database over the vocabulary in `voc_path`, query it with every image,
/// then save it and load it back.
pub fn test_database(
    features: &[Vec<BriskDesc>],
    voc_path: &Path,
    db_path: &Path,
    max_results: usize,
) -> BowResult<()> {
    println!("Creating a small database...");

    // load the vocabulary from disk
    let voc = BriskVocabulary::load(voc_path)?;

    // no direct index, so the levels are ignored
    let mut db = BriskDatabase::new(voc, false, 0);

    // add images to the database
    for f in features {
        db.add(f)?;
    }

    println!("... done!");
    println!("Database information: \n{}", db);

    // and query the database
    println!("Querying the database: ");
    for (i, f) in features.iter().enumerate() {
        let ret = db.query(f, max_results, None)?;

        // ret[0] is the image itself, ret[1] the best other match
        println!("Searching for Image {}. {}", i, ret);
    }
    println!();

    // the saved file includes the vocabulary and the entries
    println!("Saving database...");
    db.save(db_path)?;
    println!("... done!");

    println!("Retrieving database once again...");
    let db2 = BriskDatabase::load(db_path)?;
    println!("... done! This is: \n{}", db2);
    Ok(())
}
