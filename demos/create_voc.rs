//! Extract BRISK descriptors from a directory of images, build a k^L vocabulary over
//! them and save it. With `--database`, also build and query a database of the images.
use bbow::{BowResult, BriskDesc, Scoring, Weighting};
use std::path::PathBuf;
use structopt::StructOpt;

mod common;
use common::{BriskVocabulary, ImageOpts, LEVELS};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "create_voc",
    about = "Create a BRISK bag of words vocabulary from a directory of images"
)]
struct Opt {
    #[structopt(flatten)]
    images: ImageOpts,
    /// Branching factor.
    #[structopt(short, default_value = "10")]
    k: usize,
    /// tf, idf, tf-idf or binary.
    #[structopt(long, default_value = "tf-idf")]
    weighting: Weighting,
    /// l1, l2, chi-square, kl, bhattacharyya or dot-product.
    #[structopt(long, default_value = "l1")]
    scoring: Scoring,
    /// Where to save the vocabulary.
    #[structopt(short, long, default_value = "large_voc.bow", parse(from_os_str))]
    output: PathBuf,
    /// Also build and query a database with the new vocabulary.
    #[structopt(long)]
    database: bool,
    /// Where to save the database.
    #[structopt(long, default_value = "small_db.bow", parse(from_os_str))]
    db_output: PathBuf,
    /// Results per database query.
    #[structopt(long, default_value = "4")]
    results: usize,
}

fn test_voc_creation(opt: &Opt, features: &[Vec<BriskDesc>]) -> BowResult<()> {
    let mut voc = BriskVocabulary::new(opt.k, opt.weighting, opt.scoring)?;

    println!("Creating a large {}^{} vocabulary...", opt.k, LEVELS);
    voc.create(features)?;
    println!("... done!");

    println!("Vocabulary information: \n{}\n{:#?}\n", voc, voc);

    // save the vocabulary to disk
    println!("\nSaving vocabulary...");
    voc.save(&opt.output)?;
    println!("Done");
    Ok(())
}

fn main() -> BowResult<()> {
    common::init_logging();
    let opt = Opt::from_args();

    let features = opt.images.load_features()?;
    test_voc_creation(&opt, &features)?;

    if opt.database {
        common::test_database(&features, &opt.output, &opt.db_output, opt.results)?;
    }
    Ok(())
}
