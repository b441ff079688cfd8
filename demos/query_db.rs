//! Build a database of images over an existing vocabulary, query it with every image,
//! and save and reload it.
use std::path::PathBuf;
use structopt::StructOpt;

mod common;
use common::ImageOpts;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "query_db",
    about = "Query a BRISK bag of words database with its own images"
)]
struct Opt {
    #[structopt(flatten)]
    images: ImageOpts,
    /// Vocabulary to build the database on.
    #[structopt(short, long, default_value = "small_voc.bow", parse(from_os_str))]
    vocabulary: PathBuf,
    /// Where to save the database.
    #[structopt(short, long, default_value = "small_db.bow", parse(from_os_str))]
    output: PathBuf,
    /// Results per query.
    #[structopt(long, default_value = "4")]
    results: usize,
}

fn main() -> bbow::BowResult<()> {
    common::init_logging();
    let opt = Opt::from_args();

    let features = opt.images.load_features()?;
    common::test_database(&features, &opt.vocabulary, &opt.output, opt.results)
}
