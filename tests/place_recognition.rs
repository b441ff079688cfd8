use bbow::{BowErr, BriskDesc, Database, Scoring, Vocabulary, Weighting};
use rand::{rngs::StdRng, Rng, SeedableRng};

const LEVELS: usize = 3;

fn random_images(rng: &mut StdRng, images: usize, per_image: usize) -> Vec<Vec<BriskDesc>> {
    (0..images)
        .map(|_| {
            (0..per_image)
                .map(|_| {
                    let mut d = [0u8; 64];
                    rng.fill(&mut d[..]);
                    BriskDesc::from(d)
                })
                .collect()
        })
        .collect()
}

/// Flip one bit of every descriptor.
fn perturb(image: &[BriskDesc]) -> Vec<BriskDesc> {
    image
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let mut bytes = d.0;
            bytes[i % 64] ^= 0x01;
            BriskDesc::from(bytes)
        })
        .collect()
}

fn setup(scoring: Scoring) -> (Vec<Vec<BriskDesc>>, Database<BriskDesc, LEVELS>) {
    let mut rng = StdRng::seed_from_u64(2011);
    let images = random_images(&mut rng, 6, 30);
    let mut voc = Vocabulary::<BriskDesc, LEVELS>::new(4, Weighting::TfIdf, scoring).unwrap();
    voc.create_with_rng(&images, &mut rng).unwrap();

    let mut db = Database::new(voc, false, 0);
    for img in images.iter() {
        db.add(img).unwrap();
    }
    (images, db)
}

#[test]
fn every_image_retrieves_itself_first() {
    for &scoring in [Scoring::L1, Scoring::L2, Scoring::Bhattacharyya].iter() {
        let (images, db) = setup(scoring);
        assert_eq!(db.size(), images.len());
        for (i, img) in images.iter().enumerate() {
            let ret = db.query(img, 4, None).unwrap();
            assert!(ret.len() <= 4);
            assert_eq!(ret[0].entry_id as usize, i, "{}: {}", scoring, ret);
            assert!((ret[0].score - 1.).abs() < 1e-6);
            assert!(ret.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }
}

#[test]
fn kl_ranks_lowest_divergence_first() {
    let (images, db) = setup(Scoring::Kl);
    let ret = db.query(&images[3], 0, None).unwrap();
    assert_eq!(ret[0].entry_id, 3);
    assert!(ret[0].score.abs() < 1e-6);
    assert!(ret.windows(2).all(|w| w[0].score <= w[1].score));
}

#[test]
fn slightly_changed_image_is_recognized() {
    let (images, db) = setup(Scoring::L1);
    let query = perturb(&images[2]);
    let ret = db.query(&query, 1, None).unwrap();
    assert_eq!(ret[0].entry_id, 2);
}

#[cfg(feature = "bincode")]
#[test]
fn vocabulary_and_database_survive_disk() {
    let (images, db) = setup(Scoring::L1);
    let dir = tempfile::tempdir().unwrap();

    let voc_path = dir.path().join("voc.bow");
    db.vocabulary().save(&voc_path).unwrap();
    let voc = Vocabulary::<BriskDesc, LEVELS>::load(&voc_path).unwrap();
    assert_eq!(&voc, db.vocabulary());
    assert_eq!(
        voc.transform(&images[0]).unwrap(),
        db.vocabulary().transform(&images[0]).unwrap()
    );

    let db_path = dir.path().join("db.bow");
    db.save(&db_path).unwrap();
    let db2 = Database::<BriskDesc, LEVELS>::load(&db_path).unwrap();
    assert_eq!(db2.size(), images.len());
    assert_eq!(db2.to_string(), db.to_string());
    assert_eq!(
        db2.query(&images[4], 3, None).unwrap(),
        db.query(&images[4], 3, None).unwrap()
    );

    assert!(matches!(
        Database::<BriskDesc, 2>::load(&db_path),
        Err(BowErr::LevelMismatch { .. })
    ));
    assert!(matches!(
        Vocabulary::<BriskDesc, LEVELS>::load(dir.path().join("missing.bow")),
        Err(BowErr::Io(_))
    ));
}
