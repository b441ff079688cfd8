use crate::{BinaryDescriptor, BowErr, BowResult, BriskDesc, ImageGlob};
use log::{debug, info};
use opencv::{self, core::MatTrait, prelude::Feature2DTrait};
use std::path::Path;

type CvImage = opencv::prelude::Mat;
type CvMat = opencv::core::Mat;

/// BRISK detection and description parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BriskParams {
    /// FAST/AGAST detection threshold.
    pub threshold: i32,
    /// Number of detection octaves, 0 for single scale.
    pub octaves: i32,
    /// Keypoints kept per image, strongest first. 0 keeps all.
    pub max_keypoints: usize,
    /// Scale of the sampling pattern.
    pub pattern_scale: f32,
}

impl Default for BriskParams {
    fn default() -> Self {
        Self {
            threshold: 20,
            octaves: 2,
            max_keypoints: 400,
            pattern_scale: 1.0,
        }
    }
}

/// Extract BRISK keypoint descriptors from an image, one descriptor per detected keypoint.
pub fn brisk_from_cvimage(cv_img: &CvImage, params: &BriskParams) -> BowResult<Vec<BriskDesc>> {
    // Create detector/extractor
    let mut brisk = <dyn opencv::features2d::BRISK>::create(
        params.threshold,
        params.octaves,
        params.pattern_scale,
    )?;

    // Detect keypoints, keep the strongest, and compute descriptors
    let mut kps = opencv::types::VectorOfKeyPoint::new();
    let mut desc = CvMat::default()?;
    let mask = CvMat::default()?;
    brisk.detect(cv_img, &mut kps, &mask)?;
    if params.max_keypoints > 0 && kps.len() > params.max_keypoints {
        opencv::features2d::KeyPointsFilter::retain_best(&mut kps, params.max_keypoints as i32)?;
    }
    brisk.compute(cv_img, &mut kps, &mut desc)?;

    descriptor_rows(&desc)
}

/// Split a descriptor matrix into one descriptor per row.
fn descriptor_rows(desc: &CvMat) -> BowResult<Vec<BriskDesc>> {
    if desc.rows() == 0 {
        return Ok(Vec::new());
    }
    if desc.cols() as usize != BriskDesc::BYTES {
        return Err(BowErr::OpenCvDecode);
    }
    (0..desc.rows())
        .map(|i| {
            let row = (0..desc.cols())
                .map(|j| desc.at_2d::<u8>(i, j).map(|b| *b))
                .collect::<opencv::Result<Vec<u8>>>()?;
            BriskDesc::from_bytes(&row).ok_or(BowErr::OpenCvDecode)
        })
        .collect()
}

/// Use opencv to load an image as grayscale and extract BRISK keypoint descriptors.
pub fn load_img_get_descs<P: AsRef<Path>>(
    path: P,
    params: &BriskParams,
) -> BowResult<Vec<BriskDesc>> {
    let img: CvImage = opencv::imgcodecs::imread(
        &path.as_ref().to_string_lossy(),
        opencv::imgcodecs::IMREAD_GRAYSCALE,
    )?;
    if img.empty()? {
        return Err(BowErr::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("could not read image {:?}", path.as_ref()),
        )));
    }
    brisk_from_cvimage(&img, params)
}

/// Extract BRISK descriptors from every image selected by `images`, one set per image.
pub fn load_features(images: &ImageGlob, params: &BriskParams) -> BowResult<Vec<Vec<BriskDesc>>> {
    let paths = images.list()?;
    info!("Extracting BRISK features from {} images...", paths.len());
    let mut features = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        info!("im: {}", i * images.step.max(1));
        let descs = load_img_get_descs(path, params)?;
        debug!("{} descriptors in {:?}", descs.len(), path);
        features.push(descs);
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC1};

    /// A single channel byte matrix holding `rows`.
    fn desc_mat(rows: &[Vec<u8>]) -> CvMat {
        let cols = rows[0].len() as i32;
        let mut m =
            CvMat::new_rows_cols_with_default(rows.len() as i32, cols, CV_8UC1, Scalar::all(0.))
                .unwrap();
        for (i, row) in rows.iter().enumerate() {
            for (j, &b) in row.iter().enumerate() {
                *m.at_2d_mut::<u8>(i as i32, j as i32).unwrap() = b;
            }
        }
        m
    }

    #[test]
    fn one_descriptor_per_row_in_order() {
        let first: Vec<u8> = (0..64).collect();
        let second = vec![0xa5u8; 64];
        let descs = descriptor_rows(&desc_mat(&[first.clone(), second.clone()])).unwrap();
        assert_eq!(descs.len(), 2);
        assert_eq!(descs[0].as_bytes(), &first[..]);
        assert_eq!(descs[1].as_bytes(), &second[..]);
    }

    #[test]
    fn no_keypoints_give_no_descriptors() {
        let empty = CvMat::default().unwrap();
        assert!(descriptor_rows(&empty).unwrap().is_empty());
    }

    #[test]
    fn orb_sized_rows_are_rejected() {
        let orb = desc_mat(&[vec![1u8; 32], vec![2u8; 32]]);
        assert!(matches!(descriptor_rows(&orb), Err(BowErr::OpenCvDecode)));
    }
}
