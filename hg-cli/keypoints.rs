//! Keypoint files as written by the feature extraction script: a JSON object
//! mapping each keypoint index to
//! `[[x, y], size, angle, response, octave, class_id, [descriptor...]]`.

use std::collections::BTreeMap;
use std::path::Path;

use hg_core::{Feature, FeatureSet, Keypoint, Point2};
use serde::{Deserialize, Serialize};

use crate::{RegistrationError, RegistrationResult};

/// One serialized keypoint entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeypointRecord([f32; 2], f32, f32, f32, i32, i32, Vec<f32>);

impl From<&Feature> for KeypointRecord {
    fn from(f: &Feature) -> Self {
        let kp = &f.keypoint;
        KeypointRecord(
            [kp.pt.x, kp.pt.y],
            kp.size,
            kp.angle,
            kp.response,
            kp.octave,
            kp.class_id.unwrap_or(-1),
            f.descriptor.clone(),
        )
    }
}

impl From<KeypointRecord> for Feature {
    fn from(r: KeypointRecord) -> Self {
        let KeypointRecord([x, y], size, angle, response, octave, class_id, descriptor) = r;
        Feature::new(
            Keypoint {
                pt: Point2::new(x, y),
                size,
                angle,
                response,
                octave,
                class_id: (class_id >= 0).then_some(class_id),
            },
            descriptor,
        )
    }
}

/// Parse a keypoint document; entries are ordered by their numeric index
pub fn parse_keypoints(json: &str) -> RegistrationResult<FeatureSet> {
    let raw: BTreeMap<String, KeypointRecord> = serde_json::from_str(json)?;

    let mut indexed = raw
        .into_iter()
        .map(|(key, record)| {
            key.parse::<usize>()
                .map(|i| (i, record))
                .map_err(|_| RegistrationError::InvalidKeypointFile(format!("non-numeric keypoint index '{}'", key)))
        })
        .collect::<RegistrationResult<Vec<_>>>()?;
    indexed.sort_by_key(|(i, _)| *i);

    if let Some(pos) = indexed.iter().enumerate().position(|(pos, (i, _))| pos != *i) {
        return Err(RegistrationError::InvalidKeypointFile(format!("keypoint index {} is missing", pos)));
    }

    let features = indexed.into_iter().map(|(_, r)| Feature::from(r)).collect();
    Ok(FeatureSet::from_features(features)?)
}

pub fn load_keypoints<P: AsRef<Path>>(path: P) -> RegistrationResult<FeatureSet> {
    let content = std::fs::read_to_string(path)?;
    parse_keypoints(&content)
}

pub fn keypoints_to_json(set: &FeatureSet) -> RegistrationResult<String> {
    let doc: BTreeMap<String, KeypointRecord> = set
        .iter()
        .enumerate()
        .map(|(i, f)| (i.to_string(), KeypointRecord::from(f)))
        .collect();
    Ok(serde_json::to_string(&doc)?)
}

pub fn save_keypoints<P: AsRef<Path>>(set: &FeatureSet, path: P) -> RegistrationResult<()> {
    std::fs::write(path, keypoints_to_json(set)? + "\n")?;
    Ok(())
}
