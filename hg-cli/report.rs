use std::path::Path;

use hg_core::ResultRecord;
use serde::{Deserialize, Serialize};

use crate::RegistrationResult;

/// Serialized form of a [`ResultRecord`]: projected vertices plus stage times
/// in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultReport {
    pub vertices: [[f32; 2]; 4],
    pub ftime: f64,
    pub mtime: f64,
    pub htime: f64,
    pub correspondences: usize,
    pub inliers: usize,
}

impl From<&ResultRecord> for ResultReport {
    fn from(record: &ResultRecord) -> Self {
        let timing = record.timing();
        Self {
            vertices: record.quad().vertices().map(|p| [p.x, p.y]),
            ftime: timing.feature.as_secs_f64(),
            mtime: timing.matching.as_secs_f64(),
            htime: timing.homography.as_secs_f64(),
            correspondences: record.correspondences(),
            inliers: record.inliers(),
        }
    }
}

impl ResultReport {
    pub fn to_json(&self) -> RegistrationResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> RegistrationResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_core::{Quadrilateral, StageTiming};
    use std::time::Duration;

    #[test]
    fn test_report_fields() {
        let timing = StageTiming {
            feature: Duration::from_millis(250),
            matching: Duration::from_millis(500),
            homography: Duration::from_millis(125),
        };
        let record = ResultRecord::new(Quadrilateral::from_size(4.0, 2.0), timing, 12, 9);
        let report = ResultReport::from(&record);

        assert_eq!(report.vertices, [[0.0, 0.0], [4.0, 0.0], [4.0, 2.0], [0.0, 2.0]]);
        assert_eq!(report.ftime, 0.25);
        assert_eq!(report.mtime, 0.5);
        assert_eq!(report.htime, 0.125);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["vertices"][2][0], 4.0);
        assert_eq!(json["inliers"], 9);
    }
}
