//! Robust planar homography estimation.
//!
//! - `RansacEstimator`: RANSAC over 4-point DLT fits with a least-squares
//!   refit on the consensus set.
//! - `CornerProjector`: maps the object rectangle into the scene.
//! - `RansacConfig` / `EstimatorBuilder`: presets and fluent configuration.

pub mod builder;
pub mod config;
pub mod dlt;
pub mod error;
pub mod homography;
pub mod projection;
pub mod ransac;

pub use builder::EstimatorBuilder;
pub use config::RansacConfig;
pub use error::{HomographyError, HomographyResult};
pub use homography::Homography;
pub use projection::CornerProjector;
pub use ransac::{find_homography, Estimate, RansacEstimator, MIN_CORRESPONDENCES};
