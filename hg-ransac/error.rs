#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    InsufficientCorrespondences { needed: usize, got: usize },
    DegenerateGeometry(&'static str),
    SingularProjection { corner: usize },
    InvalidConfig(String),
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HomographyError::InsufficientCorrespondences { needed, got } => {
                write!(f, "Insufficient correspondences: need {}, got {}", needed, got)
            }
            HomographyError::DegenerateGeometry(reason) => {
                write!(f, "Degenerate geometry: {}", reason)
            }
            HomographyError::SingularProjection { corner } => {
                write!(f, "Corner {} projects to infinity (zero homogeneous weight)", corner)
            }
            HomographyError::InvalidConfig(msg) => write!(f, "Invalid RANSAC configuration: {}", msg),
        }
    }
}

impl std::error::Error for HomographyError {}

pub type HomographyResult<T> = Result<T, HomographyError>;
