use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("mesh has no triangles")]
    EmptyMesh,

    #[error("mesh contains invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("couldn't load environment from `{path}`")]
    EnvironmentUnavailable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("invalid index of refraction: {0} (must be a finite number > 0)")]
    InvalidIor(f32),

    #[error("invalid number of bounces: {0} (must be within 0..={max})", max = crate::MAX_BOUNCES)]
    InvalidBounces(u32),

    #[error("invalid aberration strength: {0} (must be a finite number >= 0)")]
    InvalidAberration(f32),
}
