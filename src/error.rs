use thiserror::Error;

use crate::renderer::backend::Resolution;
use crate::scene::PassName;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "{family} shadow pass got {matrices} matrices but {opaque} opaque and {transparent} transparent targets"
    )]
    ShadowTargetMismatch {
        family: &'static str,
        matrices: usize,
        opaque: usize,
        transparent: usize,
    },

    #[error("invalid material type for `{0}`: valid extensions are .mesh.wgsl, .screen.wgsl and .light.wgsl")]
    UnknownMaterialType(String),

    #[error("material `{material}` has no {pass} shader variant")]
    MissingShaderVariant { material: String, pass: PassName },

    #[error("failed to compile shader `{label}`: {message}")]
    ShaderCompilation { label: String, message: String },

    #[error("parameter `{name}` should be {expected}")]
    ParameterType { name: String, expected: &'static str },

    #[error("invalid resolution {0}")]
    InvalidResolution(Resolution),

    #[error("render target `{label}` mixes attachment resolutions ({expected} vs {found})")]
    AttachmentMismatch {
        label: String,
        expected: Resolution,
        found: Resolution,
    },

    #[error("gpu error: {0}")]
    Gpu(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
