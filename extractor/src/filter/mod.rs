pub mod preprocess;
pub mod ssim;
pub mod traits;

pub use ssim::SsimComparator;
pub use traits::FrameComparator;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("image has no pixels")]
    EmptyImage,
    #[error("{width}x{height} is smaller than the {window}x{window} comparison window")]
    TooSmall { width: u32, height: u32, window: u32 },
    #[error("cannot compare {left:?} against {right:?}")]
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },
}
