/// 工具模块
/// Utility modules
pub mod image_ops;
pub mod maskmaker;

pub use image_ops::{overlay_areas, smooth};
pub use maskmaker::{create_mask, get_mask_params, MaskParams};
