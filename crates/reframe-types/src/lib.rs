pub mod error;
pub mod target;

pub use error::{ReframeError, ReframeResult};
pub use target::TargetDescriptor;
