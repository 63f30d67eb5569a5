//! Imports for syntax extensions.

pub use crate::Error as _;
pub use crate::codec::{Decoder as _, ErrorDecoder as _};
pub use crate::observer::Observer as _;
pub use crate::target::Target as _;
