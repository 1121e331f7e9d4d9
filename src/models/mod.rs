pub mod chunk;
pub mod gemini;
pub mod metadata;
pub mod request;

pub use chunk::*;
pub use metadata::*;
pub use request::*;
