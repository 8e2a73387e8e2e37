mod writer;

pub use writer::{output_path, write};
