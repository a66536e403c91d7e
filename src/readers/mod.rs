pub mod chunk_reader;
pub mod line_parser;

pub use chunk_reader::ChunkReader;
pub use line_parser::{cut, parse_checked, LineParser, MalformedPolicy, ParseError};
