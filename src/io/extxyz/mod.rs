mod reader;

pub use reader::read_all;
