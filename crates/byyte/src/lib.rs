pub mod le;

pub use le::{ByteReader, ByteWriter};
