pub mod byte_stream;
pub mod reassembler;

// -- Re-export public structs --

pub use byte_stream::ByteStream;
pub use reassembler::Reassembler;
