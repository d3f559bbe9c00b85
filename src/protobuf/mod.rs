//! Schema-less protobuf decoding.
//!
//! No `.proto` file is available for tracker payloads, so structure is
//! inferred from the wire format alone:
//! - `reader` - cursor over the byte stream (varints, fixed-width values)
//! - `decoder` - message decoding with heuristic submessage detection

pub mod decoder;
pub mod reader;

pub use decoder::*;
pub use reader::*;
