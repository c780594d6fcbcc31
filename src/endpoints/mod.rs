//! Endpoint catalog and timeline-instruction response parser.

pub mod catalog;
pub mod parser;

pub use catalog::{lookup, EndpointDescriptor};
pub use parser::{
    decode_instructions, decode_thread, extract_instructions, parse_profile, DecodeTally,
    DecodedPage, Entry, Instruction,
};
