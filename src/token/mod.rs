//! Bearer/guest/CSRF header composition.

pub mod guest;
pub mod manager;

pub use guest::GuestToken;
pub use manager::TokenManager;

/// The public, process-wide Twitter web-client bearer credential. Copied
/// verbatim from the official web client; never rotated within a process
/// lifetime.
pub const BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";
