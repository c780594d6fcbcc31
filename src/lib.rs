//! `xactions_core` — session, GraphQL, and pagination core for X/Twitter's
//! private web API.
//!
//! Cooperating components, leaves first: [`cookie`] (session cookies),
//! [`token`] (guest/bearer/CSRF header composition), [`login`] (credential
//! onboarding flow), [`client`] (request execution, retry, rate-limit
//! bookkeeping), [`endpoints`] (operation catalog and timeline-instruction
//! parsing), [`media`] (chunked upload), and [`paginator`] (cursor-driven
//! sequences). [`session::Session`] wires all of them into the handful of
//! named high-level operations most callers want.

pub mod client;
pub mod config;
pub mod cookie;
pub mod endpoints;
pub mod entities;
pub mod error;
pub mod login;
pub mod media;
pub mod paginator;
pub mod session;
pub mod token;
pub mod transport;

pub use client::HttpClient;
pub use cookie::{Cookie, CookieJar};
pub use error::{Error, Result};
pub use login::{LoginManager, LoginOutcome};
pub use paginator::Paginator;
pub use session::Session;
pub use token::{TokenManager, BEARER_TOKEN};
