//! TCP front door of docrel: a line-oriented statement server, the matching
//! client, and the middleware hooks run around every connection.

pub mod client;
pub mod middleware;
pub mod protocol;
pub mod server;
