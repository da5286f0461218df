mod client;
mod status_source;

pub use client::PosServerClient;
pub use status_source::HttpStatusSource;
