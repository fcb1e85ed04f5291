pub mod fixture;
pub mod http;
pub mod profile;

pub use fixture::*;
pub use http::*;
pub use profile::*;
