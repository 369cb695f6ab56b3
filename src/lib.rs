//! Image gallery with a server-side fetch proxy, plus the internal admin API
//! it can reach. Two services from one crate, run via the `ctf-gallery` binary.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod public;
pub mod ssrf;
pub mod templating;

pub use error::{GalleryError, Result};
