mod archiver;
mod bilibili;
pub(crate) mod client;
mod registry;
mod types;

pub use archiver::ArchiverClient;
pub use bilibili::BilibiliClient;
pub use client::{http_client, join_url};
pub use registry::RegistryClient;
pub use types::*;
