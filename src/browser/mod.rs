//! Attaching to a running browser over the DevTools protocol.

mod session;

pub use session::{select_page, CdpPage, CdpSession, PageInfo};
