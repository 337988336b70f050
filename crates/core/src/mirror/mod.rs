//! Catalog mirrors - parsing the published mirror list and picking a mirror.

mod list;
mod selector;

pub use list::parse_mirror_list;
pub use selector::{choose_mirror, choose_mirror_with};

use thiserror::Error;

/// Well-known location of the mirror list document.
pub const DEFAULT_MIRROR_LIST_URL: &str = "http://zdfmediathk.sourceforge.net/akt.xml";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MirrorListError {
    #[error("Received a malformed mirror list: {0}")]
    Malformed(String),

    #[error("Received an empty mirror list.")]
    Empty,
}
