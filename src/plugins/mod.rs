//! Built-in matcher plugins
//!
//! Five regex-based realtime matchers behind the same [`Plugin`](crate::plugin::Plugin)
//! contract as user plugins:
//! - [`QuantityPlugin`]: numbers with measurement units ("10 km")
//! - [`DateTimePlugin`]: dates and times in common written forms
//! - [`EmailPlugin`]: email addresses
//! - [`UrlPlugin`]: http/https and www links
//! - [`PhonePlugin`]: phone numbers with separators or country codes
//!
//! All matchers scan the cursor-centered window only and report spans in
//! absolute character offsets. Keys embed the normalized match and its span
//! so unchanged matches deduplicate across passes.

mod datetime;
mod email;
mod phone;
mod quantity;
mod url;

pub use datetime::DateTimePlugin;
pub use email::EmailPlugin;
pub use phone::PhonePlugin;
pub use quantity::QuantityPlugin;
pub use url::UrlPlugin;

use std::sync::Arc;

use crate::buffer::Window;
use crate::plugin::{PassMode, Plugin};
use crate::types::{EntityStatus, Span};

/// All built-in matchers, in their conventional order
pub fn standard_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(QuantityPlugin::new()),
        Arc::new(DateTimePlugin::new()),
        Arc::new(EmailPlugin::new()),
        Arc::new(UrlPlugin::new()),
        Arc::new(PhonePlugin::new()),
    ]
}

/// Convert a byte range inside the window text into an absolute character
/// span
///
/// Regex matches are byte offsets; spans are character offsets into the
/// full text.
pub(crate) fn char_span(window: &Window, byte_start: usize, byte_end: usize) -> Span {
    let start = window.text[..byte_start].chars().count();
    let len = window.text[byte_start..byte_end].chars().count();
    Span::new(window.offset + start, window.offset + start + len)
}

/// Candidate status matching the current phase
pub(crate) fn status_for(mode: PassMode) -> EntityStatus {
    match mode {
        PassMode::Realtime => EntityStatus::Provisional,
        PassMode::Commit => EntityStatus::Confirmed,
    }
}
