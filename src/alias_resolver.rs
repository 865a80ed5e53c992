//! Alias resolution
//!
//! Watch lists often disambiguate titles with a parenthetical suffix such as a
//! year or a country ("Utopia (2013)", "The Office (US)"), which torrent
//! listings omit. Deriving the bare title as an extra alias widens search
//! recall for those shows.

use crate::watch_list::Show;
use tracing::debug;

/// Marker of a parenthetical disambiguator in a title
const QUALIFIER_MARKER: &str = " (";

/// Returns the title without its parenthetical qualifier, if it has one
///
/// `None` when the title carries no qualifier or nothing usable precedes it.
pub fn clean_title(title: &str) -> Option<&str> {
    let (clean, _) = title.split_once(QUALIFIER_MARKER)?;
    let clean = clean.trim();
    (!clean.is_empty()).then_some(clean)
}

/// Appends the qualifier-free title to the show's aliases
///
/// Nothing is appended when the canonical title has no qualifier or when an
/// existing alias already is the clean title (compared case-insensitively).
/// Existing aliases are never removed or reordered, so running this twice is
/// the same as running it once.
///
/// Returns the alias that was appended, if any.
pub fn derive_aliases(show: &mut Show) -> Option<String> {
    let clean = clean_title(&show.title)?;

    if show
        .aliases
        .iter()
        .any(|alias| alias.trim().eq_ignore_ascii_case(clean))
    {
        return None;
    }

    let clean = clean.to_string();
    debug!(show = %show.title, alias = %clean, "derived alias");
    show.aliases.push(clean.clone());
    Some(clean)
}
