//! Quality ladder
//!
//! The ordered list of release quality filters tried for every search, from the
//! highest fidelity down to an unfiltered attempt.

use std::fmt;

/// Search term of the high-definition tier on the torrent index
pub const HD_TERM: &str = "TVripHD 720 [Rip HD depuis Source Tv HD]";

/// Search term of the standard-definition tier on the torrent index
pub const SD_TERM: &str = "TVrip [Rip SD (non HD) depuis Source Tv HD/SD]";

/// A single rung of the quality ladder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityTier {
    /// Short label used in logs (HD, SD, NQ)
    label: String,
    /// Quality term passed to the torrent index; empty means no quality filter
    term: String,
}

impl QualityTier {
    pub fn new(label: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            term: term.into(),
        }
    }

    /// The tier that applies no quality filter at all
    pub fn unfiltered() -> Self {
        Self::new("NQ", "")
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_unfiltered(&self) -> bool {
        self.term.is_empty()
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Ordered quality tiers, always terminated by the unfiltered tier
///
/// The ladder is immutable once built and handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLadder {
    tiers: Vec<QualityTier>,
}

impl QualityLadder {
    /// Builds a ladder from filtered tiers, highest fidelity first
    ///
    /// Unfiltered tiers in `filtered` are dropped and a single unfiltered tier
    /// is appended, so the last rung is always the "any quality" attempt.
    pub fn new(filtered: impl IntoIterator<Item = QualityTier>) -> Self {
        let mut tiers: Vec<QualityTier> = filtered
            .into_iter()
            .filter(|tier| !tier.is_unfiltered())
            .collect();
        tiers.push(QualityTier::unfiltered());
        Self { tiers }
    }

    /// The tiers to attempt, in order
    pub fn tiers(&self) -> &[QualityTier] {
        &self.tiers
    }
}

impl Default for QualityLadder {
    /// HD rip, then SD rip, then unfiltered
    fn default() -> Self {
        Self::new([QualityTier::new("HD", HD_TERM), QualityTier::new("SD", SD_TERM)])
    }
}
