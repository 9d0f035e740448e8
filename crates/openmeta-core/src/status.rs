//! Decode status taxonomy.
//!
//! Scanners and decoders report outcomes through a small shared enum with a
//! monotone severity order. Merging never lowers an already-recorded status,
//! so a decoder that hits a limit after skipping a malformed entry still
//! reports `LimitExceeded`.

/// Outcome of a scan or decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub enum DecodeStatus {
    /// Nominal completion.
    #[default]
    Ok,
    /// Input not in a recognised format, or an optional feature is absent.
    Unsupported,
    /// Structural violation; may be entry-local and non-fatal.
    Malformed,
    /// A configured cap fired; emission stopped cleanly.
    LimitExceeded,
    /// Caller's output slice was too small; `needed` carries the count.
    OutputTruncated,
}

impl DecodeStatus {
    /// Severity rank for the sticky merge.
    const fn severity(self) -> u8 {
        match self {
            DecodeStatus::Ok => 0,
            DecodeStatus::Unsupported => 1,
            DecodeStatus::Malformed => 2,
            DecodeStatus::LimitExceeded => 3,
            DecodeStatus::OutputTruncated => 4,
        }
    }

    /// Keep the more severe of `self` and `other`.
    pub fn merge(&mut self, other: DecodeStatus) {
        if other.severity() > self.severity() {
            *self = other;
        }
    }

    /// True for [`DecodeStatus::Ok`].
    pub fn is_ok(self) -> bool {
        self == DecodeStatus::Ok
    }
}

impl std::fmt::Display for DecodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DecodeStatus::Ok => "ok",
            DecodeStatus::Unsupported => "unsupported",
            DecodeStatus::Malformed => "malformed",
            DecodeStatus::LimitExceeded => "limit-exceeded",
            DecodeStatus::OutputTruncated => "output-truncated",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_sticky() {
        let mut s = DecodeStatus::Ok;
        s.merge(DecodeStatus::Malformed);
        assert_eq!(s, DecodeStatus::Malformed);
        s.merge(DecodeStatus::Unsupported);
        assert_eq!(s, DecodeStatus::Malformed);
        s.merge(DecodeStatus::LimitExceeded);
        assert_eq!(s, DecodeStatus::LimitExceeded);
        s.merge(DecodeStatus::Ok);
        assert_eq!(s, DecodeStatus::LimitExceeded);
    }
}
