//! Readiness Interest
//!
//! The set of events a connection currently wants to be woken for. The
//! reactor reads it after every callback and re-arms accordingly.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of readiness events, combined with `|`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Interest(u8);

impl Interest {
    pub const NONE: Interest = Interest(0);
    pub const READABLE: Interest = Interest(1 << 0);
    pub const WRITABLE: Interest = Interest(1 << 1);
    pub const ERROR: Interest = Interest(1 << 2);
    pub const HANGUP: Interest = Interest(1 << 3);
    /// Deliver each readiness transition once; the callback must drain.
    pub const EDGE: Interest = Interest(1 << 4);

    /// Returns true if every event in `other` is also in `self`.
    #[inline]
    pub const fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Interest) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Interest) {
        self.0 &= !other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The tokio readiness to await for this interest, or `None` if the
    /// connection wants neither to read nor to write.
    ///
    /// Errors and hangups are always reported by tokio alongside read or
    /// write readiness, and tokio readiness is edge-triggered by nature, so
    /// `ERROR`, `HANGUP` and `EDGE` need no mapping.
    pub fn to_tokio(self) -> Option<tokio::io::Interest> {
        use tokio::io::Interest as Tokio;

        match (
            self.contains(Interest::READABLE),
            self.contains(Interest::WRITABLE),
        ) {
            (true, true) => Some(Tokio::READABLE | Tokio::WRITABLE),
            (true, false) => Some(Tokio::READABLE),
            (false, true) => Some(Tokio::WRITABLE),
            (false, false) => None,
        }
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Interest, &str); 5] = [
            (Interest::READABLE, "READABLE"),
            (Interest::WRITABLE, "WRITABLE"),
            (Interest::ERROR, "ERROR"),
            (Interest::HANGUP, "HANGUP"),
            (Interest::EDGE, "EDGE"),
        ];

        if self.is_empty() {
            return f.write_str("NONE");
        }

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
