//! Scan flags.

use bitflags::bitflags;

bitflags! {
    /// Flags controlling one scan, independently combinable.
    ///
    /// The start/end names denote the logical start and end of the
    /// requested range, not physical direction: under
    /// [`ScanFlags::DESCENDING`] the start bound is the high edge where
    /// iteration begins.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScanFlags: u32 {
        /// Ignore the start row; begin at the index's physical edge.
        const START_AT_EDGE = 1 << 0;
        /// Ignore the end row; run to the index's physical edge.
        const END_AT_EDGE = 1 << 1;
        /// Exclude the start-boundary row itself.
        const START_EXCLUSIVE = 1 << 2;
        /// Exclude the end-boundary row itself.
        const END_EXCLUSIVE = 1 << 3;
        /// Equality probe: stop once entries stop matching the exact
        /// leading-column values supplied (with no bound supplied, stop
        /// after the first matched entry).
        const SINGLE_ROW = 1 << 4;
        /// Iterate in reverse physical order.
        const DESCENDING = 1 << 5;
        /// Treat the last supplied bound field as a byte-prefix match
        /// rather than a whole-value match.
        const PREFIX = 1 << 6;
    }
}

impl ScanFlags {
    /// Returns true if iteration runs in reverse physical order.
    #[must_use]
    pub const fn descending(self) -> bool {
        self.contains(Self::DESCENDING)
    }

    /// Returns true if this is an equality probe.
    #[must_use]
    pub const fn single_row(self) -> bool {
        self.contains(Self::SINGLE_ROW)
    }
}
