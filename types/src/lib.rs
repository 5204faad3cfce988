//! Core data types shared across the jamscan workspace.
//!
//! Everything the synchronization pipeline moves around lives here: the
//! [`HeaderHash`] store key, the [`BlockRecord`] unit of persistence with its
//! explicit merge rule, and the wire payload types carried through from the
//! node uninterpreted.

pub mod block;
pub mod hash;
pub mod record;
pub mod time;

pub use block::{
    Block, Extrinsic, Guarantee, Header, PackageSpec, Report, ReportContext, ReportResult,
    SegmentRootLookup,
};
pub use hash::{HashParseError, HeaderHash};
pub use record::{sort_for_display, BlockRecord, Overview};
pub use time::Timestamp;
