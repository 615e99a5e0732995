//! The cut engine: id trackers, region containment, the pass framework and
//! the family of cut strategies.
//!
//! A strategy decides, with bounded memory, which object ids of an OSM stream
//! belong to which configured extract, then replays the stream and writes the
//! selected objects out. Everything here is driven through [`pass::run_pass`];
//! the actual file formats live in `splitter-osm` and the CLI crate.

#[macro_use]
extern crate log;

#[cfg(test)]
mod tests;

pub mod bitset;
pub mod cascade;
pub mod extract;
pub mod hardcut;
pub mod pass;
pub mod region;
pub mod simplecut;
pub mod softcut;
pub mod softercut;
pub mod supersoftercut;
pub mod tagcut;

pub use bitset::GrowingBitset;
pub use extract::{Extract, ObjectSink};
pub use pass::{run_pass, ObjectSource, Pass};
pub use region::Region;
