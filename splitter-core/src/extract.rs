//! One configured output region and its write sink.

use anyhow::Result;
use splitter_osm::{Node, Relation, Way};

use crate::region::Region;

/// Receives the objects a strategy selects for one extract. The production
/// sink writes OSM XML; tests substitute a recorder.
pub trait ObjectSink {
    fn node(&mut self, node: &Node) -> Result<()>;
    fn way(&mut self, way: &Way) -> Result<()>;
    fn relation(&mut self, relation: &Relation) -> Result<()>;
    /// Flush and close the output. Called once, after the final pass.
    fn finish(&mut self) -> Result<()>;
}

/// Identity and output of one extract. Strategy-specific tracker state wraps
/// this in its own struct (`SoftcutExtract` and friends), the same shape for
/// every strategy.
pub struct Extract {
    pub name: String,
    region: Region,
    sink: Box<dyn ObjectSink>,
}

impl Extract {
    pub fn new(name: String, region: Region, sink: Box<dyn ObjectSink>) -> Self {
        Extract { name, region, sink }
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.region.contains(node)
    }

    pub fn write_node(&mut self, node: &Node) -> Result<()> {
        self.sink.node(node)
    }

    pub fn write_way(&mut self, way: &Way) -> Result<()> {
        self.sink.way(way)
    }

    pub fn write_relation(&mut self, relation: &Relation) -> Result<()> {
        self.sink.relation(relation)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.sink.finish()
    }
}
