//! Simplecut: two passes, whole objects, no reference completion.
//!
//! Pass one marks ids (nodes by geometry, ways by any marked node, relations
//! by any marked node or way member); pass two replays the stream and writes
//! every version of every marked id. Cheapest of the whole-object strategies,
//! but ways may reference nodes the output does not contain.

use anyhow::Result;
use splitter_osm::{MemberKind, Node, Relation, Way};

use crate::bitset::GrowingBitset;
use crate::extract::Extract;
use crate::pass::{run_pass, ObjectSource, Pass};

pub struct SimplecutExtract {
    base: Extract,
    node_tracker: GrowingBitset,
    way_tracker: GrowingBitset,
    relation_tracker: GrowingBitset,
}

pub struct Simplecut {
    extracts: Vec<SimplecutExtract>,
}

impl Simplecut {
    pub fn new(extracts: Vec<Extract>) -> Self {
        info!("simplecut init");
        for extract in &extracts {
            info!("\textract {}", extract.name);
        }
        Simplecut {
            extracts: extracts
                .into_iter()
                .map(|base| SimplecutExtract {
                    base,
                    node_tracker: GrowingBitset::new(),
                    way_tracker: GrowingBitset::new(),
                    relation_tracker: GrowingBitset::new(),
                })
                .collect(),
        }
    }

    pub fn run(mut self, source: &dyn ObjectSource) -> Result<()> {
        info!("simplecut first-pass");
        run_pass(source, &mut MarkPass { info: &mut self })?;
        info!("simplecut second-pass");
        run_pass(source, &mut WritePass { info: &mut self })?;
        for extract in &mut self.extracts {
            extract.base.finish()?;
        }
        Ok(())
    }
}

struct MarkPass<'a> {
    info: &'a mut Simplecut,
}

impl Pass for MarkPass<'_> {
    fn node(&mut self, node: &Node) -> Result<()> {
        debug!("simplecut node {} v{}", node.id, node.meta.version);
        for extract in &mut self.info.extracts {
            if extract.base.contains(node) {
                extract.node_tracker.set(node.id);
            }
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        debug!("simplecut way {} v{}", way.id, way.meta.version);
        for extract in &mut self.info.extracts {
            if way.node_refs.iter().any(|id| extract.node_tracker.get(*id)) {
                extract.way_tracker.set(way.id);
            }
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        debug!("simplecut relation {} v{}", relation.id, relation.meta.version);
        for extract in &mut self.info.extracts {
            let hit = relation.members.iter().any(|member| match member.kind {
                MemberKind::Node => extract.node_tracker.get(member.member_ref),
                MemberKind::Way => extract.way_tracker.get(member.member_ref),
                MemberKind::Relation => false,
            });
            if hit {
                extract.relation_tracker.set(relation.id);
            }
        }
        Ok(())
    }
}

struct WritePass<'a> {
    info: &'a mut Simplecut,
}

impl Pass for WritePass<'_> {
    fn node(&mut self, node: &Node) -> Result<()> {
        for extract in &mut self.info.extracts {
            if extract.node_tracker.get(node.id) {
                extract.base.write_node(node)?;
            }
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        for extract in &mut self.info.extracts {
            if extract.way_tracker.get(way.id) {
                extract.base.write_way(way)?;
            }
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        for extract in &mut self.info.extracts {
            if extract.relation_tracker.get(relation.id) {
                extract.base.write_relation(relation)?;
            }
        }
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        info!("simplecut second-pass finished");
        Ok(())
    }
}
