//! Softercut: three passes, complete ways and complete relation members.
//!
//! Pass one separates "inside" ids (selected by geometry) from "outside" ids
//! (pulled in only to complete a way or relation). Pass two walks ways once
//! more so that ways pulled in by relations also get their nodes. Pass three
//! writes the union. Unlike softcut there is no relation-to-relation
//! cascade; supersoftercut adds that on top of this skeleton.

use anyhow::Result;
use splitter_osm::{MemberKind, Node, Relation, Way};

use crate::bitset::GrowingBitset;
use crate::extract::Extract;
use crate::pass::{run_pass, ObjectSource, Pass};

pub struct SoftercutExtract {
    pub(crate) base: Extract,
    pub(crate) inside_node_tracker: GrowingBitset,
    pub(crate) outside_node_tracker: GrowingBitset,
    pub(crate) inside_way_tracker: GrowingBitset,
    pub(crate) outside_way_tracker: GrowingBitset,
    pub(crate) relation_tracker: GrowingBitset,
}

impl SoftercutExtract {
    pub(crate) fn new(base: Extract) -> Self {
        SoftercutExtract {
            base,
            inside_node_tracker: GrowingBitset::new(),
            outside_node_tracker: GrowingBitset::new(),
            inside_way_tracker: GrowingBitset::new(),
            outside_way_tracker: GrowingBitset::new(),
            relation_tracker: GrowingBitset::new(),
        }
    }
}

pub struct Softercut {
    extracts: Vec<SoftercutExtract>,
}

impl Softercut {
    pub fn new(extracts: Vec<Extract>) -> Self {
        info!("softercut init");
        for extract in &extracts {
            info!("\textract {}", extract.name);
        }
        Softercut {
            extracts: extracts.into_iter().map(SoftercutExtract::new).collect(),
        }
    }

    pub fn run(mut self, source: &dyn ObjectSource) -> Result<()> {
        info!("softercut first-pass");
        run_pass(source, &mut MarkPass { extracts: &mut self.extracts })?;
        info!("softercut second-pass");
        run_pass(source, &mut WayNodesPass { extracts: &mut self.extracts })?;
        info!("softercut third-pass");
        run_pass(source, &mut WritePass { extracts: &mut self.extracts })?;
        for extract in &mut self.extracts {
            extract.base.finish()?;
        }
        Ok(())
    }
}

/// Pass one of softercut and supersoftercut.
pub(crate) struct MarkPass<'a> {
    pub(crate) extracts: &'a mut Vec<SoftercutExtract>,
}

impl Pass for MarkPass<'_> {
    fn node(&mut self, node: &Node) -> Result<()> {
        debug!("softercut node {} v{}", node.id, node.meta.version);
        for extract in self.extracts.iter_mut() {
            if extract.base.contains(node) {
                extract.inside_node_tracker.set(node.id);
            }
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        debug!("softercut way {} v{}", way.id, way.meta.version);
        for extract in self.extracts.iter_mut() {
            let mut hit = false;
            let mut outside_nodes = Vec::new();
            for &node_id in &way.node_refs {
                if extract.inside_node_tracker.get(node_id) {
                    hit = true;
                } else {
                    outside_nodes.push(node_id);
                }
            }
            if hit {
                extract.inside_way_tracker.set(way.id);
                for node_id in outside_nodes {
                    extract.outside_node_tracker.set(node_id);
                }
            }
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        debug!("softercut relation {} v{}", relation.id, relation.meta.version);
        for extract in self.extracts.iter_mut() {
            let mut hit = false;
            let mut outside = Vec::new();
            for member in &relation.members {
                let inside = match member.kind {
                    MemberKind::Node => extract.inside_node_tracker.get(member.member_ref),
                    MemberKind::Way => extract.inside_way_tracker.get(member.member_ref),
                    MemberKind::Relation => continue,
                };
                if inside {
                    hit = true;
                } else {
                    outside.push(member);
                }
            }
            if hit {
                extract.relation_tracker.set(relation.id);
                for member in outside {
                    match member.kind {
                        MemberKind::Node => extract.outside_node_tracker.set(member.member_ref),
                        MemberKind::Way => extract.outside_way_tracker.set(member.member_ref),
                        MemberKind::Relation => {}
                    }
                }
            }
        }
        Ok(())
    }
}

/// Pass two: nodes of ways that only a relation pulled in.
pub(crate) struct WayNodesPass<'a> {
    pub(crate) extracts: &'a mut Vec<SoftercutExtract>,
}

impl Pass for WayNodesPass<'_> {
    fn way(&mut self, way: &Way) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            if extract.outside_way_tracker.get(way.id) {
                for &node_id in &way.node_refs {
                    extract.outside_node_tracker.set(node_id);
                }
            }
        }
        Ok(())
    }
}

/// Final pass: write everything either tracker selected.
pub(crate) struct WritePass<'a> {
    pub(crate) extracts: &'a mut Vec<SoftercutExtract>,
}

impl Pass for WritePass<'_> {
    fn node(&mut self, node: &Node) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            if extract.inside_node_tracker.get(node.id)
                || extract.outside_node_tracker.get(node.id)
            {
                extract.base.write_node(node)?;
            }
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            if extract.inside_way_tracker.get(way.id) || extract.outside_way_tracker.get(way.id) {
                extract.base.write_way(way)?;
            }
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        for extract in self.extracts.iter_mut() {
            if extract.relation_tracker.get(relation.id) {
                extract.base.write_relation(relation)?;
            }
        }
        Ok(())
    }
}
