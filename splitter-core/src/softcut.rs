//! Softcut: two passes, way-reference-complete, cascading relations.
//!
//! Pass one marks in-region nodes, ways touching them, and relations touching
//! either. Every node of a marked way lands in an extra tracker, so pass two
//! can emit complete ways. Relation inclusion cascades upward through
//! relations that reference an already-included relation.

use std::collections::BTreeSet;

use anyhow::Result;
use splitter_osm::{MemberKind, Node, Relation, Way};

use crate::bitset::GrowingBitset;
use crate::cascade::CascadingRelations;
use crate::extract::Extract;
use crate::pass::{run_pass, ObjectSource, Pass};

pub struct SoftcutExtract {
    base: Extract,
    node_tracker: GrowingBitset,
    extra_node_tracker: GrowingBitset,
    way_tracker: GrowingBitset,
    relation_tracker: GrowingBitset,
}

pub struct Softcut {
    extracts: Vec<SoftcutExtract>,
    cascading: CascadingRelations,
}

impl Softcut {
    pub fn new(extracts: Vec<Extract>) -> Self {
        info!("softcut init");
        for extract in &extracts {
            info!("\textract {}", extract.name);
        }
        Softcut {
            extracts: extracts
                .into_iter()
                .map(|base| SoftcutExtract {
                    base,
                    node_tracker: GrowingBitset::new(),
                    extra_node_tracker: GrowingBitset::new(),
                    way_tracker: GrowingBitset::new(),
                    relation_tracker: GrowingBitset::new(),
                })
                .collect(),
            cascading: CascadingRelations::new(),
        }
    }

    pub fn run(mut self, source: &dyn ObjectSource) -> Result<()> {
        info!("softcut first-pass");
        run_pass(
            source,
            &mut MarkPass {
                info: &mut self,
                current_way_id: None,
                current_way_nodes: BTreeSet::new(),
            },
        )?;
        info!("softcut second-pass");
        run_pass(source, &mut WritePass { info: &mut self })?;
        for extract in &mut self.extracts {
            extract.base.finish()?;
        }
        Ok(())
    }
}

struct MarkPass<'a> {
    info: &'a mut Softcut,
    /// Ways arrive grouped by id with versions consecutive (the driver
    /// rejects anything else). Node refs are pooled across all versions of
    /// the current way and folded into the extra trackers when the next way
    /// id shows up.
    current_way_id: Option<i64>,
    current_way_nodes: BTreeSet<i64>,
}

impl MarkPass<'_> {
    fn flush_way_nodes(&mut self) {
        let Some(way_id) = self.current_way_id else {
            return;
        };
        debug!("finished all versions of way {way_id}, checking for extra nodes");
        for extract in &mut self.info.extracts {
            if extract.way_tracker.get(way_id) {
                for &node_id in &self.current_way_nodes {
                    extract.extra_node_tracker.set(node_id);
                }
            }
        }
        self.current_way_nodes.clear();
    }
}

impl Pass for MarkPass<'_> {
    fn node(&mut self, node: &Node) -> Result<()> {
        debug!("softcut node {} v{}", node.id, node.meta.version);
        for extract in &mut self.info.extracts {
            if extract.base.contains(node) {
                extract.node_tracker.set(node.id);
            }
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        if self.current_way_id.is_some() && self.current_way_id != Some(way.id) {
            self.flush_way_nodes();
        }
        self.current_way_id = Some(way.id);

        debug!("softcut way {} v{}", way.id, way.meta.version);
        self.current_way_nodes.extend(way.node_refs.iter().copied());

        for extract in &mut self.info.extracts {
            if way.node_refs.iter().any(|id| extract.node_tracker.get(*id)) {
                extract.way_tracker.set(way.id);
            }
        }
        Ok(())
    }

    fn after_ways(&mut self) -> Result<()> {
        // The last way has no successor to trigger the flush.
        self.flush_way_nodes();
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        debug!("softcut relation {} v{}", relation.id, relation.meta.version);

        // Back-edges must be on record before any cascade can reach them,
        // including edges from this very relation.
        for member in &relation.members {
            if member.kind == MemberKind::Relation {
                self.info.cascading.record(member.member_ref, relation.id);
            }
        }

        for extract in &mut self.info.extracts {
            let hit = relation.members.iter().any(|member| match member.kind {
                MemberKind::Node => extract.node_tracker.get(member.member_ref),
                MemberKind::Way => extract.way_tracker.get(member.member_ref),
                MemberKind::Relation => extract.relation_tracker.get(member.member_ref),
            });
            if hit {
                extract.relation_tracker.set(relation.id);
                self.info
                    .cascading
                    .cascade(&mut extract.relation_tracker, relation.id);
            }
        }
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        info!("softcut first-pass finished");
        Ok(())
    }
}

struct WritePass<'a> {
    info: &'a mut Softcut,
}

impl Pass for WritePass<'_> {
    fn node(&mut self, node: &Node) -> Result<()> {
        for extract in &mut self.info.extracts {
            if extract.node_tracker.get(node.id) || extract.extra_node_tracker.get(node.id) {
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
        info!("softcut second-pass finished");
        Ok(())
    }
}
