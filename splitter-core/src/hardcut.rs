//! Hardcut: single pass, writes as it reads, clips membership lists.
//!
//! The only strategy allowed on non-seekable input. Ways and relations are
//! rebuilt with just the members whose referents were already written, so the
//! output is reference-closed but geometrically cropped: a way keeps only its
//! in-region nodes, and a way with fewer than two of them is dropped
//! entirely. Relation members pointing at other relations are always dropped
//! because relation inclusion is not tracked.

use anyhow::Result;
use splitter_osm::{MemberKind, Node, Relation, Way};

use crate::bitset::GrowingBitset;
use crate::extract::Extract;
use crate::pass::{run_pass, ObjectSource, Pass};

pub struct HardcutExtract {
    base: Extract,
    node_tracker: GrowingBitset,
    way_tracker: GrowingBitset,
}

pub struct Hardcut {
    extracts: Vec<HardcutExtract>,
}

impl Hardcut {
    pub fn new(extracts: Vec<Extract>) -> Self {
        info!("hardcut init");
        for extract in &extracts {
            info!("\textract {}", extract.name);
        }
        Hardcut {
            extracts: extracts
                .into_iter()
                .map(|base| HardcutExtract {
                    base,
                    node_tracker: GrowingBitset::new(),
                    way_tracker: GrowingBitset::new(),
                })
                .collect(),
        }
    }

    pub fn run(mut self, source: &dyn ObjectSource) -> Result<()> {
        run_pass(source, &mut self)?;
        info!("hardcut finished");
        for extract in &mut self.extracts {
            extract.base.finish()?;
        }
        Ok(())
    }
}

impl Pass for Hardcut {
    fn node(&mut self, node: &Node) -> Result<()> {
        debug!("hardcut node {} v{}", node.id, node.meta.version);
        for extract in &mut self.extracts {
            if extract.base.contains(node) {
                extract.base.write_node(node)?;
                extract.node_tracker.set(node.id);
            }
        }
        Ok(())
    }

    fn way(&mut self, way: &Way) -> Result<()> {
        debug!("hardcut way {} v{}", way.id, way.meta.version);
        for extract in &mut self.extracts {
            let node_refs: Vec<i64> = way
                .node_refs
                .iter()
                .copied()
                .filter(|id| extract.node_tracker.get(*id))
                .collect();

            // A single surviving node is not a way; this version vanishes
            // from the extract (a known hardcut limitation).
            if node_refs.len() < 2 {
                continue;
            }

            let cropped = Way {
                id: way.id,
                meta: way.meta.clone(),
                tags: way.tags.clone(),
                node_refs,
            };
            extract.base.write_way(&cropped)?;
            extract.way_tracker.set(way.id);
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        debug!("hardcut relation {} v{}", relation.id, relation.meta.version);
        for extract in &mut self.extracts {
            let members: Vec<_> = relation
                .members
                .iter()
                .filter(|member| match member.kind {
                    MemberKind::Node => extract.node_tracker.get(member.member_ref),
                    MemberKind::Way => extract.way_tracker.get(member.member_ref),
                    MemberKind::Relation => false,
                })
                .cloned()
                .collect();

            if members.is_empty() {
                continue;
            }

            let cropped = Relation {
                id: relation.id,
                meta: relation.meta.clone(),
                tags: relation.tags.clone(),
                members,
            };
            extract.base.write_relation(&cropped)?;
        }
        Ok(())
    }
}
