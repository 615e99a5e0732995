//! SuperSoftercut: softercut plus a relation-to-relation cascade.
//!
//! Passes one and three are softercut's. Pass two additionally walks
//! relations, recording back-edges for relation-typed members and pulling in
//! any relation that references an already-included relation, transitively.

use anyhow::Result;
use splitter_osm::{MemberKind, Relation, Way};

use crate::cascade::CascadingRelations;
use crate::extract::Extract;
use crate::pass::{run_pass, ObjectSource, Pass};
use crate::softercut::{MarkPass, SoftercutExtract, WayNodesPass, WritePass};

pub struct SuperSoftercut {
    extracts: Vec<SoftercutExtract>,
    cascading: CascadingRelations,
}

impl SuperSoftercut {
    pub fn new(extracts: Vec<Extract>) -> Self {
        info!("supersoftercut init");
        for extract in &extracts {
            info!("\textract {}", extract.name);
        }
        SuperSoftercut {
            extracts: extracts.into_iter().map(SoftercutExtract::new).collect(),
            cascading: CascadingRelations::new(),
        }
    }

    pub fn run(mut self, source: &dyn ObjectSource) -> Result<()> {
        info!("supersoftercut first-pass");
        run_pass(source, &mut MarkPass { extracts: &mut self.extracts })?;
        info!("supersoftercut second-pass");
        run_pass(
            source,
            &mut CascadePass {
                extracts: &mut self.extracts,
                cascading: &mut self.cascading,
            },
        )?;
        info!("supersoftercut third-pass");
        run_pass(source, &mut WritePass { extracts: &mut self.extracts })?;
        for extract in &mut self.extracts {
            extract.base.finish()?;
        }
        Ok(())
    }
}

/// Softercut's way-completion pass, extended with the relation cascade.
struct CascadePass<'a> {
    extracts: &'a mut Vec<SoftercutExtract>,
    cascading: &'a mut CascadingRelations,
}

impl Pass for CascadePass<'_> {
    fn way(&mut self, way: &Way) -> Result<()> {
        WayNodesPass {
            extracts: &mut *self.extracts,
        }
        .way(way)
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        debug!(
            "supersoftercut relation {} v{}",
            relation.id, relation.meta.version
        );
        for member in &relation.members {
            if member.kind == MemberKind::Relation {
                self.cascading.record(member.member_ref, relation.id);
            }
        }
        for extract in self.extracts.iter_mut() {
            let hit = relation.members.iter().any(|member| {
                member.kind == MemberKind::Relation
                    && extract.relation_tracker.get(member.member_ref)
            });
            if hit {
                extract.relation_tracker.set(relation.id);
                self.cascading
                    .cascade(&mut extract.relation_tracker, relation.id);
            }
        }
        Ok(())
    }
}
