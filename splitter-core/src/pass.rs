//! The streaming pass framework.
//!
//! A strategy is a short sequence of passes over the same input. Each pass
//! sees every object version in canonical OSM order and gets hooks at the
//! boundaries between object kinds. The driver owns order enforcement: the
//! grouping assumptions the strategies rely on (ways arrive grouped by id,
//! nodes before ways before relations) are checked here once, so the
//! strategies themselves can stay branch-free about malformed streams.

use anyhow::{bail, Result};
use splitter_osm::{Element, Node, Relation, Way};

/// Callback bundle for one pass. All hooks default to no-ops; a strategy pass
/// implements the ones it needs.
pub trait Pass {
    fn node(&mut self, _node: &Node) -> Result<()> {
        Ok(())
    }
    fn way(&mut self, _way: &Way) -> Result<()> {
        Ok(())
    }
    fn relation(&mut self, _relation: &Relation) -> Result<()> {
        Ok(())
    }
    fn after_nodes(&mut self) -> Result<()> {
        Ok(())
    }
    fn after_ways(&mut self) -> Result<()> {
        Ok(())
    }
    fn after_relations(&mut self) -> Result<()> {
        Ok(())
    }
    /// Runs after `after_relations`, once the stream is exhausted.
    fn done(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A re-iterable stream of OSM objects. Multi-pass strategies call `visit`
/// once per pass, so implementations must replay the same objects in the
/// same order every time.
pub trait ObjectSource {
    fn visit(&self, f: &mut dyn FnMut(&Element) -> Result<()>) -> Result<()>;
}

/// In-memory streams, used by the test suites.
impl ObjectSource for [Element] {
    fn visit(&self, f: &mut dyn FnMut(&Element) -> Result<()>) -> Result<()> {
        for element in self {
            f(element)?;
        }
        Ok(())
    }
}

impl ObjectSource for Vec<Element> {
    fn visit(&self, f: &mut dyn FnMut(&Element) -> Result<()>) -> Result<()> {
        self.as_slice().visit(f)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Nodes,
    Ways,
    Relations,
}

/// Drive one pass over the source, dispatching hooks per object and firing
/// phase-end hooks at kind boundaries. Rejects streams that are not in
/// canonical order (nodes, ways, relations, ids non-decreasing per kind),
/// since several strategies silently miscount on such input.
pub fn run_pass(source: &dyn ObjectSource, pass: &mut dyn Pass) -> Result<()> {
    let mut phase = Phase::Nodes;
    let mut last_id: Option<i64> = None;

    source.visit(&mut |element| {
        let element_phase = match element {
            Element::Node(_) => Phase::Nodes,
            Element::Way(_) => Phase::Ways,
            Element::Relation(_) => Phase::Relations,
        };
        if element_phase < phase {
            bail!(
                "input stream out of order: {} {} arrived after the {} phase ended",
                element.kind().as_str(),
                element.id(),
                match phase {
                    Phase::Nodes => "node",
                    Phase::Ways => "way",
                    Phase::Relations => "relation",
                }
            );
        }
        while phase < element_phase {
            advance(&mut phase, pass)?;
            last_id = None;
        }
        if let Some(last) = last_id {
            if element.id() < last {
                bail!(
                    "input stream out of order: {} {} arrived after id {}",
                    element.kind().as_str(),
                    element.id(),
                    last
                );
            }
        }
        last_id = Some(element.id());

        match element {
            Element::Node(n) => pass.node(n),
            Element::Way(w) => pass.way(w),
            Element::Relation(r) => pass.relation(r),
        }
    })?;

    // Close out hooks for phases the stream never reached.
    while phase < Phase::Relations {
        advance(&mut phase, pass)?;
    }
    pass.after_relations()?;
    pass.done()
}

fn advance(phase: &mut Phase, pass: &mut dyn Pass) -> Result<()> {
    match phase {
        Phase::Nodes => {
            pass.after_nodes()?;
            *phase = Phase::Ways;
        }
        Phase::Ways => {
            pass.after_ways()?;
            *phase = Phase::Relations;
        }
        Phase::Relations => unreachable!(),
    }
    Ok(())
}
