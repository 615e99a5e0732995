//! Tag-driven selection: one strategy, five predicate tables.
//!
//! These cuts ignore region geometry entirely. Pass one seeds way and
//! relation trackers from tag predicates, pass two turns marked ways into
//! marked nodes, pass three writes. The five public tables differ only in
//! their predicates and in two shape switches (whether relations are walked
//! at all, and whether way nodes are collected already in pass one).

use anyhow::Result;
use splitter_osm::{MemberKind, Node, Relation, Tag, Way};

use crate::bitset::GrowingBitset;
use crate::extract::Extract;
use crate::pass::{run_pass, ObjectSource, Pass};

/// A tag predicate entry: key must match; `value` of `None` means presence of
/// the key is enough.
pub struct TagMatch {
    pub key: &'static str,
    pub value: Option<&'static str>,
}

const fn key(key: &'static str) -> TagMatch {
    TagMatch { key, value: None }
}

const fn key_value(key: &'static str, value: &'static str) -> TagMatch {
    TagMatch {
        key,
        value: Some(value),
    }
}

fn matches(tags: &[Tag], table: &[TagMatch]) -> bool {
    tags.iter().any(|tag| {
        table
            .iter()
            .any(|m| m.key == tag.key && m.value.map_or(true, |v| v == tag.value))
    })
}

/// Everything that distinguishes one tag cut from another.
pub struct TagCutSpec {
    pub name: &'static str,
    /// Ways whose tags match are selected directly.
    pub way_tags: &'static [TagMatch],
    /// Relations whose tags match are selected, along with their way members.
    pub relation_tags: &'static [TagMatch],
    /// Relation ids selected unconditionally, tags or no tags.
    pub relation_ids: &'static [i64],
    /// When false the relation phase is ignored completely (cut_water).
    pub walk_relations: bool,
    /// When true a selected way's nodes are marked in pass one and the
    /// dedicated way-to-node pass is skipped (cut_water).
    pub seed_way_nodes: bool,
}

pub static CUT_ADMINISTRATIVE: TagCutSpec = TagCutSpec {
    name: "cut_administrative",
    way_tags: &[],
    relation_tags: &[key_value("boundary", "administrative")],
    relation_ids: &[],
    walk_relations: true,
    seed_way_nodes: false,
};

pub static CUT_ALL_BORDERS: TagCutSpec = TagCutSpec {
    name: "cut_all_borders",
    way_tags: &[],
    relation_tags: &[
        key_value("boundary", "administrative"),
        key_value("boundary", "territorial"),
    ],
    // Always selected, whatever their tags. Why exactly these four ids is
    // undocumented; kept for output compatibility.
    relation_ids: &[2186646, 2559126, 192797, 3335661],
    walk_relations: true,
    seed_way_nodes: false,
};

/// Presence-only: `highway=anything` qualifies.
pub static CUT_HIGHWAY: TagCutSpec = TagCutSpec {
    name: "cut_highway",
    way_tags: &[key("highway")],
    relation_tags: &[key("highway")],
    relation_ids: &[],
    walk_relations: true,
    seed_way_nodes: false,
};

// The " int_ref" entry (leading space) matches a malformed key variant that
// exists in planet history; dropping it changes the output.
static REF_KEYS: &[TagMatch] = &[
    key("ref"),
    key("int_ref"),
    key(" int_ref"),
    key("nat_ref"),
    key("reg_ref"),
    key("loc_ref"),
    key("old_ref"),
    key("unsigned_ref"),
];

pub static CUT_REF: TagCutSpec = TagCutSpec {
    name: "cut_ref",
    way_tags: REF_KEYS,
    relation_tags: REF_KEYS,
    relation_ids: &[],
    walk_relations: true,
    seed_way_nodes: false,
};

pub static CUT_WATER: TagCutSpec = TagCutSpec {
    name: "cut_water",
    way_tags: &[key_value("natural", "coastline")],
    relation_tags: &[],
    relation_ids: &[],
    walk_relations: false,
    seed_way_nodes: true,
};

pub struct TagCutExtract {
    base: Extract,
    node_tracker: GrowingBitset,
    way_tracker: GrowingBitset,
    relation_tracker: GrowingBitset,
}

pub struct TagCut {
    spec: &'static TagCutSpec,
    extracts: Vec<TagCutExtract>,
}

impl TagCut {
    pub fn new(spec: &'static TagCutSpec, extracts: Vec<Extract>) -> Self {
        info!("{} init", spec.name);
        for extract in &extracts {
            info!("\textract {}", extract.name);
        }
        TagCut {
            spec,
            extracts: extracts
                .into_iter()
                .map(|base| TagCutExtract {
                    base,
                    node_tracker: GrowingBitset::new(),
                    way_tracker: GrowingBitset::new(),
                    relation_tracker: GrowingBitset::new(),
                })
                .collect(),
        }
    }

    pub fn run(mut self, source: &dyn ObjectSource) -> Result<()> {
        info!("{} first-pass", self.spec.name);
        run_pass(source, &mut MarkPass { info: &mut self })?;
        if !self.spec.seed_way_nodes {
            info!("{} second-pass", self.spec.name);
            run_pass(source, &mut WayNodesPass { info: &mut self })?;
        }
        info!("{} writer-pass", self.spec.name);
        run_pass(source, &mut WritePass { info: &mut self })?;
        for extract in &mut self.extracts {
            extract.base.finish()?;
        }
        Ok(())
    }
}

struct MarkPass<'a> {
    info: &'a mut TagCut,
}

impl Pass for MarkPass<'_> {
    fn way(&mut self, way: &Way) -> Result<()> {
        let spec = self.info.spec;
        if spec.way_tags.is_empty() || !matches(&way.tags, spec.way_tags) {
            return Ok(());
        }
        debug!("{} way {} v{}", spec.name, way.id, way.meta.version);
        for extract in &mut self.info.extracts {
            extract.way_tracker.set(way.id);
            if spec.seed_way_nodes {
                for &node_id in &way.node_refs {
                    extract.node_tracker.set(node_id);
                }
            }
        }
        Ok(())
    }

    fn relation(&mut self, relation: &Relation) -> Result<()> {
        let spec = self.info.spec;
        if !spec.walk_relations {
            return Ok(());
        }
        let hit = matches(&relation.tags, spec.relation_tags)
            || spec.relation_ids.contains(&relation.id);
        if !hit {
            return Ok(());
        }
        debug!(
            "{} relation {} v{}",
            spec.name, relation.id, relation.meta.version
        );
        for extract in &mut self.info.extracts {
            extract.relation_tracker.set(relation.id);
            for member in &relation.members {
                if member.kind == MemberKind::Way {
                    extract.way_tracker.set(member.member_ref);
                }
            }
        }
        Ok(())
    }
}

struct WayNodesPass<'a> {
    info: &'a mut TagCut,
}

impl Pass for WayNodesPass<'_> {
    fn way(&mut self, way: &Way) -> Result<()> {
        for extract in &mut self.info.extracts {
            if extract.way_tracker.get(way.id) {
                for &node_id in &way.node_refs {
                    extract.node_tracker.set(node_id);
                }
            }
        }
        Ok(())
    }
}

struct WritePass<'a> {
    info: &'a mut TagCut,
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
        info!("{} finished", self.info.spec.name);
        Ok(())
    }
}
