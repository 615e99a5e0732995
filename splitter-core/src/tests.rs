use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use splitter_osm::{
    Element, Member, MemberKind, Metadata, Node, Relation, Tag, Way,
};

use crate::extract::{Extract, ObjectSink};
use crate::hardcut::Hardcut;
use crate::pass::{run_pass, Pass};
use crate::region::Region;
use crate::simplecut::Simplecut;
use crate::softcut::Softcut;
use crate::softercut::Softercut;
use crate::supersoftercut::SuperSoftercut;
use crate::tagcut::{
    TagCut, CUT_ADMINISTRATIVE, CUT_ALL_BORDERS, CUT_HIGHWAY, CUT_REF, CUT_WATER,
};

// All scenario extracts use this box unless noted.
const BOX: (f64, f64, f64, f64) = (0.0, 0.0, 10.0, 10.0);

#[test]
fn hardcut_crops_ways_and_relations() {
    let stream = vec![
        elem_node(node(1, 1.0, 1.0)),
        elem_node(node(2, 9.0, 9.0)),
        elem_node(node(3, 20.0, 20.0)),
        elem_way(way(4, &[1, 2, 3])),
        elem_way(way(5, &[1, 3])),
        elem_rel(relation(
            6,
            &[
                (MemberKind::Node, 1, "stop"),
                (MemberKind::Node, 3, "stop"),
                (MemberKind::Way, 5, "route"),
                (MemberKind::Relation, 99, "sub"),
            ],
        )),
        elem_rel(relation(7, &[(MemberKind::Node, 3, "stop")])),
    ];

    let (extract, written) = bbox_extract("inner", BOX);
    Hardcut::new(vec![extract]).run(&stream).unwrap();

    // Way 4 shrinks to its two inside nodes, way 5 would shrink to one node
    // and is dropped, relation 6 keeps only the node that was written.
    assert_eq!(
        written.borrow().as_slice(),
        &[
            elem_node(node(1, 1.0, 1.0)),
            elem_node(node(2, 9.0, 9.0)),
            elem_way(way(4, &[1, 2])),
            elem_rel(relation(6, &[(MemberKind::Node, 1, "stop")])),
        ]
    );
}

#[test]
fn hardcut_preserves_metadata_on_rebuilt_ways() {
    let mut tagged = way(4, &[1, 2, 3]);
    tagged.meta = Metadata {
        version: 7,
        timestamp: Some("2013-05-05T12:00:00Z".to_string()),
        uid: Some(3),
        changeset: Some(44),
        user: Some("mapper".to_string()),
        visible: true,
    };
    tagged.tags = vec![Tag::new("highway", "service")];

    let stream = vec![
        elem_node(node(1, 1.0, 1.0)),
        elem_node(node(2, 2.0, 2.0)),
        elem_node(node(3, 20.0, 20.0)),
        elem_way(tagged.clone()),
    ];

    let (extract, written) = bbox_extract("inner", BOX);
    Hardcut::new(vec![extract]).run(&stream).unwrap();

    let mut expected = tagged;
    expected.node_refs = vec![1, 2];
    assert_eq!(written.borrow().last().unwrap(), &elem_way(expected));
}

#[test]
fn simplecut_emits_all_versions_but_no_extra_nodes() {
    // Node 1 moves into the box in v2; node 2 stays outside but is part of
    // the tracked way.
    let stream = vec![
        elem_node(node_version(1, 1, 20.0, 20.0)),
        elem_node(node_version(1, 2, 5.0, 5.0)),
        elem_node(node(2, 30.0, 30.0)),
        elem_way(way(10, &[1, 2])),
    ];

    let (extract, written) = bbox_extract("inner", BOX);
    Simplecut::new(vec![extract]).run(&stream).unwrap();

    assert_eq!(
        written.borrow().as_slice(),
        &[
            elem_node(node_version(1, 1, 20.0, 20.0)),
            elem_node(node_version(1, 2, 5.0, 5.0)),
            elem_way(way(10, &[1, 2])),
        ]
    );
}

#[test]
fn softcut_closes_ways_over_all_versions() {
    // Only node 1 is inside. Way 10 references nodes 2 and 3 in different
    // versions; both must come along because the node pool spans versions.
    let stream = vec![
        elem_node(node(1, 1.0, 1.0)),
        elem_node(node(2, 20.0, 20.0)),
        elem_node(node(3, 30.0, 30.0)),
        elem_way(way_version(10, 1, &[1, 2])),
        elem_way(way_version(10, 2, &[1, 2, 3])),
    ];

    let (extract, written) = bbox_extract("inner", BOX);
    Softcut::new(vec![extract]).run(&stream).unwrap();

    assert_eq!(
        written.borrow().as_slice(),
        &[
            elem_node(node(1, 1.0, 1.0)),
            elem_node(node(2, 20.0, 20.0)),
            elem_node(node(3, 30.0, 30.0)),
            elem_way(way_version(10, 1, &[1, 2])),
            elem_way(way_version(10, 2, &[1, 2, 3])),
        ]
    );
}

#[test]
fn softcut_cascades_through_forward_references() {
    // Relation 20 references relation 22, which only becomes included when
    // it shows up later in the stream; 21 references 20. All three must end
    // up in the output via the back-edge map.
    let stream = vec![
        elem_node(node(1, 1.0, 1.0)),
        elem_way(way(10, &[1])),
        elem_rel(relation(20, &[(MemberKind::Relation, 22, "")])),
        elem_rel(relation(21, &[(MemberKind::Relation, 20, "")])),
        elem_rel(relation(22, &[(MemberKind::Way, 10, "")])),
    ];

    let (extract, written) = bbox_extract("inner", BOX);
    Softcut::new(vec![extract]).run(&stream).unwrap();

    assert_eq!(
        written.borrow().as_slice(),
        &[
            elem_node(node(1, 1.0, 1.0)),
            elem_way(way(10, &[1])),
            elem_rel(relation(20, &[(MemberKind::Relation, 22, "")])),
            elem_rel(relation(21, &[(MemberKind::Relation, 20, "")])),
            elem_rel(relation(22, &[(MemberKind::Way, 10, "")])),
        ]
    );
}

#[test]
fn softercut_completes_relation_members() {
    // Way 10 is hit geometrically; relation 20 is hit through way 10 and
    // pulls in way 11 and node 4, and pass two pulls in way 11's nodes.
    let stream = vec![
        elem_node(node(1, 1.0, 1.0)),
        elem_node(node(2, 20.0, 20.0)),
        elem_node(node(3, 21.0, 21.0)),
        elem_node(node(4, 22.0, 22.0)),
        elem_way(way(10, &[1, 2])),
        elem_way(way(11, &[3, 4])),
        elem_rel(relation(
            20,
            &[
                (MemberKind::Way, 10, "outer"),
                (MemberKind::Way, 11, "inner"),
                (MemberKind::Node, 4, "admin_centre"),
            ],
        )),
        // References relation 20 but softercut does not cascade.
        elem_rel(relation(21, &[(MemberKind::Relation, 20, "")])),
    ];

    let (extract, written) = bbox_extract("inner", BOX);
    Softercut::new(vec![extract]).run(&stream).unwrap();

    let output = written.borrow();
    assert_eq!(
        output.as_slice(),
        &[
            elem_node(node(1, 1.0, 1.0)),
            elem_node(node(2, 20.0, 20.0)),
            elem_node(node(3, 21.0, 21.0)),
            elem_node(node(4, 22.0, 22.0)),
            elem_way(way(10, &[1, 2])),
            elem_way(way(11, &[3, 4])),
            elem_rel(relation(
                20,
                &[
                    (MemberKind::Way, 10, "outer"),
                    (MemberKind::Way, 11, "inner"),
                    (MemberKind::Node, 4, "admin_centre"),
                ],
            )),
        ]
    );
}

#[test]
fn supersoftercut_adds_relation_cascade() {
    let stream = vec![
        elem_node(node(1, 1.0, 1.0)),
        elem_way(way(10, &[1])),
        elem_rel(relation(20, &[(MemberKind::Way, 10, "")])),
        elem_rel(relation(21, &[(MemberKind::Relation, 20, "")])),
        elem_rel(relation(22, &[(MemberKind::Relation, 21, "")])),
    ];

    let (extract, written) = bbox_extract("inner", BOX);
    SuperSoftercut::new(vec![extract]).run(&stream).unwrap();

    let ids: Vec<i64> = written.borrow().iter().map(Element::id).collect();
    assert_eq!(ids, vec![1, 10, 20, 21, 22]);
}

#[test]
fn cut_administrative_selects_boundary_relations() {
    let stream = vec![
        elem_node(node(1, 50.0, 50.0)),
        elem_node(node(2, 51.0, 51.0)),
        elem_node(node(3, 52.0, 52.0)),
        elem_way(way(10, &[1, 2])),
        elem_way(way(11, &[2, 3])),
        elem_rel(relation_tagged(
            30,
            &[("boundary", "administrative")],
            &[(MemberKind::Way, 10, "outer"), (MemberKind::Way, 11, "outer")],
        )),
        elem_rel(relation_tagged(
            31,
            &[("boundary", "postal")],
            &[(MemberKind::Way, 10, "outer")],
        )),
    ];

    let (extract, written) = bbox_extract("admin", BOX);
    TagCut::new(&CUT_ADMINISTRATIVE, vec![extract])
        .run(&stream)
        .unwrap();

    let ids: Vec<i64> = written.borrow().iter().map(Element::id).collect();
    assert_eq!(ids, vec![1, 2, 3, 10, 11, 30]);
}

#[test]
fn cut_all_borders_includes_whitelisted_relations() {
    let stream = vec![
        elem_node(node(1, 50.0, 50.0)),
        elem_node(node(2, 51.0, 51.0)),
        elem_way(way(10, &[1])),
        elem_way(way(11, &[2])),
        elem_rel(relation_tagged(
            30,
            &[("boundary", "territorial")],
            &[(MemberKind::Way, 11, "outer")],
        )),
        elem_rel(relation_tagged(31, &[("boundary", "postal")], &[])),
        // Untagged, but on the hardcoded list.
        elem_rel(relation(192797, &[(MemberKind::Way, 10, "outer")])),
    ];

    let (extract, written) = bbox_extract("borders", BOX);
    TagCut::new(&CUT_ALL_BORDERS, vec![extract])
        .run(&stream)
        .unwrap();

    let ids: Vec<i64> = written.borrow().iter().map(Element::id).collect();
    assert_eq!(ids, vec![1, 2, 10, 11, 30, 192797]);
}

#[test]
fn cut_highway_matches_on_key_presence_only() {
    let stream = vec![
        elem_node(node(1, 50.0, 50.0)),
        elem_way(way_tagged(10, &[("highway", "proposed")], &[1])),
        elem_way(way_tagged(11, &[("railway", "rail")], &[1])),
    ];

    let (extract, written) = bbox_extract("roads", BOX);
    TagCut::new(&CUT_HIGHWAY, vec![extract]).run(&stream).unwrap();

    let ids: Vec<i64> = written.borrow().iter().map(Element::id).collect();
    assert_eq!(ids, vec![1, 10]);
}

#[test]
fn cut_ref_accepts_all_ref_keys_including_space_variant() {
    let stream = vec![
        elem_node(node(1, 50.0, 50.0)),
        elem_node(node(2, 51.0, 51.0)),
        elem_node(node(3, 52.0, 52.0)),
        elem_way(way_tagged(10, &[("ref", "E 55")], &[1])),
        elem_way(way_tagged(11, &[("name", "Main Street")], &[2])),
        elem_way(way_tagged(12, &[(" int_ref", "E 55")], &[3])),
        elem_rel(relation_tagged(
            20,
            &[("loc_ref", "7")],
            &[(MemberKind::Way, 12, "")],
        )),
    ];

    let (extract, written) = bbox_extract("refs", BOX);
    TagCut::new(&CUT_REF, vec![extract]).run(&stream).unwrap();

    let ids: Vec<i64> = written.borrow().iter().map(Element::id).collect();
    assert_eq!(ids, vec![1, 3, 10, 12, 20]);
}

#[test]
fn cut_water_collects_way_nodes_in_one_sweep() {
    let stream = vec![
        elem_node(node(1, 50.0, 50.0)),
        elem_node(node(2, 51.0, 51.0)),
        elem_way(way_tagged(10, &[("natural", "coastline")], &[1, 2])),
        elem_way(way_tagged(11, &[("natural", "water")], &[2])),
        // Relations are never walked by cut_water.
        elem_rel(relation_tagged(
            20,
            &[("natural", "coastline")],
            &[(MemberKind::Way, 11, "")],
        )),
    ];

    let (extract, written) = bbox_extract("coast", BOX);
    TagCut::new(&CUT_WATER, vec![extract]).run(&stream).unwrap();

    let ids: Vec<i64> = written.borrow().iter().map(Element::id).collect();
    assert_eq!(ids, vec![1, 2, 10]);
}

#[test]
fn extracts_are_independent() {
    let stream = vec![
        elem_node(node(1, 1.0, 1.0)),
        elem_node(node(2, 30.0, 30.0)),
        elem_way(way(10, &[1])),
        elem_way(way(11, &[2])),
    ];

    let (west, west_written) = bbox_extract("west", BOX);
    let (east, east_written) = bbox_extract("east", (25.0, 25.0, 35.0, 35.0));
    Softcut::new(vec![west, east]).run(&stream).unwrap();

    let west_ids: Vec<i64> = west_written.borrow().iter().map(Element::id).collect();
    let east_ids: Vec<i64> = east_written.borrow().iter().map(Element::id).collect();
    assert_eq!(west_ids, vec![1, 10]);
    assert_eq!(east_ids, vec![2, 11]);
}

#[test]
fn driver_rejects_kind_order_violations() {
    let stream = vec![elem_way(way(10, &[1])), elem_node(node(1, 1.0, 1.0))];
    let err = run_pass(&stream, &mut NoopPass).unwrap_err();
    assert!(err.to_string().contains("out of order"), "{err}");
}

#[test]
fn driver_rejects_id_order_violations() {
    let stream = vec![
        elem_way(way_version(11, 1, &[1])),
        elem_way(way_version(10, 1, &[1])),
    ];
    let err = run_pass(&stream, &mut NoopPass).unwrap_err();
    assert!(err.to_string().contains("out of order"), "{err}");
}

#[test]
fn driver_fires_phase_hooks_in_order() {
    #[derive(Default)]
    struct HookLog(Vec<&'static str>);
    impl Pass for HookLog {
        fn node(&mut self, _: &Node) -> Result<()> {
            self.0.push("node");
            Ok(())
        }
        fn relation(&mut self, _: &Relation) -> Result<()> {
            self.0.push("relation");
            Ok(())
        }
        fn after_nodes(&mut self) -> Result<()> {
            self.0.push("after_nodes");
            Ok(())
        }
        fn after_ways(&mut self) -> Result<()> {
            self.0.push("after_ways");
            Ok(())
        }
        fn after_relations(&mut self) -> Result<()> {
            self.0.push("after_relations");
            Ok(())
        }
        fn done(&mut self) -> Result<()> {
            self.0.push("done");
            Ok(())
        }
    }

    // No ways at all: the way hooks still fire at the phase boundary.
    let stream = vec![
        elem_node(node(1, 1.0, 1.0)),
        elem_rel(relation(20, &[(MemberKind::Node, 1, "")])),
    ];
    let mut hooks = HookLog::default();
    run_pass(&stream, &mut hooks).unwrap();
    assert_eq!(
        hooks.0,
        vec![
            "node",
            "after_nodes",
            "after_ways",
            "relation",
            "after_relations",
            "done"
        ]
    );
}

struct NoopPass;
impl Pass for NoopPass {}

// Test scaffolding below: element builders and a recording sink.

fn node(id: i64, lon: f64, lat: f64) -> Node {
    node_version(id, 1, lon, lat)
}

fn node_version(id: i64, version: u32, lon: f64, lat: f64) -> Node {
    Node {
        id,
        meta: Metadata::visible_version(version),
        tags: vec![],
        lon,
        lat,
    }
}

fn way(id: i64, node_refs: &[i64]) -> Way {
    way_version(id, 1, node_refs)
}

fn way_version(id: i64, version: u32, node_refs: &[i64]) -> Way {
    Way {
        id,
        meta: Metadata::visible_version(version),
        tags: vec![],
        node_refs: node_refs.to_vec(),
    }
}

fn way_tagged(id: i64, tags: &[(&str, &str)], node_refs: &[i64]) -> Way {
    let mut way = way(id, node_refs);
    way.tags = tags.iter().map(|(k, v)| Tag::new(k, v)).collect();
    way
}

fn relation(id: i64, members: &[(MemberKind, i64, &str)]) -> Relation {
    relation_tagged(id, &[], members)
}

fn relation_tagged(
    id: i64,
    tags: &[(&str, &str)],
    members: &[(MemberKind, i64, &str)],
) -> Relation {
    Relation {
        id,
        meta: Metadata::visible_version(1),
        tags: tags.iter().map(|(k, v)| Tag::new(k, v)).collect(),
        members: members
            .iter()
            .map(|(kind, member_ref, role)| Member::new(*kind, *member_ref, role))
            .collect(),
    }
}

fn elem_node(node: Node) -> Element {
    Element::Node(node)
}

fn elem_way(way: Way) -> Element {
    Element::Way(way)
}

fn elem_rel(relation: Relation) -> Element {
    Element::Relation(relation)
}

/// Captures everything an extract writes, for assertions.
struct Recorder {
    written: Rc<RefCell<Vec<Element>>>,
}

impl ObjectSink for Recorder {
    fn node(&mut self, node: &Node) -> Result<()> {
        self.written.borrow_mut().push(Element::Node(node.clone()));
        Ok(())
    }
    fn way(&mut self, way: &Way) -> Result<()> {
        self.written.borrow_mut().push(Element::Way(way.clone()));
        Ok(())
    }
    fn relation(&mut self, relation: &Relation) -> Result<()> {
        self.written
            .borrow_mut()
            .push(Element::Relation(relation.clone()));
        Ok(())
    }
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

fn bbox_extract(
    name: &str,
    (min_lon, min_lat, max_lon, max_lat): (f64, f64, f64, f64),
) -> (Extract, Rc<RefCell<Vec<Element>>>) {
    let written = Rc::new(RefCell::new(Vec::new()));
    let extract = Extract::new(
        name.to_string(),
        Region::bbox(min_lon, min_lat, max_lon, max_lat),
        Box::new(Recorder {
            written: written.clone(),
        }),
    );
    (extract, written)
}
