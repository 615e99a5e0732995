//! The OSM object model shared by the cut engine and the CLI, plus streaming
//! XML I/O in [`xml`].
//!
//! Objects carry full history metadata (version, timestamp, uid, changeset,
//! user, visibility), because a splitter input may contain several versions of
//! the same id and the output must preserve them byte-for-byte in meaning.

pub mod xml;

/// One object version from an OSM stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Element {
    pub fn kind(&self) -> MemberKind {
        match self {
            Element::Node(_) => MemberKind::Node,
            Element::Way(_) => MemberKind::Way,
            Element::Relation(_) => MemberKind::Relation,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Element::Node(n) => n.id,
            Element::Way(w) => w.id,
            Element::Relation(r) => r.id,
        }
    }
}

/// Version metadata common to all three object kinds. Fields that a planet
/// dump may omit are optional and round-trip as absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    pub version: u32,
    pub timestamp: Option<String>,
    pub uid: Option<i64>,
    pub changeset: Option<i64>,
    pub user: Option<String>,
    pub visible: bool,
}

impl Metadata {
    pub fn visible_version(version: u32) -> Self {
        Metadata {
            version,
            visible: true,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Tag {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Ordered tag list. Order is preserved from the input; OSM semantics do not
/// depend on it but the output should not reshuffle.
pub type Tags = Vec<Tag>;

pub fn has_key(tags: &[Tag], key: &str) -> bool {
    tags.iter().any(|t| t.key == key)
}

pub fn has_key_value(tags: &[Tag], key: &str, value: &str) -> bool {
    tags.iter().any(|t| t.key == key && t.value == value)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: i64,
    pub meta: Metadata,
    pub tags: Tags,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Way {
    pub id: i64,
    pub meta: Metadata,
    pub tags: Tags,
    /// Referenced node ids, in way order. May reference nodes outside the
    /// stream; the splitter never resolves them to coordinates.
    pub node_refs: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub id: i64,
    pub meta: Metadata,
    pub tags: Tags,
    pub members: Vec<Member>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

impl MemberKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberKind::Node => "node",
            MemberKind::Way => "way",
            MemberKind::Relation => "relation",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub kind: MemberKind,
    pub member_ref: i64,
    pub role: String,
}

impl Member {
    pub fn new(kind: MemberKind, member_ref: i64, role: &str) -> Self {
        Member {
            kind,
            member_ref,
            role: role.to_string(),
        }
    }
}
