//! Streaming OSM XML reader and writer.
//!
//! The reader hands one owned [`Element`] per object version to a callback
//! and keeps nothing else in memory, so a pass over a planet-scale file costs
//! a constant amount of RAM. The writer emits the same dialect and preserves
//! all version metadata.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str;

use anyhow::{bail, Context, Result};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::{Element, Member, MemberKind, Metadata, Node, Relation, Tag, Way};

/// Parse an OSM XML stream, invoking `f` once per object version in stream
/// order. Unknown elements (`bounds`, `changeset`, ...) are skipped.
pub fn parse<R: BufRead>(reader: R, f: &mut dyn FnMut(Element) -> Result<()>) -> Result<()> {
    let mut xml = Reader::from_reader(reader);
    xml.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match xml.read_event_into(&mut buf).context("malformed OSM XML")? {
            Event::Eof => break,
            Event::Start(start) => match start.name().as_ref() {
                b"node" => f(Element::Node(parse_node(&mut xml, start, true)?))?,
                b"way" => f(Element::Way(parse_way(&mut xml, start, true)?))?,
                b"relation" => f(Element::Relation(parse_relation(&mut xml, start, true)?))?,
                _ => {}
            },
            Event::Empty(start) => match start.name().as_ref() {
                b"node" => f(Element::Node(parse_node(&mut xml, start, false)?))?,
                b"way" => f(Element::Way(parse_way(&mut xml, start, false)?))?,
                b"relation" => f(Element::Relation(parse_relation(&mut xml, start, false)?))?,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

pub fn parse_file(path: &Path, f: &mut dyn FnMut(Element) -> Result<()>) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    parse(BufReader::new(file), f)
        .with_context(|| format!("while reading {}", path.display()))
}

struct Attrs {
    id: i64,
    lon: Option<f64>,
    lat: Option<f64>,
    meta: Metadata,
}

fn attr_str(attr: &Attribute) -> Result<String> {
    Ok(attr.unescape_value()?.into_owned())
}

fn scan_attrs(start: &BytesStart) -> Result<Attrs> {
    let mut id: Option<i64> = None;
    let mut lon = None;
    let mut lat = None;
    let mut meta = Metadata {
        visible: true,
        ..Default::default()
    };

    for attr in start.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"id" => id = Some(attr.unescape_value()?.parse()?),
            b"lon" => lon = Some(attr.unescape_value()?.parse()?),
            b"lat" => lat = Some(attr.unescape_value()?.parse()?),
            b"version" => meta.version = attr.unescape_value()?.parse()?,
            b"timestamp" => meta.timestamp = Some(attr_str(&attr)?),
            b"uid" => meta.uid = Some(attr.unescape_value()?.parse()?),
            b"changeset" => meta.changeset = Some(attr.unescape_value()?.parse()?),
            b"user" => meta.user = Some(attr_str(&attr)?),
            b"visible" => meta.visible = attr.unescape_value()?.as_ref() != "false",
            _ => {}
        }
    }

    Ok(Attrs {
        id: id.context("object without id attribute")?,
        lon,
        lat,
        meta,
    })
}

fn parse_tag(start: &BytesStart) -> Result<Tag> {
    let mut key = None;
    let mut value = None;
    for attr in start.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"k" => key = Some(attr_str(&attr)?),
            b"v" => value = Some(attr_str(&attr)?),
            _ => {}
        }
    }
    Ok(Tag {
        key: key.context("tag without k attribute")?,
        value: value.context("tag without v attribute")?,
    })
}

/// Consume child elements of `parent` until its end tag, feeding each one to
/// `child`. Used for `tag`, `nd` and `member` children.
fn each_child<R: BufRead>(
    xml: &mut Reader<R>,
    parent: &[u8],
    child: &mut dyn FnMut(&BytesStart) -> Result<()>,
) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match xml.read_event_into(&mut buf).context("malformed OSM XML")? {
            Event::Eof => bail!(
                "unexpected end of file inside <{}>",
                str::from_utf8(parent).unwrap_or("?")
            ),
            Event::End(end) if end.name().as_ref() == parent => break,
            Event::Start(start) | Event::Empty(start) => child(&start)?,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parse_node<R: BufRead>(xml: &mut Reader<R>, start: BytesStart, children: bool) -> Result<Node> {
    let attrs = scan_attrs(&start)?;
    let mut tags = Vec::new();
    if children {
        each_child(xml, b"node", &mut |child| {
            if child.name().as_ref() == b"tag" {
                tags.push(parse_tag(child)?);
            }
            Ok(())
        })?;
    }
    Ok(Node {
        id: attrs.id,
        lon: attrs.lon.with_context(|| format!("node {} without lon", attrs.id))?,
        lat: attrs.lat.with_context(|| format!("node {} without lat", attrs.id))?,
        meta: attrs.meta,
        tags,
    })
}

fn parse_way<R: BufRead>(xml: &mut Reader<R>, start: BytesStart, children: bool) -> Result<Way> {
    let attrs = scan_attrs(&start)?;
    let mut tags = Vec::new();
    let mut node_refs = Vec::new();
    if children {
        each_child(xml, b"way", &mut |child| {
            match child.name().as_ref() {
                b"tag" => tags.push(parse_tag(child)?),
                b"nd" => {
                    for attr in child.attributes() {
                        let attr = attr?;
                        if attr.key.as_ref() == b"ref" {
                            node_refs.push(attr.unescape_value()?.parse()?);
                        }
                    }
                }
                _ => {}
            }
            Ok(())
        })?;
    }
    Ok(Way {
        id: attrs.id,
        meta: attrs.meta,
        tags,
        node_refs,
    })
}

fn parse_member(start: &BytesStart) -> Result<Member> {
    let mut kind = None;
    let mut member_ref = None;
    let mut role = String::new();
    for attr in start.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"type" => {
                kind = Some(match attr.unescape_value()?.as_ref() {
                    "node" => MemberKind::Node,
                    "way" => MemberKind::Way,
                    "relation" => MemberKind::Relation,
                    other => bail!("unknown member type {other}"),
                })
            }
            b"ref" => member_ref = Some(attr.unescape_value()?.parse()?),
            b"role" => role = attr_str(&attr)?,
            _ => {}
        }
    }
    Ok(Member {
        kind: kind.context("member without type attribute")?,
        member_ref: member_ref.context("member without ref attribute")?,
        role,
    })
}

fn parse_relation<R: BufRead>(
    xml: &mut Reader<R>,
    start: BytesStart,
    children: bool,
) -> Result<Relation> {
    let attrs = scan_attrs(&start)?;
    let mut tags = Vec::new();
    let mut members = Vec::new();
    if children {
        each_child(xml, b"relation", &mut |child| {
            match child.name().as_ref() {
                b"tag" => tags.push(parse_tag(child)?),
                b"member" => members.push(parse_member(child)?),
                _ => {}
            }
            Ok(())
        })?;
    }
    Ok(Relation {
        id: attrs.id,
        meta: attrs.meta,
        tags,
        members,
    })
}

/// Writes an OSM XML stream. One writer per extract output; objects arrive
/// already in canonical order because the emitting pass observes that order.
pub struct OsmXmlWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> OsmXmlWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = Writer::new_with_indent(inner, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut osm = BytesStart::new("osm");
        osm.push_attribute(("version", "0.6"));
        osm.push_attribute(("generator", "splitter"));
        writer.write_event(Event::Start(osm))?;
        Ok(OsmXmlWriter { writer })
    }

    fn push_meta(el: &mut BytesStart, id: i64, meta: &Metadata) {
        el.push_attribute(("id", id.to_string().as_str()));
        el.push_attribute(("version", meta.version.to_string().as_str()));
        if let Some(ts) = &meta.timestamp {
            el.push_attribute(("timestamp", ts.as_str()));
        }
        if let Some(uid) = meta.uid {
            el.push_attribute(("uid", uid.to_string().as_str()));
        }
        if let Some(changeset) = meta.changeset {
            el.push_attribute(("changeset", changeset.to_string().as_str()));
        }
        if let Some(user) = &meta.user {
            el.push_attribute(("user", user.as_str()));
        }
        el.push_attribute(("visible", if meta.visible { "true" } else { "false" }));
    }

    fn write_tags(&mut self, tags: &[Tag]) -> Result<()> {
        for tag in tags {
            let mut el = BytesStart::new("tag");
            el.push_attribute(("k", tag.key.as_str()));
            el.push_attribute(("v", tag.value.as_str()));
            self.writer.write_event(Event::Empty(el))?;
        }
        Ok(())
    }

    pub fn node(&mut self, node: &Node) -> Result<()> {
        let mut el = BytesStart::new("node");
        Self::push_meta(&mut el, node.id, &node.meta);
        el.push_attribute(("lon", format_coord(node.lon).as_str()));
        el.push_attribute(("lat", format_coord(node.lat).as_str()));
        if node.tags.is_empty() {
            self.writer.write_event(Event::Empty(el))?;
        } else {
            self.writer.write_event(Event::Start(el))?;
            self.write_tags(&node.tags)?;
            self.writer.write_event(Event::End(BytesEnd::new("node")))?;
        }
        Ok(())
    }

    pub fn way(&mut self, way: &Way) -> Result<()> {
        let mut el = BytesStart::new("way");
        Self::push_meta(&mut el, way.id, &way.meta);
        if way.tags.is_empty() && way.node_refs.is_empty() {
            self.writer.write_event(Event::Empty(el))?;
            return Ok(());
        }
        self.writer.write_event(Event::Start(el))?;
        for node_ref in &way.node_refs {
            let mut nd = BytesStart::new("nd");
            nd.push_attribute(("ref", node_ref.to_string().as_str()));
            self.writer.write_event(Event::Empty(nd))?;
        }
        self.write_tags(&way.tags)?;
        self.writer.write_event(Event::End(BytesEnd::new("way")))?;
        Ok(())
    }

    pub fn relation(&mut self, relation: &Relation) -> Result<()> {
        let mut el = BytesStart::new("relation");
        Self::push_meta(&mut el, relation.id, &relation.meta);
        if relation.tags.is_empty() && relation.members.is_empty() {
            self.writer.write_event(Event::Empty(el))?;
            return Ok(());
        }
        self.writer.write_event(Event::Start(el))?;
        for member in &relation.members {
            let mut m = BytesStart::new("member");
            m.push_attribute(("type", member.kind.as_str()));
            m.push_attribute(("ref", member.member_ref.to_string().as_str()));
            m.push_attribute(("role", member.role.as_str()));
            self.writer.write_event(Event::Empty(m))?;
        }
        self.write_tags(&relation.tags)?;
        self.writer
            .write_event(Event::End(BytesEnd::new("relation")))?;
        Ok(())
    }

    /// Close the root element and flush. Must be called exactly once; a
    /// writer dropped without it leaves a truncated file, which spec'd error
    /// handling treats as invalid output anyway.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new("osm")))?;
        self.writer.get_mut().flush()?;
        Ok(())
    }
}

/// Seven decimals is the OSM wire precision (about 1 cm at the equator).
fn format_coord(value: f64) -> String {
    let mut s = format!("{value:.7}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.push('0');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(xml_in: &str) -> Vec<Element> {
        let mut elements = Vec::new();
        parse(xml_in.as_bytes(), &mut |elem| {
            elements.push(elem);
            Ok(())
        })
        .unwrap();
        elements
    }

    #[test]
    fn parses_versions_and_metadata() {
        let elements = roundtrip(
            r#"<?xml version="1.0"?>
            <osm version="0.6">
              <bounds minlon="0" minlat="0" maxlon="1" maxlat="1"/>
              <node id="5" version="1" timestamp="2011-01-01T00:00:00Z" uid="9" changeset="3" user="alice" lon="1.5" lat="2.5"/>
              <node id="5" version="2" visible="false" lon="1.5" lat="2.5">
                <tag k="amenity" v="pub"/>
              </node>
              <way id="7" version="1">
                <nd ref="5"/>
                <nd ref="6"/>
                <tag k="highway" v="residential"/>
              </way>
              <relation id="9" version="4">
                <member type="way" ref="7" role="outer"/>
                <tag k="type" v="multipolygon"/>
              </relation>
            </osm>"#,
        );

        assert_eq!(elements.len(), 4);
        match &elements[0] {
            Element::Node(n) => {
                assert_eq!(n.id, 5);
                assert_eq!(n.meta.version, 1);
                assert_eq!(n.meta.user.as_deref(), Some("alice"));
                assert!(n.meta.visible);
                assert_eq!(n.lon, 1.5);
            }
            other => panic!("expected node, got {other:?}"),
        }
        match &elements[1] {
            Element::Node(n) => {
                assert_eq!(n.meta.version, 2);
                assert!(!n.meta.visible);
                assert_eq!(n.tags, vec![Tag::new("amenity", "pub")]);
            }
            other => panic!("expected node, got {other:?}"),
        }
        match &elements[2] {
            Element::Way(w) => assert_eq!(w.node_refs, vec![5, 6]),
            other => panic!("expected way, got {other:?}"),
        }
        match &elements[3] {
            Element::Relation(r) => {
                assert_eq!(r.members, vec![Member::new(MemberKind::Way, 7, "outer")]);
            }
            other => panic!("expected relation, got {other:?}"),
        }
    }

    #[test]
    fn writer_output_parses_back() {
        let node = Node {
            id: 41,
            meta: Metadata {
                version: 3,
                timestamp: Some("2012-02-02T00:00:00Z".to_string()),
                uid: Some(17),
                changeset: Some(99),
                user: Some("bob & carol".to_string()),
                visible: true,
            },
            tags: vec![Tag::new("name", "\"quoted\" <name>")],
            lon: -0.1234567,
            lat: 51.5,
        };
        let way = Way {
            id: 42,
            meta: Metadata::visible_version(1),
            tags: vec![],
            node_refs: vec![41, 43],
        };

        let mut out = Vec::new();
        let mut writer = OsmXmlWriter::new(&mut out).unwrap();
        writer.node(&node).unwrap();
        writer.way(&way).unwrap();
        writer.finish().unwrap();

        let text = String::from_utf8(out).unwrap();
        let elements = roundtrip(&text);
        assert_eq!(elements, vec![Element::Node(node), Element::Way(way)]);
    }

    #[test]
    fn rejects_truncated_input() {
        let result = parse(
            "<osm><way id=\"1\"><nd ref=\"2\"/>".as_bytes(),
            &mut |_| Ok(()),
        );
        assert!(result.is_err());
    }
}
