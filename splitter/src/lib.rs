//! Wiring between the cut engine and the filesystem: input sources, XML
//! output sinks, config loading and strategy dispatch.

#[macro_use]
extern crate log;

pub mod config;
pub mod poly;

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use splitter_core::hardcut::Hardcut;
use splitter_core::simplecut::Simplecut;
use splitter_core::softcut::Softcut;
use splitter_core::softercut::Softercut;
use splitter_core::supersoftercut::SuperSoftercut;
use splitter_core::tagcut::{
    TagCut, CUT_ADMINISTRATIVE, CUT_ALL_BORDERS, CUT_HIGHWAY, CUT_REF, CUT_WATER,
};
use splitter_core::{Extract, ObjectSink, ObjectSource};
use splitter_osm::xml::{self, OsmXmlWriter};
use splitter_osm::{Element, Node, Relation, Way};

use config::ExtractSpec;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Softcut,
    Hardcut,
    Softercut,
    SuperSoftercut,
    CutAdministrative,
    CutHighway,
    CutAllBorders,
    CutRef,
    CutWater,
    Simplecut,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Softcut => "softcut",
            StrategyKind::Hardcut => "hardcut",
            StrategyKind::Softercut => "softercut",
            StrategyKind::SuperSoftercut => "supersoftercut",
            StrategyKind::CutAdministrative => "cut_administrative",
            StrategyKind::CutHighway => "cut_highway",
            StrategyKind::CutAllBorders => "cut_all_borders",
            StrategyKind::CutRef => "cut_ref",
            StrategyKind::CutWater => "cut_water",
            StrategyKind::Simplecut => "simplecut",
        }
    }

    /// Only the single-pass strategy can work on a non-seekable stream.
    pub fn allows_stdin(self) -> bool {
        self == StrategyKind::Hardcut
    }
}

/// Where the OSM stream comes from. A file is reopened for every pass; stdin
/// can only be read once, which `StrategyKind::allows_stdin` guards.
pub enum Input {
    File(PathBuf),
    Stdin,
}

impl ObjectSource for Input {
    fn visit(&self, f: &mut dyn FnMut(&Element) -> Result<()>) -> Result<()> {
        match self {
            Input::File(path) => xml::parse_file(path, &mut |element| f(&element)),
            Input::Stdin => xml::parse(io::stdin().lock(), &mut |element| f(&element)),
        }
    }
}

struct XmlSink {
    writer: OsmXmlWriter<BufWriter<File>>,
}

impl ObjectSink for XmlSink {
    fn node(&mut self, node: &Node) -> Result<()> {
        self.writer.node(node)
    }
    fn way(&mut self, way: &Way) -> Result<()> {
        self.writer.way(way)
    }
    fn relation(&mut self, relation: &Relation) -> Result<()> {
        self.writer.relation(relation)
    }
    fn finish(&mut self) -> Result<()> {
        self.writer.finish()
    }
}

/// Open one output file per configured extract. The extract name doubles as
/// the output path.
pub fn open_extracts(specs: Vec<ExtractSpec>) -> Result<Vec<Extract>> {
    specs
        .into_iter()
        .map(|spec| {
            let file = File::create(&spec.name)
                .with_context(|| format!("could not create output file for extract {}", spec.name))?;
            let writer = OsmXmlWriter::new(BufWriter::new(file))
                .with_context(|| format!("extract {}", spec.name))?;
            Ok(Extract::new(
                spec.name,
                spec.region,
                Box::new(XmlSink { writer }),
            ))
        })
        .collect()
}

pub fn run(kind: StrategyKind, input: Input, extracts: Vec<Extract>) -> Result<()> {
    if matches!(input, Input::Stdin) && !kind.allows_stdin() {
        bail!("can't read from stdin with the {} strategy", kind.name());
    }
    info!("running {} over {} extracts", kind.name(), extracts.len());

    match kind {
        StrategyKind::Softcut => Softcut::new(extracts).run(&input),
        StrategyKind::Hardcut => Hardcut::new(extracts).run(&input),
        StrategyKind::Softercut => Softercut::new(extracts).run(&input),
        StrategyKind::SuperSoftercut => SuperSoftercut::new(extracts).run(&input),
        StrategyKind::CutAdministrative => TagCut::new(&CUT_ADMINISTRATIVE, extracts).run(&input),
        StrategyKind::CutHighway => TagCut::new(&CUT_HIGHWAY, extracts).run(&input),
        StrategyKind::CutAllBorders => TagCut::new(&CUT_ALL_BORDERS, extracts).run(&input),
        StrategyKind::CutRef => TagCut::new(&CUT_REF, extracts).run(&input),
        StrategyKind::CutWater => TagCut::new(&CUT_WATER, extracts).run(&input),
        StrategyKind::Simplecut => Simplecut::new(extracts).run(&input),
    }
}
