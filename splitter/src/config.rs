//! The extract configuration file.
//!
//! One extract per line: `NAME KIND DATA`, whitespace separated. `KIND` is
//! `BBOX` (DATA is `min_lon,min_lat,max_lon,max_lat`), `POLY` (DATA is the
//! path to an osmosis polygon file) or `OSM` (DATA is the path to an OSM file
//! whose ways form the region boundary). Lines starting with `#` and blank
//! lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use splitter_core::Region;

use crate::poly;

#[derive(Debug)]
pub struct ExtractSpec {
    /// Also the output file path, verbatim.
    pub name: String,
    pub region: Region,
}

pub fn load(path: &Path) -> Result<Vec<ExtractSpec>> {
    let file = File::open(path)
        .with_context(|| format!("could not open config file {}", path.display()))?;
    parse(BufReader::new(file))
        .with_context(|| format!("in config file {}", path.display()))
}

fn parse(reader: impl BufRead) -> Result<Vec<ExtractSpec>> {
    let mut extracts = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let (Some(name), Some(kind), Some(data)) =
            (tokens.next(), tokens.next(), tokens.next())
        else {
            bail!("line {}: expected NAME KIND DATA, got {line:?}", lineno + 1);
        };

        let region = match kind {
            "BBOX" => parse_bbox(data)
                .with_context(|| format!("bad BBOX {data:?} for extract {name}"))?,
            "POLY" => Region::polygon(
                poly::read_poly_file(Path::new(data))
                    .with_context(|| format!("bad POLY region for extract {name}"))?,
            ),
            "OSM" => Region::polygon(
                poly::read_osm_geometry(Path::new(data))
                    .with_context(|| format!("bad OSM region for extract {name}"))?,
            ),
            other => bail!("extract {name}: unknown region kind {other:?}"),
        };
        extracts.push(ExtractSpec {
            name: name.to_string(),
            region,
        });
    }

    if extracts.is_empty() {
        bail!("no extracts configured");
    }
    Ok(extracts)
}

fn parse_bbox(data: &str) -> Result<Region> {
    let parts: Vec<&str> = data.split(',').collect();
    let [min_lon, min_lat, max_lon, max_lat] = parts.as_slice() else {
        bail!("expected four comma separated values");
    };
    Ok(Region::bbox(
        min_lon.trim().parse()?,
        min_lat.trim().parse()?,
        max_lon.trim().parse()?,
        max_lat.trim().parse()?,
    ))
}
