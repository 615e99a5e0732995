//! Region geometry readers: osmosis polygon files and OSM boundary files.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use splitter_osm::{xml, Element};

/// Read an osmosis `.poly` file. The first line names the polygon, each
/// following section is one ring (`!`-prefixed sections are holes in the
/// preceding outer ring), and a lone `END` terminates the file.
pub fn read_poly_file(path: &Path) -> Result<MultiPolygon> {
    let file = File::open(path)
        .with_context(|| format!("could not open poly file {}", path.display()))?;
    parse_poly(BufReader::new(file))
        .with_context(|| format!("in poly file {}", path.display()))
}

fn parse_poly(reader: impl BufRead) -> Result<MultiPolygon> {
    let mut lines = reader.lines();
    // The name line; its content is irrelevant here.
    lines.next().context("empty poly file")??;

    let mut rings: Vec<(LineString, Vec<LineString>)> = Vec::new();
    loop {
        let header = lines
            .next()
            .context("unexpected end of file, missing final END")??;
        let header = header.trim();
        if header == "END" {
            break;
        }
        let hole = header.starts_with('!');

        let mut coords = Vec::new();
        loop {
            let line = lines
                .next()
                .with_context(|| format!("ring {header:?} not terminated by END"))??;
            let line = line.trim();
            if line == "END" {
                break;
            }
            let mut parts = line.split_whitespace();
            let (Some(lon), Some(lat)) = (parts.next(), parts.next()) else {
                bail!("ring {header:?}: expected \"lon lat\", got {line:?}");
            };
            coords.push(Coord {
                x: lon.parse::<f64>()?,
                y: lat.parse::<f64>()?,
            });
        }
        if coords.len() < 3 {
            bail!("ring {header:?} has fewer than 3 points");
        }

        let ring = LineString::from(coords);
        if hole {
            let Some(outer) = rings.last_mut() else {
                bail!("hole ring {header:?} before any outer ring");
            };
            outer.1.push(ring);
        } else {
            rings.push((ring, Vec::new()));
        }
    }

    if rings.is_empty() {
        bail!("poly file contains no rings");
    }
    Ok(MultiPolygon(
        rings
            .into_iter()
            .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
            .collect(),
    ))
}

/// Build a region geometry from the ways of an OSM file. Closed ways become
/// polygons directly; open ways are glued end-to-end by shared endpoint node
/// ids, the way boundary relations are usually split up.
pub fn read_osm_geometry(path: &Path) -> Result<MultiPolygon> {
    let mut nodes: HashMap<i64, Coord> = HashMap::new();
    let mut ways: Vec<Vec<i64>> = Vec::new();
    xml::parse_file(path, &mut |element| {
        match element {
            Element::Node(node) => {
                nodes.insert(
                    node.id,
                    Coord {
                        x: node.lon,
                        y: node.lat,
                    },
                );
            }
            Element::Way(way) => ways.push(way.node_refs),
            Element::Relation(_) => {}
        }
        Ok(())
    })?;

    let rings = assemble_rings(ways)?;
    let mut polygons = Vec::new();
    for ring in rings {
        let coords = ring
            .iter()
            .map(|id| {
                nodes
                    .get(id)
                    .copied()
                    .with_context(|| format!("boundary way references missing node {id}"))
            })
            .collect::<Result<Vec<Coord>>>()?;
        if coords.len() < 3 {
            bail!("boundary ring has fewer than 3 points");
        }
        polygons.push(Polygon::new(LineString::from(coords), Vec::new()));
    }
    if polygons.is_empty() {
        bail!("no boundary ways found");
    }
    Ok(MultiPolygon(polygons))
}

/// Stitch way node-id chains into closed rings. Already-closed ways pass
/// through; open ways are appended to whichever end of the working chain they
/// share an endpoint with, flipping direction as needed.
fn assemble_rings(mut ways: Vec<Vec<i64>>) -> Result<Vec<Vec<i64>>> {
    ways.retain(|way| way.len() >= 2);

    let mut rings = Vec::new();
    ways.retain(|way| {
        if way.first() == way.last() {
            rings.push(way.clone());
            false
        } else {
            true
        }
    });

    while let Some(mut chain) = ways.pop() {
        loop {
            if chain.first() == chain.last() {
                rings.push(chain);
                break;
            }
            let tail = *chain.last().unwrap();
            let Some(index) = ways
                .iter()
                .position(|way| *way.first().unwrap() == tail || *way.last().unwrap() == tail)
            else {
                bail!("boundary ways do not close into a ring (open end at node {tail})");
            };
            let mut next = ways.remove(index);
            if *next.first().unwrap() != tail {
                next.reverse();
            }
            chain.pop();
            chain.extend(next);
        }
    }
    Ok(rings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_poly_with_hole() {
        let input = "\
test area
1
   0.0  0.0
   10.0 0.0
   10.0 10.0
   0.0  10.0
END
!1a
   4.0 4.0
   6.0 4.0
   6.0 6.0
   4.0 6.0
END
2
   20.0 20.0
   22.0 20.0
   21.0 22.0
END
END
";
        let multi = parse_poly(input.as_bytes()).unwrap();
        assert_eq!(multi.0.len(), 2);
        assert_eq!(multi.0[0].interiors().len(), 1);
        assert_eq!(multi.0[1].interiors().len(), 0);
    }

    #[test]
    fn rejects_hole_without_outer() {
        let input = "name\n!1\n 0 0\n 1 0\n 1 1\nEND\nEND\n";
        let err = parse_poly(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("before any outer"), "{err}");
    }

    #[test]
    fn rejects_unterminated_file() {
        let input = "name\n1\n 0 0\n 1 0\n 1 1\nEND\n";
        assert!(parse_poly(input.as_bytes()).is_err());
    }

    #[test]
    fn assembles_split_boundary_ways() {
        // Two open chains forming one square, one of them reversed, plus an
        // already-closed triangle.
        let ways = vec![
            vec![1, 2, 3],
            vec![1, 5, 3], // shares both endpoints, runs the other way
            vec![7, 8, 9, 7],
        ];
        let rings = assemble_rings(ways).unwrap();
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|ring| ring.first() == ring.last()));
    }

    #[test]
    fn reports_unclosable_boundaries() {
        let err = assemble_rings(vec![vec![1, 2, 3]]).unwrap_err();
        assert!(err.to_string().contains("do not close"), "{err}");
    }
}
