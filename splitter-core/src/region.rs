//! Geometric containment for extract regions.

use geo::MultiPolygon;
use rstar::primitives::{GeomWithData, Line};
use rstar::{RTree, AABB};
use splitter_osm::Node;

/// The area an extract selects nodes from. Containment is the only operation
/// the cut strategies need; ways and relations are never tested against the
/// region directly.
#[derive(Debug)]
pub enum Region {
    BBox {
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    },
    Polygon(PolygonIndex),
}

impl Region {
    pub fn bbox(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Region::BBox {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn polygon(multi_polygon: MultiPolygon) -> Self {
        Region::Polygon(PolygonIndex::new(multi_polygon))
    }

    /// Both bounds are inclusive for bounding boxes. Polygon containment is
    /// even-odd; whatever it answers for points exactly on a ring it answers
    /// identically on every pass, which is all the multi-pass strategies
    /// need.
    pub fn contains(&self, node: &Node) -> bool {
        match self {
            Region::BBox {
                min_lon,
                min_lat,
                max_lon,
                max_lat,
            } => {
                *min_lon <= node.lon
                    && node.lon <= *max_lon
                    && *min_lat <= node.lat
                    && node.lat <= *max_lat
            }
            Region::Polygon(index) => index.contains(node.lon, node.lat),
        }
    }
}

type Edge = GeomWithData<Line<[f64; 2]>, ()>;

/// Point-in-area locator over a multi-polygon, built once per extract.
///
/// All ring edges (exterior and holes) go into an R-tree. A containment query
/// casts a horizontal ray east from the point and counts edge crossings among
/// the edges whose envelope meets the ray, so a query touches O(log n + k)
/// edges instead of every ring segment. Even-odd counting makes holes fall
/// out for free.
#[derive(Debug)]
pub struct PolygonIndex {
    edges: RTree<Edge>,
    max_lon: f64,
}

impl PolygonIndex {
    pub fn new(multi_polygon: MultiPolygon) -> Self {
        let mut edges = Vec::new();
        let mut max_lon = f64::MIN;
        for polygon in &multi_polygon.0 {
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                for line in ring.lines() {
                    max_lon = max_lon.max(line.start.x).max(line.end.x);
                    edges.push(GeomWithData::new(
                        Line::new([line.start.x, line.start.y], [line.end.x, line.end.y]),
                        (),
                    ));
                }
            }
        }
        PolygonIndex {
            edges: RTree::bulk_load(edges),
            max_lon,
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lon > self.max_lon {
            return false;
        }
        let ray = AABB::from_corners([lon, lat], [self.max_lon + 1.0, lat]);
        let mut crossings = 0usize;
        for edge in self.edges.locate_in_envelope_intersecting(&ray) {
            let [x1, y1] = edge.geom().from;
            let [x2, y2] = edge.geom().to;
            if (y1 > lat) != (y2 > lat) {
                let x_at_lat = x1 + (lat - y1) * (x2 - x1) / (y2 - y1);
                if x_at_lat > lon {
                    crossings += 1;
                }
            }
        }
        crossings % 2 == 1
    }
}
