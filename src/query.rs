use std::fmt;

use crate::error::ExtractError;

/// south,west,north,east — the order the `[bbox:...]` header wants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

/// An Overpass QL query. Built once, opaque to everything downstream.
pub struct Query {
    text: String,
}

impl Query {
    /// Each filter is one statement of the union, e.g. `node[amenity]` or
    /// `way[highway=primary]`. The timeout is a server-side hint, not a
    /// client-side one.
    pub fn new(bbox: BoundingBox, timeout_secs: u32, filters: &[&str]) -> Result<Self, ExtractError> {
        if filters.is_empty() {
            return Err(ExtractError::EmptyQuery);
        }
        let mut text = format!("[bbox:{bbox}]\n[out:json]\n[timeout:{timeout_secs}];\n(\n");
        for filter in filters {
            text.push_str("    ");
            text.push_str(filter);
            text.push_str(";\n");
        }
        text.push_str(");\nout geom 10;\n");
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_bbox_and_timeout_header() {
        let bbox = BoundingBox {
            south: 33.48,
            west: -117.18,
            north: 33.52,
            east: -117.12,
        };
        let query = Query::new(bbox, 90, &["node[amenity]", "way[highway=primary]"]).unwrap();
        let text = query.as_str();
        assert!(text.starts_with("[bbox:33.48,-117.18,33.52,-117.12]\n[out:json]\n[timeout:90];"));
        assert!(text.contains("node[amenity];"));
        assert!(text.contains("way[highway=primary];"));
        assert!(text.ends_with("out geom 10;\n"));
    }

    #[test]
    fn rejects_empty_filter_list() {
        let bbox = BoundingBox {
            south: 0.0,
            west: 0.0,
            north: 1.0,
            east: 1.0,
        };
        assert!(matches!(
            Query::new(bbox, 90, &[]),
            Err(ExtractError::EmptyQuery)
        ));
    }
}
