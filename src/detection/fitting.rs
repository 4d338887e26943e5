use tracing::{debug, warn};

use crate::error::{Result, SlicerError};
use crate::geometry::{Point, Quadrilateral, convex_hull, min_area_rect};
use crate::models::Region;
use crate::pipeline::FittedBoundary;

/// Fit the minimum-area rectangle around a hull, then grow it by `margin`
pub fn fit_hull(hull: Vec<Point>, margin: f64) -> Result<FittedBoundary> {
    let corners = min_area_rect(&hull).ok_or_else(|| {
        SlicerError::InvalidGeometry("region has no enclosed area".to_string())
    })?;
    let boundary = Quadrilateral::new(corners)?.offset(margin)?;
    Ok(FittedBoundary { hull, boundary })
}

/// Fit every region, dropping the ones whose fit is degenerate
pub fn fit_regions(regions: &[Region], margin: f64) -> Vec<FittedBoundary> {
    regions
        .iter()
        .filter_map(|region| match fit_hull(region.hull(), margin) {
            Ok(fitted) => Some(fitted),
            Err(err) => {
                warn!(label = region.label, %err, "Discarding region with degenerate fit");
                None
            }
        })
        .collect()
}

/// Merge boundaries that lie within `tolerance` pixels of each other.
///
/// Each merge refits the union of both hulls; the scan restarts until no pair
/// qualifies, so chains of near-touching pieces collapse into one.
pub fn merge_close(mut fitted: Vec<FittedBoundary>, tolerance: f64, margin: f64) -> Vec<FittedBoundary> {
    'scan: loop {
        for i in 0..fitted.len() {
            for j in (i + 1)..fitted.len() {
                let distance = fitted[i].boundary.distance_to(&fitted[j].boundary);
                if distance > tolerance {
                    continue;
                }

                let mut points = fitted[i].hull.clone();
                points.extend_from_slice(&fitted[j].hull);
                match fit_hull(convex_hull(&points), margin) {
                    Ok(merged) => {
                        debug!(first = i, second = j, distance, "Merging neighbouring boundaries");
                        fitted.remove(j);
                        fitted[i] = merged;
                        continue 'scan;
                    }
                    Err(err) => {
                        warn!(first = i, second = j, %err, "Refit after merge failed; leaving boundaries apart");
                    }
                }
            }
        }
        break;
    }
    fitted
}
