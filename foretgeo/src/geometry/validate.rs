//! Validation des polygones dessinés
//!
//! Règles appliquées à chaque anneau :
//! - au moins 4 positions, la première égale à la dernière
//! - coordonnées finies, dans l'intervalle WGS84
//! - pas d'auto-intersection (ni croisement, ni segment replié)
//!
//! Au niveau polygone : chaque trou est dans son enveloppe sans la traverser
//! (un point de contact au plus), les trous ne se chevauchent pas, les
//! parties d'un multipolygone non plus.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, BooleanOps, BoundingRect, Coord, Intersects, Line, LineString, MultiPolygon, Point, Polygon};
use tracing::debug;

use super::{DrawnPolygon, Ring, ValidPolygon};
use crate::ForetError;

/// Nombre minimal de positions d'un anneau fermé (triangle + fermeture)
pub const MIN_RING_POINTS: usize = 4;

/// Valide un polygone dessiné et le convertit en géométrie `geo`
pub fn validate(drawn: &DrawnPolygon) -> Result<ValidPolygon, ForetError> {
    if drawn.parts().is_empty() {
        return Err(ForetError::invalid_geometry("polygon has no rings"));
    }

    let mut polygons = Vec::with_capacity(drawn.parts().len());

    for (part_idx, rings) in drawn.parts().iter().enumerate() {
        let Some((shell, holes)) = rings.split_first() else {
            return Err(ForetError::invalid_geometry(format!(
                "part {} has no exterior ring",
                part_idx
            )));
        };

        let shell = validate_ring(shell).map_err(|reason| {
            ForetError::invalid_geometry(format!("part {} exterior ring: {}", part_idx, reason))
        })?;
        let shell_polygon = Polygon::new(shell.clone(), vec![]);

        let mut interiors = Vec::with_capacity(holes.len());
        for (hole_idx, hole) in holes.iter().enumerate() {
            let hole = validate_ring(hole).map_err(|reason| {
                ForetError::invalid_geometry(format!(
                    "part {} hole {}: {}",
                    part_idx, hole_idx, reason
                ))
            })?;

            let outside = hole
                .coords()
                .any(|c| !shell_polygon.intersects(&Point::from(*c)));
            if outside {
                return Err(ForetError::invalid_geometry(format!(
                    "part {} hole {} lies outside its exterior ring",
                    part_idx, hole_idx
                )));
            }
            if rings_cross(&shell, &hole) {
                return Err(ForetError::invalid_geometry(format!(
                    "part {} hole {} crosses its exterior ring",
                    part_idx, hole_idx
                )));
            }
            interiors.push(hole);
        }

        let hole_polygons: Vec<Polygon> = interiors
            .iter()
            .map(|hole| Polygon::new(hole.clone(), vec![]))
            .collect();
        if let Some((i, j)) = first_overlap(&hole_polygons) {
            return Err(ForetError::invalid_geometry(format!(
                "part {} holes {} and {} overlap",
                part_idx, i, j
            )));
        }

        polygons.push(Polygon::new(shell, interiors));
    }

    check_parts_disjoint(&polygons)?;

    let geometry = MultiPolygon::new(polygons);
    debug!(parts = geometry.0.len(), "Polygon validated");

    ValidPolygon::new(geometry).ok_or_else(|| ForetError::invalid_geometry("empty geometry"))
}

/// Valide un anneau brut et retourne l'anneau sans doublons consécutifs
fn validate_ring(ring: &Ring) -> Result<LineString, String> {
    if ring.len() < MIN_RING_POINTS {
        return Err(format!(
            "ring has {} positions, at least {} required",
            ring.len(),
            MIN_RING_POINTS
        ));
    }

    for c in ring {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err("ring contains a non-finite coordinate".to_string());
        }
        if c.x.abs() > 180.0 || c.y.abs() > 90.0 {
            return Err(format!("coordinate ({}, {}) outside WGS84 range", c.x, c.y));
        }
    }

    let first = ring[0];
    let last = ring[ring.len() - 1];
    if !coords_equal(first, last) {
        return Err("ring is not closed (first position differs from last)".to_string());
    }

    // Doublons consécutifs (double-clic lors du dessin) : sans incidence sur la forme
    let mut coords: Vec<Coord> = Vec::with_capacity(ring.len());
    for c in ring {
        if coords.last().map_or(true, |prev| !coords_equal(*prev, *c)) {
            coords.push(*c);
        }
    }
    let start = coords[0];
    if let Some(end) = coords.last_mut() {
        *end = start;
    }

    if coords.len() < MIN_RING_POINTS {
        return Err("ring has fewer than 3 distinct vertices".to_string());
    }

    let line_string = LineString::new(coords);
    if let Some((i, j)) = find_self_intersection(&line_string) {
        return Err(format!("ring self-intersects (segments {} and {})", i, j));
    }

    if Polygon::new(line_string.clone(), vec![]).unsigned_area() == 0.0 {
        return Err("ring is degenerate (zero area)".to_string());
    }

    Ok(line_string)
}

/// Cherche deux segments de l'anneau qui se coupent
///
/// Deux segments consécutifs ne partagent que leur sommet commun ; tout
/// autre contact est une auto-intersection.
fn find_self_intersection(ring: &LineString) -> Option<(usize, usize)> {
    let segments: Vec<Line> = ring.lines().collect();
    let n = segments.len();

    for i in 0..n {
        let rect_i = segments[i].bounding_rect();
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);

            if !rect_i.intersects(&segments[j].bounding_rect()) {
                continue;
            }

            match line_intersection(segments[i], segments[j]) {
                None => {}
                Some(LineIntersection::Collinear { intersection }) => {
                    // Segment replié sur le précédent
                    if !adjacent || intersection.start != intersection.end {
                        return Some((i, j));
                    }
                }
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { .. }) => return Some((i, j)),
            }
        }
    }

    None
}

/// Un trou peut toucher son enveloppe en un seul point, sans la traverser
fn rings_cross(shell: &LineString, hole: &LineString) -> bool {
    let mut touches: Vec<Coord> = Vec::new();

    for a in shell.lines() {
        let rect_a = a.bounding_rect();
        for b in hole.lines() {
            if !rect_a.intersects(&b.bounding_rect()) {
                continue;
            }
            match line_intersection(a, b) {
                None => {}
                Some(LineIntersection::Collinear { intersection }) => {
                    if !coords_equal(intersection.start, intersection.end) {
                        return true;
                    }
                    push_distinct(&mut touches, intersection.start);
                }
                Some(LineIntersection::SinglePoint {
                    is_proper: true, ..
                }) => return true,
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    push_distinct(&mut touches, intersection);
                }
            }
            if touches.len() > 1 {
                return true;
            }
        }
    }

    false
}

fn push_distinct(points: &mut Vec<Coord>, c: Coord) {
    if !points.iter().any(|p| coords_equal(*p, c)) {
        points.push(c);
    }
}

/// Première paire de polygones dont l'intersection a une surface non nulle
fn first_overlap(polygons: &[Polygon]) -> Option<(usize, usize)> {
    for i in 0..polygons.len() {
        for j in (i + 1)..polygons.len() {
            let (Some(a), Some(b)) = (polygons[i].bounding_rect(), polygons[j].bounding_rect())
            else {
                continue;
            };
            if !a.intersects(&b) {
                continue;
            }
            if polygons[i].intersection(&polygons[j]).unsigned_area() > 0.0 {
                return Some((i, j));
            }
        }
    }
    None
}

/// Les parties d'un multipolygone ne doivent pas se recouvrir
fn check_parts_disjoint(polygons: &[Polygon]) -> Result<(), ForetError> {
    match first_overlap(polygons) {
        Some((i, j)) => Err(ForetError::invalid_geometry(format!(
            "parts {} and {} overlap",
            i, j
        ))),
        None => Ok(()),
    }
}

/// Compare deux coordonnées avec tolérance
fn coords_equal(a: Coord, b: Coord) -> bool {
    const TOLERANCE: f64 = 1e-12;
    (a.x - b.x).abs() < TOLERANCE && (a.y - b.y).abs() < TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]
    }

    #[test]
    fn test_valid_square() {
        let valid = DrawnPolygon::from_rings(vec![square()]).validate().unwrap();
        assert_eq!(valid.geometry().0.len(), 1);
        assert_eq!(valid.geometry().0[0].exterior().0.len(), 5);
    }

    #[test]
    fn test_three_points_unclosed() {
        let err = DrawnPolygon::from_rings(vec![vec![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0]]])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ForetError::InvalidGeometry(_)));
    }

    #[test]
    fn test_unclosed_ring() {
        let err = DrawnPolygon::from_rings(vec![vec![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [1.0, 0.0],
            [0.5, -0.5],
        ]])
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("not closed"));
    }

    #[test]
    fn test_bowtie_self_intersects() {
        let err = DrawnPolygon::from_rings(vec![vec![
            [0.0, 0.0],
            [1.0, 1.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [0.0, 0.0],
        ]])
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("self-intersects"));
    }

    #[test]
    fn test_unequal_bowtie_self_intersects() {
        let err = DrawnPolygon::from_rings(vec![vec![
            [0.0, 0.0],
            [3.0, 2.0],
            [3.0, 0.0],
            [0.0, 1.0],
            [0.0, 0.0],
        ]])
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("self-intersects"));
    }

    #[test]
    fn test_spike_is_rejected() {
        // Aller-retour sur le même segment
        let err = DrawnPolygon::from_rings(vec![vec![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 0.0],
            [0.0, 0.0],
        ]])
        .validate()
        .unwrap_err();
        assert!(matches!(err, ForetError::InvalidGeometry(_)));
    }

    #[test]
    fn test_duplicate_vertices_are_tolerated() {
        let valid = DrawnPolygon::from_rings(vec![vec![
            [0.0, 0.0],
            [0.0, 1.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [1.0, 0.0],
            [0.0, 0.0],
        ]])
        .validate()
        .unwrap();
        assert_eq!(valid.geometry().0[0].exterior().0.len(), 5);
    }

    #[test]
    fn test_collinear_vertex_is_valid() {
        let valid = DrawnPolygon::from_rings(vec![vec![
            [0.0, 0.0],
            [0.0, 0.5],
            [0.0, 1.0],
            [1.0, 1.0],
            [1.0, 0.0],
            [0.0, 0.0],
        ]])
        .validate();
        assert!(valid.is_ok());
    }

    #[test]
    fn test_degenerate_ring() {
        let err = DrawnPolygon::from_rings(vec![vec![
            [0.0, 0.0],
            [1.0, 1.0],
            [2.0, 2.0],
            [0.0, 0.0],
        ]])
        .validate()
        .unwrap_err();
        assert!(matches!(err, ForetError::InvalidGeometry(_)));
    }

    #[test]
    fn test_out_of_range() {
        let err = DrawnPolygon::from_rings(vec![vec![
            [0.0, 0.0],
            [0.0, 91.0],
            [1.0, 1.0],
            [0.0, 0.0],
        ]])
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("WGS84"));
    }

    #[test]
    fn test_hole_inside_shell() {
        let shell = vec![[0.0, 0.0], [0.0, 4.0], [4.0, 4.0], [4.0, 0.0], [0.0, 0.0]];
        let hole = vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0], [1.0, 1.0]];
        let valid = DrawnPolygon::from_rings(vec![shell.clone(), hole])
            .validate()
            .unwrap();
        assert_eq!(valid.geometry().0[0].interiors().len(), 1);

        let outside = vec![[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0], [5.0, 5.0]];
        assert!(DrawnPolygon::from_rings(vec![shell, outside])
            .validate()
            .is_err());
    }

    #[test]
    fn test_hole_crossing_shell() {
        // Enveloppe en U, trou à cheval sur l'échancrure
        let shell = vec![
            [0.0, 0.0],
            [3.0, 0.0],
            [3.0, 3.0],
            [2.0, 3.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 3.0],
            [0.0, 3.0],
            [0.0, 0.0],
        ];
        let hole = vec![[0.5, 2.0], [2.5, 2.0], [2.5, 2.5], [0.5, 2.5], [0.5, 2.0]];
        let err = DrawnPolygon::from_rings(vec![shell, hole])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("crosses its exterior ring"));
    }

    #[test]
    fn test_hole_touching_shell_once() {
        let shell = vec![[0.0, 0.0], [0.0, 4.0], [4.0, 4.0], [4.0, 0.0], [0.0, 0.0]];
        let hole = vec![[0.0, 2.0], [1.0, 1.0], [1.0, 3.0], [0.0, 2.0]];
        assert!(DrawnPolygon::from_rings(vec![shell, hole]).validate().is_ok());
    }

    #[test]
    fn test_duplicate_hole() {
        let shell = vec![[0.0, 0.0], [0.0, 4.0], [4.0, 4.0], [4.0, 0.0], [0.0, 0.0]];
        let hole = vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0], [1.0, 1.0]];
        let err = DrawnPolygon::from_rings(vec![shell, hole.clone(), hole])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("holes 0 and 1 overlap"));
    }

    #[test]
    fn test_overlapping_holes() {
        let shell = vec![[0.0, 0.0], [0.0, 4.0], [4.0, 4.0], [4.0, 0.0], [0.0, 0.0]];
        let a = vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 2.0], [1.0, 1.0]];
        let b = vec![[1.5, 1.5], [3.0, 1.5], [3.0, 3.0], [1.5, 3.0], [1.5, 1.5]];
        let c = vec![[2.5, 0.5], [3.5, 0.5], [3.5, 1.0], [2.5, 1.0], [2.5, 0.5]];

        assert!(DrawnPolygon::from_rings(vec![shell.clone(), a.clone(), b])
            .validate()
            .is_err());
        assert!(DrawnPolygon::from_rings(vec![shell, a, c]).validate().is_ok());
    }

    #[test]
    fn test_overlapping_parts() {
        let a = vec![[0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0], [0.0, 0.0]];
        let b = vec![[1.0, 1.0], [1.0, 3.0], [3.0, 3.0], [3.0, 1.0], [1.0, 1.0]];
        let c = vec![[5.0, 5.0], [5.0, 6.0], [6.0, 6.0], [6.0, 5.0], [5.0, 5.0]];

        assert!(DrawnPolygon::from_parts(vec![vec![a.clone()], vec![b]])
            .validate()
            .is_err());
        assert!(DrawnPolygon::from_parts(vec![vec![a], vec![c]])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_empty_polygon() {
        assert!(DrawnPolygon::from_parts(vec![]).validate().is_err());
        assert!(DrawnPolygon::from_parts(vec![vec![]]).validate().is_err());
    }
}
