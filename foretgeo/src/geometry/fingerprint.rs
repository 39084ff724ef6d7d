//! Empreinte stable d'une géométrie
//!
//! Le hash est normalisé pour être indépendant du sommet de départ et du
//! sens de parcours des anneaux : deux dessins de la même zone ont la même
//! empreinte.

use blake3::Hasher;
use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, MultiPolygon};

/// Calcule un hash stable d'un multipolygone
///
/// Les enveloppes sont orientées dans le sens trigonométrique, les trous
/// dans le sens horaire, puis chaque anneau commence au vertex
/// lexicographiquement le plus petit (min x, puis min y).
pub fn geometry_hash(geom: &MultiPolygon) -> [u8; 32] {
    let mut hasher = Hasher::new();
    let oriented = geom.orient(Direction::Default);

    hasher.update(b"MULTIPOLYGON");
    for poly in oriented.0.iter() {
        hasher.update(b"POLY");
        hasher.update(b"EXT");
        hash_ring_normalized(&mut hasher, poly.exterior());
        for interior in poly.interiors() {
            hasher.update(b"INT");
            hash_ring_normalized(&mut hasher, interior);
        }
    }

    *hasher.finalize().as_bytes()
}

/// Empreinte en hexadécimal
pub fn fingerprint_hex(geom: &MultiPolygon) -> String {
    hex::encode(geometry_hash(geom))
}

/// Hash un anneau en le faisant commencer au vertex le plus petit
fn hash_ring_normalized(hasher: &mut Hasher, ring: &LineString) {
    // Le dernier point d'un anneau fermé duplique le premier
    let len = if ring.0.len() > 1 && ring.0.first() == ring.0.last() {
        ring.0.len() - 1
    } else {
        ring.0.len()
    };

    if len == 0 {
        return;
    }

    let min_idx = (0..len)
        .min_by(|&a, &b| {
            let ca = &ring.0[a];
            let cb = &ring.0[b];
            ca.x.total_cmp(&cb.x).then_with(|| ca.y.total_cmp(&cb.y))
        })
        .unwrap_or(0);

    for i in 0..len {
        let idx = (min_idx + i) % len;
        hash_coord(hasher, ring.0[idx]);
    }
}

/// Hash une coordonnée arrondie à 1e-7 degré (~1 cm)
fn hash_coord(hasher: &mut Hasher, coord: Coord) {
    let x = (coord.x * 10_000_000.0).round() as i64;
    let y = (coord.y * 10_000_000.0).round() as i64;
    hasher.update(&x.to_le_bytes());
    hasher.update(&y.to_le_bytes());
}
