use harvester_core::{Region, RegionError};

fn region() -> Region {
    Region::new(144693.0, 477383.0, 275745.0, 633107.0).unwrap()
}

fn covered_area(cells: &[Region]) -> f64 {
    cells.iter().map(Region::area).sum()
}

#[test]
fn factor_one_returns_region_unchanged() {
    let r = region();
    assert_eq!(r.split(1).unwrap(), vec![r]);
}

#[test]
fn nine_way_split_covers_region_without_overlap() {
    let r = region();
    let cells = r.split(9).unwrap();
    assert_eq!(cells.len(), 9);

    // Bounding union equals the input bounds.
    let min_x = cells.iter().map(Region::min_x).fold(f64::INFINITY, f64::min);
    let min_y = cells.iter().map(Region::min_y).fold(f64::INFINITY, f64::min);
    let max_x = cells.iter().map(Region::max_x).fold(f64::NEG_INFINITY, f64::max);
    let max_y = cells.iter().map(Region::max_y).fold(f64::NEG_INFINITY, f64::max);
    assert_eq!([min_x, min_y, max_x, max_y], r.bounds());

    // Pairwise interiors are disjoint.
    for (i, a) in cells.iter().enumerate() {
        for b in cells.iter().skip(i + 1) {
            assert!(!a.overlaps(b), "{a} overlaps {b}");
        }
    }

    // Disjoint interiors plus equal total area means no gaps.
    let relative = (covered_area(&cells) - r.area()).abs() / r.area();
    assert!(relative < 1e-9);
}

#[test]
fn cells_are_row_major() {
    let r = Region::new(0.0, 0.0, 2.0, 2.0).unwrap();
    let cells = r.split(4).unwrap();
    let bounds: Vec<[f64; 4]> = cells.iter().map(Region::bounds).collect();
    assert_eq!(
        bounds,
        vec![
            [0.0, 0.0, 1.0, 1.0],
            [1.0, 0.0, 2.0, 1.0],
            [0.0, 1.0, 1.0, 2.0],
            [1.0, 1.0, 2.0, 2.0],
        ]
    );
}

#[test]
fn neighbouring_cells_share_exact_edges() {
    let r = Region::new(0.0, 0.0, 1.0, 1.0).unwrap();
    let cells = r.split(9).unwrap();
    for row in cells.chunks(3) {
        for pair in row.windows(2) {
            assert_eq!(pair[0].max_x(), pair[1].min_x());
        }
    }
    for i in 0..6 {
        assert_eq!(cells[i].max_y(), cells[i + 3].min_y());
    }
}

#[test]
fn larger_square_factors_are_supported() {
    let cells = region().split(16).unwrap();
    assert_eq!(cells.len(), 16);
}

#[test]
fn non_square_factor_is_rejected() {
    assert_eq!(region().split(3), Err(RegionError::InvalidFactor(3)));
    assert_eq!(region().split(0), Err(RegionError::InvalidFactor(0)));
}

#[test]
fn degenerate_bounds_are_rejected() {
    assert!(Region::new(1.0, 0.0, 1.0, 5.0).is_err());
    assert!(Region::new(0.0, 5.0, 1.0, 2.0).is_err());
    assert!(Region::new(0.0, 0.0, f64::NAN, 1.0).is_err());
}

#[test]
fn boundary_points_belong_to_both_neighbours() {
    let r = Region::new(0.0, 0.0, 2.0, 1.0).unwrap();
    let cells = r.split(4).unwrap();
    let holders = cells
        .iter()
        .filter(|cell| cell.contains_point(1.0, 0.25))
        .count();
    assert_eq!(holders, 2);
}

#[test]
fn deserializes_from_bounds_array() {
    let parsed: Region = serde_json::from_str("[0.0, 1.0, 2.0, 3.0]").unwrap();
    assert_eq!(parsed.bounds(), [0.0, 1.0, 2.0, 3.0]);
    assert!(serde_json::from_str::<Region>("[2.0, 1.0, 0.0, 3.0]").is_err());
}
