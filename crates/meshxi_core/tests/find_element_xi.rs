use approx::assert_relative_eq;
use meshxi_core::lagrange::{ElementId, ElementKind, ElementList, LagrangeMesh};
use meshxi_core::traits::{ElementGroup, Field};
use meshxi_core::{find_element_xi, FieldLocator, FindXiCache, FindXiSettings, SearchMode};

/// Unit square split into two triangles, plus a bilinear square beside it.
fn mixed_2d_mesh() -> LagrangeMesh {
    let nodes = vec![
        0.0, 0.0, // 0
        1.0, 0.0, // 1
        0.0, 1.0, // 2
        1.0, 1.0, // 3
        2.0, 0.0, // 4
        2.1, 1.2, // 5
    ];
    let mut mesh = LagrangeMesh::new(2, nodes).expect("mesh");
    mesh.add_element(ElementKind::Triangle, &[0, 1, 2]).expect("e0");
    mesh.add_element(ElementKind::Triangle, &[3, 2, 1]).expect("e1");
    mesh.add_element(ElementKind::Square, &[1, 4, 3, 5]).expect("e2");
    mesh
}

/// Unit cube as a trilinear element, a tetrahedron and a wedge stacked above it.
fn mixed_3d_mesh() -> LagrangeMesh {
    let mut nodes = Vec::new();
    for z in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for x in [0.0, 1.0] {
                nodes.extend_from_slice(&[x, y, z]);
            }
        }
    }
    // 8..: apex above the cube and a wedge top layer
    nodes.extend_from_slice(&[0.0, 0.0, 2.0]);
    nodes.extend_from_slice(&[1.0, 0.0, 2.0]);
    nodes.extend_from_slice(&[0.0, 1.0, 2.0]);
    let mut mesh = LagrangeMesh::new(3, nodes).expect("mesh");
    mesh.add_element(ElementKind::Cube, &[0, 1, 2, 3, 4, 5, 6, 7])
        .expect("cube");
    mesh.add_element(ElementKind::Wedge, &[4, 5, 6, 8, 9, 10])
        .expect("wedge");
    mesh.add_element(ElementKind::Tetrahedron, &[5, 7, 6, 9])
        .expect("tet");
    mesh
}

fn round_trip(mesh: &LagrangeMesh, element: ElementId, xi: &[f64]) {
    let target = mesh.evaluate_at(element, xi).expect("evaluate");
    let group = ElementList::all(mesh);
    let mut cache = FindXiCache::new(mesh.number_of_components());
    let location = find_element_xi(mesh, &mut cache, &target, &group, &FindXiSettings::default())
        .expect("search")
        .unwrap_or_else(|| panic!("no element found for {:?} xi {:?}", element, xi));
    let found = mesh
        .evaluate_at(location.element, &location.xi)
        .expect("evaluate found");
    for (a, b) in found.iter().zip(target.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn round_trip_recovers_interior_points_in_2d() {
    let mesh = mixed_2d_mesh();
    let samples: [(usize, [f64; 2]); 5] = [
        (0, [0.2, 0.3]),
        (0, [0.6, 0.1]),
        (1, [0.3, 0.3]),
        (2, [0.5, 0.5]),
        (2, [0.9, 0.1]),
    ];
    for (element, xi) in samples {
        round_trip(&mesh, ElementId(element), &xi);
    }
}

#[test]
fn round_trip_recovers_interior_points_in_3d() {
    let mesh = mixed_3d_mesh();
    let samples: [(usize, [f64; 3]); 4] = [
        (0, [0.25, 0.5, 0.75]),
        (1, [0.2, 0.3, 0.5]),
        (1, [0.1, 0.6, 0.9]),
        (2, [0.2, 0.2, 0.2]),
    ];
    for (element, xi) in samples {
        round_trip(&mesh, ElementId(element), &xi);
    }
}

#[test]
fn triangle_round_trip_returns_same_xi() {
    let mesh = mixed_2d_mesh();
    let target = [0.25, 0.5];
    let mut cache = FindXiCache::new(2);
    let location = find_element_xi(
        &mesh,
        &mut cache,
        &target,
        &ElementList::all(&mesh),
        &FindXiSettings::default(),
    )
    .expect("search")
    .expect("location");
    assert_eq!(location.element, ElementId(0));
    assert_relative_eq!(location.xi[0], 0.25, epsilon = 1e-9);
    assert_relative_eq!(location.xi[1], 0.5, epsilon = 1e-9);
}

#[test]
fn identity_square_scenarios() {
    let mut mesh = LagrangeMesh::new(2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0])
        .expect("mesh");
    mesh.add_element(ElementKind::Square, &[0, 1, 2, 3])
        .expect("square");
    let group = ElementList::all(&mesh);
    // Without ranges the outside target must be rejected by the solver itself.
    let settings = FindXiSettings {
        use_value_ranges: false,
        ..FindXiSettings::default()
    };
    let mut cache = FindXiCache::new(2);

    let inside = find_element_xi(&mesh, &mut cache, &[0.37, 0.81], &group, &settings)
        .expect("search")
        .expect("location");
    assert_relative_eq!(inside.xi[0], 0.37, epsilon = 1e-12);
    assert_relative_eq!(inside.xi[1], 0.81, epsilon = 1e-12);

    let outside = find_element_xi(&mesh, &mut cache, &[1.5, 1.5], &group, &settings)
        .expect("search");
    assert!(outside.is_none());
}

#[test]
fn second_identical_query_is_pure_cache_hit() {
    let mesh = mixed_2d_mesh();
    let mut locator = FieldLocator::new(mesh);
    let group = ElementList::all(locator.field());
    let first = locator.find_element_xi(&[1.5, 0.5], &group).expect("search");
    let second = locator.find_element_xi(&[1.5, 0.5], &group).expect("search");
    assert_eq!(first, second);
    let cache = locator.cache().expect("cache");
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 1);
}

#[test]
fn subgroup_restricts_search() {
    let mesh = mixed_2d_mesh();
    let group = ElementList::new([ElementId(2)]);
    let mut cache = FindXiCache::new(2);
    let settings = FindXiSettings::default();
    let result = find_element_xi(&mesh, &mut cache, &[0.25, 0.25], &group, &settings)
        .expect("search");
    assert!(result.is_none());
    assert!(group.contains(ElementId(2)));
}

#[test]
fn collapsed_element_is_skipped_without_error() {
    let mut mesh = LagrangeMesh::new(
        2,
        vec![0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
    )
    .expect("mesh");
    let collapsed = mesh
        .add_element(ElementKind::Triangle, &[0, 1, 2])
        .expect("collapsed");
    let good = mesh.add_element(ElementKind::Triangle, &[3, 4, 5]).expect("good");
    let settings = FindXiSettings {
        use_value_ranges: false,
        ..FindXiSettings::default()
    };
    let mut cache = FindXiCache::new(2);
    let location = find_element_xi(
        &mesh,
        &mut cache,
        &[0.5, 0.25],
        &ElementList::new([collapsed, good]),
        &settings,
    )
    .expect("search")
    .expect("location");
    assert_eq!(location.element, good);
}

#[test]
fn surface_mesh_in_3d_rejects_points_off_surface() {
    // Unit square lying in the z = 0 plane.
    let mut mesh = LagrangeMesh::new(
        3,
        vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0],
    )
    .expect("mesh");
    mesh.add_element(ElementKind::Square, &[0, 1, 2, 3])
        .expect("square");
    let group = ElementList::all(&mesh);
    let settings = FindXiSettings {
        use_value_ranges: false,
        ..FindXiSettings::default()
    };
    let mut cache = FindXiCache::new(3);
    let on = find_element_xi(&mesh, &mut cache, &[0.25, 0.75, 0.0], &group, &settings)
        .expect("search");
    assert!(on.is_some());
    let off = find_element_xi(&mesh, &mut cache, &[0.25, 0.75, 0.5], &group, &settings)
        .expect("search");
    assert!(off.is_none());
}

#[test]
fn field_change_through_locator_drops_cache() {
    let mut locator = FieldLocator::new(mixed_2d_mesh());
    let group = ElementList::all(locator.field());
    locator.find_element_xi(&[0.25, 0.25], &group).expect("search");
    locator
        .field_mut()
        .set_node_values(0, &[-1.0, -1.0])
        .expect("set");
    assert!(locator.cache().is_none());
    let location = locator
        .find_element_xi(&[-0.5, -0.5], &group)
        .expect("search")
        .expect("location");
    assert_eq!(location.element, ElementId(0));
    assert_eq!(locator.field().number_of_components(), 2);
}

#[test]
fn value_ranges_keep_targets_reachable_within_tolerance() {
    // Target sits 1.5e-6 below the nodal range of the first component.
    let mut mesh = LagrangeMesh::new(2, vec![0.0, 0.0, 1.0, 1.0, 1.0, -1.0]).expect("mesh");
    mesh.add_element(ElementKind::Triangle, &[0, 1, 2])
        .expect("triangle");
    let group = ElementList::all(&mesh);
    let target = [-1.5e-6, 0.0];

    let mut cache = FindXiCache::new(2);
    let settings = FindXiSettings::default();
    let with_ranges = find_element_xi(&mesh, &mut cache, &target, &group, &settings)
        .expect("search")
        .expect("location with value ranges");
    assert_eq!(with_ranges.element, ElementId(0));
    assert_relative_eq!(with_ranges.xi[0], -7.5e-7, epsilon = 1e-9);
    assert_relative_eq!(with_ranges.xi[1], -7.5e-7, epsilon = 1e-9);

    let without = FindXiSettings {
        use_value_ranges: false,
        ..FindXiSettings::default()
    };
    let mut cache = FindXiCache::new(2);
    let without_ranges = find_element_xi(&mesh, &mut cache, &target, &group, &without)
        .expect("search")
        .expect("location without value ranges");
    assert_eq!(without_ranges.element, with_ranges.element);
}

#[test]
fn element_dimension_selects_faces_over_lines() {
    let mut mesh = LagrangeMesh::new(2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]).expect("mesh");
    let line = mesh.add_element(ElementKind::Line, &[0, 1]).expect("line");
    let triangle = mesh
        .add_element(ElementKind::Triangle, &[0, 1, 2])
        .expect("triangle");
    let group = ElementList::all(&mesh);
    let target = [0.5, 0.0];

    let mut cache = FindXiCache::new(2);
    let settings = FindXiSettings::default();
    let any = find_element_xi(&mesh, &mut cache, &target, &group, &settings)
        .expect("search")
        .expect("location");
    assert_eq!(any.element, line);

    let faces = FindXiSettings {
        element_dimension: Some(2),
        ..FindXiSettings::default()
    };
    let face = find_element_xi(&mesh, &mut cache, &target, &group, &faces)
        .expect("search")
        .expect("face location");
    assert_eq!(face.element, triangle);
    assert_relative_eq!(face.xi[0], 0.5, epsilon = 1e-9);
    assert_relative_eq!(face.xi[1], 0.0, epsilon = 1e-9);
}

#[test]
fn nearest_mode_on_single_element() {
    let mut mesh = LagrangeMesh::new(2, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0])
        .expect("mesh");
    let square = mesh
        .add_element(ElementKind::Square, &[0, 1, 2, 3])
        .expect("square");
    let target = [1.5, 0.5];
    let mut cache = FindXiCache::new(2);

    let exact = find_element_xi(
        &mesh,
        &mut cache,
        &target,
        &[square][..],
        &FindXiSettings::default(),
    )
    .expect("search");
    assert!(exact.is_none());

    let nearest = FindXiSettings {
        search_mode: SearchMode::Nearest,
        ..FindXiSettings::default()
    };
    let location = find_element_xi(&mesh, &mut cache, &target, &[square][..], &nearest)
        .expect("search")
        .expect("nearest location");
    assert_eq!(location.element, square);
    assert_relative_eq!(location.xi[0], 1.0, epsilon = 1e-5);
    assert_relative_eq!(location.xi[1], 0.5, epsilon = 1e-5);
}
