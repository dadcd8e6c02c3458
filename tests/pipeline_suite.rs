use graphx_layout::factory::{LayoutParams, RoutingParams};
use graphx_layout::geometry::{Point, Rect, Size};
use graphx_layout::graph::{EdgeId, Graph, SoftMutableGraph};
use graphx_layout::layout::{CoolingFunction, FreeFrParams, IsomParams};
use graphx_layout::parser::parse_graph;
use graphx_layout::routing::PathFinderParams;
use graphx_layout::{
    CancellationToken, EdgeRoutingKind, LayoutError, LayoutKind, LogicCore, OverlapRemovalKind,
};

fn triangle() -> Graph {
    let mut graph = Graph::new();
    for v in ["A", "B", "C"] {
        graph.add_vertex(v).unwrap();
    }
    graph.add_edge("A", "B").unwrap();
    graph.add_edge("B", "C").unwrap();
    graph.add_edge("C", "A").unwrap();
    graph
}

fn sized_core(graph: Graph, size: Size) -> LogicCore {
    let vertices: Vec<String> = graph.vertices().cloned().collect();
    let mut core = LogicCore::new(graph);
    for v in vertices {
        core.set_size(v, size);
    }
    core
}

#[test]
fn every_algorithm_handles_empty_and_single_vertex_graphs() {
    let computed = LayoutKind::ALL.into_iter().filter(|k| *k != LayoutKind::Custom);
    for layout in computed {
        for routing in EdgeRoutingKind::ALL {
            let mut empty = LogicCore::new(Graph::new());
            empty.set_layout(layout, None);
            empty.set_overlap_removal(OverlapRemovalKind::Fsa, None);
            empty.set_edge_routing(routing, None);
            let out = empty
                .compute(&CancellationToken::new())
                .unwrap_or_else(|err| panic!("{layout:?}/{routing:?} on empty graph: {err}"));
            assert!(out.positions.is_empty());
            assert!(out.routes.is_empty());

            let mut single = Graph::new();
            single.add_vertex("solo").unwrap();
            let mut core = sized_core(single, Size::new(10.0, 10.0));
            core.set_seed(Some(1));
            core.set_layout(layout, None);
            core.set_overlap_removal(OverlapRemovalKind::Fsa, None);
            core.set_edge_routing(routing, None);
            let out = core
                .compute(&CancellationToken::new())
                .unwrap_or_else(|err| panic!("{layout:?}/{routing:?} on one vertex: {err}"));
            assert_eq!(out.positions.len(), 1);
            assert_eq!(out.positions["solo"], Point::ORIGIN, "{layout:?}");
            assert!(out.algorithm_ran);
        }
    }
}

#[test]
fn fr_triangle_settles_near_ideal_edge_length() {
    let params = FreeFrParams {
        ideal_edge_length: 30.0,
        attraction_multiplier: 1.0,
        repulsive_multiplier: 1.0,
        iteration_limit: 50,
        cooling_function: CoolingFunction::Linear,
        ..FreeFrParams::default()
    };
    let k = params.ideal_edge_length;
    let mut core = LogicCore::new(triangle());
    core.set_seed(Some(42));
    core.set_layout(LayoutKind::Fr, Some(LayoutParams::FreeFr(params)));
    let out = core.compute(&CancellationToken::new()).unwrap();
    for (a, b) in [("A", "B"), ("B", "C"), ("C", "A")] {
        let d = out.positions[a].distance(out.positions[b]);
        assert!((d - k).abs() <= 0.2 * k, "{a}-{b} = {d}, K = {k}");
    }
}

#[test]
fn same_seed_gives_same_layout() {
    let run = || {
        let mut core = sized_core(triangle(), Size::new(8.0, 8.0));
        core.set_seed(Some(5));
        core.set_layout(LayoutKind::Kk, None);
        core.set_overlap_removal(OverlapRemovalKind::Fsa, None);
        core.compute(&CancellationToken::new()).unwrap().positions
    };
    assert_eq!(run(), run());
}

#[test]
fn custom_positions_are_routed_around_obstacles() {
    let parsed = parse_graph(
        "a -> b\n\
         c\n\
         pos a 0,0\n\
         pos b 300,0\n\
         pos c 150,0\n\
         size a 40x40\n\
         size b 40x40\n\
         size c 40x40\n",
    )
    .unwrap();
    let mut core = LogicCore::new(parsed.graph);
    core.set_sizes(parsed.sizes);
    core.set_positions(parsed.positions);
    core.set_layout(LayoutKind::Custom, None);
    core.set_edge_routing(
        EdgeRoutingKind::PathFinder,
        Some(RoutingParams::PathFinder(PathFinderParams {
            horizontal_grid_size: 10.0,
            vertical_grid_size: 10.0,
            ..PathFinderParams::default()
        })),
    );

    let out = core.compute(&CancellationToken::new()).unwrap();
    assert!(!out.algorithm_ran);
    assert_eq!(out.positions["c"], Point::new(150.0, 0.0));
    let route = &out.routes[&EdgeId(0)];
    let keep_out =
        Rect::from_center(Point::new(150.0, 0.0), Size::new(40.0, 40.0)).inflate(2.0, 2.0);
    assert!(route.iter().all(|p| !keep_out.contains(*p)), "{route:?}");
    assert_eq!(
        core.graph().edge(EdgeId(0)).and_then(|e| e.routing_points.as_ref()),
        Some(route)
    );

    let moved = Point::new(0.0, 200.0);
    let rerouted = core
        .compute_edge_routes_by_vertex("a", Some(moved), None)
        .unwrap();
    let first = rerouted[&EdgeId(0)][0];
    assert!(first.distance(moved) < 10.0, "{first:?}");

    core.clear_edge_route(EdgeId(0)).unwrap();
    assert!(core.graph().edge(EdgeId(0)).unwrap().routing_points.is_none());
}

#[test]
fn single_edge_routing_needs_a_prior_compute() {
    let mut core = sized_core(triangle(), Size::new(10.0, 10.0));
    core.set_edge_routing(EdgeRoutingKind::Bundling, None);
    assert_eq!(
        core.compute_single_edge(EdgeId(0)).unwrap_err(),
        LayoutError::MissingPosition("A".to_string())
    );

    core.set_seed(Some(2));
    core.set_layout(LayoutKind::Circular, None);
    core.compute(&CancellationToken::new()).unwrap();
    let route = core.compute_single_edge(EdgeId(1)).unwrap();
    assert!(route.is_some_and(|points| !points.is_empty()));

    core.set_edge_routing(EdgeRoutingKind::None, None);
    assert_eq!(core.compute_single_edge(EdgeId(1)).unwrap(), None);
}

#[test]
fn hidden_vertices_are_left_out_until_restored() {
    let mut graph = triangle();
    graph.add_vertex("D").unwrap();
    graph.add_edge("D", "A").unwrap();
    let mut soft = SoftMutableGraph::new(graph);

    let diff = soft.hide_vertex("D").unwrap();
    assert_eq!(diff.vertices, vec!["D".to_string()]);
    assert_eq!(diff.edges, vec![EdgeId(3)]);

    let mut core = LogicCore::new(soft.graph().clone());
    core.set_layout(LayoutKind::Circular, None);
    let out = core.compute(&CancellationToken::new()).unwrap();
    assert_eq!(out.positions.len(), 3);
    assert!(!out.positions.contains_key("D"));

    soft.unhide_vertex_and_edges("D").unwrap();
    assert_eq!(soft.graph().edge_count(), 4);
    let mut core = LogicCore::new(soft.graph().clone());
    core.set_layout(LayoutKind::Circular, None);
    let out = core.compute(&CancellationToken::new()).unwrap();
    assert_eq!(out.positions.len(), 4);
    assert!(out.positions.contains_key("D"));
}

#[test]
fn cancelled_compute_commits_nothing() {
    let mut core = LogicCore::new(triangle());
    core.set_layout(LayoutKind::Fr, None);
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert_eq!(core.compute(&cancel).unwrap_err(), LayoutError::Cancelled);
    assert!(core.positions().is_empty());
}

#[test]
fn mismatched_parameters_fail_the_compute() {
    let mut core = LogicCore::new(triangle());
    core.set_layout(LayoutKind::Kk, Some(LayoutParams::Isom(IsomParams::default())));
    let err = core.compute(&CancellationToken::new()).unwrap_err();
    assert!(matches!(err, LayoutError::ParameterMismatch { algorithm: "KK", .. }), "{err}");
}

#[test]
fn compound_layout_reports_group_sizes() {
    let parsed = parse_graph(
        "group g\n\
           x -> y\n\
           y -> z\n\
         end\n\
         z -> w\n\
         size x 20x10\n\
         size y 20x10\n\
         size z 20x10\n\
         size w 20x10\n",
    )
    .unwrap();
    let mut core = LogicCore::new(parsed.graph);
    core.set_sizes(parsed.sizes);
    core.set_seed(Some(4));
    core.set_layout(LayoutKind::CompoundFdp, None);
    let out = core.compute(&CancellationToken::new()).unwrap();

    assert_eq!(out.positions.len(), 5);
    assert!(out.positions.values().all(|p| p.is_finite()));
    let group = out.compound_sizes["g"];
    assert!(group.width > 0.0 && group.height > 0.0);
    assert!(!out.compound_sizes.contains_key("x"));
}

#[test]
fn compound_layout_with_overlap_removal_and_routing() {
    let parsed = parse_graph(
        "group g\n\
           x -> y\n\
           y -> z\n\
         end\n\
         z -> w\n\
         size x 20x10\n\
         size y 20x10\n\
         size z 20x10\n\
         size w 20x10\n",
    )
    .unwrap();
    let mut core = LogicCore::new(parsed.graph);
    core.set_sizes(parsed.sizes);
    core.set_seed(Some(4));
    core.set_layout(LayoutKind::CompoundFdp, None);
    core.set_overlap_removal(OverlapRemovalKind::Fsa, None);
    core.set_edge_routing(
        EdgeRoutingKind::PathFinder,
        Some(RoutingParams::PathFinder(PathFinderParams {
            horizontal_grid_size: 5.0,
            vertical_grid_size: 5.0,
            ..PathFinderParams::default()
        })),
    );
    let out = core.compute(&CancellationToken::new()).unwrap();

    let group =
        Rect::from_center(out.positions["g"], out.compound_sizes["g"]).inflate(1e-6, 1e-6);
    for member in ["x", "y", "z"] {
        let rect = Rect::from_center(out.positions[member], Size::new(20.0, 10.0));
        let corners = [
            Point::new(rect.left(), rect.top()),
            Point::new(rect.right(), rect.bottom()),
        ];
        assert!(corners.iter().all(|c| group.contains(*c)), "{member} left the group");
    }
    assert_eq!(out.routes.len(), 3, "every edge inside or leaving the group is routed");

    let w = out.positions["w"];
    let rerouted = core
        .compute_edge_routes_by_vertex("w", Some(Point::new(w.x, w.y + 5.0)), None)
        .unwrap();
    assert!(rerouted.keys().all(|id| *id == EdgeId(2)));
}
