//! The compute pipeline: layout, then overlap removal, then edge routing.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, debug_span};

use crate::cancel::CancellationToken;
use crate::error::{GraphError, LayoutError};
use crate::factory::{
    EdgeRoutingKind, LayoutKind, LayoutParams, OverlapParams, OverlapRemovalKind, RoutingParams,
    create_layout, create_overlap_remover, create_router,
};
use crate::geometry::{Point, Rect, Size};
use crate::graph::{CompoundGraph, EdgeId, Graph, VertexId};
use crate::layout::{
    CompoundFdpParams, EdgeRoutes, LayoutAlgorithm, LayoutInput, PositionMap, SizeMap,
};
use crate::routing::{EdgeRouter, RectMap, RoutingInput};

/// What one [`LogicCore::compute`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOutcome {
    /// Final vertex centers.
    pub positions: PositionMap,
    /// Whether a layout algorithm placed the vertices. `false` under
    /// [`LayoutKind::Custom`], where the caller's positions are the layout;
    /// the outcome is usable either way.
    pub algorithm_ran: bool,
    /// Diagnostic cost of overlap removal, when it ran.
    pub overlap_cost: Option<f64>,
    pub routes: EdgeRoutes,
    /// Sizes the layout computed for compound vertices.
    pub compound_sizes: SizeMap,
}

/// Owns a graph with its sizes and positions, plus the selected algorithm
/// of each family, and runs them in order.
///
/// Caller positions are kept apart from the computed ones: they seed the
/// layout (or are the layout, for [`LayoutKind::Custom`]), so running
/// `compute` twice with the same seed gives the same result.
pub struct LogicCore {
    graph: CompoundGraph,
    layout_kind: LayoutKind,
    layout_params: Option<LayoutParams>,
    overlap_kind: OverlapRemovalKind,
    overlap_params: Option<OverlapParams>,
    routing_kind: EdgeRoutingKind,
    routing_params: Option<RoutingParams>,
    seed: Option<u64>,
    sizes: SizeMap,
    /// Group sizes of the last compute, layered over `sizes` for routing.
    compound_sizes: SizeMap,
    initial_positions: PositionMap,
    positions: PositionMap,
    router: Option<Box<dyn EdgeRouter>>,
}

impl fmt::Debug for LogicCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicCore")
            .field("layout_kind", &self.layout_kind)
            .field("overlap_kind", &self.overlap_kind)
            .field("routing_kind", &self.routing_kind)
            .field("seed", &self.seed)
            .field("vertices", &self.graph.graph.vertex_count())
            .field("edges", &self.graph.graph.edge_count())
            .finish_non_exhaustive()
    }
}

impl LogicCore {
    pub fn new(graph: impl Into<CompoundGraph>) -> Self {
        Self {
            graph: graph.into(),
            layout_kind: LayoutKind::default(),
            layout_params: None,
            overlap_kind: OverlapRemovalKind::default(),
            overlap_params: None,
            routing_kind: EdgeRoutingKind::default(),
            routing_params: None,
            seed: None,
            sizes: SizeMap::new(),
            compound_sizes: SizeMap::new(),
            initial_positions: PositionMap::new(),
            positions: PositionMap::new(),
            router: None,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph.graph
    }

    pub fn compound_graph(&self) -> &CompoundGraph {
        &self.graph
    }

    /// Mutable access; a structural change invalidates the prepared router.
    pub fn compound_graph_mut(&mut self) -> &mut CompoundGraph {
        self.router = None;
        &mut self.graph
    }

    /// `None` params select the kind's defaults.
    pub fn set_layout(&mut self, kind: LayoutKind, params: Option<LayoutParams>) {
        self.layout_kind = kind;
        self.layout_params = params;
    }

    pub fn set_overlap_removal(
        &mut self,
        kind: OverlapRemovalKind,
        params: Option<OverlapParams>,
    ) {
        self.overlap_kind = kind;
        self.overlap_params = params;
    }

    pub fn set_edge_routing(&mut self, kind: EdgeRoutingKind, params: Option<RoutingParams>) {
        self.routing_kind = kind;
        self.routing_params = params;
        self.router = None;
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    pub fn layout_kind(&self) -> LayoutKind {
        self.layout_kind
    }

    pub fn overlap_kind(&self) -> OverlapRemovalKind {
        self.overlap_kind
    }

    pub fn routing_kind(&self) -> EdgeRoutingKind {
        self.routing_kind
    }

    pub fn set_size(&mut self, vertex: impl Into<VertexId>, size: Size) {
        self.sizes.insert(vertex.into(), size);
    }

    pub fn set_sizes(&mut self, sizes: SizeMap) {
        self.sizes = sizes;
    }

    pub fn sizes(&self) -> &SizeMap {
        &self.sizes
    }

    /// Starting point for the layout, or the final positions under
    /// [`LayoutKind::Custom`].
    pub fn set_position(&mut self, vertex: impl Into<VertexId>, position: Point) {
        self.initial_positions.insert(vertex.into(), position);
    }

    pub fn set_positions(&mut self, positions: PositionMap) {
        self.initial_positions = positions;
    }

    /// Positions of the last successful compute.
    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    /// Whether sizes are required by the configured algorithms.
    pub fn needs_sizes(&self) -> bool {
        self.layout_kind.needs_sizes()
            || self.overlap_kind != OverlapRemovalKind::None
            || self.routing_kind.needs_sizes()
    }

    fn check_sizes(&self) -> Result<(), LayoutError> {
        if !self.needs_sizes() {
            return Ok(());
        }
        let compound = self.layout_kind == LayoutKind::CompoundFdp;
        match self
            .graph
            .graph
            .vertices()
            .filter(|v| !(compound && self.graph.is_compound(v)))
            .find(|v| !self.sizes.contains_key(*v))
        {
            Some(missing) => Err(LayoutError::MissingSize(missing.clone())),
            None => Ok(()),
        }
    }

    /// Runs the whole pipeline and stamps the routes onto the graph's edges.
    /// Nothing is committed when it fails or is cancelled.
    pub fn compute(&mut self, cancel: &CancellationToken) -> Result<LayoutOutcome, LayoutError> {
        let _span = debug_span!(
            "logic_compute",
            layout = self.layout_kind.name(),
            overlap = self.overlap_kind.name(),
            routing = self.routing_kind.name(),
            vertices = self.graph.graph.vertex_count(),
        )
        .entered();

        let algorithm = create_layout(self.layout_kind, self.layout_params.as_ref(), self.seed)?;
        self.run(algorithm, cancel)
    }

    fn run(
        &mut self,
        mut algorithm: Option<Box<dyn LayoutAlgorithm>>,
        cancel: &CancellationToken,
    ) -> Result<LayoutOutcome, LayoutError> {
        let remover = create_overlap_remover(self.overlap_kind, self.overlap_params.as_ref())?;
        let mut router = create_router(self.routing_kind, self.routing_params.as_ref())?;
        self.check_sizes()?;

        let graph = &self.graph.graph;
        let hierarchy = self.graph.hierarchy();
        let (mut positions, intrinsic_routes, mut compound_sizes) = match algorithm.as_mut() {
            Some(algorithm) => {
                let input = LayoutInput::new(graph)
                    .with_positions(&self.initial_positions)
                    .with_sizes(&self.sizes)
                    .with_hierarchy(hierarchy);
                let positions = algorithm.compute(&input, cancel)?;
                (
                    positions,
                    algorithm.edge_routes().cloned(),
                    algorithm.compound_sizes().cloned().unwrap_or_default(),
                )
            }
            None => {
                let positions = graph
                    .vertices()
                    .map(|v| {
                        self.initial_positions
                            .get(v)
                            .map(|p| (v.clone(), *p))
                            .ok_or_else(|| LayoutError::MissingPosition(v.clone()))
                    })
                    .collect::<Result<PositionMap, _>>()?;
                (positions, None, SizeMap::new())
            }
        };
        let mut sizes = self.sizes.clone();
        sizes.extend(compound_sizes.iter().map(|(v, s)| (v.clone(), *s)));

        let mut overlap_cost = None;
        if let Some(remover) = remover {
            let rects = vertex_rects(graph, &positions, &sizes, true)?;
            let outcome = if compound_sizes.is_empty() {
                remover.compute(&rects, cancel)?
            } else {
                remover.compute_nested(&rects, hierarchy, self.inner_padding(), cancel)?
            };
            for (vertex, rect) in &outcome.rects {
                positions.insert(vertex.clone(), rect.center());
                if let Some(size) = compound_sizes.get_mut(vertex) {
                    *size = rect.size();
                    sizes.insert(vertex.clone(), rect.size());
                }
            }
            overlap_cost = Some(outcome.cost);
        }

        let routes = match (intrinsic_routes, router.as_mut()) {
            (Some(routes), _) => {
                debug!(routes = routes.len(), "using routes produced by the layout");
                routes
            }
            (None, Some(router)) => {
                let needs_sizes = self.routing_kind.needs_sizes();
                let rects = vertex_rects(graph, &positions, &sizes, needs_sizes)?;
                let input = RoutingInput::new(graph, &positions, &rects).with_hierarchy(hierarchy);
                router.compute(&input, cancel)?
            }
            (None, None) => EdgeRoutes::new(),
        };

        let edge_graph = &mut self.graph.graph;
        edge_graph.clear_routing_points();
        for (id, points) in &routes {
            if let Some(edge) = edge_graph.edge_mut(*id) {
                edge.routing_points = Some(points.clone());
            }
        }
        self.positions = positions.clone();
        self.compound_sizes = compound_sizes.clone();
        self.router = router;
        debug!(routes = routes.len(), "pipeline finished");

        Ok(LayoutOutcome {
            positions,
            algorithm_ran: algorithm.is_some(),
            overlap_cost,
            routes,
            compound_sizes,
        })
    }

    fn inner_padding(&self) -> f64 {
        match &self.layout_params {
            Some(LayoutParams::CompoundFdp(params)) => params.inner_padding,
            _ => CompoundFdpParams::default().inner_padding,
        }
    }

    /// Rectangles of the last compute, with group sizes taking precedence
    /// over caller sizes.
    fn routing_rects(&self) -> Result<RectMap, LayoutError> {
        let mut sizes = self.sizes.clone();
        sizes.extend(self.compound_sizes.iter().map(|(v, s)| (v.clone(), *s)));
        vertex_rects(
            &self.graph.graph,
            &self.positions,
            &sizes,
            self.routing_kind.needs_sizes(),
        )
    }

    /// Re-routes one edge with the router prepared by the last compute and
    /// stamps the result onto the edge.
    pub fn compute_single_edge(
        &mut self,
        edge: EdgeId,
    ) -> Result<Option<Vec<Point>>, LayoutError> {
        let rects = self.routing_rects()?;
        let Some(router) = self.router.as_mut() else {
            return if self.routing_kind == EdgeRoutingKind::None {
                Ok(None)
            } else {
                Err(LayoutError::RouterNotPrepared)
            };
        };
        let input = RoutingInput::new(&self.graph.graph, &self.positions, &rects)
            .with_hierarchy(self.graph.hierarchy());
        let points = router.compute_single(&input, edge)?;
        if let Some(target) = self.graph.graph.edge_mut(edge) {
            target.routing_points = points.clone();
        }
        Ok(points)
    }

    /// Moves and/or resizes `vertex`, then re-routes only the edges touching
    /// it. Returns the new routes; edges left without one are absent.
    pub fn compute_edge_routes_by_vertex(
        &mut self,
        vertex: &str,
        position: Option<Point>,
        size: Option<Size>,
    ) -> Result<EdgeRoutes, LayoutError> {
        if !self.graph.graph.contains_vertex(vertex) {
            return Err(GraphError::UnknownVertex(vertex.to_string()).into());
        }
        if let Some(position) = position {
            self.positions.insert(vertex.to_string(), position);
        }
        if let Some(size) = size {
            match self.compound_sizes.get_mut(vertex) {
                Some(group) => *group = size,
                None => {
                    self.sizes.insert(vertex.to_string(), size);
                }
            }
        }

        let mut routes = EdgeRoutes::new();
        for edge in self.graph.graph.incident_edges(vertex) {
            if let Some(points) = self.compute_single_edge(edge)? {
                routes.insert(edge, points);
            }
        }
        Ok(routes)
    }

    /// Drops the stamped route of one edge.
    pub fn clear_edge_route(&mut self, edge: EdgeId) -> Result<(), LayoutError> {
        let target = self
            .graph
            .graph
            .edge_mut(edge)
            .ok_or(GraphError::UnknownEdge(edge))?;
        target.routing_points = None;
        Ok(())
    }
}

/// Center-anchored rectangles for every vertex. Without `require_sizes` a
/// vertex with no size gets an empty rectangle at its center.
fn vertex_rects(
    graph: &Graph,
    positions: &PositionMap,
    sizes: &SizeMap,
    require_sizes: bool,
) -> Result<RectMap, LayoutError> {
    let mut rects = BTreeMap::new();
    for vertex in graph.vertices() {
        let center = positions
            .get(vertex)
            .copied()
            .ok_or_else(|| LayoutError::MissingPosition(vertex.clone()))?;
        let size = match sizes.get(vertex) {
            Some(size) => *size,
            None if require_sizes => return Err(LayoutError::MissingSize(vertex.clone())),
            None => Size::default(),
        };
        rects.insert(vertex.clone(), Rect::from_center(center, size));
    }
    Ok(rects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlap::OverlapRemovalParams;
    use crate::routing::PathFinderParams;

    /// Spreads the vertices along the x axis and publishes fixed routes.
    struct FixedRoutes {
        routes: EdgeRoutes,
        cancel_when_done: Option<CancellationToken>,
    }

    impl LayoutAlgorithm for FixedRoutes {
        fn name(&self) -> &'static str {
            "FixedRoutes"
        }

        fn compute(
            &mut self,
            input: &LayoutInput<'_>,
            _cancel: &CancellationToken,
        ) -> Result<PositionMap, LayoutError> {
            if let Some(token) = &self.cancel_when_done {
                token.cancel();
            }
            Ok(input
                .graph
                .vertices()
                .enumerate()
                .map(|(i, v)| (v.clone(), Point::new(100.0 * i as f64, 0.0)))
                .collect())
        }

        fn edge_routes(&self) -> Option<&EdgeRoutes> {
            Some(&self.routes)
        }
    }

    fn grouped_core() -> LogicCore {
        let mut graph = Graph::new();
        for v in ["g", "x", "y", "z", "w"] {
            graph.add_vertex(v).unwrap();
        }
        graph.add_edge("x", "y").unwrap();
        graph.add_edge("y", "z").unwrap();
        graph.add_edge("z", "w").unwrap();
        let mut compound = CompoundGraph::new(graph);
        for child in ["x", "y", "z"] {
            compound.add_child("g", child).unwrap();
        }
        let mut core = LogicCore::new(compound);
        for v in ["x", "y", "z", "w"] {
            core.set_size(v, Size::new(20.0, 10.0));
        }
        core.set_seed(Some(4));
        core.set_layout(LayoutKind::CompoundFdp, None);
        core
    }

    fn coarse_path_finder() -> Option<RoutingParams> {
        Some(RoutingParams::PathFinder(PathFinderParams {
            horizontal_grid_size: 5.0,
            vertical_grid_size: 5.0,
            ..PathFinderParams::default()
        }))
    }

    fn triangle() -> Graph {
        let mut graph = Graph::new();
        for v in ["a", "b", "c"] {
            graph.add_vertex(v).unwrap();
        }
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "c").unwrap();
        graph.add_edge("c", "a").unwrap();
        graph
    }

    fn sized(mut core: LogicCore) -> LogicCore {
        for v in ["a", "b", "c"] {
            core.set_size(v, Size::new(20.0, 20.0));
        }
        core
    }

    #[test]
    fn custom_layout_uses_caller_positions() {
        let mut core = LogicCore::new(triangle());
        core.set_layout(LayoutKind::Custom, None);
        core.set_position("a", Point::new(0.0, 0.0));
        core.set_position("b", Point::new(50.0, 0.0));
        let err = core.compute(&CancellationToken::new()).unwrap_err();
        assert_eq!(err, LayoutError::MissingPosition("c".to_string()));

        core.set_position("c", Point::new(0.0, 50.0));
        let out = core.compute(&CancellationToken::new()).unwrap();
        assert!(!out.algorithm_ran);
        assert_eq!(out.positions["b"], Point::new(50.0, 0.0));
        assert!(out.routes.is_empty());
    }

    #[test]
    fn overlap_removal_requires_sizes() {
        let mut core = LogicCore::new(triangle());
        core.set_overlap_removal(OverlapRemovalKind::Fsa, None);
        let err = core.compute(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, LayoutError::MissingSize(_)));
        assert!(core.positions().is_empty(), "failed runs commit nothing");
    }

    #[test]
    fn pipeline_is_repeatable_and_separates_vertices() {
        let mut core = sized(LogicCore::new(triangle()));
        core.set_seed(Some(9));
        core.set_overlap_removal(
            OverlapRemovalKind::Fsa,
            Some(OverlapParams::Fsa(OverlapRemovalParams::default())),
        );
        core.set_edge_routing(EdgeRoutingKind::Bundling, None);
        let first = core.compute(&CancellationToken::new()).unwrap();
        let second = core.compute(&CancellationToken::new()).unwrap();
        assert_eq!(first, second);
        assert!(first.algorithm_ran);
        assert!(first.overlap_cost.is_some());

        let rects = vertex_rects(core.graph(), &first.positions, core.sizes(), true).unwrap();
        let all: Vec<Rect> = rects.values().map(|r| r.inflate(5.0 - 1e-6, 5.0 - 1e-6)).collect();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!(!a.intersects_with(b));
            }
        }
        for (id, edge) in core.graph().edges() {
            assert_eq!(edge.routing_points.as_ref(), first.routes.get(&id));
        }
    }

    #[test]
    fn moving_a_vertex_reroutes_its_edges_only() {
        let mut graph = triangle();
        graph.add_vertex("d").unwrap();
        graph.add_vertex("e").unwrap();
        graph.add_edge("d", "e").unwrap();
        let mut core = sized(LogicCore::new(graph));
        core.set_size("d", Size::new(20.0, 20.0));
        core.set_size("e", Size::new(20.0, 20.0));
        core.set_seed(Some(3));
        core.set_edge_routing(
            EdgeRoutingKind::PathFinder,
            Some(RoutingParams::PathFinder(PathFinderParams {
                horizontal_grid_size: 10.0,
                vertical_grid_size: 10.0,
                ..PathFinderParams::default()
            })),
        );
        let before = core.compute(&CancellationToken::new()).unwrap();
        let far = Point::new(before.positions["a"].x + 40.0, before.positions["a"].y);
        let routes = core.compute_edge_routes_by_vertex("a", Some(far), None).unwrap();
        let touched: Vec<EdgeId> = core.graph().incident_edges("a");
        assert!(routes.keys().all(|id| touched.contains(id)));
        assert_eq!(core.positions()["a"], far);
        assert_eq!(
            core.graph().edge(EdgeId(3)).unwrap().routing_points.as_ref(),
            before.routes.get(&EdgeId(3))
        );
    }

    #[test]
    fn single_edge_routing_needs_a_compute_first() {
        let mut core = sized(LogicCore::new(triangle()));
        core.set_edge_routing(EdgeRoutingKind::Simple, None);
        assert_eq!(
            core.compute_single_edge(EdgeId(0)).unwrap_err(),
            LayoutError::MissingPosition("a".to_string())
        );
        core.set_layout(LayoutKind::Circular, None);
        core.compute(&CancellationToken::new()).unwrap();
        assert!(core.compute_single_edge(EdgeId(0)).is_ok());
        assert!(core.compute_edge_routes_by_vertex("zz", None, None).is_err());
    }

    #[test]
    fn cancelled_compute_keeps_previous_state() {
        let mut core = sized(LogicCore::new(triangle()));
        core.set_seed(Some(5));
        let first = core.compute(&CancellationToken::new()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(core.compute(&cancel).unwrap_err().is_cancelled());
        assert_eq!(core.positions(), &first.positions);
    }

    #[test]
    fn layout_routes_skip_the_router() {
        let mut core = sized(LogicCore::new(triangle()));
        core.set_edge_routing(EdgeRoutingKind::Simple, None);
        let routes: EdgeRoutes = [(EdgeId(1), vec![Point::new(150.0, 40.0)])].into();
        let algorithm = FixedRoutes {
            routes: routes.clone(),
            cancel_when_done: None,
        };
        let out = core
            .run(Some(Box::new(algorithm)), &CancellationToken::new())
            .unwrap();
        assert!(out.algorithm_ran);
        assert_eq!(out.routes, routes);
        assert_eq!(out.positions["c"], Point::new(200.0, 0.0));
        let stamped =
            |id: usize| core.graph().edge(EdgeId(id)).unwrap().routing_points.clone();
        assert_eq!(stamped(1), Some(vec![Point::new(150.0, 40.0)]));
        assert_eq!(stamped(2), None, "c-a crosses b but the router never ran");
    }

    #[test]
    fn cancel_between_stages_commits_nothing() {
        let mut core = sized(LogicCore::new(triangle()));
        core.set_seed(Some(5));
        core.set_overlap_removal(OverlapRemovalKind::Fsa, None);
        core.set_edge_routing(EdgeRoutingKind::Bundling, None);
        let first = core.compute(&CancellationToken::new()).unwrap();

        let cancel = CancellationToken::new();
        let algorithm = FixedRoutes {
            routes: EdgeRoutes::new(),
            cancel_when_done: Some(cancel.clone()),
        };
        let err = core.run(Some(Box::new(algorithm)), &cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(core.positions(), &first.positions);
        for (id, edge) in core.graph().edges() {
            assert_eq!(edge.routing_points.as_ref(), first.routes.get(&id));
        }
        assert_eq!(core.compute(&CancellationToken::new()).unwrap(), first);
    }

    #[test]
    fn group_sizes_carry_over_to_single_edge_routing() {
        let mut core = grouped_core();
        core.set_overlap_removal(OverlapRemovalKind::Fsa, None);
        core.set_edge_routing(EdgeRoutingKind::PathFinder, coarse_path_finder());
        let out = core.compute(&CancellationToken::new()).unwrap();
        assert!(out.compound_sizes.contains_key("g"));
        assert_eq!(out.routes.len(), 3, "{:?}", out.routes);

        let w = out.positions["w"];
        let routes = core
            .compute_edge_routes_by_vertex("w", Some(Point::new(w.x + 30.0, w.y)), None)
            .unwrap();
        assert!(routes.keys().all(|id| *id == EdgeId(2)));
        assert!(core.compute_single_edge(EdgeId(0)).is_ok());

        core.compute_edge_routes_by_vertex("g", None, Some(Size::new(400.0, 400.0)))
            .unwrap();
        assert!(!core.sizes().contains_key("g"));
    }

    #[test]
    fn overlap_removal_keeps_members_inside_their_group() {
        let mut core = grouped_core();
        core.set_overlap_removal(OverlapRemovalKind::Fsa, None);
        let out = core.compute(&CancellationToken::new()).unwrap();

        let group = Rect::from_center(out.positions["g"], out.compound_sizes["g"]);
        let padding = CompoundFdpParams::default().inner_padding;
        for member in ["x", "y", "z"] {
            let rect = Rect::from_center(out.positions[member], core.sizes()[member]);
            assert!(
                group.inflate(1e-6, 1e-6).contains(rect.center()),
                "{member} left its group"
            );
            assert!(rect.left() >= group.left() + padding - 1e-6);
            assert!(rect.right() <= group.right() - padding + 1e-6);
        }
        let half_gap = 5.0 - 1e-6;
        let w = Rect::from_center(out.positions["w"], core.sizes()["w"]);
        assert!(!w.inflate(half_gap, half_gap).intersects_with(&group.inflate(half_gap, half_gap)));
    }
}
