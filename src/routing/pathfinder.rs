use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::cancel::CancellationToken;
use crate::error::LayoutError;
use crate::geometry::{Point, Rect};
use crate::graph::{EdgeId, VertexId};
use crate::layout::EdgeRoutes;

use super::astar::{Heuristic, SearchOptions, find_path};
use super::{EdgeRouter, RoutingInput};

/// Grids above this many cells are rejected instead of allocated.
const MAX_GRID_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathFinderParams {
    pub horizontal_grid_size: f64,
    pub vertical_grid_size: f64,
    /// Margin added around the content bounds before the grid is laid out.
    pub side_grid_offset: f64,
    pub use_diagonals: bool,
    pub heuristic: Heuristic,
    pub heuristic_level: f64,
    pub punish_change_direction: bool,
    pub use_heavy_diagonals: bool,
    pub use_tie_breaker: bool,
    pub search_limit: usize,
    /// Clearance around each vertex rectangle that routes keep out of.
    pub safe_distance: f64,
}

impl Default for PathFinderParams {
    fn default() -> Self {
        Self {
            horizontal_grid_size: 100.0,
            vertical_grid_size: 100.0,
            side_grid_offset: 200.0,
            use_diagonals: true,
            heuristic: Heuristic::Manhattan,
            heuristic_level: 2.0,
            punish_change_direction: false,
            use_heavy_diagonals: false,
            use_tie_breaker: false,
            search_limit: 50_000,
            safe_distance: 2.0,
        }
    }
}

impl PathFinderParams {
    fn search_options(&self) -> SearchOptions {
        SearchOptions {
            diagonals: self.use_diagonals,
            heuristic: self.heuristic,
            heuristic_level: self.heuristic_level,
            punish_change_direction: self.punish_change_direction,
            heavy_diagonals: self.use_heavy_diagonals,
            tie_breaker: self.use_tie_breaker,
            search_limit: self.search_limit,
        }
    }
}

/// Cell grid over the padded content bounds, with the inflated vertex
/// rectangles bucketed per cell.
#[derive(Debug, Clone)]
struct RoutingGrid {
    cell_width: f64,
    cell_height: f64,
    min_x: f64,
    min_y: f64,
    cols: i32,
    rows: i32,
    obstacles: Vec<(VertexId, Rect)>,
    cell_obstacles: Vec<Vec<usize>>,
}

impl RoutingGrid {
    fn new(input: &RoutingInput<'_>, params: &PathFinderParams) -> Result<Self, LayoutError> {
        let (cell_width, cell_height) = (params.horizontal_grid_size, params.vertical_grid_size);
        if !(cell_width > 0.0 && cell_height > 0.0) {
            return Err(LayoutError::InvalidConfiguration(format!(
                "grid cells must have a positive size, got {cell_width}x{cell_height}"
            )));
        }
        let area = input
            .bounds
            .inflate(params.side_grid_offset, params.side_grid_offset);
        let cols = (area.width / cell_width).ceil() as usize + 1;
        let rows = (area.height / cell_height).ceil() as usize + 1;
        if cols.saturating_mul(rows) > MAX_GRID_CELLS {
            return Err(LayoutError::InvalidConfiguration(format!(
                "routing grid of {cols}x{rows} cells is too large"
            )));
        }
        let (cols, rows) = (cols as i32, rows as i32);

        let obstacles: Vec<(VertexId, Rect)> = input
            .rects
            .iter()
            .map(|(id, rect)| {
                let grown = rect.inflate(params.safe_distance, params.safe_distance);
                (id.clone(), grown)
            })
            .collect();
        let mut cell_obstacles = vec![Vec::new(); (cols * rows) as usize];
        for (idx, (_, rect)) in obstacles.iter().enumerate() {
            let start_x = ((rect.left() - area.x) / cell_width).floor().max(0.0) as i32;
            let end_x = ((rect.right() - area.x) / cell_width)
                .floor()
                .min((cols - 1) as f64) as i32;
            let start_y = ((rect.top() - area.y) / cell_height).floor().max(0.0) as i32;
            let end_y = ((rect.bottom() - area.y) / cell_height)
                .floor()
                .min((rows - 1) as f64) as i32;
            for iy in start_y..=end_y {
                for ix in start_x..=end_x {
                    cell_obstacles[(iy * cols + ix) as usize].push(idx);
                }
            }
        }

        Ok(Self {
            cell_width,
            cell_height,
            min_x: area.x,
            min_y: area.y,
            cols,
            rows,
            obstacles,
            cell_obstacles,
        })
    }

    fn cell_for_point(&self, point: Point) -> Option<(i32, i32)> {
        let ix = ((point.x - self.min_x) / self.cell_width).floor() as i32;
        let iy = ((point.y - self.min_y) / self.cell_height).floor() as i32;
        if ix < 0 || iy < 0 || ix >= self.cols || iy >= self.rows {
            return None;
        }
        Some((ix, iy))
    }

    fn cell_center(&self, ix: i32, iy: i32) -> Point {
        Point::new(
            self.min_x + (ix as f64 + 0.5) * self.cell_width,
            self.min_y + (iy as f64 + 0.5) * self.cell_height,
        )
    }

    /// Whether the cell center lies in the rectangle of a vertex the edge
    /// does not own.
    fn cell_blocked(&self, ix: i32, iy: i32, owners: &[&str]) -> bool {
        let center = self.cell_center(ix, iy);
        self.cell_obstacles[(iy * self.cols + ix) as usize]
            .iter()
            .map(|&idx| &self.obstacles[idx])
            .any(|(id, rect)| !owners.contains(&id.as_str()) && rect.contains(center))
    }
}

/// Grid A* routing. [`EdgeRouter::compute`] builds the grid; single-edge
/// re-routing reuses it and fails with [`LayoutError::RouterNotPrepared`]
/// until a full compute ran.
#[derive(Debug, Clone, Default)]
pub struct PathFinderRouter {
    params: PathFinderParams,
    grid: Option<RoutingGrid>,
}

impl PathFinderRouter {
    pub fn new(params: PathFinderParams) -> Self {
        Self { params, grid: None }
    }

    fn route(
        &self,
        grid: &RoutingGrid,
        input: &RoutingInput<'_>,
        edge: EdgeId,
    ) -> Result<Option<Vec<Point>>, LayoutError> {
        let (source, target) = {
            let edge = input.edge(edge)?;
            (edge.source.as_str(), edge.target.as_str())
        };
        let owners = input.owners(edge)?;
        let (from, to) = input.endpoints(edge)?;
        let (Some(start), Some(end)) = (grid.cell_for_point(from), grid.cell_for_point(to)) else {
            debug!(%edge, "edge endpoint outside the routing grid");
            return Ok(None);
        };
        let cells = find_path(
            grid.cols,
            grid.rows,
            |x, y| grid.cell_blocked(x, y, &owners),
            start,
            end,
            &self.params.search_options(),
        );
        match cells {
            Some(cells) => Ok(Some(
                cells
                    .into_iter()
                    .map(|(ix, iy)| grid.cell_center(ix, iy))
                    .collect(),
            )),
            None => {
                debug!(%edge, source, target, "no grid path found");
                Ok(None)
            }
        }
    }
}

impl EdgeRouter for PathFinderRouter {
    fn name(&self) -> &'static str {
        "PathFinder"
    }

    fn compute(
        &mut self,
        input: &RoutingInput<'_>,
        cancel: &CancellationToken,
    ) -> Result<EdgeRoutes, LayoutError> {
        let _span = debug_span!("path_finder_routing", edges = input.graph.edge_count()).entered();
        let grid = RoutingGrid::new(input, &self.params)?;
        debug!(cols = grid.cols, rows = grid.rows, "routing grid built");
        let mut routes = EdgeRoutes::new();
        for (id, _) in input.graph.edges() {
            cancel.check()?;
            if let Some(points) = self.route(&grid, input, id)? {
                routes.insert(id, points);
            }
        }
        self.grid = Some(grid);
        Ok(routes)
    }

    fn compute_single(
        &mut self,
        input: &RoutingInput<'_>,
        edge: EdgeId,
    ) -> Result<Option<Vec<Point>>, LayoutError> {
        let grid = self.grid.as_ref().ok_or(LayoutError::RouterNotPrepared)?;
        self.route(grid, input, edge)
    }
}
