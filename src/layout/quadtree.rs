use crate::geometry::Point;

/// Deeper insertions are merged into the node reached at this depth.
const MAX_DEPTH: usize = 20;

#[derive(Debug, Clone)]
struct QuadNode {
    /// Vertex stored in a leaf; `None` for inner nodes and merged leaves.
    vertex: Option<usize>,
    children: [Option<usize>; 4],
    child_count: usize,
    weight: f64,
    /// Weighted barycenter of everything below this node.
    center: Point,
    min: Point,
    max: Point,
}

impl QuadNode {
    fn leaf(vertex: usize, position: Point, weight: f64, min: Point, max: Point) -> Self {
        Self {
            vertex: Some(vertex),
            children: [None; 4],
            child_count: 0,
            weight,
            center: position,
            min,
            max,
        }
    }

    fn width(&self) -> f64 {
        (self.max.x - self.min.x).max(self.max.y - self.min.y)
    }

    fn quadrant(&self, position: Point) -> usize {
        let mid_x = (self.min.x + self.max.x) / 2.0;
        let mid_y = (self.min.y + self.max.y) / 2.0;
        usize::from(position.x > mid_x) + 2 * usize::from(position.y > mid_y)
    }

    fn quadrant_bounds(&self, quadrant: usize) -> (Point, Point) {
        let mid_x = (self.min.x + self.max.x) / 2.0;
        let mid_y = (self.min.y + self.max.y) / 2.0;
        let (min_x, max_x) = if quadrant & 1 == 0 {
            (self.min.x, mid_x)
        } else {
            (mid_x, self.max.x)
        };
        let (min_y, max_y) = if quadrant & 2 == 0 {
            (self.min.y, mid_y)
        } else {
            (mid_y, self.max.y)
        };
        (Point::new(min_x, min_y), Point::new(max_x, max_y))
    }
}

/// Arena-backed Barnes-Hut quad-tree over weighted points.
///
/// Lives for one layout step only; it is rebuilt from scratch every
/// iteration and patched in place with [`QuadTree::move_vertex`] in between.
#[derive(Debug, Clone, Default)]
pub(crate) struct QuadTree {
    nodes: Vec<QuadNode>,
}

impl QuadTree {
    /// Builds a tree over every point with a positive weight.
    pub(crate) fn build(positions: &[Point], weights: &[f64]) -> Self {
        let mut tree = Self::default();
        let mut live = positions
            .iter()
            .zip(weights)
            .enumerate()
            .filter(|(_, (_, w))| **w > 0.0);
        let Some((first, (first_pos, first_weight))) = live.next() else {
            return tree;
        };

        let mut min = *first_pos;
        let mut max = *first_pos;
        for (pos, weight) in positions.iter().zip(weights) {
            if *weight > 0.0 {
                min = Point::new(min.x.min(pos.x), min.y.min(pos.y));
                max = Point::new(max.x.max(pos.x), max.y.max(pos.y));
            }
        }
        // Square the box so quadrants stay square.
        let side = (max.x - min.x).max(max.y - min.y);
        let max = Point::new(min.x + side, min.y + side);

        tree.nodes
            .push(QuadNode::leaf(first, *first_pos, *first_weight, min, max));
        for (vertex, (pos, weight)) in live {
            tree.insert(0, vertex, *pos, *weight, 0);
        }
        tree
    }

    /// Side of the root box.
    pub(crate) fn width(&self) -> f64 {
        self.nodes.first().map(QuadNode::width).unwrap_or(0.0)
    }

    fn insert(&mut self, node: usize, vertex: usize, position: Point, weight: f64, depth: usize) {
        if depth >= MAX_DEPTH {
            let current = &mut self.nodes[node];
            let total = current.weight + weight;
            current.center = Point::new(
                (current.center.x * current.weight + position.x * weight) / total,
                (current.center.y * current.weight + position.y * weight) / total,
            );
            current.weight = total;
            current.vertex = None;
            return;
        }

        if self.nodes[node].child_count == 0
            && let Some(existing) = self.nodes[node].vertex.take()
        {
            let existing_pos = self.nodes[node].center;
            let existing_weight = self.nodes[node].weight;
            self.insert_into_child(node, existing, existing_pos, existing_weight, depth);
        }
        self.insert_into_child(node, vertex, position, weight, depth);
        self.refresh(node);
    }

    fn insert_into_child(
        &mut self,
        node: usize,
        vertex: usize,
        position: Point,
        weight: f64,
        depth: usize,
    ) {
        let quadrant = self.nodes[node].quadrant(position);
        match self.nodes[node].children[quadrant] {
            Some(child) => self.insert(child, vertex, position, weight, depth + 1),
            None => {
                let (min, max) = self.nodes[node].quadrant_bounds(quadrant);
                let child = self.nodes.len();
                self.nodes
                    .push(QuadNode::leaf(vertex, position, weight, min, max));
                let parent = &mut self.nodes[node];
                parent.children[quadrant] = Some(child);
                parent.child_count += 1;
            }
        }
    }

    /// Recomputes weight and barycenter of `node` from its children.
    fn refresh(&mut self, node: usize) {
        let mut weight = 0.0;
        let mut x = 0.0;
        let mut y = 0.0;
        for child in self.nodes[node].children.iter().flatten() {
            let child = &self.nodes[*child];
            weight += child.weight;
            x += child.center.x * child.weight;
            y += child.center.y * child.weight;
        }
        if weight > 0.0 {
            let current = &mut self.nodes[node];
            current.weight = weight;
            current.center = Point::new(x / weight, y / weight);
        }
    }

    /// Shifts the barycenters on the path to the leaf holding a point of
    /// `weight` that moved from `from` to `to`. The tree shape is kept.
    pub(crate) fn move_vertex(&mut self, from: Point, to: Point, weight: f64) {
        let mut current = if self.nodes.is_empty() { None } else { Some(0) };
        while let Some(idx) = current {
            let node = &mut self.nodes[idx];
            if node.weight > 0.0 {
                node.center += (to - from) * (weight / node.weight);
            }
            let quadrant = node.quadrant(from);
            current = node.children[quadrant];
        }
    }

    /// Calls `visit(center, weight)` for every cluster that may stand in for its
    /// members when seen from `position`, skipping the leaf holding `vertex`.
    /// A cluster is opened when `position` is closer than twice its width.
    pub(crate) fn for_each_mass(
        &self,
        vertex: usize,
        position: Point,
        mut visit: impl FnMut(Point, f64),
    ) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.vertex == Some(vertex) {
                continue;
            }
            let dist = position.distance(node.center);
            if node.child_count > 0 && dist < 2.0 * node.width() {
                stack.extend(node.children.iter().flatten().copied());
                continue;
            }
            visit(node.center, node.weight);
        }
    }
}
