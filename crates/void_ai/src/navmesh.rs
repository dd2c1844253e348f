//! Navigation mesh and A* pathfinding
//!
//! Polygons are axis-aligned walkable cells laid out in grid layers. Layers
//! at different heights are joined by traversal links (off-mesh
//! connections such as jumps). When the goal cannot be reached the search
//! still returns a partial path ending at the explored cell closest to it.

use serde::{Deserialize, Serialize};
use std::collections::{BinaryHeap, HashMap, HashSet};
use void_math::{Vec3, AABB};

use crate::navigation::{PathQuery, PathStatus, TraversalLink};

/// A polygon in the navigation mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavPolygon {
    /// Vertex indices
    pub vertices: Vec<usize>,
    /// Center point
    pub center: Vec3,
    /// Neighboring polygon indices
    pub neighbors: Vec<usize>,
    /// Area cost multiplier (higher = harder to traverse)
    pub cost: f32,
    /// Whether this polygon is walkable
    pub walkable: bool,
    /// Horizontal extent of the polygon
    pub footprint: AABB,
}

impl NavPolygon {
    /// Create a new polygon from its vertex indices into `all`
    pub fn new(vertices: Vec<usize>, all: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for &v in &vertices {
            min = min.min(all[v]);
            max = max.max(all[v]);
        }
        let footprint = AABB::new(min, max);
        Self {
            vertices,
            center: footprint.center(),
            neighbors: Vec::new(),
            cost: 1.0,
            walkable: true,
            footprint,
        }
    }
}

/// Off-mesh connection stored on the mesh
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NavLink {
    pub link: TraversalLink,
    pub from_polygon: usize,
    pub to_polygon: usize,
    pub bidirectional: bool,
    /// Cost multiplier on the link's straight length
    pub cost: f32,
}

/// One step of a planned path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathCorner {
    pub point: Vec3,
    /// Set when reaching `point` begins a traversal link
    pub link: Option<TraversalLink>,
}

impl PathCorner {
    fn walk(point: Vec3) -> Self {
        Self { point, link: None }
    }
}

/// A path through the navigation mesh
#[derive(Debug, Clone, Default)]
pub struct NavPath {
    pub corners: Vec<PathCorner>,
    pub status: PathStatus,
}

impl NavPath {
    /// Check if path is empty
    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }

    /// Final point of the path
    pub fn destination(&self) -> Option<Vec3> {
        self.corners.last().map(|c| c.point)
    }

    /// Length along corners starting at corner `start`
    pub fn length_from(&self, start: usize) -> f32 {
        self.corners
            .iter()
            .skip(start)
            .zip(self.corners.iter().skip(start + 1))
            .map(|(a, b)| a.point.distance(b.point))
            .sum()
    }

    /// Get total path length
    pub fn total_length(&self) -> f32 {
        self.length_from(0)
    }

    pub fn to_query(&self) -> PathQuery {
        PathQuery {
            status: self.status,
            corners: self.corners.iter().map(|c| c.point).collect(),
        }
    }
}

/// Navigation mesh for pathfinding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavMesh {
    /// Vertices of the mesh
    pub vertices: Vec<Vec3>,
    /// Polygons of the mesh
    pub polygons: Vec<NavPolygon>,
    /// Off-mesh connections
    pub links: Vec<NavLink>,
    /// Max height between a point and a polygon for the point to be "on" it
    pub vertical_tolerance: f32,
    /// Grid cell size for spatial queries
    cell_size: f32,
    /// Spatial hash for quick polygon lookup
    #[serde(skip)]
    spatial_hash: HashMap<(i32, i32), Vec<usize>>,
}

impl Default for NavMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl NavMesh {
    /// Create a new empty nav mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            polygons: Vec::new(),
            links: Vec::new(),
            vertical_tolerance: 2.0,
            cell_size: 5.0,
            spatial_hash: HashMap::new(),
        }
    }

    /// Create a simple grid nav mesh on the ground plane, starting at the origin
    pub fn create_grid(width: f32, depth: f32, cell_size: f32) -> Self {
        let mut mesh = Self::new();
        mesh.cell_size = cell_size;
        mesh.add_grid(Vec3::ZERO, width, depth, cell_size);
        mesh
    }

    /// Append a grid layer whose minimum corner is `origin`.
    ///
    /// Returns the index range of the new polygons. Adjacent cells in the
    /// same layer are neighbors; separate layers only connect through links.
    pub fn add_grid(&mut self, origin: Vec3, width: f32, depth: f32, cell_size: f32) -> std::ops::Range<usize> {
        let cols = (width / cell_size).ceil().max(1.0) as usize;
        let rows = (depth / cell_size).ceil().max(1.0) as usize;
        let vertex_base = self.vertices.len();
        let poly_base = self.polygons.len();

        for row in 0..=rows {
            for col in 0..=cols {
                let x = origin.x + col as f32 * cell_size;
                let z = origin.z + row as f32 * cell_size;
                self.vertices.push(Vec3::new(x, origin.y, z));
            }
        }

        // Quads
        let stride = cols + 1;
        for row in 0..rows {
            for col in 0..cols {
                let base = vertex_base + row * stride + col;
                let vertices = vec![base, base + 1, base + stride + 1, base + stride];
                let polygon = NavPolygon::new(vertices, &self.vertices);
                self.polygons.push(polygon);
            }
        }

        for row in 0..rows {
            for col in 0..cols {
                let idx = poly_base + row * cols + col;
                let mut neighbors = Vec::new();
                if col > 0 {
                    neighbors.push(idx - 1);
                }
                if col < cols - 1 {
                    neighbors.push(idx + 1);
                }
                if row > 0 {
                    neighbors.push(idx - cols);
                }
                if row < rows - 1 {
                    neighbors.push(idx + cols);
                }
                self.polygons[idx].neighbors = neighbors;
            }
        }

        self.rebuild_spatial_hash();
        poly_base..self.polygons.len()
    }

    /// Connect two points with a traversal link.
    ///
    /// Returns `None` when either end is not on the mesh.
    pub fn add_link(&mut self, start: Vec3, end: Vec3, bidirectional: bool) -> Option<usize> {
        let from_polygon = self.find_polygon(start)?;
        let to_polygon = self.find_polygon(end)?;
        self.links.push(NavLink {
            link: TraversalLink { start, end },
            from_polygon,
            to_polygon,
            bidirectional,
            cost: 1.0,
        });
        Some(self.links.len() - 1)
    }

    /// Mark every polygon whose center lies inside `region` as unwalkable
    pub fn block_region(&mut self, region: &AABB) -> usize {
        let mut blocked = 0;
        for poly in &mut self.polygons {
            if region.contains_xz(poly.center) && poly.center.y >= region.min.y - self.vertical_tolerance && poly.center.y <= region.max.y {
                poly.walkable = false;
                blocked += 1;
            }
        }
        blocked
    }

    fn hash_cell(&self, x: f32, z: f32) -> (i32, i32) {
        ((x / self.cell_size).floor() as i32, (z / self.cell_size).floor() as i32)
    }

    /// Rebuild spatial hash for queries
    pub fn rebuild_spatial_hash(&mut self) {
        self.spatial_hash.clear();
        for (idx, poly) in self.polygons.iter().enumerate() {
            let (x0, z0) = self.hash_cell(poly.footprint.min.x, poly.footprint.min.z);
            let (x1, z1) = self.hash_cell(poly.footprint.max.x, poly.footprint.max.z);
            for cx in x0..=x1 {
                for cz in z0..=z1 {
                    self.spatial_hash.entry((cx, cz)).or_default().push(idx);
                }
            }
        }
    }

    /// Find the walkable polygon under a point, preferring the vertically closest one
    pub fn find_polygon(&self, point: Vec3) -> Option<usize> {
        let cell = self.hash_cell(point.x, point.z);
        let candidates: &[usize] = match self.spatial_hash.get(&cell) {
            Some(indices) => indices,
            None => return None,
        };
        candidates
            .iter()
            .copied()
            .filter(|&idx| self.point_in_polygon(point, idx))
            .min_by(|&a, &b| {
                let da = (self.polygons[a].center.y - point.y).abs();
                let db = (self.polygons[b].center.y - point.y).abs();
                da.total_cmp(&db)
            })
    }

    fn point_in_polygon(&self, point: Vec3, polygon_idx: usize) -> bool {
        let poly = &self.polygons[polygon_idx];
        poly.walkable
            && poly.footprint.contains_xz(point)
            && (point.y - poly.center.y).abs() <= self.vertical_tolerance
    }

    /// Project a point onto the polygon surface under it
    pub fn snap(&self, point: Vec3) -> Option<Vec3> {
        self.find_polygon(point)
            .map(|idx| point.with_y(self.polygons[idx].center.y))
    }

    /// Find path between two points using A*.
    ///
    /// `Invalid` when the start is off the mesh, `Partial` when the goal
    /// cannot be reached (the path then ends at the closest explored point).
    pub fn find_path(&self, start: Vec3, end: Vec3) -> NavPath {
        let Some(start_poly) = self.find_polygon(start) else {
            return NavPath { corners: Vec::new(), status: PathStatus::Invalid };
        };
        let end_poly = self.find_polygon(end);

        if Some(start_poly) == end_poly {
            return NavPath {
                corners: vec![PathCorner::walk(start), PathCorner::walk(end)],
                status: PathStatus::Complete,
            };
        }

        let (steps, reached) = self.astar(start_poly, end_poly, end);

        let mut corners = vec![PathCorner::walk(start)];
        let mut last_poly = start_poly;
        let step_count = steps.len();
        for (i, &(poly, via_link)) in steps.iter().enumerate() {
            match via_link {
                Some(link_idx) => {
                    let nav_link = &self.links[link_idx];
                    let (from, to) = if nav_link.from_polygon == last_poly {
                        (nav_link.link.start, nav_link.link.end)
                    } else {
                        (nav_link.link.end, nav_link.link.start)
                    };
                    corners.push(PathCorner {
                        point: from,
                        link: Some(TraversalLink { start: from, end: to }),
                    });
                    corners.push(PathCorner::walk(to));
                }
                // The goal cell's center would only be a detour
                None if reached && i + 1 == step_count => {}
                None => corners.push(PathCorner::walk(self.polygons[poly].center)),
            }
            last_poly = poly;
        }

        if reached {
            corners.push(PathCorner::walk(end));
            NavPath { corners, status: PathStatus::Complete }
        } else {
            let poly = &self.polygons[last_poly];
            let terminal = poly.footprint.closest_point(end).with_y(poly.center.y);
            corners.push(PathCorner::walk(terminal));
            NavPath { corners, status: PathStatus::Partial }
        }
    }

    fn edges(&self, poly: usize) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        let walk = self.polygons[poly].neighbors.iter().map(|&n| (n, None));
        let links = self.links.iter().enumerate().filter_map(move |(i, l)| {
            if l.from_polygon == poly {
                Some((l.to_polygon, Some(i)))
            } else if l.bidirectional && l.to_polygon == poly {
                Some((l.from_polygon, Some(i)))
            } else {
                None
            }
        });
        walk.chain(links)
    }

    /// A* over the polygon graph.
    ///
    /// Returns the steps taken after `start` (polygon, link used to enter
    /// it) and whether `goal` was reached. When it was not, the steps lead
    /// to the explored polygon closest to `goal_point`.
    fn astar(&self, start: usize, goal: Option<usize>, goal_point: Vec3) -> (Vec<(usize, Option<usize>)>, bool) {
        #[derive(Clone, Copy)]
        struct Node {
            idx: usize,
            f_score: f32,
        }

        impl PartialEq for Node {
            fn eq(&self, other: &Self) -> bool {
                self.idx == other.idx
            }
        }

        impl Eq for Node {}

        impl PartialOrd for Node {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for Node {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                other.f_score.total_cmp(&self.f_score)
            }
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<usize, (usize, Option<usize>)> = HashMap::new();
        let mut g_score: HashMap<usize, f32> = HashMap::new();
        let mut closed_set: HashSet<usize> = HashSet::new();

        let heuristic = |idx: usize| {
            let poly = &self.polygons[idx];
            poly.footprint.closest_point(goal_point).with_y(poly.center.y).distance(goal_point)
        };

        g_score.insert(start, 0.0);
        open_set.push(Node { idx: start, f_score: heuristic(start) });
        let mut best = (start, heuristic(start));
        let mut reached = false;

        while let Some(current) = open_set.pop() {
            if Some(current.idx) == goal {
                best = (current.idx, 0.0);
                reached = true;
                break;
            }

            if !closed_set.insert(current.idx) {
                continue;
            }

            let h = heuristic(current.idx);
            if h < best.1 {
                best = (current.idx, h);
            }

            let current_g = g_score.get(&current.idx).copied().unwrap_or(f32::MAX);
            let current_center = self.polygons[current.idx].center;

            for (neighbor_idx, via_link) in self.edges(current.idx) {
                if closed_set.contains(&neighbor_idx) {
                    continue;
                }

                let neighbor_poly = &self.polygons[neighbor_idx];
                if !neighbor_poly.walkable {
                    continue;
                }

                let step = match via_link {
                    Some(i) => {
                        let l = &self.links[i];
                        current_center.distance(l.link.start)
                            + l.link.start.distance(l.link.end) * l.cost
                            + l.link.end.distance(neighbor_poly.center)
                    }
                    None => current_center.distance(neighbor_poly.center) * neighbor_poly.cost,
                };
                let tentative_g = current_g + step;

                let neighbor_g = g_score.get(&neighbor_idx).copied().unwrap_or(f32::MAX);
                if tentative_g < neighbor_g {
                    came_from.insert(neighbor_idx, (current.idx, via_link));
                    g_score.insert(neighbor_idx, tentative_g);
                    open_set.push(Node {
                        idx: neighbor_idx,
                        f_score: tentative_g + heuristic(neighbor_idx),
                    });
                }
            }
        }

        // Reconstruct
        let mut steps = Vec::new();
        let mut current_idx = best.0;
        while let Some(&(prev, via_link)) = came_from.get(&current_idx) {
            steps.push((current_idx, via_link));
            current_idx = prev;
        }
        steps.reverse();
        (steps, reached)
    }

    /// Mark a polygon as unwalkable
    pub fn set_walkable(&mut self, polygon_idx: usize, walkable: bool) {
        if let Some(poly) = self.polygons.get_mut(polygon_idx) {
            poly.walkable = walkable;
        }
    }

    /// Set cost for a polygon
    pub fn set_cost(&mut self, polygon_idx: usize, cost: f32) {
        if let Some(poly) = self.polygons.get_mut(polygon_idx) {
            poly.cost = cost;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nav_mesh_grid() {
        let mesh = NavMesh::create_grid(10.0, 10.0, 5.0);

        // Should have 2x2 = 4 polygons
        assert_eq!(mesh.polygons.len(), 4);
        // Should have 3x3 = 9 vertices
        assert_eq!(mesh.vertices.len(), 9);
    }

    #[test]
    fn test_find_polygon() {
        let mesh = NavMesh::create_grid(10.0, 10.0, 5.0);
        assert_eq!(mesh.find_polygon(Vec3::new(2.5, 0.0, 2.5)), Some(0));
        assert_eq!(mesh.find_polygon(Vec3::new(7.5, 0.0, 7.5)), Some(3));
        assert!(mesh.find_polygon(Vec3::new(-1.0, 0.0, 2.5)).is_none());
        assert!(mesh.find_polygon(Vec3::new(2.5, 5.0, 2.5)).is_none());
    }

    #[test]
    fn test_find_path() {
        let mesh = NavMesh::create_grid(20.0, 20.0, 5.0);
        let path = mesh.find_path(Vec3::new(2.5, 0.0, 2.5), Vec3::new(17.5, 0.0, 17.5));

        assert_eq!(path.status, PathStatus::Complete);
        assert!(!path.is_empty());
        assert!(path.total_length() > 0.0);
        assert_eq!(path.destination(), Some(Vec3::new(17.5, 0.0, 17.5)));
    }

    #[test]
    fn test_path_same_polygon() {
        let mesh = NavMesh::create_grid(10.0, 10.0, 5.0);
        let path = mesh.find_path(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 2.0));
        assert_eq!(path.corners.len(), 2); // Direct path
    }

    #[test]
    fn test_start_off_mesh_is_invalid() {
        let mesh = NavMesh::create_grid(10.0, 10.0, 5.0);
        let path = mesh.find_path(Vec3::new(-5.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 2.0));
        assert_eq!(path.status, PathStatus::Invalid);
        assert!(path.is_empty());
    }

    #[test]
    fn test_blocked_middle_gives_partial_path() {
        let mut mesh = NavMesh::create_grid(15.0, 5.0, 5.0);
        mesh.set_walkable(1, false);

        let goal = Vec3::new(12.5, 0.0, 2.5);
        let path = mesh.find_path(Vec3::new(2.5, 0.0, 2.5), goal);
        assert_eq!(path.status, PathStatus::Partial);
        // Ends on the edge of the start cell closest to the goal
        let end = path.destination().unwrap();
        assert!((end.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_polygon_cost_detour() {
        let mut mesh = NavMesh::create_grid(15.0, 10.0, 5.0);
        mesh.set_cost(1, 10.0);

        let path = mesh.find_path(Vec3::new(2.5, 0.0, 2.5), Vec3::new(12.5, 0.0, 2.5));
        assert_eq!(path.status, PathStatus::Complete);
        // Detour through the second row
        assert!(path.corners.iter().any(|c| c.point.z > 5.0));
    }

    #[test]
    fn test_link_joins_layers() {
        let mut mesh = NavMesh::create_grid(10.0, 10.0, 5.0);
        mesh.add_grid(Vec3::new(20.0, 4.0, 0.0), 10.0, 10.0, 5.0);

        let goal = Vec3::new(25.0, 4.0, 2.5);
        let before = mesh.find_path(Vec3::new(2.5, 0.0, 2.5), goal);
        assert_eq!(before.status, PathStatus::Partial);

        let link = mesh.add_link(Vec3::new(9.5, 0.0, 2.5), Vec3::new(20.5, 4.0, 2.5), false);
        assert!(link.is_some());

        let after = mesh.find_path(Vec3::new(2.5, 0.0, 2.5), goal);
        assert_eq!(after.status, PathStatus::Complete);
        let jump = after.corners.iter().find_map(|c| c.link).unwrap();
        assert_eq!(jump.end, Vec3::new(20.5, 4.0, 2.5));

        // One-way link
        let back = mesh.find_path(goal, Vec3::new(2.5, 0.0, 2.5));
        assert_eq!(back.status, PathStatus::Partial);
    }

    #[test]
    fn test_platform_above_ground_is_separate_polygon() {
        let mut mesh = NavMesh::create_grid(10.0, 10.0, 5.0);
        mesh.add_grid(Vec3::new(0.0, 4.0, 0.0), 5.0, 5.0, 5.0);
        let ground = mesh.find_polygon(Vec3::new(2.5, 0.0, 2.5)).unwrap();
        let platform = mesh.find_polygon(Vec3::new(2.5, 4.0, 2.5)).unwrap();
        assert_ne!(ground, platform);
        assert_eq!(mesh.snap(Vec3::new(2.5, 3.2, 2.5)).unwrap().y, 4.0);
    }

    #[test]
    fn test_block_region() {
        let mut mesh = NavMesh::create_grid(15.0, 5.0, 5.0);
        let blocked = mesh.block_region(&AABB::pillar(Vec3::new(7.5, 0.0, 2.5), 2.0, 2.0, 3.0));
        assert_eq!(blocked, 1);
        assert!(!mesh.polygons[1].walkable);
    }
}
