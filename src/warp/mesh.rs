//! Warp control grid
//!
//! Control points are normalized output coordinates (0..1, y down) and may be
//! dragged past the edges of the output.

use serde::{Deserialize, Serialize};

/// Grid of control points deforming the canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpMesh {
    /// Number of grid columns (minimum 2)
    pub columns: usize,

    /// Number of grid rows (minimum 2)
    pub rows: usize,

    /// Control points stored column-major: index = col * rows + row
    #[serde(rename = "point", default)]
    pub points: Vec<WarpPoint>,
}

impl Default for WarpMesh {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl WarpMesh {
    /// Identity mesh, every point at its rest position
    pub fn new(columns: usize, rows: usize) -> Self {
        let columns = columns.max(2);
        let rows = rows.max(2);
        let mut points = Vec::with_capacity(columns * rows);

        for col in 0..columns {
            for row in 0..rows {
                let u = col as f32 / (columns - 1) as f32;
                let v = row as f32 / (rows - 1) as f32;
                points.push(WarpPoint::new_identity(u, v));
            }
        }

        Self {
            columns,
            rows,
            points,
        }
    }

    /// Whether the point list matches the grid size
    pub fn is_consistent(&self) -> bool {
        self.columns >= 2 && self.rows >= 2 && self.points.len() == self.columns * self.rows
    }

    pub fn get_point(&self, col: usize, row: usize) -> Option<&WarpPoint> {
        if col < self.columns && row < self.rows {
            self.points.get(col * self.rows + row)
        } else {
            None
        }
    }

    pub fn get_point_mut(&mut self, col: usize, row: usize) -> Option<&mut WarpPoint> {
        if col < self.columns && row < self.rows {
            self.points.get_mut(col * self.rows + row)
        } else {
            None
        }
    }

    /// Warped position of a point, or its rest position when out of range
    pub fn position(&self, col: usize, row: usize) -> [f32; 2] {
        self.get_point(col, row)
            .map(|p| p.position())
            .unwrap_or([0.0, 0.0])
    }

    pub fn set_point_position(&mut self, col: usize, row: usize, x: f32, y: f32) {
        if let Some(point) = self.get_point_mut(col, row) {
            point.x = x;
            point.y = y;
        }
    }

    /// Reset mesh to identity
    pub fn reset(&mut self) {
        for point in &mut self.points {
            point.x = point.u;
            point.y = point.v;
        }
    }

    /// Check if the mesh has any deformation
    pub fn is_identity(&self) -> bool {
        self.points.iter().all(WarpPoint::is_identity)
    }

    /// Bilinear position inside the deformed grid for rest coordinates `u, v`
    pub fn sample(&self, u: f32, v: f32) -> [f32; 2] {
        let fx = u.clamp(0.0, 1.0) * (self.columns - 1) as f32;
        let fy = v.clamp(0.0, 1.0) * (self.rows - 1) as f32;
        let col = (fx.floor() as usize).min(self.columns - 2);
        let row = (fy.floor() as usize).min(self.rows - 2);
        let s = fx - col as f32;
        let t = fy - row as f32;

        let p00 = self.position(col, row);
        let p10 = self.position(col + 1, row);
        let p01 = self.position(col, row + 1);
        let p11 = self.position(col + 1, row + 1);

        let top = lerp2(p00, p10, s);
        let bottom = lerp2(p01, p11, s);
        lerp2(top, bottom, t)
    }

    /// Resize the mesh while preserving corner positions
    pub fn resize(&mut self, new_columns: usize, new_rows: usize) {
        let new_columns = new_columns.max(2);
        let new_rows = new_rows.max(2);

        if new_columns == self.columns && new_rows == self.rows {
            return;
        }

        let corners = [
            self.position(0, 0),
            self.position(self.columns - 1, 0),
            self.position(0, self.rows - 1),
            self.position(self.columns - 1, self.rows - 1),
        ];

        *self = Self::new(new_columns, new_rows);

        // Interior points follow the preserved corners
        for col in 0..new_columns {
            for row in 0..new_rows {
                let u = col as f32 / (new_columns - 1) as f32;
                let v = row as f32 / (new_rows - 1) as f32;
                let top = lerp2(corners[0], corners[1], u);
                let bottom = lerp2(corners[2], corners[3], u);
                let [x, y] = lerp2(top, bottom, v);
                self.set_point_position(col, row, x, y);
            }
        }
    }
}

fn lerp2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

/// A single control point in the warp mesh
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WarpPoint {
    /// Rest position
    pub u: f32,
    pub v: f32,
    /// Warped position
    pub x: f32,
    pub y: f32,
}

impl WarpPoint {
    pub fn new_identity(u: f32, v: f32) -> Self {
        Self { u, v, x: u, y: v }
    }

    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// Offset from the rest position
    pub fn displacement(&self) -> [f32; 2] {
        [self.x - self.u, self.y - self.v]
    }

    pub fn is_identity(&self) -> bool {
        let [dx, dy] = self.displacement();
        dx.abs() < f32::EPSILON && dy.abs() < f32::EPSILON
    }
}
