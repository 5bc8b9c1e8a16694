/// Axis-aligned rectangle in DIPs, stored as edges.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// 2D affine transform laid out like a 3x2 row-major matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub m11: f32,
    pub m12: f32,
    pub m21: f32,
    pub m22: f32,
    pub dx: f32,
    pub dy: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2D {
    pub const IDENTITY: Self = Self {
        m11: 1.0,
        m12: 0.0,
        m21: 0.0,
        m22: 1.0,
        dx: 0.0,
        dy: 0.0,
    };

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self {
            m11: sx,
            m22: sy,
            ..Self::IDENTITY
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.m11 + y * self.m21 + self.dx,
            x * self.m12 + y * self.m22 + self.dy,
        )
    }

    /// Bounding box of `rect` after transformation.
    pub fn transform_bounds(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.left, rect.top),
            self.transform_point(rect.right, rect.top),
            self.transform_point(rect.left, rect.bottom),
            self.transform_point(rect.right, rect.bottom),
        ];

        corners.iter().skip(1).fold(
            Rect::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1),
            |acc, &(x, y)| Rect {
                left: acc.left.min(x),
                top: acc.top.min(y),
                right: acc.right.max(x),
                bottom: acc.bottom.max(y),
            },
        )
    }
}
