use crate::math::curve::curve::Curve;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    x: f64,
    y: f64
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Point2D {
        Point2D { x, y }
    }

    /// (x, curve(x))
    pub fn on<C: Curve + ?Sized>(curve: &C, x: f64) -> Point2D {
        Point2D { x, y: curve.value(x) }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

/// 由節點描述的曲線；節點之外的行為由實作自行定義
pub trait NonparametricCurve: Curve {
    /// 節點：各段左端點，加上最後一段的右端點
    fn points(&self) -> Vec<Point2D>;

    fn min_x(&self) -> f64;

    fn max_x(&self) -> f64;

    /// x 是否落在 [min_x, max_x) 內
    fn covers(&self, x: f64) -> bool {
        self.min_x() <= x && x < self.max_x()
    }
}
