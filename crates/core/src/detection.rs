use serde::{Deserialize, Serialize};
use std::fmt;

/// A vertex of a detection polygon, in image coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f64, pub f64);

impl Point {
    pub fn x(self) -> f64 {
        self.0
    }

    pub fn y(self) -> f64 {
        self.1
    }
}

/// One recognized string and the polygon the OCR engine drew around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub text: String,
    pub polygon: Vec<Point>,
}

impl TextDetection {
    pub fn new(text: impl Into<String>, polygon: Vec<Point>) -> Self {
        Self { text: text.into(), polygon }
    }

    /// Mean of the polygon vertices, or `None` for an empty polygon.
    pub fn centroid(&self) -> Option<Point> {
        if self.polygon.is_empty() {
            return None;
        }
        let n = self.polygon.len() as f64;
        let (sx, sy) = self
            .polygon
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x(), sy + p.y()));
        Some(Point(sx / n, sy / n))
    }
}

/// Region of the card relative to its center. Points on either center axis
/// belong to no quadrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    /// Top right.
    Q1,
    /// Top left.
    Q2,
    /// Bottom left.
    Q3,
    /// Bottom right.
    Q4,
    Mixed,
}

impl Quadrant {
    pub fn classify(x: f64, y: f64, cx: f64, cy: f64) -> Quadrant {
        if x > cx && y < cy {
            Quadrant::Q1
        } else if x < cx && y < cy {
            Quadrant::Q2
        } else if x < cx && y > cy {
            Quadrant::Q3
        } else if x > cx && y > cy {
            Quadrant::Q4
        } else {
            Quadrant::Mixed
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quadrant::Q1 => write!(f, "Q1"),
            Quadrant::Q2 => write!(f, "Q2"),
            Quadrant::Q3 => write!(f, "Q3"),
            Quadrant::Q4 => write!(f, "Q4"),
            Quadrant::Mixed => write!(f, "Mixed"),
        }
    }
}

/// A detection reduced to what the field rules look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedItem {
    /// Trimmed and uppercased.
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub quadrant: Quadrant,
}

/// All annotated items of one image, in reading order (top-to-bottom, then
/// left-to-right).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedPage {
    pub width: u32,
    pub height: u32,
    pub items: Vec<AnnotatedItem>,
}

impl AnnotatedPage {
    pub fn center(&self) -> (f64, f64) {
        ((self.width / 2) as f64, (self.height / 2) as f64)
    }

    pub fn items_in(&self, quadrant: Quadrant) -> impl Iterator<Item = &AnnotatedItem> {
        self.items.iter().filter(move |i| i.quadrant == quadrant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_each_quadrant() {
        assert_eq!(Quadrant::classify(150.0, 20.0, 100.0, 50.0), Quadrant::Q1);
        assert_eq!(Quadrant::classify(50.0, 20.0, 100.0, 50.0), Quadrant::Q2);
        assert_eq!(Quadrant::classify(50.0, 80.0, 100.0, 50.0), Quadrant::Q3);
        assert_eq!(Quadrant::classify(150.0, 80.0, 100.0, 50.0), Quadrant::Q4);
    }

    #[test]
    fn classify_on_an_axis_is_mixed() {
        assert_eq!(Quadrant::classify(100.0, 20.0, 100.0, 50.0), Quadrant::Mixed);
        assert_eq!(Quadrant::classify(150.0, 50.0, 100.0, 50.0), Quadrant::Mixed);
        assert_eq!(Quadrant::classify(100.0, 50.0, 100.0, 50.0), Quadrant::Mixed);
    }

    #[test]
    fn classify_nan_is_mixed() {
        assert_eq!(Quadrant::classify(f64::NAN, 20.0, 100.0, 50.0), Quadrant::Mixed);
    }

    #[test]
    fn centroid_is_vertex_mean() {
        let d = TextDetection::new(
            "X",
            vec![Point(0.0, 0.0), Point(10.0, 0.0), Point(10.0, 4.0), Point(0.0, 4.0)],
        );
        assert_eq!(d.centroid(), Some(Point(5.0, 2.0)));
        assert_eq!(TextDetection::new("X", vec![]).centroid(), None);
    }

    #[test]
    fn point_serializes_as_pair() {
        let json = serde_json::to_string(&Point(1.5, 2.0)).unwrap();
        assert_eq!(json, "[1.5,2.0]");
    }

    #[test]
    fn items_in_keeps_order() {
        let item = |text: &str, y: f64, quadrant| AnnotatedItem {
            text: text.into(),
            x: 0.0,
            y,
            quadrant,
        };
        let page = AnnotatedPage {
            width: 200,
            height: 100,
            items: vec![
                item("A", 1.0, Quadrant::Q2),
                item("B", 2.0, Quadrant::Q1),
                item("C", 3.0, Quadrant::Q2),
            ],
        };
        let q2: Vec<_> = page.items_in(Quadrant::Q2).map(|i| i.text.as_str()).collect();
        assert_eq!(q2, ["A", "C"]);
        assert_eq!(page.center(), (100.0, 50.0));
    }

    #[test]
    fn center_rounds_odd_sizes_down() {
        let page = AnnotatedPage { width: 201, height: 99, items: vec![] };
        assert_eq!(page.center(), (100.0, 49.0));
    }
}
