//! Element geometry shared by drivers and gesture steps.
//!
//! Coordinates are in screen points with the origin at the top-left corner
//! of the screen.

use serde::{Deserialize, Serialize};

/// A point on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The frame (position and size) of an element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    /// The x-coordinate of the element's top-left corner.
    pub x: f64,
    /// The y-coordinate of the element's top-left corner.
    pub y: f64,
    /// The width of the element in points.
    pub width: f64,
    /// The height of the element in points.
    pub height: f64,
}

impl ElementRect {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Direction of a swipe or scroll gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Parses a direction name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Start and end points for a swipe across `rect` in this direction.
    ///
    /// The gesture runs along the rect's center line, inset by `inset` points
    /// from the edges it travels between. Swiping "up" moves the finger from
    /// the bottom edge toward the top edge.
    pub fn swipe_path(&self, rect: &ElementRect, inset: f64) -> (Point, Point) {
        let center = rect.center();
        let top = rect.y + inset;
        let bottom = rect.y + rect.height - inset;
        let left = rect.x + inset;
        let right = rect.x + rect.width - inset;
        match self {
            Direction::Up => (Point::new(center.x, bottom), Point::new(center.x, top)),
            Direction::Down => (Point::new(center.x, top), Point::new(center.x, bottom)),
            Direction::Left => (Point::new(right, center.y), Point::new(left, center.y)),
            Direction::Right => (Point::new(left, center.y), Point::new(right, center.y)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECT: ElementRect = ElementRect { x: 0.0, y: 100.0, width: 200.0, height: 400.0 };

    #[test]
    fn test_center() {
        assert_eq!(RECT.center(), Point::new(100.0, 300.0));
    }

    #[test]
    fn test_direction_parse_ignores_case() {
        assert_eq!(Direction::parse("UP"), Some(Direction::Up));
        assert_eq!(Direction::parse("Left"), Some(Direction::Left));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn test_swipe_up_moves_bottom_to_top() {
        let (start, end) = Direction::Up.swipe_path(&RECT, 10.0);
        assert_eq!(start, Point::new(100.0, 490.0));
        assert_eq!(end, Point::new(100.0, 110.0));
    }

    #[test]
    fn test_swipe_right_moves_left_to_right() {
        let (start, end) = Direction::Right.swipe_path(&RECT, 10.0);
        assert_eq!(start, Point::new(10.0, 300.0));
        assert_eq!(end, Point::new(190.0, 300.0));
    }
}
