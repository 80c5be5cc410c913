//! Bounding boxes of exported point sets.

use geo::{Coord, Point, Rect};

/// Axis-aligned extent of a non-empty point set in lon/lat space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox(Rect<f64>);

impl BoundingBox {
    /// Accumulate the extent of `points`, or `None` when there are none.
    ///
    /// # Examples
    ///
    /// ```
    /// use geo::Point;
    /// use geosurvey_export::BoundingBox;
    ///
    /// let bbox = BoundingBox::from_points([Point::new(-3.0, 40.0), Point::new(2.0, 41.5)])
    ///     .expect("non-empty");
    /// assert_eq!((bbox.min_x(), bbox.max_y()), (-3.0, 41.5));
    /// ```
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point<f64>>,
    {
        points.into_iter().fold(None, |acc, point| {
            let coord = point.0;
            Some(match acc {
                None => Self(Rect::new(coord, coord)),
                Some(Self(rect)) => Self(Rect::new(
                    Coord {
                        x: rect.min().x.min(coord.x),
                        y: rect.min().y.min(coord.y),
                    },
                    Coord {
                        x: rect.max().x.max(coord.x),
                        y: rect.max().y.max(coord.y),
                    },
                )),
            })
        })
    }

    /// Smallest longitude.
    #[must_use]
    pub fn min_x(&self) -> f64 {
        self.0.min().x
    }

    /// Smallest latitude.
    #[must_use]
    pub fn min_y(&self) -> f64 {
        self.0.min().y
    }

    /// Largest longitude.
    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.0.max().x
    }

    /// Largest latitude.
    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.0.max().y
    }
}
