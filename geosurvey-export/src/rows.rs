use geo::Point;
use geosurvey_core::Response;

/// A response paired with its validated location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoRow<'a> {
    /// Source response.
    pub response: &'a Response,
    /// Location with `x = longitude`, `y = latitude`.
    pub point: Point<f64>,
}

/// Keep the responses with a valid location, preserving their order.
#[must_use]
pub fn geo_rows(responses: &[Response]) -> Vec<GeoRow<'_>> {
    responses
        .iter()
        .filter_map(|response| {
            response
                .geo_point()
                .map(|point| GeoRow { response, point })
        })
        .collect()
}
