pub mod drain;

use bytes::Bytes;
use http_body_util::Full;

/// Path of the addition endpoint, relative to the service base URL.
pub const ADD_PATH: &str = "/api/math/add";

#[inline]
pub fn empty_body() -> Full<Bytes> {
    Full::new(Bytes::new())
}

/// Query parameters of `GET /api/math/add`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct AddQuery {
    pub a: i64,
    pub b: i64,
}

impl AddQuery {
    #[must_use]
    pub fn new(a: i64, b: i64) -> Self {
        Self { a, b }
    }

    #[inline]
    #[must_use]
    pub fn sum(&self) -> i64 {
        self.a.wrapping_add(self.b)
    }

    #[inline]
    #[must_use]
    pub fn to_query_string(&self) -> String {
        format!("a={}&b={}", self.a, self.b)
    }
}

/// Full request target for an addition against `base_url`, which must not end with `/`.
#[must_use]
pub fn add_uri(base_url: &str, query: AddQuery) -> String {
    format!("{base_url}{ADD_PATH}?{}", query.to_query_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_keeps_sign() {
        assert_eq!(AddQuery::new(-2, 7).to_query_string(), "a=-2&b=7");
    }

    #[test]
    fn add_uri_appends_path_and_query() {
        let uri = add_uri("http://localhost:8080", AddQuery::new(1, 2));
        assert_eq!(uri, "http://localhost:8080/api/math/add?a=1&b=2");
    }

    #[test]
    fn sum_wraps_instead_of_panicking() {
        assert_eq!(AddQuery::new(5, 3).sum(), 8);
        assert_eq!(AddQuery::new(i64::MAX, 1).sum(), i64::MIN);
    }
}
