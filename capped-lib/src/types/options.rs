use http::HeaderMap;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// Per-request options, forwarded as-is to the [`Transport`](crate::Transport).
///
/// ```
/// use capped_lib::RequestOptions;
/// use std::time::Duration;
///
/// let options = RequestOptions::builder()
///     .query(vec![("page".to_string(), "2".to_string())])
///     .timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(options.timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(TypedBuilder, Debug, Clone, Default, PartialEq)]
#[builder(field_defaults(default, setter(into)))]
pub struct RequestOptions {
    /// Extra headers sent with the request
    pub headers: HeaderMap,
    /// Query parameters appended to the URL
    pub query: Vec<(String, String)>,
    /// Total timeout, from connecting until the body has been read
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Combine client-wide defaults with these options.
    ///
    /// Headers and timeout set on `self` win over the defaults,
    /// query parameters from both are kept (defaults first).
    #[must_use]
    pub fn merged_with(&self, defaults: &RequestOptions) -> RequestOptions {
        let mut headers = defaults.headers.clone();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }

        let query = defaults
            .query
            .iter()
            .chain(self.query.iter())
            .cloned()
            .collect();

        RequestOptions {
            headers,
            query,
            timeout: self.timeout.or(defaults.timeout),
        }
    }
}
