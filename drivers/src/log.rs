/// Logging context handed to each component at construction.
///
/// Components open a span named after themselves so that every event carries
/// `component` and, when set, the session `tag`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Context {
    pub tag: Option<String>,
}

impl Context {
    pub fn new(tag: Option<String>) -> Self {
        Self { tag }
    }

    pub fn span(&self, component: &'static str) -> tracing::Span {
        match &self.tag {
            Some(tag) => tracing::info_span!("nscamera", component, tag = tag.as_str()),
            None => tracing::info_span!("nscamera", component),
        }
    }
}
