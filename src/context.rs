//! Per-request selection between draft and published records.

use crate::config::Config;

/// Context of a single viewer's request.
///
/// Built once per incoming request and passed explicitly to queries which
/// need to choose between draft and published content.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ViewContext {
    draft_mode: bool,
}

impl ViewContext {
    /// Context of a viewer who only sees published content.
    pub fn public() -> ViewContext {
        ViewContext { draft_mode: false }
    }

    /// Context of a viewer who sees drafts.
    pub fn draft() -> ViewContext {
        ViewContext { draft_mode: true }
    }

    /// Determine context of a request.
    ///
    /// Draft mode is enabled only for staff members, and only when the
    /// configured query parameter is present. `parameters` are names of all
    /// query parameters of the request.
    pub fn for_request<I>(is_staff: bool, parameters: I, config: &Config)
    -> ViewContext
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let requested = parameters.into_iter()
            .any(|name| name.as_ref() == config.draft_mode.parameter);

        ViewContext { draft_mode: is_staff && requested }
    }

    pub fn draft_mode(&self) -> bool {
        self.draft_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_mode_requires_staff_and_parameter() {
        let config = Config::default();

        assert!(ViewContext::for_request(true, &["edit"], &config).draft_mode());
        assert!(!ViewContext::for_request(false, &["edit"], &config).draft_mode());
        assert!(!ViewContext::for_request(true, &["page"], &config).draft_mode());
        assert!(!ViewContext::for_request(true, Vec::<String>::new(), &config)
            .draft_mode());
    }

    #[test]
    fn parameter_is_configurable() {
        let mut config = Config::default();
        config.draft_mode.parameter = "preview".to_string();

        assert!(ViewContext::for_request(true, vec!["preview"], &config).draft_mode());
        assert!(!ViewContext::for_request(true, vec!["edit"], &config).draft_mode());
    }
}
