//! Targets bind an interface description to a concrete base url.

use crate::contract::InterfaceDesc;
use crate::http::Request;
use crate::template::{RequestTemplate, TemplateError};

/// Rewrites a resolved template into a concrete request.
///
/// The default rewrite prepends the base url unless a url-override argument
/// already made the template absolute. Implementations that sign requests or
/// route per-call can override [`Target::apply`]; they must be safe for
/// concurrent use.
pub trait Target: Send + Sync {
    /// The interface this target serves.
    fn interface(&self) -> &InterfaceDesc;

    /// The base url prepended to relative templates.
    fn base_url(&self) -> &str;

    /// Turns a resolved template into a request.
    ///
    /// # Errors
    ///
    /// [`TemplateError::NotFullyResolved`] when placeholders survived
    /// argument binding.
    fn apply(&self, mut template: RequestTemplate) -> Result<Request, TemplateError> {
        if !template.url().starts_with("http") {
            template.insert_url_prefix(self.base_url());
        }
        template.request()
    }
}

/// A target with a fixed base url and no per-request rewriting.
#[derive(Debug, Clone)]
pub struct HardCodedTarget {
    interface: InterfaceDesc,
    base_url: String,
}

impl HardCodedTarget {
    /// Binds `interface` to `base_url`.
    pub fn new(interface: InterfaceDesc, base_url: impl Into<String>) -> Self {
        Self {
            interface,
            base_url: base_url.into(),
        }
    }
}

impl Target for HardCodedTarget {
    fn interface(&self) -> &InterfaceDesc {
        &self.interface
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> HardCodedTarget {
        HardCodedTarget::new(InterfaceDesc::new("Api"), "http://localhost:8080")
    }

    #[test]
    fn relative_templates_get_the_base_url() {
        let mut template = RequestTemplate::new();
        template.append_url("/users");
        let request = target().apply(template).unwrap();
        assert_eq!(request.url(), "http://localhost:8080/users");
    }

    #[test]
    fn absolute_templates_keep_their_url() {
        let mut template = RequestTemplate::new();
        template.append_url("http://other:9090/users");
        let request = target().apply(template).unwrap();
        assert_eq!(request.url(), "http://other:9090/users");
    }

    #[test]
    fn unresolved_templates_are_rejected() {
        let mut template = RequestTemplate::new();
        template.append_url("/users/{id}");
        assert!(matches!(
            target().apply(template),
            Err(TemplateError::NotFullyResolved { .. })
        ));
    }
}
