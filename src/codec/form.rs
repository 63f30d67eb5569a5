//! Form encoders.

use indexmap::IndexMap;

use super::{CodecError, FormEncoder, UnsupportedSnafu};
use crate::template::{Bindings, RequestTemplate};

/// Renders the operation's body template with the form field values. The
/// produced media type stays whatever the template already declares.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFormEncoder;

impl FormEncoder for TemplateFormEncoder {
    fn encode(
        &self,
        fields: &IndexMap<String, String>,
        template: &mut RequestTemplate,
    ) -> Result<(), CodecError> {
        if template.body_template().is_none() {
            return UnsupportedSnafu {
                target: "an operation without a body template",
            }
            .fail();
        }
        let bindings: Bindings = fields
            .iter()
            .map(|(name, value)| (name.clone(), Some(value.clone())))
            .collect();
        template.render_body_template(&bindings);
        Ok(())
    }
}

/// Renders form fields as `application/x-www-form-urlencoded`, discarding any
/// body template.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodedFormEncoder;

impl FormEncoder for UrlEncodedFormEncoder {
    fn encode(
        &self,
        fields: &IndexMap<String, String>,
        template: &mut RequestTemplate,
    ) -> Result<(), CodecError> {
        let body = serde_html_form::to_string(fields)?;
        template.set_body(body, Some("application/x-www-form-urlencoded"));
        Ok(())
    }
}
