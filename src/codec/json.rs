//! JSON codecs built on `serde_json`.

use bytes::Bytes;
use serde_json::Value;

use super::{BodyEncoder, CodecError, Decoder, ObserverDecoder, UnsupportedArgumentSnafu};
use crate::bind::Arg;
use crate::contract::DecodeTarget;
use crate::observer::{Element, Observer};
use crate::template::RequestTemplate;
use crate::types::TypeExpr;

/// Decodes JSON bodies, directed by the described target type.
///
/// `String` decodes to [`String`], `List<String>` to `Vec<String>`; any other
/// target is boxed as a raw [`serde_json::Value`] for the caller to take
/// apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, body: &Bytes, target: &DecodeTarget) -> Result<Element, CodecError> {
        let value: Value = serde_json::from_slice(body)?;
        element_of(target, value)
    }
}

/// Streams the elements of a top-level JSON array, one `on_next` per element.
/// A non-array body is pushed as a single element.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArrayObserverDecoder;

impl ObserverDecoder for JsonArrayObserverDecoder {
    fn decode(
        &self,
        body: &Bytes,
        target: &DecodeTarget,
        observer: &dyn Observer,
    ) -> Result<(), CodecError> {
        let value: Value = serde_json::from_slice(body)?;
        let elements = match value {
            Value::Array(items) => items,
            single => vec![single],
        };
        for item in elements {
            let element = element_of(target, item)?;
            observer
                .on_next(element)
                .map_err(|source| CodecError::Callback { source })?;
        }
        Ok(())
    }
}

/// Boxes a parsed value as the element shape the target type calls for.
fn element_of(target: &DecodeTarget, value: Value) -> Result<Element, CodecError> {
    let DecodeTarget::Type(ty) = target else {
        return Ok(Box::new(value));
    };
    match ty {
        TypeExpr::Concrete { name, args } if name == "String" && args.is_empty() => {
            let text: String = serde_json::from_value(value)?;
            Ok(Box::new(text))
        }
        TypeExpr::Concrete { name, args }
            if name == "List" && args == &[TypeExpr::simple("String")] =>
        {
            let items: Vec<String> = serde_json::from_value(value)?;
            Ok(Box::new(items))
        }
        _ => Ok(Box::new(value)),
    }
}

/// Encodes a body argument as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBodyEncoder;

impl BodyEncoder for JsonBodyEncoder {
    fn encode(&self, value: &Arg, template: &mut RequestTemplate) -> Result<(), CodecError> {
        match value {
            Arg::Body(json) => {
                let rendered = serde_json::to_vec(json)?;
                template.set_body(rendered, Some("application/json"));
                Ok(())
            }
            Arg::Bytes(bytes) => {
                template.set_body(bytes.clone(), Some("application/json"));
                Ok(())
            }
            Arg::Text(text) => {
                template.set_body(text.clone(), Some("application/json"));
                Ok(())
            }
            _ => UnsupportedArgumentSnafu {
                expected: "a JSON value, bytes or text body",
            }
            .fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list_string() -> DecodeTarget {
        DecodeTarget::Type(TypeExpr::concrete("List", [TypeExpr::simple("String")]))
    }

    #[test]
    fn string_target_decodes_to_string() {
        let element = JsonDecoder
            .decode(
                &Bytes::from_static(b"\"hello\""),
                &DecodeTarget::Type(TypeExpr::simple("String")),
            )
            .unwrap();
        assert_eq!(*element.downcast::<String>().unwrap(), "hello");
    }

    #[test]
    fn list_of_string_target_decodes_to_vec() {
        let element = JsonDecoder
            .decode(&Bytes::from_static(b"[\"a\",\"b\"]"), &list_string())
            .unwrap();
        assert_eq!(*element.downcast::<Vec<String>>().unwrap(), ["a", "b"]);
    }

    #[test]
    fn other_targets_decode_to_raw_values() {
        let element = JsonDecoder
            .decode(
                &Bytes::from_static(b"{\"login\":\"octocat\"}"),
                &DecodeTarget::Type(TypeExpr::simple("Contributor")),
            )
            .unwrap();
        let value = element.downcast::<Value>().unwrap();
        assert_eq!(*value, json!({"login": "octocat"}));
    }

    #[test]
    fn array_observer_decoder_pushes_one_element_per_item() {
        let (observer, mut rx) = crate::observer::ChannelObserver::new();
        JsonArrayObserverDecoder
            .decode(
                &Bytes::from_static(b"[[\"a\"],[\"b\",\"c\"]]"),
                &list_string(),
                &observer,
            )
            .unwrap();
        let mut seen = Vec::new();
        while let Ok(crate::observer::StreamEvent::Next(element)) = rx.try_recv() {
            seen.push(*element.downcast::<Vec<String>>().unwrap());
        }
        assert_eq!(seen, [vec!["a".to_owned()], vec!["b".to_owned(), "c".to_owned()]]);
    }

    #[test]
    fn callback_rejection_stops_the_decode() {
        let (observer, rx) = crate::observer::ChannelObserver::new();
        drop(rx);
        let err = JsonArrayObserverDecoder
            .decode(
                &Bytes::from_static(b"[\"a\",\"b\"]"),
                &DecodeTarget::Type(TypeExpr::simple("String")),
                &observer,
            )
            .unwrap_err();
        assert!(matches!(err, CodecError::Callback { .. }));
    }

    #[test]
    fn body_encoder_renders_json_and_sets_content_type_once() {
        let mut template = RequestTemplate::new();
        JsonBodyEncoder
            .encode(&Arg::Body(json!({"name": "denominator"})), &mut template)
            .unwrap();
        assert_eq!(
            template.body().map(|b| b.as_ref()),
            Some(br#"{"name":"denominator"}"#.as_ref())
        );
        assert_eq!(template.headers()["Content-Type"], vec!["application/json"]);

        let mut xml = RequestTemplate::new();
        xml.header("Content-Type", ["application/xml"]);
        JsonBodyEncoder
            .encode(&Arg::Body(json!({})), &mut xml)
            .unwrap();
        assert_eq!(xml.headers()["Content-Type"], vec!["application/xml"]);
    }

    #[test]
    fn observer_argument_is_not_a_body() {
        let mut template = RequestTemplate::new();
        let err = JsonBodyEncoder
            .encode(&Arg::Null, &mut template)
            .unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedArgument { .. }));
    }
}
