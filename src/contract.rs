//! Parsing described interfaces into per-operation metadata.
//!
//! A user describes an API as an [`InterfaceDesc`]: one [`MethodDesc`] per
//! operation, each carrying an HTTP verb marker, an optional path, and a role
//! marker per parameter. The [`Contract`] turns each description into an
//! immutable [`MethodMetadata`] holding the operation's request template and
//! its parameter-to-placeholder map.

use indexmap::IndexMap;
use snafu::{ResultExt, Snafu};

use crate::template::{CONTENT_TYPE, RequestTemplate, placeholder_names};
use crate::types::{TypeError, TypeExpr, TypeRegistry};

/// Simple name of the observer interface in type descriptions.
pub const OBSERVER_INTERFACE: &str = "Observer";

/// A described API interface: a name plus one description per operation.
#[derive(Debug, Clone)]
pub struct InterfaceDesc {
    name: String,
    methods: Vec<MethodDesc>,
}

impl InterfaceDesc {
    /// Starts a description for the interface of the given simple name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Adds an operation.
    #[must_use]
    pub fn op(mut self, method: MethodDesc) -> Self {
        self.methods.push(method);
        self
    }

    /// The interface's simple name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The described operations.
    #[must_use]
    pub fn methods(&self) -> &[MethodDesc] {
        &self.methods
    }
}

/// The declared return of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReturnKind {
    /// No return value.
    #[default]
    Unit,
    /// The raw response, body ownership transferred to the caller.
    Response,
    /// A decoded value of the described type.
    Type(TypeExpr),
}

/// One described operation.
#[derive(Debug, Clone)]
pub struct MethodDesc {
    name: String,
    verbs: Vec<String>,
    path: Option<String>,
    produces: Option<String>,
    body: Option<String>,
    params: Vec<ParamDesc>,
    returns: ReturnKind,
}

impl MethodDesc {
    /// Starts a description for the operation of the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verbs: Vec::new(),
            path: None,
            produces: None,
            body: None,
            params: Vec::new(),
            returns: ReturnKind::Unit,
        }
    }

    /// Marks the operation with an HTTP verb. Exactly one verb marker must be
    /// present when the contract parses the operation.
    #[must_use]
    pub fn verb(mut self, verb: impl Into<String>) -> Self {
        self.verbs.push(verb.into());
        self
    }

    /// GET verb marker.
    #[must_use]
    pub fn get(self) -> Self {
        self.verb("GET")
    }

    /// POST verb marker.
    #[must_use]
    pub fn post(self) -> Self {
        self.verb("POST")
    }

    /// PUT verb marker.
    #[must_use]
    pub fn put(self) -> Self {
        self.verb("PUT")
    }

    /// DELETE verb marker.
    #[must_use]
    pub fn delete(self) -> Self {
        self.verb("DELETE")
    }

    /// HEAD verb marker.
    #[must_use]
    pub fn head(self) -> Self {
        self.verb("HEAD")
    }

    /// OPTIONS verb marker.
    #[must_use]
    pub fn options(self) -> Self {
        self.verb("OPTIONS")
    }

    /// Path marker, appended to the template url. A query portion is lifted
    /// into the query multimap.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Produced-media-type marker, written to the `Content-Type` header.
    #[must_use]
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces = Some(media_type.into());
        self
    }

    /// Body marker. A value containing `{name}` placeholders becomes the
    /// body template; anything else is a literal body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a parameter description.
    #[must_use]
    pub fn param(mut self, param: ParamDesc) -> Self {
        self.params.push(param);
        self
    }

    /// Declares the operation's return.
    #[must_use]
    pub fn returns(mut self, returns: ReturnKind) -> Self {
        self.returns = returns;
        self
    }

    /// The operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The role a parameter plays in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// The argument is a full base URI overriding the target's base url.
    BaseUrl,
    /// A named path parameter feeding a `{name}` placeholder in the url.
    Path(String),
    /// A named query parameter; the contract adds a `{name}` query value.
    Query(String),
    /// A named header parameter; the contract adds a `{name}` header value.
    Header(String),
    /// A named form parameter rendered by the form encoder.
    Form(String),
    /// The streaming observer. Must be the last parameter.
    Observer,
}

/// One described parameter: its simple type name (for the config key) and
/// its role markers. An unmarked parameter is the raw body argument.
#[derive(Debug, Clone)]
pub struct ParamDesc {
    type_name: String,
    roles: Vec<Role>,
    generic: Option<TypeExpr>,
}

impl ParamDesc {
    /// Describes a parameter of the given simple type name.
    pub fn of(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            roles: Vec::new(),
            generic: None,
        }
    }

    /// Marks this parameter as the base-url override.
    #[must_use]
    pub fn base_url(mut self) -> Self {
        self.roles.push(Role::BaseUrl);
        self
    }

    /// Marks this parameter as a named path parameter.
    #[must_use]
    pub fn path(mut self, name: impl Into<String>) -> Self {
        self.roles.push(Role::Path(name.into()));
        self
    }

    /// Marks this parameter as a named query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>) -> Self {
        self.roles.push(Role::Query(name.into()));
        self
    }

    /// Marks this parameter as a named header parameter.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.roles.push(Role::Header(name.into()));
        self
    }

    /// Marks this parameter as a named form parameter.
    #[must_use]
    pub fn form(mut self, name: impl Into<String>) -> Self {
        self.roles.push(Role::Form(name.into()));
        self
    }

    /// Marks this parameter as the observer, with its declared generic type
    /// (`Observer<List<String>>` or a described subtype).
    #[must_use]
    pub fn observer(mut self, declared: TypeExpr) -> Self {
        self.roles.push(Role::Observer);
        self.generic = Some(declared);
        self
    }

    /// The parameter's simple type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// What a success response decodes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeTarget {
    /// Nothing; the body is drained.
    Unit,
    /// The raw response itself.
    Response,
    /// A value of the described type.
    Type(TypeExpr),
}

/// Immutable record of one parsed operation.
#[derive(Debug, Clone)]
pub struct MethodMetadata {
    config_key: String,
    name: String,
    template: RequestTemplate,
    url_index: Option<usize>,
    observer_index: Option<usize>,
    body_index: Option<usize>,
    form_params: Vec<String>,
    index_to_name: IndexMap<usize, Vec<String>>,
    decode_into: DecodeTarget,
}

impl MethodMetadata {
    /// Canonical operation identity, see [`config_key`].
    #[must_use]
    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    /// The operation name used for dispatch.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The frozen request template.
    #[must_use]
    pub fn template(&self) -> &RequestTemplate {
        &self.template
    }

    /// Index of the base-url override argument, when declared.
    #[must_use]
    pub fn url_index(&self) -> Option<usize> {
        self.url_index
    }

    /// Index of the observer argument, when declared.
    #[must_use]
    pub fn observer_index(&self) -> Option<usize> {
        self.observer_index
    }

    /// Index of the raw body argument, when declared.
    #[must_use]
    pub fn body_index(&self) -> Option<usize> {
        self.body_index
    }

    /// Names of form-encoded parameters, in declaration order.
    #[must_use]
    pub fn form_params(&self) -> &[String] {
        &self.form_params
    }

    /// Placeholder names supplied by each argument position.
    #[must_use]
    pub fn index_to_name(&self) -> &IndexMap<usize, Vec<String>> {
        &self.index_to_name
    }

    /// What a success response decodes into.
    #[must_use]
    pub fn decode_into(&self) -> &DecodeTarget {
        &self.decode_into
    }
}

/// Formats the canonical identity of an operation:
/// `<SimpleInterfaceName>#<methodName>(<SimpleParamType1>,…)`.
///
/// Examples: `Route53#list()`, `GitHub#contributors(String,String)`. The key
/// carries no whitespace and is the stable lookup key for per-operation
/// collaborators.
pub fn config_key<'a>(
    interface: &str,
    method: &str,
    param_types: impl IntoIterator<Item = &'a str>,
) -> String {
    let params: Vec<&str> = param_types.into_iter().collect();
    format!("{interface}#{method}({})", params.join(","))
}

/// Failures parsing an interface description or wiring its handlers.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ContractError {
    /// An operation carries zero or several HTTP verb markers.
    #[snafu(display("{config_key} must carry exactly one verb marker, found {count}"))]
    MissingOrAmbiguousVerb {
        /// The offending operation.
        config_key: String,
        /// How many verb markers were found.
        count: usize,
    },

    /// An operation takes an observer but declares a return value.
    #[snafu(display("{config_key} takes an observer and must return unit"))]
    ObserverMethodMustReturnVoid {
        /// The offending operation.
        config_key: String,
    },

    /// The observer is not the last parameter.
    #[snafu(display("the observer of {config_key} must be the last parameter"))]
    ObserverMustBeLast {
        /// The offending operation.
        config_key: String,
    },

    /// More than one unmarked (body) parameter.
    #[snafu(display("{config_key} has more than one body parameter"))]
    MultipleBodyArguments {
        /// The offending operation.
        config_key: String,
    },

    /// More than one base-url override parameter.
    #[snafu(display("{config_key} has more than one base-url parameter"))]
    MultipleUrlArguments {
        /// The offending operation.
        config_key: String,
    },

    /// A parameter mixes a named role with a url/observer role.
    #[snafu(display("parameter {index} of {config_key} mixes conflicting roles"))]
    ConflictingParameterRoles {
        /// The offending operation.
        config_key: String,
        /// The offending parameter position.
        index: usize,
    },

    /// A placeholder outside the query multimap has no named parameter.
    #[snafu(display("{config_key} never binds template parameter {name}"))]
    MissingNamedParameter {
        /// The offending operation.
        config_key: String,
        /// The unbound placeholder.
        name: String,
    },

    /// Resolving the observer's element type failed.
    #[snafu(display("cannot resolve the observer element type of {config_key}"))]
    ElementType {
        /// The offending operation.
        config_key: String,
        /// The underlying resolution failure.
        source: TypeError,
    },

    /// A synchronous operation with a typed return has no decoder registered.
    #[snafu(display("no decoder registered for {config_key}"))]
    NoDecoderForOperation {
        /// The unmapped operation.
        config_key: String,
    },

    /// A streaming operation with a typed element has no observer decoder.
    #[snafu(display("no observer decoder registered for {config_key}"))]
    NoObserverDecoderForOperation {
        /// The unmapped operation.
        config_key: String,
    },

    /// An operation with a raw body argument has no body encoder.
    #[snafu(display("no body encoder registered for {config_key}"))]
    NoBodyEncoderForOperation {
        /// The unmapped operation.
        config_key: String,
    },

    /// An operation with form parameters has no form encoder.
    #[snafu(display("no form encoder registered for {config_key}"))]
    NoFormEncoderForOperation {
        /// The unmapped operation.
        config_key: String,
    },
}

/// Parses interface descriptions into operation metadata.
pub trait Contract: Send + Sync {
    /// Parses every operation of `interface`.
    ///
    /// # Errors
    ///
    /// The first [`ContractError`] encountered, construction being all-or-nothing.
    fn parse(&self, interface: &InterfaceDesc) -> Result<Vec<MethodMetadata>, ContractError>;
}

/// The default contract vocabulary.
#[derive(Debug, Clone, Default)]
pub struct DefaultContract {
    registry: TypeRegistry,
}

impl DefaultContract {
    /// A contract that resolves observer element types against an empty
    /// registry; plain `Observer<T>` parameters need no declarations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A contract resolving observer subtypes against the given registry.
    #[must_use]
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    /// Parses a single operation.
    ///
    /// # Errors
    ///
    /// Any [`ContractError`] the description violates.
    pub fn parse_method(
        &self,
        interface: &InterfaceDesc,
        method: &MethodDesc,
    ) -> Result<MethodMetadata, ContractError> {
        let key = config_key(
            interface.name(),
            &method.name,
            method.params.iter().map(|p| p.type_name.as_str()),
        );

        if method.verbs.len() != 1 {
            return MissingOrAmbiguousVerbSnafu {
                config_key: key,
                count: method.verbs.len(),
            }
            .fail();
        }
        let mut template = RequestTemplate::new();
        template.set_method(method.verbs[0].clone());
        if let Some(path) = &method.path {
            template.append_url(path);
        }
        if let Some(media_type) = &method.produces {
            template.header(CONTENT_TYPE, [media_type.clone()]);
        }
        if let Some(body) = &method.body {
            if placeholder_names(body).next().is_some() {
                template.set_body_template(body.clone());
            } else {
                template.set_body(body.clone(), None);
            }
        }

        let mut url_index = None;
        let mut observer_index = None;
        let mut body_index = None;
        let mut form_params: Vec<String> = Vec::new();
        let mut index_to_name: IndexMap<usize, Vec<String>> = IndexMap::new();
        let mut decode_into = None;

        let mut record = |index: usize, name: &str| {
            let names = index_to_name.entry(index).or_default();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        };

        for (index, param) in method.params.iter().enumerate() {
            if param.roles.is_empty() {
                if body_index.is_some() {
                    return MultipleBodyArgumentsSnafu { config_key: key }.fail();
                }
                body_index = Some(index);
                continue;
            }
            for role in &param.roles {
                match role {
                    Role::BaseUrl => {
                        if url_index.is_some() {
                            return MultipleUrlArgumentsSnafu { config_key: key }.fail();
                        }
                        url_index = Some(index);
                    }
                    Role::Path(name) => record(index, name),
                    Role::Query(name) => {
                        template.query(name.clone(), [format!("{{{name}}}")]);
                        record(index, name);
                    }
                    Role::Header(name) => {
                        template.header(name.clone(), [format!("{{{name}}}")]);
                        record(index, name);
                    }
                    Role::Form(name) => {
                        if !form_params.iter().any(|n| n == name) {
                            form_params.push(name.clone());
                        }
                        record(index, name);
                    }
                    Role::Observer => {
                        observer_index = Some(index);
                        let declared = param
                            .generic
                            .clone()
                            .unwrap_or_else(|| TypeExpr::simple(param.type_name.clone()));
                        let raw = declared.name().unwrap_or(OBSERVER_INTERFACE).to_owned();
                        let element = self
                            .registry
                            .first_parameter_of_supertype(&declared, &raw, OBSERVER_INTERFACE)
                            .context(ElementTypeSnafu {
                                config_key: key.clone(),
                            })?;
                        decode_into = Some(match element.name() {
                            Some("Void" | "Unit") => DecodeTarget::Unit,
                            Some("Response") => DecodeTarget::Response,
                            _ => DecodeTarget::Type(element),
                        });
                    }
                }
            }
        }

        let decode_into = match (observer_index, &method.returns) {
            (Some(_), _) => decode_into.unwrap_or(DecodeTarget::Unit),
            (None, ReturnKind::Unit) => DecodeTarget::Unit,
            (None, ReturnKind::Response) => DecodeTarget::Response,
            (None, ReturnKind::Type(ty)) => DecodeTarget::Type(ty.clone()),
        };

        if let Some(observer) = observer_index {
            if method.returns != ReturnKind::Unit {
                return ObserverMethodMustReturnVoidSnafu { config_key: key }.fail();
            }
            if observer + 1 != method.params.len() {
                return ObserverMustBeLastSnafu { config_key: key }.fail();
            }
        }
        for special in [url_index, observer_index, body_index].into_iter().flatten() {
            if index_to_name.contains_key(&special) {
                return ConflictingParameterRolesSnafu {
                    config_key: key,
                    index: special,
                }
                .fail();
            }
        }

        // Placeholders in the url, headers and body template must be fed by a
        // named parameter; only query values may stay templates.
        let bound: Vec<&String> = index_to_name.values().flatten().collect();
        let require_bound = |input: &str| -> Result<(), ContractError> {
            for name in placeholder_names(input) {
                if !bound.iter().any(|b| *b == name) {
                    return MissingNamedParameterSnafu {
                        config_key: key.clone(),
                        name,
                    }
                    .fail();
                }
            }
            Ok(())
        };
        require_bound(template.url())?;
        for values in template.headers().values() {
            for value in values {
                require_bound(value)?;
            }
        }
        if let Some(body_template) = template.body_template() {
            require_bound(body_template)?;
        }

        Ok(MethodMetadata {
            config_key: key,
            name: method.name.clone(),
            template,
            url_index,
            observer_index,
            body_index,
            form_params,
            index_to_name,
            decode_into,
        })
    }
}

impl Contract for DefaultContract {
    fn parse(&self, interface: &InterfaceDesc) -> Result<Vec<MethodMetadata>, ContractError> {
        interface
            .methods()
            .iter()
            .map(|method| self.parse_method(interface, method))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InterfaceDecl;

    fn contract() -> DefaultContract {
        DefaultContract::new()
    }

    fn parse(method: MethodDesc) -> Result<MethodMetadata, ContractError> {
        let interface = InterfaceDesc::new("TestInterface");
        contract().parse_method(&interface, &method)
    }

    fn list_string() -> TypeExpr {
        TypeExpr::concrete("List", [TypeExpr::simple("String")])
    }

    #[test]
    fn http_verbs_parse_into_template_methods() {
        for verb in ["GET", "POST", "PUT", "DELETE"] {
            let md = parse(MethodDesc::new(verb.to_lowercase()).verb(verb)).unwrap();
            assert_eq!(md.template().method(), verb);
            assert_eq!(md.template().url(), "");
            assert!(md.template().queries().is_empty());
            assert!(md.template().headers().is_empty());
            assert!(md.template().body().is_none());
        }
    }

    #[test]
    fn custom_verb_with_url_parameter() {
        let md = parse(
            MethodDesc::new("patch")
                .verb("PATCH")
                .param(ParamDesc::of("URI").base_url())
                .returns(ReturnKind::Response),
        )
        .unwrap();
        assert_eq!(md.template().method(), "PATCH");
        assert_eq!(md.template().url(), "");
        assert!(md.template().queries().is_empty());
        assert!(md.template().headers().is_empty());
        assert_eq!(md.url_index(), Some(0));
        assert!(md.index_to_name().is_empty());
    }

    #[test]
    fn queries_in_the_path_are_lifted() {
        let md = parse(
            MethodDesc::new("empty")
                .get()
                .path("/?flag&Action=GetUser&Version=2010-05-08")
                .returns(ReturnKind::Response),
        )
        .unwrap();
        assert_eq!(md.template().url(), "/");
        assert_eq!(md.template().queries()["flag"], Vec::<String>::new());
        assert_eq!(md.template().queries()["Action"], vec!["GetUser"]);
        assert_eq!(md.template().queries()["Version"], vec!["2010-05-08"]);
        assert_eq!(
            md.template().to_string(),
            "GET /?flag&Action=GetUser&Version=2010-05-08 HTTP/1.1\n"
        );
    }

    #[test]
    fn path_and_query_parameters_mix() {
        let md = parse(
            MethodDesc::new("recordsByNameAndType")
                .get()
                .path("/domains/{domainId}/records")
                .param(ParamDesc::of("int").path("domainId"))
                .param(ParamDesc::of("String").query("name"))
                .param(ParamDesc::of("String").query("type"))
                .returns(ReturnKind::Response),
        )
        .unwrap();
        assert!(md.template().body().is_none());
        assert!(md.template().body_template().is_none());
        assert!(md.template().headers().is_empty());
        assert_eq!(md.template().url(), "/domains/{domainId}/records");
        assert_eq!(md.template().queries()["name"], vec!["{name}"]);
        assert_eq!(md.template().queries()["type"], vec!["{type}"]);
        assert_eq!(md.index_to_name()[&0], vec!["domainId"]);
        assert_eq!(md.index_to_name()[&1], vec!["name"]);
        assert_eq!(md.index_to_name()[&2], vec!["type"]);
        assert_eq!(
            md.template().to_string(),
            "GET /domains/{domainId}/records?name={name}&type={type} HTTP/1.1\n"
        );
    }

    #[test]
    fn form_parameters_keep_declaration_order() {
        let md = parse(
            MethodDesc::new("login")
                .post()
                .body(
                    "%7B\"customer_name\": \"{customer_name}\", \"user_name\": \"{user_name}\", \
                     \"password\": \"{password}\"%7D",
                )
                .param(ParamDesc::of("String").form("customer_name"))
                .param(ParamDesc::of("String").form("user_name"))
                .param(ParamDesc::of("String").form("password")),
        )
        .unwrap();
        assert!(md.template().body().is_none());
        assert!(md.template().body_template().is_some());
        assert_eq!(md.form_params(), ["customer_name", "user_name", "password"]);
        assert_eq!(md.index_to_name()[&0], vec!["customer_name"]);
        assert_eq!(md.index_to_name()[&2], vec!["password"]);
    }

    #[test]
    fn parameter_free_body_is_literal() {
        let md = parse(
            MethodDesc::new("post")
                .post()
                .produces("application/xml")
                .body("<v01:getAccountsListOfUser/>")
                .returns(ReturnKind::Response),
        )
        .unwrap();
        assert_eq!(
            md.template().body().map(|b| b.as_ref()),
            Some("<v01:getAccountsListOfUser/>".as_bytes())
        );
        assert!(md.template().body_template().is_none());
        assert!(md.form_params().is_empty());
        assert!(md.index_to_name().is_empty());
        assert_eq!(
            md.template().headers()["Content-Type"],
            vec!["application/xml"]
        );
    }

    #[test]
    fn header_parameters_template_their_values() {
        let md = parse(
            MethodDesc::new("logout")
                .post()
                .param(ParamDesc::of("String").header("Auth-Token")),
        )
        .unwrap();
        assert_eq!(md.template().headers()["Auth-Token"], vec!["{Auth-Token}"]);
        assert_eq!(md.index_to_name()[&0], vec!["Auth-Token"]);
    }

    #[test]
    fn observer_element_type_resolves_through_the_chain() {
        let registry = TypeRegistry::new().with(InterfaceDecl::new(
            "ParameterizedObserver",
            ["T"],
            [TypeExpr::concrete(
                OBSERVER_INTERFACE,
                [TypeExpr::variable("T")],
            )],
        ));
        let contract = DefaultContract::with_registry(registry);
        let interface = InterfaceDesc::new("WithObserver");

        let declared = [
            TypeExpr::concrete(OBSERVER_INTERFACE, [list_string()]),
            TypeExpr::concrete(
                OBSERVER_INTERFACE,
                [TypeExpr::wildcard(Some(list_string()))],
            ),
            TypeExpr::concrete("ParameterizedObserver", [list_string()]),
        ];
        for ty in declared {
            let name = ty.name().unwrap().to_owned();
            let md = contract
                .parse_method(
                    &interface,
                    &MethodDesc::new("valid")
                        .get()
                        .path("/")
                        .param(ParamDesc::of(name).observer(ty)),
                )
                .unwrap();
            assert_eq!(md.observer_index(), Some(0));
            assert_eq!(md.decode_into(), &DecodeTarget::Type(list_string()));
        }
    }

    #[test]
    fn observer_must_be_last() {
        let err = parse(
            MethodDesc::new("badOrder")
                .get()
                .path("/{path}")
                .param(
                    ParamDesc::of("Observer")
                        .observer(TypeExpr::concrete(OBSERVER_INTERFACE, [list_string()])),
                )
                .param(ParamDesc::of("String").path("path")),
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::ObserverMustBeLast { .. }));
        assert!(err.to_string().contains("the last parameter"));
    }

    #[test]
    fn observer_method_must_return_unit() {
        let err = parse(
            MethodDesc::new("returnType")
                .get()
                .path("/")
                .param(
                    ParamDesc::of("Observer")
                        .observer(TypeExpr::concrete(OBSERVER_INTERFACE, [list_string()])),
                )
                .returns(ReturnKind::Response),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContractError::ObserverMethodMustReturnVoid { .. }
        ));
    }

    #[test]
    fn zero_or_two_verb_markers_are_rejected() {
        let err = parse(MethodDesc::new("naked")).unwrap_err();
        assert!(matches!(
            err,
            ContractError::MissingOrAmbiguousVerb { count: 0, .. }
        ));

        let err = parse(MethodDesc::new("both").get().post()).unwrap_err();
        assert!(matches!(
            err,
            ContractError::MissingOrAmbiguousVerb { count: 2, .. }
        ));
    }

    #[test]
    fn unbound_path_placeholder_is_rejected() {
        let err = parse(MethodDesc::new("broken").get().path("/{id}")).unwrap_err();
        assert!(matches!(
            err,
            ContractError::MissingNamedParameter { ref name, .. } if name == "id"
        ));
    }

    #[test]
    fn second_body_parameter_is_rejected() {
        let err = parse(
            MethodDesc::new("twoBodies")
                .post()
                .param(ParamDesc::of("A"))
                .param(ParamDesc::of("B")),
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::MultipleBodyArguments { .. }));
    }

    #[test]
    fn config_keys_format_without_whitespace() {
        assert_eq!(config_key("Route53", "list", []), "Route53#list()");
        assert_eq!(
            config_key("GitHub", "contributors", ["String", "String"]),
            "GitHub#contributors(String,String)"
        );
        assert_eq!(
            config_key("TestInterface", "uriParam", ["String", "URI", "String"]),
            "TestInterface#uriParam(String,URI,String)"
        );
    }

    #[test]
    fn placeholders_match_named_parameters_and_special_indexes_stay_disjoint() {
        let md = parse(
            MethodDesc::new("record")
                .put()
                .path("/zones/{zone}/records/{id}")
                .param(ParamDesc::of("String").path("zone"))
                .param(ParamDesc::of("String").path("id"))
                .param(ParamDesc::of("Record"))
                .returns(ReturnKind::Response),
        )
        .unwrap();
        let mut placeholders: Vec<String> =
            placeholder_names(md.template().url()).map(str::to_owned).collect();
        placeholders.sort_unstable();
        let mut bound: Vec<String> = md
            .index_to_name()
            .values()
            .flatten()
            .cloned()
            .collect();
        bound.sort_unstable();
        assert_eq!(placeholders, bound);
        assert_eq!(md.body_index(), Some(2));
        assert!(!md.index_to_name().contains_key(&2));
    }
}
