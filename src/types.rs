//! Described generic types and supertype resolution.
//!
//! Rust has no runtime generics, so streaming operations describe the
//! observer parameter's type explicitly: a [`TypeExpr`] names the declared
//! type and a [`TypeRegistry`] carries the parameterised supertype chain of
//! any observer subtypes in play. [`TypeRegistry::first_parameter_of_supertype`]
//! resolves the element type a decoder must produce.

use std::collections::HashMap;
use std::fmt;

use snafu::Snafu;

/// A described generic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A named type, possibly parameterised: `String`, `List<String>`.
    Concrete {
        /// The simple type name.
        name: String,
        /// Type arguments in declaration order; empty for raw types.
        args: Vec<TypeExpr>,
    },
    /// A free type variable such as `T`.
    Variable(String),
    /// A wildcard; `upper` is its bound, `None` when unbounded.
    Wildcard {
        /// The upper bound, when one was declared.
        upper: Option<Box<TypeExpr>>,
    },
}

impl TypeExpr {
    /// A parameterised named type.
    pub fn concrete(name: impl Into<String>, args: impl IntoIterator<Item = TypeExpr>) -> Self {
        TypeExpr::Concrete {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// A named type without arguments.
    pub fn simple(name: impl Into<String>) -> Self {
        Self::concrete(name, [])
    }

    /// A free type variable.
    pub fn variable(name: impl Into<String>) -> Self {
        TypeExpr::Variable(name.into())
    }

    /// A wildcard, bounded when `upper` is given.
    #[must_use]
    pub fn wildcard(upper: Option<TypeExpr>) -> Self {
        TypeExpr::Wildcard {
            upper: upper.map(Box::new),
        }
    }

    /// The type name, when this is a concrete type.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeExpr::Concrete { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Concrete { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeExpr::Variable(name) => write!(f, "{name}"),
            TypeExpr::Wildcard { upper: None } => write!(f, "?"),
            TypeExpr::Wildcard { upper: Some(bound) } => write!(f, "? extends {bound}"),
        }
    }
}

/// A declared parameterised interface: its type parameters and the
/// parameterised form of each declared supertype.
#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    /// The interface's simple name.
    pub name: String,
    /// Its declared type parameter names, in order.
    pub type_params: Vec<String>,
    /// Its declared supertypes, parameterised (`Observer<T>`).
    pub supertypes: Vec<TypeExpr>,
}

impl InterfaceDecl {
    /// Declares an interface.
    pub fn new(
        name: impl Into<String>,
        type_params: impl IntoIterator<Item = &'static str>,
        supertypes: impl IntoIterator<Item = TypeExpr>,
    ) -> Self {
        Self {
            name: name.into(),
            type_params: type_params.into_iter().map(str::to_owned).collect(),
            supertypes: supertypes.into_iter().collect(),
        }
    }
}

/// Failures resolving a type argument through a supertype chain.
#[derive(Debug, Snafu)]
pub enum TypeError {
    /// The described type is neither the requested supertype nor one of its
    /// declared subtypes.
    #[snafu(display("{to_resolve} should be assignable from {raw}"))]
    NotAssignable {
        /// The supertype being resolved.
        to_resolve: String,
        /// The described type that is not a subtype.
        raw: String,
    },

    /// The first argument resolved to a free variable the context does not
    /// bind.
    #[snafu(display("cannot resolve type arg {name} on {to_resolve} from {context}"))]
    UnresolvedTypeVariable {
        /// The unresolved variable name.
        name: String,
        /// The supertype being resolved.
        to_resolve: String,
        /// The context the resolution started from.
        context: String,
    },

    /// The first argument is an unbounded wildcard.
    #[snafu(display("unbound type parameter on {context} not supported"))]
    UnboundTypeParameter {
        /// The context the resolution started from.
        context: String,
    },

    /// The context carries no type arguments to resolve from.
    #[snafu(display("{context} is not parameterised"))]
    NotParameterized {
        /// The raw context type.
        context: String,
    },
}

/// Declared interfaces, keyed by simple name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    interfaces: HashMap<String, InterfaceDecl>,
}

impl TypeRegistry {
    /// An empty registry. Resolution against the requested supertype itself
    /// needs no declarations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration, replacing any previous one of the same name.
    pub fn declare(&mut self, decl: InterfaceDecl) -> &mut Self {
        self.interfaces.insert(decl.name.clone(), decl);
        self
    }

    /// Builder-style [`TypeRegistry::declare`].
    #[must_use]
    pub fn with(mut self, decl: InterfaceDecl) -> Self {
        self.declare(decl);
        self
    }

    /// True when `from` is `to` or declares a supertype chain reaching `to`.
    #[must_use]
    pub fn is_assignable(&self, to: &str, from: &str) -> bool {
        if to == from {
            return true;
        }
        let Some(decl) = self.interfaces.get(from) else {
            return false;
        };
        decl.supertypes
            .iter()
            .filter_map(TypeExpr::name)
            .any(|name| self.is_assignable(to, name))
    }

    /// Returns the first type argument of `to_resolve` as it appears in
    /// `raw`'s supertype chain, fully resolved against `context`.
    ///
    /// `context` is the declared type of the value (`Observer<List<String>>`,
    /// or a parameterised subtype); `raw` is its simple name. A wildcard
    /// argument unwraps to its upper bound; a type variable substitutes the
    /// context's first actual argument.
    ///
    /// # Errors
    ///
    /// [`TypeError::NotAssignable`] when `raw` does not reach `to_resolve`;
    /// [`TypeError::UnresolvedTypeVariable`] when the argument stays a free
    /// variable; [`TypeError::UnboundTypeParameter`] for unbounded wildcards.
    pub fn first_parameter_of_supertype(
        &self,
        context: &TypeExpr,
        raw: &str,
        to_resolve: &str,
    ) -> Result<TypeExpr, TypeError> {
        if raw != to_resolve && !self.is_assignable(to_resolve, raw) {
            return NotAssignableSnafu {
                to_resolve,
                raw,
            }
            .fail();
        }
        let parameterised = self.first_generic_super_interface(context, raw, to_resolve)?;
        let TypeExpr::Concrete { args, .. } = &parameterised else {
            return NotParameterizedSnafu {
                context: context.to_string(),
            }
            .fail();
        };
        let first = args.first().ok_or_else(|| TypeError::NotParameterized {
            context: context.to_string(),
        })?;
        let mut arg = self.first_upper_bound_if_wildcard(context, first.clone())?;
        // An unresolved variable (ex. T) substitutes the first actual
        // argument of the outer context instead.
        if let TypeExpr::Variable(_) = &arg
            && let TypeExpr::Concrete { args: outer, .. } = context
            && let Some(actual) = outer.first()
        {
            arg = self.first_upper_bound_if_wildcard(context, actual.clone())?;
        }
        if let TypeExpr::Variable(name) = &arg {
            return UnresolvedTypeVariableSnafu {
                name,
                to_resolve,
                context: context.to_string(),
            }
            .fail();
        }
        Ok(arg)
    }

    /// Unwraps `? extends X` to `X`; rejects unbounded wildcards.
    fn first_upper_bound_if_wildcard(
        &self,
        context: &TypeExpr,
        arg: TypeExpr,
    ) -> Result<TypeExpr, TypeError> {
        match arg {
            TypeExpr::Wildcard { upper: Some(bound) } => Ok(*bound),
            TypeExpr::Wildcard { upper: None } => UnboundTypeParameterSnafu {
                context: context.to_string(),
            }
            .fail(),
            other => Ok(other),
        }
    }

    /// Depth-first walk to the parameterised form of `super_interface` in
    /// `raw`'s declared supertype chain.
    fn first_generic_super_interface(
        &self,
        context: &TypeExpr,
        raw: &str,
        super_interface: &str,
    ) -> Result<TypeExpr, TypeError> {
        if super_interface == raw {
            return Ok(context.clone());
        }
        let decl = self
            .interfaces
            .get(raw)
            .ok_or_else(|| TypeError::NotAssignable {
                to_resolve: super_interface.to_owned(),
                raw: raw.to_owned(),
            })?;
        for supertype in &decl.supertypes {
            let Some(name) = supertype.name() else {
                continue;
            };
            if name == super_interface {
                return Ok(supertype.clone());
            }
            if self.is_assignable(super_interface, name) {
                return self.first_generic_super_interface(supertype, name, super_interface);
            }
        }
        NotAssignableSnafu {
            to_resolve: super_interface,
            raw,
        }
        .fail()
    }
}
