use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::common_struct;

pub const CORE_NAMESPACE: &str = "core";
pub const LINQ_NAMESPACE: &str = "rq.linq";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Structural, build-independent description of a type.
///
/// Two descriptors denote the same type exactly when they are equal; nothing
/// here refers to a runtime handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_arguments: Vec<TypeDescriptor>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_array: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_anonymous: bool,
    /// Declared property set. Present for anonymous shapes and for types the
    /// receiving side is not expected to know, so they can be emitted there.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Lookup key used by registries: identity without the property set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    pub namespace: Option<String>,
    pub name: String,
    pub arity: usize,
}

impl TypeDescriptor {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            generic_arguments: Vec::new(),
            is_array: false,
            is_anonymous: false,
            properties: Vec::new(),
        }
    }

    pub fn generic(
        namespace: impl Into<String>,
        name: impl Into<String>,
        arguments: impl IntoIterator<Item = TypeDescriptor>,
    ) -> Self {
        let mut ty = Self::new(namespace, name);
        ty.generic_arguments = arguments.into_iter().collect();
        ty
    }

    /// Placeholder for the `index`th generic parameter of an open signature.
    pub fn generic_param(index: usize) -> Self {
        Self {
            name: format!("!{index}"),
            namespace: None,
            generic_arguments: Vec::new(),
            is_array: false,
            is_anonymous: false,
            properties: Vec::new(),
        }
    }

    pub fn anonymous(properties: impl IntoIterator<Item = PropertyDescriptor>) -> Self {
        Self {
            name: "AnonymousType".to_string(),
            namespace: None,
            generic_arguments: Vec::new(),
            is_array: false,
            is_anonymous: true,
            properties: properties.into_iter().collect(),
        }
    }

    pub fn bool() -> Self {
        Self::new(CORE_NAMESPACE, "bool")
    }
    pub fn int() -> Self {
        Self::new(CORE_NAMESPACE, "i64")
    }
    pub fn float() -> Self {
        Self::new(CORE_NAMESPACE, "f64")
    }
    pub fn string() -> Self {
        Self::new(CORE_NAMESPACE, "string")
    }
    pub fn char() -> Self {
        Self::new(CORE_NAMESPACE, "char")
    }
    pub fn any() -> Self {
        Self::new(CORE_NAMESPACE, "any")
    }

    pub fn seq(element: TypeDescriptor) -> Self {
        Self::generic(CORE_NAMESPACE, "Seq", [element])
    }
    pub fn queryable(element: TypeDescriptor) -> Self {
        Self::generic(CORE_NAMESPACE, "Queryable", [element])
    }
    pub fn grouping(key: TypeDescriptor, element: TypeDescriptor) -> Self {
        let mut ty = Self::generic(CORE_NAMESPACE, "Grouping", [key.clone(), element.clone()]);
        ty.is_anonymous = true;
        ty.properties = vec![
            PropertyDescriptor::new("Key", key),
            PropertyDescriptor::new("Elements", Self::seq(element)),
        ];
        ty
    }
    /// `Func<A.., R>`: parameter types followed by the result type.
    pub fn func(parameters: impl IntoIterator<Item = TypeDescriptor>, result: TypeDescriptor) -> Self {
        let mut arguments: Vec<_> = parameters.into_iter().collect();
        arguments.push(result);
        Self::generic(CORE_NAMESPACE, "Func", arguments)
    }
    /// Quoted lambda type, `Expression<Func<..>>`.
    pub fn quoted(func: TypeDescriptor) -> Self {
        Self::generic(CORE_NAMESPACE, "Expression", [func])
    }

    pub fn array_of(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn with_properties(mut self, properties: impl IntoIterator<Item = PropertyDescriptor>) -> Self {
        self.properties = properties.into_iter().collect();
        self
    }

    /// The same type without its declared property set.
    pub fn without_properties(&self) -> Self {
        let mut ty = self.clone();
        ty.properties.clear();
        ty
    }

    pub fn key(&self) -> TypeKey {
        TypeKey {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            arity: self.generic_arguments.len(),
        }
    }

    pub fn is_generic_param(&self) -> bool {
        self.namespace.is_none() && self.name.starts_with('!')
    }

    pub fn generic_param_index(&self) -> Option<usize> {
        if !self.is_generic_param() {
            return None;
        }
        self.name[1..].parse().ok()
    }

    pub fn is_core(&self, name: &str) -> bool {
        self.namespace.as_deref() == Some(CORE_NAMESPACE) && self.name == name
    }

    pub fn is_queryable(&self) -> bool {
        self.is_core("Queryable") && self.generic_arguments.len() == 1 && !self.is_array
    }

    /// Element type of `Seq<T>`, `Queryable<T>`, `Grouping<K, T>` or `T[]`.
    pub fn element_type(&self) -> Option<TypeDescriptor> {
        if self.is_array {
            let mut element = self.clone();
            element.is_array = false;
            return Some(element);
        }
        if self.namespace.as_deref() != Some(CORE_NAMESPACE) {
            return None;
        }
        match (self.name.as_str(), self.generic_arguments.as_slice()) {
            ("Seq" | "Queryable", [element]) => Some(element.clone()),
            ("Grouping", [_, element]) => Some(element.clone()),
            _ => None,
        }
    }

    /// Replace generic parameter placeholders with `arguments`.
    pub fn substitute(&self, arguments: &[TypeDescriptor]) -> TypeDescriptor {
        if let Some(index) = self.generic_param_index() {
            if let Some(argument) = arguments.get(index) {
                let mut resolved = argument.clone();
                resolved.is_array |= self.is_array;
                return resolved;
            }
            return self.clone();
        }
        let mut ty = self.clone();
        for argument in &mut ty.generic_arguments {
            *argument = argument.substitute(arguments);
        }
        for property in &mut ty.properties {
            property.ty = property.ty.substitute(arguments);
        }
        ty
    }

    /// Whether `self` is the type of a value usable where `other` is expected.
    /// `any` accepts everything; generic parameters accept everything.
    pub fn is_assignable_to(&self, other: &TypeDescriptor) -> bool {
        if other.is_generic_param() || other.is_core("any") || self == other {
            return true;
        }
        if self.key() != other.key() || self.is_array != other.is_array {
            // sequences of any kind satisfy `Seq<T>`
            if other.is_core("Seq") {
                return match (self.element_type(), other.element_type()) {
                    (Some(a), Some(b)) => a.is_assignable_to(&b),
                    _ => false,
                };
            }
            return false;
        }
        self.generic_arguments
            .iter()
            .zip(&other.generic_arguments)
            .all(|(a, b)| a.is_assignable_to(b))
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_anonymous && self.generic_arguments.is_empty() {
            write!(f, "{{")?;
            for (i, property) in self.properties.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", property.name, property.ty)?;
            }
            write!(f, "}}")?;
        } else {
            if let Some(namespace) = &self.namespace {
                write!(f, "{namespace}.")?;
            }
            write!(f, "{}", self.name)?;
            if !self.generic_arguments.is_empty() {
                write!(f, "<")?;
                for (i, argument) in self.generic_arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ">")?;
            }
        }
        if self.is_array {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

common_struct! {
    /// Field or property of a type, identified structurally.
    pub struct MemberDescriptor {
        pub declaring_type: TypeDescriptor,
        pub name: String,
    }
}

impl MemberDescriptor {
    pub fn new(declaring_type: TypeDescriptor, name: impl Into<String>) -> Self {
        Self {
            declaring_type,
            name: name.into(),
        }
    }
}

impl Display for MemberDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)
    }
}

common_struct! {
    /// Method reference: declaring type, name, open parameter types and the
    /// closed generic arguments of this particular call.
    pub struct MethodDescriptor {
        pub declaring_type: TypeDescriptor,
        pub name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub parameter_types: Vec<TypeDescriptor>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub generic_arguments: Vec<TypeDescriptor>,
    }
}

impl MethodDescriptor {
    pub fn generic_arity(&self) -> usize {
        self.generic_arguments.len()
    }
}

impl Display for MethodDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.declaring_type, self.name)?;
        if !self.generic_arguments.is_empty() {
            write!(f, "<")?;
            for (i, argument) in self.generic_arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{argument}")?;
            }
            write!(f, ">")?;
        }
        write!(f, "(")?;
        for (i, parameter) in self.parameter_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{parameter}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_closes_open_signature() {
        let open = TypeDescriptor::queryable(TypeDescriptor::grouping(
            TypeDescriptor::generic_param(1),
            TypeDescriptor::generic_param(0),
        ));
        let product = TypeDescriptor::new("shop", "Product");
        let closed = open.substitute(&[product.clone(), TypeDescriptor::int()]);
        assert_eq!(
            closed,
            TypeDescriptor::queryable(TypeDescriptor::grouping(TypeDescriptor::int(), product))
        );
    }

    #[test]
    fn queryable_is_assignable_to_seq() {
        let product = TypeDescriptor::new("shop", "Product");
        let source = TypeDescriptor::queryable(product.clone());
        assert!(source.is_assignable_to(&TypeDescriptor::seq(TypeDescriptor::generic_param(0))));
        assert!(!TypeDescriptor::int().is_assignable_to(&TypeDescriptor::string()));
    }

    #[test]
    fn display_is_readable() {
        let ty = TypeDescriptor::seq(TypeDescriptor::new("shop", "Product")).array_of();
        assert_eq!(ty.to_string(), "core.Seq<shop.Product>[]");
    }
}
