//! The closed set of methods a query may call, described structurally.
//!
//! Implementations are not stored here; the interpreter registers one
//! handler per [`MethodKey`].

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::types::{MethodDescriptor, TypeDescriptor, TypeKey, LINQ_NAMESPACE};

pub const QUERYABLE: &str = "Queryable";
pub const ENUMERABLE: &str = "Enumerable";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInfo {
    pub declaring_type: TypeDescriptor,
    pub name: String,
    pub generic_arity: usize,
    /// Open parameter types, generic parameters written `!0`, `!1`, ...
    pub parameters: Vec<TypeDescriptor>,
    pub return_type: TypeDescriptor,
    /// Instance methods take their receiver as the call target.
    pub is_static: bool,
}

impl MethodInfo {
    pub fn key(&self) -> MethodKey {
        MethodKey {
            declaring_type: self.declaring_type.key(),
            name: self.name.clone(),
            parameter_count: self.parameters.len(),
        }
    }

    /// Whether `descriptor` names this method: same declaring type, name,
    /// generic arity and open parameter list.
    pub fn matches(&self, descriptor: &MethodDescriptor) -> bool {
        self.declaring_type.key() == descriptor.declaring_type.key()
            && self.name == descriptor.name
            && self.generic_arity == descriptor.generic_arity()
            && self.parameters == descriptor.parameter_types
    }
}

/// Handler-table key: declaring type, name and parameter count. Overloads of
/// the query operators differ in parameter count only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub declaring_type: TypeKey,
    pub name: String,
    pub parameter_count: usize,
}

impl MethodKey {
    pub fn new(declaring_type: &TypeDescriptor, name: impl Into<String>, parameter_count: usize) -> Self {
        Self {
            declaring_type: declaring_type.key(),
            name: name.into(),
            parameter_count,
        }
    }
}

impl Display for MethodKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(namespace) = &self.declaring_type.namespace {
            write!(f, "{namespace}.")?;
        }
        write!(
            f,
            "{}::{}/{}",
            self.declaring_type.name, self.name, self.parameter_count
        )
    }
}

pub struct MethodCatalog {
    methods: Vec<Arc<MethodInfo>>,
    by_name: HashMap<(TypeKey, String), Vec<Arc<MethodInfo>>>,
}

impl MethodCatalog {
    fn new(methods: Vec<MethodInfo>) -> Self {
        let methods: Vec<_> = methods.into_iter().map(Arc::new).collect();
        let mut by_name: HashMap<_, Vec<_>> = HashMap::new();
        for method in &methods {
            by_name
                .entry((method.declaring_type.key(), method.name.clone()))
                .or_default()
                .push(method.clone());
        }
        Self { methods, by_name }
    }

    pub fn methods(&self) -> &[Arc<MethodInfo>] {
        &self.methods
    }

    pub fn overloads(&self, declaring_type: &TypeDescriptor, name: &str) -> &[Arc<MethodInfo>] {
        self.by_name
            .get(&(declaring_type.key(), name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Structural lookup of a method named by a descriptor.
    pub fn resolve(&self, descriptor: &MethodDescriptor) -> Result<Arc<MethodInfo>> {
        self.overloads(&descriptor.declaring_type, &descriptor.name)
            .iter()
            .find(|method| method.matches(descriptor))
            .cloned()
            .ok_or_else(|| Error::UnresolvedMember {
                declaring_type: descriptor.declaring_type.clone(),
                name: descriptor.name.clone(),
            })
    }
}

pub fn linq_type(name: &str) -> TypeDescriptor {
    TypeDescriptor::new(LINQ_NAMESPACE, name)
}

/// Process-wide method catalog, built once.
pub fn catalog() -> &'static MethodCatalog {
    static CATALOG: OnceLock<MethodCatalog> = OnceLock::new();
    CATALOG.get_or_init(|| MethodCatalog::new(build_catalog()))
}

fn build_catalog() -> Vec<MethodInfo> {
    let t = TypeDescriptor::generic_param(0);
    let r = TypeDescriptor::generic_param(1);
    let mut methods = Vec::new();

    for (declaring, quoted) in [(QUERYABLE, true), (ENUMERABLE, false)] {
        let source = |element: TypeDescriptor| {
            if quoted {
                TypeDescriptor::queryable(element)
            } else {
                TypeDescriptor::seq(element)
            }
        };
        let lambda = |parameter: TypeDescriptor, result: TypeDescriptor| {
            let func = TypeDescriptor::func([parameter], result);
            if quoted {
                TypeDescriptor::quoted(func)
            } else {
                func
            }
        };
        let mut add = |name: &str, arity: usize, parameters: Vec<TypeDescriptor>, ret: TypeDescriptor| {
            methods.push(MethodInfo {
                declaring_type: linq_type(declaring),
                name: name.to_string(),
                generic_arity: arity,
                parameters,
                return_type: ret,
                is_static: true,
            });
        };
        let predicate = lambda(t.clone(), TypeDescriptor::bool());
        let selector = lambda(t.clone(), r.clone());

        add("Where", 1, vec![source(t.clone()), predicate.clone()], source(t.clone()));
        add("Select", 2, vec![source(t.clone()), selector.clone()], source(r.clone()));
        add(
            "SelectMany",
            2,
            vec![source(t.clone()), lambda(t.clone(), TypeDescriptor::seq(r.clone()))],
            source(r.clone()),
        );
        for name in ["OrderBy", "OrderByDescending", "ThenBy", "ThenByDescending"] {
            add(name, 2, vec![source(t.clone()), selector.clone()], source(t.clone()));
        }
        add(
            "GroupBy",
            2,
            vec![source(t.clone()), selector.clone()],
            source(TypeDescriptor::grouping(r.clone(), t.clone())),
        );
        for name in ["Take", "Skip"] {
            add(name, 1, vec![source(t.clone()), TypeDescriptor::int()], source(t.clone()));
        }
        add("Distinct", 1, vec![source(t.clone())], source(t.clone()));
        add("Count", 1, vec![source(t.clone())], TypeDescriptor::int());
        add("Count", 1, vec![source(t.clone()), predicate.clone()], TypeDescriptor::int());
        add("Any", 1, vec![source(t.clone())], TypeDescriptor::bool());
        add("Any", 1, vec![source(t.clone()), predicate.clone()], TypeDescriptor::bool());
        add("All", 1, vec![source(t.clone()), predicate.clone()], TypeDescriptor::bool());
        for name in ["First", "FirstOrDefault"] {
            add(name, 1, vec![source(t.clone())], t.clone());
            add(name, 1, vec![source(t.clone()), predicate.clone()], t.clone());
        }
        for name in ["Sum", "Min", "Max"] {
            add(name, 2, vec![source(t.clone()), selector.clone()], r.clone());
        }
        add("Average", 2, vec![source(t.clone()), selector.clone()], TypeDescriptor::float());
        add("Contains", 1, vec![source(t.clone()), t.clone()], TypeDescriptor::bool());
        if !quoted {
            add("ToList", 1, vec![source(t.clone())], source(t.clone()));
        }
    }

    let string = TypeDescriptor::string();
    for name in ["Contains", "StartsWith", "EndsWith"] {
        methods.push(MethodInfo {
            declaring_type: string.clone(),
            name: name.to_string(),
            generic_arity: 0,
            parameters: vec![string.clone()],
            return_type: TypeDescriptor::bool(),
            is_static: false,
        });
    }
    for name in ["ToUpper", "ToLower", "Trim"] {
        methods.push(MethodInfo {
            declaring_type: string.clone(),
            name: name.to_string(),
            generic_arity: 0,
            parameters: Vec::new(),
            return_type: string.clone(),
            is_static: false,
        });
    }
    methods
}

/// Infer the generic arguments of an open signature from actual argument
/// types. `None` when the arguments do not fit or a parameter stays unbound.
pub fn infer_generic_arguments(
    method: &MethodInfo,
    arguments: &[TypeDescriptor],
) -> Option<Vec<TypeDescriptor>> {
    if method.parameters.len() != arguments.len() {
        return None;
    }
    let mut bindings = vec![None; method.generic_arity];
    for (open, actual) in method.parameters.iter().zip(arguments) {
        if !unify(open, actual, &mut bindings) {
            return None;
        }
    }
    bindings.into_iter().collect()
}

fn unify(open: &TypeDescriptor, actual: &TypeDescriptor, bindings: &mut [Option<TypeDescriptor>]) -> bool {
    if let Some(index) = open.generic_param_index() {
        return match bindings.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(actual.clone());
                true
            }
            Some(Some(bound)) => actual.is_assignable_to(bound) || bound.is_assignable_to(actual),
            None => false,
        };
    }
    if open.is_core("Seq") && open.key() != actual.key() {
        return match (open.element_type(), actual.element_type()) {
            (Some(open), Some(actual)) => unify(&open, &actual, bindings),
            _ => false,
        };
    }
    // a lambda passed where a quoted lambda is expected
    if open.is_core("Expression") && actual.is_core("Func") {
        return match open.generic_arguments.first() {
            Some(inner) => unify(inner, actual, bindings),
            None => false,
        };
    }
    if open.key() != actual.key() {
        return false;
    }
    open.generic_arguments
        .iter()
        .zip(&actual.generic_arguments)
        .all(|(open, actual)| unify(open, actual, bindings))
}
