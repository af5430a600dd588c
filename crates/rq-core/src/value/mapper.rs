//! Conversion between host values and the dynamic value graph.
//!
//! Both directions keep a per-call reference table so shared and cyclic
//! object graphs are written once and re-linked on the way back.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    DynamicEntry, DynamicList, DynamicObject, DynamicValue, Grouping, NativeValue, ObjectRef,
    ReferenceId, Scalar, Sequence,
};
use crate::config::strict_mapping;
use crate::error::{Error, Result};
use crate::types::{
    ConcreteType, PrimitiveKind, PropertyDescriptor, TypeDescriptor, TypeKind, TypeRef,
    TypeResolver,
};

/// Types the receiving side knows by name. Objects of other types carry
/// their property set so the receiver can emit a matching type.
pub trait KnownTypeProvider: Send + Sync {
    fn is_known(&self, ty: &TypeDescriptor) -> bool;
}

impl<F> KnownTypeProvider for F
where
    F: Fn(&TypeDescriptor) -> bool + Send + Sync,
{
    fn is_known(&self, ty: &TypeDescriptor) -> bool {
        self(ty)
    }
}

/// Per-type override of the members written into an object bag.
/// `None` keeps the default: every readable member.
pub trait MemberSelector: Send + Sync {
    fn select(&self, ty: &ConcreteType) -> Option<Vec<String>>;
}

impl<F> MemberSelector for F
where
    F: Fn(&ConcreteType) -> Option<Vec<String>> + Send + Sync,
{
    fn select(&self, ty: &ConcreteType) -> Option<Vec<String>> {
        self(ty)
    }
}

#[derive(Clone)]
pub struct DynamicValueMapper {
    known_types: Option<Arc<dyn KnownTypeProvider>>,
    member_selector: Option<Arc<dyn MemberSelector>>,
    strict: bool,
}

impl Default for DynamicValueMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicValueMapper {
    pub fn new() -> Self {
        Self {
            known_types: None,
            member_selector: None,
            strict: strict_mapping(),
        }
    }

    pub fn with_known_types(mut self, provider: Arc<dyn KnownTypeProvider>) -> Self {
        self.known_types = Some(provider);
        self
    }

    pub fn with_member_selector(mut self, selector: Arc<dyn MemberSelector>) -> Self {
        self.member_selector = Some(selector);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn to_dynamic(&self, value: &NativeValue) -> Result<DynamicValue> {
        ToDynamic {
            mapper: self,
            visited: HashMap::new(),
            next_id: 1,
        }
        .map(value)
    }

    pub fn to_object(
        &self,
        value: &DynamicValue,
        target: &TypeDescriptor,
        resolver: &dyn TypeResolver,
    ) -> Result<NativeValue> {
        ToObject {
            mapper: self,
            resolver,
            materialized: HashMap::new(),
        }
        .map(value, target)
    }

    fn describe(&self, ty: &ConcreteType) -> TypeDescriptor {
        let descriptor = ty.descriptor();
        if descriptor.is_anonymous || ty.is_emitted() {
            return ty.descriptor_with_properties();
        }
        match &self.known_types {
            Some(known) if !known.is_known(descriptor) => ty.descriptor_with_properties(),
            _ => descriptor.without_properties(),
        }
    }

    fn selected_members(&self, ty: &ConcreteType) -> Vec<usize> {
        let selected = self
            .member_selector
            .as_ref()
            .and_then(|selector| selector.select(ty));
        match selected {
            Some(names) => names
                .iter()
                .filter_map(|name| ty.member_index(name))
                .collect(),
            None => ty
                .members()
                .iter()
                .enumerate()
                .filter(|(_, member)| member.readable)
                .map(|(index, _)| index)
                .collect(),
        }
    }
}

// Both walkers below keep their own stack of open containers: object graphs
// arriving from a provider can nest far deeper than the thread stack allows.

enum Step<F, V> {
    Leaf(V),
    Open(F),
}

struct ToDynamic<'a> {
    mapper: &'a DynamicValueMapper,
    visited: HashMap<usize, ReferenceId>,
    next_id: ReferenceId,
}

/// A list or object bag whose children are still being written.
struct Shell {
    value: DynamicValue,
    children: std::vec::IntoIter<(String, NativeValue)>,
    name: String,
}

impl Shell {
    fn new(value: DynamicValue, children: Vec<(String, NativeValue)>) -> Self {
        Self {
            value,
            children: children.into_iter(),
            name: String::new(),
        }
    }

    fn next_child(&mut self) -> Option<NativeValue> {
        let (name, child) = self.children.next()?;
        self.name = name;
        Some(child)
    }

    fn accept(&mut self, value: DynamicValue) {
        match &mut self.value {
            DynamicValue::List(list) => list.items.push(value),
            DynamicValue::Object(object) => object.entries.push(DynamicEntry {
                name: std::mem::take(&mut self.name),
                value,
            }),
            DynamicValue::Null | DynamicValue::Scalar(_) | DynamicValue::Reference(_) => {}
        }
    }
}

impl ToDynamic<'_> {
    fn map(&mut self, root: &NativeValue) -> Result<DynamicValue> {
        let mut stack: Vec<Shell> = Vec::new();
        let mut step = self.open(root)?;
        loop {
            let mut done = match step {
                Step::Leaf(value) => Some(value),
                Step::Open(shell) => {
                    stack.push(shell);
                    None
                }
            };
            loop {
                let Some(shell) = stack.last_mut() else {
                    return done.ok_or_else(|| Error::mapping("value graph has no root"));
                };
                if let Some(value) = done.take() {
                    shell.accept(value);
                }
                if let Some(child) = shell.next_child() {
                    step = self.open(&child)?;
                    break;
                }
                done = stack.pop().map(|shell| shell.value);
            }
        }
    }

    fn open(&mut self, value: &NativeValue) -> Result<Step<Shell, DynamicValue>> {
        match value {
            NativeValue::Null => Ok(Step::Leaf(DynamicValue::Null)),
            NativeValue::Scalar(scalar) => Ok(Step::Leaf(DynamicValue::Scalar(scalar.clone()))),
            NativeValue::Sequence(sequence) => Ok(Step::Open(Self::open_sequence(sequence))),
            NativeValue::Object(object) => self.open_object(object),
            NativeValue::Grouping(grouping) => {
                let identity = Arc::as_ptr(grouping) as *const () as usize;
                if let Some(id) = self.visited.get(&identity) {
                    return Ok(Step::Leaf(DynamicValue::Reference(*id)));
                }
                let reference = self.visit(identity);
                let bag = DynamicObject::new(Some(grouping.ty.descriptor().clone()))
                    .with_reference(reference);
                Ok(Step::Open(Shell::new(
                    DynamicValue::Object(bag),
                    vec![
                        ("Key".to_string(), grouping.key.clone()),
                        (
                            "Elements".to_string(),
                            NativeValue::Sequence(grouping.elements.clone()),
                        ),
                    ],
                )))
            }
        }
    }

    fn visit(&mut self, identity: usize) -> ReferenceId {
        let id = self.next_id;
        self.next_id += 1;
        self.visited.insert(identity, id);
        id
    }

    fn open_sequence(sequence: &Sequence) -> Shell {
        let list = DynamicList {
            element_type: Some(sequence.element_type.clone()),
            items: Vec::with_capacity(sequence.len()),
        };
        let children = sequence
            .items()
            .iter()
            .map(|item| (String::new(), item.clone()))
            .collect();
        Shell::new(DynamicValue::List(list), children)
    }

    fn open_object(&mut self, object: &ObjectRef) -> Result<Step<Shell, DynamicValue>> {
        if let Some(id) = self.visited.get(&object.id()) {
            return Ok(Step::Leaf(DynamicValue::Reference(*id)));
        }
        let reference = self.visit(object.id());
        let ty = object.ty().clone();
        let fields = object.fields();
        let mut children = Vec::new();
        for index in self.mapper.selected_members(&ty) {
            let member = &ty.members()[index];
            if !member.readable {
                return Err(Error::mapping(format!(
                    "member {}::{} is not readable",
                    ty.descriptor(),
                    member.name
                )));
            }
            children.push((member.name.clone(), fields[index].clone()));
        }
        let bag = DynamicObject::new(Some(self.mapper.describe(&ty))).with_reference(reference);
        Ok(Step::Open(Shell::new(DynamicValue::Object(bag), children)))
    }
}

struct ToObject<'a> {
    mapper: &'a DynamicValueMapper,
    resolver: &'a dyn TypeResolver,
    materialized: HashMap<ReferenceId, NativeValue>,
}

/// A host container whose members are still being materialized.
enum Target {
    List {
        element_type: TypeDescriptor,
        items: Vec<NativeValue>,
    },
    Object(ObjectRef),
    Grouping {
        ty: TypeRef,
        reference: Option<ReferenceId>,
        key: NativeValue,
        elements: Sequence,
    },
}

struct Slot<'v> {
    value: &'v DynamicValue,
    target: TypeDescriptor,
    index: usize,
}

struct Frame<'v> {
    target: Target,
    children: std::vec::IntoIter<Slot<'v>>,
    index: usize,
}

const GROUPING_KEY: usize = 0;
const GROUPING_ELEMENTS: usize = 1;

impl<'v> Frame<'v> {
    fn new(target: Target, children: Vec<Slot<'v>>) -> Self {
        Self {
            target,
            children: children.into_iter(),
            index: 0,
        }
    }

    fn next_child(&mut self) -> Option<(&'v DynamicValue, TypeDescriptor)> {
        let slot = self.children.next()?;
        self.index = slot.index;
        Some((slot.value, slot.target))
    }

    fn accept(&mut self, value: NativeValue) -> Result<()> {
        match &mut self.target {
            Target::List { items, .. } => items.push(value),
            Target::Object(instance) => instance.set_index(self.index, value),
            Target::Grouping { key, .. } if self.index == GROUPING_KEY => *key = value,
            Target::Grouping { elements, .. } => match value {
                NativeValue::Sequence(sequence) => *elements = sequence,
                other => {
                    return Err(Error::mapping(format!(
                        "grouping elements must be a list, found {}",
                        other.descriptor()
                    )))
                }
            },
        }
        Ok(())
    }
}

impl<'v> ToObject<'_> {
    fn map(&mut self, root: &'v DynamicValue, target: &TypeDescriptor) -> Result<NativeValue> {
        let mut stack: Vec<Frame<'v>> = Vec::new();
        let mut step = self.open(root, target)?;
        loop {
            let mut done = match step {
                Step::Leaf(value) => Some(value),
                Step::Open(frame) => {
                    stack.push(frame);
                    None
                }
            };
            loop {
                let Some(frame) = stack.last_mut() else {
                    return done.ok_or_else(|| Error::mapping("value graph has no root"));
                };
                if let Some(value) = done.take() {
                    frame.accept(value)?;
                }
                if let Some((child, target)) = frame.next_child() {
                    step = self.open(child, &target)?;
                    break;
                }
                done = match stack.pop() {
                    Some(frame) => Some(self.close(frame.target)?),
                    None => None,
                };
            }
        }
    }

    fn open(
        &mut self,
        value: &'v DynamicValue,
        target: &TypeDescriptor,
    ) -> Result<Step<Frame<'v>, NativeValue>> {
        match value {
            DynamicValue::Null => Ok(Step::Leaf(NativeValue::Null)),
            DynamicValue::Scalar(scalar) => self.map_scalar(scalar, target).map(Step::Leaf),
            DynamicValue::List(list) => Ok(Step::Open(Self::open_list(list, target))),
            DynamicValue::Reference(id) => {
                self.materialized.get(id).cloned().map(Step::Leaf).ok_or_else(|| {
                    Error::mapping(format!("reference #{id} does not denote an earlier object"))
                })
            }
            DynamicValue::Object(object) => self.open_object(object, target),
        }
    }

    fn close(&mut self, target: Target) -> Result<NativeValue> {
        match target {
            Target::List {
                element_type,
                items,
            } => Ok(NativeValue::Sequence(Sequence::new(element_type, items))),
            Target::Object(instance) => Ok(NativeValue::Object(instance)),
            Target::Grouping {
                ty,
                reference,
                key,
                elements,
            } => {
                let grouping = NativeValue::Grouping(Grouping::new(ty, key, elements)?);
                if let Some(id) = reference {
                    self.materialized.insert(id, grouping.clone());
                }
                Ok(grouping)
            }
        }
    }

    fn map_scalar(&self, scalar: &Scalar, target: &TypeDescriptor) -> Result<NativeValue> {
        if target.is_generic_param() {
            return Ok(NativeValue::Scalar(scalar.clone()));
        }
        let ty = self.resolver.resolve(target)?;
        let Some(kind) = ty.primitive() else {
            return Err(Error::mapping(format!(
                "cannot map scalar {scalar} to non-primitive type {target}"
            )));
        };
        convert_scalar(scalar, kind)
            .map(NativeValue::Scalar)
            .ok_or_else(|| Error::mapping(format!("cannot convert {scalar} to {target}")))
    }

    fn open_list(list: &'v DynamicList, target: &TypeDescriptor) -> Frame<'v> {
        let element_type = target
            .element_type()
            .filter(|element| !element.is_generic_param() && !element.is_core("any"))
            .or_else(|| list.element_type.clone())
            .unwrap_or_else(TypeDescriptor::any);
        let children = list
            .items
            .iter()
            .map(|item| Slot {
                value: item,
                target: element_type.clone(),
                index: 0,
            })
            .collect();
        let items = Vec::with_capacity(list.items.len());
        Frame::new(
            Target::List {
                element_type,
                items,
            },
            children,
        )
    }

    fn open_object(
        &mut self,
        object: &'v DynamicObject,
        target: &TypeDescriptor,
    ) -> Result<Step<Frame<'v>, NativeValue>> {
        if let Some(id) = object.reference {
            if let Some(existing) = self.materialized.get(&id) {
                if let Some(ty) = &object.ty {
                    if existing.descriptor().key() != ty.key() {
                        return Err(Error::mapping(format!(
                            "reference #{id} already denotes a {}, not a {}",
                            existing.descriptor(),
                            ty
                        )));
                    }
                }
                return Ok(Step::Leaf(existing.clone()));
            }
        }
        let descriptor = match &object.ty {
            Some(ty) => ty.clone(),
            None if target.is_generic_param() || target.is_core("any") => {
                // untyped bag: emit a shape from the entries themselves
                TypeDescriptor::anonymous(object.entries.iter().map(|entry| {
                    PropertyDescriptor::new(entry.name.clone(), TypeDescriptor::any())
                }))
            }
            None => target.clone(),
        };
        let ty = self.resolver.resolve(&descriptor)?;
        match ty.kind() {
            TypeKind::Class { .. } | TypeKind::Emitted { .. } => {
                self.open_instance(object, ty.clone()).map(Step::Open)
            }
            TypeKind::Grouping { key, element } => {
                let mut children = Vec::new();
                if let Some(value) = object.get("Key") {
                    children.push(Slot {
                        value,
                        target: key.descriptor().clone(),
                        index: GROUPING_KEY,
                    });
                }
                if let Some(value) = object.get("Elements") {
                    children.push(Slot {
                        value,
                        target: TypeDescriptor::seq(element.descriptor().clone()),
                        index: GROUPING_ELEMENTS,
                    });
                }
                let grouping = Target::Grouping {
                    ty: ty.clone(),
                    reference: object.reference,
                    key: NativeValue::Null,
                    elements: Sequence::empty(element.descriptor().clone()),
                };
                Ok(Step::Open(Frame::new(grouping, children)))
            }
            _ => Err(Error::mapping(format!(
                "cannot populate {} from an object bag",
                ty.descriptor()
            ))),
        }
    }

    fn open_instance(&mut self, object: &'v DynamicObject, ty: TypeRef) -> Result<Frame<'v>> {
        let instance = ObjectRef::new(ty.clone())?;
        // register before populating so back-references resolve to this instance
        if let Some(id) = object.reference {
            self.materialized
                .insert(id, NativeValue::Object(instance.clone()));
        }
        let mut children = Vec::with_capacity(object.entries.len());
        for entry in &object.entries {
            let Some(index) = ty.member_index(&entry.name) else {
                if self.mapper.strict {
                    return Err(Error::mapping(format!(
                        "{} has no member `{}`",
                        ty.descriptor(),
                        entry.name
                    )));
                }
                crate::trace!("skipping unknown member {} on {}", entry.name, ty.descriptor());
                continue;
            };
            let member = &ty.members()[index];
            if !member.writable {
                return Err(Error::mapping(format!(
                    "member {}::{} is not writable",
                    ty.descriptor(),
                    member.name
                )));
            }
            children.push(Slot {
                value: &entry.value,
                target: member.ty.clone(),
                index,
            });
        }
        Ok(Frame::new(Target::Object(instance), children))
    }
}

/// Scalar conversion used when a value crosses into a typed slot.
pub fn convert_scalar(scalar: &Scalar, kind: PrimitiveKind) -> Option<Scalar> {
    match (kind, scalar) {
        (PrimitiveKind::Any, _) => Some(scalar.clone()),
        (PrimitiveKind::Bool, Scalar::Bool(_))
        | (PrimitiveKind::Int, Scalar::Int(_))
        | (PrimitiveKind::Float, Scalar::Float(_))
        | (PrimitiveKind::String, Scalar::String(_))
        | (PrimitiveKind::Char, Scalar::Char(_)) => Some(scalar.clone()),
        (PrimitiveKind::Float, Scalar::Int(value)) => Some(Scalar::Float(*value as f64)),
        (PrimitiveKind::Int, Scalar::Float(value)) if value.fract() == 0.0 => {
            Some(Scalar::Int(*value as i64))
        }
        (PrimitiveKind::Int, Scalar::Char(value)) => Some(Scalar::Int(*value as i64)),
        (PrimitiveKind::String, Scalar::Char(value)) => Some(Scalar::String(value.to_string())),
        (PrimitiveKind::Char, Scalar::String(value)) => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Scalar::Char(c)),
                _ => None,
            }
        }
        _ => None,
    }
}
