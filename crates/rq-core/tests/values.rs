mod support;

use std::collections::{BTreeSet, HashSet};

use pretty_assertions::assert_eq;
use rq_core::types::{PropertyDescriptor, TypeDescriptor};
use rq_core::value::{NativeValue, ObjectRef, Scalar, ValueKey};
use rq_core::{Result, TypeResolver};

use support::*;

fn pair(resolver: &rq_core::types::DefaultTypeResolver, name: &str) -> Result<ObjectRef> {
    let shape = TypeDescriptor::anonymous([
        PropertyDescriptor::new("Name", TypeDescriptor::string()),
        PropertyDescriptor::new("Other", TypeDescriptor::any()),
    ]);
    let object = ObjectRef::new(resolver.resolve(&shape)?)?;
    object.set("Name", NativeValue::string(name))?;
    Ok(object)
}

#[test]
fn anonymous_objects_compare_by_member_values() -> Result<()> {
    let resolver = resolver();
    let (left, right) = (pair(&resolver, "a")?, pair(&resolver, "a")?);
    let other = pair(&resolver, "b")?;

    let left = NativeValue::from(left);
    assert!(left.same(&right.into()));
    assert!(!left.same(&other.into()));
    Ok(())
}

#[test]
fn self_referencing_anonymous_objects_still_key() -> Result<()> {
    let resolver = resolver();
    let looped = pair(&resolver, "a")?;
    looped.set("Other", looped.clone().into())?;
    let twin = pair(&resolver, "a")?;
    twin.set("Other", twin.clone().into())?;

    let value = NativeValue::from(looped.clone());
    let key = value.key();
    assert_eq!(
        key,
        ValueKey::Composite(vec![
            ValueKey::Scalar(Scalar::from("a")),
            ValueKey::Identity(looped.id()),
        ])
    );
    assert!(value.same(&looped.clone().into()));
    // the back edge keys by identity, so distinct loops stay distinct
    assert!(!value.same(&twin.into()));
    Ok(())
}

#[test]
fn mutually_referencing_anonymous_objects_still_key() -> Result<()> {
    let resolver = resolver();
    let (a, b) = (pair(&resolver, "a")?, pair(&resolver, "b")?);
    a.set("Other", b.clone().into())?;
    b.set("Other", a.clone().into())?;

    let key = NativeValue::from(a.clone()).key();
    assert_eq!(
        key,
        ValueKey::Composite(vec![
            ValueKey::Scalar(Scalar::from("a")),
            ValueKey::Composite(vec![
                ValueKey::Scalar(Scalar::from("b")),
                ValueKey::Identity(a.id()),
            ]),
        ])
    );
    Ok(())
}

#[test]
fn integers_and_floats_share_one_numeric_order() {
    let mut numbers = vec![
        Scalar::Float(1.5),
        Scalar::Int(2),
        Scalar::Float(-0.5),
        Scalar::Int(1),
        Scalar::Float(1.0),
    ];
    numbers.sort();
    assert_eq!(
        numbers,
        vec![
            Scalar::Float(-0.5),
            Scalar::Int(1),
            Scalar::Float(1.0),
            Scalar::Float(1.5),
            Scalar::Int(2),
        ]
    );
    assert_eq!(Scalar::Int(1), Scalar::Float(1.0));
    assert_eq!(Scalar::Float(0.0), Scalar::Float(-0.0));
    assert!(Scalar::Int(1) < Scalar::from("1"));
}

#[test]
fn equal_numbers_collapse_to_one_key() {
    let values = [
        NativeValue::int(1),
        NativeValue::float(1.0),
        NativeValue::int(2),
        NativeValue::float(2.5),
    ];
    let hashed: HashSet<ValueKey> = values.iter().map(NativeValue::key).collect();
    let ordered: BTreeSet<ValueKey> = values.iter().map(NativeValue::key).collect();
    assert_eq!(hashed.len(), 3);
    assert_eq!(ordered.len(), 3);
    assert!(NativeValue::int(2).same(&NativeValue::float(2.0)));
}

#[test]
fn large_integers_are_not_rounded_when_compared_with_floats() {
    let edge = 9_007_199_254_740_993_i64; // 2^53 + 1
    assert!(Scalar::Int(edge) > Scalar::Float(9_007_199_254_740_992.0));
    assert!(Scalar::Int(i64::MAX) < Scalar::Float(9.223_372_036_854_775_808e18));
    assert!(Scalar::Int(i64::MIN) > Scalar::Float(f64::NEG_INFINITY));
    assert!(Scalar::Int(0) < Scalar::Float(f64::NAN));
}
