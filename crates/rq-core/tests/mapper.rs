mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rq_core::types::TypeDescriptor;
use rq_core::value::{DynamicObject, DynamicValueMapper, NativeValue, ObjectRef, Sequence};
use rq_core::{DynamicValue, Error, Result};

use support::*;

fn named(resolver: &rq_core::types::DefaultTypeResolver, name: &str) -> Result<ObjectRef> {
    let object = ObjectRef::new(node_type(resolver))?;
    object.set("Name", NativeValue::string(name))?;
    Ok(object)
}

#[test]
fn cycles_are_written_once_and_relinked() -> Result<()> {
    let resolver = resolver();
    let a = named(&resolver, "a")?;
    let b = named(&resolver, "b")?;
    a.set("Next", b.clone().into())?;
    b.set("Prev", a.clone().into())?;
    let mapper = DynamicValueMapper::new();

    let dynamic = mapper.to_dynamic(&a.clone().into())?;

    let outer = dynamic.as_object().expect("an object");
    let inner = outer.get("Next").and_then(DynamicValue::as_object).expect("nested object");
    assert_eq!(inner.get("Prev"), Some(&DynamicValue::Reference(outer.reference.unwrap())));

    let restored = mapper.to_object(&dynamic, &node(), &resolver)?;
    let first = restored.as_object().expect("an object").clone();
    let second = first.get("Next")?;
    let back = second.as_object().expect("an object").get("Prev")?;
    assert!(back.as_object().expect("an object").ptr_eq(&first));
    assert!(!second.as_object().unwrap().ptr_eq(&first));
    assert_eq!(second.as_object().unwrap().get("Name")?.as_scalar().cloned(), Some("b".into()));
    Ok(())
}

#[test]
fn shared_objects_keep_their_identity() -> Result<()> {
    let resolver = resolver();
    let shared = named(&resolver, "shared")?;
    let list = NativeValue::Sequence(Sequence::new(
        node(),
        vec![shared.clone().into(), shared.into()],
    ));
    let mapper = DynamicValueMapper::new();

    let dynamic = mapper.to_dynamic(&list)?;
    let items = &dynamic.as_list().expect("a list").items;
    assert!(matches!(items[1], DynamicValue::Reference(_)));

    let restored = mapper.to_object(&dynamic, &TypeDescriptor::seq(node()), &resolver)?;
    let items = restored.as_items().expect("a sequence");
    let (first, second) = (items[0].as_object().unwrap(), items[1].as_object().unwrap());
    assert!(first.ptr_eq(second));
    Ok(())
}

#[test]
fn dangling_references_are_mapping_errors() {
    let resolver = resolver();
    let bag = DynamicValue::Object(
        DynamicObject::new(Some(node()))
            .with_reference(1)
            .with_entry("Next", DynamicValue::Reference(9)),
    );

    let err = DynamicValueMapper::new()
        .to_object(&bag, &node(), &resolver)
        .unwrap_err();

    assert!(matches!(err, Error::Mapping(_)), "{err:?}");
}

#[test]
fn strict_mapping_rejects_unknown_members() {
    let resolver = resolver();
    let bag = DynamicValue::Object(DynamicObject::new(Some(product())).with_entry("Weight", DynamicValue::scalar(3i64)));

    let lenient = DynamicValueMapper::new()
        .strict(false)
        .to_object(&bag, &product(), &resolver);
    assert!(lenient.is_ok());

    let strict = DynamicValueMapper::new()
        .strict(true)
        .to_object(&bag, &product(), &resolver);
    assert!(matches!(strict, Err(Error::Mapping(_))));
}

#[test]
fn unknown_types_carry_their_properties() -> Result<()> {
    let resolver = resolver();
    let object = ObjectRef::with_values(
        rq_core::TypeResolver::resolve(&resolver, &product())?,
        [("Id", NativeValue::int(1)), ("Name", NativeValue::string("Bolt"))],
    )?;
    let known_only_category = |ty: &TypeDescriptor| ty.name == "Category";
    let mapper = DynamicValueMapper::new().with_known_types(Arc::new(known_only_category));

    let dynamic = mapper.to_dynamic(&object.into())?;

    let ty = dynamic.as_object().and_then(|bag| bag.ty.clone()).expect("a typed bag");
    let names: Vec<_> = ty.properties.iter().map(|property| property.name.clone()).collect();
    assert_eq!(names, vec!["Id".to_string(), "Name".to_string()]);
    Ok(())
}

#[test]
fn member_selectors_project_objects() -> Result<()> {
    let resolver = resolver();
    let object = ObjectRef::with_values(
        rq_core::TypeResolver::resolve(&resolver, &product())?,
        [("Id", NativeValue::int(1)), ("Name", NativeValue::string("Bolt"))],
    )?;
    let only_names = |_: &rq_core::types::ConcreteType| Some(vec!["Name".to_string()]);
    let mapper = DynamicValueMapper::new().with_member_selector(Arc::new(only_names));

    let dynamic = mapper.to_dynamic(&object.into())?;

    let bag = dynamic.as_object().expect("an object");
    assert_eq!(bag.entries.len(), 1);
    assert_eq!(bag.get("Name"), Some(&DynamicValue::scalar("Bolt")));
    Ok(())
}

#[test]
fn long_chains_map_both_ways_without_recursion() -> Result<()> {
    const LENGTH: usize = 50_000;
    let resolver = resolver();
    let head = named(&resolver, "0")?;
    let mut tail = head.clone();
    for index in 1..LENGTH {
        let next = named(&resolver, &index.to_string())?;
        tail.set("Next", next.clone().into())?;
        tail = next;
    }
    drop(tail);
    let mapper = DynamicValueMapper::new();

    let dynamic = mapper.to_dynamic(&head.clone().into())?;
    let mut links = 1;
    let mut bag = dynamic.as_object().expect("an object");
    while let Some(next) = bag.get("Next").and_then(DynamicValue::as_object) {
        bag = next;
        links += 1;
    }
    assert_eq!(links, LENGTH);

    let restored = mapper.to_object(&dynamic, &node(), &resolver)?;
    let mut links = 1;
    let mut object = restored.as_object().expect("an object").clone();
    while let NativeValue::Object(next) = object.get("Next")? {
        object = next;
        links += 1;
    }
    assert_eq!(links, LENGTH);
    assert_eq!(object.get("Name")?.as_scalar().cloned(), Some((LENGTH - 1).to_string().into()));

    drop(object);
    drop(restored);
    drop(dynamic);
    drop(head);
    Ok(())
}
