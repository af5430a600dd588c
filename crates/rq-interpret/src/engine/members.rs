use super::*;

impl QueryInterpreter<'_> {
    pub(super) fn evaluate_member(&mut self, access: &ExprMember) -> Result<NativeValue> {
        let Some(target) = &access.target else {
            return Err(Error::unsupported_with(
                "MemberAccess",
                format!("static member {}", access.member.descriptor()),
            ));
        };
        let target = self.evaluate(target)?;
        read_member(&target, access.member.name())
    }

    pub(super) fn evaluate_new(&mut self, new: &ExprNew) -> Result<NativeValue> {
        interp_ensure!(
            new.members.len() == new.arguments.len(),
            format!(
                "{} members initialized from {} arguments",
                new.members.len(),
                new.arguments.len()
            )
        );
        let object = ObjectRef::new(new.ty.clone())?;
        for (member, argument) in new.members.iter().zip(&new.arguments) {
            let value = self.evaluate(argument)?;
            object.set(member, value)?;
        }
        Ok(object.into())
    }

    pub(super) fn evaluate_member_init(&mut self, init: &ExprMemberInit) -> Result<NativeValue> {
        let object = ObjectRef::new(init.ty.clone())?;
        for binding in &init.bindings {
            let value = self.evaluate(&binding.value)?;
            object.set(&binding.member, value)?;
        }
        Ok(object.into())
    }
}

/// Read `name` from an object, a grouping (`Key`, `Elements`) or a string
/// (`Length`). Member access on null is an error, as on the host.
pub(crate) fn read_member(target: &NativeValue, name: &str) -> Result<NativeValue> {
    match (target, name) {
        (NativeValue::Null, _) => interp_bail!(
            format!("member `{name}` read through a null reference"),
            "NullReference"
        ),
        (NativeValue::Object(object), _) => object.get(name),
        (NativeValue::Grouping(grouping), "Key") => Ok(grouping.key.clone()),
        (NativeValue::Grouping(grouping), "Elements") => {
            Ok(NativeValue::Sequence(grouping.elements.clone()))
        }
        (NativeValue::Scalar(Scalar::String(text)), "Length") => {
            Ok(NativeValue::int(text.chars().count() as i64))
        }
        (other, _) => Err(Error::UnresolvedMember {
            declaring_type: other.descriptor(),
            name: name.to_string(),
        }),
    }
}
