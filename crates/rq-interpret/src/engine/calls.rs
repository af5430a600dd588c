use std::sync::OnceLock;

use rq_core::expr::methods::{linq_type, MethodKey, ENUMERABLE, QUERYABLE};
use rq_core::ops;

use super::*;

pub(super) type Handler = fn(&mut QueryInterpreter<'_>, &ExprCall) -> Result<NativeValue>;

/// Query operator implementations. Every operator is registered for both
/// `Queryable` and `Enumerable`; they only differ in whether lambdas
/// arrive quoted.
pub(super) struct HandlerTable {
    handlers: HashMap<MethodKey, Handler>,
}

impl HandlerTable {
    pub(super) fn add(&mut self, name: &str, parameter_count: usize, handler: Handler) {
        for declaring in [QUERYABLE, ENUMERABLE] {
            self.handlers
                .insert(MethodKey::new(&linq_type(declaring), name, parameter_count), handler);
        }
    }

    fn get(&self, key: &MethodKey) -> Option<Handler> {
        self.handlers.get(key).copied()
    }
}

fn handlers() -> &'static HandlerTable {
    static HANDLERS: OnceLock<HandlerTable> = OnceLock::new();
    HANDLERS.get_or_init(|| {
        let mut table = HandlerTable {
            handlers: HashMap::new(),
        };
        super::sequences::register(&mut table);
        table
    })
}

impl QueryInterpreter<'_> {
    pub(super) fn evaluate_call(&mut self, call: &ExprCall) -> Result<NativeValue> {
        if !call.method.info().is_static {
            return self.evaluate_instance_call(call);
        }
        let key = call.method.key();
        let handler = handlers()
            .get(&key)
            .ok_or_else(|| Error::unsupported_with("MethodCall", format!("no handler for {key}")))?;
        handler(self, call)
    }

    fn evaluate_instance_call(&mut self, call: &ExprCall) -> Result<NativeValue> {
        let Some(target) = &call.target else {
            return Err(Error::unsupported_with(
                "MethodCall",
                format!("instance method {} without a receiver", call.method.name()),
            ));
        };
        let target = self.evaluate(target)?;
        let text = match &target {
            NativeValue::Scalar(Scalar::String(text)) => text,
            NativeValue::Null => interp_bail!(
                format!("{} called on a null reference", call.method.name()),
                "NullReference"
            ),
            other => {
                return Err(Error::unsupported_with(
                    "MethodCall",
                    format!("{} on {}", call.method.name(), other.descriptor()),
                ))
            }
        };
        let mut arguments = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            match self.evaluate(argument)? {
                NativeValue::Scalar(scalar) => arguments.push(scalar),
                other => interp_bail!(format!(
                    "String::{} expects scalar arguments, found {}",
                    call.method.name(),
                    other.descriptor()
                )),
            }
        }
        Ok(ops::call_string_method(call.method.name(), text, &arguments)?.into())
    }
}
