use std::cmp::Ordering;

use itertools::Itertools;
use rq_core::ops::{self, BinaryOp};
use rq_core::value::{Grouping, ValueKey};

use super::calls::HandlerTable;
use super::*;

const ORDERING_OPERATORS: [&str; 4] = ["OrderBy", "OrderByDescending", "ThenBy", "ThenByDescending"];

pub(super) fn register(table: &mut HandlerTable) {
    table.add("Where", 2, filter);
    table.add("Select", 2, select);
    table.add("SelectMany", 2, select_many);
    for name in ORDERING_OPERATORS {
        table.add(name, 2, order);
    }
    table.add("GroupBy", 2, group_by);
    table.add("Take", 2, take);
    table.add("Skip", 2, skip);
    table.add("Distinct", 1, distinct);
    table.add("Count", 1, count);
    table.add("Count", 2, count);
    table.add("Any", 1, any);
    table.add("Any", 2, any);
    table.add("All", 2, all);
    table.add("First", 1, first);
    table.add("First", 2, first);
    table.add("FirstOrDefault", 1, first_or_default);
    table.add("FirstOrDefault", 2, first_or_default);
    table.add("Sum", 2, sum);
    table.add("Min", 2, min);
    table.add("Max", 2, max);
    table.add("Average", 2, average);
    table.add("Contains", 2, contains);
    table.add("ToList", 1, to_list);
}

fn lambda_argument(call: &ExprCall, index: usize) -> Result<&ExprLambda> {
    match call.arguments.get(index) {
        Some(Expression::Lambda(lambda)) => Ok(lambda),
        Some(Expression::Quote(quote)) => Ok(&quote.lambda),
        Some(other) => Err(Error::unsupported_with(
            "MethodCall",
            format!(
                "{} expects a lambda argument, found {}",
                call.method.name(),
                other.kind_name()
            ),
        )),
        None => interp_bail!(format!("{} is missing argument {index}", call.method.name())),
    }
}

/// Element type of the sequence a call produces.
fn result_element(call: &ExprCall) -> TypeDescriptor {
    call.ty
        .descriptor()
        .element_type()
        .unwrap_or_else(TypeDescriptor::any)
}

fn single<'c>(call: &'c ExprCall, index: usize) -> Result<&'c Expression> {
    match call.arguments.get(index) {
        Some(argument) => Ok(argument),
        None => interp_bail!(format!("{} is missing argument {index}", call.method.name())),
    }
}

impl QueryInterpreter<'_> {
    fn source(&mut self, call: &ExprCall) -> Result<Sequence> {
        let source = single(call, 0)?;
        match self.evaluate(source)? {
            NativeValue::Sequence(sequence) => Ok(sequence),
            NativeValue::Grouping(grouping) => Ok(grouping.elements.clone()),
            NativeValue::Null => interp_bail!(
                format!("{} over a null source", call.method.name()),
                "NullReference"
            ),
            other => interp_bail!(format!(
                "{} expects a sequence, found {}",
                call.method.name(),
                other.descriptor()
            )),
        }
    }

    /// Apply `lambda` to every element, polling for cancellation.
    fn project(&mut self, items: &[NativeValue], lambda: &ExprLambda) -> Result<Vec<NativeValue>> {
        let mut projected = Vec::with_capacity(items.len());
        for item in items {
            self.check_cancelled()?;
            projected.push(self.invoke(lambda, vec![item.clone()])?);
        }
        Ok(projected)
    }

    /// Elements satisfying the optional predicate at `index`.
    fn matching(&mut self, call: &ExprCall, index: usize) -> Result<Vec<NativeValue>> {
        let source = self.source(call)?;
        if call.arguments.len() <= index {
            return Ok(source.items().to_vec());
        }
        let predicate = lambda_argument(call, index)?;
        let mut kept = Vec::new();
        for item in source.items() {
            self.check_cancelled()?;
            let test = self.invoke(predicate, vec![item.clone()])?;
            if self.truthy(&test, "predicate result")? {
                kept.push(item.clone());
            }
        }
        Ok(kept)
    }

    fn count_argument(&mut self, call: &ExprCall) -> Result<usize> {
        let count = self.evaluate(single(call, 1)?)?;
        match count.as_scalar().and_then(Scalar::as_int) {
            Some(count) => Ok(count.max(0) as usize),
            None => interp_bail!(format!(
                "{} expects an int count, found {}",
                call.method.name(),
                count.descriptor()
            )),
        }
    }
}

fn filter(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let element_type = result_element(call);
    let kept = interp.matching(call, 1)?;
    Ok(Sequence::new(element_type, kept).into())
}

fn select(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let source = interp.source(call)?;
    let selector = lambda_argument(call, 1)?;
    let items = interp.project(source.items(), selector)?;
    Ok(Sequence::new(result_element(call), items).into())
}

fn select_many(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let source = interp.source(call)?;
    let selector = lambda_argument(call, 1)?;
    let mut items = Vec::new();
    for inner in interp.project(source.items(), selector)? {
        match inner.as_items() {
            Some(inner) => items.extend(inner.iter().cloned()),
            None if inner.is_null() => {}
            None => interp_bail!(format!(
                "SelectMany selector must yield a sequence, found {}",
                inner.descriptor()
            )),
        }
    }
    Ok(Sequence::new(result_element(call), items).into())
}

/// `OrderBy(..).ThenBy(..)` chains are sorted in one pass with composite
/// keys, primary key first. The sort is stable.
fn order(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let mut keys = Vec::new();
    let mut current = call;
    loop {
        let name = current.method.name();
        keys.push((lambda_argument(current, 1)?, name.ends_with("Descending")));
        if name.starts_with("OrderBy") {
            break;
        }
        match single(current, 0)? {
            Expression::MethodCall(inner)
                if inner.method.info().is_static
                    && ORDERING_OPERATORS.contains(&inner.method.name()) =>
            {
                current = inner
            }
            _ => interp_bail!(format!("{name} must follow an ordering operator")),
        }
    }
    keys.reverse();

    let source = interp.source(current)?;
    let mut rows = Vec::with_capacity(source.len());
    for item in source.items() {
        interp.check_cancelled()?;
        let mut row = Vec::with_capacity(keys.len());
        for (selector, _) in &keys {
            row.push(interp.invoke(selector, vec![item.clone()])?.key());
        }
        rows.push((row, item.clone()));
    }
    let descending: Vec<bool> = keys.iter().map(|(_, descending)| *descending).collect();
    let items = rows
        .into_iter()
        .sorted_by(|(left, _), (right, _)| compare_rows(left, right, &descending))
        .map(|(_, item)| item)
        .collect();
    Ok(Sequence::new(source.element_type.clone(), items).into())
}

fn compare_rows(left: &[ValueKey], right: &[ValueKey], descending: &[bool]) -> Ordering {
    for ((left, right), descending) in left.iter().zip(right).zip(descending) {
        let ordering = left.cmp(right);
        let ordering = if *descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Groups in order of first appearance; elements keep source order.
fn group_by(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let Some(grouping_type) = call.ty.element_type().cloned() else {
        interp_bail!(format!("GroupBy result {} is not a sequence", call.ty.descriptor()));
    };
    let source = interp.source(call)?;
    let selector = lambda_argument(call, 1)?;
    let keys = interp.project(source.items(), selector)?;

    let mut index: HashMap<ValueKey, usize> = HashMap::new();
    let mut groups: Vec<(NativeValue, Vec<NativeValue>)> = Vec::new();
    for (key, item) in keys.into_iter().zip(source.items()) {
        let slot = *index.entry(key.key()).or_insert_with(|| {
            groups.push((key.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(item.clone());
    }

    let groups = groups
        .into_iter()
        .map(|(key, elements)| {
            let elements = Sequence::new(source.element_type.clone(), elements);
            Grouping::new(grouping_type.clone(), key, elements).map(NativeValue::Grouping)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Sequence::new(grouping_type.descriptor().clone(), groups).into())
}

fn take(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let source = interp.source(call)?;
    let count = interp.count_argument(call)?;
    let items = source.items().iter().take(count).cloned().collect();
    Ok(Sequence::new(source.element_type.clone(), items).into())
}

fn skip(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let source = interp.source(call)?;
    let count = interp.count_argument(call)?;
    let items = source.items().iter().skip(count).cloned().collect();
    Ok(Sequence::new(source.element_type.clone(), items).into())
}

fn distinct(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let source = interp.source(call)?;
    let items = source
        .items()
        .iter()
        .unique_by(|item| item.key())
        .cloned()
        .collect();
    Ok(Sequence::new(source.element_type.clone(), items).into())
}

fn count(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let matching = interp.matching(call, 1)?;
    Ok(NativeValue::int(matching.len() as i64))
}

fn any(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let matching = interp.matching(call, 1)?;
    Ok(NativeValue::bool(!matching.is_empty()))
}

fn all(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let source = interp.source(call)?;
    let predicate = lambda_argument(call, 1)?;
    for item in source.items() {
        interp.check_cancelled()?;
        let test = interp.invoke(predicate, vec![item.clone()])?;
        if !interp.truthy(&test, "predicate result")? {
            return Ok(NativeValue::bool(false));
        }
    }
    Ok(NativeValue::bool(true))
}

fn first(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    match interp.matching(call, 1)?.into_iter().next() {
        Some(item) => Ok(item),
        None => interp_bail!("sequence contains no matching element"),
    }
}

fn first_or_default(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    Ok(interp
        .matching(call, 1)?
        .into_iter()
        .next()
        .unwrap_or_else(|| default_value(&call.ty)))
}

/// Selected values with nulls dropped.
fn selected(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<Vec<Scalar>> {
    let source = interp.source(call)?;
    let selector = lambda_argument(call, 1)?;
    let mut values = Vec::with_capacity(source.len());
    for value in interp.project(source.items(), selector)? {
        match value {
            NativeValue::Null => {}
            NativeValue::Scalar(scalar) => values.push(scalar),
            other => interp_bail!(format!(
                "{} selector must yield a scalar, found {}",
                call.method.name(),
                other.descriptor()
            )),
        }
    }
    Ok(values)
}

fn sum(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let values = selected(interp, call)?;
    let zero = call
        .ty
        .primitive()
        .and_then(Scalar::default_of)
        .unwrap_or(Scalar::Int(0));
    let total = values
        .iter()
        .try_fold(zero, |total, value| ops::apply_binary(BinaryOp::Add, &total, value))?;
    Ok(total.into())
}

fn extreme(interp: &mut QueryInterpreter<'_>, call: &ExprCall, wanted: Ordering) -> Result<NativeValue> {
    let mut best: Option<Scalar> = None;
    for value in selected(interp, call)? {
        best = match best {
            Some(current) if ops::compare(&value, &current)? != wanted => Some(current),
            _ => Some(value),
        };
    }
    match best {
        Some(best) => Ok(best.into()),
        None if call.ty.primitive().is_some() => interp_bail!("sequence contains no elements"),
        None => Ok(NativeValue::Null),
    }
}

fn min(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    extreme(interp, call, Ordering::Less)
}

fn max(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    extreme(interp, call, Ordering::Greater)
}

fn average(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let values = selected(interp, call)?;
    interp_ensure!(!values.is_empty(), "sequence contains no elements");
    let mut total = 0.0;
    for value in &values {
        match value.as_f64() {
            Some(value) => total += value,
            None => interp_bail!(format!("cannot average non-numeric value {value}")),
        }
    }
    Ok(NativeValue::float(total / values.len() as f64))
}

fn contains(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let source = interp.source(call)?;
    let needle = interp.evaluate(single(call, 1)?)?;
    Ok(NativeValue::bool(
        source.items().iter().any(|item| item.same(&needle)),
    ))
}

fn to_list(interp: &mut QueryInterpreter<'_>, call: &ExprCall) -> Result<NativeValue> {
    let source = interp.source(call)?;
    Ok(Sequence::new(source.element_type.clone(), source.items().to_vec()).into())
}
