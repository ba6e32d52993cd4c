use super::{Context, WarningKind};
use crate::ast::node::{Node, NodeRef, PartialDef, statements};
use itertools::Itertools;
use std::rc::Rc;

fn definition(node: &Node) -> Option<&Rc<PartialDef>> {
    match node {
        Node::Partial(def) => Some(def),
        _ => None,
    }
}

/// Moves trailing partial definitions ahead of the statements before them.
///
/// Only a list shaped `[statements…, definitions…]` is reordered. Definitions that are
/// already leading are left alone, as is any other interleaving, which is reported.
pub(super) fn hoist(cx: &mut Context<'_>, items: &[NodeRef]) -> Option<Vec<NodeRef>> {
    let first = items.iter().position(|item| definition(item).is_some())?;
    let (before, after) = items.split_at(first);

    if after.iter().all(|item| definition(item).is_some()) {
        if before.is_empty() {
            return None;
        }
        return Some(after.iter().chain(before).cloned().collect());
    }

    let leading = after
        .iter()
        .skip_while(|item| definition(item).is_some())
        .all(|item| definition(item).is_none());
    if first == 0 && leading {
        return None;
    }

    let names = items
        .iter()
        .filter_map(|item| definition(item))
        .map(|def| def.name.as_str())
        .unique()
        .join(", ");
    cx.warn(
        WarningKind::AmbiguousHoisting,
        format!("Partial definitions of {names} are interleaved with other statements and were not hoisted"),
    );
    None
}

/// Merges adjacent definitions of the same partial into one guarded dispatch chain.
pub(super) fn merge(cx: &mut Context<'_>, items: &[NodeRef]) -> Option<Vec<NodeRef>> {
    if !items.iter().any(|item| definition(item).is_some()) {
        return None;
    }

    let mut merged = Vec::with_capacity(items.len());
    let mut changed = false;
    let mut rest = items;

    while let Some((item, tail)) = rest.split_first() {
        let Some(def) = definition(item) else {
            merged.push(Rc::clone(item));
            rest = tail;
            continue;
        };

        let len = rest
            .iter()
            .take_while(|item| definition(item).is_some_and(|d| d.name == def.name))
            .count();
        let group = rest[..len].iter().filter_map(|item| definition(item)).collect::<Vec<_>>();
        rest = &rest[len..];

        match merge_group(cx, &group) {
            Some(nodes) => {
                changed = true;
                merged.extend(nodes);
            }
            None => merged.push(Rc::clone(item)),
        }
    }

    changed.then_some(merged)
}

/// `None` when the group is a single unguarded definition.
fn merge_group(cx: &mut Context<'_>, group: &[&Rc<PartialDef>]) -> Option<Vec<NodeRef>> {
    let [first, ..] = group else {
        return None;
    };

    if group.iter().any(|def| def.params != first.params) {
        cx.warn(
            WarningKind::SignatureMismatch,
            format!(
                "Definitions of partial \"{}\" have different parameters and were not merged",
                first.name
            ),
        );
        return Some(
            group
                .iter()
                .map(|def| match chain(std::slice::from_ref(def)) {
                    Some(normalized) => Rc::new(Node::Partial(Rc::new(normalized))),
                    None => Rc::new(Node::Partial(Rc::clone(def))),
                })
                .collect(),
        );
    }

    let remaining = match group.iter().rposition(|def| def.guard.is_none()) {
        Some(last) if last > 0 => {
            cx.warn(
                WarningKind::PartialRedefined,
                format!("Partial \"{}\" is redefined without a guard", first.name),
            );
            &group[last..]
        }
        _ => group,
    };

    match chain(remaining) {
        Some(def) => Some(vec![Rc::new(Node::Partial(Rc::new(def)))]),
        None if remaining.len() < group.len() => Some(vec![Rc::new(Node::Partial(Rc::clone(remaining[0])))]),
        None => None,
    }
}

/// Folds definitions into one unguarded definition whose body checks the latest guard
/// first. A chain without an unguarded base ends by delegating to the previous binding.
fn chain(defs: &[&Rc<PartialDef>]) -> Option<PartialDef> {
    let [first, ..] = defs else {
        return None;
    };
    let (mut body, delegates, guarded) = match first.guard {
        None if defs.len() == 1 => return None,
        None => (Rc::clone(&first.body), false, &defs[1..]),
        Some(_) => (statements(vec![Rc::new(Node::Delegate)]), true, defs),
    };

    for def in guarded {
        let Some(guard) = &def.guard else {
            continue;
        };
        body = statements(vec![Rc::new(Node::If {
            cond: Rc::clone(guard),
            then: Rc::clone(&def.body),
            otherwise: Some(body),
        })]);
    }

    Some(PartialDef {
        id: first.id,
        name: first.name.clone(),
        params: first.params.clone(),
        guard: None,
        body,
        delegates,
    })
}

/// A partial definition becomes an assignment of a closure to its name.
pub(super) fn lower(node: &NodeRef) -> Option<NodeRef> {
    let def = definition(node)?;
    Some(Rc::new(Node::Assign(vec![(
        def.name.clone(),
        Rc::new(Node::Closure(Rc::clone(def))),
    )])))
}
