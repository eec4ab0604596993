//! Property-based tests for the atom store.
//!
//! - Re-adding any atom returns the handle it already has
//! - No live link ever points at a removed atom, whatever the removal mode
//! - Every atom's text form parses back to the same expression

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::atom::{parse, render, AtomExpr, AtomType, Handle, TruthValue};
    use crate::store::{AtomSpace, RemoveMode};

    const NODE_TYPES: [AtomType; 3] = [
        AtomType::ConceptNode,
        AtomType::PredicateNode,
        AtomType::WordNode,
    ];
    const LINK_TYPES: [AtomType; 3] = [
        AtomType::ListLink,
        AtomType::InheritanceLink,
        AtomType::EvaluationLink,
    ];

    /// One insertion step: a node, or a link over earlier atoms (by index).
    #[derive(Debug, Clone)]
    enum Step {
        Node(usize, String),
        Link(usize, Vec<usize>),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0usize..3, "[a-z]{1,4}").prop_map(|(t, n)| Step::Node(t, n)),
            (0usize..3, prop::collection::vec(any::<usize>(), 1..4))
                .prop_map(|(t, out)| Step::Link(t, out)),
        ]
    }

    /// Apply steps, skipping links until at least one atom exists.
    fn build(space: &AtomSpace, steps: &[Step]) -> Vec<Handle> {
        let mut handles: Vec<Handle> = Vec::new();
        for s in steps {
            let h = match s {
                Step::Node(t, name) => space.add_node(NODE_TYPES[*t].clone(), name, None).unwrap(),
                Step::Link(t, out) => {
                    if handles.is_empty() {
                        continue;
                    }
                    let outgoing: Vec<Handle> =
                        out.iter().map(|i| handles[i % handles.len()]).collect();
                    space
                        .add_link(LINK_TYPES[*t].clone(), &outgoing, None)
                        .unwrap()
                }
            };
            handles.push(h);
        }
        handles
    }

    fn truth_value() -> impl Strategy<Value = TruthValue> {
        (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(s, c)| TruthValue::new(s, c).unwrap())
    }

    fn expr() -> impl Strategy<Value = AtomExpr> {
        let leaf = (0usize..3, "[ -~]{0,8}")
            .prop_map(|(t, name)| AtomExpr::node(NODE_TYPES[t].clone(), name));
        leaf.prop_recursive(3, 16, 3, |inner| {
            (0usize..3, prop::collection::vec(inner, 0..3))
                .prop_map(|(t, out)| AtomExpr::link(LINK_TYPES[t].clone(), out))
        })
    }

    fn assert_no_dangling(space: &AtomSpace) -> Result<(), TestCaseError> {
        for h in space.handles().unwrap() {
            for target in space.get_outgoing(h).unwrap() {
                prop_assert!(space.contains(target), "{} points at removed {}", h, target);
                prop_assert!(space.get_incoming(target).unwrap().contains(&h));
            }
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn adding_twice_is_idempotent(steps in prop::collection::vec(step(), 1..40)) {
            let space = AtomSpace::new();
            let first = build(&space, &steps);
            let size = space.size();
            let second = build(&space, &steps);

            prop_assert_eq!(first, second);
            prop_assert_eq!(space.size(), size);
        }

        #[test]
        fn removal_never_leaves_dangling_links(
            steps in prop::collection::vec(step(), 1..40),
            victims in prop::collection::vec((any::<usize>(), 0u8..3), 1..10),
        ) {
            let space = AtomSpace::new();
            let handles = build(&space, &steps);
            // Only links were generated, and none had a target.
            prop_assume!(!handles.is_empty());
            for (pick, mode) in victims {
                let victim = handles[pick % handles.len()];
                if !space.contains(victim) {
                    continue;
                }
                let mode = match mode {
                    0 => RemoveMode::Strict,
                    1 => RemoveMode::Recursive,
                    _ => RemoveMode::Force,
                };
                let had_dependents = !space.get_incoming(victim).unwrap().is_empty();
                let result = space.remove_atom(victim, mode);
                if mode == RemoveMode::Strict && had_dependents {
                    prop_assert!(result.is_err());
                    prop_assert!(space.contains(victim));
                } else {
                    let removed = result.unwrap();
                    prop_assert!(removed.contains(&victim));
                    for h in removed {
                        prop_assert!(!space.contains(h));
                    }
                }
                assert_no_dangling(&space)?;
            }
        }

        #[test]
        fn text_form_round_trips(e in expr(), tv in truth_value()) {
            let e = e.with_tv(tv);
            prop_assert_eq!(parse(&render(&e)).unwrap(), e.clone());

            let space = AtomSpace::new();
            let h = space.add_expr(&e).unwrap();
            prop_assert_eq!(space.atom_expr(h).unwrap(), e);
        }
    }
}
