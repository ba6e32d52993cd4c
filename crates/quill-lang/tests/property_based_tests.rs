//! Property-based tests for the rewriter and the literal table.
use quill_lang::ast::Builder;
use quill_lang::ast::node::NodeRef;
use quill_lang::literal::canonical_key;
use quill_lang::runtime::ops::BinaryOp;
use quill_lang::{Dict, Engine, LiteralTable, Value};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
enum Expr {
    Number(i32),
    Float(f64),
    String(String),
    Bool(bool),
    Nil,
    Var,
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
}

mod strategies {
    use super::*;

    pub fn op() -> impl Strategy<Value = BinaryOp> {
        prop_oneof![
            Just(BinaryOp::Eq),
            Just(BinaryOp::Nq),
            Just(BinaryOp::In),
            Just(BinaryOp::Ni),
            Just(BinaryOp::Like),
            Just(BinaryOp::Add),
            Just(BinaryOp::Sub),
            Just(BinaryOp::Mul),
            Just(BinaryOp::Div),
            Just(BinaryOp::Rem),
        ]
    }

    /// Comparisons only invert cleanly on ordered operands, so these stay away from `NaN`:
    /// no strings, nil, division or remainder.
    pub fn relational_op() -> impl Strategy<Value = BinaryOp> {
        prop_oneof![
            Just(BinaryOp::Eq),
            Just(BinaryOp::Nq),
            Just(BinaryOp::Lt),
            Just(BinaryOp::Gt),
            Just(BinaryOp::Le),
            Just(BinaryOp::Ge),
            Just(BinaryOp::Add),
            Just(BinaryOp::Sub),
            Just(BinaryOp::Mul),
        ]
    }

    pub fn relational_expr() -> impl Strategy<Value = Expr> {
        let leaf = prop_oneof![
            (-100i32..100).prop_map(Expr::Number),
            any::<bool>().prop_map(Expr::Bool),
            Just(Expr::Var),
        ];
        leaf.prop_recursive(4, 32, 3, |inner| {
            prop_oneof![
                (relational_op(), inner.clone(), inner.clone())
                    .prop_map(|(op, l, r)| Expr::Binary(op, Box::new(l), Box::new(r))),
                inner.clone().prop_map(|e| Expr::Not(Box::new(e))),
                inner.clone().prop_map(|e| Expr::Neg(Box::new(e))),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::And(Box::new(l), Box::new(r))),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::Or(Box::new(l), Box::new(r))),
                (inner.clone(), inner.clone(), inner)
                    .prop_map(|(c, t, e)| Expr::Cond(Box::new(c), Box::new(t), Box::new(e))),
            ]
        })
    }

    pub fn leaf() -> impl Strategy<Value = Expr> {
        prop_oneof![
            (-100i32..100).prop_map(Expr::Number),
            prop_oneof![Just(0.0), Just(-0.0), Just(f64::NAN), -10.0f64..10.0].prop_map(Expr::Float),
            "[a-c]{0,3}".prop_map(Expr::String),
            any::<bool>().prop_map(Expr::Bool),
            Just(Expr::Nil),
            Just(Expr::Var),
        ]
    }

    pub fn expr() -> impl Strategy<Value = Expr> {
        leaf().prop_recursive(4, 32, 3, |inner| {
            prop_oneof![
                (op(), inner.clone(), inner.clone()).prop_map(|(op, l, r)| Expr::Binary(op, Box::new(l), Box::new(r))),
                inner.clone().prop_map(|e| Expr::Not(Box::new(e))),
                inner.clone().prop_map(|e| Expr::Neg(Box::new(e))),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::And(Box::new(l), Box::new(r))),
                (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::Or(Box::new(l), Box::new(r))),
                (inner.clone(), inner.clone(), inner)
                    .prop_map(|(c, t, e)| Expr::Cond(Box::new(c), Box::new(t), Box::new(e))),
            ]
        })
    }

    pub fn value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Nil),
            any::<bool>().prop_map(Value::Bool),
            prop_oneof![Just(0.0), Just(-0.0), Just(f64::NAN), -5.0f64..5.0].prop_map(Value::from),
            "[a-c]{0,2}".prop_map(|s| Value::from(s.as_str())),
        ];
        leaf.prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3).prop_map(Value::array),
                prop::collection::btree_map("[a-c]", inner, 0..3).prop_map(|entries| {
                    Value::object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect::<Dict>())
                }),
            ]
        })
    }
}

fn build(b: &mut Builder, expr: &Expr) -> NodeRef {
    match expr {
        Expr::Number(n) => b.number(f64::from(*n)),
        Expr::Float(n) => b.number(*n),
        Expr::String(s) => b.string(s),
        Expr::Bool(v) => b.literal(*v),
        Expr::Nil => b.nil(),
        Expr::Var => b.ident("x"),
        Expr::Binary(op, l, r) => {
            let l = build(b, l);
            let r = build(b, r);
            b.binary(*op, l, r)
        }
        Expr::Not(e) => {
            let e = build(b, e);
            b.not(e)
        }
        Expr::Neg(e) => {
            let e = build(b, e);
            b.neg(e)
        }
        Expr::And(l, r) => {
            let l = build(b, l);
            let r = build(b, r);
            b.and(l, r)
        }
        Expr::Or(l, r) => {
            let l = build(b, l);
            let r = build(b, r);
            b.or(l, r)
        }
        Expr::Cond(c, t, e) => {
            let c = build(b, c);
            let t = build(b, t);
            let e = build(b, e);
            b.conditional(c, t, e)
        }
    }
}

fn render(optimize: bool, expr: &Expr, x: &Value) -> String {
    let mut engine = Engine::default();
    engine.set_optimize(optimize);

    let mut b = Builder::new();
    let e = build(&mut b, expr);
    let root = b.statements(vec![b.output(e)]);
    let template = engine.compile(&b.finish(root)).unwrap();

    let mut data = Dict::new();
    data.insert("x".into(), x.clone());
    engine.render(&template, &Value::object(data)).unwrap()
}

proptest! {
    #[test]
    fn folding_preserves_rendered_output(expr in strategies::expr(), x in strategies::value()) {
        prop_assert_eq!(render(true, &expr, &x), render(false, &expr, &x));
    }

    #[test]
    fn relational_folding_preserves_rendered_output(expr in strategies::relational_expr(), x in -50i32..50) {
        let x = Value::from(f64::from(x));
        prop_assert_eq!(render(true, &expr, &x), render(false, &expr, &x));
    }

    #[test]
    fn equal_literals_share_an_id(values in prop::collection::vec(strategies::value(), 1..12)) {
        let mut table = LiteralTable::new();
        let ids = values.iter().map(|v| table.insert(v.clone())).collect::<Vec<_>>();
        let again = values.iter().map(|v| table.insert(v.clone())).collect::<Vec<_>>();

        prop_assert_eq!(
            ids.iter().map(|id| id.index()).collect::<Vec<_>>(),
            again.iter().map(|id| id.index()).collect::<Vec<_>>()
        );

        let distinct = values.iter().map(canonical_key).collect::<BTreeSet<_>>();
        prop_assert_eq!(table.len(), distinct.len());

        for (value, id) in values.iter().zip(&ids) {
            let stored = table.get(*id).map(canonical_key);
            prop_assert_eq!(stored, Some(canonical_key(value)));
        }
    }
}
