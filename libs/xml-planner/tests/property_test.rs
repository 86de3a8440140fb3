//! Property-based tests using QuickCheck

use quickcheck::{QuickCheck, TestResult};
use xmlview_model::Expr;
use xmlview_planner::{DocumentPlanner, Program, XmlQuery};

mod common;

fn pool() -> Vec<Expr> {
    vec![
        Expr::context("SupplierID", "SupplierID").equals(Expr::literal("52")),
        Expr::path("ItemID").not_equals(Expr::literal("003")),
        Expr::path("Zip").like("6%"),
        Expr::path("Quantity").greater_than(Expr::literal(0)),
        Expr::row_limit("supplier", 2),
        Expr::path("Item.Name").is_not_null(),
    ]
}

/// Filters and caps per class, independent of declaration order.
fn shape(program: &Program) -> Vec<(usize, Vec<String>, Option<usize>)> {
    program
        .classes()
        .iter()
        .map(|c| {
            let mut filters: Vec<String> = c.filters.iter().map(|f| f.text.clone()).collect();
            filters.sort();
            (c.id.0, filters, c.cap.map(|cap| cap.limit))
        })
        .collect()
}

fn query(predicates: &[Expr]) -> XmlQuery {
    predicates
        .iter()
        .cloned()
        .fold(XmlQuery::new(), |query, predicate| query.filter(predicate))
}

/// Property: conjunct order never changes scoping
#[test]
fn prop_conjunct_order_is_irrelevant() {
    fn prop(mask: u8, rotation: usize) -> TestResult {
        let selected: Vec<Expr> = pool()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, e)| e)
            .collect();
        if selected.len() < 2 {
            return TestResult::discard();
        }
        let mut rotated = selected.clone();
        rotated.rotate_left(rotation % selected.len());
        rotated.reverse();

        let planner = DocumentPlanner::default();
        let a = planner.plan(common::catalog(), &query(&selected)).unwrap();
        let b = planner.plan(common::catalog(), &query(&rotated)).unwrap();
        TestResult::from_bool(shape(&a) == shape(&b))
    }

    QuickCheck::new()
        .tests(100)
        .quickcheck(prop as fn(u8, usize) -> TestResult);
}

/// Property: recursion never unrolls beyond the limit
#[test]
fn prop_recursion_depths_match_limit() {
    fn prop(limit: u8) -> TestResult {
        let limit = i32::from(limit % 16);
        let program = DocumentPlanner::default()
            .plan(common::employees(limit, false), &XmlQuery::new())
            .unwrap();
        let recursion = &program.recursions()[0];
        let expected = if limit <= 0 { 10 } else { limit as u32 };
        TestResult::from_bool(
            recursion.limit == expected
                && recursion.depths.len() == expected as usize
                && program
                    .classes()
                    .iter()
                    .all(|c| c.depth <= recursion.limit),
        )
    }

    QuickCheck::new()
        .tests(50)
        .quickcheck(prop as fn(u8) -> TestResult);
}
