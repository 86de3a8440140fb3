use std::sync::Arc;
use xmlview_engine::{execute, Fragment, InMemorySource, ProcessingError, SourceError, Table};
use xmlview_model::{
    AttributeDef, ChoiceDef, CommentDef, CriteriaDef, DocumentDef, ElementDef, Expr, Value,
};
use xmlview_planner::{DocumentPlanner, OrderKey, XmlQuery};

mod common;

use common::{catalog, catalog_source, item_ids, items, produce, supplier, supplier_ids};

#[test]
fn renders_rows_in_source_order() {
    let source = catalog_source();
    let output = produce(catalog(), &XmlQuery::new(), &source).unwrap();
    assert_eq!(output.documents.len(), 1);
    assert_eq!(item_ids(&output), ["001", "002", "003", "004"]);

    let items = items(&output);
    assert_eq!(supplier_ids(items[0]), ["51", "52", "55"]);
    assert_eq!(supplier_ids(items[2]), ["54"]);
    assert_eq!(
        items[0].child("Quantity").and_then(|q| q.text.as_deref()),
        Some("5")
    );
    // No suppliers: the optional wrapper is vacant.
    assert!(items[3].child("Suppliers").is_none());
    assert_eq!(source.open_cursors(), 0);
}

#[test]
fn order_by_sorts_within_parent() {
    let source = catalog_source();
    let query = XmlQuery::new().order_by(OrderKey::desc("Quantity"));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(item_ids(&output), ["003", "001", "004", "002"]);

    let query = XmlQuery::new().order_by(OrderKey::desc("SupplierID"));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(supplier_ids(items(&output)[0]), ["55", "52", "51"]);
}

#[test]
fn order_by_breaks_ties_with_secondary_key() {
    let row = |num: &str, name: &str, quantity: i64| {
        vec![Value::string(num), Value::string(name), Value::integer(quantity)]
    };
    let source = InMemorySource::new()
        .table(
            "xmltest.items",
            Table::new(["itemNum", "itemName", "itemQuantity"])
                .row(row("001", "Wrench", 5))
                .row(row("002", "Hammer", 5))
                .row(row("004", "Pliers", 1))
                .row(row("003", "Awl", 5)),
        )
        .table("xmltest.suppliers", common::suppliers_table());

    let query = XmlQuery::new()
        .order_by(OrderKey::desc("Quantity"))
        .order_by(OrderKey::asc("Item.Name"));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(item_ids(&output), ["003", "002", "001", "004"]);

    let query = XmlQuery::new()
        .order_by(OrderKey::desc("Quantity"))
        .order_by(OrderKey::desc("Item.Name"));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(item_ids(&output), ["001", "002", "003", "004"]);

    // Without a secondary key, ties keep source order.
    let query = XmlQuery::new().order_by(OrderKey::desc("Quantity"));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(item_ids(&output), ["001", "002", "003", "004"]);
}

#[test]
fn bare_predicate_restricts_outermost_class() {
    let source = catalog_source();
    let query = XmlQuery::new().filter(Expr::path("SupplierID").equals(Expr::literal("52")));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(item_ids(&output), ["001", "002"]);
    let items = items(&output);
    assert_eq!(supplier_ids(items[0]), ["51", "52", "55"]);
    assert_eq!(supplier_ids(items[1]), ["52", "53"]);
}

#[test]
fn context_predicate_restricts_nested_class() {
    let source = catalog_source();
    let query = XmlQuery::new()
        .filter(Expr::context("SupplierID", "SupplierID").equals(Expr::literal("52")));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(item_ids(&output), ["001", "002", "003", "004"]);
    let items = items(&output);
    assert_eq!(supplier_ids(items[0]), ["52"]);
    assert_eq!(supplier_ids(items[1]), ["52"]);
    assert!(supplier_ids(items[2]).is_empty());
}

#[test]
fn row_limit_truncates_per_parent_row() {
    let source = catalog_source();
    let query = XmlQuery::new().filter(Expr::row_limit("Supplier", 2));
    let output = produce(catalog(), &query, &source).unwrap();
    let items = items(&output);
    assert_eq!(supplier_ids(items[0]), ["51", "52"]);
    assert_eq!(supplier_ids(items[1]), ["52", "53"]);
    assert_eq!(supplier_ids(items[2]), ["54"]);

    let query = XmlQuery::new().filter(Expr::row_limit("Item", 2));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(item_ids(&output), ["001", "002"]);
}

#[test]
fn row_limit_applies_after_ordering() {
    let source = catalog_source();
    let query = XmlQuery::new()
        .filter(Expr::row_limit("Item", 1))
        .order_by(OrderKey::desc("Quantity"));
    let output = produce(catalog(), &query, &source).unwrap();
    assert_eq!(item_ids(&output), ["003"]);
}

#[test]
fn row_limit_exception_fails_production() {
    let source = catalog_source();
    let query = XmlQuery::new().filter(Expr::row_limit_exception("Supplier", 2));
    let err = produce(catalog(), &query, &source).unwrap_err();
    assert_eq!(
        err,
        ProcessingError::RowLimitExceeded {
            node: "/Catalogs/Catalog/Items/Item/Suppliers/Supplier".into(),
            limit: 2
        }
    );
    assert_eq!(source.open_cursors(), 0);

    let query = XmlQuery::new().filter(Expr::row_limit_exception("Supplier", 3));
    assert!(produce(catalog(), &query, &source).is_ok());
}

#[test]
fn max_occurs_truncates_or_fails() {
    let source = catalog_source();
    let output = produce(
        common::catalog_with(supplier().optional().max_occurs(2)),
        &XmlQuery::new(),
        &source,
    )
    .unwrap();
    assert_eq!(supplier_ids(items(&output)[0]), ["51", "52"]);

    let err = produce(
        common::catalog_with(supplier().optional()),
        &XmlQuery::new(),
        &source,
    )
    .unwrap_err();
    assert!(matches!(err, ProcessingError::TooManyOccurrences { .. }));
}

#[test]
fn required_nodes_without_rows_get_placeholders() {
    let supplier = ElementDef::new("Supplier")
        .source("xmltest.suppliers")
        .param("itemNum", "itemNum")
        .unbounded()
        .child(AttributeDef::column("SupplierID", "supplierNum"))
        .child(AttributeDef::column("Rating", "supplierRating").optional())
        .child(ElementDef::column("Name", "supplierName").default_value("n/a"))
        .child(ElementDef::column("Zip", "supplierZipCode").nillable())
        .child(ElementDef::column("Phone", "supplierPhone"));
    let source = InMemorySource::new()
        .table("xmltest.items", common::items_table())
        .table(
            "xmltest.suppliers",
            Table::new([
                "itemNum",
                "supplierNum",
                "supplierName",
                "supplierZipCode",
                "supplierRating",
                "supplierPhone",
            ])
            .parameters(["itemNum"])
            .row(["001", "51", "Acme", "60601", "A", "555"]),
        );
    let output = produce(common::catalog_with(supplier), &XmlQuery::new(), &source).unwrap();
    let items = items(&output);

    let real = items[0].child("Suppliers").and_then(|s| s.child("Supplier")).unwrap();
    assert_eq!(real.attribute("Rating"), Some("A"));

    let placeholder = items[3]
        .child("Suppliers")
        .and_then(|s| s.child("Supplier"))
        .unwrap();
    assert_eq!(placeholder.attribute("SupplierID"), Some(""));
    assert_eq!(placeholder.attribute("Rating"), None);
    let name = placeholder.child("Name").unwrap();
    assert_eq!(name.text.as_deref(), Some("n/a"));
    let zip = placeholder.child("Zip").unwrap();
    assert!(zip.nil);
    let phone = placeholder.child("Phone").unwrap();
    assert!(!phone.nil);
    assert!(phone.text.is_none());
}

#[test]
fn classes_nested_under_placeholder_stay_empty() {
    let doc = DocumentDef::new("xmltest.required")
        .root(
            ElementDef::new("Items").child(
                ElementDef::new("Item")
                    .source("xmltest.items")
                    .child(AttributeDef::column("ItemID", "itemNum"))
                    .child(supplier()),
            ),
        )
        .build()
        .unwrap();
    let source = InMemorySource::new()
        .table("xmltest.items", Table::new(["itemNum", "itemName", "itemQuantity"]))
        .table("xmltest.suppliers", common::suppliers_table());
    let output = produce(Arc::new(doc), &XmlQuery::new(), &source).unwrap();

    let root = &output.documents[0].root;
    let item = root.child("Item").unwrap();
    assert_eq!(item.attribute("ItemID"), Some(""));
    assert!(item.child("Supplier").is_none());
    assert_eq!(root.elements().count(), 1);
    assert_eq!(output.stats.cursors_opened, 1);
}

#[test]
fn fixed_values_win_over_columns() {
    let doc = DocumentDef::new("xmltest.fixed")
        .root(
            ElementDef::new("Items").child(
                ElementDef::new("Item")
                    .source("xmltest.items")
                    .optional()
                    .unbounded()
                    .child(AttributeDef::fixed("kind", "tool"))
                    .child(ElementDef::column("Name", "itemName").fixed("hidden")),
            ),
        )
        .build()
        .unwrap();
    let source = catalog_source();
    let output = produce(Arc::new(doc), &XmlQuery::new(), &source).unwrap();
    let root = &output.documents[0].root;
    for item in root.elements() {
        assert_eq!(item.attribute("kind"), Some("tool"));
        assert_eq!(item.child("Name").and_then(|n| n.text.as_deref()), Some("hidden"));
    }
}

fn stock_document(exception_on_default: bool, with_default: bool) -> DocumentDef {
    let mut choice = ChoiceDef::new().branch(
        CriteriaDef::when(Expr::column("itemQuantity").greater_than(Expr::literal(0)))
            .child(ElementDef::new("InStock").fixed("yes")),
    );
    if with_default {
        choice = choice.branch(CriteriaDef::otherwise().child(ElementDef::new("OutOfStock").fixed("yes")));
    }
    if exception_on_default {
        choice = choice.exception_on_default();
    }
    DocumentDef::new("xmltest.stock").root(
        ElementDef::new("Items").child(
            ElementDef::new("Item")
                .source("xmltest.items")
                .optional()
                .unbounded()
                .child(AttributeDef::column("ItemID", "itemNum"))
                .child(ElementDef::column("Quantity", "itemQuantity"))
                .child(choice),
        ),
    )
}

#[test]
fn choice_renders_first_matching_branch() {
    let source = catalog_source();
    let doc = Arc::new(stock_document(true, true).build().unwrap());
    let output = produce(doc, &XmlQuery::new(), &source).unwrap();
    let states: Vec<String> = output.documents[0]
        .root
        .elements()
        .map(|item| {
            item.elements()
                .filter(|e| e.name != "Quantity")
                .map(|e| e.name.clone())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect();
    assert_eq!(states, ["InStock", "OutOfStock", "InStock", "InStock"]);
}

#[test]
fn choice_without_match_fails_when_requested() {
    let source = catalog_source();
    let doc = Arc::new(stock_document(true, false).build().unwrap());
    let err = produce(doc, &XmlQuery::new(), &source).unwrap_err();
    assert!(matches!(err, ProcessingError::NoMatchingBranch(ref path) if path.ends_with("/choice")));

    let doc = Arc::new(stock_document(false, false).build().unwrap());
    let output = produce(doc, &XmlQuery::new(), &source).unwrap();
    let hammer = output.documents[0].root.elements().nth(1).unwrap();
    assert_eq!(hammer.elements().count(), 1);
}

#[test]
fn recursion_truncates_at_limit() {
    let source = common::org_source();
    let output = produce(common::employees(3, false), &XmlQuery::new(), &source).unwrap();
    let alice = output.documents[0].root.child("Employee").unwrap();
    assert_eq!(alice.attribute("id"), Some("1"));
    assert_eq!(common::report_names(alice), ["Bob", "Dan", "Carol"]);

    let output = produce(common::employees(1, false), &XmlQuery::new(), &source).unwrap();
    let alice = output.documents[0].root.child("Employee").unwrap();
    assert!(alice.child("Reports").is_none());
}

#[test]
fn recursion_limit_exception_requires_deeper_rows() {
    let source = common::org_source();
    let err = produce(common::employees(3, true), &XmlQuery::new(), &source).unwrap_err();
    assert!(matches!(err, ProcessingError::RecursionLimitExceeded { limit: 3, .. }));
    assert_eq!(source.open_cursors(), 0);

    let output = produce(common::employees(4, true), &XmlQuery::new(), &source).unwrap();
    let alice = output.documents[0].root.child("Employee").unwrap();
    assert_eq!(common::report_names(alice), ["Bob", "Dan", "Eve", "Carol"]);
}

#[test]
fn bound_root_yields_one_document_per_row() {
    let doc = Arc::new(
        DocumentDef::new("xmltest.each")
            .root(
                ElementDef::new("Item")
                    .source("xmltest.items")
                    .child(AttributeDef::column("ItemID", "itemNum")),
            )
            .build()
            .unwrap(),
    );
    let source = catalog_source();
    let output = produce(Arc::clone(&doc), &XmlQuery::new(), &source).unwrap();
    let ids: Vec<_> = output
        .documents
        .iter()
        .filter_map(|d| d.root.attribute("ItemID"))
        .collect();
    assert_eq!(ids, ["001", "002", "003", "004"]);
    assert_eq!(output.stats.documents, 4);

    let empty = InMemorySource::new().table("xmltest.items", Table::new(["itemNum"]));
    let output = produce(doc, &XmlQuery::new(), &empty).unwrap();
    assert_eq!(output.documents.len(), 1);
    assert!(output.documents[0].root.attributes.is_empty());
    assert_eq!(output.documents[0].root.name, "Item");
}

#[test]
fn vacant_optional_elements_are_omitted() {
    let doc = DocumentDef::new("xmltest.sparse").root(
        ElementDef::new("Root")
            .child(CommentDef::new("generated"))
            .child(ElementDef::new("Notes").optional())
            .child(ElementDef::new("Marker").optional().fixed("x"))
            .child(ElementDef::new("Required")),
    );
    let program = DocumentPlanner::default()
        .plan(Arc::new(doc.build().unwrap()), &XmlQuery::new())
        .unwrap();
    let output = execute(&program, &InMemorySource::new()).unwrap();
    let root = &output.documents[0].root;
    assert!(matches!(&root.children[0], Fragment::Comment(text) if text == "generated"));
    let names: Vec<_> = root.elements().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Marker", "Required"]);
}

#[test]
fn staging_tables_are_read_once() {
    let doc = DocumentDef::new("xmltest.staged").root(
        ElementDef::new("Catalogs").staging("xmltest.suppliers").child(
            ElementDef::new("Catalog")
                .child(ElementDef::new("Items").child(common::item(supplier().optional().unbounded()))),
        ),
    );
    let staged_source = catalog_source();
    let staged = produce(Arc::new(doc.build().unwrap()), &XmlQuery::new(), &staged_source).unwrap();
    assert_eq!(staged.stats.staging_materialized, 1);
    // One cursor for items, one to materialize suppliers.
    assert_eq!(staged_source.cursors_opened(), 2);

    let direct_source = catalog_source();
    let direct = produce(catalog(), &XmlQuery::new(), &direct_source).unwrap();
    assert_eq!(direct_source.cursors_opened(), 5);
    assert_eq!(staged.documents[0].root, direct.documents[0].root);
}

#[test]
fn source_failures_abort_and_release_cursors() {
    let source = InMemorySource::new()
        .table("xmltest.items", common::items_table())
        .table("xmltest.suppliers", common::suppliers_table().fail_after(1));
    let err = produce(catalog(), &XmlQuery::new(), &source).unwrap_err();
    assert!(matches!(err, ProcessingError::DataAccess(SourceError::Failed { .. })));
    assert_eq!(source.open_cursors(), 0);
    assert!(source.cursors_opened() >= 2);
}

#[test]
fn missing_columns_are_reported() {
    let source = InMemorySource::new()
        .table("xmltest.items", common::items_table())
        .table(
            "xmltest.suppliers",
            Table::new(["itemNum", "supplierNum", "supplierName"]).parameters(["itemNum"]),
        );
    let err = produce(catalog(), &XmlQuery::new(), &source).unwrap_err();
    assert_eq!(
        err,
        ProcessingError::MissingColumn {
            group: "xmltest.suppliers".into(),
            column: "supplierZipCode".into()
        }
    );
}

#[test]
fn parameters_follow_parent_rows() {
    let source = InMemorySource::new()
        .table(
            "xmltest.items",
            Table::new(["itemNum", "itemName", "itemQuantity"])
                .row(vec![Value::string("002"), Value::string("Hammer"), Value::Null]),
        )
        .table("xmltest.suppliers", common::suppliers_table());
    let output = produce(catalog(), &XmlQuery::new(), &source).unwrap();
    let items = items(&output);
    assert_eq!(supplier_ids(items[0]), ["52", "53"]);
    // Null value, not nillable, no default: empty element.
    let quantity = items[0].child("Quantity").unwrap();
    assert!(quantity.text.is_none() && !quantity.nil);
}

#[test]
fn stats_count_work_done() {
    let source = catalog_source();
    let output = produce(catalog(), &XmlQuery::new(), &source).unwrap();
    assert_eq!(output.stats.cursors_opened, 5);
    assert_eq!(output.stats.tuples_read, 10);
    assert_eq!(output.stats.staging_materialized, 0);
    assert!(output.stats.fragments_emitted > 10);
}
