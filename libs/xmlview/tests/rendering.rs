use std::sync::Arc;
use xmlview::{
    Error, Expr, OrderKey, ProcessingError, SerializerOptions, ViewOptions, XmlQuery, XmlView,
};

mod common;

use common::{document, items_def, source, view};

#[test]
fn renders_in_source_order() {
    let xml = view().render(&XmlQuery::new(), &source()).unwrap();
    assert_eq!(
        xml,
        vec![document(
            "<Item ItemID=\"001\"><Name>Screwdriver</Name>\
             <Supplier SupplierID=\"51\"/><Supplier SupplierID=\"52\"/></Item>\
             <Item ItemID=\"002\"><Name>Hammer</Name><Supplier SupplierID=\"52\"/></Item>\
             <Item ItemID=\"003\"><Name>Wrench</Name><Supplier SupplierID=\"54\"/></Item>"
        )]
    );
}

#[test]
fn order_by_descending() {
    let query = XmlQuery::new().order_by(OrderKey::desc("ItemID"));
    let xml = view().render(&query, &source()).unwrap();
    let root = roxmltree::Document::parse(&xml[0]).unwrap();
    let ids: Vec<_> = root
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("Item"))
        .filter_map(|n| n.attribute("ItemID"))
        .collect();
    assert_eq!(ids, ["003", "002", "001"]);
}

#[test]
fn bare_predicate_keeps_all_nested_rows() {
    let query = XmlQuery::new().filter(Expr::path("SupplierID").equals(Expr::literal("52")));
    let xml = view().render(&query, &source()).unwrap();
    assert_eq!(
        xml[0],
        document(
            "<Item ItemID=\"001\"><Name>Screwdriver</Name>\
             <Supplier SupplierID=\"51\"/><Supplier SupplierID=\"52\"/></Item>\
             <Item ItemID=\"002\"><Name>Hammer</Name><Supplier SupplierID=\"52\"/></Item>"
        )
    );
}

#[test]
fn context_predicate_filters_nested_rows() {
    let query = XmlQuery::new()
        .filter(Expr::context("SupplierID", "SupplierID").equals(Expr::literal("52")));
    let xml = view().render(&query, &source()).unwrap();
    assert_eq!(
        xml[0],
        document(
            "<Item ItemID=\"001\"><Name>Screwdriver</Name><Supplier SupplierID=\"52\"/></Item>\
             <Item ItemID=\"002\"><Name>Hammer</Name><Supplier SupplierID=\"52\"/></Item>\
             <Item ItemID=\"003\"><Name>Wrench</Name></Item>"
        )
    );
}

#[test]
fn row_limit_truncates_silently() {
    let query = XmlQuery::new().filter(Expr::row_limit("Supplier", 1));
    let xml = view().render(&query, &source()).unwrap();
    assert_eq!(
        xml[0],
        document(
            "<Item ItemID=\"001\"><Name>Screwdriver</Name><Supplier SupplierID=\"51\"/></Item>\
             <Item ItemID=\"002\"><Name>Hammer</Name><Supplier SupplierID=\"52\"/></Item>\
             <Item ItemID=\"003\"><Name>Wrench</Name><Supplier SupplierID=\"54\"/></Item>"
        )
    );
}

#[test]
fn row_limit_exception_fails_production() {
    let query = XmlQuery::new().filter(Expr::row_limit_exception("Supplier", 1));
    let err = view().render(&query, &source()).unwrap_err();
    assert!(matches!(
        err,
        Error::Processing(ProcessingError::RowLimitExceeded { limit: 1, .. })
    ));

    let query = XmlQuery::new().filter(Expr::row_limit_exception("Supplier", 2));
    assert!(view().render(&query, &source()).is_ok());
}

#[test]
fn planner_errors_surface_before_reading() {
    let source = source();
    let query = XmlQuery::new().filter(Expr::path("NoSuchNode").equals(Expr::literal(1)));
    let err = view().render(&query, &source).unwrap_err();
    assert!(matches!(err, Error::Planner(_)));
    assert_eq!(source.cursors_opened(), 0);
}

#[test]
fn plans_are_cached_per_query() {
    let view = view();
    let source = source();
    let query = XmlQuery::new().filter(Expr::row_limit("Supplier", 1));

    let first = view.plan(&query).unwrap();
    let second = view.plan(&query).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(view.cached_plans(), 1);

    view.render(&XmlQuery::new(), &source).unwrap();
    assert_eq!(view.cached_plans(), 2);

    view.clear_cache();
    assert_eq!(view.cached_plans(), 0);
}

#[test]
fn cache_evicts_least_recent_plan() {
    let options = ViewOptions {
        plan_cache_size: 1,
        ..ViewOptions::default()
    };
    let view = XmlView::with_options(Arc::new(items_def(false).build().unwrap()), options);
    let first = view.plan(&XmlQuery::new()).unwrap();
    view.plan(&XmlQuery::new().order_by(OrderKey::asc("ItemID")))
        .unwrap();
    let again = view.plan(&XmlQuery::new()).unwrap();
    assert!(!Arc::ptr_eq(&first, &again));
    assert_eq!(view.cached_plans(), 1);
}

#[test]
fn formatted_output_indents_children() {
    let view = XmlView::from_def(items_def(true)).unwrap();
    let query = XmlQuery::new().filter(Expr::path("ItemID").equals(Expr::literal("002")));
    let xml = view.render(&query, &source()).unwrap();
    assert_eq!(
        xml[0],
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\r\n\
         <Items>\r\n    \
         <Item ItemID=\"002\">\r\n        \
         <Name>Hammer</Name>\r\n        \
         <Supplier SupplierID=\"52\"/>\r\n    \
         </Item>\r\n\
         </Items>"
    );
}

#[test]
fn serializer_options_override_document() {
    let options = ViewOptions {
        serializer: SerializerOptions {
            formatted: Some(false),
            declaration: false,
            ..SerializerOptions::default()
        },
        ..ViewOptions::default()
    };
    let view = XmlView::with_options(Arc::new(items_def(true).build().unwrap()), options);
    let query = XmlQuery::new().filter(Expr::path("ItemID").equals(Expr::literal("003")));
    let xml = view.render(&query, &source()).unwrap();
    assert_eq!(
        xml[0],
        "<Items><Item ItemID=\"003\"><Name>Wrench</Name><Supplier SupplierID=\"54\"/></Item></Items>"
    );
}

#[test]
fn explain_lists_classes() {
    let listing = view().explain(&XmlQuery::new()).unwrap();
    assert!(listing.contains("xmltest.items"));
    assert!(listing.contains("xmltest.suppliers"));
}
