#![allow(dead_code)]

use std::sync::Arc;
use xmlview_engine::{execute, FragmentDocument, InMemorySource, Table};
use xmlview_model::{AttributeDef, DocumentDef, ElementDef, Namespace, Value};
use xmlview_planner::{DocumentPlanner, XmlQuery};

/// `Items/Item[@ItemID, Name, Quantity]` in `urn:xmltest:items`.
pub fn items_document(format: bool) -> DocumentDef {
    DocumentDef::new("xmltest.items").format(format).root(
        ElementDef::new("Items")
            .namespace(Namespace::new("", "urn:xmltest:items"))
            .declare(Namespace::xsi())
            .child(
                ElementDef::new("Item")
                    .namespace(Namespace::new("", "urn:xmltest:items"))
                    .source("xmltest.items")
                    .optional()
                    .unbounded()
                    .child(AttributeDef::column("ItemID", "itemNum"))
                    .child(
                        ElementDef::column("Name", "itemName")
                            .namespace(Namespace::new("", "urn:xmltest:items")),
                    )
                    .child(
                        ElementDef::column("Quantity", "itemQuantity")
                            .namespace(Namespace::new("", "urn:xmltest:items"))
                            .nillable(),
                    ),
            ),
    )
}

pub fn items_source() -> InMemorySource {
    InMemorySource::new().table(
        "xmltest.items",
        Table::new(["itemNum", "itemName", "itemQuantity"])
            .row(vec![Value::string("001"), Value::string("Screwdriver & Co"), Value::integer(5)])
            .row(vec![Value::string("002"), Value::string("Hammer"), Value::Null]),
    )
}

pub fn produce(doc: DocumentDef, source: &InMemorySource) -> Vec<FragmentDocument> {
    let program = DocumentPlanner::default()
        .plan(Arc::new(doc.build().expect("fixture builds")), &XmlQuery::new())
        .expect("fixture plans");
    execute(&program, source).expect("fixture renders").documents
}
