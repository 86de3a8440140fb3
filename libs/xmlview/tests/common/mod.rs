#![allow(dead_code)]

use std::sync::Arc;
use xmlview::model::{AttributeDef, DocumentDef, ElementDef};
use xmlview::{InMemorySource, Table, XmlView};

pub const DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// `Items/Item[@ItemID, Name, Supplier[@SupplierID]*]*`, compact output.
pub fn items_def(format: bool) -> DocumentDef {
    DocumentDef::new("xmltest.items").format(format).root(
        ElementDef::new("Items").child(
            ElementDef::new("Item")
                .source("xmltest.items")
                .optional()
                .unbounded()
                .child(AttributeDef::column("ItemID", "itemNum"))
                .child(ElementDef::column("Name", "itemName"))
                .child(
                    ElementDef::new("Supplier")
                        .source("xmltest.suppliers")
                        .param("itemNum", "itemNum")
                        .optional()
                        .unbounded()
                        .child(AttributeDef::column("SupplierID", "supplierNum")),
                ),
        ),
    )
}

pub fn view() -> XmlView {
    XmlView::new(Arc::new(items_def(false).build().expect("items fixture")))
}

pub fn source() -> InMemorySource {
    InMemorySource::new()
        .table(
            "xmltest.items",
            Table::new(["itemNum", "itemName"])
                .row(["001", "Screwdriver"])
                .row(["002", "Hammer"])
                .row(["003", "Wrench"]),
        )
        .table(
            "xmltest.suppliers",
            Table::new(["itemNum", "supplierNum"])
                .parameters(["itemNum"])
                .row(["001", "51"])
                .row(["001", "52"])
                .row(["002", "52"])
                .row(["003", "54"]),
        )
}

/// Wrap element markup in the declaration and `Items` root.
pub fn document(items: &str) -> String {
    format!("{DECL}<Items>{items}</Items>")
}
