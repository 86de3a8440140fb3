#![allow(dead_code)]

use std::sync::Arc;
use xmlview_model::{AttributeDef, DocumentDef, ElementDef, MappingDocument, RecursiveDef};

/// `Catalogs/Catalog/Items/Item[@ItemID, Name, Quantity, Suppliers/Supplier]`.
pub fn catalog() -> Arc<MappingDocument> {
    let supplier = ElementDef::new("Supplier")
        .source("xmltest.suppliers")
        .param("itemNum", "itemNum")
        .optional()
        .unbounded()
        .child(AttributeDef::column("SupplierID", "supplierNum"))
        .child(ElementDef::column("Name", "supplierName"))
        .child(ElementDef::column("Zip", "supplierZipCode"));
    let item = ElementDef::new("Item")
        .source("xmltest.items")
        .optional()
        .unbounded()
        .child(AttributeDef::column("ItemID", "itemNum"))
        .child(ElementDef::column("Name", "itemName"))
        .child(ElementDef::column("Quantity", "itemQuantity"))
        .child(ElementDef::new("Suppliers").optional().child(supplier));
    let doc = DocumentDef::new("xmltest.doc9").root(
        ElementDef::new("Catalogs")
            .child(ElementDef::new("Catalog").child(ElementDef::new("Items").child(item))),
    );
    Arc::new(doc.build().expect("catalog fixture"))
}

/// Employees with a self-recursive `Employee` under `Reports`.
pub fn employees(limit: i32, exception: bool) -> Arc<MappingDocument> {
    let mut recursive = RecursiveDef::new("Employee", "Employee")
        .source("xmltest.employees")
        .param("manager", "id")
        .limit(limit);
    if exception {
        recursive = recursive.exception_on_limit();
    }
    let doc = DocumentDef::new("xmltest.org").root(
        ElementDef::new("Employees").child(
            ElementDef::new("Employee")
                .source("xmltest.bosses")
                .optional()
                .unbounded()
                .child(AttributeDef::column("id", "id"))
                .child(ElementDef::column("Name", "name"))
                .child(ElementDef::new("Reports").optional().child(recursive)),
        ),
    );
    Arc::new(doc.build().expect("employees fixture"))
}
