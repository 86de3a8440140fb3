#![allow(dead_code)]

use std::sync::Arc;
use xmlview_engine::{execute, ElementFragment, InMemorySource, ProcessingError, ProductionOutput, Table};
use xmlview_model::{AttributeDef, DocumentDef, ElementDef, MappingDocument, RecursiveDef, Value};
use xmlview_planner::{DocumentPlanner, XmlQuery};

/// `Supplier[@SupplierID, Name, Zip]` correlated on `itemNum`, cardinality
/// left to the caller.
pub fn supplier() -> ElementDef {
    ElementDef::new("Supplier")
        .source("xmltest.suppliers")
        .param("itemNum", "itemNum")
        .child(AttributeDef::column("SupplierID", "supplierNum"))
        .child(ElementDef::column("Name", "supplierName"))
        .child(ElementDef::column("Zip", "supplierZipCode"))
}

pub fn item(supplier: ElementDef) -> ElementDef {
    ElementDef::new("Item")
        .source("xmltest.items")
        .optional()
        .unbounded()
        .child(AttributeDef::column("ItemID", "itemNum"))
        .child(ElementDef::column("Name", "itemName"))
        .child(ElementDef::column("Quantity", "itemQuantity"))
        .child(ElementDef::new("Suppliers").optional().child(supplier))
}

pub fn catalog_with(supplier: ElementDef) -> Arc<MappingDocument> {
    let doc = DocumentDef::new("xmltest.doc9").root(
        ElementDef::new("Catalogs")
            .child(ElementDef::new("Catalog").child(ElementDef::new("Items").child(item(supplier)))),
    );
    Arc::new(doc.build().expect("catalog fixture"))
}

/// `Catalogs/Catalog/Items/Item[@ItemID, Name, Quantity, Suppliers/Supplier]`.
pub fn catalog() -> Arc<MappingDocument> {
    catalog_with(supplier().optional().unbounded())
}

pub fn items_table() -> Table {
    let row = |num: &str, name: &str, quantity: i64| {
        vec![Value::string(num), Value::string(name), Value::integer(quantity)]
    };
    Table::new(["itemNum", "itemName", "itemQuantity"])
        .row(row("001", "Screwdriver", 5))
        .row(row("002", "Hammer", 0))
        .row(row("003", "Wrench", 10))
        .row(row("004", "Pliers", 3))
}

pub fn suppliers_table() -> Table {
    Table::new(["itemNum", "supplierNum", "supplierName", "supplierZipCode"])
        .parameters(["itemNum"])
        .row(["001", "51", "Acme", "60601"])
        .row(["001", "52", "Bolt", "10001"])
        .row(["001", "55", "Edge", "60603"])
        .row(["002", "52", "Bolt", "10001"])
        .row(["002", "53", "Cog", "60602"])
        .row(["003", "54", "Dyna", "94105"])
}

pub fn catalog_source() -> InMemorySource {
    InMemorySource::new()
        .table("xmltest.items", items_table())
        .table("xmltest.suppliers", suppliers_table())
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

/// Alice manages Bob and Carol; Bob manages Dan; Dan manages Eve.
pub fn org_source() -> InMemorySource {
    let employee = |id: i64, name: &str, manager: i64| {
        vec![Value::integer(id), Value::string(name), Value::integer(manager)]
    };
    InMemorySource::new()
        .table(
            "xmltest.bosses",
            Table::new(["id", "name"]).row(vec![Value::integer(1), Value::string("Alice")]),
        )
        .table(
            "xmltest.employees",
            Table::new(["id", "name", "manager"])
                .parameters(["manager"])
                .row(employee(2, "Bob", 1))
                .row(employee(3, "Carol", 1))
                .row(employee(4, "Dan", 2))
                .row(employee(5, "Eve", 4)),
        )
}

pub fn produce(
    doc: Arc<MappingDocument>,
    query: &XmlQuery,
    source: &InMemorySource,
) -> Result<ProductionOutput, ProcessingError> {
    let program = DocumentPlanner::default()
        .plan(doc, query)
        .expect("query plans");
    execute(&program, source)
}

/// `Item` elements of the single catalog document.
pub fn items(output: &ProductionOutput) -> Vec<&ElementFragment> {
    output.documents[0]
        .root
        .child("Catalog")
        .and_then(|c| c.child("Items"))
        .map(|items| items.elements().collect())
        .unwrap_or_default()
}

pub fn item_ids(output: &ProductionOutput) -> Vec<String> {
    items(output)
        .iter()
        .filter_map(|item| item.attribute("ItemID"))
        .map(str::to_string)
        .collect()
}

pub fn supplier_ids(item: &ElementFragment) -> Vec<String> {
    item.child("Suppliers")
        .map(|suppliers| {
            suppliers
                .elements()
                .filter_map(|s| s.attribute("SupplierID"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Nested `Employee` names below `employee`, depth first.
pub fn report_names(employee: &ElementFragment) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(reports) = employee.child("Reports") {
        for report in reports.elements() {
            if let Some(name) = report.child("Name").and_then(|n| n.text.clone()) {
                names.push(name);
            }
            names.extend(report_names(report));
        }
    }
    names
}
