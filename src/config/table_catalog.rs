// ==========================================
// 仓库管理看板 - 内置目标表目录
// ==========================================
// 职责: 各页面导入/导出所用的 TableSpec（字段、别名、唯一键）
// 标识策略:
//   - 编号类字段（sku / part_number / dispatch_no / 仓库 code）缺失时生成占位标识
//   - 名称类字段（物料名、备件名、仓库名、分类名）必填，缺失则该行记为错误
// ==========================================

use crate::domain::record::{FieldSpec, TableSpec};

/// 内置目标表
pub const TABLE_NAMES: &[&str] = &["warehouses", "categories", "inventory", "spare_parts", "dispatch"];

/// 按表名获取 TableSpec
pub fn table_spec(table: &str) -> Option<TableSpec> {
    match table {
        "warehouses" => Some(warehouses()),
        "categories" => Some(categories()),
        "inventory" => Some(inventory()),
        "spare_parts" => Some(spare_parts()),
        "dispatch" => Some(dispatch()),
        _ => None,
    }
}

fn warehouses() -> TableSpec {
    TableSpec::new(
        "warehouses",
        &["code"],
        vec![
            FieldSpec::text("code")
                .aliases(&["Warehouse Code", "Code", "Warehouse ID"])
                .synthesize(),
            FieldSpec::text("name")
                .aliases(&["Warehouse Name", "Name", "Warehouse"])
                .mandatory(),
            FieldSpec::text("location").aliases(&["Location", "Address", "Site"]),
            FieldSpec::integer("capacity").aliases(&["Capacity", "Max Capacity"]),
            FieldSpec::text("manager").aliases(&["Manager", "Contact", "Person In Charge"]),
        ],
    )
}

fn categories() -> TableSpec {
    TableSpec::new(
        "categories",
        &["name"],
        vec![
            FieldSpec::text("name")
                .aliases(&["Category Name", "Category", "Name"])
                .mandatory(),
            FieldSpec::text("description").aliases(&["Description", "Remarks"]),
        ],
    )
}

fn inventory() -> TableSpec {
    TableSpec::new(
        "inventory",
        &["sku", "warehouse_id"],
        vec![
            FieldSpec::text("sku")
                .aliases(&["SKU", "Item Code", "Product Code"])
                .synthesize(),
            FieldSpec::text("name")
                .aliases(&["Item Name", "Product Name", "Name"])
                .mandatory(),
            FieldSpec::text("warehouse_id").aliases(&["Warehouse", "Warehouse Code", "Warehouse ID"]),
            FieldSpec::lookup("category_id", "categories").aliases(&["Category", "Category Name"]),
            FieldSpec::integer("qty").aliases(&["Stock On Hand", "Quantity", "Qty", "Stock"]),
            FieldSpec::integer("min_stock").aliases(&["Min Stock", "Reorder Level", "Safety Stock"]),
            FieldSpec::decimal("unit_price").aliases(&["Unit Price", "Price", "Cost"]),
            FieldSpec::text("unit").aliases(&["Unit", "UOM"]),
            FieldSpec::text("location").aliases(&["Location", "Bin"]),
        ],
    )
}

fn spare_parts() -> TableSpec {
    TableSpec::new(
        "spare_parts",
        &["part_number"],
        vec![
            FieldSpec::text("part_number")
                .aliases(&["Part Number", "Part No", "PN"])
                .synthesize(),
            FieldSpec::text("name")
                .aliases(&["Part Name", "Name", "Description"])
                .mandatory(),
            FieldSpec::lookup("category_id", "categories").aliases(&["Category", "Category Name"]),
            FieldSpec::text("warehouse_id").aliases(&["Warehouse", "Warehouse Code"]),
            FieldSpec::integer("qty").aliases(&["Quantity", "Qty", "Stock On Hand"]),
            FieldSpec::integer("min_stock").aliases(&["Min Stock", "Reorder Level"]),
            FieldSpec::decimal("unit_price").aliases(&["Unit Price", "Price"]),
            FieldSpec::text("supplier").aliases(&["Supplier", "Vendor"]),
            FieldSpec::text("rack_id").aliases(&["Rack", "Rack ID", "Shelf"]),
        ],
    )
}

fn dispatch() -> TableSpec {
    TableSpec::new(
        "dispatch",
        &["dispatch_no"],
        vec![
            FieldSpec::text("dispatch_no")
                .aliases(&["Dispatch No", "Dispatch Number", "DN"])
                .synthesize(),
            FieldSpec::text("sku").aliases(&["SKU", "Item Code"]),
            FieldSpec::text("warehouse_id").aliases(&["Warehouse", "From Warehouse"]),
            FieldSpec::integer("qty").aliases(&["Quantity", "Qty"]),
            FieldSpec::text("destination").aliases(&["Destination", "Ship To", "Customer"]),
            FieldSpec::text("dispatch_date").aliases(&["Dispatch Date", "Date"]),
            FieldSpec::text("status").aliases(&["Status"]),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::KeyPolicy;

    #[test]
    fn test_all_tables_resolvable() {
        for table in TABLE_NAMES {
            let spec = table_spec(table).unwrap();
            assert_eq!(spec.table, *table);
            for key in &spec.key_fields {
                assert!(spec.field(key).is_some(), "{}.{} 不在字段列表中", table, key);
            }
        }
        assert!(table_spec("orders").is_none());
    }

    #[test]
    fn test_identifier_policy() {
        let inventory = table_spec("inventory").unwrap();
        assert_eq!(inventory.field("sku").unwrap().key_policy, KeyPolicy::Synthesize);
        assert_eq!(inventory.field("name").unwrap().key_policy, KeyPolicy::Mandatory);
        assert_eq!(inventory.field("qty").unwrap().label, "Stock On Hand");
    }

    #[test]
    fn test_inventory_unit_does_not_take_unit_price() {
        use crate::domain::record::RawRow;
        use crate::domain::types::{CellValue, FieldValue};
        use crate::importer::RowCoercer;

        let inventory = table_spec("inventory").unwrap();
        let row = RawRow::from_pairs(
            2,
            vec![
                ("Item Name", CellValue::Text("Bolt".to_string())),
                ("Unit Price", CellValue::Number(1.5)),
            ],
        );
        let record = RowCoercer::default().coerce(&row, &inventory.fields).unwrap();
        assert_eq!(record.get("unit_price"), Some(&FieldValue::Decimal(1.5)));
        assert_eq!(record.get("unit"), Some(&FieldValue::Null));
    }
}
