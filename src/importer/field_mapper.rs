// ==========================================
// 仓库管理看板 - 字段映射器实现
// ==========================================
// 职责: 为每个目标字段找到提供取值的源表头
// 优先级（先命中者胜）:
//   1. 规范化别名 == 规范化表头
//   2. 字段名 == 原始表头
//   3. 字段名（'_' → ' '，小写）是规范化表头的子串
//   4. 无匹配 → 字段缺失（合法状态，非错误）
// ==========================================

use crate::domain::record::{FieldSpec, RawRow};
use crate::importer::header_normalizer::normalize_header;
use crate::importer::import_trait::FieldMapper as FieldMapperTrait;

pub struct AliasFieldMapper;

impl FieldMapperTrait for AliasFieldMapper {
    fn resolve<'a>(&self, spec: &FieldSpec, headers: &[&'a str]) -> Option<&'a str> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

        // 1. 别名精确匹配（按别名优先级）
        for alias in &spec.aliases {
            if alias.is_empty() {
                continue;
            }
            if let Some(idx) = normalized.iter().position(|n| n == alias) {
                return Some(headers[idx]);
            }
        }

        // 2. 字段名与原始表头完全一致
        if let Some(header) = headers.iter().copied().find(|h| *h == spec.name) {
            return Some(header);
        }

        // 3. 子串匹配
        let needle = spec.name.replace('_', " ").to_lowercase();
        if needle.trim().is_empty() {
            return None;
        }
        headers
            .iter()
            .zip(normalized.iter())
            .find(|(raw, norm)| {
                norm.contains(&needle) || raw.trim().to_lowercase().contains(&needle)
            })
            .map(|(raw, _)| *raw)
    }
}

impl AliasFieldMapper {
    /// 对单行解析字段来源
    pub fn resolve_in_row<'a>(&self, spec: &FieldSpec, row: &'a RawRow) -> Option<&'a str> {
        let headers: Vec<&str> = row.headers().collect();
        self.resolve(spec, &headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CellValue;

    fn row(headers: &[&str]) -> RawRow {
        RawRow::from_pairs(2, headers.iter().map(|h| (*h, CellValue::Empty)))
    }

    #[test]
    fn test_resolve_by_alias() {
        let spec = FieldSpec::integer("qty").alias("Stock On Hand");
        let r = row(&["Item Name", " stock on-hand "]);
        assert_eq!(
            AliasFieldMapper.resolve_in_row(&spec, &r),
            Some(" stock on-hand ")
        );
    }

    #[test]
    fn test_alias_priority_order() {
        let spec = FieldSpec::text("name").aliases(&["Item Name", "Description"]);
        let r = row(&["Description", "Item Name"]);
        // "name" 本身是第一个别名，但两列都不等于 "name"；"Item Name" 优先于 "Description"
        assert_eq!(AliasFieldMapper.resolve_in_row(&spec, &r), Some("Item Name"));
    }

    #[test]
    fn test_resolve_by_raw_field_name() {
        // 规范化后为空的字段名无法走别名匹配，只能原样命中
        let mut spec = FieldSpec::text("备注");
        spec.aliases.clear();
        let r = row(&["名称", "备注"]);
        assert_eq!(AliasFieldMapper.resolve_in_row(&spec, &r), Some("备注"));
    }

    #[test]
    fn test_resolve_by_substring() {
        let mut spec = FieldSpec::text("supplier");
        spec.aliases.clear();
        let r = row(&["Main Supplier (EU)"]);
        assert_eq!(
            AliasFieldMapper.resolve_in_row(&spec, &r),
            Some("Main Supplier (EU)")
        );
    }

    #[test]
    fn test_resolve_substring_multi_word() {
        let mut spec = FieldSpec::decimal("unit_price");
        spec.aliases.clear();
        let r = row(&["Latest Unit Price"]);
        assert_eq!(
            AliasFieldMapper.resolve_in_row(&spec, &r),
            Some("Latest Unit Price")
        );
    }

    #[test]
    fn test_no_mapping_is_none() {
        let spec = FieldSpec::decimal("unit_price").alias("Price");
        let r = row(&["Item Name", "Qty"]);
        assert_eq!(AliasFieldMapper.resolve_in_row(&spec, &r), None);
    }

    #[test]
    fn test_alias_hit_matches_normalized_alias() {
        let spec = FieldSpec::text("sku").aliases(&["Item Code", "Product Code"]);
        for headers in [
            vec!["PRODUCT-CODE", "x"],
            vec!["item code", "Product Code"],
            vec!["y", "  SKU "],
        ] {
            let r = row(&headers);
            let hit = AliasFieldMapper.resolve_in_row(&spec, &r).unwrap();
            assert!(spec.aliases.contains(&normalize_header(hit)));
        }
    }
}
