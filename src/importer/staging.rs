// ==========================================
// 仓库管理看板 - 暂存合并
// ==========================================
// 职责: 按唯一键暂存 TargetRecord，同键记录合并
// 合并规则: 新记录的非 NULL 字段覆盖；NULL/缺失字段回落到旧值
// 作用域: 一个导入会话（不得跨会话共享）
// ==========================================

use crate::domain::record::TargetRecord;
use std::collections::HashMap;

/// 合并同键的两条记录（older 在前，newer 在后）
pub fn merge_records(older: &TargetRecord, newer: TargetRecord) -> TargetRecord {
    let mut merged = older.clone();
    merged.row_number = newer.row_number;
    for (name, value) in newer.fields {
        if !value.is_null() {
            merged.fields.insert(name, value);
        }
    }
    if newer.key.is_some() {
        merged.key = newer.key;
    }
    merged
}

/// 暂存区
#[derive(Debug, Default)]
pub struct StagingMap {
    records: HashMap<String, TargetRecord>,
}

/// 一次暂存的产出
#[derive(Debug, Default)]
pub struct StagedBatch {
    /// 本次涉及的记录（已与暂存区合并），按首次出现顺序
    pub records: Vec<TargetRecord>,
    /// 本次输入中因同键而被合并掉的行数
    pub merged_duplicates: usize,
}

impl StagingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TargetRecord> {
        self.records.get(key)
    }

    /// 暂存单条记录，返回合并后的结果
    ///
    /// 无唯一键（key 为 None）的记录不参与暂存，原样返回
    pub fn stage(&mut self, record: TargetRecord) -> TargetRecord {
        let key = match record.key.clone() {
            Some(key) => key,
            None => return record,
        };

        let merged = match self.records.get(&key) {
            Some(existing) => merge_records(existing, record),
            None => record,
        };
        self.records.insert(key, merged.clone());
        merged
    }

    /// 暂存一次导入的全部记录
    ///
    /// 同一输入内的重复键合并为一条，位置取首次出现处；
    /// 保证同一个键不会拆到两个批次里
    pub fn stage_all(&mut self, records: Vec<TargetRecord>) -> StagedBatch {
        let mut output: Vec<TargetRecord> = Vec::with_capacity(records.len());
        let mut position: HashMap<String, usize> = HashMap::new();
        let mut merged_duplicates = 0;

        for record in records {
            let key = record.key.clone();
            let merged = self.stage(record);
            match key {
                Some(key) => match position.get(&key) {
                    Some(&idx) => {
                        output[idx] = merged;
                        merged_duplicates += 1;
                    }
                    None => {
                        position.insert(key, output.len());
                        output.push(merged);
                    }
                },
                None => output.push(merged),
            }
        }

        StagedBatch {
            records: output,
            merged_duplicates,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::FieldValue;

    fn key_fields() -> Vec<String> {
        vec!["sku".to_string(), "warehouse_id".to_string()]
    }

    fn record(row: usize, sku: &str, qty: FieldValue, price: FieldValue) -> TargetRecord {
        let mut r = TargetRecord::new(row)
            .with_field("sku", sku)
            .with_field("warehouse_id", "W1")
            .with_field("qty", qty)
            .with_field("unit_price", price);
        r.assign_key(&key_fields());
        r
    }

    #[test]
    fn test_merge_newer_non_null_wins() {
        let a = record(2, "SKU-1", FieldValue::Integer(3), FieldValue::Decimal(1.5));
        let b = record(9, "SKU-1", FieldValue::Integer(5), FieldValue::Null);

        let merged = merge_records(&a, b);
        assert_eq!(merged.get("qty"), Some(&FieldValue::Integer(5)));
        assert_eq!(merged.get("unit_price"), Some(&FieldValue::Decimal(1.5)));
        assert_eq!(merged.row_number, 9);
    }

    #[test]
    fn test_merge_absent_field_falls_back() {
        let a = record(2, "SKU-1", FieldValue::Integer(3), FieldValue::Decimal(1.5))
            .with_field("notes", "keep me");
        let b = record(3, "SKU-1", FieldValue::Integer(4), FieldValue::Decimal(2.0));

        let merged = merge_records(&a, b);
        assert_eq!(merged.get("notes"), Some(&FieldValue::from("keep me")));
        assert_eq!(merged.get("unit_price"), Some(&FieldValue::Decimal(2.0)));
    }

    #[test]
    fn test_stage_across_runs() {
        let mut staging = StagingMap::new();

        // 第一次导入
        let first = staging.stage_all(vec![record(
            2,
            "SKU-1",
            FieldValue::Integer(1),
            FieldValue::Decimal(9.5),
        )]);
        assert_eq!(first.records.len(), 1);

        // 第二次导入：qty=5, unit_price=NULL
        let second = staging.stage_all(vec![record(
            2,
            "SKU-1",
            FieldValue::Integer(5),
            FieldValue::Null,
        )]);
        let merged = &second.records[0];
        assert_eq!(merged.key.as_deref(), Some("SKU-1::W1"));
        assert_eq!(merged.get("qty"), Some(&FieldValue::Integer(5)));
        assert_eq!(merged.get("unit_price"), Some(&FieldValue::Decimal(9.5)));
        assert_eq!(staging.len(), 1);
    }

    #[test]
    fn test_stage_all_collapses_duplicates_in_first_position() {
        let mut staging = StagingMap::new();
        let staged = staging.stage_all(vec![
            record(2, "A", FieldValue::Integer(1), FieldValue::Null),
            record(3, "B", FieldValue::Integer(2), FieldValue::Null),
            record(4, "A", FieldValue::Integer(7), FieldValue::Decimal(3.0)),
        ]);

        assert_eq!(staged.merged_duplicates, 1);
        assert_eq!(staged.records.len(), 2);
        assert_eq!(staged.records[0].key.as_deref(), Some("A::W1"));
        assert_eq!(staged.records[0].get("qty"), Some(&FieldValue::Integer(7)));
        assert_eq!(staged.records[1].key.as_deref(), Some("B::W1"));
    }

    #[test]
    fn test_keyless_records_never_merged() {
        let mut staging = StagingMap::new();
        let mut a = TargetRecord::new(2).with_field("sku", FieldValue::Null);
        a.assign_key(&key_fields());
        let b = a.clone();

        let staged = staging.stage_all(vec![a, b]);
        assert_eq!(staged.records.len(), 2);
        assert_eq!(staged.merged_duplicates, 0);
        assert!(staging.is_empty());
    }
}
