// ==========================================
// 仓库管理看板 - 表结构契约校验
// ==========================================
// 职责: 写入前按目标表的实际列校验字段名
// 规则: 未知字段从记录中剔除并记为 UnknownColumn 行级错误，
//       行本身仍然写入
// ==========================================

use crate::domain::record::{RowError, RowErrorKind, TargetRecord};
use std::collections::{BTreeSet, HashSet};

/// 校验结果
#[derive(Debug, Default)]
pub struct ContractReport {
    /// 被剔除的未知字段（去重、有序）
    pub unknown_fields: Vec<String>,
    pub row_errors: Vec<RowError>,
}

/// 按已知列剔除未知字段
pub fn enforce_columns(
    table: &str,
    records: &mut [TargetRecord],
    known_columns: &[String],
) -> ContractReport {
    let known: HashSet<&str> = known_columns.iter().map(String::as_str).collect();
    let mut unknown_fields = BTreeSet::new();
    let mut row_errors = Vec::new();

    for record in records.iter_mut() {
        let unknown: Vec<String> = record
            .fields
            .keys()
            .filter(|name| !known.contains(name.as_str()))
            .cloned()
            .collect();

        for name in unknown {
            record.remove(&name);
            row_errors.push(RowError::new(
                record.row_number,
                &name,
                RowErrorKind::UnknownColumn,
                format!("表 {} 不存在列 {}，已忽略", table, name),
            ));
            unknown_fields.insert(name);
        }
    }

    ContractReport {
        unknown_fields: unknown_fields.into_iter().collect(),
        row_errors,
    }
}
