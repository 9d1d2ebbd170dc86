// ==========================================
// 仓库管理看板 - CSV 导出
// ==========================================
// 职责: TargetRecord → CSV（表头使用 FieldSpec.label）
// 说明: label 是字段的第一个别名，导出文件可原样重新导入
// ==========================================

use crate::domain::record::{TableSpec, TargetRecord};
use crate::domain::types::FieldValue;
use crate::importer::error::ImporterResult;
use csv::WriterBuilder;
use std::io::Write;

/// 导出记录为 CSV，返回写出的数据行数
pub fn write_csv<Wr: Write>(
    spec: &TableSpec,
    records: &[TargetRecord],
    writer: Wr,
) -> ImporterResult<usize> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    csv_writer.write_record(spec.fields.iter().map(|f| f.label.as_str()))?;

    for record in records {
        let cells: Vec<String> = spec
            .fields
            .iter()
            .map(|f| record.get(&f.name).map(FieldValue::to_string).unwrap_or_default())
            .collect();
        csv_writer.write_record(&cells)?;
    }

    csv_writer.flush()?;
    Ok(records.len())
}

/// 导出为 CSV 字符串
pub fn to_csv_string(spec: &TableSpec, records: &[TargetRecord]) -> ImporterResult<String> {
    let mut buffer = Vec::new();
    write_csv(spec, records, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::importer::error::ImportError::InternalError(e.to_string()))
}
