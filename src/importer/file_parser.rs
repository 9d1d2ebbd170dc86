// ==========================================
// 仓库管理看板 - 文件解析器实现
// ==========================================
// 职责: 文件字节 → RawRow 序列（保留列顺序与源行号）
// 支持: Excel (.xlsx/.xlsm/.xls/.ods) / CSV (.csv)
// ==========================================

use crate::domain::record::RawRow;
use crate::domain::types::CellValue;
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::import_trait::SheetParser;
use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;

/// 去掉 UTF-8 BOM 与首尾空白
fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvSheetParser;

impl SheetParser for CsvSheetParser {
    fn parse_sheet(&self, bytes: &[u8]) -> ImporterResult<Vec<RawRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        // 读取表头
        let headers: Vec<String> = reader.headers()?.iter().map(clean_header).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptySheet("CSV 无表头".to_string()));
        }

        // 读取所有行（表头为第 1 行）
        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let mut row = RawRow::new(idx + 2);

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row.push(header.clone(), CellValue::from_text(value));
                }
            }

            // 跳过完全空白的行
            if row.is_blank() {
                continue;
            }

            rows.push(row);
        }

        Ok(rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
#[derive(Default)]
pub struct ExcelSheetParser {
    sheet_name: Option<String>, // None → 第一个工作表
}

impl ExcelSheetParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_sheet(sheet_name: &str) -> Self {
        Self {
            sheet_name: Some(sheet_name.to_string()),
        }
    }
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::String(s) => CellValue::from_text(s),
        Data::DateTime(dt) => date_cell_value(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_text(s),
        other => CellValue::from_text(&other.to_string()),
    }
}

/// 日期单元格 → 文本（整日只保留日期部分）；时长仍按序列值处理
fn date_cell_value(dt: &ExcelDateTime) -> CellValue {
    if !dt.is_datetime() {
        return CellValue::Number(dt.as_f64());
    }
    match dt.as_datetime() {
        Some(value) if dt.as_f64().fract() == 0.0 => {
            CellValue::Text(value.format("%Y-%m-%d").to_string())
        }
        Some(value) => CellValue::Text(value.format("%Y-%m-%d %H:%M:%S").to_string()),
        None => CellValue::Number(dt.as_f64()),
    }
}

impl SheetParser for ExcelSheetParser {
    fn parse_sheet(&self, bytes: &[u8]) -> ImporterResult<Vec<RawRow>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let sheet_names = workbook.sheet_names();
        let sheet_name = match &self.sheet_name {
            Some(name) => {
                if !sheet_names.iter().any(|s| s == name) {
                    return Err(ImportError::ExcelParseError(format!("工作表不存在: {}", name)));
                }
                name.clone()
            }
            None => sheet_names
                .first()
                .cloned()
                .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        // Range 从第一个非空单元格开始，行号需加上偏移
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);

        // 提取表头（第一行）
        let mut data_rows = range.rows();
        let header_row = data_rows
            .next()
            .ok_or_else(|| ImportError::EmptySheet(sheet_name.clone()))?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| clean_header(&cell.to_string()))
            .collect();

        // 读取数据行
        let mut rows = Vec::new();
        for (idx, data_row) in data_rows.enumerate() {
            let mut row = RawRow::new(first_row + idx + 2);

            for (col_idx, cell) in data_row.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    if header.is_empty() {
                        continue;
                    }
                    row.push(header.clone(), cell_value(cell));
                }
            }

            // 跳过完全空白的行
            if row.is_blank() {
                continue;
            }

            rows.push(row);
        }

        Ok(rows)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    /// 按扩展名选择解析器
    pub fn parser_for(path: &Path) -> ImporterResult<Box<dyn SheetParser>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(Box::new(CsvSheetParser)),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(Box::new(ExcelSheetParser::new())),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }

    /// 读取文件并解析
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImporterResult<Vec<RawRow>> {
        let path = file_path.as_ref();

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let parser = Self::parser_for(path)?;
        let bytes = std::fs::read(path)?;
        parser.parse_sheet(&bytes)
    }
}
