use std::io::Cursor;
use std::str::FromStr;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::database::models::ReportLine;

pub const PREVIEW_ROWS: usize = 20;
pub const SAMPLE_ROWS: usize = 5;
pub const EXPORT_SHEET_NAME: &str = "Relatório";
pub const EXPORT_COLUMNS: [&str; 8] = [
    "Forma Normalizada",
    "Descrição",
    "Vendedor",
    "Data",
    "Quantidade",
    "Valor",
    "Cliente",
    "Categoria",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Could not read workbook: {0}")]
    Read(#[from] calamine::Error),

    #[error("Workbook has no sheets")]
    EmptyWorkbook,

    #[error("Could not write workbook: {0}")]
    Write(#[from] XlsxError),

    #[error("Could not write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// `.xlsx` and `.xls`, case-insensitive
pub fn is_supported_workbook(file_name: &str) -> bool {
    let name = file_name.to_lowercase();
    name.ends_with(".xlsx") || name.ends_with(".xls")
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookPreview {
    pub file_name: String,
    pub sheet_name: String,
    pub total_rows: usize,
    pub preview_data: Vec<Vec<Value>>,
    pub headers: Vec<String>,
    pub sample_rows: Vec<Vec<Value>>,
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(text) => Value::String(text.clone()),
        Data::Int(n) => json!(n),
        Data::Float(n) => json!(n),
        Data::Bool(b) => Value::Bool(*b),
        other => Value::String(other.to_string()),
    }
}

/// First sheet only: the first 20 rows, the header row, and rows 2-6 as samples
pub fn preview_workbook(file_name: &str, bytes: Vec<u8>) -> Result<WorkbookPreview, SpreadsheetError> {
    if !is_supported_workbook(file_name) {
        return Err(SpreadsheetError::UnsupportedFile(file_name.to_string()));
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SpreadsheetError::EmptyWorkbook)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let rows: Vec<Vec<Value>> = range
        .rows()
        .take(PREVIEW_ROWS)
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    let headers = range
        .rows()
        .next()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .unwrap_or_default();
    let sample_rows = rows.iter().skip(1).take(SAMPLE_ROWS).cloned().collect();

    tracing::debug!("Previewed {} ({} rows in {})", file_name, range.height(), sheet_name);

    Ok(WorkbookPreview {
        file_name: file_name.to_string(),
        sheet_name,
        total_rows: range.height(),
        preview_data: rows,
        headers,
        sample_rows,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    #[default]
    Xlsx,
}

impl FromStr for ExportFormat {
    type Err = SpreadsheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(SpreadsheetError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn number(value: Option<f64>) -> String {
    value.map(|n| n.to_string()).unwrap_or_default()
}

/// Cells in `EXPORT_COLUMNS` order
fn export_row(line: &ReportLine) -> [String; 8] {
    [
        text(&line.form_norm),
        text(&line.descricao),
        text(&line.vendedor),
        text(&line.data),
        number(line.quantidade),
        number(line.valor),
        text(&line.cliente),
        line.category().to_string(),
    ]
}

/// Every field quoted, `\n` line endings, UTF-8 BOM for spreadsheet apps
pub fn export_csv(lines: &[ReportLine]) -> Result<Vec<u8>, SpreadsheetError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.to_vec());

    writer.write_record(EXPORT_COLUMNS)?;
    for line in lines {
        writer.write_record(export_row(line))?;
    }

    writer.into_inner().map_err(|e| {
        let cause = e.error();
        SpreadsheetError::Csv(std::io::Error::new(cause.kind(), cause.to_string()).into())
    })
}

pub fn export_xlsx(lines: &[ReportLine]) -> Result<Vec<u8>, SpreadsheetError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET_NAME)?;

    for (col, title) in EXPORT_COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
        worksheet.set_column_width(col as u16, 18)?;
    }

    for (index, line) in lines.iter().enumerate() {
        let row = index as u32 + 1;
        worksheet.write_string(row, 0, text(&line.form_norm))?;
        worksheet.write_string(row, 1, text(&line.descricao))?;
        worksheet.write_string(row, 2, text(&line.vendedor))?;
        worksheet.write_string(row, 3, text(&line.data))?;
        if let Some(quantidade) = line.quantidade {
            worksheet.write_number(row, 4, quantidade)?;
        }
        if let Some(valor) = line.valor {
            worksheet.write_number(row, 5, valor)?;
        }
        worksheet.write_string(row, 6, text(&line.cliente))?;
        worksheet.write_string(row, 7, line.category())?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Generated download: body, content type and suggested file name
#[derive(Debug)]
pub struct ExportFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

pub fn export_report(lines: &[ReportLine], format: ExportFormat) -> Result<ExportFile, SpreadsheetError> {
    let bytes = match format {
        ExportFormat::Csv => export_csv(lines)?,
        ExportFormat::Xlsx => export_xlsx(lines)?,
    };

    Ok(ExportFile {
        bytes,
        content_type: format.content_type(),
        file_name: format!(
            "relatorio-{}.{}",
            chrono::Utc::now().format("%Y-%m-%d"),
            format.extension()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workbook_with_rows(rows: usize) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Produção").unwrap();
        sheet.write_string(0, 0, "Produto").unwrap();
        sheet.write_string(0, 1, "Quantidade").unwrap();
        for i in 1..rows {
            sheet.write_string(i as u32, 0, format!("Item {}", i)).unwrap();
            sheet.write_number(i as u32, 1, i as f64).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn only_excel_extensions_are_accepted() {
        assert!(is_supported_workbook("Relatorio.XLSX"));
        assert!(is_supported_workbook("antigo.xls"));
        assert!(!is_supported_workbook("dados.csv"));
        assert!(!is_supported_workbook("xlsx"));
        assert!(matches!(
            preview_workbook("dados.csv", Vec::new()),
            Err(SpreadsheetError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn preview_caps_rows_and_samples() {
        let preview = preview_workbook("producao.xlsx", workbook_with_rows(30)).unwrap();
        assert_eq!(preview.sheet_name, "Produção");
        assert_eq!(preview.total_rows, 30);
        assert_eq!(preview.preview_data.len(), PREVIEW_ROWS);
        assert_eq!(preview.headers, vec!["Produto", "Quantidade"]);
        assert_eq!(preview.sample_rows.len(), SAMPLE_ROWS);
        assert_eq!(preview.sample_rows[0][0], "Item 1");
        assert_eq!(preview.sample_rows[4][0], "Item 5");
    }

    #[test]
    fn short_sheets_return_what_they_have() {
        let preview = preview_workbook("curto.xlsx", workbook_with_rows(3)).unwrap();
        assert_eq!(preview.total_rows, 3);
        assert_eq!(preview.preview_data.len(), 3);
        assert_eq!(preview.sample_rows.len(), 2);
    }

    #[test]
    fn garbage_is_a_read_error() {
        let err = preview_workbook("falso.xlsx", b"not a workbook".to_vec()).unwrap_err();
        assert!(matches!(err, SpreadsheetError::Read(_)));
    }

    #[test]
    fn csv_quotes_every_field_in_column_order() {
        let lines = vec![ReportLine {
            form_norm: Some("F1".into()),
            quantidade: Some(5.0),
            valor: Some(10.0),
            ..Default::default()
        }];
        let bytes = export_csv(&lines).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut out = text.lines();
        assert_eq!(
            out.next(),
            Some("\"Forma Normalizada\",\"Descrição\",\"Vendedor\",\"Data\",\"Quantidade\",\"Valor\",\"Cliente\",\"Categoria\"")
        );
        assert_eq!(out.next(), Some("\"F1\",\"\",\"\",\"\",\"5\",\"10\",\"\",\"Não mapeado\""));
        assert_eq!(out.next(), None);
    }

    #[test]
    fn xlsx_export_has_one_report_sheet() {
        let lines = vec![ReportLine {
            form_norm: Some("F1".into()),
            categoria: Some("Cápsulas".into()),
            valor: Some(10.0),
            ..Default::default()
        }];
        let bytes = export_xlsx(&lines).unwrap();

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec![EXPORT_SHEET_NAME.to_string()]);

        let range = workbook.worksheet_range(EXPORT_SHEET_NAME).unwrap();
        let header: Vec<String> = range.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
        assert_eq!(header, EXPORT_COLUMNS.to_vec());
        assert_eq!(range.get_value((1, 7)), Some(&Data::String("Cápsulas".into())));
        assert_eq!(range.get_value((1, 5)), Some(&Data::Float(10.0)));
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::default(), ExportFormat::Xlsx);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(SpreadsheetError::UnsupportedFormat(_))
        ));
    }
}
