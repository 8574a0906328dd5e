use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fleetwatch_core::ReportFormat;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;
use uuid::Uuid;

use super::{ReportCell, ReportTable};

const PAGE_WIDTH_MM: f32 = 297.0;
const PAGE_HEIGHT_MM: f32 = 210.0;
const MARGIN_MM: f32 = 12.0;
const LINE_MM: f32 = 6.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("excel error: {0}")]
    Excel(#[from] XlsxError),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub path: PathBuf,
    pub filename: String,
    pub content_type: &'static str,
}

impl RenderedReport {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    pub fn remove(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Writes the table into `dir` under a unique name and returns where it landed.
pub fn render_to_file(
    table: &ReportTable,
    format: ReportFormat,
    dir: &Path,
) -> Result<RenderedReport, RenderError> {
    fs::create_dir_all(dir)?;

    let filename = format!(
        "{}-{}.{}",
        table.kind.as_str(),
        Utc::now().format("%Y%m%d-%H%M%S"),
        format.extension()
    );
    let path = dir.join(format!("{}-{}", Uuid::new_v4().simple(), filename));

    match format {
        ReportFormat::Csv => write_csv(table, &path)?,
        ReportFormat::Excel => write_xlsx(table, &path)?,
        ReportFormat::Pdf => write_pdf(table, &path)?,
    }

    Ok(RenderedReport {
        path,
        filename,
        content_type: format.content_type(),
    })
}

/// Same as [`render_to_file`], run on the blocking pool.
pub async fn render_blocking(
    table: ReportTable,
    format: ReportFormat,
    dir: PathBuf,
) -> Result<RenderedReport, RenderError> {
    tokio::task::spawn_blocking(move || render_to_file(&table, format, &dir)).await?
}

fn write_csv(table: &ReportTable, path: &Path) -> Result<(), RenderError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| match cell {
            ReportCell::Text(text) => text.clone(),
            ReportCell::Number(value) => value.to_string(),
        }))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(table: &ReportTable, path: &Path) -> Result<(), RenderError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();

    worksheet.write_string_with_format(0, 0, &table.title, &bold)?;
    worksheet.write_string(1, 0, &table.subtitle)?;

    let header_row = 3;
    for (col, name) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(header_row, col as u16, name, &bold)?;
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let row_no = header_row + 1 + idx as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                ReportCell::Text(text) => worksheet.write_string(row_no, col as u16, text)?,
                ReportCell::Number(value) => worksheet.write_number(row_no, col as u16, *value)?,
            };
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn write_pdf(table: &ReportTable, path: &Path) -> Result<(), RenderError> {
    let (doc, page, layer) = PdfDocument::new(
        &table.title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|err| RenderError::Pdf(format!("{err:?}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|err| RenderError::Pdf(format!("{err:?}")))?;

    let column_width = (PAGE_WIDTH_MM - 2.0 * MARGIN_MM) / table.columns.len().max(1) as f32;
    let mut layer_ref = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM;

    layer_ref.use_text(table.title.clone(), 14.0, Mm(MARGIN_MM), Mm(y), &bold);
    y -= LINE_MM;
    layer_ref.use_text(table.subtitle.clone(), 9.0, Mm(MARGIN_MM), Mm(y), &regular);
    y -= LINE_MM * 1.5;
    write_pdf_row(&layer_ref, &table.columns, column_width, y, &bold);
    y -= LINE_MM;

    for row in &table.rows {
        if y < MARGIN_MM {
            let (next_page, next_layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            layer_ref = doc.get_page(next_page).get_layer(next_layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
            write_pdf_row(&layer_ref, &table.columns, column_width, y, &bold);
            y -= LINE_MM;
        }
        let cells: Vec<String> = row.iter().map(ReportCell::display).collect();
        write_pdf_row(&layer_ref, &cells, column_width, y, &regular);
        y -= LINE_MM;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    doc.save(&mut writer)
        .map_err(|err| RenderError::Pdf(format!("{err:?}")))?;
    Ok(())
}

fn write_pdf_row(
    layer: &PdfLayerReference,
    cells: &[String],
    column_width: f32,
    y: f32,
    font: &IndirectFontRef,
) {
    for (idx, text) in cells.iter().enumerate() {
        let x = MARGIN_MM + column_width * idx as f32;
        layer.use_text(text.clone(), 8.0, Mm(x), Mm(y), font);
    }
}
