//! CSV export of crosstabs and the flat variant list.

use crate::crosstab::{self, Matrix, VariantRow};
use crate::models::InventoryRecord;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn write_matrix<W: Write>(matrix: &Matrix, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(matrix.headers())?;
    for row in &matrix.rows {
        wtr.write_record(matrix.record(row))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Header of the detailed export; matches the field names of [`VariantRow`].
const DETAILED_HEADERS: [&str; 8] = [
    "Product Code",
    "Product Name",
    "Base Product",
    "Variant Code",
    "Size",
    "Color",
    "Stock Level",
    "URL",
];

/// Header row first, so an empty run still yields a well-formed file.
pub fn write_detailed<W: Write>(rows: &[VariantRow], out: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(DETAILED_HEADERS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// "Polo Shirts" → "polo_shirts"
pub fn slugify(query: &str) -> String {
    let slug: String = query
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if slug.is_empty() { "all".to_string() } else { slug }
}

pub fn file_name(prefix: &str, query: &str, at: NaiveDateTime) -> String {
    format!("{}_{}_{}.csv", prefix, slugify(query), at.format("%Y%m%d_%H%M%S"))
}

fn write_file(path: &Path, write: impl FnOnce(std::fs::File) -> Result<()>) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Could not create {:?}", path))?;
    write(file).with_context(|| format!("Failed writing {:?}", path))
}

/// Write every export for one run into `dir`. Returns the paths written.
pub fn export_all(
    records: &[InventoryRecord],
    query: &str,
    dir: &Path,
    include_detailed: bool,
    at: NaiveDateTime,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Could not create dir {:?}", dir))?;

    let tabs = crosstab::build_all(records);
    let tables = [
        ("sanmar_crosstab_size_color", &tabs.size_color),
        ("sanmar_crosstab_product_size", &tabs.product_size),
        ("sanmar_inventory_matrix", &tabs.complete),
    ];

    let mut written = Vec::new();
    for (prefix, matrix) in tables {
        let path = dir.join(file_name(prefix, query, at));
        write_file(&path, |f| write_matrix(matrix, f))?;
        info!("Wrote {} rows × {} columns to {:?}", matrix.rows.len(), matrix.headers().len(), path);
        written.push(path);
    }

    if include_detailed {
        let rows = crosstab::flatten(records);
        let path = dir.join(file_name("sanmar_inventory_detailed", query, at));
        write_file(&path, |f| write_detailed(&rows, f))?;
        info!("Wrote {} variant rows to {:?}", rows.len(), path);
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductRecord, VariantRecord};
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap()
    }

    fn records() -> Vec<InventoryRecord> {
        let variants = vec![
            VariantRecord {
                variant_code: "PC54-M".into(),
                size: "M".into(),
                stock_level: 5,
                ..Default::default()
            },
            VariantRecord {
                variant_code: "PC54-L".into(),
                size: "L".into(),
                stock_level: 3,
                ..Default::default()
            },
        ];
        vec![InventoryRecord::new("PC54", "Core Tee", "PC54", variants)
            .with_listing(ProductRecord::new("PC54", "Port & Co Tee, Classic", "/p/PC54"))]
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Polo Shirts"), "polo_shirts");
        assert_eq!(slugify(" t-shirt "), "t_shirt");
        assert_eq!(slugify(""), "all");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("sanmar_inventory_matrix", "polo", at()),
            "sanmar_inventory_matrix_polo_20240305_140709.csv"
        );
    }

    #[test]
    fn matrix_csv_has_header_quoting_and_plain_integers() {
        let rows = crosstab::flatten(&records());
        let mut buf = Vec::new();
        write_matrix(&crosstab::complete_matrix(&rows), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Product Code,Product Name,Base Product,URL,L (),M (),Total Stock");
        assert_eq!(lines[1], r#"PC54,"Port & Co Tee, Classic",PC54,/p/PC54,3,5,8"#);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn detailed_csv_one_line_per_variant() {
        let rows = crosstab::flatten(&records());
        let mut buf = Vec::new();
        write_detailed(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Product Code,Product Name,Base Product,Variant Code,Size,Color,Stock Level,URL"
        );
        assert_eq!(lines[1], r#"PC54,"Port & Co Tee, Classic",PC54,PC54-M,M,,5,/p/PC54"#);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn detailed_csv_without_variants_keeps_header() {
        let mut buf = Vec::new();
        write_detailed(&[], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![DETAILED_HEADERS.join(",")]);
    }

    #[test]
    fn export_all_writes_four_files() {
        let dir = std::env::temp_dir().join(format!("sanmar-export-test-{}", std::process::id()));
        let paths = export_all(&records(), "Polo Shirts", &dir, true, at()).unwrap();
        assert_eq!(paths.len(), 4);
        for p in &paths {
            assert!(p.exists(), "{p:?} missing");
            assert!(p.to_string_lossy().contains("polo_shirts_20240305_140709"));
        }
        let matrix = std::fs::read_to_string(&paths[2]).unwrap();
        assert!(matrix.starts_with("Product Code,Product Name,Base Product,URL"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
