//! CSV parsing for the book and student bulk uploads
//!
//! Parsing is pure: rows come back either parsed or with the reason they
//! were rejected, and the services decide what to persist.

use std::collections::HashMap;
use std::io::Cursor;

use csv::ReaderBuilder;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::models::BulkFailure;

/// One non-empty data row keyed by canonical column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    /// 1-based line number in the file, the header being line 1
    pub line: usize,
    pub values: HashMap<String, String>,
}

impl CsvRow {
    /// Trimmed value, `None` when missing or blank
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A parsed row or the reason it was rejected
pub type RowResult<T> = Result<(usize, T), BulkFailure>;

/// Import summary returned to the client
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ImportReport {
    pub created: usize,
    pub failed: Vec<BulkFailure>,
    pub message: String,
}

impl ImportReport {
    pub fn finish(mut self, noun: &str) -> Self {
        self.message = match (self.created, self.failed.len()) {
            (0, 0) => format!("No {} found in file", noun),
            (n, 0) => format!("Successfully uploaded {} {}", n, noun),
            (n, f) => format!("Uploaded {} {}; {} row(s) failed", n, noun, f),
        };
        self
    }
}

/// Only `.csv` uploads are accepted
pub fn ensure_csv(filename: &str) -> AppResult<()> {
    if filename.to_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(AppError::BadRequest("Unsupported file format".to_string()))
    }
}

fn book_column(header: &str) -> &str {
    match header {
        "book_title" => "title",
        "author_name" => "author",
        "pub_year" => "year_of_publication",
        "total_no" => "total_copies",
        other => other,
    }
}

fn student_column(header: &str) -> &str {
    match header {
        "student_name" => "name",
        "child id" | "childid" => "child_id",
        other => other,
    }
}

/// Reads the table, canonicalising headers (lowercase, trimmed, BOM removed)
/// and skipping rows whose cells are all blank. Fails as a whole when the
/// header lacks a required column.
fn read_table(
    data: &[u8],
    canonical: fn(&str) -> &str,
    required: &[(&str, &str)],
) -> AppResult<Vec<Result<CsvRow, BulkFailure>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(data));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::BadRequest(format!("Failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| canonical(h.trim_start_matches('\u{feff}').trim().to_lowercase().as_str()).to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::BadRequest("File is empty or has no headers".to_string()));
    }

    let missing: Vec<&str> = required
        .iter()
        .filter(|(column, _)| !headers.iter().any(|h| h == column))
        .map(|(_, label)| *label)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "CSV file must include {} column(s)",
            missing
                .iter()
                .map(|m| format!("'{}'", m))
                .collect::<Vec<_>>()
                .join(" and ")
        )));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                rows.push(Err(BulkFailure::new(line, format!("CSV parse error: {}", e))));
                continue;
            }
        };
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let values = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();
        rows.push(Ok(CsvRow { line, values }));
    }
    Ok(rows)
}

/// Book row of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRow {
    pub title: String,
    pub author: String,
    pub category: Option<String>,
    pub book_code: String,
    pub publisher: String,
    pub year_of_publication: Option<i32>,
    pub total_copies: i32,
    pub available_copies: i32,
}

fn parse_number<T>(row: &CsvRow, column: &str) -> Result<Option<T>, String>
where
    T: std::str::FromStr + TryFrom<i64>,
{
    let Some(raw) = row.get(column) else {
        return Ok(None);
    };
    if let Ok(value) = raw.parse::<T>() {
        return Ok(Some(value));
    }
    // Spreadsheets export whole numbers as "12.0" or "12.00"
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.fract() == 0.0)
        .filter(|value| value.abs() <= i64::MAX as f64)
        .and_then(|value| T::try_from(value as i64).ok())
        .map(Some)
        .ok_or_else(|| format!("Invalid {} '{}'", column, raw))
}

fn book_from_row(row: &CsvRow) -> Result<BookRow, String> {
    let (Some(title), Some(book_code)) = (row.get("title"), row.get("book_code")) else {
        return Err("Missing required fields (book_title, book_code)".to_string());
    };
    let total = parse_number::<i32>(row, "total_copies")?.unwrap_or(1).max(1);
    let available = parse_number::<i32>(row, "available_copies")?
        .unwrap_or(total)
        .clamp(0, total);
    Ok(BookRow {
        title: title.to_string(),
        author: row.get("author").unwrap_or_default().to_string(),
        category: row.get("category").map(str::to_string),
        book_code: book_code.to_string(),
        publisher: row.get("publisher").unwrap_or_default().to_string(),
        year_of_publication: parse_number(row, "year_of_publication")?,
        total_copies: total,
        available_copies: available,
    })
}

/// Parses a book upload. Required columns: `book_title`, `book_code`.
pub fn parse_books(data: &[u8]) -> AppResult<Vec<RowResult<BookRow>>> {
    let rows = read_table(
        data,
        book_column,
        &[("title", "book_title"), ("book_code", "book_code")],
    )?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let row = row?;
            book_from_row(&row)
                .map(|book| (row.line, book))
                .map_err(|reason| BulkFailure::new(row.line, reason))
        })
        .collect())
}

/// Student row of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRow {
    pub name: String,
    pub child_id: Option<i64>,
    pub school: Option<String>,
    pub grade: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

fn student_from_row(row: &CsvRow) -> Result<StudentRow, String> {
    let name = row
        .get("name")
        .ok_or_else(|| "Missing required field (name)".to_string())?;
    Ok(StudentRow {
        name: name.to_string(),
        child_id: parse_number(row, "child_id")?,
        school: row.get("school").map(str::to_string),
        grade: row.get("grade").map(str::to_string),
        email: row.get("email").map(str::to_string),
        password: row.get("password").map(str::to_string),
    })
}

/// Parses a student upload. Required column: `name`.
pub fn parse_students(data: &[u8]) -> AppResult<Vec<RowResult<StudentRow>>> {
    let rows = read_table(data, student_column, &[("name", "name")])?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let row = row?;
            student_from_row(&row)
                .map(|student| (row.line, student))
                .map_err(|reason| BulkFailure::new(row.line, reason))
        })
        .collect())
}

pub const BOOKS_SAMPLE_CSV: &str = "book_title,author_name,category,book_code,publisher,pub_year,total_no,available_copies\n\
Blossoms of the Savannah,H. R. Ole Kulet,Fiction,BK-0001,Longhorn,2008,5,5\n";

pub const STUDENTS_SAMPLE_CSV: &str = "name,child_id,school,grade,email,password\n\
Amina Wanjiru,100234,Pangani School,Grade 4,,\n";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn books_use_original_headers() {
        let data = b"\xef\xbb\xbfBook_Title , Author_Name,book_code,pub_year,total_no\n\
                     Atlas,Juma,AT-1,2019,3\n";
        let rows = parse_books(data).unwrap();
        assert_eq!(rows.len(), 1);
        let (line, book) = rows[0].clone().unwrap();
        assert_eq!(line, 2);
        assert_eq!(book.title, "Atlas");
        assert_eq!(book.author, "Juma");
        assert_eq!(book.year_of_publication, Some(2019));
        assert_eq!(book.total_copies, 3);
        assert_eq!(book.available_copies, 3);
    }

    #[test]
    fn missing_required_column_rejects_file() {
        let err = parse_books(b"book_title,author_name\nAtlas,Juma\n").unwrap_err();
        match err {
            AppError::BadRequest(message) => assert!(message.contains("'book_code'")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn empty_rows_skipped_and_bad_rows_reported() {
        let data = b"book_title,book_code,total_no,available_copies\n\
                     Atlas,AT-1,2,5\n\
                     ,,,\n\
                     ,AT-2,1,1\n\
                     Dictionary,DC-1,x,\n";
        let rows = parse_books(data).unwrap();
        assert_eq!(rows.len(), 3);

        let (_, atlas) = rows[0].clone().unwrap();
        assert_eq!((atlas.total_copies, atlas.available_copies), (2, 2));

        let missing = rows[1].clone().unwrap_err();
        assert_eq!(missing.reference, "5");
        assert!(missing.reason.contains("Missing required fields"));

        let invalid = rows[2].clone().unwrap_err();
        assert_eq!(invalid.reference, "6");
        assert!(invalid.reason.contains("total_copies"));
    }

    #[test]
    fn spreadsheet_numbers_are_accepted() {
        let rows = parse_books(b"book_title,book_code,total_no\nAtlas,AT-1,4.0\n").unwrap();
        assert_eq!(rows[0].clone().unwrap().1.total_copies, 4);

        let data = b"book_title,book_code,total_no,available_copies\n\
                     Atlas,AT-1,100.00,2.000\n\
                     Globe,GL-1,4.5,\n\
                     Map,MP-1,1e40,\n";
        let rows = parse_books(data).unwrap();
        let (_, atlas) = rows[0].clone().unwrap();
        assert_eq!((atlas.total_copies, atlas.available_copies), (100, 2));
        assert!(rows[1].clone().unwrap_err().reason.contains("Invalid total_copies '4.5'"));
        assert!(rows[2].is_err());
    }

    #[test]
    fn students_require_name() {
        let data = b"name,child_id,school,grade\nAmina,100234,Pangani School,Grade 4\n,55,,\n";
        let rows = parse_students(data).unwrap();
        let (_, amina) = rows[0].clone().unwrap();
        assert_eq!(amina.child_id, Some(100234));
        assert_eq!(amina.school.as_deref(), Some("Pangani School"));
        assert!(rows[1].is_err());

        assert!(parse_students(b"child_id\n1\n").is_err());
    }

    #[test]
    fn only_csv_is_supported() {
        assert!(ensure_csv("books.CSV").is_ok());
        assert!(ensure_csv("books.xlsx").is_err());
    }

    #[test]
    fn samples_parse() {
        assert_eq!(parse_books(BOOKS_SAMPLE_CSV.as_bytes()).unwrap().len(), 1);
        assert_eq!(parse_students(STUDENTS_SAMPLE_CSV.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn report_message() {
        let report = ImportReport {
            created: 3,
            ..Default::default()
        }
        .finish("books");
        assert_eq!(report.message, "Successfully uploaded 3 books");
    }
}
