//! Question bank import (Excel and CSV)

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::config::LearnConfig;
use crate::error::{CoreError, Result};
use crate::questions::{Question, QuestionBank, QuestionBankBuilder};

/// Load the configured question file, or the built-in bank when none is
/// configured or the file cannot be used.
pub fn load_question_bank(config: &LearnConfig) -> QuestionBank {
    let Some(path) = &config.question_bank_path else {
        return QuestionBank::builtin();
    };
    match parse_file(path) {
        Ok(bank) => {
            info!(
                path = %path.display(),
                subjects = bank.subjects().len(),
                questions = bank.question_count(),
                "question bank imported"
            );
            bank
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "using built-in question bank");
            QuestionBank::builtin()
        }
    }
}

/// Parse a question file, picking the parser from the extension.
pub fn parse_file(path: &Path) -> Result<QuestionBank> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xls" => parse_excel(path),
        "csv" => parse_csv(path),
        _ => Err(CoreError::Import(format!("unsupported file format: .{extension}"))),
    }
}

/// Column index mapping
#[derive(Debug, Default, Clone)]
struct ColumnMapping {
    subject: usize,
    level: usize,
    prompt: usize,
    concepts: usize,
    media: Option<usize>,
}

/// Detect column indices from header names
fn detect_columns(headers: &[String]) -> Result<ColumnMapping> {
    let mut subject = None;
    let mut level = None;
    let mut prompt = None;
    let mut concepts = None;
    let mut media = None;

    for (i, header) in headers.iter().enumerate() {
        match header.to_lowercase().trim() {
            "subject" | "subjects" | "topic" => subject = Some(i),
            "level" | "difficulty" => level = Some(i),
            "prompt" | "question" => prompt = Some(i),
            "concepts" | "concept" | "keywords" => concepts = Some(i),
            "media" | "video" | "video_path" => media = Some(i),
            _ => {}
        }
    }

    let missing = |name: &str| CoreError::Import(format!("missing required '{name}' column in file header"));
    Ok(ColumnMapping {
        subject: subject.ok_or_else(|| missing("Subject"))?,
        level: level.ok_or_else(|| missing("Level"))?,
        prompt: prompt.ok_or_else(|| missing("Prompt"))?,
        concepts: concepts.ok_or_else(|| missing("Concepts"))?,
        media,
    })
}

/// Turn one row of cell strings into a builder entry. Rows without a
/// prompt are skipped.
fn push_row(
    builder: &mut QuestionBankBuilder,
    mapping: &ColumnMapping,
    cells: &[String],
    row_number: usize,
) -> Result<()> {
    let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or("");

    let prompt = cell(mapping.prompt);
    if prompt.is_empty() {
        return Ok(());
    }

    let subject = cell(mapping.subject);
    if subject.is_empty() {
        return Err(CoreError::Import(format!("row {row_number}: missing subject")));
    }

    let level: u32 = cell(mapping.level).parse().map_err(|_| {
        CoreError::Import(format!(
            "row {row_number}: invalid level '{}'",
            cell(mapping.level)
        ))
    })?;

    let concepts: Vec<String> = cell(mapping.concepts)
        .split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    let media_ref = mapping
        .media
        .map(cell)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    builder.push(
        subject,
        level,
        Question {
            prompt: prompt.to_string(),
            concepts,
            media_ref,
        },
    );
    Ok(())
}

/// Parse the first sheet of an Excel workbook
pub fn parse_excel(path: &Path) -> Result<QuestionBank> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| CoreError::Import(format!("failed to open Excel file: {e}")))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| CoreError::Import("no sheets found in Excel file".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| CoreError::Import(format!("failed to read sheet: {e}")))?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| CoreError::Import("empty file - no header row".to_string()))?;
    let headers: Vec<String> = header_row.iter().map(get_cell_string).collect();
    let mapping = detect_columns(&headers)?;

    let mut builder = QuestionBankBuilder::new();
    for (i, row) in rows.enumerate() {
        let cells: Vec<String> = row.iter().map(get_cell_string).collect();
        push_row(&mut builder, &mapping, &cells, i + 2)?;
    }
    builder.build()
}

/// Parse a CSV file with a header row
pub fn parse_csv(path: &Path) -> Result<QuestionBank> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CoreError::Import(format!("failed to open CSV file: {e}")))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CoreError::Import(format!("failed to read CSV headers: {e}")))?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mapping = detect_columns(&headers)?;

    let mut builder = QuestionBankBuilder::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| CoreError::Import(format!("failed to read CSV row: {e}")))?;
        let cells: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        push_row(&mut builder, &mapping, &cells, i + 2)?;
    }
    builder.build()
}

/// Helper to extract string from Excel cell
fn get_cell_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
        Data::Empty => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_csv(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.csv");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn imports_csv_with_aliases_and_media() {
        let (_dir, path) = write_csv(
            "Topic,Difficulty,Question,Keywords,Video\n\
             Geography,1,What is the capital of France?,paris; capital,videos/paris.mp4\n\
             Geography,2,Name the longest river in Africa.,nile;river,\n\
             Geography,2,,ignored,\n",
        );
        let mut bank = parse_file(&path).unwrap();
        assert_eq!(bank.subjects(), vec!["Geography".to_string()]);
        assert_eq!(bank.question_count(), 2);
        assert_eq!(bank.max_level("Geography"), Some(2));

        let q = bank.get_question("Geography", 1);
        assert_eq!(q.concepts, vec!["paris".to_string(), "capital".to_string()]);
        assert_eq!(q.media_ref.as_deref(), Some("videos/paris.mp4"));
    }

    #[test]
    fn missing_column_is_reported() {
        let (_dir, path) = write_csv("Subject,Prompt,Concepts\nArt,Who?,x\n");
        let err = parse_file(&path).unwrap_err();
        assert!(err.to_string().contains("Level"));
    }

    #[test]
    fn invalid_level_names_the_row() {
        let (_dir, path) = write_csv("Subject,Level,Prompt,Concepts\nArt,hard,Who?,x\n");
        let err = parse_file(&path).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn level_zero_fails_validation() {
        let (_dir, path) = write_csv("Subject,Level,Prompt,Concepts\nArt,0,Who?,x\n");
        assert!(matches!(parse_file(&path), Err(CoreError::InvalidQuestionBank(_))));
    }

    #[test]
    fn unsupported_extension() {
        let err = parse_file(Path::new("questions.txt")).unwrap_err();
        assert!(err.to_string().contains(".txt"));
    }

    #[test]
    fn broken_config_path_falls_back_to_builtin() {
        let config = LearnConfig {
            question_bank_path: Some("/nonexistent/questions.csv".into()),
            ..LearnConfig::default()
        };
        let bank = load_question_bank(&config);
        assert!(bank.contains_subject("Mathematics"));
    }
}
