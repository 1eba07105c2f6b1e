//! DOCX comparison.
//!
//! Paragraphs (text, style, alignment, run formatting) and tables are read
//! straight from `word/document.xml`. Two documents are compared at character
//! and paragraph level with `similar`, formatting is compared paragraph by
//! paragraph, and a weighted similarity score is computed:
//!
//! ```text
//! score = ratio * 0.5 + token_sort_ratio * 0.3 + token_set_ratio * 0.2
//! ```
//!
//! The first document is the request content, the second comes from the
//! `document_2` option. The report is returned as JSON bytes.
//!
//! Parsing and diffing run on the blocking pool. All diffs of one comparison
//! share a deadline ([`DIFF_TIME_BUDGET`]); once it passes, `similar` falls
//! back to coarser edit scripts, so scores of very large documents are
//! approximate.

use async_trait::async_trait;
use chrono::Utc;
use roxmltree::Node;
use serde::Serialize;
use serde_json::{Value, json};
use similar::{Algorithm, DiffOp, DiffTag, capture_diff_slices_deadline, get_diff_ratio};
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::{Duration, Instant};

use super::{ContentSource, finish};
use crate::plugins::Converter;
use crate::types::{ConversionFormat, ConversionRequest, ConversionResult, ConverterCapabilities, Options, generate_job_id};
use crate::{KanvertError, Result};

pub const NAME: &str = "docx_compare";

/// Time allowed for all diffs of a single comparison.
pub const DIFF_TIME_BUDGET: Duration = Duration::from_secs(2);

const DOCUMENT_XML: &str = "word/document.xml";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunInfo {
    pub text: String,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParagraphInfo {
    pub text: String,
    pub style: Option<String>,
    pub alignment: Option<String>,
    pub runs: Vec<RunInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableInfo {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentStats {
    pub paragraph_count: usize,
    pub table_count: usize,
    pub word_count: usize,
    pub character_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentContent {
    pub paragraphs: Vec<ParagraphInfo>,
    pub tables: Vec<TableInfo>,
    pub stats: DocumentStats,
}

impl DocumentContent {
    /// Paragraph texts joined by single spaces.
    pub fn joined_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes().find(|a| a.name() == name).map(|a| a.value())
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.tag_name().name() == name)
}

/// `<w:b/>` means on; `w:val="0"` or `"false"` means explicitly off.
fn toggle(properties: Option<Node<'_, '_>>, name: &str) -> Option<bool> {
    let element = child(properties?, name)?;
    Some(!matches!(attr(element, "val"), Some("0" | "false" | "none")))
}

fn run_text(run: Node<'_, '_>) -> String {
    let mut text = String::new();
    for node in run.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "t" => text.push_str(node.text().unwrap_or("")),
            "tab" => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

fn parse_paragraph(paragraph: Node<'_, '_>) -> ParagraphInfo {
    let properties = child(paragraph, "pPr");
    let style = properties
        .and_then(|p| child(p, "pStyle"))
        .and_then(|s| attr(s, "val"))
        .map(str::to_string);
    let alignment = properties
        .and_then(|p| child(p, "jc"))
        .and_then(|j| attr(j, "val"))
        .map(str::to_string);

    let runs: Vec<RunInfo> = paragraph
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "r")
        .map(|run| {
            let run_properties = child(run, "rPr");
            RunInfo {
                text: run_text(run),
                bold: toggle(run_properties, "b"),
                italic: toggle(run_properties, "i"),
                underline: toggle(run_properties, "u"),
            }
        })
        .collect();

    let text = runs.iter().map(|r| r.text.as_str()).collect();

    ParagraphInfo {
        text,
        style,
        alignment,
        runs,
    }
}

fn parse_table(table: Node<'_, '_>) -> TableInfo {
    let cells: Vec<Vec<String>> = table
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "tr")
        .map(|row| {
            row.children()
                .filter(|n| n.is_element() && n.tag_name().name() == "tc")
                .map(|cell| {
                    cell.descendants()
                        .filter(|n| n.is_element() && n.tag_name().name() == "p")
                        .map(|p| parse_paragraph(p).text)
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .collect()
        })
        .collect();

    TableInfo {
        rows: cells.len(),
        cols: cells.iter().map(Vec::len).max().unwrap_or(0),
        cells,
    }
}

/// Parse the body of a `word/document.xml` part.
pub fn parse_document_xml(xml: &str) -> Result<DocumentContent> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| KanvertError::processing(format!("Failed to parse {}: {}", DOCUMENT_XML, e)))?;

    let body = child(doc.root_element(), "body")
        .ok_or_else(|| KanvertError::processing(format!("{} has no body element", DOCUMENT_XML)))?;

    let mut content = DocumentContent::default();
    for node in body.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "p" => content.paragraphs.push(parse_paragraph(node)),
            "tbl" => content.tables.push(parse_table(node)),
            _ => {}
        }
    }

    let joined = content.joined_text();
    content.stats = DocumentStats {
        paragraph_count: content.paragraphs.len(),
        table_count: content.tables.len(),
        word_count: joined.split_whitespace().count(),
        character_count: joined.chars().count(),
    };

    Ok(content)
}

/// Read paragraphs and tables from DOCX bytes.
pub fn extract_document(bytes: &[u8]) -> Result<DocumentContent> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| KanvertError::processing(format!("Not a valid DOCX archive: {}", e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| KanvertError::processing(format!("DOCX archive has no {}: {}", DOCUMENT_XML, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| KanvertError::processing(format!("Failed to read {}: {}", DOCUMENT_XML, e)))?;

    parse_document_xml(&xml)
}

fn tag_name(tag: DiffTag) -> &'static str {
    match tag {
        DiffTag::Equal => "equal",
        DiffTag::Delete => "delete",
        DiffTag::Insert => "insert",
        DiffTag::Replace => "replace",
    }
}

fn diff<T: Eq + std::hash::Hash + Ord>(a: &[T], b: &[T], deadline: Option<Instant>) -> Vec<DiffOp> {
    capture_diff_slices_deadline(Algorithm::Myers, a, b, deadline)
}

/// Similarity of two sequences in `[0, 1]`; two empty sequences are identical.
fn sequence_ratio<T: Eq + std::hash::Hash + Ord>(a: &[T], b: &[T], deadline: Option<Instant>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let ops = diff(a, b, deadline);
    get_diff_ratio(&ops, a.len(), b.len()) as f64
}

fn string_ratio(a: &str, b: &str, deadline: Option<Instant>) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    sequence_ratio(&a, &b, deadline)
}

/// Lower-case, replace non-alphanumerics with spaces, split into tokens.
fn tokens(text: &str) -> Vec<String> {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Ratio of the two texts after sorting their tokens.
pub fn token_sort_ratio(a: &str, b: &str, deadline: Option<Instant>) -> f64 {
    let mut ta = tokens(a);
    let mut tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    ta.sort();
    tb.sort();
    string_ratio(&ta.join(" "), &tb.join(" "), deadline)
}

/// Ratio built from the shared tokens and each side's remainder.
pub fn token_set_ratio(a: &str, b: &str, deadline: Option<Instant>) -> f64 {
    let sa: BTreeSet<String> = tokens(a).into_iter().collect();
    let sb: BTreeSet<String> = tokens(b).into_iter().collect();
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }

    let join = |set: Vec<&String>| set.into_iter().map(String::as_str).collect::<Vec<_>>().join(" ");
    let common = join(sa.intersection(&sb).collect());
    let only_a = join(sa.difference(&sb).collect());
    let only_b = join(sb.difference(&sa).collect());

    let combined_a = format!("{} {}", common, only_a).trim().to_string();
    let combined_b = format!("{} {}", common, only_b).trim().to_string();

    [
        string_ratio(&common, &combined_a, deadline),
        string_ratio(&common, &combined_b, deadline),
        string_ratio(&combined_a, &combined_b, deadline),
    ]
    .into_iter()
    .fold(0.0, f64::max)
}

/// Weighted similarity of two documents, rounded to three decimals.
pub fn similarity_score(first: &DocumentContent, second: &DocumentContent, deadline: Option<Instant>) -> f64 {
    let text1 = first.joined_text();
    let text2 = second.joined_text();

    let score = string_ratio(&text1, &text2, deadline) * 0.5
        + token_sort_ratio(&text1, &text2, deadline) * 0.3
        + token_set_ratio(&text1, &text2, deadline) * 0.2;
    (score * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Serialize)]
pub struct TextChange {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub original: String,
    pub modified: String,
    pub position: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParagraphChange {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub original_paragraphs: Vec<String>,
    pub modified_paragraphs: Vec<String>,
    pub paragraph_range: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentDifferences {
    pub changes_count: usize,
    pub text_changes: Vec<TextChange>,
    pub paragraph_changes: Vec<ParagraphChange>,
    pub statistics: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormattingDifferences {
    pub changes_count: usize,
    pub formatting_changes: Vec<Value>,
}

fn changed_ops(ops: Vec<DiffOp>) -> impl Iterator<Item = (DiffTag, std::ops::Range<usize>, std::ops::Range<usize>)> {
    ops.into_iter()
        .map(|op| op.as_tag_tuple())
        .filter(|(tag, _, _)| *tag != DiffTag::Equal)
}

pub fn compare_content(first: &DocumentContent, second: &DocumentContent, deadline: Option<Instant>) -> ContentDifferences {
    let text1 = first.joined_text();
    let text2 = second.joined_text();
    let chars1: Vec<char> = text1.chars().collect();
    let chars2: Vec<char> = text2.chars().collect();

    let text_changes: Vec<TextChange> = changed_ops(diff(&chars1, &chars2, deadline))
        .map(|(tag, old, new)| TextChange {
            kind: tag_name(tag),
            original: chars1[old.clone()].iter().collect(),
            modified: chars2[new].iter().collect(),
            position: json!({"start": old.start, "end": old.end}),
        })
        .collect();

    let paras1: Vec<&str> = first.paragraphs.iter().map(|p| p.text.as_str()).collect();
    let paras2: Vec<&str> = second.paragraphs.iter().map(|p| p.text.as_str()).collect();
    let paragraph_changes = changed_ops(diff(&paras1, &paras2, deadline))
        .map(|(tag, old, new)| ParagraphChange {
            kind: tag_name(tag),
            original_paragraphs: paras1[old.clone()].iter().map(|s| s.to_string()).collect(),
            modified_paragraphs: paras2[new].iter().map(|s| s.to_string()).collect(),
            paragraph_range: json!({"start": old.start, "end": old.end}),
        })
        .collect();

    ContentDifferences {
        changes_count: text_changes.len(),
        text_changes,
        paragraph_changes,
        statistics: json!({
            "original_words": first.stats.word_count,
            "modified_words": second.stats.word_count,
            "original_paragraphs": first.stats.paragraph_count,
            "modified_paragraphs": second.stats.paragraph_count,
        }),
    }
}

pub fn compare_formatting(first: &DocumentContent, second: &DocumentContent) -> FormattingDifferences {
    let mut changes = Vec::new();

    for (i, (p1, p2)) in first.paragraphs.iter().zip(&second.paragraphs).enumerate() {
        if p1.style != p2.style {
            changes.push(json!({
                "type": "style_change",
                "paragraph_index": i,
                "original_style": p1.style,
                "modified_style": p2.style,
            }));
        }
        if p1.alignment != p2.alignment {
            changes.push(json!({
                "type": "alignment_change",
                "paragraph_index": i,
                "original_alignment": p1.alignment,
                "modified_alignment": p2.alignment,
            }));
        }
        for (j, (r1, r2)) in p1.runs.iter().zip(&p2.runs).enumerate() {
            if r1.bold != r2.bold {
                changes.push(json!({
                    "type": "bold_change",
                    "paragraph_index": i,
                    "run_index": j,
                    "original_bold": r1.bold,
                    "modified_bold": r2.bold,
                }));
            }
        }
    }

    FormattingDifferences {
        changes_count: changes.len(),
        formatting_changes: changes,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonType {
    Content,
    Formatting,
    Both,
}

impl ComparisonType {
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("both") => Ok(ComparisonType::Both),
            Some("content") => Ok(ComparisonType::Content),
            Some("formatting") => Ok(ComparisonType::Formatting),
            Some(other) => Err(KanvertError::validation(format!(
                "Invalid comparison_type '{}', expected content, formatting or both",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonType::Content => "content",
            ComparisonType::Formatting => "formatting",
            ComparisonType::Both => "both",
        }
    }

    fn includes_content(&self) -> bool {
        matches!(self, ComparisonType::Content | ComparisonType::Both)
    }

    fn includes_formatting(&self) -> bool {
        matches!(self, ComparisonType::Formatting | ComparisonType::Both)
    }
}

/// Full comparison outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub differences_found: bool,
    pub similarity_score: f64,
    pub comparison_type: &'static str,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_differences: Option<ContentDifferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatting_differences: Option<FormattingDifferences>,
    pub recommendations: Vec<String>,
    pub document_1_stats: DocumentStats,
    pub document_2_stats: DocumentStats,
}

pub fn summarize(content_changes: usize, formatting_changes: usize) -> String {
    if content_changes == 0 && formatting_changes == 0 {
        return "Documents are identical in content and formatting.".to_string();
    }

    let mut parts = Vec::new();
    if content_changes > 0 {
        parts.push(format!("{} content changes detected", content_changes));
    }
    if formatting_changes > 0 {
        parts.push(format!("{} formatting changes detected", formatting_changes));
    }
    format!("Differences found: {}.", parts.join(", "))
}

pub fn recommendations(content_changes: usize, formatting_changes: usize) -> Vec<String> {
    let mut out = Vec::new();
    if content_changes > 10 {
        out.push("Consider reviewing major content changes for accuracy".to_string());
    }
    if formatting_changes > 5 {
        out.push("Standardize formatting across documents for consistency".to_string());
    }
    if content_changes == 0 && formatting_changes > 0 {
        out.push("Content is identical; only formatting differs".to_string());
    }
    out
}

/// Compares two parsed documents. Diffs stop refining once `DIFF_TIME_BUDGET`
/// has elapsed.
pub fn compare_documents(first: &DocumentContent, second: &DocumentContent, kind: ComparisonType) -> ComparisonReport {
    let deadline = Some(Instant::now() + DIFF_TIME_BUDGET);
    let content = kind.includes_content().then(|| compare_content(first, second, deadline));
    let formatting = kind.includes_formatting().then(|| compare_formatting(first, second));

    let content_changes = content.as_ref().map_or(0, |c| c.changes_count);
    let formatting_changes = formatting.as_ref().map_or(0, |f| f.changes_count);

    ComparisonReport {
        differences_found: content_changes + formatting_changes > 0,
        similarity_score: similarity_score(first, second, deadline),
        comparison_type: kind.as_str(),
        summary: summarize(content_changes, formatting_changes),
        content_differences: content,
        formatting_differences: formatting,
        recommendations: recommendations(content_changes, formatting_changes),
        document_1_stats: first.stats.clone(),
        document_2_stats: second.stats.clone(),
    }
}

/// A DOCX source must be a data URL or an existing file.
fn is_docx_source(content: &str) -> bool {
    let content = content.trim();
    !content.is_empty() && (content.starts_with("data:") || Path::new(content).is_file())
}

async fn load_docx_bytes(content: &str) -> Result<Vec<u8>> {
    match ContentSource::classify(content.trim())? {
        source @ (ContentSource::DataUrl { .. } | ContentSource::File(_)) => source.load_bytes().await,
        _ => Err(KanvertError::validation("Invalid DOCX content or file path")),
    }
}

#[derive(Debug, Default)]
pub struct DocxCompareConverter;

impl DocxCompareConverter {
    pub fn new() -> Self {
        Self
    }

    async fn compare(&self, request: &ConversionRequest, job_id: &str) -> Result<(Vec<u8>, String, Options)> {
        let second_source = request
            .option_str("document_2")
            .ok_or_else(|| KanvertError::validation("Missing 'document_2' option"))?;
        let kind = ComparisonType::parse(request.option_str("comparison_type"))?;

        let first = load_docx_bytes(&request.content).await?;
        let second = load_docx_bytes(second_source).await?;
        let report = tokio::task::spawn_blocking(move || -> Result<ComparisonReport> {
            let first = extract_document(&first)?;
            let second = extract_document(&second)?;
            Ok(compare_documents(&first, &second, kind))
        })
        .await
        .map_err(|e| KanvertError::processing(format!("Comparison task failed: {}", e)))??;

        let mut comparison_options = request.options.clone();
        comparison_options.remove("document_2");

        let body = json!({
            "job_id": job_id,
            "report": &report,
            "detailed_report": {
                "executive_summary": &report.summary,
                "analysis_method": "DOCX comparison with content and formatting analysis",
                "recommendations": &report.recommendations,
                "metadata": {
                    "analysis_timestamp": Utc::now().to_rfc3339(),
                    "comparison_options": comparison_options,
                },
            },
        });
        let bytes = serde_json::to_vec_pretty(&body)?;

        let mut metadata = Options::new();
        metadata.insert("differences_found".to_string(), json!(report.differences_found));
        metadata.insert("similarity_score".to_string(), json!(report.similarity_score));
        metadata.insert("comparison_type".to_string(), json!(report.comparison_type));
        metadata.insert("summary".to_string(), json!(report.summary));
        metadata.insert("document_1_stats".to_string(), json!(report.document_1_stats));
        metadata.insert("document_2_stats".to_string(), json!(report.document_2_stats));

        Ok((bytes, format!("{}.json", job_id), metadata))
    }
}

#[async_trait]
impl Converter for DocxCompareConverter {
    fn name(&self) -> &str {
        NAME
    }

    fn supported_formats(&self) -> &[ConversionFormat] {
        &[ConversionFormat::Comparison]
    }

    fn validate_request(&self, request: &ConversionRequest) -> bool {
        request.output_format == ConversionFormat::Comparison
            && is_docx_source(&request.content)
            && request.option_str("document_2").is_some_and(is_docx_source)
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        let job_id = generate_job_id("docx_compare");
        let created_at = Utc::now();
        tracing::info!(job_id = %job_id, "Starting DOCX comparison");

        let outcome = if self.validate_request(request) {
            self.compare(request, &job_id).await
        } else {
            Err(KanvertError::validation("Invalid DOCX comparison request"))
        };

        Ok(finish(NAME, job_id, created_at, outcome))
    }

    fn capabilities(&self) -> ConverterCapabilities {
        ConverterCapabilities {
            name: NAME.to_string(),
            description: "Compare two DOCX documents for content and formatting differences".to_string(),
            supported_formats: self.supported_formats().to_vec(),
            features: [
                "Content difference analysis",
                "Formatting comparison",
                "Similarity scoring",
                "Detailed reporting",
            ]
            .map(String::from)
            .to_vec(),
            supported_options: ["document_2", "comparison_type"].map(String::from).to_vec(),
            example_request: json!({
                "content": "path/to/document1.docx",
                "output_format": "comparison",
                "options": {"document_2": "path/to/document2.docx", "comparison_type": "both"}
            }),
            extra: Options::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversionStatus;
    use std::io::Write;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn paragraph_xml(text: &str, style: Option<&str>, bold: bool) -> String {
        let ppr = style
            .map(|s| format!("<w:pPr><w:pStyle w:val=\"{}\"/></w:pPr>", s))
            .unwrap_or_default();
        let rpr = if bold { "<w:rPr><w:b/></w:rPr>" } else { "" };
        format!("<w:p>{}<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", ppr, rpr, text)
    }

    fn document_xml(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><w:document xmlns:w=\"{}\"><w:body>{}</w:body></w:document>",
            W_NS, body
        )
    }

    /// Minimal DOCX archive holding only `word/document.xml`.
    fn docx_bytes(body: &str) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file(DOCUMENT_XML, options).unwrap();
            writer.write_all(document_xml(body).as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_parse_document_xml() {
        let body = format!(
            "{}{}<w:tbl><w:tr><w:tc><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            paragraph_xml("Title", Some("Heading1"), true),
            "<w:p><w:pPr><w:jc w:val=\"center\"/></w:pPr><w:r><w:t>Hello</w:t></w:r><w:r><w:rPr><w:b w:val=\"0\"/></w:rPr><w:tab/><w:t>world</w:t></w:r></w:p>"
        );
        let content = parse_document_xml(&document_xml(&body)).unwrap();

        assert_eq!(content.paragraphs.len(), 2);
        assert_eq!(content.paragraphs[0].style.as_deref(), Some("Heading1"));
        assert_eq!(content.paragraphs[0].runs[0].bold, Some(true));
        assert_eq!(content.paragraphs[1].alignment.as_deref(), Some("center"));
        assert_eq!(content.paragraphs[1].text, "Hello\tworld");
        assert_eq!(content.paragraphs[1].runs[0].bold, None);
        assert_eq!(content.paragraphs[1].runs[1].bold, Some(false));
        assert_eq!(content.tables[0].cells, vec![vec!["A1".to_string(), "B1".to_string()]]);
        assert_eq!(content.stats.word_count, 3);
        assert_eq!(content.stats.table_count, 1);
    }

    #[test]
    fn test_extract_document_rejects_non_zip() {
        assert!(extract_document(b"not a zip").is_err());
    }

    #[test]
    fn test_token_ratios() {
        assert_eq!(token_sort_ratio("world hello", "Hello, World!", None), 1.0);
        assert_eq!(token_set_ratio("the quick fox", "quick fox the the", None), 1.0);
        assert_eq!(token_sort_ratio("", "x", None), 0.0);
        assert!(token_set_ratio("alpha beta", "gamma delta", None) < 0.5);
    }

    /// Twelve-word paragraphs drawn from a fixed vocabulary.
    fn synthetic_document(seed: u64, paragraphs: usize) -> DocumentContent {
        const WORDS: [&str; 16] = [
            "contract", "party", "clause", "payment", "delivery", "notice", "term", "breach", "remedy", "annex",
            "schedule", "liability", "warranty", "service", "period", "invoice",
        ];
        let mut state = seed;
        let mut body = String::new();
        for _ in 0..paragraphs {
            let words: Vec<&str> = (0..12)
                .map(|_| {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    WORDS[(state >> 33) as usize % WORDS.len()]
                })
                .collect();
            body.push_str(&paragraph_xml(&words.join(" "), None, false));
        }
        parse_document_xml(&document_xml(&body)).unwrap()
    }

    #[test]
    fn test_large_documents_compare_within_budget() {
        let first = synthetic_document(1, 700);
        let second = synthetic_document(2, 700);
        assert!(first.joined_text().len() > 50_000);

        let started = Instant::now();
        let report = compare_documents(&first, &second, ComparisonType::Both);
        let elapsed = started.elapsed();

        assert!(elapsed < DIFF_TIME_BUDGET * 10, "comparison took {:?}", elapsed);
        assert!((0.0..=1.0).contains(&report.similarity_score));
        assert!(report.differences_found);
    }

    #[test]
    fn test_identical_documents() {
        let doc = parse_document_xml(&document_xml(&paragraph_xml("Same text", None, false))).unwrap();
        let report = compare_documents(&doc, &doc, ComparisonType::Both);
        assert!(!report.differences_found);
        assert_eq!(report.similarity_score, 1.0);
        assert_eq!(report.summary, "Documents are identical in content and formatting.");
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_formatting_only_difference() {
        let plain = parse_document_xml(&document_xml(&paragraph_xml("Same text", None, false))).unwrap();
        let bold = parse_document_xml(&document_xml(&paragraph_xml("Same text", Some("Strong"), true))).unwrap();

        let report = compare_documents(&plain, &bold, ComparisonType::Both);
        assert!(report.differences_found);
        let formatting = report.formatting_differences.as_ref().unwrap();
        assert_eq!(formatting.changes_count, 2);
        assert_eq!(report.content_differences.as_ref().unwrap().changes_count, 0);
        assert_eq!(report.summary, "Differences found: 2 formatting changes detected.");
        assert_eq!(report.recommendations, vec!["Content is identical; only formatting differs".to_string()]);

        let content_only = compare_documents(&plain, &bold, ComparisonType::Content);
        assert!(!content_only.differences_found);
        assert!(content_only.formatting_differences.is_none());
    }

    #[test]
    fn test_content_difference() {
        let first = parse_document_xml(&document_xml(&format!(
            "{}{}",
            paragraph_xml("Intro", None, false),
            paragraph_xml("The cat sat", None, false)
        )))
        .unwrap();
        let second = parse_document_xml(&document_xml(&format!(
            "{}{}",
            paragraph_xml("Intro", None, false),
            paragraph_xml("The dog sat", None, false)
        )))
        .unwrap();

        let diff = compare_content(&first, &second, None);
        assert!(diff.changes_count >= 1);
        assert_eq!(diff.paragraph_changes.len(), 1);
        assert!(matches!(diff.paragraph_changes[0].kind, "replace" | "delete"));
        assert_eq!(diff.paragraph_changes[0].original_paragraphs, vec!["The cat sat".to_string()]);

        let score = similarity_score(&first, &second, None);
        assert!(score > 0.5 && score < 1.0);
    }

    #[test]
    fn test_comparison_type_parse() {
        assert_eq!(ComparisonType::parse(None).unwrap(), ComparisonType::Both);
        assert_eq!(ComparisonType::parse(Some("Content")).unwrap(), ComparisonType::Content);
        assert!(ComparisonType::parse(Some("layout")).is_err());
    }

    #[tokio::test]
    async fn test_convert_compares_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.docx");
        let second = dir.path().join("two.docx");
        std::fs::write(&first, docx_bytes(&paragraph_xml("Version one", None, false))).unwrap();
        std::fs::write(&second, docx_bytes(&paragraph_xml("Version two", None, false))).unwrap();

        let request = ConversionRequest::new(first.to_str().unwrap(), ConversionFormat::Comparison)
            .with_option("document_2", second.to_str().unwrap());
        let converter = DocxCompareConverter::new();
        assert!(converter.validate_request(&request));

        let result = converter.convert(&request).await.unwrap();
        assert_eq!(result.status(), ConversionStatus::Completed);
        assert!(result.output_filename().unwrap().ends_with(".json"));
        assert_eq!(result.metadata()["differences_found"], true);

        let body: Value = serde_json::from_slice(result.output_data().unwrap()).unwrap();
        assert_eq!(body["report"]["comparison_type"], "both");
        assert!(body["detailed_report"]["metadata"]["comparison_options"].get("document_2").is_none());
    }

    #[tokio::test]
    async fn test_convert_without_second_document_fails() {
        let converter = DocxCompareConverter::new();
        let request = ConversionRequest::new("data:,x", ConversionFormat::Comparison);
        assert!(!converter.validate_request(&request));
        let result = converter.convert(&request).await.unwrap();
        assert_eq!(result.status(), ConversionStatus::Failed);
        assert_eq!(result.error_message(), Some("Validation error: Invalid DOCX comparison request"));
    }
}
