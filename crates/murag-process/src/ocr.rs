//! OCR processing using Tesseract.

use crate::error::{ProcessError, ProcessResult};
use crate::require_tool;
use murag_core::Region;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// A block of recognised text and where it sits in the image.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrBlock {
    pub text: String,
    pub region: Region,
    /// Mean word confidence (0-100).
    pub confidence: f32,
}

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Blocks in reading order.
    pub blocks: Vec<OcrBlock>,
}

impl OcrResult {
    /// All recognised text, one block per paragraph.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn mean_confidence(&self) -> Option<f32> {
        if self.blocks.is_empty() {
            return None;
        }
        Some(self.blocks.iter().map(|b| b.confidence).sum::<f32>() / self.blocks.len() as f32)
    }
}

/// Perform OCR on an image file, keeping a bounding region per text block.
pub fn ocr_image(image_path: &Path, language: &str) -> ProcessResult<OcrResult> {
    if !image_path.exists() {
        return Err(ProcessError::FileNotFound(image_path.to_path_buf()));
    }
    require_tool("tesseract")?;

    debug!("Running OCR on {:?} ({})", image_path, language);

    let output = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .args(["-l", language])
        .args(["--oem", "3"]) // LSTM + legacy engine
        .args(["--psm", "1"]) // Automatic page segmentation with OSD
        .arg("tsv")
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Tesseract sometimes outputs warnings to stderr but still works
        if !output.stdout.is_empty() {
            debug!("Tesseract warning: {}", stderr);
        } else {
            return Err(ProcessError::OcrError(stderr.to_string()));
        }
    }

    let blocks = parse_tsv(&String::from_utf8_lossy(&output.stdout))?;
    debug!("OCR found {} text blocks", blocks.len());

    Ok(OcrResult { blocks })
}

#[derive(Default)]
struct BlockAcc {
    lines: BTreeMap<(u32, u32), Vec<String>>,
    region: Option<Region>,
    confidence_sum: f32,
    words: u32,
}

/// Parse Tesseract TSV output into text blocks.
///
/// Words (level 5) are grouped by `(page, block)`; lines inside a block are
/// joined with newlines, words with spaces.
pub fn parse_tsv(tsv: &str) -> ProcessResult<Vec<OcrBlock>> {
    let mut blocks: BTreeMap<(u32, u32), BlockAcc> = BTreeMap::new();

    for (line_no, line) in tsv.lines().enumerate() {
        if line_no == 0 && line.starts_with("level") {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 11 {
            return Err(ProcessError::ParseError(format!(
                "TSV line {} has {} columns",
                line_no + 1,
                cols.len()
            )));
        }
        if cols[0] != "5" {
            continue;
        }

        let text = cols.get(11).map(|t| t.trim()).unwrap_or("");
        if text.is_empty() {
            continue;
        }

        let num = |i: usize| -> ProcessResult<u32> {
            cols[i].trim().parse().map_err(|_| {
                ProcessError::ParseError(format!(
                    "TSV line {} column {}: {:?}",
                    line_no + 1,
                    i + 1,
                    cols[i]
                ))
            })
        };

        let key = (num(1)?, num(2)?);
        let line_key = (num(3)?, num(4)?);
        let word_region = Region::new(num(6)?, num(7)?, num(8)?, num(9)?);
        let confidence: f32 = cols[10].trim().parse().unwrap_or(0.0);

        let acc = blocks.entry(key).or_default();
        acc.lines.entry(line_key).or_default().push(text.to_string());
        acc.region = Some(match acc.region {
            Some(r) => r.union(&word_region),
            None => word_region,
        });
        acc.confidence_sum += confidence.max(0.0);
        acc.words += 1;
    }

    Ok(blocks
        .into_values()
        .filter_map(|acc| {
            let region = acc.region?;
            let text = acc
                .lines
                .into_values()
                .map(|words| words.join(" "))
                .collect::<Vec<_>>()
                .join("\n");
            Some(OcrBlock {
                text,
                region,
                confidence: acc.confidence_sum / acc.words.max(1) as f32,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t
2\t1\t1\t0\t0\t0\t10\t10\t200\t40\t-1\t
5\t1\t1\t1\t1\t1\t10\t10\t80\t20\t96.5\tInvoice
5\t1\t1\t1\t1\t2\t95\t10\t60\t20\t93.5\t#42
5\t1\t1\t1\t2\t1\t10\t35\t120\t15\t90\tTotal:
2\t1\t2\t0\t0\t0\t400\t500\t100\t30\t-1\t
5\t1\t2\t1\t1\t1\t400\t500\t100\t30\t88\tPaid
5\t1\t2\t1\t1\t2\t510\t500\t10\t30\t10\t
";

    #[test]
    fn test_parse_tsv_groups_blocks() {
        let blocks = parse_tsv(SAMPLE).unwrap();
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks[0].text, "Invoice #42\nTotal:");
        assert_eq!(blocks[0].region, Region::new(10, 10, 145, 40));
        assert!((blocks[0].confidence - 93.333).abs() < 0.01);

        assert_eq!(blocks[1].text, "Paid");
        assert_eq!(blocks[1].region, Region::new(400, 500, 100, 30));
    }

    #[test]
    fn test_parse_tsv_empty_output() {
        let blocks = parse_tsv("level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n").unwrap();
        assert!(blocks.is_empty());

        let result = OcrResult { blocks };
        assert_eq!(result.text(), "");
        assert_eq!(result.mean_confidence(), None);
    }

    #[test]
    fn test_parse_tsv_rejects_truncated_rows() {
        assert!(matches!(
            parse_tsv("5\t1\t1\n"),
            Err(ProcessError::ParseError(_))
        ));
    }

    #[test]
    fn test_ocr_missing_file() {
        let err = ocr_image(Path::new("/definitely/not/here.png"), "eng").unwrap_err();
        assert!(matches!(err, ProcessError::FileNotFound(_)));
        assert!(!err.is_retryable());
    }
}
