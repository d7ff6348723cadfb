use std::fs;
use std::io::Write;
use tempfile::TempDir;

use docqa_core::extract::{extract_documents, PlainTextExtractor, SourceDocument};
use docqa_core::segmenter::Segmenter;

fn load_dir(dir: &std::path::Path) -> Vec<SourceDocument> {
    let mut paths: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
    paths.sort();
    paths
        .into_iter()
        .map(|p| SourceDocument::new(p.file_name().unwrap().to_string_lossy(), fs::read(&p).unwrap()))
        .collect()
}

#[test]
fn single_small_file_becomes_one_chunk() {
    let tmp = TempDir::new().unwrap();
    let mut f = fs::File::create(tmp.path().join("a.txt")).unwrap();
    writeln!(f, "Short text").unwrap();

    let extracted = extract_documents(&load_dir(tmp.path()), &PlainTextExtractor);
    let chunks = Segmenter::new(500, 100).unwrap().segment_documents(&extracted.documents);

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].text, "Short text");
    assert_eq!(chunks[0].source.as_deref(), Some("a.txt"));
}

#[test]
fn unreadable_file_does_not_abort_the_batch() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "alpha bravo").unwrap();
    fs::write(tmp.path().join("b.bin"), [0xc3u8, 0x28, 0xa0, 0xa1]).unwrap();
    fs::write(tmp.path().join("c.txt"), "charlie delta").unwrap();

    let extracted = extract_documents(&load_dir(tmp.path()), &PlainTextExtractor);
    assert_eq!(extracted.failures.len(), 1);

    let chunks = Segmenter::new(500, 100).unwrap().segment_documents(&extracted.documents);
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["alpha bravo", "charlie delta"]);
    assert_eq!(chunks.iter().map(|c| c.id).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn long_document_splits_on_paragraphs_with_overlap() {
    let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(6);
    let text = format!("{p}\n\n{p}\n\n{p}", p = paragraph.trim());
    let seg = Segmenter::new(300, 60).unwrap();
    let chunks = seg.segment(&text);
    assert!(chunks.len() >= 2);
    for c in &chunks {
        assert!(c.text.chars().count() <= 300);
    }
}

/// Single-page PDF showing `text` in Helvetica, with a correct xref table.
#[cfg(feature = "pdf")]
fn one_page_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 72 712 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
    ];
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", objects.len() + 1, xref).as_bytes(),
    );
    pdf
}

#[cfg(feature = "pdf")]
#[test]
fn corrupt_pdf_is_skipped_while_a_good_one_is_extracted() {
    use docqa_core::extract::FileExtractor;
    use docqa_core::Error;

    let docs = vec![
        SourceDocument::new("manual.pdf", one_page_pdf("Bank the coals before sleeping.")),
        SourceDocument::new("scan.pdf", b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog".to_vec()),
        SourceDocument::new("notes.txt", "Boil water for one minute."),
    ];
    let extracted = extract_documents(&docs, &FileExtractor);
    assert_eq!(extracted.documents.len(), 2);
    assert_eq!(extracted.documents[0].name, "manual.pdf");
    assert!(extracted.documents[0].text.contains("Bank the coals"), "{:?}", extracted.documents[0].text);
    assert_eq!(extracted.documents[1].text, "Boil water for one minute.");
    assert_eq!(extracted.failures.len(), 1);
    assert!(matches!(&extracted.failures[0], Error::Extraction { document, .. } if document == "scan.pdf"));

    let chunks = Segmenter::new(500, 100).unwrap().segment_documents(&extracted.documents);
    assert!(chunks.iter().any(|c| c.text.contains("coals")));
}
