//! Small hand-written PDF for engine tests
//!
//! Two pages (portrait letter with text and two annotations, landscape
//! letter with text), an outline with two entries and an info dictionary.
//! Also a malformed page tree whose nodes share their kids.

/// Serialize numbered objects into a PDF with a correct xref table
fn build_pdf(objects: &[String], trailer_extra: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());

    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            trailer_extra,
            xref_offset
        )
        .as_bytes(),
    );

    out
}

fn stream(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

pub fn sample_pdf() -> Vec<u8> {
    let objects = vec![
        // 1
        "<< /Type /Catalog /Pages 2 0 R /Outlines 8 0 R >>".to_string(),
        // 2
        "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>".to_string(),
        // 3
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 6 0 R >> >> /Contents 5 0 R \
         /Annots [10 0 R 11 0 R] >>"
            .to_string(),
        // 4
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 792 612] \
         /Resources << /Font << /F1 6 0 R >> >> /Contents 7 0 R >>"
            .to_string(),
        // 5
        stream("BT /F1 24 Tf 72 700 Td (Hello viewer) Tj ET"),
        // 6
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        // 7
        stream("BT /F1 18 Tf 72 500 Td (Second page) Tj ET"),
        // 8
        "<< /Type /Outlines /First 9 0 R /Last 12 0 R /Count 2 >>".to_string(),
        // 9
        "<< /Title (Introduction) /Parent 8 0 R /Next 12 0 R /Dest [3 0 R /Fit] >>".to_string(),
        // 10
        "<< /Type /Annot /Subtype /Highlight /Rect [70 690 250 730] \
         /QuadPoints [72 728 248 728 72 692 248 692] /C [1 1 0] \
         /Contents (Key sentence) /T (Reviewer) /M (D:20240101120000Z) >>"
            .to_string(),
        // 11
        "<< /Type /Annot /Subtype /Text /Rect [300 700 320 720] \
         /Contents (Check this) /T (Editor) /C [1 0 0] >>"
            .to_string(),
        // 12
        "<< /Title (Appendix) /Parent 8 0 R /Prev 9 0 R /Dest [4 0 R /Fit] >>".to_string(),
        // 13
        "<< /Title (Viewer Fixture) /Author (Test Author) >>".to_string(),
    ];

    build_pdf(&objects, "/Info 13 0 R")
}

/// Page tree where every intermediate node lists the same child twice,
/// `depth` levels deep, ending in one annotated page
pub fn shared_kids_pdf(depth: usize) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R 3 0 R] /Count 1 >>".to_string(),
    ];
    for level in 0..depth {
        let child = 4 + level;
        objects.push(format!(
            "<< /Type /Pages /Kids [{child} 0 R {child} 0 R] /Count 1 >>"
        ));
    }
    let annot = 4 + depth;
    objects.push(format!(
        "<< /Type /Page /MediaBox [0 0 612 792] /Annots [{annot} 0 R] >>"
    ));
    objects.push(
        "<< /Type /Annot /Subtype /Text /Rect [10 10 30 30] /Contents (Shared) >>".to_string(),
    );

    build_pdf(&objects, "")
}

#[test]
fn test_fixture_is_well_formed() {
    let pdf = sample_pdf();
    assert!(pdf.starts_with(b"%PDF-1.7"));
    assert!(pdf.ends_with(b"%%EOF\n"));
}
