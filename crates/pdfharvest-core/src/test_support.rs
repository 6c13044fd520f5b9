//! Helpers shared by unit tests.

use std::path::Path;

use lopdf::dictionary;
use lopdf::{Document, Object, Stream};

/// Build a text PDF with one page per entry, one text line per string.
pub(crate) fn make_pdf(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for lines in pages {
        let mut content = String::from("BT /F1 12 Tf 72 720 Td ");
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                content.push_str("0 -16 Td ");
            }
            content.push_str(&format!("({}) Tj ", escape(line)));
        }
        content.push_str("ET");

        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Write a generated PDF into `dir`.
pub(crate) fn write_pdf(dir: &Path, name: &str, pages: &[&[&str]]) {
    std::fs::write(dir.join(name), make_pdf(pages)).unwrap();
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}
