//! PDF invoices for placed orders.
//!
//! The layout is fixed: a heading, a rule, one line per product, a rule and
//! the total, continued onto further pages when it runs past the bottom
//! margin. Documents use the built-in Helvetica font with `WinAnsiEncoding`;
//! characters outside it print as `?`.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use rust_decimal::Decimal;
use thiserror::Error;

use bazaar_core::{CurrencyCode, OrderId};

use crate::models::Order;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: i64 = 50;
const TOP: i64 = 780;
const BOTTOM: i64 = 50;
const HEADING_SIZE: i64 = 26;
const BODY_SIZE: i64 = 14;
const LINE_GAP: i64 = 22;
const RULE: &str = "-----------------------";

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("invoice I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text lines of an invoice, heading first.
#[must_use]
pub fn invoice_lines(order: &Order, currency: CurrencyCode) -> Vec<String> {
    let mut lines = Vec::with_capacity(order.lines.len() + 4);
    lines.push("INVOICE".to_owned());
    lines.push(RULE.to_owned());
    for line in &order.lines {
        lines.push(format!(
            "{} -- {} * {}",
            line.product.title,
            line.quantity,
            format_amount(line.product.price, currency)
        ));
    }
    lines.push(RULE.to_owned());
    lines.push(format!(
        "Total Price -- {}",
        format_amount(order.total(), currency)
    ));
    lines
}

/// Lines that fit between `TOP` and `BOTTOM`: (780 - 50) / 22 + 1.
const LINES_PER_PAGE: usize = 34;

/// Render invoice lines to a PDF, one page per `LINES_PER_PAGE` lines.
///
/// # Errors
///
/// Returns `InvoiceError` if a content stream cannot be encoded.
pub fn render_pdf(lines: &[String]) -> Result<Vec<u8>, InvoiceError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for (page, chunk) in lines.chunks(LINES_PER_PAGE).enumerate() {
        let first_line = page * LINES_PER_PAGE;
        kids.push(add_page(&mut doc, pages_id, first_line, chunk)?.into());
    }
    if kids.is_empty() {
        kids.push(add_page(&mut doc, pages_id, 0, &[])?.into());
    }

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Add one page holding `lines`, the first of which is line `first_line` of
/// the invoice.
fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    first_line: usize,
    lines: &[String],
) -> Result<ObjectId, InvoiceError> {
    let mut operations = vec![Operation::new("BT", vec![])];
    for (i, text) in lines.iter().enumerate() {
        let size = if first_line + i == 0 {
            HEADING_SIZE
        } else {
            BODY_SIZE
        };
        operations.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
        let offset = if i == 0 {
            vec![MARGIN_LEFT.into(), TOP.into()]
        } else {
            vec![0.into(), (-LINE_GAP).into()]
        };
        operations.push(Operation::new("Td", offset));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    }))
}

/// File name of an order's invoice.
#[must_use]
pub fn invoice_file_name(order_id: OrderId) -> String {
    format!("invoice-{order_id}.pdf")
}

/// Directory where generated invoices are kept.
#[derive(Debug, Clone)]
pub struct InvoiceStore {
    dir: PathBuf,
}

impl InvoiceStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an invoice to disk, returning its path.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceError::Io` if the directory or file cannot be written.
    pub async fn write(&self, order_id: OrderId, pdf: &[u8]) -> Result<PathBuf, InvoiceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(invoice_file_name(order_id));
        tokio::fs::write(&path, pdf).await?;
        Ok(path)
    }
}

fn format_amount(amount: Decimal, currency: CurrencyCode) -> String {
    match currency {
        CurrencyCode::USD => format!("${:.2}", amount.round_dp(2)),
        other => format!("{:.2} {}", amount.round_dp(2), other.as_str().to_uppercase()),
    }
}

/// Encode text for a `WinAnsiEncoding` font.
///
/// Printable ASCII and Latin-1 map to their own code points, the euro sign
/// to 0x80. Anything else becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            ' '..='~' | '\u{A0}'..='\u{FF}' => u8::try_from(u32::from(c)).unwrap_or(b'?'),
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bazaar_core::{Email, OrderLine, ProductId, ProductSnapshot, UserId};
    use chrono::Utc;

    fn line(id: i32, title: &str, price: &str, quantity: u32) -> OrderLine {
        OrderLine {
            quantity,
            product: ProductSnapshot {
                id: ProductId::new(id),
                title: title.to_owned(),
                description: "Something nice".to_owned(),
                price: price.parse().unwrap(),
                image_path: "x.png".to_owned(),
            },
        }
    }

    fn order() -> Order {
        Order {
            id: OrderId::new(42),
            user_id: UserId::new(1),
            user_email: Email::parse("buyer@example.com").unwrap(),
            lines: vec![line(1, "Lamp", "19.99", 2), line(2, "Café Mug", "5", 1)],
            checkout_session_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_invoice_lines_layout() {
        let lines = invoice_lines(&order(), CurrencyCode::USD);
        assert_eq!(
            lines,
            vec![
                "INVOICE",
                RULE,
                "Lamp -- 2 * $19.99",
                "Café Mug -- 1 * $5.00",
                RULE,
                "Total Price -- $44.98",
            ]
        );
    }

    #[test]
    fn test_non_usd_amounts_use_code() {
        let lines = invoice_lines(&order(), CurrencyCode::EUR);
        assert_eq!(lines.last().unwrap(), "Total Price -- 44.98 EUR");
    }

    #[test]
    fn test_render_pdf() {
        let pdf = render_pdf(&invoice_lines(&order(), CurrencyCode::USD)).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));
        let haystack = String::from_utf8_lossy(&pdf);
        assert!(haystack.contains("(INVOICE)"));
        assert!(haystack.contains("Helvetica"));
    }

    #[test]
    fn test_win_ansi_keeps_latin1() {
        assert_eq!(win_ansi("Café"), b"Caf\xE9");
        assert_eq!(win_ansi("€5"), b"\x805");
        assert_eq!(win_ansi("Tea \u{1F375}"), b"Tea ?");
    }

    /// Every `Tj` on every page, with the baseline it is drawn at.
    fn drawn_lines(pdf: &[u8]) -> Vec<(Vec<u8>, i64)> {
        let doc = Document::load_mem(pdf).unwrap();
        let mut drawn = Vec::new();
        for page_id in doc.get_pages().into_values() {
            let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
            let mut y = 0;
            for op in content.operations {
                match op.operator.as_str() {
                    "Td" if op.operands[0].as_i64().unwrap() == MARGIN_LEFT => {
                        y = op.operands[1].as_i64().unwrap();
                    }
                    "Td" => y += op.operands[1].as_i64().unwrap(),
                    "Tj" => drawn.push((op.operands[0].as_str().unwrap().to_vec(), y)),
                    _ => {}
                }
            }
        }
        drawn
    }

    #[test]
    fn test_long_invoice_continues_on_new_pages() {
        let mut long = order();
        long.lines = (1..=45)
            .map(|id| line(id, &format!("Item {id}"), "1", 1))
            .collect();
        let lines = invoice_lines(&long, CurrencyCode::USD);
        assert_eq!(lines.len(), 49);

        let pdf = render_pdf(&lines).unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 2);

        let drawn = drawn_lines(&pdf);
        assert_eq!(drawn.len(), lines.len());
        for (_, y) in &drawn {
            assert!((BOTTOM..=TOP).contains(y), "line drawn at y={y}");
        }
        let (last, _) = drawn.last().unwrap();
        assert_eq!(last.as_slice(), b"Total Price -- $45.00");
    }

    #[tokio::test]
    async fn test_store_writes_named_file() {
        let dir = std::env::temp_dir().join(format!("bazaar-invoices-{}", uuid::Uuid::new_v4()));
        let store = InvoiceStore::new(&dir);
        let path = store.write(OrderId::new(42), b"%PDF-1.5").await.unwrap();
        assert_eq!(path.file_name().unwrap(), "invoice-42.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");
        let _ = std::fs::remove_dir_all(dir);
    }
}
