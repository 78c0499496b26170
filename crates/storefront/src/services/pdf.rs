//! Quote PDF rendering.
//!
//! The document is laid out first as plain text runs and rules per page,
//! then painted with `printpdf` using the built-in Helvetica faces. Item
//! tables longer than a page continue on the next one under a repeated
//! header.

use chrono::NaiveDate;
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point,
};
use thiserror::Error;

use katana_forge_core::checkout::Address;
use katana_forge_core::money::{MoneyError, format_eur};
use katana_forge_core::pricing::{CalculatedLine, QuoteTotals, vat_breakdown};

use crate::config::CompanyConfig;

/// Errors while rendering a quote.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("pdf rendering failed: {0}")]
    Render(String),

    #[error("vat breakdown failed: {0}")]
    Amount(#[from] MoneyError),
}

impl From<printpdf::Error> for PdfError {
    fn from(err: printpdf::Error) -> Self {
        Self::Render(err.to_string())
    }
}

/// Everything printed on a quote.
#[derive(Debug, Clone)]
pub struct QuoteDocument<'a> {
    pub number: &'a str,
    pub issue_date: NaiveDate,
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub customer_phone: Option<&'a str>,
    pub shipping: &'a Address,
    pub billing: &'a Address,
    pub company: &'a CompanyConfig,
    pub lines: &'a [CalculatedLine],
    pub totals: &'a QuoteTotals,
    pub pay_link: Option<&'a str>,
}

// =============================================================================
// Geometry
// =============================================================================

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 18.0;
const TOP: f32 = PAGE_HEIGHT - MARGIN;
/// Lowest baseline for content; the page number sits below it.
const BOTTOM: f32 = MARGIN + 10.0;
const RIGHT: f32 = PAGE_WIDTH - MARGIN;

const BODY: f32 = 9.5;
const SMALL: f32 = 8.0;
const TITLE: f32 = 16.0;

const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica advance, as a fraction of the font size.
const AVG_ADVANCE: f32 = 0.53;

const COL_QTY_RIGHT: f32 = 128.0;
const COL_UNIT_RIGHT: f32 = 158.0;
const COL_TOTAL_RIGHT: f32 = RIGHT;
const ARTICLE_WIDTH: f32 = 82.0;

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * 1.45
}

fn text_width(text: &str, size: f32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let chars = text.chars().count() as f32;
    chars * size * AVG_ADVANCE * PT_TO_MM
}

/// Cut `text` so it fits in `width` mm, marking the cut with `...`.
fn fit(text: &str, size: f32, width: f32) -> String {
    if text_width(text, size) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for ch in text.chars() {
        out.push(ch);
        if text_width(&out, size) + text_width("...", size) > width {
            out.pop();
            break;
        }
    }
    format!("{}...", out.trim_end())
}

// =============================================================================
// Layout
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
struct TextRun {
    text: String,
    x: f32,
    y: f32,
    size: f32,
    bold: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    x1: f32,
    x2: f32,
    y: f32,
}

#[derive(Debug, Default)]
struct PageLayout {
    runs: Vec<TextRun>,
    rules: Vec<Rule>,
}

struct Layout {
    done: Vec<PageLayout>,
    current: PageLayout,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            current: PageLayout::default(),
            y: TOP,
        }
    }

    fn page_break(&mut self) {
        self.done.push(std::mem::take(&mut self.current));
        self.y = TOP;
    }

    /// Start a new page unless `height` mm still fit. Returns whether a
    /// break happened.
    fn ensure(&mut self, height: f32) -> bool {
        if self.y - height < BOTTOM {
            self.page_break();
            true
        } else {
            false
        }
    }

    fn text_at(&mut self, x: f32, text: impl Into<String>, size: f32, bold: bool) {
        self.current.runs.push(TextRun {
            text: text.into(),
            x,
            y: self.y,
            size,
            bold,
        });
    }

    fn text_right(&mut self, right: f32, text: &str, size: f32, bold: bool) {
        self.text_at(right - text_width(text, size), text, size, bold);
    }

    fn line(&mut self, text: impl Into<String>, size: f32, bold: bool) {
        self.ensure(line_height(size));
        self.text_at(MARGIN, text, size, bold);
        self.y -= line_height(size);
    }

    /// Left-aligned paragraph wrapped on word boundaries.
    fn paragraph(&mut self, text: &str, size: f32) {
        let width = RIGHT - MARGIN;
        let mut current = String::new();
        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(&candidate, size) > width && !current.is_empty() {
                self.line(std::mem::take(&mut current), size, false);
                current = word.to_string();
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            self.line(current, size, false);
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn rule(&mut self) {
        self.current.rules.push(Rule {
            x1: MARGIN,
            x2: RIGHT,
            y: self.y,
        });
    }

    fn finish(mut self) -> Vec<PageLayout> {
        self.done.push(self.current);
        self.done
    }
}

fn address_block(name: &str, address: &Address) -> Vec<String> {
    let mut lines = vec![name.to_string()];
    lines.extend(address.printable_lines());
    lines
}

fn table_header(layout: &mut Layout) {
    layout.ensure(line_height(BODY) * 2.0);
    layout.text_at(MARGIN, "Article", BODY, true);
    layout.text_right(COL_QTY_RIGHT, "Qté", BODY, true);
    layout.text_right(COL_UNIT_RIGHT, "PU HT", BODY, true);
    layout.text_right(COL_TOTAL_RIGHT, "Total TTC", BODY, true);
    layout.gap(line_height(BODY) * 0.6);
    layout.rule();
    layout.gap(line_height(BODY));
}

fn lay_out(doc: &QuoteDocument<'_>) -> Result<Vec<PageLayout>, PdfError> {
    let mut layout = Layout::new();
    let company = doc.company;

    // Header: seller on the left, document identity on the right.
    let mut seller = vec![
        company.name.clone(),
        format!("SIRET: {}", company.siret),
        format!("TVA: {}", company.vat_number),
    ];
    seller.extend(company.address_lines.iter().cloned());
    seller.push(format!("Email: {}", company.email));
    if !company.phone.is_empty() {
        seller.push(format!("Tél: {}", company.phone));
    }
    if !company.website.is_empty() {
        seller.push(format!("Site: {}", company.website));
    }

    let header_top = layout.y;
    layout.text_right(RIGHT, "DEVIS", TITLE, true);
    layout.gap(line_height(TITLE));
    layout.text_right(RIGHT, doc.number, BODY + 1.0, true);
    layout.gap(line_height(BODY));
    let issued = format!("Émis le {}", doc.issue_date.format("%d/%m/%Y"));
    layout.text_right(RIGHT, &issued, BODY, false);

    layout.y = header_top;
    for (i, line) in seller.into_iter().enumerate() {
        layout.line(line, BODY, i == 0);
    }
    layout.gap(6.0);

    // Addresses side by side.
    let shipping = address_block(doc.customer_name, doc.shipping);
    let billing = address_block(doc.customer_name, doc.billing);
    let mut contact = vec![doc.customer_email.to_string()];
    if let Some(phone) = doc.customer_phone {
        contact.push(phone.to_string());
    }
    let rows = shipping.len().max(billing.len()) + 1;
    #[allow(clippy::cast_precision_loss)]
    layout.ensure(line_height(BODY) * rows as f32);
    layout.text_at(MARGIN, "Adresse de livraison", BODY, true);
    layout.text_at(PAGE_WIDTH / 2.0, "Adresse de facturation", BODY, true);
    layout.gap(line_height(BODY));
    for i in 0..rows - 1 {
        if let Some(line) = shipping.get(i) {
            layout.text_at(MARGIN, fit(line, BODY, 80.0), BODY, false);
        }
        if let Some(line) = billing.get(i) {
            layout.text_at(PAGE_WIDTH / 2.0, fit(line, BODY, 80.0), BODY, false);
        }
        layout.gap(line_height(BODY));
    }
    for line in contact {
        layout.line(line, SMALL, false);
    }
    layout.gap(6.0);

    // Items.
    table_header(&mut layout);
    for line in doc.lines {
        let row_height = line_height(BODY) + line_height(SMALL) + 1.5;
        if layout.ensure(row_height) {
            table_header(&mut layout);
        }
        let item = &line.item;
        layout.text_at(MARGIN, fit(&item.name, BODY, ARTICLE_WIDTH), BODY, false);
        layout.text_right(COL_QTY_RIGHT, &item.qty.to_string(), BODY, false);
        layout.text_right(COL_UNIT_RIGHT, &format_eur(item.unit_cents), BODY, false);
        layout.text_right(COL_TOTAL_RIGHT, &format_eur(line.gross_cents), BODY, false);
        layout.gap(line_height(SMALL));
        layout.text_at(
            MARGIN,
            fit(
                &format!("SKU: {} · TVA: {}%", item.sku, item.vat_rate_pct),
                SMALL,
                ARTICLE_WIDTH,
            ),
            SMALL,
            false,
        );
        layout.gap(line_height(SMALL) * 0.5);
        layout.rule();
        layout.gap(line_height(BODY));
    }

    // Totals.
    let totals = [
        ("Sous-total HT", doc.totals.subtotal_cents, false),
        ("TVA", doc.totals.tax_cents, false),
        ("Livraison", doc.totals.shipping_cents, false),
        ("Total TTC", doc.totals.total_cents, true),
    ];
    layout.ensure(line_height(BODY) * 4.0);
    for (label, amount, bold) in totals {
        layout.text_right(COL_UNIT_RIGHT, label, BODY, bold);
        layout.text_right(COL_TOTAL_RIGHT, &format_eur(amount), BODY, bold);
        layout.gap(line_height(BODY));
    }
    layout.gap(4.0);

    let breakdown = vat_breakdown(
        doc.lines
            .iter()
            .map(|line| (line.gross_cents, line.item.vat_rate_pct)),
    )?;
    layout.line("Ventilation TVA", BODY, true);
    for entry in breakdown {
        layout.line(
            format!(
                "{}% : {} TVA sur {} HT",
                entry.rate_pct,
                format_eur(entry.tax),
                format_eur(entry.net)
            ),
            BODY,
            false,
        );
    }
    layout.gap(4.0);

    if let Some(link) = doc.pay_link {
        layout.line("Payer en ligne :", BODY, true);
        layout.paragraph(link, SMALL);
        layout.gap(2.0);
    }
    layout.line(
        "Devis valable 15 jours. Merci de nous contacter pour toute question ou ajustement.",
        BODY,
        false,
    );
    layout.gap(6.0);

    layout.ensure(line_height(SMALL) * 5.0);
    layout.rule();
    layout.gap(line_height(SMALL));
    layout.paragraph(
        &format!(
            "RGPD : vos données sont traitées pour la gestion de votre commande et conservées \
             pour une durée de 3 ans. Vous pouvez exercer vos droits en nous contactant à {}.",
            company.email
        ),
        SMALL,
    );
    let website = if company.website.is_empty() {
        "notre site"
    } else {
        company.website.as_str()
    };
    layout.paragraph(
        &format!(
            "Conditions générales, politique de confidentialité et mentions légales \
             disponibles sur {website}."
        ),
        SMALL,
    );

    Ok(layout.finish())
}

// =============================================================================
// Painting
// =============================================================================

/// Render a quote to PDF bytes.
///
/// # Errors
///
/// Returns `PdfError` if the document cannot be produced.
pub fn render_quote(doc: &QuoteDocument<'_>) -> Result<Vec<u8>, PdfError> {
    let pages = lay_out(doc)?;
    let total = pages.len();

    let (pdf, first_page, first_layer) = PdfDocument::new(
        format!("Devis {}", doc.number),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Devis",
    );
    let regular = pdf.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = pdf.add_builtin_font(BuiltinFont::HelveticaBold)?;

    for (index, page) in pages.iter().enumerate() {
        let layer = if index == 0 {
            pdf.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_ref, layer_ref) = pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Devis");
            pdf.get_page(page_ref).get_layer(layer_ref)
        };
        paint(&layer, page, &regular, &bold);

        let footer = format!("{} · page {}/{}", doc.number, index + 1, total);
        layer.use_text(
            footer.clone(),
            SMALL,
            Mm(RIGHT - text_width(&footer, SMALL)),
            Mm(MARGIN),
            &regular,
        );
    }

    Ok(pdf.save_to_bytes()?)
}

fn paint(
    layer: &PdfLayerReference,
    page: &PageLayout,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    for run in &page.runs {
        let font = if run.bold { bold } else { regular };
        layer.use_text(run.text.clone(), run.size, Mm(run.x), Mm(run.y), font);
    }

    layer.set_outline_thickness(0.4);
    for rule in &page.rules {
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(rule.x1), Mm(rule.y)), false),
                (Point::new(Mm(rule.x2), Mm(rule.y)), false),
            ],
            is_closed: false,
        });
    }
}
