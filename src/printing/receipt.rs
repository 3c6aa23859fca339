use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// A labelled value printed under the receipt title, e.g. `Table: 5`.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ReceiptField {
    pub label: String,
    pub value: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub amount: Decimal,
}

/// Printer-agnostic slip. Socket printers receive it as JSON, text printers get
/// [`Receipt::render_text`].
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct Receipt {
    pub title: String,
    /// Local time the slip was produced, `dd.mm.yyyy HH:MM:SS`.
    pub date: String,
    pub header: Vec<ReceiptField>,
    pub lines: Vec<ReceiptLine>,
    pub total: Decimal,
}

impl Receipt {
    pub fn new(title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date: date.into(),
            header: Vec::new(),
            lines: Vec::new(),
            total: Decimal::ZERO,
        }
    }

    pub fn field(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.push(ReceiptField {
            label: label.into(),
            value: value.into(),
        });
        self
    }

    pub fn line(mut self, line: ReceiptLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn total(mut self, total: Decimal) -> Self {
        self.total = total;
        self
    }

    /// Plain text layout for printers that take a text file, `width` characters per line.
    pub fn render_text(&self, width: usize) -> String {
        let width = width.max(16);
        let rule = "-".repeat(width);
        let mut out = Vec::new();

        out.push(center(&self.title, width));
        out.push(columns("Date:", &self.date, width));
        for field in &self.header {
            out.push(columns(&format!("{}:", field.label), &field.value, width));
        }
        out.push(rule.clone());

        for (idx, line) in self.lines.iter().enumerate() {
            match (line.quantity, line.unit_price) {
                (Some(quantity), Some(unit_price)) => {
                    out.push(format!("{}. {}", idx + 1, line.name));
                    out.push(columns(
                        &format!("   {quantity} x {unit_price:.2}"),
                        &format!("= {:.2}", line.amount),
                        width,
                    ));
                }
                _ => out.push(columns(&line.name, &format!("{:.2}", line.amount), width)),
            }
        }

        out.push(rule);
        out.push(columns("TOTAL", &format!("{:.2}", self.total), width));

        let mut text = out.join("\n");
        text.push('\n');
        text
    }
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    format!("{}{}", " ".repeat((width - len) / 2), text)
}

/// `left` and `right` on one line, right-aligned to `width`; overflow keeps one space.
fn columns(left: &str, right: &str, width: usize) -> String {
    let used = left.chars().count() + right.chars().count();
    let pad = width.saturating_sub(used).max(1);
    format!("{left}{}{right}", " ".repeat(pad))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn sample() -> Receipt {
        Receipt::new("CHECK #41", "01.05.2024 21:15:00")
            .field("Room", "Terrace")
            .field("Table", "5")
            .field("Waitress", "Aysel Mammadova")
            .line(ReceiptLine {
                name: "Latte".into(),
                quantity: Some(3),
                unit_price: Some(dec!(4.00)),
                amount: dec!(12.00),
            })
            .line(ReceiptLine {
                name: "Cheesecake".into(),
                quantity: Some(1),
                unit_price: Some(dec!(6.5)),
                amount: dec!(6.5),
            })
            .total(dec!(18.50))
    }

    #[test]
    fn renders_header_items_and_total() {
        let text = sample().render_text(32);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0].trim(), "CHECK #41");
        assert!(lines.contains(&"Table:                         5"));
        assert!(text.contains("1. Latte\n"));
        assert!(text.contains("   3 x 4.00"));
        assert!(text.contains("2. Cheesecake\n"));
        assert!(text.contains("   1 x 6.50"));
        assert_eq!(*lines.last().unwrap(), "TOTAL                      18.50");
    }

    #[test]
    fn every_line_fits_the_paper() {
        let text = sample().render_text(32);
        for line in text.lines() {
            assert!(line.chars().count() <= 32, "{line:?} is too wide");
        }
    }

    #[test]
    fn summary_lines_render_on_one_row() {
        let text = Receipt::new("Z-REPORT", "02.05.2024 02:00:00")
            .line(ReceiptLine {
                name: "aysel".into(),
                quantity: None,
                unit_price: None,
                amount: dec!(75),
            })
            .total(dec!(75))
            .render_text(24);

        assert!(text.contains("aysel              75.00\n"));
    }

    #[test]
    fn serializes_for_socket_printers() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["title"], "CHECK #41");
        assert_eq!(json["header"][1]["value"], "5");
        assert_eq!(json["lines"][0]["quantity"], 3);
    }
}
