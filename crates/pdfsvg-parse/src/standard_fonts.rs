//! Advance widths of the standard 14 fonts for printable ASCII.
//!
//! Used when a simple font dictionary has no `/Widths` array. Codes
//! outside 32..=126 get the family's typical width.

/// Widths for codes 32..=126, in 1/1000 em.
type AsciiWidths = [u16; 95];

#[rustfmt::skip]
static HELVETICA: AsciiWidths = [
     278,  278,  355,  556,  556,  889,  667,  191,  333,  333,  389,  584,  278,  333,  278,  278,
     556,  556,  556,  556,  556,  556,  556,  556,  556,  556,  278,  278,  584,  584,  584,  556,
    1015,  667,  667,  722,  722,  667,  611,  778,  722,  278,  500,  667,  556,  833,  722,  778,
     667,  778,  722,  667,  611,  722,  667,  944,  667,  667,  611,  278,  278,  278,  469,  556,
     333,  556,  556,  500,  556,  556,  278,  556,  556,  222,  222,  500,  222,  833,  556,  556,
     556,  556,  333,  500,  278,  556,  500,  722,  500,  500,  500,  334,  260,  334,  584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: AsciiWidths = [
     278,  333,  474,  556,  556,  889,  722,  238,  333,  333,  389,  584,  278,  333,  278,  278,
     556,  556,  556,  556,  556,  556,  556,  556,  556,  556,  333,  333,  584,  584,  584,  611,
     975,  722,  722,  722,  722,  667,  611,  778,  722,  278,  556,  722,  611,  833,  722,  778,
     667,  778,  722,  667,  611,  722,  667,  944,  667,  667,  611,  333,  278,  333,  584,  556,
     333,  556,  611,  556,  611,  556,  333,  611,  611,  278,  278,  556,  278,  889,  611,  611,
     611,  611,  389,  556,  333,  611,  556,  778,  556,  556,  500,  389,  280,  389,  584,
];

#[rustfmt::skip]
static TIMES_ROMAN: AsciiWidths = [
     250,  333,  408,  500,  500,  833,  778,  180,  333,  333,  500,  564,  250,  333,  250,  278,
     500,  500,  500,  500,  500,  500,  500,  500,  500,  500,  278,  278,  564,  564,  564,  444,
     921,  722,  667,  667,  722,  611,  556,  722,  722,  333,  389,  722,  611,  889,  722,  722,
     556,  722,  667,  556,  611,  722,  722,  944,  722,  722,  611,  333,  278,  333,  469,  500,
     333,  444,  500,  444,  500,  444,  333,  500,  500,  278,  278,  500,  278,  778,  500,  500,
     500,  500,  333,  389,  278,  500,  500,  722,  500,  500,  444,  480,  200,  480,  541,
];

#[rustfmt::skip]
static TIMES_BOLD: AsciiWidths = [
     250,  333,  555,  500,  500, 1000,  833,  278,  333,  333,  500,  570,  250,  333,  250,  278,
     500,  500,  500,  500,  500,  500,  500,  500,  500,  500,  333,  333,  570,  570,  570,  500,
     930,  722,  667,  722,  722,  667,  611,  778,  778,  389,  500,  778,  667,  944,  722,  778,
     611,  778,  722,  556,  667,  722,  722, 1000,  722,  722,  667,  333,  278,  333,  581,  500,
     333,  500,  556,  444,  556,  444,  333,  500,  556,  278,  333,  556,  278,  833,  556,  500,
     556,  556,  444,  389,  333,  556,  500,  722,  500,  500,  444,  394,  220,  394,  520,
];

#[rustfmt::skip]
static TIMES_ITALIC: AsciiWidths = [
     250,  333,  420,  500,  500,  833,  778,  214,  333,  333,  500,  675,  250,  333,  250,  278,
     500,  500,  500,  500,  500,  500,  500,  500,  500,  500,  333,  333,  675,  675,  675,  500,
     920,  611,  611,  667,  722,  611,  611,  722,  722,  333,  444,  667,  556,  833,  667,  722,
     611,  722,  611,  500,  556,  722,  611,  833,  611,  556,  556,  389,  278,  389,  422,  500,
     333,  500,  500,  444,  500,  444,  278,  500,  500,  278,  278,  444,  278,  722,  500,  500,
     500,  500,  389,  389,  278,  500,  444,  667,  444,  444,  389,  400,  275,  400,  541,
];

#[rustfmt::skip]
static TIMES_BOLD_ITALIC: AsciiWidths = [
     250,  389,  555,  500,  500,  833,  778,  278,  333,  333,  500,  570,  250,  333,  250,  278,
     500,  500,  500,  500,  500,  500,  500,  500,  500,  500,  333,  333,  570,  570,  570,  500,
     832,  667,  667,  667,  722,  667,  667,  722,  778,  389,  500,  667,  611,  889,  722,  722,
     611,  722,  667,  556,  611,  722,  667,  889,  667,  611,  611,  333,  278,  333,  570,  500,
     333,  500,  500,  444,  500,  444,  333,  500,  556,  278,  278,  500,  278,  778,  556,  500,
     500,  500,  389,  389,  278,  556,  444,  667,  500,  444,  389,  348,  220,  348,  570,
];

#[rustfmt::skip]
static SYMBOL: AsciiWidths = [
     250,  333,  713,  500,  549,  833,  778,  439,  333,  333,  500,  549,  250,  549,  250,  278,
     500,  500,  500,  500,  500,  500,  500,  500,  500,  500,  278,  278,  549,  549,  549,  444,
     549,  722,  667,  722,  612,  611,  763,  603,  722,  333,  631,  722,  686,  889,  722,  722,
     768,  741,  556,  592,  611,  690,  439,  768,  645,  795,  611,  333,  863,  333,  658,  500,
     500,  631,  549,  549,  494,  439,  521,  411,  603,  329,  603,  549,  549,  576,  521,  549,
     549,  521,  549,  603,  439,  576,  713,  686,  493,  686,  494,  480,  200,  480,  549,
];

/// Width of `code` in the standard font closest to `name`, in 1/1000 em.
///
/// `None` when `name` does not look like one of the standard families.
/// Arial and Times New Roman share the metrics of Helvetica and Times.
pub fn standard_width(name: &str, code: u8) -> Option<f64> {
    let lower = name.to_ascii_lowercase();
    let bold = lower.contains("bold") || lower.contains("black") || lower.contains("heavy");
    let italic = lower.contains("italic") || lower.contains("oblique");
    let (table, typical): (&AsciiWidths, u16) = if lower.contains("courier") {
        return Some(600.0);
    } else if lower.contains("zapfdingbats") || lower.contains("dingbats") {
        return Some(788.0);
    } else if lower.starts_with("symbol") {
        (&SYMBOL, 500)
    } else if lower.contains("helvetica") || lower.contains("arial") {
        (if bold { &HELVETICA_BOLD } else { &HELVETICA }, 556)
    } else if lower.contains("times") {
        let table = match (bold, italic) {
            (false, false) => &TIMES_ROMAN,
            (true, false) => &TIMES_BOLD,
            (false, true) => &TIMES_ITALIC,
            (true, true) => &TIMES_BOLD_ITALIC,
        };
        (table, 500)
    } else {
        return None;
    };
    let width = match code {
        32..=126 => table[usize::from(code - 32)],
        _ => typical,
    };
    Some(f64::from(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_and_arial_share_metrics() {
        assert_eq!(standard_width("Helvetica", b' '), Some(278.0));
        assert_eq!(standard_width("Arial,Bold", b'A'), Some(722.0));
        assert_eq!(standard_width("Helvetica", b'A'), Some(667.0));
    }

    #[test]
    fn times_variants() {
        assert_eq!(standard_width("Times-Roman", b'W'), Some(944.0));
        assert_eq!(standard_width("Times-BoldItalic", b'W'), Some(889.0));
        assert_eq!(standard_width("TimesNewRomanPS-ItalicMT", b'a'), Some(500.0));
    }

    #[test]
    fn courier_is_monospaced() {
        assert_eq!(standard_width("Courier-Bold", b'i'), Some(600.0));
        assert_eq!(standard_width("Courier", 0xe9), Some(600.0));
    }

    #[test]
    fn unknown_family() {
        assert_eq!(standard_width("Garamond", b'a'), None);
    }
}
