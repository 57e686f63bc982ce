//! Word-level page geometry from the layout tool's XML dump, plus the phrase
//! matcher that turns "redact this text" into page rectangles.
//!
//! ## Coordinate systems
//!
//! The layout dump measures from the **top-left** corner with y growing
//! downward. PostScript-style page drawing measures from the **bottom-left**
//! with y growing upward. [`find_phrase_rects`] performs the flip: a match
//! whose union box ends at `y_max` in dump coordinates sits at
//! `page_height - y_max` in page coordinates.
//!
//! ## Matching
//!
//! The needle is split on whitespace into tokens. A match is a run of
//! consecutive word boxes where each token is a case-insensitive substring of
//! the corresponding word (so "Secret" matches the word "Secret:"). Partial
//! runs never match; a phrase that only half-appears produces no rectangle.

use crate::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// One word and its bounding box, in top-left dump coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct WordBox {
    pub text: String,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// One page of the layout dump.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
    pub words: Vec<WordBox>,
}

/// An occlusion rectangle in bottom-left page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RedactRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Parse the layout tool's `-bbox-layout` XML into pages of word boxes.
///
/// Unparseable coordinate attributes degrade to `0.0` rather than failing the
/// whole dump; malformed XML is a [`Error::Parse`].
pub fn parse_bbox_layout(xml: &str) -> Result<Vec<PageLayout>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut pages: Vec<PageLayout> = Vec::new();
    let mut current_word: Option<WordBox> = None;

    loop {
        match reader.read_event().map_err(|e| Error::Parse {
            what: "layout XML",
            detail: e.to_string(),
        })? {
            Event::Start(e) if e.name().as_ref() == b"page" => {
                let mut width = 0.0;
                let mut height = 0.0;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().unwrap_or_default();
                    match attr.key.as_ref() {
                        b"width" => width = value.parse().unwrap_or(0.0),
                        b"height" => height = value.parse().unwrap_or(0.0),
                        _ => {}
                    }
                }
                pages.push(PageLayout {
                    width,
                    height,
                    words: Vec::new(),
                });
            }
            Event::Start(e) if e.name().as_ref() == b"word" => {
                let mut word = WordBox {
                    text: String::new(),
                    x_min: 0.0,
                    y_min: 0.0,
                    x_max: 0.0,
                    y_max: 0.0,
                };
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().unwrap_or_default();
                    let value: f64 = value.parse().unwrap_or(0.0);
                    match attr.key.as_ref() {
                        b"xMin" => word.x_min = value,
                        b"yMin" => word.y_min = value,
                        b"xMax" => word.x_max = value,
                        b"yMax" => word.y_max = value,
                        _ => {}
                    }
                }
                current_word = Some(word);
            }
            Event::Text(t) => {
                if let Some(word) = current_word.as_mut() {
                    let text = t.unescape().map_err(|e| Error::Parse {
                        what: "layout XML",
                        detail: e.to_string(),
                    })?;
                    word.text.push_str(&text);
                }
            }
            Event::End(e) if e.name().as_ref() == b"word" => {
                if let (Some(word), Some(page)) = (current_word.take(), pages.last_mut()) {
                    page.words.push(word);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(pages)
}

/// Locate every occurrence of `phrase` on a page and return one union
/// rectangle per occurrence, in bottom-left page coordinates.
pub fn find_phrase_rects(page: &PageLayout, phrase: &str) -> Vec<RedactRect> {
    let tokens: Vec<String> = phrase
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect();
    if tokens.is_empty() || page.words.len() < tokens.len() {
        return Vec::new();
    }

    let mut rects = Vec::new();
    for start in 0..=page.words.len() - tokens.len() {
        let run = &page.words[start..start + tokens.len()];
        let matched = run
            .iter()
            .zip(&tokens)
            .all(|(word, token)| word.text.to_lowercase().contains(token));
        if !matched {
            continue;
        }
        let x_min = run.iter().map(|w| w.x_min).fold(f64::INFINITY, f64::min);
        let y_min = run.iter().map(|w| w.y_min).fold(f64::INFINITY, f64::min);
        let x_max = run.iter().map(|w| w.x_max).fold(f64::NEG_INFINITY, f64::max);
        let y_max = run.iter().map(|w| w.y_max).fold(f64::NEG_INFINITY, f64::max);
        rects.push(RedactRect {
            x: x_min,
            y: page.height - y_max,
            width: x_max - x_min,
            height: y_max - y_min,
        });
    }
    rects
}

/// [`find_phrase_rects`] across every page of a dump, flattened.
pub fn find_phrase_rects_all(pages: &[PageLayout], phrase: &str) -> Vec<RedactRect> {
    pages
        .iter()
        .flat_map(|page| find_phrase_rects(page, phrase))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> WordBox {
        WordBox {
            text: text.into(),
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    fn letter_page(words: Vec<WordBox>) -> PageLayout {
        PageLayout {
            width: 612.0,
            height: 792.0,
            words,
        }
    }

    #[test]
    fn two_word_phrase_unions_and_flips() {
        let page = letter_page(vec![
            word("The", 50.0, 100.0, 80.0, 120.0),
            word("Secret", 100.0, 100.0, 140.0, 120.0),
            word("Code", 150.0, 100.0, 180.0, 120.0),
            word("is", 190.0, 100.0, 200.0, 120.0),
        ]);
        let rects = find_phrase_rects(&page, "Secret Code");
        assert_eq!(rects.len(), 1);
        let r = rects[0];
        assert_eq!(r.x, 100.0);
        assert_eq!(r.y, 672.0); // 792 - 120
        assert_eq!(r.width, 80.0);
        assert_eq!(r.height, 20.0);
    }

    #[test]
    fn partial_phrase_never_matches() {
        // "Secret" appears but "Code" does not follow it.
        let page = letter_page(vec![
            word("Secret", 100.0, 100.0, 140.0, 120.0),
            word("garden", 150.0, 100.0, 190.0, 120.0),
        ]);
        assert!(find_phrase_rects(&page, "Secret Code").is_empty());
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let page = letter_page(vec![
            word("SECRET:", 10.0, 10.0, 60.0, 24.0),
            word("code,", 70.0, 10.0, 100.0, 24.0),
        ]);
        assert_eq!(find_phrase_rects(&page, "secret Code").len(), 1);
    }

    #[test]
    fn repeated_occurrences_yield_one_rect_each() {
        let page = letter_page(vec![
            word("Secret", 10.0, 10.0, 50.0, 24.0),
            word("Code", 60.0, 10.0, 90.0, 24.0),
            word("and", 100.0, 10.0, 120.0, 24.0),
            word("Secret", 10.0, 40.0, 50.0, 54.0),
            word("Code", 60.0, 40.0, 90.0, 54.0),
        ]);
        assert_eq!(find_phrase_rects(&page, "Secret Code").len(), 2);
    }

    #[test]
    fn parses_layout_xml() {
        let xml = r#"<?xml version="1.0"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<body>
<doc>
<page width="612.000000" height="792.000000">
  <flow>
    <block xMin="100.0" yMin="100.0" xMax="180.0" yMax="120.0">
      <line xMin="100.0" yMin="100.0" xMax="180.0" yMax="120.0">
        <word xMin="100.0" yMin="100.0" xMax="140.0" yMax="120.0">Secret</word>
        <word xMin="150.0" yMin="100.0" xMax="180.0" yMax="120.0">Code</word>
      </line>
    </block>
  </flow>
</page>
</doc>
</body>
</html>"#;
        let pages = parse_bbox_layout(xml).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].width, 612.0);
        assert_eq!(pages[0].height, 792.0);
        assert_eq!(pages[0].words.len(), 2);
        assert_eq!(pages[0].words[0].text, "Secret");
        assert_eq!(pages[0].words[1].x_max, 180.0);

        let rects = find_phrase_rects_all(&pages, "Secret Code");
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].y, 672.0);
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = parse_bbox_layout("<page><word></page>").unwrap_err();
        assert!(matches!(err, Error::Parse { what: "layout XML", .. }));
    }

    #[test]
    fn bad_coordinate_attributes_degrade_to_zero() {
        let xml = r#"<page width="nan-ish" height="792">
<word xMin="abc" yMin="1" xMax="2" yMax="3">x</word>
</page>"#;
        let pages = parse_bbox_layout(xml).unwrap();
        assert_eq!(pages[0].width, 0.0);
        assert_eq!(pages[0].words[0].x_min, 0.0);
    }
}
