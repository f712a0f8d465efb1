use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::crawler::models::Apartment;

static LISTING_CARD: Lazy<Selector> = Lazy::new(|| selector(".property-partial[href]"));
static LAST_PAGE: Lazy<Selector> = Lazy::new(|| selector("span.last a[href]"));
static NEXT_PAGE: Lazy<Selector> = Lazy::new(|| selector("span.next a[href]"));

// One pass over every container the record is built from, in document order.
static DETAIL_FIELDS: Lazy<Selector> =
    Lazy::new(|| selector(".reference-number, .section-bar, div[data-lat][data-lng]"));
static BAR_LABEL: Lazy<Selector> = Lazy::new(|| selector(".section-bar-label"));
static BAR_VALUE: Lazy<Selector> = Lazy::new(|| selector(".section-bar-value"));

static PAGE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]page=(\d+)").expect("page param regex"));
static FIRST_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("integer regex"));

const LABEL_ROOMS: &str = "Antal værelser";
const LABEL_AREA: &str = "Størrelse";
const LABEL_RENT: &str = "Husleje";
const REFERENCE_PREFIX: &str = "Sagsnummer:";

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Absolute detail URLs for every listing card, `site_root` + href, in document order.
pub fn extract_listing_links(html: &str, site_root: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    document
        .select(&LISTING_CARD)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| format!("{}{}", site_root, href))
        .collect()
}

/// Highest page number from the "last" pagination link.
pub fn last_page_number(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let href = document.select(&LAST_PAGE).next()?.value().attr("href")?;

    let digits = match PAGE_PARAM.captures(href) {
        Some(caps) => caps.get(1)?.as_str(),
        None => FIRST_INT.find(href)?.as_str(),
    };

    digits.parse().ok()
}

/// Absolute URL of the "last" pagination link.
pub fn last_page_link(html: &str, site_root: &str) -> Option<String> {
    pagination_link(html, site_root, &LAST_PAGE)
}

/// Absolute URL of the "next" pagination link.
pub fn next_page_link(html: &str, site_root: &str) -> Option<String> {
    pagination_link(html, site_root, &NEXT_PAGE)
}

fn pagination_link(html: &str, site_root: &str, sel: &Selector) -> Option<String> {
    let document = Html::parse_document(html);
    let href = document.select(sel).next()?.value().attr("href")?;

    if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else {
        Some(format!("{}{}", site_root, href))
    }
}

pub fn parse_apartment(html: &str) -> Apartment {
    let document = Html::parse_document(html);
    let mut apartment = Apartment::default();

    for el in document.select(&DETAIL_FIELDS) {
        let node = el.value();

        if node.has_class("reference-number", scraper::CaseSensitivity::CaseSensitive) {
            apartment.reference = parse_reference(&text_of(el));
        } else if node.has_class("section-bar", scraper::CaseSensitivity::CaseSensitive) {
            let label = child_text(el, &BAR_LABEL);
            let value = child_text(el, &BAR_VALUE);

            match label.as_str() {
                LABEL_ROOMS => apartment.rooms = parse_rooms(&value),
                LABEL_AREA => apartment.area = parse_area(&value),
                LABEL_RENT => apartment.rent = parse_rent(&value),
                _ => {}
            }
        } else {
            apartment.latitude = parse_coordinate(node.attr("data-lat").unwrap_or_default());
            apartment.longitude = parse_coordinate(node.attr("data-lng").unwrap_or_default());
        }
    }

    apartment
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn child_text(el: ElementRef<'_>, sel: &Selector) -> String {
    el.select(sel).next().map(text_of).unwrap_or_default()
}

pub fn parse_rooms(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

/// "86 m2", "86m²" -> 86
pub fn parse_area(value: &str) -> u32 {
    let value = value.trim();
    let value = value
        .strip_suffix("m²")
        .or_else(|| value.strip_suffix("m2"))
        .unwrap_or(value);

    value.trim().parse().unwrap_or(0)
}

/// "12.345,-" -> 12345
pub fn parse_rent(value: &str) -> u64 {
    let value = value.trim();
    let value = value.strip_suffix("kr.").unwrap_or(value);
    let value = value.trim_end_matches(|c: char| c == ',' || c == '-' || c.is_whitespace());

    let digits: String = value
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '\u{a0}'))
        .collect();

    digits.parse().unwrap_or(0)
}

/// "Sagsnummer: 4821" -> 4821
pub fn parse_reference(value: &str) -> u64 {
    let value = value.trim();
    let value = value.strip_prefix(REFERENCE_PREFIX).unwrap_or(value);

    value.trim().parse().unwrap_or(0)
}

pub fn parse_coordinate(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html><body>
          <div class="reference-number">Sagsnummer: 4821</div>
          <div class="section-bar">
            <span class="section-bar-label">Antal værelser</span>
            <span class="section-bar-value">3</span>
          </div>
          <div class="section-bar">
            <span class="section-bar-label">Størrelse</span>
            <span class="section-bar-value">86 m²</span>
          </div>
          <div class="section-bar">
            <span class="section-bar-label">Husleje</span>
            <span class="section-bar-value">12.345,-</span>
          </div>
          <div class="section-bar">
            <span class="section-bar-label">Depositum</span>
            <span class="section-bar-value">37.035,-</span>
          </div>
          <div class="map" data-lat="55.676098" data-lng="12.568337"></div>
        </body></html>
    "#;

    #[test]
    fn rent_strips_punctuation_and_separators() {
        assert_eq!(parse_rent("12.345,-"), 12345);
        assert_eq!(parse_rent("1.234.567,-"), 1234567);
        assert_eq!(parse_rent(" 9.800,- kr."), 9800);
        assert_eq!(parse_rent("Efter aftale"), 0);
    }

    #[test]
    fn area_strips_unit_suffix() {
        assert_eq!(parse_area("86 m2"), 86);
        assert_eq!(parse_area("86m²"), 86);
        assert_eq!(parse_area(" 120 m² "), 120);
        assert_eq!(parse_area("m²"), 0);
    }

    #[test]
    fn reference_strips_label() {
        assert_eq!(parse_reference("Sagsnummer: 4821"), 4821);
        assert_eq!(parse_reference("\n  Sagsnummer:4821 \n"), 4821);
        assert_eq!(parse_reference("Sagsnummer: ukendt"), 0);
    }

    #[test]
    fn rooms_and_coordinates() {
        assert_eq!(parse_rooms(" 4 "), 4);
        assert_eq!(parse_rooms("-1"), 0);
        assert_eq!(parse_coordinate("55.5"), 55.5);
        assert_eq!(parse_coordinate("NaN"), 0.0);
        assert_eq!(parse_coordinate(""), 0.0);
    }

    #[test]
    fn parses_full_detail_page() {
        let apartment = parse_apartment(DETAIL_PAGE);

        assert_eq!(
            apartment,
            Apartment {
                reference: 4821,
                rooms: 3,
                area: 86,
                rent: 12345,
                latitude: 55.676098,
                longitude: 12.568337,
            }
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_apartment(DETAIL_PAGE);
        let second = parse_apartment(DETAIL_PAGE);

        assert_eq!(first.latitude.to_bits(), second.latitude.to_bits());
        assert_eq!(first.longitude.to_bits(), second.longitude.to_bits());
        assert_eq!(first, second);
    }

    #[test]
    fn bad_field_only_zeroes_that_field() {
        let html = r#"
            <div class="section-bar">
              <span class="section-bar-label">Antal værelser</span>
              <span class="section-bar-value">tre</span>
            </div>
            <div class="section-bar">
              <span class="section-bar-label">Husleje</span>
              <span class="section-bar-value">7.500,-</span>
            </div>
        "#;
        let apartment = parse_apartment(html);

        assert_eq!(apartment.rooms, 0);
        assert_eq!(apartment.rent, 7500);
        assert_eq!(apartment.reference, 0);
        assert_eq!(apartment.latitude, 0.0);
    }

    #[test]
    fn empty_page_is_zero_record() {
        assert_eq!(parse_apartment(""), Apartment::default());
    }

    #[test]
    fn one_link_per_card() {
        let html = r#"
            <a class="property-partial" href="/lejebolig/1">a</a>
            <a class="property-partial" href="/lejebolig/2">b</a>
            <a class="property-partial">no href</a>
            <a class="other" href="/lejebolig/3">c</a>
            <a class="property-partial" href="/lejebolig/4">d</a>
        "#;
        let links = extract_listing_links(html, "https://boligzonen.dk");

        assert_eq!(
            links,
            vec![
                "https://boligzonen.dk/lejebolig/1",
                "https://boligzonen.dk/lejebolig/2",
                "https://boligzonen.dk/lejebolig/4",
            ]
        );
    }

    #[test]
    fn no_cards_no_links() {
        assert!(extract_listing_links("<p>Ingen boliger</p>", "https://x").is_empty());
    }

    #[test]
    fn last_page_from_query_param() {
        let html = r#"<span class="last"><a href="/lejebolig/kobenhavn-kommune?page=42">Sidste</a></span>"#;
        assert_eq!(last_page_number(html), Some(42));
    }

    #[test]
    fn last_page_falls_back_to_first_integer() {
        let html = r#"<span class="last"><a href="/lejebolig/side/7">Sidste</a></span>"#;
        assert_eq!(last_page_number(html), Some(7));
    }

    #[test]
    fn missing_pagination_controls() {
        assert_eq!(last_page_number("<p></p>"), None);
        assert_eq!(next_page_link("<p></p>", "https://x"), None);
        assert_eq!(last_page_link("<p></p>", "https://x"), None);
    }

    #[test]
    fn pagination_links_are_absolute() {
        let html = r#"
            <span class="next"><a href="/list?page=2">Næste</a></span>
            <span class="last"><a href="https://other.dk/list?page=9">Sidste</a></span>
        "#;
        assert_eq!(
            next_page_link(html, "https://x.dk").as_deref(),
            Some("https://x.dk/list?page=2")
        );
        assert_eq!(
            last_page_link(html, "https://x.dk").as_deref(),
            Some("https://other.dk/list?page=9")
        );
    }
}
