//! Next-page discovery for paginated HTML tables.
//!
//! The portal's paginators come in several skins: a "Siguiente" anchor,
//! `>>`/`›` arrows, `rel="next"`, or bare numbered links driven by a
//! `page=`/`pagina=` query parameter. Resolution is against the page's own
//! URL, so relative hrefs work.

use scraper::{Html, Selector};
use url::Url;

/// Visible texts that mark a "go to next page" control.
const NEXT_TEXTS: &[&str] = &["siguiente", "próxima", "proxima", ">>", "›", "»", "next"];

/// Query parameters used for page numbers across portal deployments.
const PAGE_PARAMS: &[&str] = &["page", "pagina", "pg", "p"];

/// Find the URL of the next page, if the document advertises one.
///
/// Returns an absolute URL. The caller is responsible for cycle and depth
/// guards; this function only reads the document.
pub fn find_next_url(html: &str, current_url: &str) -> Option<String> {
    let base = Url::parse(current_url).ok()?;
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("valid selector");

    // rel="next" is authoritative when present
    for a in document.select(&anchors) {
        if a.value().attr("rel") == Some("next") {
            if let Some(resolved) = resolve(&base, a.value().attr("href")?) {
                return Some(resolved);
            }
        }
    }

    for a in document.select(&anchors) {
        let text = a.text().collect::<Vec<_>>().join(" ");
        let text = text.trim().to_lowercase();
        if NEXT_TEXTS.contains(&text.as_str()) {
            if let Some(resolved) = resolve(&base, a.value().attr("href")?) {
                return Some(resolved);
            }
        }
    }

    // Numbered paginator: a link whose page parameter is current + 1
    let current_page = page_number(&base).unwrap_or(1);
    for a in document.select(&anchors) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve(&base, href) else {
            continue;
        };
        if let Ok(u) = Url::parse(&resolved) {
            if page_number(&u) == Some(current_page + 1) {
                return Some(resolved);
            }
        }
    }

    None
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href == "#" || href.to_lowercase().starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

fn page_number(url: &Url) -> Option<u32> {
    url.query_pairs()
        .find(|(k, _)| PAGE_PARAMS.contains(&k.to_lowercase().as_str()))
        .and_then(|(_, v)| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://p.cl/seccion?page=2";

    #[test]
    fn test_siguiente_anchor() {
        let html = r#"<a href="/seccion?page=3">Siguiente</a>"#;
        assert_eq!(
            find_next_url(html, PAGE).as_deref(),
            Some("https://p.cl/seccion?page=3")
        );
    }

    #[test]
    fn test_arrow_anchor() {
        let html = r#"<a href="?page=3">&gt;&gt;</a>"#;
        assert_eq!(
            find_next_url(html, PAGE).as_deref(),
            Some("https://p.cl/seccion?page=3")
        );
    }

    #[test]
    fn test_rel_next_wins_over_text() {
        let html = r#"
            <a href="?page=9">Siguiente</a>
            <a rel="next" href="?page=3">3</a>
        "#;
        assert_eq!(
            find_next_url(html, PAGE).as_deref(),
            Some("https://p.cl/seccion?page=3")
        );
    }

    #[test]
    fn test_numbered_paginator() {
        let html = r#"
            <a href="?page=1">1</a>
            <a href="?page=2">2</a>
            <a href="?page=3">3</a>
        "#;
        assert_eq!(
            find_next_url(html, PAGE).as_deref(),
            Some("https://p.cl/seccion?page=3")
        );
    }

    #[test]
    fn test_no_paginator() {
        let html = r##"<a href="/inicio">Inicio</a><a href="#">Volver</a>"##;
        assert_eq!(find_next_url(html, PAGE), None);
    }

    #[test]
    fn test_javascript_href_ignored() {
        let html = r#"<a href="javascript:void(0)">Siguiente</a>"#;
        assert_eq!(find_next_url(html, PAGE), None);
    }
}
