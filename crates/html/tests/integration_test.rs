//! # HTML Crate Integration Tests
//!
//! Verifies listing pagination, result-link extraction and detail-page
//! scraping against trimmed copies of the archive's markup.

#[cfg(test)]
mod tests {
    use handelingen_html::{
        parse_detail_page, parse_page_count, parse_result_links, DetailSelectors,
        ListingSelectors,
    };

    const LISTING: &str = r#"
        <html><body>
            <div class="result--list result--list--publications">
                <ul>
                    <li><h2><a href="/h-tk-20232024-1-2.html">Opening</a></h2></li>
                    <li><h2><a href="/h-ek-20232024-1-1.html">Eerste Kamer</a></h2></li>
                    <li><h2><a href="/h-tk-20232024-1-3.html">Vragenuur</a></h2></li>
                </ul>
            </div>
            <div class="pagination__index">
                <ul>
                    <li><a href="?pagina=1">1</a></li>
                    <li><a href="?pagina=2">2</a></li>
                    <li><a href="?pagina=7">7</a></li>
                    <li><a href="?pagina=2">volgende</a></li>
                </ul>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_page_count_takes_the_maximum() {
        let count = parse_page_count(LISTING, &ListingSelectors::default()).unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn test_parse_page_count_defaults_to_one() {
        let html = "<html><body><p>Geen resultaten</p></body></html>";
        let count = parse_page_count(html, &ListingSelectors::default()).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_parse_result_links_in_page_order() {
        let links = parse_result_links(LISTING, &ListingSelectors::default()).unwrap();
        assert_eq!(
            links,
            vec![
                "/h-tk-20232024-1-2.html",
                "/h-ek-20232024-1-1.html",
                "/h-tk-20232024-1-3.html",
            ]
        );
    }

    #[test]
    fn test_parse_result_links_ignores_other_lists() {
        let html = r#"<div class="result--list"><ul><li><h2><a href="/x.html">x</a></h2></li></ul></div>"#;
        let links = parse_result_links(html, &ListingSelectors::default()).unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn test_parse_detail_page() {
        let html = r#"
            <html><body>
                <h1 class="title">  Handelingen Tweede Kamer 2023-2024, nr. 12 </h1>
                <table class="table--dataintro">
                    <tr><td data-before="Organisatie">Tweede Kamer der Staten-Generaal</td></tr>
                    <tr><td data-before="Vergaderjaar">2023-2024</td></tr>
                    <tr><td data-before="Vergadernummer">12</td></tr>
                    <tr><td data-before="Datum vergadering"> 10-10-2023 </td></tr>
                    <tr><td>no label</td></tr>
                </table>
            </body></html>
        "#;

        let page = parse_detail_page(html, &DetailSelectors::default())
            .unwrap()
            .expect("table should be found");

        assert_eq!(page.field("Organisatie"), Some("Tweede Kamer der Staten-Generaal"));
        assert_eq!(page.field("Datum vergadering"), Some("10-10-2023"));
        assert_eq!(page.field("Documentnummer"), None);
        assert_eq!(page.fields.len(), 4);
        assert_eq!(
            page.title.as_deref(),
            Some("Handelingen Tweede Kamer 2023-2024, nr. 12")
        );
    }

    #[test]
    fn test_parse_detail_page_without_table() {
        let html = "<html><body><h1 class=\"title\">Leeg</h1></body></html>";
        let page = parse_detail_page(html, &DetailSelectors::default()).unwrap();
        assert!(page.is_none());
    }
}
