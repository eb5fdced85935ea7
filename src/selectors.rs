use once_cell::sync::Lazy;

/// Compile a selector at first use.
macro_rules! selector {
    ($name:ident, $css:literal) => {
        pub(crate) static $name: Lazy<kuchiki::Selectors> = Lazy::new(|| {
            kuchiki::Selectors::compile($css)
                .expect(concat!("invalid selector: ", $css))
        });
    };
}

// Catalog and search result items.
selector!(CATALOG_ITEM_SELECTOR, ".list-comic > .item > a:first-child");
// Pagination links ("Next" is matched on the text, in code).
selector!(PAGER_LINK_SELECTOR, "ul.pager > li > a");
// Comic details block and its labelled paragraphs.
selector!(TITLE_SELECTOR, "a.bigChar");
selector!(INFO_BLOCK_SELECTOR, "div.barContent");
selector!(INFO_LABEL_SELECTOR, "span.info");
selector!(PARAGRAPH_SELECTOR, "p");
// Cover image on the details page.
selector!(COVER_SELECTOR, "div.rightBox img");
// Chapter table rows (the first two are headers).
selector!(CHAPTER_ROW_SELECTOR, "table.listing tr");
selector!(LINK_SELECTOR, "a");
selector!(CELL_SELECTOR, "td");
selector!(IMAGE_SELECTOR, "img");
// Viewer scripts, the image list is in one of them.
selector!(SCRIPT_SELECTOR, "script");
