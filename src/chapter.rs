use crate::{
    client::BASE_URL,
    fs,
    page::{build_pages, extract_tokens},
    selectors::{CELL_SELECTOR, LINK_SELECTOR, SCRIPT_SELECTOR},
    Client, PageIterator,
};
use clap::ArgEnum;
use eyre::{eyre, Result, WrapErr};
use kuchiki::traits::*;
use std::{
    fmt,
    path::{Path, PathBuf},
};
use url::Url;

/// Image quality served by the chapter reader.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ArgEnum)]
pub enum Quality {
    /// High quality.
    Hq,
    /// Low quality, smaller downloads.
    Lq,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hq => "hq",
            Self::Lq => "lq",
        })
    }
}

/// A comic chapter (an issue, an annual, a full volume...).
#[derive(Debug)]
pub struct Chapter {
    /// Chapter title, as listed on the comic page.
    title: String,
    /// Path to the chapter reader, relative to the site root.
    path: String,
    /// Upload date, as displayed (MM/dd/yyyy).
    date: Option<String>,
    /// Position in reading order, 1-based.
    number: usize,
}

impl Chapter {
    /// Extracts a chapter from a row of the comic page's chapter table.
    pub(crate) fn from_row(row: &kuchiki::NodeRef) -> Result<Self> {
        let link = LINK_SELECTOR
            .filter(row.descendants().elements())
            .next()
            .ok_or_else(|| eyre!("chapter row without a link"))?;
        let path = link
            .attributes
            .borrow()
            .get("href")
            .map(ToOwned::to_owned)
            .ok_or_else(|| eyre!("chapter link without href"))?;
        let date = CELL_SELECTOR
            .filter(row.descendants().elements())
            .nth(1)
            .map(|cell| cell.text_contents().trim().to_owned())
            .filter(|text| !text.is_empty());

        Ok(Self {
            title: link.text_contents().trim().to_owned(),
            path,
            date,
            number: 0,
        })
    }

    /// Sets the position in reading order.
    pub(crate) fn numbered(mut self, number: usize) -> Self {
        self.number = number;
        self
    }

    /// Returns the chapter title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the chapter number, in reading order (1-based).
    pub fn number(&self) -> usize {
        self.number
    }

    /// Returns the upload date, as displayed by the site.
    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    /// Tests if the chapter is already present on disk.
    pub fn is_present_at(&self, path: &Path) -> bool {
        let filepath = [path, &self.filename()].iter().collect::<PathBuf>();

        filepath.is_file()
    }

    /// Returns the chapter filename.
    pub fn filename(&self) -> PathBuf {
        let mut filename = fs::sanitize_name(self.title());
        filename.set_extension("cbz");
        filename
    }

    /// Retrieves the image tokens and returns a page iterator.
    ///
    /// A reader page without an image list yields an empty iterator, not
    /// an error: the caller decides what zero pages means.
    pub fn fetch_pages(
        &self,
        client: Client,
        quality: Quality,
    ) -> Result<PageIterator> {
        let html = client
            .get_html(&self.reader_url(quality)?)
            .context("get chapter reader page")?;

        // The image list is pushed token by token in an inline script.
        let script = SCRIPT_SELECTOR
            .filter(html.descendants().elements())
            .map(|element| element.text_contents())
            .find(|text| text.contains("lstImages.push"))
            .unwrap_or_default();

        Ok(PageIterator::new(client, build_pages(extract_tokens(&script))))
    }

    /// Returns the chapter reader URL for the requested quality.
    fn reader_url(&self, quality: Quality) -> Result<Url> {
        let base = Url::parse(BASE_URL).expect("valid base URL");
        let mut url = base
            .join(&self.path)
            .with_context(|| format!("invalid chapter path {}", self.path))?;
        url.query_pairs_mut()
            .append_pair("quality", &quality.to_string());

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(path: &str) -> Chapter {
        Chapter {
            title: "Test Issue #1".to_owned(),
            path: path.to_owned(),
            date: None,
            number: 1,
        }
    }

    #[test]
    fn reader_url_appends_quality() {
        let res = chapter("/Comic/Test/Issue-1?id=12345")
            .reader_url(Quality::Hq)
            .expect("reader URL");

        assert_eq!(
            res.as_str(),
            "https://readcomiconline.li/Comic/Test/Issue-1?id=12345&quality=hq"
        );
    }

    #[test]
    fn reader_url_low_quality() {
        let res = chapter("/Comic/Test/Issue-1?id=12345")
            .reader_url(Quality::Lq)
            .expect("reader URL");

        assert!(res.as_str().ends_with("&quality=lq"));
    }

    #[test]
    fn filename_is_sanitized() {
        let mut chapter = chapter("/Comic/Test/Issue-1");
        chapter.title = "Weird: Tales?".to_owned();

        assert_eq!(chapter.filename(), PathBuf::from("Weird_ Tales_.cbz"));
    }
}
