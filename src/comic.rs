use crate::{
    client::BASE_URL,
    selectors::{
        CHAPTER_ROW_SELECTOR, COVER_SELECTOR, INFO_BLOCK_SELECTOR,
        INFO_LABEL_SELECTOR, LINK_SELECTOR, PARAGRAPH_SELECTOR,
        TITLE_SELECTOR,
    },
    Chapter, Client,
};
use eyre::{ensure, eyre, Result, WrapErr};
use kuchiki::traits::*;
use std::{fmt, str::FromStr};
use url::Url;

/// A comic serie.
pub struct Comic {
    /// Comic title.
    title: String,
    /// Writer, when listed.
    writer: Option<String>,
    /// Artist, when listed.
    artist: Option<String>,
    /// Genres, when listed.
    genres: Vec<String>,
    /// Summary, when listed.
    summary: Option<String>,
    /// Publication status.
    status: ComicStatus,
    /// Cover URL, when listed.
    cover: Option<Url>,
    /// Chapter list, in reading order.
    chapters: Vec<Chapter>,
}

impl Comic {
    /// Initializes a new comic from its page on the site.
    pub fn new(client: &Client, slug: &ComicSlug) -> Result<Self> {
        let url = Url::parse(&format!("{BASE_URL}/Comic/{slug}"))
            .expect("valid comic URL");
        let html = client.get_html(&url).context("get comic page")?;

        parse_comic(&html, slug)
    }

    /// Returns the comic title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the writer, when the site lists one.
    pub fn writer(&self) -> Option<&str> {
        self.writer.as_deref()
    }

    /// Returns the artist, when the site lists one.
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    /// Returns the genres.
    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    /// Returns the summary, when the site lists one.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Returns the publication status.
    pub fn status(&self) -> ComicStatus {
        self.status
    }

    /// Returns the cover URL, when the site lists one.
    pub fn cover(&self) -> Option<&Url> {
        self.cover.as_ref()
    }

    /// Returns the number of chapters.
    pub fn chapters_count(&self) -> usize {
        self.chapters.len()
    }

    /// Returns the chapters, in reading order.
    pub fn chapters(
        &self,
    ) -> impl Iterator<Item = &Chapter> + ExactSizeIterator + '_ {
        self.chapters.iter()
    }
}

/// Extracts a comic from its details page.
fn parse_comic(html: &kuchiki::NodeRef, slug: &ComicSlug) -> Result<Comic> {
    let info = INFO_BLOCK_SELECTOR
        .filter(html.descendants().elements())
        .next()
        .ok_or_else(|| eyre!("comic details block not found"))?;

    let title = TITLE_SELECTOR
        .filter(html.descendants().elements())
        .next()
        .map_or_else(|| slug.to_string(), |el| el.text_contents().trim().to_owned());

    let mut writer = None;
    let mut artist = None;
    let mut genres = Vec::new();
    let mut status = ComicStatus::Unknown;
    let mut summary_parts = Vec::new();
    let mut in_summary = false;

    // The details block is a sequence of labelled paragraphs; the summary
    // is the paragraphs following the `Summary:` label.
    for paragraph in PARAGRAPH_SELECTOR.filter(info.as_node().descendants().elements())
    {
        let label = INFO_LABEL_SELECTOR
            .filter(paragraph.as_node().descendants().elements())
            .next()
            .map(|el| el.text_contents().trim().to_owned());

        match label.as_deref() {
            Some("Writer:") => writer = first_link_text(paragraph.as_node()),
            Some("Artist:") => artist = first_link_text(paragraph.as_node()),
            Some("Genres:") => genres = link_texts(paragraph.as_node()),
            Some("Status:") => {
                // Infallible, unknown statuses map to Unknown.
                status = paragraph.text_contents().parse().expect("infallible");
            },
            Some("Summary:") => in_summary = true,
            Some(_) => {},
            None if in_summary => {
                let text = paragraph.text_contents().trim().to_owned();
                if !text.is_empty() {
                    summary_parts.push(text);
                }
            },
            None => {},
        }
    }

    let cover = COVER_SELECTOR
        .filter(html.descendants().elements())
        .next()
        .and_then(|img| img.attributes.borrow().get("src").map(ToOwned::to_owned))
        .and_then(|src| {
            let base = Url::parse(BASE_URL).expect("valid base URL");
            base.join(&src).ok()
        });

    // Chapters are listed newest first; store them in reading order.
    let mut chapters = CHAPTER_ROW_SELECTOR
        .filter(html.descendants().elements())
        .skip(2) // two header rows
        .filter(|row| {
            // Spacer rows carry no link.
            LINK_SELECTOR
                .filter(row.as_node().descendants().elements())
                .next()
                .is_some()
        })
        .map(|row| Chapter::from_row(row.as_node()))
        .collect::<Result<Vec<_>>>()
        .context("extract chapters")?;
    chapters.reverse();
    let chapters = chapters
        .into_iter()
        .enumerate()
        .map(|(i, chapter)| chapter.numbered(i + 1))
        .collect();

    Ok(Comic {
        title,
        writer,
        artist,
        genres,
        summary: (!summary_parts.is_empty()).then(|| summary_parts.join("\n")),
        status,
        cover,
        chapters,
    })
}

/// Returns the text of the first link in `node`, if any.
fn first_link_text(node: &kuchiki::NodeRef) -> Option<String> {
    LINK_SELECTOR
        .filter(node.descendants().elements())
        .next()
        .map(|link| link.text_contents().trim().to_owned())
}

/// Returns the texts of every link in `node`.
fn link_texts(node: &kuchiki::NodeRef) -> Vec<String> {
    LINK_SELECTOR
        .filter(node.descendants().elements())
        .map(|link| link.text_contents().trim().to_owned())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Comic publication status.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ComicStatus {
    /// Still being published.
    Ongoing,
    /// Publication is over.
    Completed,
    /// The site did not say.
    Unknown,
}

impl fmt::Display for ComicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ongoing => "Ongoing",
            Self::Completed => "Completed",
            Self::Unknown => "Unknown",
        })
    }
}

impl FromStr for ComicStatus {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(if value.contains("Ongoing") {
            Self::Ongoing
        } else if value.contains("Completed") {
            Self::Completed
        } else {
            Self::Unknown
        })
    }
}

/// Comic slug on ReadComicOnline (the last segment of `/Comic/<slug>`).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ComicSlug(String);

impl fmt::Display for ComicSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ComicSlug {
    type Err = eyre::Report;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Accept a bare slug, a site path or a full URL.
        let slug = value.trim();
        let slug = slug.strip_prefix(BASE_URL).unwrap_or(slug);
        let slug = slug.strip_prefix("/Comic/").unwrap_or(slug);
        let slug = slug.trim_matches('/');

        ensure!(
            !slug.is_empty() && !slug.contains('/'),
            "invalid comic slug: {value}"
        );

        Ok(Self(slug.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMIC_PAGE: &str = r#"
        <div class="barContent">
          <a class="bigChar" href="/Comic/Test-Comic">Test Comic</a>
          <p><span class="info">Genres:</span> <a href="/Genre/Action">Action</a>, <a href="/Genre/Sci-Fi">Sci-Fi</a></p>
          <p><span class="info">Writer:</span> <a href="/Writer/Jane-Doe">Jane Doe</a></p>
          <p><span class="info">Artist:</span> <a href="/Artist/John-Roe">John Roe</a></p>
          <p><span class="info">Status:</span>&nbsp;Ongoing</p>
          <p><span class="info">Summary:</span></p>
          <p>A comic about tests.</p>
        </div>
        <div class="rightBox">
          <img src="/Uploads/test-comic.jpg">
        </div>
        <table class="listing">
          <tr><th>Issue</th><th>Date</th></tr>
          <tr><td colspan="2"></td></tr>
          <tr>
            <td><a href="/Comic/Test-Comic/Issue-2?id=2222">Test Comic Issue #2</a></td>
            <td>2/1/2024</td>
          </tr>
          <tr>
            <td><a href="/Comic/Test-Comic/Issue-1?id=1111">Test Comic Issue #1</a></td>
            <td>1/1/2024</td>
          </tr>
        </table>
    "#;

    fn parse(html: &str) -> Comic {
        let document = kuchiki::parse_html().one(html);
        let slug = "Test-Comic".parse().expect("valid slug");

        parse_comic(&document, &slug).expect("parsed comic")
    }

    #[test]
    fn parse_details() {
        let comic = parse(COMIC_PAGE);

        assert_eq!(comic.title(), "Test Comic");
        assert_eq!(comic.writer(), Some("Jane Doe"));
        assert_eq!(comic.artist(), Some("John Roe"));
        assert_eq!(comic.genres().to_vec(), ["Action", "Sci-Fi"]);
        assert_eq!(comic.summary(), Some("A comic about tests."));
        assert_eq!(comic.status(), ComicStatus::Ongoing);
        assert_eq!(
            comic.cover().map(Url::as_str),
            Some("https://readcomiconline.li/Uploads/test-comic.jpg")
        );
    }

    #[test]
    fn chapters_are_in_reading_order() {
        let comic = parse(COMIC_PAGE);

        let chapters = comic.chapters().collect::<Vec<_>>();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].number(), 1);
        assert_eq!(chapters[0].title(), "Test Comic Issue #1");
        assert_eq!(chapters[0].date(), Some("1/1/2024"));
        assert_eq!(chapters[1].number(), 2);
        assert_eq!(chapters[1].title(), "Test Comic Issue #2");
    }

    #[test]
    fn status_parse_is_total() {
        assert_eq!("  Ongoing".parse(), Ok(ComicStatus::Ongoing));
        assert_eq!("Completed ".parse(), Ok(ComicStatus::Completed));
        assert_eq!("whatever".parse(), Ok(ComicStatus::Unknown));
    }

    #[test]
    fn slug_from_str() {
        let expected = ComicSlug("Test-Comic".to_owned());

        assert_eq!("Test-Comic".parse::<ComicSlug>().unwrap(), expected);
        assert_eq!("/Comic/Test-Comic".parse::<ComicSlug>().unwrap(), expected);
        assert_eq!(
            "https://readcomiconline.li/Comic/Test-Comic/"
                .parse::<ComicSlug>()
                .unwrap(),
            expected
        );
        assert!("".parse::<ComicSlug>().is_err());
        assert!("/Comic/a/b".parse::<ComicSlug>().is_err());
    }
}
