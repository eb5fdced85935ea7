//! Catalog browsing: popular/latest listings and the advanced search.

use crate::{
    client::BASE_URL,
    selectors::{CATALOG_ITEM_SELECTOR, IMAGE_SELECTOR, PAGER_LINK_SELECTOR},
    Client, ComicSlug,
};
use clap::ArgEnum;
use eyre::{bail, eyre, Result, WrapErr};
use kuchiki::traits::*;
use url::Url;

/// The site's genre list, in the exact order of the search form.
///
/// The search endpoint matches genres by position, so this order is part
/// of the protocol.
pub const GENRES: [&str; 48] = [
    "Action",
    "Adventure",
    "Anthology",
    "Anthropomorphic",
    "Biography",
    "Children",
    "Comedy",
    "Crime",
    "Drama",
    "Family",
    "Fantasy",
    "Fighting",
    "Graphic Novels",
    "Historical",
    "Horror",
    "Leading Ladies",
    "LGBTQ",
    "Literature",
    "Manga",
    "Martial Arts",
    "Mature",
    "Military",
    "Movies & TV",
    "Music",
    "Mystery",
    "Mythology",
    "Personal",
    "Political",
    "Post-Apocalyptic",
    "Psychological",
    "Pulp",
    "Religious",
    "Robots",
    "Romance",
    "School Life",
    "Sci-Fi",
    "Slice of Life",
    "Sport",
    "Spy",
    "Superhero",
    "Supernatural",
    "Suspense",
    "Thriller",
    "Vampires",
    "Video Games",
    "War",
    "Western",
    "Zombies",
];

/// Publication status, as understood by the search form.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ArgEnum)]
pub enum Status {
    /// No restriction.
    Any,
    /// Publication is over.
    Completed,
    /// Still being published.
    Ongoing,
}

impl Status {
    /// Returns the search form value.
    fn as_form_value(self) -> &'static str {
        match self {
            Self::Any => "",
            Self::Completed => "Completed",
            Self::Ongoing => "Ongoing",
        }
    }
}

/// Tri-state genre selection, as understood by the search form.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TriState {
    /// Genre does not matter.
    Ignore,
    /// Results must have the genre.
    Include,
    /// Results must not have the genre.
    Exclude,
}

impl TriState {
    /// Returns the search form value.
    fn as_form_value(self) -> &'static str {
        match self {
            Self::Ignore => "0",
            Self::Include => "1",
            Self::Exclude => "2",
        }
    }
}

/// A search filter.
///
/// The site understands exactly these two kinds; the form builder matches
/// on them exhaustively.
#[derive(Debug, Clone)]
pub enum SearchFilter {
    /// Publication status.
    Status(Status),
    /// One tri-state per catalog genre, in [`GENRES`] order.
    Genres(Vec<TriState>),
}

/// Maps included/excluded genre names onto the positional genre states.
///
/// Names are matched case-insensitively against [`GENRES`]; an unknown
/// name is an error, not a silent ignore.
pub fn genre_states(
    include: &[String],
    exclude: &[String],
) -> Result<Vec<TriState>> {
    let position = |name: &str| -> Result<usize> {
        GENRES
            .iter()
            .position(|genre| genre.eq_ignore_ascii_case(name))
            .ok_or_else(|| eyre!("unknown genre: {name}"))
    };

    let mut states = vec![TriState::Ignore; GENRES.len()];
    for name in include {
        states[position(name)?] = TriState::Include;
    }
    for name in exclude {
        let i = position(name)?;
        if states[i] == TriState::Include {
            bail!("genre both included and excluded: {name}");
        }
        states[i] = TriState::Exclude;
    }

    Ok(states)
}

/// An entry of the catalog (or of a search result page).
#[derive(Debug, Clone)]
pub struct ComicListing {
    /// Comic title.
    title: String,
    /// Comic slug, to fetch the details.
    slug: ComicSlug,
    /// Thumbnail URL, when listed.
    thumbnail: Option<Url>,
}

impl ComicListing {
    /// Returns the comic title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the comic slug.
    pub fn slug(&self) -> &ComicSlug {
        &self.slug
    }

    /// Returns the thumbnail URL, when the site lists one.
    pub fn thumbnail(&self) -> Option<&Url> {
        self.thumbnail.as_ref()
    }
}

/// Lists a page of the most popular comics.
///
/// Also returns whether another page follows.
pub fn popular(client: &Client, page: u32) -> Result<(Vec<ComicListing>, bool)> {
    catalog_page(client, "ComicList/MostPopular", page)
        .context("list popular comics")
}

/// Lists a page of the latest updated comics.
///
/// Also returns whether another page follows.
pub fn latest(client: &Client, page: u32) -> Result<(Vec<ComicListing>, bool)> {
    catalog_page(client, "ComicList/LatestUpdate", page)
        .context("list latest updates")
}

/// Searches the catalog by name, restricted by `filters`.
pub fn search(
    client: &Client,
    query: &str,
    filters: &[SearchFilter],
) -> Result<Vec<ComicListing>> {
    let url = Url::parse(&format!("{BASE_URL}/AdvanceSearch"))
        .expect("valid search URL");

    let html = client
        .post_html(&url, &build_search_form(query, filters))
        .context("search comics")?;

    parse_listing(&html).context("parse search results")
}

/// Builds the advanced search form fields, in the order the site expects.
fn build_search_form(
    query: &str,
    filters: &[SearchFilter],
) -> Vec<(String, String)> {
    let mut form = vec![("comicName".to_owned(), query.to_owned())];

    for filter in filters {
        match filter {
            SearchFilter::Status(status) => form.push((
                "status".to_owned(),
                status.as_form_value().to_owned(),
            )),
            SearchFilter::Genres(states) => {
                // One field per genre, positional.
                form.extend(states.iter().map(|state| {
                    ("genres".to_owned(), state.as_form_value().to_owned())
                }));
            },
        }
    }

    form
}

/// Fetches and parses one catalog page.
fn catalog_page(
    client: &Client,
    path: &str,
    page: u32,
) -> Result<(Vec<ComicListing>, bool)> {
    let url = Url::parse(&format!("{BASE_URL}/{path}?page={page}"))
        .expect("valid catalog URL");

    let html = client.get_html(&url).context("get catalog page")?;
    let listing = parse_listing(&html).context("parse catalog page")?;

    Ok((listing, has_next_page(&html)))
}

/// Extracts the comic entries of a listing page.
fn parse_listing(html: &kuchiki::NodeRef) -> Result<Vec<ComicListing>> {
    CATALOG_ITEM_SELECTOR
        .filter(html.descendants().elements())
        .map(|link| {
            let href = link
                .attributes
                .borrow()
                .get("href")
                .map(ToOwned::to_owned)
                .ok_or_else(|| eyre!("catalog item without href"))?;
            let thumbnail = IMAGE_SELECTOR
                .filter(link.as_node().descendants().elements())
                .next()
                .and_then(|img| {
                    img.attributes.borrow().get("src").map(ToOwned::to_owned)
                })
                .and_then(|src| {
                    let base = Url::parse(BASE_URL).expect("valid base URL");
                    base.join(&src).ok()
                });

            Ok(ComicListing {
                title: link.text_contents().trim().to_owned(),
                slug: href.parse().context("catalog item slug")?,
                thumbnail,
            })
        })
        .collect()
}

/// Tests if the listing has a "Next" page.
fn has_next_page(html: &kuchiki::NodeRef) -> bool {
    PAGER_LINK_SELECTOR
        .filter(html.descendants().elements())
        .any(|link| link.text_contents().contains("Next"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_PAGE: &str = r#"
        <div class="list-comic">
          <div class="item">
            <a href="/Comic/Test-Comic"><img src="/Uploads/test.jpg">Test Comic</a>
            <a href="/Comic/Test-Comic/Issue-1">Issue #1</a>
          </div>
          <div class="item">
            <a href="/Comic/Other-Comic">Other Comic</a>
          </div>
        </div>
        <ul class="pager">
          <li><a href="?page=1">Prev</a></li>
          <li><a href="?page=3">Next &raquo;</a></li>
        </ul>
    "#;

    #[test]
    fn parse_listing_items() {
        let html = kuchiki::parse_html().one(LISTING_PAGE);

        let listing = parse_listing(&html).expect("parsed listing");

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].title(), "Test Comic");
        assert_eq!(listing[0].slug().to_string(), "Test-Comic");
        assert_eq!(
            listing[0].thumbnail().map(Url::as_str),
            Some("https://readcomiconline.li/Uploads/test.jpg")
        );
        assert_eq!(listing[1].title(), "Other Comic");
        assert_eq!(listing[1].thumbnail(), None);
    }

    #[test]
    fn detect_next_page() {
        let html = kuchiki::parse_html().one(LISTING_PAGE);
        assert!(has_next_page(&html));

        let html = kuchiki::parse_html().one("<ul class=\"pager\"></ul>");
        assert!(!has_next_page(&html));
    }

    #[test]
    fn search_form_starts_with_query() {
        let form = build_search_form("batman", &[]);

        assert_eq!(form, [("comicName".to_owned(), "batman".to_owned())]);
    }

    #[test]
    fn search_form_serializes_filters() {
        let mut states = vec![TriState::Ignore; GENRES.len()];
        states[0] = TriState::Include; // Action
        states[47] = TriState::Exclude; // Zombies

        let form = build_search_form(
            "batman",
            &[
                SearchFilter::Status(Status::Ongoing),
                SearchFilter::Genres(states),
            ],
        );

        assert_eq!(form[0], ("comicName".to_owned(), "batman".to_owned()));
        assert_eq!(form[1], ("status".to_owned(), "Ongoing".to_owned()));
        // One positional field per genre.
        let genres = &form[2..];
        assert_eq!(genres.len(), GENRES.len());
        assert!(genres.iter().all(|(key, _)| key == "genres"));
        assert_eq!(genres[0].1, "1");
        assert_eq!(genres[1].1, "0");
        assert_eq!(genres[47].1, "2");
    }

    #[test]
    fn status_form_values() {
        assert_eq!(Status::Any.as_form_value(), "");
        assert_eq!(Status::Completed.as_form_value(), "Completed");
        assert_eq!(Status::Ongoing.as_form_value(), "Ongoing");
    }

    #[test]
    fn genre_states_maps_names() {
        let states = genre_states(
            &["action".to_owned()],
            &["Zombies".to_owned()],
        )
        .expect("genre states");

        assert_eq!(states[0], TriState::Include);
        assert_eq!(states[47], TriState::Exclude);
        assert!(states[1..47]
            .iter()
            .all(|state| *state == TriState::Ignore));
    }

    #[test]
    fn genre_states_rejects_unknown_genre() {
        let res = genre_states(&["Cooking".to_owned()], &[]);

        assert!(res.is_err());
    }

    #[test]
    fn genre_states_rejects_contradiction() {
        let res =
            genre_states(&["Action".to_owned()], &["action".to_owned()]);

        assert!(res.is_err());
    }
}
