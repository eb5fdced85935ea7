pub mod fs;
pub mod termio;

mod catalog;
mod chapter;
mod client;
mod comic;
mod page;
mod selectors;

pub use catalog::{
    genre_states, latest, popular, search, ComicListing, SearchFilter,
    Status, TriState, GENRES,
};
pub use chapter::{Chapter, Quality};
pub use client::Client;
pub use comic::{Comic, ComicSlug, ComicStatus};
pub use page::{
    build_pages, extract_tokens, resolve_image_url, DescrambleError, Page,
    PageIterator,
};
