//! rco-dl - Scrape and download comics from ReadComicOnline

// Lints {{{

#![deny(
    nonstandard_style,
    rust_2018_idioms,
    future_incompatible,
    rustdoc::all,
    rustdoc::missing_crate_level_docs,
    missing_docs,
    unreachable_pub,
    unsafe_code,
    unused,
    unused_import_braces,
    unused_lifetimes,
    unused_qualifications,
    variant_size_differences,
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::clone_on_ref_ptr,
    clippy::exit,
    clippy::filetype_is_file,
    clippy::float_cmp_const,
    clippy::lossy_float_literal,
    clippy::mem_forget,
    clippy::panic,
    clippy::pattern_type_mismatch,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unneeded_field_pattern,
    clippy::verbose_file_reads,
    clippy::dbg_macro,
    clippy::let_underscore_must_use,
    clippy::todo,
    clippy::unwrap_used,
    clippy::use_debug
)]
// clap 3.x `default_value_t` derive codegen emits a fully-qualified path that the current
// toolchain flags as an unnecessary qualification; allow it crate-wide so the spurious
// lint on third-party macro output does not block the build (also overrides deny(warnings)).
#![allow(unused_qualifications)]

// }}}

use clap::{ArgGroup, Parser};
use eyre::{bail, ensure, Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use rco_dl::{
    fs, genre_states, termio, Chapter, Client, Comic, ComicListing,
    ComicSlug, Quality, SearchFilter, Status,
};
use std::{
    io::{Cursor, Write},
    path::{Path, PathBuf},
};
use zip::{write::FileOptions, ZipWriter};

fn main() -> Result<()> {
    let opts = Opts::parse();
    let client = Client::new(opts.retry);

    if let Some(ref query) = opts.search {
        let filters = vec![
            SearchFilter::Status(opts.status.unwrap_or(Status::Any)),
            SearchFilter::Genres(genre_states(
                &opts.genre,
                &opts.exclude_genre,
            )?),
        ];
        let results = rco_dl::search(&client, query, &filters)
            .with_context(|| format!("search {query}"))?;
        print_listing(&results, false);
        return Ok(());
    }

    if opts.popular {
        let (listing, has_next) = rco_dl::popular(&client, opts.page)
            .context("list popular comics")?;
        print_listing(&listing, has_next);
        return Ok(());
    }

    if opts.latest {
        let (listing, has_next) = rco_dl::latest(&client, opts.page)
            .context("list latest updates")?;
        print_listing(&listing, has_next);
        return Ok(());
    }

    // Not a listing action, so the group guarantees a comic.
    let slug = opts.comic.as_ref().expect("comic slug");
    let comic = Comic::new(&client, slug)
        .with_context(|| format!("get comic {slug}"))?;
    print_comic(&comic);

    if opts.list {
        for chapter in comic.chapters() {
            println!(
                "{:4}  {:>10}  {}",
                chapter.number(),
                chapter.date().unwrap_or("-"),
                chapter.title(),
            );
        }
        return Ok(());
    }

    ensure!(comic.chapters_count() > 0, "no chapters found for {slug}");

    // Create output directory, if necessary.
    let destination = [opts.output.clone(), fs::sanitize_name(comic.title())]
        .iter()
        .collect::<PathBuf>();
    fs::mkdir_p(&destination).context("create comic directory")?;

    // The cover is a nice-to-have, don't fail the download over it.
    if let Err(err) = save_cover(&client, &comic, &destination) {
        termio::print_warn(&format!("cover not saved: {err:#}"));
    }

    if let Some(number) = opts.chapter {
        download_chapter(&client, &destination, &comic, number, opts.quality)
            .with_context(|| format!("download {slug} chapter {number}"))?;
    } else {
        download_comic(&client, &destination, &comic, opts.quality)
            .with_context(|| format!("download {slug}"))?;
    }

    Ok(())
}

/// Prints a catalog listing.
fn print_listing(listing: &[ComicListing], has_next: bool) {
    if listing.is_empty() {
        termio::print_warn("no comics found");
        return;
    }

    for entry in listing {
        println!("{}  [{}]", entry.title(), entry.slug());
    }
    if has_next {
        println!("...more available with --page");
    }
}

/// Prints the comic details.
fn print_comic(comic: &Comic) {
    println!("{} [{}]", comic.title(), comic.status());
    if let Some(writer) = comic.writer() {
        println!("Writer: {writer}");
    }
    if let Some(artist) = comic.artist() {
        println!("Artist: {artist}");
    }
    if !comic.genres().is_empty() {
        println!("Genres: {}", comic.genres().join(", "));
    }
    if let Some(summary) = comic.summary() {
        println!("{summary}");
    }
    println!("{} chapters", comic.chapters_count());
}

/// Saves the comic cover next to the chapters, unless already there.
fn save_cover(client: &Client, comic: &Comic, directory: &Path) -> Result<()> {
    let url = match comic.cover() {
        Some(url) => url,
        None => return Ok(()),
    };
    let path = [directory, Path::new("cover.jpg")]
        .into_iter()
        .collect::<PathBuf>();
    if path.is_file() {
        return Ok(());
    }

    let mut buf = Vec::new();
    client.get_image(url, &mut buf).context("download cover")?;

    fs::atomic_write(&path, &buf).context("save cover")
}

/// Downloads a single chapter.
fn download_chapter(
    client: &Client,
    destination: &Path,
    comic: &Comic,
    number: usize,
    quality: Quality,
) -> Result<()> {
    let chapter =
        match comic.chapters().find(|chapter| chapter.number() == number) {
            Some(chapter) => chapter,
            None => bail!("chapter {number} not found"),
        };
    if chapter.is_present_at(destination) {
        termio::print_ok("chapter already downloaded: nothing to do");
        return Ok(());
    }

    println!("Downloading {}", chapter.title());
    download_pages(client, chapter, destination, quality)
        .with_context(|| format!("download {}", chapter.title()))
}

/// Downloads every chapter not already on disk.
fn download_comic(
    client: &Client,
    destination: &Path,
    comic: &Comic,
    quality: Quality,
) -> Result<()> {
    // Filter out (and log) already downloaded chapters.
    let chapters = comic
        .chapters()
        .filter(|chapter| {
            if chapter.is_present_at(destination) {
                termio::print_ok(&format!(
                    "chapter {} already downloaded",
                    chapter.number()
                ));
                return false;
            }

            true
        })
        .collect::<Vec<_>>();

    let total = chapters.len();
    for (i, chapter) in chapters.into_iter().enumerate() {
        println!("Downloading {} ({}/{total})", chapter.title(), i + 1);
        download_pages(client, chapter, destination, quality)
            .with_context(|| format!("download {}", chapter.title()))?;
    }

    Ok(())
}

/// Downloads the specified chapter pages as CBZ.
fn download_pages(
    client: &Client,
    chapter: &Chapter,
    directory: &Path,
    quality: Quality,
) -> Result<()> {
    let title = chapter.title();
    let pages = chapter
        .fetch_pages(client.clone(), quality)
        .context("fetch page list")?;

    // Zero pages means the extraction broke (or the site changed).
    ensure!(pages.len() != 0, "no pages found");

    let progress_bar = ProgressBar::new(pages.len() as u64);
    setup_page_progress_bar(&progress_bar);

    // Download every image and make a CBZ out of them, all in-memory.
    let mut buf = Vec::new();
    {
        let mut cbz = ZipWriter::new(Cursor::new(&mut buf));
        let options = FileOptions::default();

        // Add the chapter directory in the archive.
        cbz.add_directory(title, options)
            .context("create chapter directory")?;

        // Pages come out in reading order, enumerate gives the filenames.
        for (i, page) in pages.enumerate() {
            let filename = format!("{i:03}.jpg");
            let image =
                page.with_context(|| format!("fetch page {filename}"))?;

            cbz.start_file(format!("{title}/{filename}"), options)
                .with_context(|| format!("add image {filename}"))?;
            cbz.write_all(&image)
                .with_context(|| format!("write image {filename}"))?;

            progress_bar.inc(1);
        }
        cbz.finish().expect("close in-memory zip");
    }
    progress_bar.finish();

    // Atomic write of the CBZ.
    let path = [directory, chapter.filename().as_path()]
        .into_iter()
        .collect::<PathBuf>();
    fs::atomic_write(&path, &buf).context("save CBZ")
}

/// Configures the progress bar for the pages.
fn setup_page_progress_bar(progress_bar: &ProgressBar) {
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:10}    [{bar:40.cyan/blue}] {pos:>4}/{len:4} ETA: {eta_precise}")
            .progress_chars("##-"),
    );
    progress_bar.set_message("pages");
}

/// CLI options.
#[derive(Parser)]
#[clap(author, version, about)]
#[clap(group(
    ArgGroup::new("action")
        .required(true)
        .args(&["comic", "search", "popular", "latest"]),
))]
pub struct Opts {
    /// Path to the output directory.
    #[clap(short, long, default_value = ".")]
    output: PathBuf,

    /// Comic to download (slug, site path or full URL).
    #[clap(short, long)]
    comic: Option<ComicSlug>,

    /// Search the catalog by name.
    #[clap(short, long)]
    search: Option<String>,

    /// List the most popular comics.
    #[clap(long)]
    popular: bool,

    /// List the latest updated comics.
    #[clap(long)]
    latest: bool,

    /// Catalog page to list.
    #[clap(long, default_value_t = 1)]
    page: u32,

    /// Restrict search results to a publication status.
    #[clap(long, arg_enum)]
    status: Option<Status>,

    /// Genre the search results must have (can be repeated).
    #[clap(short, long)]
    genre: Vec<String>,

    /// Genre the search results must not have (can be repeated).
    #[clap(long)]
    exclude_genre: Vec<String>,

    /// List the chapters instead of downloading them.
    #[clap(short, long)]
    list: bool,

    /// Chapter to download (in reading order, 1-based).
    #[clap(long)]
    chapter: Option<usize>,

    /// Image quality to request.
    #[clap(short, long, arg_enum, default_value_t = Quality::Hq)]
    quality: Quality,

    /// Max number of retry for HTTP requests.
    #[clap(long, default_value_t = 3)]
    retry: u8,
}
