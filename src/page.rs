//! Chapter pages and the image URL descrambler.

use crate::Client;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use eyre::{Result, WrapErr};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{error, fmt};
use url::Url;

/// Match one image token pushed onto the viewer's image list.
pub static IMAGE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"lstImages\.push\('([^']*)'\)")
        .expect("invalid image token regex")
});

/// Host serving the descrambled images.
const IMAGE_HOST: &str = "https://2.bp.blogspot.com/";

/// Extracts the image tokens embedded in a viewer script.
///
/// Tokens come back in source order, duplicates included. An empty vector
/// means the script held no image list; deciding whether that is an error
/// is left to the caller.
pub fn extract_tokens(script: &str) -> Vec<String> {
    IMAGE_TOKEN
        .captures_iter(script)
        .map(|capture| capture[1].to_owned())
        .collect()
}

/// An ordered, lazily-resolvable reference to one chapter image.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Page {
    /// 0-based position in reading order.
    index: usize,
    /// Pre-resolved URL. Always empty on this site.
    eager_url: String,
    /// Opaque token, resolved at download time.
    token: String,
}

impl Page {
    /// Returns the page position in reading order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the pre-resolved URL, if the site provided one.
    pub fn eager_url(&self) -> &str {
        &self.eager_url
    }

    /// Returns the raw image token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Builds the ordered page list from extracted tokens.
///
/// No descrambling happens here: a token that cannot be resolved must not
/// invalidate the whole chapter, so resolution is deferred until the page
/// is actually requested.
pub fn build_pages(tokens: Vec<String>) -> Vec<Page> {
    tokens
        .into_iter()
        .enumerate()
        .map(|(index, token)| Page {
            index,
            eager_url: String::new(),
            token,
        })
        .collect()
}

/// Error returned when an image token cannot be descrambled.
///
/// The transform is all-or-nothing: whichever step fails, the whole
/// resolution collapses into this single value, with no partial result.
/// Resolving the same token again always fails the same way.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DescrambleError;

impl fmt::Display for DescrambleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decrypt the image URL")
    }
}

impl error::Error for DescrambleError {}

/// Recovers the image URL hidden in a token.
///
/// Tokens that already carry a scheme are returned untouched. Everything
/// else goes through a fixed transform matching the site's viewer script;
/// its constants are protocol constants, locked by the fixtures in the
/// tests below rather than derived from the token structure.
pub fn resolve_image_url(token: &str) -> Result<String, DescrambleError> {
    if token.starts_with("https") {
        return Ok(token.to_owned());
    }

    descramble(token)
        .map(|path| format!("{IMAGE_HOST}{path}"))
        .ok_or(DescrambleError)
}

/// Runs the descrambling transform, step by step.
///
/// Every slice is checked: a token too short for any step (or one that
/// would cut a non-ASCII boundary) yields `None` instead of panicking.
fn descramble(token: &str) -> Option<String> {
    // The token tail decides both the trim width and the final suffix.
    let (trim, suffix) = if token.contains("=s0") {
        (3, "=s0")
    } else {
        (6, "=s1600")
    };

    // Undo the character substitutions, then drop the variant tail.
    let substituted = token.replace("_x236", "d").replace("_x945", "g");
    let trimmed = substituted.get(..substituted.len().checked_sub(trim)?)?;

    // Excise the two fixed filler windows.
    let stitched = format!("{}{}", trimmed.get(4..22)?, trimmed.get(25..)?);

    // The last two characters are real, the four before them are not.
    let keep = stitched.get(..stitched.len().checked_sub(6)?)?;
    let tail = stitched.get(stitched.len() - 2..)?;

    // What remains is the image path, in plain Base64.
    let bytes = STANDARD.decode(format!("{keep}{tail}")).ok()?;
    let path = String::from_utf8(bytes).ok()?;

    // One more filler window, then swap the tail for the size suffix.
    let path = format!("{}{}", path.get(..13)?, path.get(17..)?);
    let path = path.get(..path.len().checked_sub(2)?)?;

    Some(format!("{path}{suffix}"))
}

/// Iterator over a chapter's images.
///
/// Each page's token is resolved here, at download time, so a bad token
/// only fails the page that holds it, never the whole chapter.
pub struct PageIterator {
    /// Client to download the images.
    client: Client,
    /// Remaining pages, last one first (we pop from the end).
    pages: Vec<Page>,
}

impl PageIterator {
    pub(crate) fn new(client: Client, mut pages: Vec<Page>) -> Self {
        // Reverse so that popping yields the pages in reading order.
        pages.reverse();
        Self { client, pages }
    }
}

impl Iterator for PageIterator {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pages.pop().map(|page| {
            let url = resolve_image_url(page.token())
                .with_context(|| format!("resolve page {}", page.index()))?;
            let url = Url::parse(&url)
                .with_context(|| format!("invalid URL for page {}", page.index()))?;

            let mut buf = Vec::new();
            self.client
                .get_image(&url, &mut buf)
                .with_context(|| format!("download image from {url}"))?;

            Ok(buf)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pages.len(), Some(self.pages.len()))
    }
}

impl ExactSizeIterator for PageIterator {
    fn len(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Known token/URL pairs, one per variant, locking the transform
    // constants. The first token carries the `_x236`/`_x945` markers, the
    // second is the same payload without them.
    const TOKEN_S0: &str =
        "AAAAcHcvQUN0Qy0zZGFiY1B_x945B_x236YWVovUkNPMDAxLmpwZ1KLMNFR=s0";
    const TOKEN_S0_PLAIN: &str =
        "AAAAcHcvQUN0Qy0zZGFiY1BgBdYWVovUkNPMDAxLmpwZ1KLMNFR=s0";
    const URL_S0: &str = "https://2.bp.blogspot.com/pw/ACtC-3dabc/RCO001.jpg=s0";

    const TOKEN_S1600: &str =
        "CCCCcHcvQUN0Qy0zZHh5ekDDDpLTE0vUkNPMDk5LmpwZ1PQRSFRabcdef";
    const URL_S1600: &str =
        "https://2.bp.blogspot.com/pw/ACtC-3dxyz/RCO099.jpg=s1600";

    #[test]
    fn resolve_s0_token() {
        let res = resolve_image_url(TOKEN_S0).expect("resolved URL");

        assert_eq!(res, URL_S0);
    }

    #[test]
    fn resolve_s0_token_without_markers() {
        let res = resolve_image_url(TOKEN_S0_PLAIN).expect("resolved URL");

        assert_eq!(res, URL_S0);
    }

    #[test]
    fn resolve_s1600_token() {
        let res = resolve_image_url(TOKEN_S1600).expect("resolved URL");

        assert_eq!(res, URL_S1600);
    }

    #[test]
    fn direct_url_bypasses_transform() {
        let url = "https://example.com/images/007.jpg?foo=s0";

        let res = resolve_image_url(url).expect("resolved URL");

        assert_eq!(res, url);
    }

    #[test]
    fn resolve_is_idempotent() {
        assert_eq!(resolve_image_url(TOKEN_S0), resolve_image_url(TOKEN_S0));
        assert_eq!(resolve_image_url("junk"), resolve_image_url("junk"));
    }

    #[test]
    fn short_token_fails_cleanly() {
        for token in ["", "a", "abc", "way-too-short", "=s0"] {
            assert_eq!(resolve_image_url(token), Err(DescrambleError));
        }
    }

    #[test]
    fn non_ascii_token_fails_cleanly() {
        let token = "héhéhéhéhéhéhéhéhéhéhéhéhéhéhéhéhéhéhéhé";

        assert_eq!(resolve_image_url(token), Err(DescrambleError));
    }

    #[test]
    fn invalid_base64_fails_cleanly() {
        // Long enough for every slicing step, but not valid Base64.
        let token = "????????????????????????????????????????????????";

        assert_eq!(resolve_image_url(token), Err(DescrambleError));
    }

    #[test]
    fn extract_tokens_preserves_order_and_duplicates() {
        let script = "\
            var lstImages = [];\n\
            lstImages.push('first');\n\
            lstImages.push('second');\n\
            lstImages.push('first');\n\
        ";

        let tokens = extract_tokens(script);

        assert_eq!(tokens, ["first", "second", "first"]);
    }

    #[test]
    fn extract_tokens_from_empty_script() {
        assert!(extract_tokens("var currEpisodeId = 42;").is_empty());
    }

    #[test]
    fn build_pages_assigns_indices_in_order() {
        let tokens = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];

        let pages = build_pages(tokens);

        assert_eq!(pages.len(), 3);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.index(), i);
            assert!(page.eager_url().is_empty());
        }
        assert_eq!(pages[0].token(), "a");
        assert_eq!(pages[2].token(), "c");
    }

    #[test]
    fn end_to_end_scenario() {
        let script =
            "lstImages.push('ABCDEFGHIJKLMNOPQRSTUVWXYZ_x236_x945=s0')";

        let tokens = extract_tokens(script);
        assert_eq!(tokens, ["ABCDEFGHIJKLMNOPQRSTUVWXYZ_x236_x945=s0"]);

        let pages = build_pages(tokens);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].index(), 0);

        // This payload survives the slicing but is not valid Base64.
        assert_eq!(resolve_image_url(pages[0].token()), Err(DescrambleError));
    }
}
