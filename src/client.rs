//! HTTP client to interact with the ReadComicOnline website.

use eyre::{Result, WrapErr};
use kuchiki::traits::*;
use rand::prelude::*;
use std::{io::Read, thread, time::Duration};
use url::Url;

/// Website base URL, also used as referer.
pub(crate) const BASE_URL: &str = "https://readcomiconline.li";
/// Desktop user agent, sent with every request (images included).
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.3; WOW64)";

/// A simple HTTP client, handle retry and delay.
#[derive(Clone)]
pub struct Client {
    /// HTTP client.
    agent: ureq::Agent,
    /// Delay between each request.
    delay: Duration,
    /// Max number of retry for each request.
    retry: u8,
}

impl Client {
    /// Initialize a new client.
    pub fn new(retry: u8) -> Self {
        Self {
            agent: ureq::builder().user_agent(USER_AGENT).build(),
            // 1s ought to be enough to avoid detection...
            delay: Duration::from_secs(1),
            retry,
        }
    }

    /// Retrieves and parses the HTML at `url`.
    pub fn get_html(&self, url: &Url) -> Result<kuchiki::NodeRef> {
        let request = self
            .agent
            .request_url("GET", url)
            .set("accept", "text/html");

        let response = self.call(request, &[]).context("get HTML")?;
        let html = response.into_string().context("read HTML")?;

        Ok(kuchiki::parse_html().one(html))
    }

    /// Posts a form at `url` and parses the HTML response.
    ///
    /// Fields are sent in the given order; the search endpoint relies on
    /// repeated `genres` fields being positional.
    pub fn post_html(
        &self,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<kuchiki::NodeRef> {
        let request = self
            .agent
            .request_url("POST", url)
            .set("accept", "text/html");

        let response = self.call(request, form).context("post form")?;
        let html = response.into_string().context("read HTML")?;

        Ok(kuchiki::parse_html().one(html))
    }

    /// Downloads the specified image in the given buffer.
    pub fn get_image(&self, url: &Url, buf: &mut Vec<u8>) -> Result<()> {
        let request =
            self.agent.request_url("GET", url).set("accept", "image/*");

        let response = self.call(request, &[]).context("get image")?;
        response
            .into_reader()
            .read_to_end(buf)
            .context("read image")?;

        Ok(())
    }

    /// Executes a request and handle retries.
    fn call(
        &self,
        request: ureq::Request,
        form: &[(String, String)],
    ) -> Result<ureq::Response> {
        // Wait a bit, don't overload the site.
        let mut rng = rand::thread_rng();
        let jiffy = Duration::from_millis(rng.gen_range(0u32..1000).into());
        thread::sleep(self.delay + jiffy);

        // Set referer to looks kinda legit.
        let request = request.set("Referer", BASE_URL);

        let mut i = 0;
        loop {
            i += 1;

            let res = if form.is_empty() {
                request.clone().call()
            } else {
                let fields = form
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str()))
                    .collect::<Vec<_>>();
                request.clone().send_form(&fields)
            };

            if let Err(ureq::Error::Status(code, ref response)) = res {
                // If we got a retryable error, we try again!
                if is_request_retryable(code) && i <= self.retry {
                    let delay = self.retry_delay(response);

                    thread::sleep(delay);
                    continue;
                }
            }

            return res.context("HTTP request failed");
        }
    }

    /// Computes the delay to wait before retrying a failed request.
    fn retry_delay(&self, response: &ureq::Response) -> Duration {
        response
            .header("retry-after")
            .and_then(|h| h.parse::<u64>().ok())
            .map_or(self.delay, Duration::from_secs)
    }
}

/// Tests if request failed with a retryable error.
fn is_request_retryable(http_status: u16) -> bool {
    // 429 is Too Many Requests
    (500..=599).contains(&http_status) || http_status == 429
}
