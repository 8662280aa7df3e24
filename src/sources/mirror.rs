use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, RANGE, REFERER};
use reqwest::Url;
use scraper::{Html, Selector};

use crate::config::MirrorConfig;
use crate::core::title::{find_duration, parse_link_text};
use crate::error::SourceError;
use crate::models::{SearchKey, SourceKind, Track};
use crate::sources::{check_status, http_client, TrackSource};

static ABSOLUTE_MP3: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https://[^\s"'<>]+\.mp3"#).unwrap());
static JS_FILE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"file:\s*["']([^"']+\.mp3)["']"#).unwrap());
static JS_IMAGE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"image:\s*"([^"]+)""#).unwrap());

/// Scraping client for a mirror that hosts one subdomain per artist,
/// e.g. `https://<artist>.skysound7.com/`.
pub struct ScrapedMirrorSource {
    client: reqwest::Client,
    scheme: String,
    host: String,
    referer: String,
    verify_audio: bool,
}

impl ScrapedMirrorSource {
    pub fn new(config: &MirrorConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client(config.timeout(), None)?,
            scheme: config.scheme.clone(),
            host: config.host.clone(),
            referer: config.referer(),
            verify_audio: config.verify_audio,
        })
    }

    /// Listing page for the artist subdomain derived from the query.
    pub fn listing_url(&self, key: &SearchKey) -> Result<Url, SourceError> {
        if key.label.is_empty() {
            return Err(SourceError::Parse(format!(
                "query {:?} has no usable subdomain",
                key.text
            )));
        }
        let raw = format!("{}://{}.{}/", self.scheme, key.label, self.host);
        Url::parse(&raw).map_err(|e| SourceError::Parse(format!("{raw}: {e}")))
    }

    /// HEAD the candidate (ranged GET if HEAD is refused) and check that it
    /// is served as audio.
    async fn probe_audio(&self, url: &str) -> bool {
        let head = self
            .client
            .head(url)
            .header(REFERER, &self.referer)
            .send()
            .await;

        let response = match head {
            Ok(r) if r.status().is_success() => r,
            _ => {
                let ranged = self
                    .client
                    .get(url)
                    .header(REFERER, &self.referer)
                    .header(RANGE, "bytes=0-1")
                    .send()
                    .await;
                match ranged {
                    Ok(r) if r.status().is_success() => r,
                    Ok(r) => {
                        tracing::debug!(url, status = r.status().as_u16(), "candidate rejected");
                        return false;
                    }
                    Err(e) => {
                        tracing::debug!(url, error = %e, "candidate unreachable");
                        return false;
                    }
                }
            }
        };

        let audio = is_audio(response.headers());
        if !audio {
            tracing::debug!(url, "candidate is not served as audio");
        }
        audio
    }
}

fn is_audio(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase().starts_with("audio/"))
        .unwrap_or(false)
}

/// Parses a listing page into tracks. A page without playlist items is an
/// empty result, not an error.
pub fn parse_listing(html: &str, base: &Url) -> Vec<Track> {
    let document = Html::parse_document(html);

    let item_sel = Selector::parse("div.playlist-item").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();
    let duration_sel = Selector::parse("span.playlist-duration").unwrap();
    let img_sel = Selector::parse("img[src]").unwrap();

    // Page-level player config sometimes carries the only cover.
    let page_cover = JS_IMAGE_FIELD
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let mut seen = HashSet::new();
    let mut tracks = Vec::new();

    for item in document.select(&item_sel) {
        let Some(link) = item.select(&link_sel).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default().trim();
        let Ok(page_url) = base.join(href) else {
            continue;
        };
        if !seen.insert(page_url.to_string()) {
            continue;
        }

        let link_text = link
            .value()
            .attr("title")
            .map(str::to_string)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| link.text().collect::<String>());
        let (artist, title) = parse_link_text(&link_text);

        // Dedicated element first, then any m:ss in the item markup.
        let duration = item
            .select(&duration_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|d| !d.is_empty())
            .or_else(|| find_duration(&item.html()))
            .unwrap_or_default();

        let cover = item
            .select(&img_sel)
            .next()
            .and_then(|el| el.value().attr("src"))
            .and_then(|src| base.join(src.trim()).ok())
            .map(|url| url.to_string())
            .or_else(|| page_cover.clone());

        tracks.push(
            Track::new(title, artist, duration, SourceKind::ScrapedMirror, page_url.to_string())
                .with_thumbnail(cover),
        );
    }

    tracks
}

/// Collects candidate media URLs from a track page, in priority order:
/// absolute `https://…mp3` links in the raw markup, the player's
/// `file: "…mp3"` field, then `<audio>`/`<source>` and `href`/`data-*`
/// attributes.
pub fn extract_candidates(html: &str, page: &Url) -> Vec<String> {
    let mut candidates = Vec::new();

    candidates.extend(ABSOLUTE_MP3.find_iter(html).map(|m| m.as_str().to_string()));

    candidates.extend(
        JS_FILE_FIELD
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| page.join(m.as_str()).ok())
            .map(|url| url.to_string()),
    );

    let document = Html::parse_document(html);
    let media_sel = Selector::parse("audio[src], source[src]").unwrap();
    let any_sel = Selector::parse("*").unwrap();

    for el in document.select(&media_sel) {
        if let Some(src) = el.value().attr("src") {
            if let Ok(url) = page.join(src.trim()) {
                candidates.push(url.to_string());
            }
        }
    }

    for el in document.select(&any_sel) {
        for (name, value) in el.value().attrs() {
            let relevant = name == "href" || name.starts_with("data-");
            if relevant && has_mp3_extension(value) {
                if let Ok(url) = page.join(value.trim()) {
                    candidates.push(url.to_string());
                }
            }
        }
    }

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.clone()));
    candidates
}

fn has_mp3_extension(value: &str) -> bool {
    let path = value.trim().split(['?', '#']).next().unwrap_or_default();
    path.to_ascii_lowercase().ends_with(".mp3")
}

#[async_trait]
impl TrackSource for ScrapedMirrorSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ScrapedMirror
    }

    async fn search(&self, key: &SearchKey) -> Result<Vec<Track>, SourceError> {
        let url = self.listing_url(key)?;
        tracing::debug!(%url, "fetching mirror listing");

        let response = self
            .client
            .get(url.clone())
            .header(REFERER, &self.referer)
            .send()
            .await?;
        check_status(&response)?;
        let html = response.text().await?;

        let tracks = parse_listing(&html, &url);
        if tracks.is_empty() {
            tracing::debug!(%url, "no playlist items on page");
        }
        Ok(tracks)
    }

    async fn resolve(&self, locator: &str) -> Result<String, SourceError> {
        let page = Url::parse(locator).map_err(|e| SourceError::Parse(format!("{locator}: {e}")))?;

        let response = self
            .client
            .get(page.clone())
            .header(REFERER, locator)
            .send()
            .await?;
        check_status(&response)?;
        let html = response.text().await?;

        let candidates = extract_candidates(&html, &page);
        if candidates.is_empty() {
            return Err(SourceError::NoMedia(format!("no mp3 link on {locator}")));
        }
        if !self.verify_audio {
            return Ok(candidates[0].clone());
        }

        for candidate in &candidates {
            if self.probe_audio(candidate).await {
                return Ok(candidate.clone());
            }
        }
        Err(SourceError::NoMedia(format!(
            "none of {} candidates on {locator} is served as audio",
            candidates.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::normalize;
    use crate::models::{UNKNOWN_ARTIST, UNKNOWN_DURATION};
    use crate::testutil::{serve, Reply};

    const LISTING: &str = r#"
        <html><body>
        <script>var player = { image: "https://img.example/page-cover.jpg" };</script>
        <div class="playlist-item">
            <img src="/covers/1.jpg">
            <a href="/track/1" title="Download: Artist X - Good Morning">Artist X - Good Morning</a>
            <span class="playlist-duration">3:15</span>
        </div>
        <div class="playlist-item">
            <a href="https://artist-x.skysound7.com/track/1">duplicate</a>
        </div>
        <div class="playlist-item">
            <a href="/track/2">Скачать Lonely Title</a>
            <div class="meta">length 4:01</div>
        </div>
        <div class="playlist-item"><span>no link here</span></div>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://artist-x.skysound7.com/").unwrap()
    }

    fn mirror(verify_audio: bool) -> ScrapedMirrorSource {
        ScrapedMirrorSource::new(&MirrorConfig {
            timeout_secs: 5,
            verify_audio,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_listing_scenario() {
        let tracks = parse_listing(LISTING, &base());
        assert_eq!(tracks.len(), 2);

        let first = &tracks[0];
        assert_eq!(first.artist, "Artist X");
        assert_eq!(first.title, "Good Morning");
        assert_eq!(first.duration, "3:15");
        assert_eq!(first.source, SourceKind::ScrapedMirror);
        assert_eq!(first.locator, "https://artist-x.skysound7.com/track/1");
        assert_eq!(
            first.thumbnail.as_deref(),
            Some("https://artist-x.skysound7.com/covers/1.jpg")
        );
    }

    #[test]
    fn test_listing_fallbacks() {
        let tracks = parse_listing(LISTING, &base());
        let second = &tracks[1];
        assert_eq!(second.artist, UNKNOWN_ARTIST);
        assert_eq!(second.title, "Lonely Title");
        assert_eq!(second.duration, "4:01");
        assert_eq!(
            second.thumbnail.as_deref(),
            Some("https://img.example/page-cover.jpg")
        );
    }

    #[test]
    fn test_listing_without_items() {
        let html = "<html><body><p>Nothing found</p></body></html>";
        assert!(parse_listing(html, &base()).is_empty());
    }

    #[test]
    fn test_unknown_duration() {
        let html = r#"<div class="playlist-item"><a href="/t">A - B</a></div>"#;
        let tracks = parse_listing(html, &base());
        assert_eq!(tracks[0].duration, UNKNOWN_DURATION);
    }

    #[test]
    fn test_listing_url_uses_label() {
        let src = mirror(true);
        let key = normalize("Good Morning").unwrap();
        assert_eq!(
            src.listing_url(&key).unwrap().as_str(),
            "https://good-morning.skysound7.com/"
        );

        let key = normalize("музыка").unwrap();
        let url = src.listing_url(&key).unwrap();
        assert!(url.as_str().starts_with("https://xn--"));
    }

    #[tokio::test]
    async fn test_search_without_label_is_error() {
        let key = normalize("!!!").unwrap();
        assert!(matches!(
            mirror(true).search(&key).await,
            Err(SourceError::Parse(_))
        ));
    }

    #[test]
    fn test_candidate_order() {
        let page = Url::parse("https://a.skysound7.com/track/1").unwrap();
        let html = r#"
            <script>player = { file: "/files/full.mp3" };</script>
            <a href="https://cdn.example/one.mp3">one</a>
            <audio src="/files/audio.mp3"></audio>
            <div data-url="/files/data.mp3?x=1"></div>
            <a href="/not-audio.html">x</a>
        "#;
        let candidates = extract_candidates(html, &page);
        assert_eq!(
            candidates,
            vec![
                "https://cdn.example/one.mp3",
                "https://a.skysound7.com/files/full.mp3",
                "https://a.skysound7.com/files/audio.mp3",
                "https://a.skysound7.com/files/data.mp3?x=1",
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_skips_non_audio_candidates() {
        let server = serve(|method, target| match (method, target) {
            ("GET", "/track/1") => Reply::ok(
                "text/html",
                r#"<script>player = { file: "/preview.mp3" };</script>
                   <audio src="/nohead.mp3"></audio>"#,
            ),
            (_, "/preview.mp3") => Reply::ok("text/html", "<html>teaser</html>"),
            ("HEAD", "/nohead.mp3") => Reply::status(405),
            ("GET", "/nohead.mp3") => Reply {
                status: 206,
                ..Reply::ok("audio/mpeg", vec![0u8; 2])
            },
            _ => Reply::status(404),
        })
        .await;

        let url = mirror(true).resolve(&server.url("/track/1")).await.unwrap();
        assert_eq!(url, server.url("/nohead.mp3"));
        assert!(server
            .requests()
            .contains(&"HEAD /preview.mp3".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_without_verification_takes_first() {
        let server = serve(|_, target| match target {
            "/track/1" => Reply::ok("text/html", r#"<script>file: "/preview.mp3"</script>"#),
            _ => Reply::status(404),
        })
        .await;

        let url = mirror(false).resolve(&server.url("/track/1")).await.unwrap();
        assert_eq!(url, server.url("/preview.mp3"));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_failures() {
        let server = serve(|_, target| match target {
            "/empty" => Reply::ok("text/html", "<html>no audio</html>"),
            "/teaser-only" => Reply::ok("text/html", r#"<audio src="/t.mp3"></audio>"#),
            "/t.mp3" => Reply::ok("text/html", "short"),
            _ => Reply::status(500),
        })
        .await;
        let src = mirror(true);

        assert!(matches!(
            src.resolve(&server.url("/empty")).await,
            Err(SourceError::NoMedia(_))
        ));
        assert!(matches!(
            src.resolve(&server.url("/teaser-only")).await,
            Err(SourceError::NoMedia(_))
        ));
        assert!(matches!(
            src.resolve(&server.url("/gone")).await,
            Err(SourceError::Unavailable { status: 500 })
        ));
    }
}
