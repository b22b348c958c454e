// src/extractor/spaces.rs

use super::{FolderDescriptor, ListingExtractor, PageListing};
use crate::{
    models::{ContentType, FileDescriptor},
    urls,
    utils::split_name_extension,
};
use log::{debug, trace};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::{collections::HashSet, sync::LazyLock};
use url::Url;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static FOLDER_SEL: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a.js-dir, a[data-nid][href*="/list/"]"#));
static FOLDER_PASSWORD_SEL: LazyLock<Selector> = LazyLock::new(|| selector(".ico_files_dir_password"));
static FOLDER_NAME_SELS: LazyLock<[Selector; 3]> =
    LazyLock::new(|| [selector(".js-dir_name"), selector(".list-link__name"), selector("b")]);

static FILE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    selector(".js-file_item, [data-nid][data-type], .list-item[data-nid], .tiled_item[data-nid]")
});
static TILE_NAME_SEL: LazyLock<Selector> = LazyLock::new(|| selector(".tile_descr_2l.darkblue"));
static NAME_PART_SEL: LazyLock<Selector> = LazyLock::new(|| selector(".darkblue.break-word"));
static EXT_PART_SEL: LazyLock<Selector> = LazyLock::new(|| selector(".lightgrey.break-word"));
static ARROW_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| selector("a.arrow_link, a.strong_link"));
static LINK_NAME_SEL: LazyLock<Selector> = LazyLock::new(|| selector("b.darkblue"));
static LINK_EXT_SEL: LazyLock<Selector> = LazyLock::new(|| selector("b.lightgrey"));
static BOLD_NAME_SEL: LazyLock<Selector> = LazyLock::new(|| selector("b.darkblue, b.break-word"));
static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| selector("img"));

// 按优先级排列的下载链接选择器
static DOWNLOAD_LINK_SELS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        "a.__adv_download",
        r#"a.list-link-blue[href*="/download/"]"#,
        r#"a[href*="/files/download/"]"#,
        r#"a[href*="/pictures/download/"]"#,
        r#"a[href*="/music/download/"]"#,
        r#"a[href*="/video/download/"]"#,
    ]
    .into_iter()
    .map(selector)
    .collect()
});
static VIEW_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        r#"a[href*="/files/view/"], a[href*="/pictures/view/"], a[href*="/music/view/"], a[href*="/video/view/"]"#,
    )
});
static PLAYER_SEL: LazyLock<Selector> = LazyLock::new(|| selector(".player_item[data-src]"));

static PGN_SEL: LazyLock<Selector> = LazyLock::new(|| selector("div.pgn[data-total]"));
static PGN_COUNTER_SEL: LazyLock<Selector> = LazyLock::new(|| selector("div.pgn__counter.pgn__range"));
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| selector(".breadcrumbs__item_last"));

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static DOWNLOAD_ICON_SEL: LazyLock<Selector> =
    LazyLock::new(|| selector(r#".ico_download2_blue, .ico_download, [class*="download"]"#));
static VIEW_PAGE_FALLBACK_SELS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        r#"a.list-link-blue[href*="/download/"]"#,
        r#"a[href*="/files/download/"][target="_blank"]"#,
        r#"a[href*="/download/"]"#,
    ]
    .into_iter()
    .map(selector)
    .collect()
});

static PAGE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"из\s*(\d+)").unwrap());

/// spaces.im 列表页的选择器规则
#[derive(Debug, Default, Clone, Copy)]
pub struct SpacesExtractor;

impl SpacesExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn parse_folder(el: ElementRef<'_>, page_url: &Url) -> Option<FolderDescriptor> {
    let href = el.value().attr("href")?;
    let url = urls::absolutize(href, page_url)?;
    let name = FOLDER_NAME_SELS
        .iter()
        .find_map(|sel| first_text(el, sel))
        .unwrap_or_default();
    Some(FolderDescriptor {
        id: el.value().attr("data-nid").map(str::to_string),
        name,
        url,
        protected: el.select(&FOLDER_PASSWORD_SEL).next().is_some(),
    })
}

/// 名称与扩展名的几种页面写法
fn parse_file_name(el: ElementRef<'_>) -> (String, String) {
    if has_class(el, "tiled_item") {
        if let Some(full) = first_text(el, &TILE_NAME_SEL) {
            return with_default_extension(split_name_extension(&full), ".jpg");
        }
        let alt = el.select(&IMG_SEL).next().and_then(|img| {
            img.value()
                .attr("alt")
                .or_else(|| img.value().attr("aria-label"))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        });
        return match alt {
            Some(alt) => with_default_extension(split_name_extension(alt), ".jpg"),
            None => (String::new(), String::new()),
        };
    }

    if let (Some(name), Some(ext)) = (first_text(el, &NAME_PART_SEL), first_text(el, &EXT_PART_SEL)) {
        return (name, ext);
    }
    if let Some(link) = el.select(&ARROW_LINK_SEL).next() {
        if let (Some(name), Some(ext)) = (first_text(link, &LINK_NAME_SEL), first_text(link, &LINK_EXT_SEL)) {
            return (name, ext);
        }
        return split_name_extension(&element_text(link));
    }
    first_text(el, &BOLD_NAME_SEL)
        .map(|text| split_name_extension(&text))
        .unwrap_or_default()
}

fn with_default_extension((name, ext): (String, String), default: &str) -> (String, String) {
    if ext.is_empty() {
        (name, default.to_string())
    } else {
        (name, ext)
    }
}

fn parse_file(el: ElementRef<'_>, page_url: &Url) -> Option<FileDescriptor> {
    let id = el.value().attr("data-nid")?.trim().to_string();
    if id.is_empty() {
        return None;
    }
    let code = el
        .value()
        .attr("data-type")
        .and_then(|t| t.trim().parse::<u32>().ok())
        .unwrap_or(0);
    let content_type = ContentType::from_code(code);

    let (display_name, extension) = parse_file_name(el);
    if display_name.is_empty() {
        trace!("跳过没有名称的文件条目 (id: {})", id);
        return None;
    }

    let href_of = |sel: &Selector| {
        el.select(sel)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| urls::absolutize(href, page_url))
    };
    let resolved_url = DOWNLOAD_LINK_SELS
        .iter()
        .find_map(href_of)
        .or_else(|| href_of(&VIEW_LINK_SEL))
        .or_else(|| {
            page_url
                .join(&format!("/{}/view/{}/", content_type.category(), id))
                .ok()
                .map(String::from)
        })
        .unwrap_or_default();
    let direct_url = el
        .select(&PLAYER_SEL)
        .next()
        .and_then(|p| p.value().attr("data-src"))
        .and_then(|src| urls::absolutize(src, page_url));

    Some(FileDescriptor {
        id,
        display_name,
        extension,
        content_type,
        resolved_url,
        direct_url,
        logical_path: String::new(),
    })
}

fn parse_page_count(doc: &Html) -> Option<u32> {
    if let Some(total) = doc
        .select(&PGN_SEL)
        .next()
        .and_then(|el| el.value().attr("data-total"))
        .and_then(|t| t.trim().parse().ok())
    {
        return Some(total);
    }
    doc.select(&PGN_COUNTER_SEL)
        .next()
        .map(element_text)
        .and_then(|text| PAGE_RANGE_RE.captures(&text).and_then(|c| c[1].parse().ok()))
}

impl ListingExtractor for SpacesExtractor {
    fn extract_listing(&self, body: &str, page_url: &Url) -> PageListing {
        let doc = Html::parse_document(body);

        let mut folder_urls = HashSet::new();
        let folders: Vec<FolderDescriptor> = doc
            .select(&FOLDER_SEL)
            .filter_map(|el| parse_folder(el, page_url))
            .filter(|f| folder_urls.insert(f.url.clone()))
            .collect();

        // 同一个条目可能同时命中多个选择器 (嵌套元素)，按 id 只保留第一次出现
        let mut file_ids = HashSet::new();
        let files: Vec<FileDescriptor> = doc
            .select(&FILE_SEL)
            .filter(|el| !(el.value().name() == "a" && el.value().attr("href").is_some_and(|h| h.contains("/list/"))))
            .filter_map(|el| parse_file(el, page_url))
            .filter(|f| file_ids.insert(f.id.clone()))
            .collect();

        let page_count = parse_page_count(&doc);
        let title = doc.select(&TITLE_SEL).next().map(element_text).filter(|t| !t.is_empty());

        debug!(
            "页面 {} 提取到 {} 个文件夹, {} 个文件, 页数 {:?}",
            page_url,
            folders.len(),
            files.len(),
            page_count
        );
        PageListing {
            folders,
            files,
            page_count,
            title,
        }
    }

    fn extract_download_link(&self, body: &str, page_url: &Url) -> Option<String> {
        let doc = Html::parse_document(body);

        let primary = doc.select(&ANCHOR_SEL).find_map(|a| {
            let href = a.value().attr("href")?;
            let has_icon = a.select(&DOWNLOAD_ICON_SEL).next().is_some();
            let looks_like_download = element_text(a).contains("Скачать") || has_icon;
            (looks_like_download && urls::is_download_url(href)).then_some(href)
        });
        let href = primary.or_else(|| {
            VIEW_PAGE_FALLBACK_SELS
                .iter()
                .find_map(|sel| doc.select(sel).find_map(|a| a.value().attr("href")))
        })?;
        urls::absolutize(href, page_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://spaces.im/files/user/alice/").unwrap()
    }

    #[test]
    fn test_folders_and_protection() {
        let html = r#"
            <a class="js-dir" data-nid="11" href="/files/list/Docs-11/">
                <span class="js-dir_name">Docs</span><span class="grey">12 файлов</span>
            </a>
            <a data-nid="12" href="https://spaces.im/files/list/Secret-12/">
                <span class="ico_files_dir_password"></span><b>Secret</b>
            </a>
            <a class="js-dir" data-nid="11" href="/files/list/Docs-11/">dup</a>
        "#;
        let listing = SpacesExtractor.extract_listing(html, &page_url());
        assert_eq!(listing.folders.len(), 2);
        assert_eq!(listing.folders[0].name, "Docs");
        assert_eq!(listing.folders[0].id.as_deref(), Some("11"));
        assert_eq!(listing.folders[0].url, "https://spaces.im/files/list/Docs-11/");
        assert!(!listing.folders[0].protected);
        assert_eq!(listing.folders[1].name, "Secret");
        assert!(listing.folders[1].protected);
        assert!(listing.files.is_empty(), "文件夹链接不能被当作文件");
    }

    #[test]
    fn test_file_name_variants_and_links() {
        let html = r#"
            <div class="list-item" data-nid="1" data-type="5">
                <span class="darkblue break-word">report</span><span class="lightgrey break-word">.pdf</span>
                <a class="__adv_download" href="/files/download/1/report.pdf">dl</a>
            </div>
            <div class="js-file_item" data-nid="2" data-type="6">
                <a class="arrow_link" href="/music/view/2/">Song name.mp3</a>
                <div class="player_item" data-src="//cdn.spaces.im/2.mp3"></div>
            </div>
            <div class="tiled_item" data-nid="3" data-type="7">
                <img alt="sunset">
            </div>
            <div class="list-item" data-nid="4" data-type="25"><span>no name here</span></div>
        "#;
        let listing = SpacesExtractor.extract_listing(html, &page_url());
        assert_eq!(listing.files.len(), 3);

        let report = &listing.files[0];
        assert_eq!(report.file_name(), "report.pdf");
        assert_eq!(report.content_type, ContentType::Files);
        assert_eq!(report.resolved_url, "https://spaces.im/files/download/1/report.pdf");

        let song = &listing.files[1];
        assert_eq!((song.display_name.as_str(), song.extension.as_str()), ("Song name", ".mp3"));
        assert_eq!(song.content_type, ContentType::Music);
        assert_eq!(song.resolved_url, "https://spaces.im/music/view/2/");
        assert_eq!(song.direct_url.as_deref(), Some("https://cdn.spaces.im/2.mp3"));

        let photo = &listing.files[2];
        assert_eq!(photo.file_name(), "sunset.jpg");
        assert_eq!(photo.resolved_url, "https://spaces.im/pictures/view/3/");
    }

    #[test]
    fn test_pagination_variants() {
        let with_total = r#"<div class="pgn" data-total="4"></div>"#;
        assert_eq!(SpacesExtractor.extract_listing(with_total, &page_url()).page_count, Some(4));

        let with_counter = r#"<div class="pgn__counter pgn__range">1 из 7</div>"#;
        assert_eq!(SpacesExtractor.extract_listing(with_counter, &page_url()).page_count, Some(7));

        let listing = SpacesExtractor.extract_listing("<html><body>garbage", &page_url());
        assert_eq!(listing.page_count, None);
        assert!(listing.folders.is_empty() && listing.files.is_empty());
    }

    #[test]
    fn test_download_link_from_view_page() {
        let url = Url::parse("https://spaces.im/files/view/5/").unwrap();
        let html = r#"
            <a href="/files/view/5/?comments">Комментарии</a>
            <a href="/files/download/5/doc.txt"><span class="ico_download"></span>Скачать</a>
        "#;
        assert_eq!(
            SpacesExtractor.extract_download_link(html, &url).as_deref(),
            Some("https://spaces.im/files/download/5/doc.txt")
        );

        let fallback = r#"<a class="list-link-blue" href="/music/download/9/">x</a>"#;
        assert_eq!(
            SpacesExtractor.extract_download_link(fallback, &url).as_deref(),
            Some("https://spaces.im/music/download/9/")
        );
        assert_eq!(SpacesExtractor.extract_download_link("<p>nothing</p>", &url), None);
    }
}
