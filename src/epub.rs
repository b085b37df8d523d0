use adapters::SiteAdapter;
use chrono::NaiveDate;
use dom_manipulation::strip_invalid_xml_names;
use easy_error::{err_msg, Error, ResultExt};
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use html_utils::parse;
use scraper::Selector;
use std::fs::File;
use std::path::Path;
use xml_utils::XmlSerializable;

lazy_static! {
    static ref BODY_SELECTOR: Selector = Selector::parse("body").unwrap();
}

const STYLESHEET: &str = "
    body {
        font-family: serif;
    }
    h1 {
        text-align: center;
    }
";

/// Turns a chapter document into the XHTML page stored in the EPUB.
pub fn chapter_xhtml(title: &str, html: &str) -> Result<String, Error> {
    let mut doc = parse(html);
    strip_invalid_xml_names(&mut doc);
    let body = doc
        .select(&BODY_SELECTOR)
        .next()
        .ok_or(err_msg(format!("Chapter {title} has no body")))?;
    let body_text = body.inner_xml()?;

    let escaped_title = html_escape::encode_text(title);
    Ok("<?xml version='1.0' encoding='utf-8' ?><html xmlns='http://www.w3.org/1999/xhtml'><head><title>".to_string() + &escaped_title + "</title><meta http-equiv='Content-Type' content ='text/html; charset=utf-8' />\n<link rel='stylesheet' type='text/css' href='stylesheet.css' />\n</head><body><h1>" + &escaped_title + "</h1>\n" + &body_text + "</body></html>")
}

fn description(adapter: &dyn SiteAdapter) -> String {
    let story = adapter.story();
    let date = |date: Option<NaiveDate>| date.map_or("unknown".to_string(), |date| date.to_string());
    format!(
        "Downloaded from {} ({}). Published {}, updated {}.",
        adapter.site_domain(),
        story.site_abbrev,
        date(story.date_published),
        date(story.date_updated)
    )
}

/// Downloads every chapter of an adapter's story into a new EPUB.
/// Metadata must have been extracted already.
pub fn build_book(adapter: &dyn SiteAdapter) -> Result<EpubBuilder<ZipLibrary>, Error> {
    let story = adapter.story();

    let mut builder = EpubBuilder::new(ZipLibrary::new().context("Could not create ZipLibrary")?).context("Could not create EpubBuilder")?;
    builder
    .epub_version(EpubVersion::V30)
    .stylesheet(STYLESHEET.as_bytes()).context("Could not set stylesheet")?
    .metadata("author", &story.author).context("Could not set author metadata")?
    .metadata("title", &story.title).context("Could not set title metadata")?
    .metadata("lang", "en-US").context("Could not set language metadata")?
    .metadata("subject", format!("{}/{}", story.genre, story.category)).context("Could not set subject metadata")?
    .metadata("description", description(adapter)).context("Could not set description metadata")?;

    for (index, chapter) in story.chapters.iter().enumerate() {
        let html = adapter
            .get_chapter_text(&chapter.url)
            .context(format!("Could not download {}", chapter.title))?;
        println!("Downloaded {} from {}", chapter.title, chapter.url);

        let cont = chapter_xhtml(&chapter.title, &html)?;

        // nav.xhtml would contain an unescaped & otherwise, and escaping it
        // ourselves double escapes it in toc.ncx.
        let title_clean = chapter.title.replace("&", "﹠");
        builder.add_content(EpubContent::new(format!("chapter_{}.xhtml", index + 1), cont.as_bytes()).title(&title_clean).reftype(ReferenceType::Text))
               .context("Could not add chapter")?;
    }

    Ok(builder)
}

pub fn write_book(mut builder: EpubBuilder<ZipLibrary>, path: &Path) -> Result<(), Error> {
    println!("Converting to epub now at {}", path.display());
    let mut zipfile = File::create(path).context(format!("Could not open {}", path.display()))?;
    builder.generate(&mut zipfile).context("Could not generate ebook")?;
    Ok(())
}
