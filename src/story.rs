use chrono::NaiveDate;
use reqwest::Url;

/// One installment of a story, in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterDescriptor {
    pub title: String,
    pub url: Url,
}

/// Metadata and chapter list of the story being downloaded.
///
/// Adapters fill it in place; string values are trimmed on the way in.
#[derive(Debug, Default)]
pub struct Story {
    pub site_abbrev: String,
    pub genre: String,
    pub category: String,
    pub title: String,
    pub author: String,
    pub date_published: Option<NaiveDate>,
    pub date_updated: Option<NaiveDate>,
    pub num_chapters: usize,
    pub chapters: Vec<ChapterDescriptor>,
}

impl Story {
    pub fn new(site_abbrev: &str) -> Self {
        Self {
            site_abbrev: site_abbrev.to_string(),
            ..Default::default()
        }
    }

    pub fn set_genre(&mut self, genre: &str) {
        self.genre = genre.trim().to_string();
    }

    pub fn set_category(&mut self, category: &str) {
        self.category = category.trim().to_string();
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.trim().to_string();
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = author.trim().to_string();
    }

    /// Appends a chapter. Callers are responsible for appending in reading order.
    pub fn add_chapter(&mut self, title: &str, url: Url) {
        self.chapters.push(ChapterDescriptor {
            title: title.trim().to_string(),
            url,
        });
    }
}

#[test]
fn test_setters_trim() {
    let mut story = Story::new("nifty");
    story.set_author(" A. Writer\r");
    story.set_title("  Some Title ");
    assert_eq!("A. Writer", story.author);
    assert_eq!("Some Title", story.title);
    assert_eq!("nifty", story.site_abbrev);
}

#[test]
fn test_chapters_keep_insertion_order() {
    let mut story = Story::new("nifty");
    for n in 1..4 {
        let url = Url::parse(&format!("http://www.nifty.org/nifty/a/b/c/c-{n}")).unwrap();
        story.add_chapter(&format!("C {n}"), url);
    }
    let titles: Vec<&str> = story.chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(vec!["C 1", "C 2", "C 3"], titles);
}
