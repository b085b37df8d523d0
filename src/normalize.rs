//! Plain-text chapter normalization.
//!
//! Most stories on the site are e-mails submitted as plain text. The stages
//! below turn their line structure into `<br><br>` paragraph breaks so the
//! text can be wrapped into a minimal HTML document.

use html_escape::{encode_double_quoted_attribute, encode_text};
use regex::Regex;

lazy_static! {
    static ref LINE_ENDINGS: Regex = Regex::new(r"\r\n|\r|\n").unwrap();
    static ref EMAIL_HEADER: Regex = Regex::new(r"(?i)^Date: (.*?)\n\s*From: (.*)\n\s*Subject: (.*?)\n").unwrap();
    static ref BLANK_LINES: Regex = Regex::new(r"\s*\n\s*\n\s*").unwrap();
    static ref INDENTED_LINE: Regex = Regex::new(r"\n\s+").unwrap();
    static ref SENTENCE_END: Regex = Regex::new(r"\.\n").unwrap();
    static ref LINE_BREAK_RUN: Regex = Regex::new(r"\s*\n+\s*").unwrap();
}

const PARAGRAPH_BREAK: &str = "<br><br>";

/// Turns every line ending variant into `\n`.
pub fn unify_line_endings(text: &str) -> String {
    LINE_ENDINGS.replace_all(text, "\n").into_owned()
}

/// Folds a leading `Date:`/`From:`/`Subject:` header into one preamble line.
/// Only the first header is rewritten; quoted headers further down stay as they are.
pub fn inline_email_header(text: &str) -> String {
    EMAIL_HEADER
        .replacen(text, 1, "Date: ${1}<br>From: ${2}<br>Subject: ${3}<br><br><br>")
        .into_owned()
}

pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_LINES.replace_all(text, PARAGRAPH_BREAK).into_owned()
}

pub fn break_indented_lines(text: &str) -> String {
    INDENTED_LINE.replace_all(text, PARAGRAPH_BREAK).into_owned()
}

pub fn break_after_sentences(text: &str) -> String {
    SENTENCE_END.replace_all(text, ".<br><br>").into_owned()
}

pub fn collapse_line_break_runs(text: &str) -> String {
    LINE_BREAK_RUN.replace_all(text, PARAGRAPH_BREAK).into_owned()
}

pub fn break_remaining_lines(text: &str) -> String {
    text.replace('\n', PARAGRAPH_BREAK)
}

/// Lossy on purpose: chapters are delivered without any exclamation marks.
pub fn replace_exclamations(text: &str) -> String {
    text.replace('!', ".")
}

/// The normalization pipeline, applied in order.
pub const STAGES: [fn(&str) -> String; 8] = [
    unify_line_endings,
    inline_email_header,
    collapse_blank_lines,
    break_indented_lines,
    break_after_sentences,
    collapse_line_break_runs,
    break_remaining_lines,
    replace_exclamations,
];

/// Runs all `STAGES` over a plain-text chapter, producing an HTML body fragment.
pub fn normalize_text(raw: &str) -> String {
    STAGES.iter().fold(raw.to_string(), |text, stage| stage(&text))
}

/// Wraps a normalized body into a minimal HTML document.
pub fn html_shell(title: &str, author: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>{}</title><meta name="author" content="{}"></head><body>{}</body></html>"#,
        encode_text(title),
        encode_double_quoted_attribute(author),
        body
    )
}

/// Builds a display title from a URL slug or link text:
/// `-` becomes a space, `.html` is dropped and every word is capitalized.
pub fn normalize_title(title: &str) -> String {
    title_case(&title.replace('-', " ").replace(".html", ""))
}

fn is_cased(c: char) -> bool {
    c.is_uppercase() || c.is_lowercase()
}

/// Upper-cases letters that follow a non-letter and lower-cases all others.
/// Case state follows the emitted characters, so multi-character mappings
/// ('ß' to "SS", 'ŉ' to "ʼN") are mapped again until every character is stable.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_cased = false;
    let mut pending: Vec<char> = text.chars().rev().collect();
    while let Some(c) = pending.pop() {
        if !is_cased(c) {
            out.push(c);
            previous_cased = false;
            continue;
        }
        let mapped: Vec<char> = if previous_cased {
            c.to_lowercase().collect()
        } else {
            c.to_uppercase().collect()
        };
        if mapped == [c] {
            out.push(c);
            previous_cased = true;
        } else {
            pending.extend(mapped.into_iter().rev());
        }
    }
    out
}

#[test]
fn test_unify_line_endings() {
    assert_eq!("a\nb\nc\n\nd", unify_line_endings("a\r\nb\rc\n\r\nd"));
}

#[test]
fn test_inline_email_header() {
    let text = "Date: Mon, 1 Jan 2018\nFrom: A. Writer <a@example.com>\nSubject: Story\nOnce upon a time\n";
    assert_eq!(
        "Date: Mon, 1 Jan 2018<br>From: A. Writer <a@example.com><br>Subject: Story<br><br><br>Once upon a time\n",
        inline_email_header(text)
    );
}

#[test]
fn test_inline_email_header_only_at_start() {
    let text = "Intro\nDate: x\nFrom: y\nSubject: z\n";
    assert_eq!(text, inline_email_header(text));
}

#[test]
fn test_inline_email_header_rewrites_once() {
    let header = "Date: x\nFrom: y\nSubject: z\n";
    let text = format!("{header}{header}");
    assert_eq!(format!("Date: x<br>From: y<br>Subject: z<br><br><br>{header}"), inline_email_header(&text));
}

#[test]
fn test_collapse_blank_lines() {
    assert_eq!("one<br><br>two", collapse_blank_lines("one  \n \n\n  two"));
}

#[test]
fn test_break_indented_lines() {
    assert_eq!("one<br><br>two", break_indented_lines("one\n    two"));
}

#[test]
fn test_break_after_sentences() {
    assert_eq!("end.<br><br>Next", break_after_sentences("end.\nNext"));
}

#[test]
fn test_collapse_line_break_runs() {
    assert_eq!("wrapped<br><br>line", collapse_line_break_runs("wrapped \nline"));
    assert_eq!("no breaks here", collapse_line_break_runs("no breaks here"));
}

#[test]
fn test_replace_exclamations() {
    assert_eq!("Wow... Yes.", replace_exclamations("Wow!!! Yes!"));
}

#[test]
fn test_normalize_text() {
    let raw = "Date: Sat, 06 May 2017\r\nFrom: A. Writer\r\nSubject: Camp\r\n\r\nIt was hot!\r\nWe swam.\r\n\r\n   Later that day\r\nwe ate";
    assert_eq!(
        "Date: Sat, 06 May 2017<br>From: A. Writer<br>Subject: Camp<br><br><br><br><br>It was hot.<br><br>We swam.<br><br>Later that day<br><br>we ate",
        normalize_text(raw)
    );
}

#[test]
fn test_normalize_text_leaves_no_exclamations_or_newlines() {
    let raw = "Hey!\n\n!!\r\n  Bang! Bang!\rdone!";
    let normalized = normalize_text(raw);
    assert_eq!(0, normalized.matches('!').count());
    assert!(!normalized.contains('\n'));
    assert!(!normalized.contains('\r'));
}

#[test]
fn test_html_shell_escapes_metadata() {
    assert_eq!(
        r#"<!DOCTYPE html><html><head><title>Tom &amp; Jerry</title><meta name="author" content="&quot;T&quot;"></head><body>x<br><br>y</body></html>"#,
        html_shell("Tom & Jerry", "\"T\"", "x<br><br>y")
    );
}

#[test]
fn test_normalize_title() {
    assert_eq!("Multi Part Story", normalize_title("multi-part-story"));
    assert_eq!("Chapter 2", normalize_title("chapter-2.html"));
    assert_eq!("1St Time", normalize_title("1st-time"));
    assert_eq!("O'Neil Ss", normalize_title("o'NEIL ß"));
    assert_eq!("ʼN", normalize_title("ŉ"));
    assert_eq!("Aŉ", normalize_title("aŉ"));
}

#[test]
fn test_normalize_title_is_idempotent() {
    let samples = [
        "multi-part-story",
        "chapter-10.html",
        "a.html.html",
        ".h.htmltml",
        "MiXeD-cAsE_words",
        "already Normal Title",
        "",
        "--",
        "straße-1",
        "ŉ",
        "ǰ-İstanbul-ﬃ",
    ];
    for sample in samples.iter() {
        let once = normalize_title(sample);
        assert_eq!(once, normalize_title(&once), "not idempotent for {:?}", sample);
    }
}
