use ego_tree::iter::Edge;
use html_escape::{encode_double_quoted_attribute, encode_text};
use markup5ever::QualName;
use scraper::node::Element;
use scraper::{Html, Node};

const INDENT: &str = " ";

/// Parses a complete HTML document, tolerating whatever markup the site serves.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

fn is_void(name: &QualName) -> bool {
    match name.local {
        local_name!("area")
        | local_name!("base")
        | local_name!("br")
        | local_name!("col")
        | local_name!("embed")
        | local_name!("hr")
        | local_name!("img")
        | local_name!("input")
        | local_name!("link")
        | local_name!("meta")
        | local_name!("param")
        | local_name!("source")
        | local_name!("track")
        | local_name!("wbr") => true,
        _ => false,
    }
}

/// Elements whose text must be written out untouched.
fn is_raw_text(name: &QualName) -> bool {
    match name.local {
        local_name!("script") | local_name!("style") | local_name!("pre") | local_name!("textarea") => true,
        _ => false,
    }
}

fn open_tag(element: &Element) -> String {
    let mut tag = format!("<{}", element.name());
    // Attribute order is not preserved by the parser; sort for stable output.
    let mut attrs: Vec<(&str, &str)> = element.attrs().collect();
    attrs.sort();
    for (name, value) in attrs {
        tag.push_str(&format!(" {}=\"{}\"", name, encode_double_quoted_attribute(value)));
    }
    tag.push('>');
    tag
}

fn push_line(out: &mut String, depth: usize, line: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(line);
    out.push('\n');
}

/// Re-serializes a parsed document with one node per line, indented by depth.
///
/// Whitespace-only text is dropped and other text is trimmed, except inside
/// raw-text elements. A `<!DOCTYPE html>` line is always emitted first.
pub fn prettify(doc: &Html) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    // Nesting level inside raw-text elements.
    let mut raw = 0usize;

    let has_doctype = doc
        .tree
        .root()
        .children()
        .any(|child| matches!(child.value(), Node::Doctype(_)));
    if !has_doctype {
        push_line(&mut out, 0, "<!DOCTYPE html>");
    }

    for edge in doc.tree.root().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Doctype(doctype) => {
                    push_line(&mut out, depth, &format!("<!DOCTYPE {}>", doctype.name()));
                }
                Node::Comment(comment) => {
                    push_line(&mut out, depth, &format!("<!--{}-->", &**comment));
                }
                Node::Text(text) => {
                    if raw > 0 {
                        push_line(&mut out, depth, &**text);
                    } else {
                        let text = text.trim();
                        if !text.is_empty() {
                            push_line(&mut out, depth, &encode_text(text));
                        }
                    }
                }
                Node::Element(element) => {
                    push_line(&mut out, depth, &open_tag(element));
                    if !is_void(&element.name) {
                        depth += 1;
                    }
                    if is_raw_text(&element.name) {
                        raw += 1;
                    }
                }
                _ => {
                    // Document root, fragments and processing instructions produce no output.
                }
            },
            Edge::Close(node) => {
                if let Node::Element(element) = node.value() {
                    if is_raw_text(&element.name) {
                        raw -= 1;
                    }
                    if !is_void(&element.name) {
                        depth -= 1;
                        push_line(&mut out, depth, &format!("</{}>", element.name()));
                    }
                }
            }
        }
    }
    out
}

#[test]
fn test_prettify_indents_and_closes() {
    let doc = parse("<!DOCTYPE html><html><head><title>T</title></head><body><p>One<br>two</p></body></html>");
    assert_eq!(
        "<!DOCTYPE html>\n<html>\n <head>\n  <title>\n   T\n  </title>\n </head>\n <body>\n  <p>\n   One\n   <br>\n   two\n  </p>\n </body>\n</html>\n",
        prettify(&doc)
    );
}

#[test]
fn test_prettify_adds_missing_doctype() {
    let doc = parse("<html><body>x</body></html>");
    assert!(prettify(&doc).starts_with("<!DOCTYPE html>\n<html>"));
}

#[test]
fn test_prettify_escapes_text_and_attributes() {
    let doc = parse(r#"<p title="a &quot;b&quot;">x &lt; y &amp; z</p>"#);
    let pretty = prettify(&doc);
    assert!(pretty.contains(r#"<p title="a &quot;b&quot;">"#));
    assert!(pretty.contains("x &lt; y &amp; z"));
}

#[test]
fn test_prettify_is_stable() {
    let once = prettify(&parse("<div><p>A</p>\n\n<p>B <em>C</em></p></div>"));
    let twice = prettify(&parse(&once));
    assert_eq!(once, twice);
}
