use ego_tree::NodeId;
use html5ever::tree_builder::{NodeOrText, TreeSink};
use scraper::{Html, Node};
#[cfg(test)]
use scraper::Selector;

/// Whether `name` can be written as an XML element or attribute name.
/// Prefixed names are rejected as well, there is nothing to declare their namespace.
pub(crate) fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start_char(c: char) -> bool {
    match c {
        'A'..='Z' | '_' | 'a'..='z' => true,
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' => true,
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}' => true,
        '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' => true,
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}' => true,
        _ => false,
    }
}

fn is_name_char(c: char) -> bool {
    match c {
        '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}' => true,
        _ => is_name_start_char(c),
    }
}

/// Replaces an element by its children,
/// essentially removing the element’s opening and closing tags.
pub(crate) fn dissolve_element(doc: &mut Html, node_id: NodeId) {
    let child_ids: Vec<NodeId> = match doc.tree.get(node_id) {
        Some(node) => node.children().map(|child| child.id()).collect(),
        None => return,
    };

    for id in child_ids {
        doc.append_before_sibling(&node_id, NodeOrText::AppendNode(id));
    }

    doc.remove_from_parent(&node_id);
}

/// Makes a parsed page serializable as XML. Elements with names like
/// `writer@example.com` (an e-mail address in angle brackets) are dissolved
/// and attributes with such names are dropped.
pub(crate) fn strip_invalid_xml_names(doc: &mut Html) {
    let mut invalid = Vec::new();
    let mut with_attrs = Vec::new();
    for node in doc.tree.root().descendants() {
        if let Node::Element(ref elem) = *node.value() {
            if !is_xml_name(elem.name()) {
                invalid.push(node.id());
            }
            if elem.attrs().any(|(name, _)| !is_xml_name(name)) {
                with_attrs.push(node.id());
            }
        }
    }

    for id in with_attrs {
        if let Some(mut node) = doc.tree.get_mut(id) {
            if let Node::Element(ref mut elem) = *node.value() {
                elem.attrs.retain(|name, _| is_xml_name(&name.local));
            }
        }
    }
    for id in invalid {
        dissolve_element(doc, id);
    }
}

#[test]
fn test_is_xml_name() {
    assert!(is_xml_name("p"));
    assert!(is_xml_name("data-x.y_z"));
    assert!(is_xml_name("élan"));
    assert!(!is_xml_name(""));
    assert!(!is_xml_name("writer@example.com"));
    assert!(!is_xml_name("1st"));
    assert!(!is_xml_name("o:p"));
}

#[test]
fn test_dissolve_element() {
    let mut doc = Html::parse_fragment("<div><p class='nop'><em>Foo</em></p><p class='figure'><em>Empha<strong title='secret'>sis</strong></em> <strong>Bold</strong></p> <a href='#'>After</a></div>");
    let figure = doc.select(&Selector::parse(".figure").unwrap()).next().expect("Figure not found.").id();

    dissolve_element(&mut doc, figure);

    assert_eq!(
        Html::parse_fragment("<div><p class='nop'><em>Foo</em></p><em>Empha<strong title='secret'>sis</strong></em> <strong>Bold</strong> <a href='#'>After</a></div>"),
        Html::parse_fragment(&doc.root_element().inner_html()),
    );
}

#[test]
fn test_strip_invalid_xml_names() {
    let mut doc = Html::parse_fragment("<p>From: A. Writer <writer@example.com><br>It was <em a@b='1' class='x'>hot</em>.</p>");

    strip_invalid_xml_names(&mut doc);

    assert_eq!(
        Html::parse_fragment("<p>From: A. Writer <br>It was <em class='x'>hot</em>.</p>"),
        Html::parse_fragment(&doc.root_element().inner_html()),
    );
}
