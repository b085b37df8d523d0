use easy_error::{Error, ResultExt};
use markup5ever::serialize::TraversalScope;
use scraper::ElementRef;
#[cfg(test)]
use scraper::{Html, Selector};
use xml5ever::serialize::{serialize, SerializeOpts};

pub(crate) trait XmlSerializable {
    fn serialize_xml(&self, traversal_scope: TraversalScope) -> Result<String, Error>;

    /// Returns the inner XML of this element.
    fn inner_xml(&self) -> Result<String, Error> {
        self.serialize_xml(TraversalScope::ChildrenOnly(None))
    }
}

impl<'a> XmlSerializable for ElementRef<'a> {
    fn serialize_xml(&self, traversal_scope: TraversalScope) -> Result<String, Error> {
        let opts = SerializeOpts { traversal_scope };
        let mut buf = Vec::new();
        serialize(&mut buf, self, opts).context("Could not serialize element as XML")?;
        Ok(String::from_utf8(buf)
            .context("Serialized XML is not UTF-8")?
            // The serializer does not support XML fragments,
            // we need to remove redundant namespace attributes.
            .replace(r#" xmlns="http://www.w3.org/1999/xhtml""#, ""))
    }
}

#[test]
fn test_inner_xml_closes_void_elements() {
    let doc = Html::parse_document("<html><body><p>One<br>two</p></body></html>");
    let body = doc.select(&Selector::parse("body").unwrap()).next().unwrap();
    assert_eq!("<p>One<br></br>two</p>", body.inner_xml().unwrap());
}
