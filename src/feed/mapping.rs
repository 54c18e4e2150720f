//! Tag mappings that tell the parser which elements carry which entry fields.
//!
//! Elements are identified by namespace URI and local name, so a feed that
//! binds `media:` (or no prefix at all) to an unexpected URI does not match.

use quick_xml::name::ResolveResult;

use super::types::{FeedFormat, NS_ATOM, NS_MEDIA, NS_YOUTUBE};

/// A namespace-qualified element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XmlName {
    /// Namespace URI, or `None` for elements outside any namespace.
    pub namespace: Option<&'static str>,
    pub local: &'static str,
}

impl XmlName {
    pub const fn new(namespace: &'static str, local: &'static str) -> Self {
        Self {
            namespace: Some(namespace),
            local,
        }
    }

    pub const fn unqualified(local: &'static str) -> Self {
        Self {
            namespace: None,
            local,
        }
    }

    /// Check a resolved element name against this one.
    pub fn matches(&self, ns: &ResolveResult<'_>, local: &[u8]) -> bool {
        if local != self.local.as_bytes() {
            return false;
        }
        match (self.namespace, ns) {
            (None, ResolveResult::Unbound) => true,
            (Some(uri), ResolveResult::Bound(bound)) => bound.as_ref() == uri.as_bytes(),
            _ => false,
        }
    }
}

/// Entry field a rule fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Title,
    Link,
    Published,
    /// Only used when no `Published` value was found.
    Updated,
    Description,
    Thumbnail,
}

/// Where the value of a field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Text (and CDATA) content of the element.
    Text,
    /// Value of the named attribute.
    Attribute(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: XmlName,
    pub field: Field,
    pub capture: Capture,
}

impl FieldRule {
    pub const fn text(name: XmlName, field: Field) -> Self {
        Self {
            name,
            field,
            capture: Capture::Text,
        }
    }

    pub const fn attribute(name: XmlName, field: Field, attribute: &'static str) -> Self {
        Self {
            name,
            field,
            capture: Capture::Attribute(attribute),
        }
    }
}

/// Element layout of one kind of feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMapping {
    /// Element wrapping one entry (`<entry>` / `<item>`).
    pub entry: XmlName,
    /// Nested metadata block inside an entry, if the feed has one.
    pub media_group: Option<XmlName>,
    /// Rules applied to direct children of the entry.
    pub entry_fields: Vec<FieldRule>,
    /// Rules applied to children of the media group.
    pub group_fields: Vec<FieldRule>,
}

impl TagMapping {
    /// YouTube channel feed (`/feeds/videos.xml?channel_id=...`).
    pub fn youtube() -> Self {
        Self {
            entry: XmlName::new(NS_ATOM, "entry"),
            media_group: Some(XmlName::new(NS_MEDIA, "group")),
            entry_fields: vec![
                FieldRule::text(XmlName::new(NS_YOUTUBE, "videoId"), Field::Id),
                FieldRule::text(XmlName::new(NS_ATOM, "title"), Field::Title),
                FieldRule::text(XmlName::new(NS_ATOM, "published"), Field::Published),
                FieldRule::text(XmlName::new(NS_ATOM, "updated"), Field::Updated),
                FieldRule::attribute(XmlName::new(NS_ATOM, "link"), Field::Link, "href"),
            ],
            group_fields: vec![
                FieldRule::text(XmlName::new(NS_MEDIA, "description"), Field::Description),
                FieldRule::attribute(
                    XmlName::new(NS_MEDIA, "thumbnail"),
                    Field::Thumbnail,
                    "url",
                ),
            ],
        }
    }

    /// Plain Atom 1.0.
    pub fn atom() -> Self {
        Self {
            entry: XmlName::new(NS_ATOM, "entry"),
            media_group: None,
            entry_fields: vec![
                FieldRule::text(XmlName::new(NS_ATOM, "id"), Field::Id),
                FieldRule::text(XmlName::new(NS_ATOM, "title"), Field::Title),
                FieldRule::text(XmlName::new(NS_ATOM, "published"), Field::Published),
                FieldRule::text(XmlName::new(NS_ATOM, "updated"), Field::Updated),
                FieldRule::attribute(XmlName::new(NS_ATOM, "link"), Field::Link, "href"),
                FieldRule::text(XmlName::new(NS_ATOM, "summary"), Field::Description),
                FieldRule::attribute(
                    XmlName::new(NS_MEDIA, "thumbnail"),
                    Field::Thumbnail,
                    "url",
                ),
            ],
            group_fields: Vec::new(),
        }
    }

    /// RSS 2.0.
    pub fn rss() -> Self {
        Self {
            entry: XmlName::unqualified("item"),
            media_group: None,
            entry_fields: vec![
                FieldRule::text(XmlName::unqualified("guid"), Field::Id),
                FieldRule::text(XmlName::unqualified("title"), Field::Title),
                FieldRule::text(XmlName::unqualified("link"), Field::Link),
                FieldRule::text(XmlName::unqualified("pubDate"), Field::Published),
                FieldRule::text(XmlName::unqualified("description"), Field::Description),
                FieldRule::attribute(
                    XmlName::new(NS_MEDIA, "thumbnail"),
                    Field::Thumbnail,
                    "url",
                ),
                FieldRule::attribute(XmlName::unqualified("enclosure"), Field::Thumbnail, "url"),
            ],
            group_fields: Vec::new(),
        }
    }

    /// Find the rule for an element inside an entry (`in_group == false`)
    /// or inside its media group.
    pub fn rule_for(
        &self,
        in_group: bool,
        ns: &ResolveResult<'_>,
        local: &[u8],
    ) -> Option<FieldRule> {
        let rules = if in_group {
            &self.group_fields
        } else {
            &self.entry_fields
        };
        rules
            .iter()
            .find(|rule| rule.name.matches(ns, local))
            .copied()
    }
}

impl From<FeedFormat> for TagMapping {
    fn from(format: FeedFormat) -> Self {
        match format {
            FeedFormat::YoutubeAtom => TagMapping::youtube(),
            FeedFormat::Atom => TagMapping::atom(),
            FeedFormat::Rss => TagMapping::rss(),
        }
    }
}
