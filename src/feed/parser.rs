use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted before the document is rejected.
const MAX_DEPTH: usize = 64;

/// The document could not be read as an RSS channel.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Document has no <channel> element")]
    MissingChannel,

    #[error("XML nesting depth exceeds maximum of {0} levels")]
    TooDeep(usize),

    /// Input ended while elements were still open
    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(String),
}

/// A decoded RSS document. Only the first `<channel>` is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssFeed {
    pub channel: Channel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Items in document order
    pub items: Vec<RawFeedItem>,
}

/// One `<item>` as it appeared on the wire, with HTML entities decoded.
///
/// `description` and `pub_date` are `None` when the element was absent, and
/// `Some("")` when it was present but empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub pub_date: Option<String>,
}

#[derive(Clone, Copy)]
enum ChannelField {
    Title,
    Link,
    Description,
}

#[derive(Clone, Copy)]
enum ItemField {
    Title,
    Link,
    Description,
    PubDate,
}

/// Where the text currently being read belongs.
#[derive(Clone, Copy)]
enum Target {
    Channel(ChannelField),
    Item(ItemField),
}

/// Parses an RSS 2.0 document.
///
/// Element names are matched exactly, so namespaced siblings such as
/// `<atom:link>` do not clobber `<link>`. Text and CDATA sections inside a
/// field are concatenated. Titles and descriptions are HTML-entity-decoded
/// after XML unescaping, which undoes the double encoding (`&amp;amp;`) many
/// publishers emit.
pub fn parse_feed(bytes: &[u8]) -> Result<RssFeed, DecodeError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut channel: Option<Channel> = None;
    let mut channel_done = false;
    let mut item: Option<RawFeedItem> = None;
    let mut target: Option<Target> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if path.len() >= MAX_DEPTH {
                    return Err(DecodeError::TooDeep(MAX_DEPTH));
                }
                if !channel_done {
                    open_element(&name, &path, &mut channel, &mut item, &mut target);
                }
                path.push(name);
            }
            Event::Empty(e) => {
                // <description/> still counts as "present"
                if !channel_done {
                    let name = e.name().as_ref().to_vec();
                    open_element(&name, &path, &mut channel, &mut item, &mut target);
                    target = None;
                }
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                target = None;
                if channel_done {
                    // fall through to the next event
                } else if name == b"item" && path.len() == 2 {
                    if let (Some(ch), Some(done)) = (channel.as_mut(), item.take()) {
                        ch.items.push(done);
                    }
                } else if name == b"channel" && path.len() == 1 {
                    channel_done = true;
                }
            }
            Event::Text(e) => {
                if let Some(t) = target {
                    let text = e.unescape()?;
                    append_text(t, &text, &mut channel, &mut item);
                }
            }
            Event::CData(e) => {
                if let Some(t) = target {
                    let text = String::from_utf8_lossy(&e);
                    append_text(t, &text, &mut channel, &mut item);
                }
            }
            Event::Eof => {
                if let Some(open) = path.last() {
                    return Err(DecodeError::UnexpectedEof(
                        String::from_utf8_lossy(open).into_owned(),
                    ));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    let mut channel = channel.ok_or(DecodeError::MissingChannel)?;
    decode_entities(&mut channel);
    Ok(RssFeed { channel })
}

/// Tracks entry into `<channel>`, `<item>` and the fields we keep.
///
/// `path` holds the ancestors of `name`; the root element's own name is not
/// checked, matching how lenient readers treat `<rss>` vs `<rdf:RDF>`.
fn open_element(
    name: &[u8],
    path: &[Vec<u8>],
    channel: &mut Option<Channel>,
    item: &mut Option<RawFeedItem>,
    target: &mut Option<Target>,
) {
    let parent = path.last().map(Vec::as_slice);
    match (path.len(), parent, name) {
        (1, _, b"channel") => {
            channel.get_or_insert_with(Channel::default);
        }
        (2, Some(b"channel"), b"item") if channel.is_some() => {
            *item = Some(RawFeedItem::default());
        }
        (2, Some(b"channel"), field) if channel.is_some() => {
            *target = match field {
                b"title" => Some(Target::Channel(ChannelField::Title)),
                b"link" => Some(Target::Channel(ChannelField::Link)),
                b"description" => Some(Target::Channel(ChannelField::Description)),
                _ => None,
            };
        }
        (3, Some(b"item"), field) => {
            let Some(current) = item.as_mut() else {
                return;
            };
            *target = match field {
                b"title" => Some(Target::Item(ItemField::Title)),
                b"link" => Some(Target::Item(ItemField::Link)),
                b"description" => {
                    current.description.get_or_insert_with(String::new);
                    Some(Target::Item(ItemField::Description))
                }
                b"pubDate" => {
                    current.pub_date.get_or_insert_with(String::new);
                    Some(Target::Item(ItemField::PubDate))
                }
                _ => None,
            };
        }
        _ => {}
    }
}

fn append_text(
    target: Target,
    text: &str,
    channel: &mut Option<Channel>,
    item: &mut Option<RawFeedItem>,
) {
    let slot = match target {
        Target::Channel(field) => {
            let Some(ch) = channel.as_mut() else { return };
            match field {
                ChannelField::Title => &mut ch.title,
                ChannelField::Link => &mut ch.link,
                ChannelField::Description => &mut ch.description,
            }
        }
        Target::Item(field) => {
            let Some(it) = item.as_mut() else { return };
            match field {
                ItemField::Title => &mut it.title,
                ItemField::Link => &mut it.link,
                ItemField::Description => it.description.get_or_insert_with(String::new),
                ItemField::PubDate => it.pub_date.get_or_insert_with(String::new),
            }
        }
    };
    slot.push_str(text);
}

fn decode_entities(channel: &mut Channel) {
    channel.title = unescape_html(&channel.title);
    channel.description = unescape_html(&channel.description);
    for item in &mut channel.items {
        item.title = unescape_html(&item.title);
        if let Some(description) = item.description.as_mut() {
            *description = unescape_html(description);
        }
    }
}

fn unescape_html(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}
