//! XML callback branch of the parser pipeline.
//!
//! Callbacks register against absolute element paths (`/urlset/url/loc`)
//! and run over a `quick-xml` event walk of the response bytes. Paths are
//! matched on local names, case-sensitively; text is the character data
//! directly inside the matched element.

use log::warn;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::sync::Arc;
use url::Url;

use super::LinkSink;

/// Callback invoked for each element matching a registered path.
pub type XmlCallback = Arc<dyn Fn(&XmlElement<'_>) + Send + Sync>;

/// A registered `(path, callback)` pair.
pub struct XmlHandler {
    pub path: String,
    pub callback: XmlCallback,
}

/// Handle passed to XML callbacks.
pub struct XmlElement<'a> {
    /// The registered path that matched.
    pub path: &'a str,
    /// Character data directly inside the element, trimmed.
    pub text: String,
    /// Attributes captured at the opening tag.
    pub attributes: Vec<(String, String)>,
    base: &'a Url,
    sink: &'a LinkSink,
}

impl XmlElement<'_> {
    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Queue an href for discovery, resolved against the response URL.
    pub fn visit(&self, href: &str) {
        if let Ok(url) = self.base.join(href) {
            self.sink.push(url);
        }
    }
}

struct Frame {
    depth: usize,
    handler: usize,
    text: String,
    attributes: Vec<(String, String)>,
}

/// Run every registered XML handler over the document.
pub fn run_xml_handlers(xml: &str, base: &Url, handlers: &[Arc<XmlHandler>], sink: &LinkSink) {
    if handlers.is_empty() {
        return;
    }

    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(local_name(e.name().as_ref()));
                let path = format!("/{}", stack.join("/"));
                for (idx, handler) in handlers.iter().enumerate() {
                    if handler.path == path {
                        frames.push(Frame {
                            depth: stack.len(),
                            handler: idx,
                            text: String::new(),
                            attributes: attributes_of(&e),
                        });
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let path = format!(
                    "/{}{}{}",
                    stack.join("/"),
                    if stack.is_empty() { "" } else { "/" },
                    local_name(e.name().as_ref())
                );
                for handler in handlers {
                    if handler.path == path {
                        let element = XmlElement {
                            path: &handler.path,
                            text: String::new(),
                            attributes: attributes_of(&e),
                            base,
                            sink,
                        };
                        (handler.callback)(&element);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Ok(text) = t.unescape() {
                    append_text(&mut frames, stack.len(), &text);
                }
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t);
                append_text(&mut frames, stack.len(), &text);
            }
            Ok(Event::End(_)) => {
                while frames.last().is_some_and(|f| f.depth == stack.len()) {
                    let frame = frames.pop().expect("frame checked above");
                    let handler = &handlers[frame.handler];
                    let element = XmlElement {
                        path: &handler.path,
                        text: frame.text.trim().to_string(),
                        attributes: frame.attributes,
                        base,
                        sink,
                    };
                    (handler.callback)(&element);
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("xml parse stopped at position {}: {e}", reader.buffer_position());
                break;
            }
            Ok(_) => {}
        }
    }
}

/// Collect the trimmed text of every element at the given path. Used for
/// sitemap `<loc>` extraction.
#[must_use]
pub fn collect_path_text(xml: &str, path: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut collected = Vec::new();
    // (depth, text) of the currently open matching element.
    let mut buffer: Option<(usize, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(local_name(e.name().as_ref()));
                if format!("/{}", stack.join("/")) == path {
                    buffer = Some((stack.len(), String::new()));
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some((depth, buf)), Ok(text)) = (buffer.as_mut(), t.unescape())
                    && *depth == stack.len()
                {
                    buf.push_str(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some((depth, buf)) = buffer.as_mut()
                    && *depth == stack.len()
                {
                    buf.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(_)) => {
                if buffer.as_ref().is_some_and(|(depth, _)| *depth == stack.len())
                    && let Some((_, buf)) = buffer.take()
                {
                    let trimmed = buf.trim().to_string();
                    if !trimmed.is_empty() {
                        collected.push(trimmed);
                    }
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("xml parse stopped at position {}: {e}", reader.buffer_position());
                break;
            }
            Ok(_) => {}
        }
    }

    collected
}

/// Append character data to the innermost active frame, but only when it
/// sits directly inside the matched element.
fn append_text(frames: &mut [Frame], depth: usize, text: &str) {
    if let Some(frame) = frames.last_mut()
        && frame.depth == depth
    {
        frame.text.push_str(text);
    }
}

fn local_name(qname: &[u8]) -> String {
    let name = String::from_utf8_lossy(qname);
    name.rsplit(':').next().unwrap_or(&name).to_string()
}

fn attributes_of(e: &quick_xml::events::BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|a| {
            (
                String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                a.unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_default(),
            )
        })
        .collect()
}
