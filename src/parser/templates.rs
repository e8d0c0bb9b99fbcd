use std::collections::HashSet;

/// One `{{Name|key=value|positional}}` invocation found in wiki markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub params: Vec<Param>,
}

/// A template parameter. Positional parameters are named `1`, `2`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Template {
    /// Value of the last parameter called exactly `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// Find every template invocation in `markup`, nested ones included.
///
/// Order is document order by opening braces: an outer template always comes
/// before the templates nested in its parameters. Unclosed invocations are
/// treated as plain text; templates closed inside them are kept.
pub fn parse_templates(markup: &str) -> Vec<Template> {
    let bytes = markup.as_bytes();
    let links = scan_links(bytes);
    let mut slots: Vec<Option<Template>> = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(end) = skip_opaque(bytes, i) {
            i = end;
            continue;
        }
        if bytes[i..].starts_with(b"{{") {
            stack.push(Frame::new(slots.len(), i + 2));
            slots.push(None);
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(b"}}") {
            if let Some(mut frame) = stack.pop() {
                frame.segments.push((frame.seg_start, i, frame.eq));
                slots[frame.slot] = Some(build(markup, &frame.segments));
                i += 2;
                continue;
            }
        }
        let Some(frame) = stack.last_mut() else {
            i += 1;
            continue;
        };
        if links.opens.contains(&i) {
            frame.link_depth += 1;
            i += 2;
            continue;
        }
        if frame.link_depth > 0 && links.closes.contains(&i) {
            frame.link_depth -= 1;
            i += 2;
            continue;
        }
        if frame.link_depth == 0 {
            match bytes[i] {
                b'|' => {
                    frame.segments.push((frame.seg_start, i, frame.eq));
                    frame.seg_start = i + 1;
                    frame.eq = None;
                }
                b'=' if frame.eq.is_none() => frame.eq = Some(i),
                _ => {}
            }
        }
        i += 1;
    }

    slots.into_iter().flatten().collect()
}

/// `(start, end, first '=')` of one `|`-separated piece.
type Segment = (usize, usize, Option<usize>);

/// An open `{{` whose `}}` has not been seen yet.
struct Frame {
    slot: usize,
    segments: Vec<Segment>,
    seg_start: usize,
    eq: Option<usize>,
    link_depth: usize,
}

impl Frame {
    fn new(slot: usize, seg_start: usize) -> Self {
        Frame {
            slot,
            segments: Vec::new(),
            seg_start,
            eq: None,
            link_depth: 0,
        }
    }
}

/// Positions of `[[` and `]]` that pair up into links.
#[derive(Default)]
struct Links {
    opens: HashSet<usize>,
    closes: HashSet<usize>,
}

/// Pair link brackets against template braces. A link still open when the
/// enclosing template closes, or at the end of input, is plain text.
fn scan_links(bytes: &[u8]) -> Links {
    enum Open {
        Template,
        Link(usize),
    }

    let mut links = Links::default();
    let mut stack: Vec<Open> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if let Some(end) = skip_opaque(bytes, i) {
            i = end;
            continue;
        }
        let rest = &bytes[i..];
        if rest.starts_with(b"{{") {
            stack.push(Open::Template);
            i += 2;
        } else if rest.starts_with(b"[[") {
            stack.push(Open::Link(i));
            i += 2;
        } else if rest.starts_with(b"]]") {
            if let Some(&Open::Link(start)) = stack.last() {
                stack.pop();
                links.opens.insert(start);
                links.closes.insert(i);
                i += 2;
            } else {
                i += 1;
            }
        } else if rest.starts_with(b"}}") {
            while matches!(stack.last(), Some(Open::Link(_))) {
                stack.pop();
            }
            if stack.pop().is_some() {
                i += 2;
            } else {
                i += 1;
            }
        } else {
            i += 1;
        }
    }

    links
}

fn build(src: &str, segments: &[Segment]) -> Template {
    let (start, end, _) = segments[0];
    let name = src[start..end].trim().to_string();

    let mut positional = 0;
    let params = segments[1..]
        .iter()
        .map(|&(start, end, eq)| match eq {
            Some(eq) => Param {
                name: src[start..eq].trim().to_string(),
                value: src[eq + 1..end].trim().to_string(),
            },
            None => {
                positional += 1;
                Param {
                    name: positional.to_string(),
                    value: src[start..end].trim().to_string(),
                }
            }
        })
        .collect();

    Template { name, params }
}

/// Regions whose content never contains template structure: HTML comments and
/// `{{{argument}}}` placeholders. Returns the index past the region.
fn skip_opaque(bytes: &[u8], i: usize) -> Option<usize> {
    if bytes[i..].starts_with(b"<!--") {
        return Some(find(bytes, i + 4, b"-->").map_or(bytes.len(), |p| p + 3));
    }
    if bytes[i..].starts_with(b"{{{") {
        return find(bytes, i + 3, b"}}}").map(|p| p + 3);
    }
    None
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
