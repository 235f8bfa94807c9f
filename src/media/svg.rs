//! SVG sanitization
//!
//! Uploaded SVG is checked against known script-injection signatures and then
//! rebuilt from an allow-list of elements and attributes. Anything not on the
//! list is dropped, never escaped.

use std::sync::LazyLock;

use log::warn;
use regex::Regex;

use crate::error::{SvgError, UnsafePattern};

const ALLOWED_TAGS: &[&str] = &[
    "svg",
    "g",
    "path",
    "rect",
    "circle",
    "ellipse",
    "line",
    "polyline",
    "polygon",
    "text",
    "tspan",
    "defs",
    "linearGradient",
    "radialGradient",
    "stop",
    "pattern",
    "clipPath",
    "mask",
    "use",
    "image",
    "title",
    "desc",
    "metadata",
];

const ALLOWED_ATTRIBUTES: &[&str] = &[
    // general
    "id",
    "class",
    "style",
    "transform",
    "version",
    // geometry
    "x",
    "y",
    "x1",
    "y1",
    "x2",
    "y2",
    "cx",
    "cy",
    "r",
    "rx",
    "ry",
    "fx",
    "fy",
    "dx",
    "dy",
    "width",
    "height",
    "d",
    "points",
    "viewBox",
    "preserveAspectRatio",
    // presentation
    "fill",
    "fill-opacity",
    "fill-rule",
    "stroke",
    "stroke-width",
    "stroke-opacity",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-dasharray",
    "stroke-dashoffset",
    "stroke-miterlimit",
    "opacity",
    "color",
    "clip-path",
    "clip-rule",
    "mask",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "text-anchor",
    "dominant-baseline",
    // gradients, patterns, clipping
    "offset",
    "stop-color",
    "stop-opacity",
    "gradientUnits",
    "gradientTransform",
    "spreadMethod",
    "patternUnits",
    "patternContentUnits",
    "patternTransform",
    "clipPathUnits",
    "maskUnits",
    "maskContentUnits",
    "xmlns",
];

/// Elements whose whole subtree, text included, is discarded.
const OPAQUE_TAGS: &[&str] = &["script", "style", "foreignObject", "iframe"];

/// Open elements tracked at once; deeper elements are dropped, text kept.
pub const MAX_DEPTH: usize = 256;

const LINK_TAGS: &[&str] = &["use", "image"];
const LINK_ATTRIBUTES: &[&str] = &["href", "xlink:href"];
const LINK_SCHEMES: &[&str] = &["http://", "https://", "data:"];

static SCRIPT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script").expect("valid regex"));
static EVENT_HANDLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on\w+\s*=").expect("valid regex"));
static JAVASCRIPT_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));
static SCRIPT_DATA_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)data:.*script").expect("valid regex"));

static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^<([A-Za-z][\w:.-]*)((?:\s+[^\s=/>"'<]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#,
    )
    .expect("valid regex")
});
static END_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^</([A-Za-z][\w:.-]*)\s*>").expect("valid regex"));
static OPAQUE_END_TAGS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    OPAQUE_TAGS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?i)</{tag}\s*>")).expect("valid regex"))
        .collect()
});
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>"'<]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid regex")
});

/// First dangerous signature found in `content`, if any.
pub fn find_unsafe_pattern(content: &str) -> Option<UnsafePattern> {
    if SCRIPT_TAG.is_match(content) {
        Some(UnsafePattern::ScriptTag)
    } else if EVENT_HANDLER.is_match(content) {
        Some(UnsafePattern::EventHandler)
    } else if JAVASCRIPT_SCHEME.is_match(content) {
        Some(UnsafePattern::JavascriptScheme)
    } else if SCRIPT_DATA_URL.is_match(content) {
        Some(UnsafePattern::ScriptDataUrl)
    } else {
        None
    }
}

pub fn is_svg_safe(content: &str) -> bool {
    match find_unsafe_pattern(content) {
        Some(pattern) => {
            warn!("SVG rejected: contains {pattern}");
            false
        }
        None => true,
    }
}

/// Rejects markup that is not SVG-like or carries a script signature, then
/// returns the allow-listed rendition of what is left.
pub fn validate_and_sanitize(content: &str) -> Result<String, SvgError> {
    if !content.trim_start().starts_with('<') {
        return Err(SvgError::NotMarkup);
    }
    if let Some(pattern) = find_unsafe_pattern(content) {
        warn!("SVG rejected: contains {pattern}");
        return Err(SvgError::Unsafe(pattern));
    }
    Ok(sanitize_svg(content))
}

/// Same as `validate_and_sanitize` for raw upload bytes.
pub fn validate_and_sanitize_bytes(content: &[u8]) -> Result<String, SvgError> {
    let text = std::str::from_utf8(content).map_err(|_| SvgError::NotUtf8)?;
    validate_and_sanitize(text)
}

struct OpenElement<'a> {
    name: &'a str,
    kept: bool,
}

/// Rebuilds `content` keeping only allow-listed elements and attributes.
///
/// Comments, doctypes, CDATA and processing instructions are removed. Text
/// inside a dropped element survives unless the element is opaque (script,
/// style, foreignObject). Unclosed kept elements are closed at the end so the
/// output is always balanced. Nesting beyond `MAX_DEPTH` is flattened.
pub fn sanitize_svg(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut stack: Vec<OpenElement<'_>> = Vec::new();
    let mut rest = content;

    while let Some(lt) = rest.find('<') {
        push_text(&mut out, &rest[..lt]);
        rest = &rest[lt..];

        if let Some(after) = skip_markup_declaration(rest) {
            rest = after;
        } else if let Some(caps) = END_TAG.captures(rest) {
            let whole = caps.get(0).map_or(0, |m| m.end());
            let name = caps.get(1).map_or("", |m| m.as_str());
            close_element(&mut out, &mut stack, name);
            rest = &rest[whole..];
        } else if let Some(caps) = START_TAG.captures(rest) {
            let whole = caps.get(0).map_or(0, |m| m.end());
            let name = caps.get(1).map_or("", |m| m.as_str());
            let attributes = caps.get(2).map_or("", |m| m.as_str());
            let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
            rest = &rest[whole..];

            if let Some(end_tag) = opaque_end_tag(name) {
                if !self_closing {
                    rest = match end_tag.find(rest) {
                        Some(found) => &rest[found.end()..],
                        None => "",
                    };
                }
                continue;
            }

            if !self_closing && stack.len() >= MAX_DEPTH {
                continue;
            }

            let kept = ALLOWED_TAGS.contains(&name);
            if kept {
                out.push('<');
                out.push_str(name);
                push_attributes(&mut out, name, attributes);
                out.push_str(if self_closing { "/>" } else { ">" });
            }
            if !self_closing {
                stack.push(OpenElement { name, kept });
            }
        } else {
            out.push_str("&lt;");
            rest = &rest[1..];
        }
    }
    push_text(&mut out, rest);

    while let Some(open) = stack.pop() {
        if open.kept {
            push_close(&mut out, open.name);
        }
    }
    out
}

/// Skips `<!-- -->`, `<![CDATA[ ]]>`, `<!DOCTYPE >` and `<? ?>`.
fn skip_markup_declaration(input: &str) -> Option<&str> {
    let (terminator, start) = if input.starts_with("<!--") {
        ("-->", 4)
    } else if input.starts_with("<![CDATA[") {
        ("]]>", 9)
    } else if input.starts_with("<!") {
        (">", 2)
    } else if input.starts_with("<?") {
        ("?>", 2)
    } else {
        return None;
    };
    Some(match input[start..].find(terminator) {
        Some(idx) => &input[start + idx + terminator.len()..],
        None => "",
    })
}

/// End-tag pattern for `name` when it is an opaque element.
fn opaque_end_tag(name: &str) -> Option<&'static Regex> {
    OPAQUE_TAGS
        .iter()
        .position(|tag| tag.eq_ignore_ascii_case(name))
        .and_then(|index| OPAQUE_END_TAGS.get(index))
}

fn close_element<'a>(out: &mut String, stack: &mut Vec<OpenElement<'a>>, name: &str) {
    let Some(position) = stack.iter().rposition(|open| open.name == name) else {
        return;
    };
    while stack.len() > position {
        if let Some(open) = stack.pop() {
            if open.kept {
                push_close(out, open.name);
            }
        }
    }
}

fn push_close(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_text(out: &mut String, text: &str) {
    out.push_str(&text.replace('>', "&gt;"));
}

fn push_attributes(out: &mut String, tag: &str, attributes: &str) {
    for caps in ATTRIBUTE.captures_iter(attributes) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        let Some(value) = caps.get(2).or(caps.get(3)).or(caps.get(4)) else {
            continue;
        };
        let value = value.as_str();

        if !is_allowed_attribute(tag, name, value) {
            continue;
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;").replace('<', "&lt;"));
        out.push('"');
    }
}

fn is_allowed_attribute(tag: &str, name: &str, value: &str) -> bool {
    if LINK_ATTRIBUTES.contains(&name) {
        return LINK_TAGS.contains(&tag) && is_allowed_link(value);
    }
    ALLOWED_ATTRIBUTES.contains(&name) || name.starts_with("xmlns:")
}

/// Absolute http(s) and data URLs, or a same-document fragment.
fn is_allowed_link(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    value.starts_with('#') || LINK_SCHEMES.iter().any(|scheme| value.starts_with(scheme))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn minimal_svg_round_trips() {
        let svg = r#"<svg><rect width="10" height="10"/></svg>"#;
        assert!(is_svg_safe(svg));
        assert_eq!(validate_and_sanitize(svg).unwrap(), svg);
    }

    #[test]
    fn rejects_script_tags() {
        let svg = r#"<svg><SCRIPT>alert(1)</SCRIPT></svg>"#;
        assert!(!is_svg_safe(svg));
        assert_eq!(
            validate_and_sanitize(svg),
            Err(SvgError::Unsafe(UnsafePattern::ScriptTag))
        );
    }

    #[test]
    fn rejects_event_handlers() {
        let svg = r#"<svg onload = "alert(1)"><rect/></svg>"#;
        assert!(!is_svg_safe(svg));
        assert_eq!(
            find_unsafe_pattern(svg),
            Some(UnsafePattern::EventHandler)
        );
    }

    #[test]
    fn rejects_javascript_urls() {
        let svg = r#"<svg><use href="JavaScript:alert(1)"/></svg>"#;
        assert!(!is_svg_safe(svg));
    }

    #[test]
    fn rejects_data_urls_carrying_script() {
        let svg = r#"<svg><image href="data:text/html,<b>script</b>"/></svg>"#;
        assert_eq!(
            find_unsafe_pattern(svg),
            Some(UnsafePattern::ScriptDataUrl)
        );
    }

    #[test]
    fn rejects_non_markup() {
        assert_eq!(
            validate_and_sanitize("hello <svg/>"),
            Err(SvgError::NotMarkup)
        );
        assert!(validate_and_sanitize("   \n<svg/>").is_ok());
        assert_eq!(
            validate_and_sanitize_bytes(&[0x3c, 0xff, 0xfe]),
            Err(SvgError::NotUtf8)
        );
    }

    #[test]
    fn drops_unknown_elements_but_keeps_their_text() {
        let svg = r#"<svg><a><text x="1">hi</text></a><blink>there</blink></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r#"<svg><text x="1">hi</text>there</svg>"#
        );
    }

    #[test]
    fn drops_opaque_elements_with_their_content() {
        let svg = r#"<svg><style>rect { fill: red }</style><foreignObject><div>x</div></foreignObject><g/></svg>"#;
        assert_eq!(sanitize_svg(svg), "<svg><g/></svg>");
    }

    #[test]
    fn drops_unknown_attributes() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" data-x="1"><path d='M0 0' filter="url(#f)"/></svg>"#;
        assert_eq!(
            sanitize_svg(svg),
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"><path d="M0 0"/></svg>"#
        );
    }

    #[test]
    fn links_only_on_use_and_image_with_safe_schemes() {
        let svg = concat!(
            r##"<svg><use href="#icon"/><image xlink:href="https://cdn.test/a.png"/>"##,
            r#"<image href="ftp://host/a.png"/><rect href="https://x.test/"/></svg>"#,
        );
        assert_eq!(
            sanitize_svg(svg),
            concat!(
                r##"<svg><use href="#icon"/><image xlink:href="https://cdn.test/a.png"/>"##,
                r#"<image/><rect/></svg>"#,
            )
        );
    }

    #[test]
    fn strips_comments_doctype_and_instructions() {
        let svg = "<?xml version=\"1.0\"?><!DOCTYPE svg><!-- note --><svg><![CDATA[x]]><g/></svg>";
        assert_eq!(sanitize_svg(svg), "<svg><g/></svg>");
    }

    #[test]
    fn output_is_balanced_and_stray_brackets_are_escaped() {
        assert_eq!(sanitize_svg("<svg><g><text>1 < 2</svg>"), "<svg><g><text>1 &lt; 2</text></g></svg>");
        assert_eq!(sanitize_svg("<svg></g></svg>"), "<svg></svg>");
    }

    #[test]
    fn attribute_values_are_requoted() {
        let svg = r#"<svg><g id='say "hi"'/></svg>"#;
        assert_eq!(sanitize_svg(svg), r#"<svg><g id="say &quot;hi&quot;"/></svg>"#);
    }

    #[test]
    fn opaque_elements_match_case_insensitively() {
        let svg = "<svg><STYLE>a{}</Style><g/></svg>";
        assert_eq!(sanitize_svg(svg), "<svg><g/></svg>");
    }

    #[test]
    fn deep_nesting_is_flattened() {
        let depth = MAX_DEPTH + 50;
        let svg = format!("{}x{}", "<g>".repeat(depth), "</g>".repeat(depth));
        let out = sanitize_svg(&svg);
        assert_eq!(out.matches("<g>").count(), MAX_DEPTH);
        assert_eq!(out.matches("</g>").count(), MAX_DEPTH);
        assert!(out.contains('x'));
    }

    #[test]
    fn sanitizing_scales_linearly() {
        let started = Instant::now();

        let styles = "<style>x</style>".repeat(40_000);
        assert_eq!(sanitize_svg(&styles), "");

        let unclosed = format!("{}{}", "<blink>".repeat(40_000), "</b>".repeat(40_000));
        assert_eq!(sanitize_svg(&unclosed), "");

        let kept = format!("{}{}", "<g>".repeat(40_000), "</b>".repeat(40_000));
        assert_eq!(sanitize_svg(&kept).matches("<g>").count(), MAX_DEPTH);

        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
