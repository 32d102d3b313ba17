//! Fragment element rewriting.
//!
//! Container attributes are a wire contract with the browser-side runtime:
//!
//! | Attribute            | Value                          |
//! |----------------------|--------------------------------|
//! | `puzzle-fragment`    | fragment name                  |
//! | `puzzle-gateway`     | gateway name                   |
//! | `fragment-partial`   | partial name                   |
//! | `puzzle-chunk`       | chunk key (chunked only)       |
//! | `puzzle-placeholder` | `<key>_placeholder`            |
//! | `puzzle-async`       | present on client-side ones    |

use rustc_hash::FxHashMap;

use super::{
    CONTENT_NOT_FOUND, Classification, DiscoveredFragment, Discovery, FragmentIdentity,
    FragmentReference, content_marker, placeholder_marker, slot_key, wrap_content,
};
use crate::dom::{Document, Element, Node};
use crate::gateway::FragmentResponse;
use crate::template::scan::{self, Piece};

pub const ATTR_FRAGMENT: &str = "puzzle-fragment";
pub const ATTR_GATEWAY: &str = "puzzle-gateway";
pub const ATTR_PARTIAL: &str = "fragment-partial";
pub const ATTR_CHUNK: &str = "puzzle-chunk";
pub const ATTR_PLACEHOLDER: &str = "puzzle-placeholder";
pub const ATTR_ASYNC: &str = "puzzle-async";
pub const ATTR_CLASSIFICATION: &str = "puzzle-classification";

/// Compile-time answers of static fragments; absent means unavailable.
pub type StaticContent = FxHashMap<FragmentIdentity, FragmentResponse>;

/// Replace every `<fragment>` element of `doc`.
///
/// With `debug`, containers carry their classification.
pub fn rewrite(doc: &mut Document, discovery: &Discovery, statics: &StaticContent, debug: bool) {
    doc.replace(&mut |el, in_head| {
        let reference = FragmentReference::from_element(el, in_head)?;
        let nodes = match discovery.get(&reference.identity) {
            Some(fragment) => replacement(fragment, &reference, statics, debug),
            None => vec![Node::raw(CONTENT_NOT_FOUND)],
        };
        Some(match reference.attr("if") {
            Some(condition) => guarded(condition, nodes),
            None => nodes,
        })
    });
}

fn replacement(
    fragment: &DiscoveredFragment,
    reference: &FragmentReference,
    statics: &StaticContent,
    debug: bool,
) -> Vec<Node> {
    let name = &fragment.identity.name;
    let partial = &reference.partial;
    let key = slot_key(name, partial);

    let mut container = Element::new("div")
        .with_attr("id", key.as_str())
        .with_attr(ATTR_FRAGMENT, name.as_str())
        .with_attr(ATTR_GATEWAY, fragment.identity.gateway.as_str())
        .with_attr(ATTR_PARTIAL, partial.as_str());
    if debug {
        container.set_attr(ATTR_CLASSIFICATION, fragment.classification.name());
    }

    match fragment.classification {
        Classification::Primary | Classification::Waited => {
            let marker = Node::Raw(content_marker(&key));
            if reference.in_head {
                return vec![marker];
            }
            container.children.push(marker);
        }
        Classification::Static => {
            let html = statics
                .get(&fragment.identity)
                .and_then(|response| response.partial(partial))
                .map(|html| escape_markers(&wrap_content(&fragment.config, partial, html)));
            let content = Node::Raw(html.unwrap_or_else(|| CONTENT_NOT_FOUND.to_string()));
            if reference.in_head {
                return vec![content];
            }
            container.children.push(content);
        }
        Classification::Chunked => {
            container.set_attr(ATTR_CHUNK, key.as_str());
            if fragment.config.placeholder {
                container.children.push(placeholder_container(&key));
            }
        }
        Classification::ClientAsync(flags) => {
            container.set_attr(ATTR_ASYNC, "");
            for (set, attr) in [
                (flags.force, "puzzle-async-force"),
                (flags.critical, "puzzle-critical"),
                (flags.on_demand, "puzzle-on-demand"),
                (flags.decentralized, "puzzle-decentralized"),
            ] {
                if set {
                    container.set_attr(attr, "");
                }
            }
            if fragment.config.placeholder {
                container.children.push(placeholder_container(&key));
            }
        }
    }
    vec![Node::Element(container)]
}

fn placeholder_container(key: &str) -> Node {
    Node::Element(
        Element::new("div")
            .with_attr(ATTR_PLACEHOLDER, format!("{key}_placeholder"))
            .with_child(Node::Raw(placeholder_marker(key))),
    )
}

/// Make upstream html inert for the template compiler.
pub fn escape_markers(html: &str) -> String {
    html.replace("${", "\\${")
}

/// Wrap nodes in `${if (cond) {}` ... `${}}`.
fn guarded(condition: &str, nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len() + 2);
    out.push(Node::Raw(format!("${{if ({}) {{}}", condition_expression(condition))));
    out.extend(nodes);
    out.push(Node::raw("${}}"));
    out
}

/// Expression text for an `if` attribute value.
///
/// `${e}` becomes `e`; plain text becomes a string literal; mixed values
/// become a concatenation. Unreadable values are `false`.
pub fn condition_expression(raw: &str) -> String {
    let Ok(pieces) = scan::split(raw) else {
        return "false".to_string();
    };
    if let [Piece::Expr(inner)] = pieces.as_slice() {
        return inner.trim().to_string();
    }

    let parts: Vec<String> = pieces
        .iter()
        .map(|piece| match piece {
            Piece::Text(text) => string_literal(text),
            Piece::Expr(inner) => format!("({})", inner.trim()),
        })
        .collect();
    match parts.len() {
        0 => "''".to_string(),
        1 => parts.concat(),
        _ => format!("'' + {}", parts.join(" + ")),
    }
}

fn string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}
