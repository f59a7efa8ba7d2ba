//! HTML structural simplification
//!
//! Reduces a raw, attribute-laden, script-polluted HTML document to a minimal
//! document that keeps only structurally meaningful markup and visible text,
//! cutting the token cost of handing page content to a model.
//!
//! The reduction runs as ordered passes over the parsed tree:
//!
//! 1. remove `script`/`style` elements and their subtrees
//! 2. clear element attributes (unless attributes are being kept)
//! 3. remove elements with no visible text, to a fixpoint
//! 4. drop `href` from anchors (matters only when attributes are kept)
//! 5. remove comment nodes
//! 6. unwrap wrapper elements that add no text beyond their single child
//! 7. serialize and drop blank lines
//!
//! Every pass preserves the concatenation of visible text in document order,
//! modulo whitespace. The whole transformation is deterministic and total:
//! malformed input is whatever tree the parser recovered, and nodes that have
//! already vanished from the arena are skipped rather than re-resolved.
//!
//! All structural edits are two-phase: node ids are collected first, then the
//! edits are applied against the live tree.

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{Html, Node};

/// Characters treated as insignificant when comparing element text
const COLLAPSIBLE: [char; 3] = [' ', '\t', '\n'];

/// Simplifies raw markup into a compact, text-preserving form.
///
/// When `keep_attributes` is false (the default mode), every element attribute
/// is discarded; otherwise attributes survive except anchor `href` targets.
pub fn simplify_html(html: &str, keep_attributes: bool) -> String {
    let mut document = Html::parse_fragment(html);
    let root_element_id = fragment_root_id(&document);

    remove_scripts_and_styles(&mut document.tree);
    if !keep_attributes {
        clear_attributes(&mut document.tree);
    }
    remove_empty_elements(&mut document.tree, root_element_id);
    strip_anchor_hrefs(&mut document.tree);
    remove_comments(&mut document.tree);
    unwrap_redundant_wrappers(&mut document.tree, root_element_id);

    serialize_without_blank_lines(&document)
}

/// Id of the synthetic `<html>` wrapper the fragment parser adds; it never
/// takes part in removal or unwrapping and is invisible in the output.
fn fragment_root_id(document: &Html) -> NodeId {
    document.root_element().id()
}

fn remove_scripts_and_styles(tree: &mut Tree<Node>) {
    let doomed: Vec<NodeId> = tree
        .root()
        .descendants()
        .filter(|node| {
            node.value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style"))
        })
        .map(|node| node.id())
        .collect();
    detach_all(tree, &doomed);
}

fn clear_attributes(tree: &mut Tree<Node>) {
    let element_ids: Vec<NodeId> = tree
        .root()
        .descendants()
        .filter(|node| node.value().is_element())
        .map(|node| node.id())
        .collect();
    for id in element_ids {
        if let Some(mut node) = tree.get_mut(id) {
            if let Node::Element(element) = node.value() {
                element.attrs.clear();
            }
        }
    }
}

/// Removes every element whose subtree contains no non-whitespace text.
///
/// One bottom-up traversal is observably equivalent to rescanning to a
/// fixpoint: removing a text-free element never changes whether an ancestor
/// has visible text, so the fixpoint set is exactly the set of elements with
/// no visible descendant text.
fn remove_empty_elements(tree: &mut Tree<Node>, root_element_id: NodeId) {
    let mut doomed = Vec::new();
    mark_textless(tree.root(), root_element_id, &mut doomed);
    detach_all(tree, &doomed);
}

/// Returns whether the subtree holds visible text; collects textless elements.
fn mark_textless(node: NodeRef<'_, Node>, root_element_id: NodeId, doomed: &mut Vec<NodeId>) -> bool {
    if let Node::Text(text) = node.value() {
        return text.text.chars().any(|c| !c.is_whitespace());
    }

    let mut has_text = false;
    for child in node.children() {
        // no short-circuit: every textless element must still be marked
        has_text |= mark_textless(child, root_element_id, doomed);
    }
    if !has_text && node.value().is_element() && node.id() != root_element_id {
        doomed.push(node.id());
    }
    has_text
}

fn strip_anchor_hrefs(tree: &mut Tree<Node>) {
    let anchor_ids: Vec<NodeId> = tree
        .root()
        .descendants()
        .filter(|node| node.value().as_element().is_some_and(|el| el.name() == "a"))
        .map(|node| node.id())
        .collect();
    for id in anchor_ids {
        if let Some(mut node) = tree.get_mut(id) {
            if let Node::Element(element) = node.value() {
                element.attrs.retain(|(name, _)| name.local.as_ref() != "href");
            }
        }
    }
}

fn remove_comments(tree: &mut Tree<Node>) {
    let doomed: Vec<NodeId> = tree
        .root()
        .descendants()
        .filter(|node| node.value().is_comment())
        .map(|node| node.id())
        .collect();
    detach_all(tree, &doomed);
}

/// Unwraps elements that carry no text of their own beyond their single
/// element child, replacing the wrapper with its contents in place.
///
/// Runs once in document order rather than to a fixpoint; since parents are
/// visited before their descendants a chain of redundant wrappers still
/// collapses within the pass. Conditions are re-checked against the live tree
/// at apply time.
fn unwrap_redundant_wrappers(tree: &mut Tree<Node>, root_element_id: NodeId) {
    let candidates: Vec<NodeId> = tree
        .root()
        .descendants()
        .filter(|node| node.value().is_element() && node.id() != root_element_id)
        .map(|node| node.id())
        .collect();

    for id in candidates {
        let Some(node) = tree.get(id) else { continue };
        if node.parent().is_none() {
            continue;
        }

        let element_children: Vec<NodeId> = node
            .children()
            .filter(|child| child.value().is_element())
            .map(|child| child.id())
            .collect();
        if element_children.len() != 1 {
            continue;
        }

        let wrapper_text = collapsed_text(node);
        let child_text = match tree.get(element_children[0]) {
            Some(child) => collapsed_text(child),
            None => continue,
        };
        if wrapper_text != child_text {
            continue;
        }

        let child_ids: Vec<NodeId> = node.children().map(|child| child.id()).collect();
        if let Some(mut wrapper) = tree.get_mut(id) {
            for child_id in child_ids {
                wrapper.insert_id_before(child_id);
            }
            wrapper.detach();
        }
    }
}

/// Concatenated visible text of a subtree with space, tab, and newline removed
fn collapsed_text(node: NodeRef<'_, Node>) -> String {
    let mut out = String::new();
    for descendant in node.descendants() {
        if let Node::Text(text) = descendant.value() {
            out.extend(text.text.chars().filter(|c| !COLLAPSIBLE.contains(c)));
        }
    }
    out
}

fn detach_all(tree: &mut Tree<Node>, ids: &[NodeId]) {
    for &id in ids {
        if let Some(mut node) = tree.get_mut(id) {
            node.detach();
        }
    }
}

fn serialize_without_blank_lines(document: &Html) -> String {
    let markup = document.root_element().inner_html();
    markup
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Visible text of a markup string with whitespace-class characters removed
    fn visible_text(html: &str) -> String {
        let document = Html::parse_fragment(html);
        collapsed_text(document.tree.root())
    }

    #[test]
    fn test_unwraps_single_child_wrapper() {
        let output = simplify_html("<div><p>Hello</p></div>", false);
        assert_eq!(output, "<p>Hello</p>");
    }

    #[test]
    fn test_removes_textless_elements() {
        let output = simplify_html("<p><br></p>", false);
        assert_eq!(output, "");
    }

    #[test]
    fn test_removes_whitespace_only_elements() {
        let output = simplify_html("<div>  \n\t </div><p>kept</p>", false);
        assert_eq!(output, "<p>kept</p>");
    }

    #[test]
    fn test_empty_removal_cascades_to_ancestors() {
        // the inner span is textless; removing it leaves div and section empty
        let output = simplify_html("<section><div><span></span></div></section>", false);
        assert_eq!(output, "");
    }

    #[test]
    fn test_removes_scripts_and_styles_with_content() {
        let html = "<div><script>var x = 1;</script><style>p { color: red }</style><p>Text</p></div>";
        let output = simplify_html(html, false);
        assert!(!output.contains("script"));
        assert!(!output.contains("var x"));
        assert!(!output.contains("color"));
        assert!(output.contains("Text"));
    }

    #[test]
    fn test_removes_comments_and_keeps_surrounding_text() {
        let output = simplify_html("<p>before<!-- note -->after</p>", false);
        assert!(!output.contains("note"));
        assert!(output.contains("before"));
        assert!(output.contains("after"));
        assert_eq!(visible_text(&output), "beforeafter");
    }

    #[test]
    fn test_strips_attributes_by_default() {
        let html = r#"<p class="lead" id="p1" data-x="7" style="margin:0">Hi</p>"#;
        let output = simplify_html(html, false);
        assert_eq!(output, "<p>Hi</p>");
    }

    #[test]
    fn test_keep_attributes_mode_retains_all_but_href() {
        // Two children keep the div from being unwrapped as a redundant wrapper
        let html = r#"<div class="box"><a href="https://example.com" title="t">Link</a><span>more</span></div>"#;
        let output = simplify_html(html, true);
        assert!(output.contains("class=\"box\""));
        assert!(output.contains("title=\"t\""));
        assert!(!output.contains("href"));
    }

    #[test]
    fn test_keep_attributes_mode_still_unwraps_redundant_wrappers() {
        let html = r#"<div class="box"><p id="p1">Hello</p></div>"#;
        let output = simplify_html(html, true);
        assert_eq!(output, r#"<p id="p1">Hello</p>"#);
    }

    #[test]
    fn test_wrapper_chain_collapses_in_document_order() {
        let output = simplify_html("<div><section><article><p>Deep</p></article></section></div>", false);
        assert_eq!(output, "<p>Deep</p>");
    }

    #[test]
    fn test_wrapper_with_own_text_is_kept() {
        let html = "<div>intro<p>body</p></div>";
        let output = simplify_html(html, false);
        assert!(output.contains("<div>"));
        assert!(output.contains("<p>body</p>"));
        assert_eq!(visible_text(&output), "introbody");
    }

    #[test]
    fn test_wrapper_with_two_children_is_kept() {
        let html = "<div><p>one</p><p>two</p></div>";
        let output = simplify_html(html, false);
        assert!(output.contains("<div>"));
    }

    #[test]
    fn test_preserves_visible_text_on_messy_input() {
        let html = r#"
            <html><head><title>Doc</title></head>
            <body>
              <div id="wrap">
                <h1>Heading</h1>
                <!-- nav -->
                <ul><li>alpha</li><li>beta</li></ul>
                <div><div><span>nested</span></div></div>
              </div>
            </body></html>
        "#;
        let output = simplify_html(html, false);
        assert_eq!(visible_text(&output), visible_text(html));
    }

    #[test]
    fn test_tolerates_malformed_markup() {
        let html = "<div><p>unclosed<div><b>bold</div></b>tail";
        let output = simplify_html(html, false);
        assert_eq!(visible_text(&output), visible_text(html));
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert_eq!(simplify_html("", false), "");
        assert_eq!(simplify_html("<script>only()</script>", false), "");
    }

    #[test]
    fn test_drops_blank_output_lines() {
        let html = "<p>a</p>\n\n\n   \n<p>b</p>\n";
        let output = simplify_html(html, false);
        for line in output.lines() {
            assert!(!line.trim().is_empty());
        }
        assert_eq!(visible_text(&output), "ab");
    }

    #[test]
    fn test_deterministic() {
        let html = r#"<div a="1" b="2" c="3"><p x="y">text</p><span>more</span></div>"#;
        let first = simplify_html(html, false);
        let second = simplify_html(html, false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_idempotent() {
        let cases = [
            "<div><p>Hello</p></div>",
            "<div><section><article><p>Deep</p></article></section></div>",
            "<div>intro<p>body</p></div>",
            "<ul><li>alpha</li><li></li><li>beta</li></ul>",
            "<p>before<!-- note -->after</p>",
        ];
        for html in cases {
            let once = simplify_html(html, false);
            let twice = simplify_html(&once, false);
            assert_eq!(once, twice, "not idempotent for input: {html}");
        }
    }

    #[test]
    fn test_entities_round_trip() {
        let output = simplify_html("<p>a &amp; b</p>", false);
        assert_eq!(output, "<p>a &amp; b</p>");
    }
}
