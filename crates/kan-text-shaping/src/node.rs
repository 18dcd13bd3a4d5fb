//! Text build: append-only node list from a stream of items (spec.md
//! §4.7.1).

use unicode_script::Script;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleTag {
    pub style: u32,
    pub mark_index: u32,
}

#[derive(Debug, Clone)]
pub enum TextItem {
    Empty,
    Utf8(Vec<u8>),
    Icon { index: u32, base_codepoint: u32, scale_x: f32, scale_y: f32 },
    Style(StyleTag),
}

#[derive(Debug, Clone)]
pub enum TextNode {
    Utf8 { script: Script, bytes: Vec<u8> },
    Icon { index: u32, base_codepoint: u32, scale_x: f32, scale_y: f32 },
    Style(StyleTag),
}

/// Scripts that never force a utf8 node boundary — inherited from the
/// previous meaningful script (spec.md §4.7.1, "leave the set
/// `{common, inherited, unknown}`").
fn is_transparent(script: Script) -> bool {
    matches!(script, Script::Common | Script::Inherited | Script::Unknown)
}

#[derive(Default)]
struct PendingUtf8 {
    bytes: Vec<u8>,
    script: Option<Script>,
}

impl PendingUtf8 {
    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn take_node(&mut self) -> Option<TextNode> {
        if self.bytes.is_empty() {
            return None;
        }
        let node = TextNode::Utf8 {
            script: self.script.unwrap_or(Script::Common),
            bytes: std::mem::take(&mut self.bytes),
        };
        self.script = None;
        Some(node)
    }
}

/// Walks `items`, streaming them into an append-only node list.
pub fn build_nodes(items: &[TextItem]) -> Vec<TextNode> {
    let mut nodes = Vec::new();
    let mut pending = PendingUtf8::default();
    let mut current_style: Option<StyleTag> = None;

    for item in items {
        match item {
            TextItem::Empty => {}
            TextItem::Utf8(bytes) => {
                for ch in String::from_utf8_lossy(bytes).chars() {
                    let script = Script::from(ch);
                    if !is_transparent(script) {
                        if let Some(active) = pending.script {
                            if active != script && !pending.is_empty() {
                                if let Some(node) = pending.take_node() {
                                    nodes.push(node);
                                }
                            }
                        }
                        pending.script = Some(script);
                    }
                    let mut buf = [0u8; 4];
                    pending.bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
            TextItem::Icon { index, base_codepoint, scale_x, scale_y } => {
                if let Some(node) = pending.take_node() {
                    nodes.push(node);
                }
                pending.script = None;
                nodes.push(TextNode::Icon {
                    index: *index,
                    base_codepoint: *base_codepoint,
                    scale_x: *scale_x,
                    scale_y: *scale_y,
                });
            }
            TextItem::Style(tag) => {
                if current_style != Some(*tag) {
                    if let Some(node) = pending.take_node() {
                        nodes.push(node);
                    }
                    pending.script = None;
                    current_style = Some(*tag);
                    nodes.push(TextNode::Style(*tag));
                }
            }
        }
    }
    if let Some(node) = pending.take_node() {
        nodes.push(node);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_items_produce_no_nodes() {
        assert!(build_nodes(&[TextItem::Empty]).is_empty());
    }

    #[test]
    fn plain_ascii_is_a_single_node() {
        let nodes = build_nodes(&[TextItem::Utf8(b"hello".to_vec())]);
        assert_eq!(nodes.len(), 1);
        assert!(matches!(&nodes[0], TextNode::Utf8 { bytes, .. } if bytes == b"hello"));
    }

    #[test]
    fn icon_flushes_pending_utf8() {
        let nodes = build_nodes(&[
            TextItem::Utf8(b"hi".to_vec()),
            TextItem::Icon { index: 3, base_codepoint: 0xE000, scale_x: 1.0, scale_y: 1.0 },
        ]);
        assert_eq!(nodes.len(), 2);
        assert!(matches!(nodes[1], TextNode::Icon { index: 3, .. }));
    }

    #[test]
    fn style_change_flushes_and_emits_style_node() {
        let nodes = build_nodes(&[
            TextItem::Style(StyleTag { style: 1, mark_index: 0 }),
            TextItem::Utf8(b"a".to_vec()),
            TextItem::Style(StyleTag { style: 2, mark_index: 0 }),
            TextItem::Utf8(b"b".to_vec()),
        ]);
        assert_eq!(nodes.len(), 4);
        assert!(matches!(nodes[0], TextNode::Style(StyleTag { style: 1, .. })));
        assert!(matches!(nodes[2], TextNode::Style(StyleTag { style: 2, .. })));
    }

    #[test]
    fn repeated_identical_style_does_not_refragment() {
        let nodes = build_nodes(&[
            TextItem::Style(StyleTag { style: 1, mark_index: 0 }),
            TextItem::Style(StyleTag { style: 1, mark_index: 0 }),
            TextItem::Utf8(b"ab".to_vec()),
        ]);
        assert_eq!(nodes.len(), 2);
    }
}
