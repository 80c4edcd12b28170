//! Projection of a (possibly partial) markdown response into typed blocks.
//!
//! Rendering is pure: the same text always yields the same blocks, so the
//! whole document is re-rendered on every snapshot.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag};

/// Marker shown after the last block while the response is streaming.
pub const STREAMING_CURSOR: char = '▋';
pub const WARNING_GLYPH: char = '⚠';

const DEFAULT_EXTENSION: &str = "txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph { text: String, is_warning: bool },
    Heading { level: u8, text: String },
    List(ListBlock),
    /// A paragraph made of a single code span.
    InlineCode { text: String },
    FencedCode(CodeBlock),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListBlock {
    /// First item number; `None` for bullet lists.
    pub start: Option<u64>,
    pub items: Vec<String>,
}

impl ListBlock {
    #[must_use]
    pub fn ordered(&self) -> bool {
        self.start.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// First word of the fence info string, as written.
    pub language_tag: String,
    /// Raw code, without the fence lines.
    pub source: String,
    pub affordances: CodeBlockAffordances,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockAffordances {
    pub display_language: String,
    pub file_extension: &'static str,
    pub file_name: String,
}

impl CodeBlockAffordances {
    #[must_use]
    pub fn for_tag(language_tag: &str) -> Self {
        let canonical = canonical_language_tag(language_tag);
        let file_extension = file_extension(&canonical);
        Self {
            display_language: canonical.to_uppercase(),
            file_extension,
            file_name: format!("script.{file_extension}"),
        }
    }
}

/// Where the streaming cursor goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPlacement {
    /// After the content of this block (inside the fence for code).
    InBlock(usize),
    /// On its own, when the text produced no blocks yet.
    Standalone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    blocks: Vec<Block>,
    cursor: Option<CursorPlacement>,
}

impl RenderedDocument {
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn cursor(&self) -> Option<CursorPlacement> {
        self.cursor
    }

    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.blocks.iter().filter_map(|block| match block {
            Block::FencedCode(code) => Some(code),
            _ => None,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[must_use]
pub fn render(document_text: &str, is_streaming: bool) -> RenderedDocument {
    let mut builder = BlockBuilder::default();
    for event in Parser::new(document_text) {
        builder.on_event(event);
    }
    let blocks = builder.finish();

    let cursor = (is_streaming && !document_text.is_empty()).then(|| {
        blocks
            .len()
            .checked_sub(1)
            .map_or(CursorPlacement::Standalone, CursorPlacement::InBlock)
    });

    RenderedDocument { blocks, cursor }
}

/// Lower-cased first word of a fence info string with aliases resolved.
/// An empty tag becomes `txt`.
#[must_use]
pub fn canonical_language_tag(tag: &str) -> String {
    let tag = tag
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match tag.as_str() {
        "" => DEFAULT_EXTENSION.to_string(),
        "vba" => "vbscript".to_string(),
        "shell" => "bash".to_string(),
        _ => tag,
    }
}

/// Download extension for a language tag. Unknown tags map to `txt`.
#[must_use]
pub fn file_extension(tag: &str) -> &'static str {
    match tag.to_lowercase().as_str() {
        "powershell" => "ps1",
        "bash" | "shell" => "sh",
        "cmd" | "batch" => "bat",
        "vba" | "vbscript" => "vbs",
        "python" => "py",
        "sql" => "sql",
        "ruby" => "rb",
        "go" => "go",
        _ => DEFAULT_EXTENSION,
    }
}

#[derive(Default)]
struct InlineBuffer {
    text: String,
    code_spans: usize,
    has_plain_text: bool,
    heading: Option<u8>,
}

struct ListBuilder {
    /// Number the next top-level item gets; `None` for bullet lists.
    next_number: Option<u64>,
    /// Number of the first item in `items`.
    block_start: Option<u64>,
    items: Vec<String>,
    current: String,
    depth: usize,
    /// The current item was split by a code block; what follows the code
    /// belongs to that item's explanation.
    after_code: bool,
}

impl ListBuilder {
    fn new(start: Option<u64>) -> Self {
        Self {
            next_number: start,
            block_start: None,
            items: Vec::new(),
            current: String::new(),
            depth: 1,
            after_code: false,
        }
    }

    fn start_item(&mut self, out: &mut Vec<Block>) {
        self.flush_item(out);
        if self.depth > 1 {
            return;
        }
        self.after_code = false;
        if self.items.is_empty() {
            self.block_start = self.next_number;
        }
        self.next_number = self.next_number.map(|n| n + 1);
    }

    fn flush_item(&mut self, out: &mut Vec<Block>) {
        let item = self.current.trim().to_string();
        self.current.clear();
        if item.is_empty() {
            return;
        }
        if self.after_code {
            self.emit_items(out);
            out.push(paragraph(item));
        } else {
            self.items.push(item);
        }
    }

    fn emit_items(&mut self, out: &mut Vec<Block>) {
        if self.items.is_empty() {
            return;
        }
        out.push(Block::List(ListBlock {
            start: self.block_start.take(),
            items: std::mem::take(&mut self.items),
        }));
    }

    /// Emit everything collected so far so a code block can follow it.
    fn split_for_code(&mut self, out: &mut Vec<Block>) {
        self.flush_item(out);
        self.emit_items(out);
        self.after_code = true;
    }

    fn close(&mut self, out: &mut Vec<Block>) {
        self.flush_item(out);
        self.emit_items(out);
    }
}

struct CodeBuffer {
    language_tag: String,
    source: String,
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    inline: Option<InlineBuffer>,
    list: Option<ListBuilder>,
    code: Option<CodeBuffer>,
}

impl BlockBuilder {
    fn on_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.on_start(tag),
            Event::End(tag) => self.on_end(tag),
            Event::Text(text) => self.push_text(&text, false),
            Event::Code(text) => self.push_text(&text, true),
            Event::Html(html) => {
                if self.has_target() {
                    self.push_text(&html, false);
                } else if !html.trim().is_empty() {
                    self.blocks.push(paragraph(html.trim().to_string()));
                }
            }
            Event::SoftBreak | Event::HardBreak => self.push_text("\n", false),
            _ => {}
        }
    }

    fn on_start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.list.is_none() {
                    self.inline = Some(InlineBuffer::default());
                }
            }
            Tag::Heading(level, ..) => {
                if self.list.is_none() {
                    self.inline = Some(InlineBuffer {
                        heading: Some(level as u8),
                        ..InlineBuffer::default()
                    });
                }
            }
            Tag::List(start) => match self.list.as_mut() {
                Some(list) => {
                    list.flush_item(&mut self.blocks);
                    list.depth += 1;
                }
                None => self.list = Some(ListBuilder::new(start)),
            },
            Tag::Item => {
                if let Some(list) = self.list.as_mut() {
                    list.start_item(&mut self.blocks);
                }
            }
            Tag::CodeBlock(kind) => {
                // A code block inside a list splits it so the code stays a
                // block of its own.
                if let Some(list) = self.list.as_mut() {
                    list.split_for_code(&mut self.blocks);
                }
                let language_tag = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeBuffer {
                    language_tag,
                    source: String::new(),
                });
            }
            _ => {}
        }
    }

    fn on_end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph | Tag::Heading(..) => {
                if let Some(list) = self.list.as_mut() {
                    if !list.current.is_empty() {
                        list.current.push('\n');
                    }
                } else if let Some(inline) = self.inline.take() {
                    self.finish_inline(inline);
                }
            }
            Tag::Item => {
                if let Some(list) = self.list.as_mut() {
                    list.flush_item(&mut self.blocks);
                }
            }
            Tag::List(_) => {
                let Some(list) = self.list.as_mut() else {
                    return;
                };
                list.depth -= 1;
                if list.depth == 0 {
                    list.close(&mut self.blocks);
                    self.list = None;
                }
            }
            Tag::CodeBlock(_) => {
                if let Some(code) = self.code.take() {
                    self.blocks.push(code_block(code));
                }
            }
            _ => {}
        }
    }

    fn has_target(&self) -> bool {
        self.code.is_some() || self.list.is_some() || self.inline.is_some()
    }

    fn push_text(&mut self, text: &str, is_code_span: bool) {
        if let Some(code) = self.code.as_mut() {
            code.source.push_str(text);
        } else if let Some(list) = self.list.as_mut() {
            list.current.push_str(text);
        } else if let Some(inline) = self.inline.as_mut() {
            inline.text.push_str(text);
            if is_code_span {
                inline.code_spans += 1;
            } else if !text.trim().is_empty() {
                inline.has_plain_text = true;
            }
        }
    }

    fn finish_inline(&mut self, inline: InlineBuffer) {
        let text = inline.text.trim().to_string();
        if text.is_empty() {
            return;
        }
        let block = match inline.heading {
            Some(level) => Block::Heading { level, text },
            None if inline.code_spans == 1 && !inline.has_plain_text => {
                Block::InlineCode { text }
            }
            None => paragraph(text),
        };
        self.blocks.push(block);
    }

    /// Close whatever the parser left open. Streaming text often ends
    /// mid-block.
    fn finish(mut self) -> Vec<Block> {
        if let Some(code) = self.code.take() {
            self.blocks.push(code_block(code));
        }
        if let Some(mut list) = self.list.take() {
            list.close(&mut self.blocks);
        }
        if let Some(inline) = self.inline.take() {
            self.finish_inline(inline);
        }
        self.blocks
    }
}

fn paragraph(text: String) -> Block {
    let is_warning = text.starts_with(WARNING_GLYPH);
    Block::Paragraph { text, is_warning }
}

fn code_block(code: CodeBuffer) -> Block {
    let CodeBuffer {
        language_tag,
        mut source,
    } = code;
    if source.ends_with('\n') {
        source.pop();
    }
    let affordances = CodeBlockAffordances::for_tag(&language_tag);
    Block::FencedCode(CodeBlock {
        language_tag,
        source,
        affordances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "```powershell\nGet-Process | Sort-Object CPU\n```\n\n### Explanation:\n\n1. Lists processes\n2. Sorts them\n\n`Get-Process`\n\nUse `-Name` to filter.\n\n⚠️ **Important Notes:** run as admin\n";

    #[test]
    fn renders_typed_blocks() {
        let rendered = render(RESPONSE, false);
        let blocks = rendered.blocks();

        let Block::FencedCode(code) = &blocks[0] else {
            panic!("expected code block, got {:?}", blocks[0]);
        };
        assert_eq!(code.language_tag, "powershell");
        assert_eq!(code.source, "Get-Process | Sort-Object CPU");
        assert_eq!(code.affordances.display_language, "POWERSHELL");
        assert_eq!(code.affordances.file_name, "script.ps1");

        assert_eq!(
            blocks[1],
            Block::Heading {
                level: 3,
                text: "Explanation:".to_string()
            }
        );
        assert_eq!(
            blocks[2],
            Block::List(ListBlock {
                start: Some(1),
                items: vec!["Lists processes".to_string(), "Sorts them".to_string()],
            })
        );
        assert_eq!(
            blocks[3],
            Block::InlineCode {
                text: "Get-Process".to_string()
            }
        );
        assert_eq!(
            blocks[4],
            Block::Paragraph {
                text: "Use -Name to filter.".to_string(),
                is_warning: false
            }
        );
        assert!(matches!(&blocks[5], Block::Paragraph { is_warning: true, text } if text.starts_with("⚠️ Important Notes:")));
        assert_eq!(rendered.cursor(), None);
    }

    #[test]
    fn rendering_is_idempotent() {
        for text in [RESPONSE, "```bash\ndf -h", "1. step\n   ```sh\n   ls\n   ```\n2. next", ""] {
            assert_eq!(render(text, true), render(text, true));
            assert_eq!(render(text, false), render(text, false));
        }
    }

    #[test]
    fn aliases_resolve_before_lookup() {
        let vba = CodeBlockAffordances::for_tag("vba");
        assert_eq!(vba.display_language, "VBSCRIPT");
        assert_eq!(vba.file_extension, "vbs");

        let shell = CodeBlockAffordances::for_tag("Shell");
        assert_eq!(shell.display_language, "BASH");
        assert_eq!(shell.file_extension, "sh");

        let none = CodeBlockAffordances::for_tag("");
        assert_eq!(none.display_language, "TXT");
        assert_eq!(none.file_name, "script.txt");
    }

    #[test]
    fn extension_table_is_complete() {
        let table = [
            ("powershell", "ps1"),
            ("bash", "sh"),
            ("shell", "sh"),
            ("cmd", "bat"),
            ("batch", "bat"),
            ("vba", "vbs"),
            ("vbscript", "vbs"),
            ("python", "py"),
            ("sql", "sql"),
            ("ruby", "rb"),
            ("go", "go"),
        ];
        for (tag, extension) in table {
            assert_eq!(file_extension(tag), extension, "{tag}");
            assert_eq!(file_extension(&tag.to_uppercase()), extension, "{tag}");
        }
        assert_eq!(file_extension("xyz123"), "txt");
    }

    #[test]
    fn unterminated_fence_is_still_code() {
        let rendered = render("Here:\n\n```bash\ndf -h\n", true);
        let code = rendered.code_blocks().next().expect("code block");
        assert_eq!(code.source, "df -h");
        assert_eq!(rendered.cursor(), Some(CursorPlacement::InBlock(1)));
    }

    #[test]
    fn cursor_only_while_streaming_non_empty_text() {
        assert_eq!(render("", true).cursor(), None);
        assert_eq!(render("---", true).cursor(), Some(CursorPlacement::Standalone));
        assert_eq!(render("hello", false).cursor(), None);

        let rendered = render("hello", true);
        assert_eq!(rendered.cursor(), Some(CursorPlacement::InBlock(0)));
        assert!(!rendered.blocks().iter().any(|block| matches!(
            block,
            Block::Paragraph { text, .. } if text.contains(STREAMING_CURSOR)
        )));
    }

    #[test]
    fn code_inside_list_item_splits_list() {
        let text = "1. Create the user\n\n   ```powershell\n   New-LocalUser -Name bob\n   ```\n\n2. Add to group\n";
        let rendered = render(text, false);
        let blocks = rendered.blocks();

        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], Block::List(list) if list.items == ["Create the user"] && list.start == Some(1)));
        assert!(matches!(&blocks[1], Block::FencedCode(code) if code.source == "New-LocalUser -Name bob"));
        assert!(matches!(&blocks[2], Block::List(list) if list.items == ["Add to group"] && list.start == Some(2)));

        let text = "1. Create the user\n\n   ```powershell\n   New-LocalUser -Name bob\n   ```\n\n   Then verify it.\n\n2. Add to group\n";
        let rendered = render(text, false);
        assert_eq!(
            rendered.blocks()[2..],
            [
                Block::Paragraph {
                    text: "Then verify it.".to_string(),
                    is_warning: false
                },
                Block::List(ListBlock {
                    start: Some(2),
                    items: vec!["Add to group".to_string()],
                }),
            ]
        );
        assert_eq!(rendered.blocks().len(), 4);
    }

    #[test]
    fn numbering_continues_across_several_code_steps() {
        let text = "1. One\n\n   ```bash\n   a\n   ```\n\n2. Two\n\n   ```bash\n   b\n   ```\n\n3. Three\n";
        let starts: Vec<Option<u64>> = render(text, false)
            .blocks()
            .iter()
            .filter_map(|block| match block {
                Block::List(list) => Some(list.start),
                _ => None,
            })
            .collect();
        assert_eq!(starts, [Some(1), Some(2), Some(3)]);
    }
}
