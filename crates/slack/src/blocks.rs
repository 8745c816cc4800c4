use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        emoji: Option<bool>,
    },
    Mrkdwn {
        text: String,
    },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into(), emoji: None }
    }

    pub fn plain_emoji(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into(), emoji: Some(true) }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::PlainText { text, .. } | Self::Mrkdwn { text } => text,
        }
    }
}

/// Slack rejects option `text` and `description` longer than this.
pub const OPTION_TEXT_MAX_CHARS: usize = 75;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionObject {
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<TextObject>,
    pub value: String,
}

impl OptionObject {
    /// Checkbox option with `text` and `description` cut to the Slack limit.
    pub fn mrkdwn(text: &str, description: Option<&str>, value: impl Into<String>) -> Self {
        Self {
            text: TextObject::mrkdwn(truncate_chars(text, OPTION_TEXT_MAX_CHARS)),
            description: description
                .map(|description| TextObject::mrkdwn(truncate_chars(description, OPTION_TEXT_MAX_CHARS))),
            value: value.into(),
        }
    }
}

/// Cuts `text` to at most `max_chars` characters, ending with `…` when shortened.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_owned();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Button {
        action_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    PlainTextInput {
        action_id: String,
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_value: Option<String>,
    },
    UsersSelect {
        action_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_user: Option<String>,
    },
    Checkboxes {
        action_id: String,
        options: Vec<OptionObject>,
    },
    Image {
        image_url: String,
        alt_text: String,
    },
}

impl Element {
    pub fn button(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Button {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            value: None,
        }
    }

    pub fn multiline_input(action_id: impl Into<String>, initial_value: Option<String>) -> Self {
        Self::PlainTextInput {
            action_id: action_id.into(),
            multiline: true,
            initial_value: initial_value.filter(|value| !value.is_empty()),
        }
    }

    pub fn with_value(mut self, new_value: impl Into<String>) -> Self {
        if let Self::Button { value, .. } = &mut self {
            *value = Some(new_value.into());
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RichTextListStyle {
    Bullet,
    Ordered,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextElement {
    RichTextList { style: RichTextListStyle, elements: Vec<RichTextElement> },
    RichTextSection { elements: Vec<RichTextElement> },
    Text { text: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Element>,
    },
    Actions {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        elements: Vec<Element>,
    },
    Input {
        block_id: String,
        element: Element,
        label: TextObject,
    },
    Divider,
    RichText {
        elements: Vec<RichTextElement>,
    },
}

impl Block {
    pub fn block_id(&self) -> Option<&str> {
        match self {
            Self::Section { block_id, .. } | Self::Actions { block_id, .. } => block_id.as_deref(),
            Self::Input { block_id, .. } => Some(block_id),
            Self::Divider | Self::RichText { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewType {
    Modal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub view_type: ViewType,
    pub callback_id: String,
    pub title: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<TextObject>,
    pub blocks: Vec<Block>,
}

impl ModalView {
    pub fn new(callback_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            view_type: ViewType::Modal,
            callback_id: callback_id.into(),
            title: TextObject::plain(title),
            submit: None,
            close: None,
            blocks: Vec::new(),
        }
    }

    pub fn submit(mut self, label: impl Into<String>) -> Self {
        self.submit = Some(TextObject::plain(label));
        self
    }

    pub fn close(mut self, label: impl Into<String>) -> Self {
        self.close = Some(TextObject::plain(label));
        self
    }

    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn find_block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.block_id() == Some(block_id))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build());
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn bullet_list<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut BulletListBuilder),
    {
        let mut builder = BulletListBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build());
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    block_id: Option<String>,
    text: Option<TextObject>,
    accessory: Option<Element>,
}

impl SectionBuilder {
    pub fn block_id(&mut self, block_id: impl Into<String>) -> &mut Self {
        self.block_id = Some(block_id.into());
        self
    }

    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn accessory(&mut self, element: Element) -> &mut Self {
        self.accessory = Some(element);
        self
    }

    pub fn build(self) -> Block {
        Block::Section {
            block_id: self.block_id,
            text: self.text.unwrap_or_else(|| TextObject::mrkdwn(" ")),
            accessory: self.accessory,
        }
    }
}

/// One rich-text bullet per item; each item is a run of text spans.
#[derive(Default)]
pub struct BulletListBuilder {
    items: Vec<Vec<String>>,
}

impl BulletListBuilder {
    pub fn item<I, S>(&mut self, spans: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items.push(spans.into_iter().map(Into::into).collect());
        self
    }

    fn build(self) -> Block {
        let sections = self
            .items
            .into_iter()
            .map(|spans| RichTextElement::RichTextSection {
                elements: spans.into_iter().map(|text| RichTextElement::Text { text }).collect(),
            })
            .collect();

        Block::RichText {
            elements: vec![RichTextElement::RichTextList {
                style: RichTextListStyle::Bullet,
                elements: sections,
            }],
        }
    }
}
