use serde::Serialize;

use reviewdesk_core::navigation::ActionToken;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    /// Encoded action token delivered back when the button is pressed.
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: ActionToken) -> Self {
        Self { label: label.into(), token: token.encode() }
    }
}

/// Render instruction handed to the transport: message text plus an inline
/// keyboard laid out row by row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Screen {
    pub text: String,
    pub rows: Vec<Vec<Button>>,
}

impl Screen {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self { text: text.into(), rows: Vec::new() }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    pub fn find_button(&self, label: &str) -> Option<&Button> {
        self.buttons().find(|button| button.label == label)
    }

    pub fn has_token(&self, token: &ActionToken) -> bool {
        let wire = token.encode();
        self.buttons().any(|button| button.token == wire)
    }
}

pub struct ScreenBuilder {
    text: String,
    rows: Vec<Vec<Button>>,
}

impl ScreenBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), rows: Vec::new() }
    }

    /// Appends a paragraph separated from the previous text by a blank line.
    pub fn paragraph(mut self, text: impl AsRef<str>) -> Self {
        if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        self.text.push_str(text.as_ref());
        self
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut builder = RowBuilder::default();
        build(&mut builder);
        if !builder.buttons.is_empty() {
            self.rows.push(builder.buttons);
        }
        self
    }

    pub fn button(self, label: impl Into<String>, token: ActionToken) -> Self {
        self.row(|row| {
            row.button(label, token);
        })
    }

    pub fn build(self) -> Screen {
        Screen { text: self.text, rows: self.rows }
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<Button>,
}

impl RowBuilder {
    pub fn button(&mut self, label: impl Into<String>, token: ActionToken) -> &mut Self {
        self.buttons.push(Button::new(label, token));
        self
    }

    pub fn button_if(
        &mut self,
        condition: bool,
        label: impl Into<String>,
        token: ActionToken,
    ) -> &mut Self {
        if condition {
            self.button(label, token);
        }
        self
    }
}
