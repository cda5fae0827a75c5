/// Builds a composite prompt: the role template followed by titled sections,
/// each separated by a blank line.
///
/// ```text
/// <template>
///
/// Contexte précédent:
/// <memory>
///
/// <instruction>
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    out: String,
}

impl PromptBuilder {
    pub fn new(template: &str) -> Self {
        Self {
            out: template.to_string(),
        }
    }

    /// `"{title}:\n{body}"`, written even when `body` is empty.
    pub fn section(mut self, title: &str, body: &str) -> Self {
        self.push_block(&format!("{title}:\n{body}"));
        self
    }

    pub fn text(mut self, body: &str) -> Self {
        self.push_block(body);
        self
    }

    pub fn build(self) -> String {
        self.out
    }

    fn push_block(&mut self, block: &str) {
        if !self.out.is_empty() {
            self.out.push_str("\n\n");
        }
        self.out.push_str(block);
    }
}
