use paybot_core::export::{format_amount, ExportVerdict};
use paybot_core::flows::Prompt;
use paybot_core::{FormField, SubmissionDraft, UserId};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
    Divider,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

/// A Home tab view as accepted by `views.publish`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HomeView {
    #[serde(rename = "type")]
    pub kind: &'static str,
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

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// A single mrkdwn section; most conversational replies are one line of text.
pub fn text_message(block_id: &str, text: impl Into<String>) -> MessageTemplate {
    let text = text.into();
    MessageBuilder::new(text.clone())
        .section(block_id, |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn greeting_message(user_id: &UserId) -> MessageTemplate {
    text_message(
        "form.greeting.v1",
        format!(
            "Hello <@{user_id}>, Welcome to the payment bot! :wave:\nPlease type `/form` to begin the application process."
        ),
    )
}

pub fn question_text(field: FormField) -> &'static str {
    match field {
        FormField::Name => "Please enter your name:",
        FormField::Reason => "Please enter your reason for payment:",
        FormField::Amount => "Please enter the payment amount:",
        FormField::AccountNumber => "Please enter account number:",
        FormField::AccountName => "Please enter your account name:",
        FormField::BankName => "Please enter your bank name:",
    }
}

pub fn review_message(draft: &SubmissionDraft) -> MessageTemplate {
    let details = FormField::ORDERED
        .into_iter()
        .map(|field| {
            let value = draft.get(field).unwrap_or("-");
            let value = match field {
                FormField::Amount => format_amount(value),
                _ => value.to_owned(),
            };
            format!("*{}:* {value}", field.label())
        })
        .collect::<Vec<_>>()
        .join("\n");

    MessageBuilder::new("Please confirm your application details")
        .section("form.review.header.v1", |section| {
            section.mrkdwn("Please confirm your application details:");
        })
        .section("form.review.details.v1", |section| {
            section.mrkdwn(details);
        })
        .context("form.review.hint.v1", |context| {
            context.mrkdwn("Review the details and reply with *Yes* to confirm or *No* to cancel.");
        })
        .build()
}

/// Renders a flow prompt. The review prompt reads the draft as it stands after the
/// transition's field updates.
pub fn prompt_message(prompt: &Prompt, user_id: &UserId, draft: &SubmissionDraft) -> MessageTemplate {
    match prompt {
        Prompt::Greeting => greeting_message(user_id),
        Prompt::IdleHint => text_message(
            "form.idle.v1",
            "Hi! Use `/form` to start a payment application or `/start` for more information.",
        ),
        Prompt::Ask(field) => {
            text_message(&format!("form.ask.{}.v1", field.as_key()), question_text(*field))
        }
        Prompt::ChooseMode => text_message(
            "form.choice.v1",
            "You have a previous application on file. Reply `update` to reuse your name and account details, or `full` to fill in the whole form.",
        ),
        Prompt::InvalidChoice => {
            text_message("form.choice.invalid.v1", "Invalid response. Please reply with 'update' or 'full'.")
        }
        Prompt::ReviewDetails => review_message(draft),
        Prompt::InvalidConfirmation => {
            text_message("form.confirm.invalid.v1", "Invalid response. Please reply with 'Yes' or 'No'.")
        }
        Prompt::Cancelled => {
            text_message("form.cancelled.v1", "Application canceled. Use `/form` to fill the form again.")
        }
    }
}

pub fn export_result_message(verdict: &ExportVerdict) -> MessageTemplate {
    match verdict {
        ExportVerdict::Submitted => text_message(
            "form.export.submitted.v1",
            "Your application has been submitted successfully, and the accountant has been notified. :white_check_mark:",
        ),
        ExportVerdict::SavedWithWarnings { failed } => {
            let parts = failed.iter().map(|sink| sink.label()).collect::<Vec<_>>().join(", ");
            text_message(
                "form.export.partial.v1",
                format!(
                    "Your application was saved, but there was an error with the {parts}. Please contact support."
                ),
            )
        }
        ExportVerdict::SaveFailed => text_message(
            "form.export.failed.v1",
            "An error occurred while saving your data. Please try again.",
        ),
    }
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("form.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("form.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn home_view() -> HomeView {
    let message = MessageBuilder::new("Payment bot")
        .header("home.header.v1", "Payment Bot")
        .section("home.intro.v1", |section| {
            section.mrkdwn(
                "Submit payment applications without leaving Slack. Answers are collected one question at a time in a direct message.",
            );
        })
        .divider()
        .section("home.commands.v1", |section| {
            section.mrkdwn(
                "*Commands*\n• `/start` shows the welcome message\n• `/form` starts a new application\n• `/cancel` discards the application in progress",
            );
        })
        .context("home.footer.v1", |context| {
            context.mrkdwn("Applications above ₦30,000 are escalated for additional review.");
        })
        .build();

    HomeView { kind: "home", blocks: message.blocks }
}
