//! Human-readable renderings of a submission for the channel post and the email.

use std::collections::HashMap;

use tera::{Context, Tera};
use thiserror::Error;

use crate::domain::submission::{FormField, Submission};
use crate::notify::EscalationDecision;

pub const CURRENCY_SYMBOL: &str = "₦";

const EMAIL_TEMPLATE_NAME: &str = "payment_email.txt";
const EMAIL_TEMPLATE: &str = "\
{{ banner }}A new payment application has been received via the Slack bot.

Name: {{ name }}
Reason: {{ reason }}
Amount: {{ amount | naira }}
Account Number: {{ account_number }}
Account Name: {{ account_name }}
Bank Name: {{ bank_name }}
Submitted: {{ submitted_at }}

Please find the attached Excel file for complete details.

This is an automated message from the Payment Bot.
";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("template error: {0}")]
    Template(String),
}

/// Prefixes the currency symbol unless the user already typed it.
pub fn format_amount(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with(CURRENCY_SYMBOL) {
        trimmed.to_owned()
    } else {
        format!("{CURRENCY_SYMBOL}{trimmed}")
    }
}

fn naira_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let raw = value.as_str().ok_or_else(|| tera::Error::msg("naira filter expects a string"))?;
    Ok(tera::Value::String(format_amount(raw)))
}

pub struct SummaryRenderer {
    tera: Tera,
}

impl SummaryRenderer {
    pub fn new() -> Result<Self, SummaryError> {
        let mut tera = Tera::default();
        tera.register_filter("naira", naira_filter);
        tera.add_raw_template(EMAIL_TEMPLATE_NAME, EMAIL_TEMPLATE)
            .map_err(|error| SummaryError::Template(error.to_string()))?;
        Ok(Self { tera })
    }

    pub fn channel_text(&self, submission: &Submission, decision: &EscalationDecision) -> String {
        let mut lines = vec![format!("{}*New payment application*", decision.banner())];
        for field in FormField::ORDERED {
            let value = match field {
                FormField::Amount => format_amount(submission.field(field)),
                _ => submission.field(field).to_owned(),
            };
            lines.push(format!("*{}:* {value}", field.label()));
        }
        lines.push(format!(
            "*Submitted by:* <@{}> at {}",
            submission.user_id,
            submission.timestamp_label()
        ));
        if let Some(mentions) = decision.mention_line() {
            lines.push(mentions);
        }
        lines.join("\n")
    }

    pub fn email_subject(&self, submission: &Submission, decision: &EscalationDecision) -> String {
        format!(
            "{}New Payment Application - {}",
            decision.subject_prefix(),
            submission.timestamp_label()
        )
    }

    pub fn email_body(
        &self,
        submission: &Submission,
        decision: &EscalationDecision,
    ) -> Result<String, SummaryError> {
        let mut context = Context::new();
        let banner = if decision.escalated {
            "HIGH VALUE: this request exceeds the escalation threshold.\n\n"
        } else {
            ""
        };
        context.insert("banner", banner);
        for field in FormField::ORDERED {
            context.insert(field.as_key(), submission.field(field));
        }
        context.insert("submitted_at", &submission.timestamp_label());

        self.tera
            .render(EMAIL_TEMPLATE_NAME, &context)
            .map_err(|error| SummaryError::Template(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_amount, SummaryRenderer};
    use crate::config::{MailConfig, NotifyConfig};
    use crate::domain::submission::{Submission, UserId};
    use crate::notify::EscalationPolicy;

    fn submission(amount: &str) -> Submission {
        Submission {
            user_id: UserId::from("U1"),
            name: "Jane Doe".to_owned(),
            reason: "Travel".to_owned(),
            amount: amount.to_owned(),
            account_number: "0123456789".to_owned(),
            account_name: "Jane Doe".to_owned(),
            bank_name: "First Bank".to_owned(),
            submitted_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).single().expect("valid time"),
        }
    }

    fn policy() -> EscalationPolicy {
        EscalationPolicy::new(
            &NotifyConfig {
                primary_user_id: Some("UACC".to_owned()),
                secondary_user_id: Some("UDIR".to_owned()),
            },
            &MailConfig::default(),
        )
    }

    #[test]
    fn currency_symbol_is_not_doubled() {
        assert_eq!(format_amount("50,000"), "₦50,000");
        assert_eq!(format_amount("₦50,000"), "₦50,000");
    }

    #[test]
    fn escalated_channel_text_has_banner_and_both_mentions() {
        let renderer = SummaryRenderer::new().expect("renderer");
        let decision = policy().evaluate("₦50,000");
        let text = renderer.channel_text(&submission("₦50,000"), &decision);

        assert!(text.starts_with(":rotating_light:"));
        assert!(text.contains("*Amount:* ₦50,000"));
        assert!(text.contains("*Bank Name:* First Bank"));
        assert!(text.ends_with("cc <@UACC> <@UDIR>"));
    }

    #[test]
    fn routine_channel_text_mentions_primary_only() {
        let renderer = SummaryRenderer::new().expect("renderer");
        let decision = policy().evaluate("12000");
        let text = renderer.channel_text(&submission("12000"), &decision);

        assert!(text.starts_with("*New payment application*"));
        assert!(text.contains("*Amount:* ₦12000"));
        assert!(!text.contains("UDIR"));
    }

    #[test]
    fn email_subject_and_body_follow_the_decision() {
        let renderer = SummaryRenderer::new().expect("renderer");
        let escalated = policy().evaluate("35000");
        let routine = policy().evaluate("3500");

        assert_eq!(
            renderer.email_subject(&submission("35000"), &escalated),
            "[HIGH VALUE] New Payment Application - 2026-03-01 09:30"
        );
        assert_eq!(
            renderer.email_subject(&submission("3500"), &routine),
            "New Payment Application - 2026-03-01 09:30"
        );

        let body = renderer.email_body(&submission("35000"), &escalated).expect("body");
        assert!(body.starts_with("HIGH VALUE"));
        assert!(body.contains("Amount: ₦35000"));
        assert!(body.contains("Account Number: 0123456789"));

        let body = renderer.email_body(&submission("3500"), &routine).expect("body");
        assert!(body.starts_with("A new payment application"));
    }
}
