//! Threshold escalation for high-value applications.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::{MailConfig, NotifyConfig};

/// Amounts strictly above this value escalate.
pub const ESCALATION_THRESHOLD: Decimal = Decimal::from_parts(30_000, 0, 0, false, 0);

pub const ESCALATION_BANNER: &str = ":rotating_light: *High-value request* ";

/// Parses free-text amounts such as `₦35,000` or `NGN 1,250.50`. Anything that is not
/// an ASCII digit or a decimal point is dropped first, and a `-` ahead of the first digit
/// keeps the sign. Input without digits or with more than one decimal point counts as
/// zero; a digit run too large for `Decimal` saturates instead.
pub fn parse_amount(raw: &str) -> Decimal {
    let negative =
        raw.chars().find(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-')) == Some('-');
    let cleaned: String = raw.chars().filter(|ch| ch.is_ascii_digit() || *ch == '.').collect();
    if !cleaned.chars().any(|ch| ch.is_ascii_digit()) || cleaned.matches('.').count() > 1 {
        return Decimal::ZERO;
    }

    let magnitude = Decimal::from_str(&cleaned).unwrap_or(Decimal::MAX);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

pub fn exceeds_threshold(raw_amount: &str) -> bool {
    parse_amount(raw_amount) > ESCALATION_THRESHOLD
}

/// The single escalation decision shared by every sink for one submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EscalationDecision {
    pub escalated: bool,
    pub parsed_amount: Decimal,
    pub channel_mentions: Vec<String>,
    pub mail_recipients: Vec<String>,
}

impl EscalationDecision {
    pub fn banner(&self) -> &'static str {
        if self.escalated {
            ESCALATION_BANNER
        } else {
            ""
        }
    }

    pub fn subject_prefix(&self) -> &'static str {
        if self.escalated {
            "[HIGH VALUE] "
        } else {
            ""
        }
    }

    pub fn mention_line(&self) -> Option<String> {
        if self.channel_mentions.is_empty() {
            return None;
        }
        let tags = self
            .channel_mentions
            .iter()
            .map(|user_id| format!("<@{user_id}>"))
            .collect::<Vec<_>>()
            .join(" ");
        Some(format!("cc {tags}"))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EscalationPolicy {
    primary_user_id: Option<String>,
    secondary_user_id: Option<String>,
    receivers: Vec<String>,
    escalation_receivers: Vec<String>,
}

impl EscalationPolicy {
    pub fn new(notify: &NotifyConfig, mail: &MailConfig) -> Self {
        Self {
            primary_user_id: notify.primary_user_id.clone(),
            secondary_user_id: notify.secondary_user_id.clone(),
            receivers: mail.receivers.clone(),
            escalation_receivers: mail.escalation_receivers.clone(),
        }
    }

    pub fn evaluate(&self, raw_amount: &str) -> EscalationDecision {
        let parsed_amount = parse_amount(raw_amount);
        let escalated = parsed_amount > ESCALATION_THRESHOLD;

        let mut channel_mentions = Vec::new();
        channel_mentions.extend(self.primary_user_id.iter().cloned());
        if escalated {
            channel_mentions.extend(self.secondary_user_id.iter().cloned());
        }

        let mut mail_recipients = self.receivers.clone();
        if escalated {
            for recipient in &self.escalation_receivers {
                if !mail_recipients.contains(recipient) {
                    mail_recipients.push(recipient.clone());
                }
            }
        }

        EscalationDecision { escalated, parsed_amount, channel_mentions, mail_recipients }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{exceeds_threshold, parse_amount, EscalationPolicy, ESCALATION_THRESHOLD};
    use crate::config::{MailConfig, NotifyConfig};

    fn policy() -> EscalationPolicy {
        EscalationPolicy::new(
            &NotifyConfig {
                primary_user_id: Some("UACCOUNTANT".to_owned()),
                secondary_user_id: Some("UDIRECTOR".to_owned()),
            },
            &MailConfig {
                receivers: vec!["accounts@example.com".to_owned()],
                escalation_receivers: vec!["director@example.com".to_owned()],
                ..MailConfig::default()
            },
        )
    }

    #[test]
    fn threshold_constant_is_thirty_thousand() {
        assert_eq!(ESCALATION_THRESHOLD, Decimal::new(30_000, 0));
    }

    #[test]
    fn strips_currency_glyphs_and_separators() {
        assert_eq!(parse_amount("₦35,000"), Decimal::new(35_000, 0));
        assert_eq!(parse_amount("NGN 1,250.50"), Decimal::new(125_050, 2));
        assert_eq!(parse_amount(" 42 "), Decimal::new(42, 0));
    }

    #[test]
    fn unparsable_amounts_are_zero() {
        assert_eq!(parse_amount("abc"), Decimal::ZERO);
        assert_eq!(parse_amount(""), Decimal::ZERO);
        assert_eq!(parse_amount("1.2.3"), Decimal::ZERO);
    }

    #[test]
    fn escalation_is_strictly_greater_than_threshold() {
        assert!(exceeds_threshold("35000"));
        assert!(exceeds_threshold("₦35,000"));
        assert!(exceeds_threshold("30000.01"));
        assert!(!exceeds_threshold("30000"));
        assert!(!exceeds_threshold("₦30,000"));
        assert!(!exceeds_threshold("abc"));
    }

    #[test]
    fn oversized_amounts_saturate_and_escalate() {
        let raw = "1000000000000000000000000000000000000000";
        assert_eq!(parse_amount(raw), Decimal::MAX);
        assert!(exceeds_threshold(raw));
        assert!(exceeds_threshold("₦99,999,999,999,999,999,999,999,999,999,999"));
    }

    #[test]
    fn leading_minus_keeps_the_sign() {
        assert_eq!(parse_amount("-35000"), Decimal::new(-35_000, 0));
        assert_eq!(parse_amount("NGN -1,250.50"), Decimal::new(-125_050, 2));
        assert_eq!(parse_amount("35000-"), Decimal::new(35_000, 0));
        assert!(!exceeds_threshold("-35000"));
        assert!(!exceeds_threshold("-₦35,000"));
    }

    #[test]
    fn escalated_decision_adds_secondary_recipients_everywhere() {
        let decision = policy().evaluate("₦50,000");

        assert!(decision.escalated);
        assert_eq!(decision.channel_mentions, vec!["UACCOUNTANT", "UDIRECTOR"]);
        assert_eq!(
            decision.mail_recipients,
            vec!["accounts@example.com", "director@example.com"]
        );
        assert!(!decision.banner().is_empty());
        assert_eq!(decision.subject_prefix(), "[HIGH VALUE] ");
        assert_eq!(decision.mention_line().as_deref(), Some("cc <@UACCOUNTANT> <@UDIRECTOR>"));
    }

    #[test]
    fn routine_decision_keeps_primary_only() {
        let decision = policy().evaluate("30000");

        assert!(!decision.escalated);
        assert_eq!(decision.channel_mentions, vec!["UACCOUNTANT"]);
        assert_eq!(decision.mail_recipients, vec!["accounts@example.com"]);
        assert_eq!(decision.banner(), "");
    }

    #[test]
    fn missing_recipients_produce_no_mention_line() {
        let decision = EscalationPolicy::default().evaluate("99999");
        assert!(decision.escalated);
        assert_eq!(decision.mention_line(), None);
    }
}
