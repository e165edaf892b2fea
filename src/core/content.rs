use crate::config::FieldLimits;
use crate::domain::model::{EmailAddress, OutboundEmail};
use crate::utils::validation::{sanitize, MAX_EMAIL_LENGTH, MAX_URL_LENGTH};

#[derive(Debug, Clone, PartialEq)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// 產生面試邀請信內容。輸入在此重新 sanitize，不依賴上游驗證
pub fn build_email(
    name: &str,
    round: &str,
    calendly_url: &str,
    limits: &FieldLimits,
) -> EmailContent {
    let name = sanitize(name, limits.max_name_length);
    let round = sanitize(round, limits.max_round_length);
    let url = sanitize(calendly_url, MAX_URL_LENGTH);

    let subject = format!("Interview Invitation – {} Round", round);

    let text = format!(
        "Hi {name},\n\n\
         Thank you for your interest in joining our team. We would like to invite you to the \
         {round} round of our interview process.\n\n\
         Please pick a time that works for you using the link below:\n\
         {url}\n\n\
         If none of the available slots suit you, just reply to this email and we will find \
         another time.\n\n\
         Best regards,\n\
         Recruiting Team"
    );

    let html = format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <body style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333;\">\n\
         <p>Hi {name},</p>\n\
         <p>Thank you for your interest in joining our team. We would like to invite you to the \
         <strong>{round}</strong> round of our interview process.</p>\n\
         <p>Please pick a time that works for you:</p>\n\
         <p><a href=\"{url}\" style=\"background-color: #0069ff; color: #fff; padding: 10px 18px; \
         text-decoration: none; border-radius: 4px;\">Schedule your {round} interview</a></p>\n\
         <p>If the button does not work, copy this link into your browser:<br>{url}</p>\n\
         <p>Best regards,<br>Recruiting Team</p>\n\
         </body>\n\
         </html>"
    );

    EmailContent {
        subject,
        text,
        html,
    }
}

impl OutboundEmail {
    pub fn new(
        from: EmailAddress,
        to_email: &str,
        to_name: &str,
        content: EmailContent,
        limits: &FieldLimits,
    ) -> Self {
        Self {
            from,
            to: vec![EmailAddress {
                email: sanitize(to_email, MAX_EMAIL_LENGTH),
                name: sanitize(to_name, limits.max_name_length),
            }],
            subject: content.subject,
            text: content.text,
            html: content.html,
        }
    }
}
