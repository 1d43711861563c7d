//! Message bodies for one-time code emails.

use chrono::Duration;

use super::OutgoingEmail;
use crate::auth::CodePurpose;

/// Render the email carrying a one-time code.
pub fn code_email(purpose: CodePurpose, to: &str, code: &str, ttl: Duration) -> OutgoingEmail {
    let minutes = (ttl.num_seconds() + 59) / 60;
    let (subject, heading, intro) = match purpose {
        CodePurpose::Verification => (
            "Email Verification Code - Lets Talk",
            "Verify your email",
            "Use the code below to verify your Lets Talk account.",
        ),
        CodePurpose::Recovery => (
            "Password Recovery Code - Lets Talk",
            "Reset your password",
            "Use the code below to reset your Lets Talk password.",
        ),
    };

    let text_body = format!("Your verification code is {code}. It will expire in {minutes} minutes.");

    let html_body = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 480px; margin: auto; padding: 20px;">
  <h2 style="color: #333;">{heading}</h2>
  <p>{intro}</p>
  <p style="font-size: 28px; font-weight: bold; letter-spacing: 6px; color: #4a90e2;">{code}</p>
  <p>This code will expire in <strong>{minutes} minutes</strong>.</p>
  <hr style="margin: 20px 0; border: none; border-top: 1px solid #ddd;">
  <p style="font-size: 12px; color: #aaa;">
    For your security, never share this code with anyone. The Lets Talk team will never ask for it.
  </p>
</div>"#
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: subject.to_string(),
        text_body,
        html_body,
    }
}
