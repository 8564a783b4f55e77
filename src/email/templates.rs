//! Notification templates
//!
//! One template per [`EmailType`]. Values come from a JSON object; missing
//! values fall back to neutral wording so a sparse payload still renders.

use serde_json::{Map, Value};

use super::EmailType;

/// A rendered message, ready for a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

struct Vars<'a> {
    data: &'a Map<String, Value>,
}

impl Vars<'_> {
    /// Plain value, with a fallback
    fn get(&self, key: &str, fallback: &str) -> String {
        match self.data.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => fallback.to_string(),
        }
    }

    /// HTML-escaped value
    fn html(&self, key: &str, fallback: &str) -> String {
        escape_html(&self.get(key, fallback))
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(heading: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;color:#1f2937\">\
         <h2 style=\"color:#0f4c81\">{}</h2>{}\
         <p style=\"font-size:12px;color:#6b7280\">Window Man &middot; Impact windows across Florida</p>\
         </body></html>",
        heading, body
    )
}

pub fn render(email_type: EmailType, data: &Map<String, Value>) -> RenderedEmail {
    let v = Vars { data };

    match email_type {
        EmailType::NewLeadAlert => {
            let subject = format!(
                "New lead: {} via {}",
                v.get("name", "Unknown"),
                v.get("sourceTool", "website")
            );
            let rows = [
                ("Name", "name", "Unknown"),
                ("Email", "email", "-"),
                ("Phone", "phone", "-"),
                ("Source", "sourceTool", "website"),
                ("Channel", "channel", "direct"),
                ("Landing page", "landingPage", "/"),
            ];
            let table: String = rows
                .iter()
                .map(|(label, key, fallback)| {
                    format!("<tr><td><b>{}</b></td><td>{}</td></tr>", label, v.html(key, fallback))
                })
                .collect();
            let text = rows
                .iter()
                .map(|(label, key, fallback)| format!("{}: {}", label, v.get(key, fallback)))
                .collect::<Vec<_>>()
                .join("\n");

            RenderedEmail {
                subject,
                html: layout("New lead captured", &format!("<table>{}</table>", table)),
                text,
            }
        }
        EmailType::QuoteRequestReceived => {
            let name = v.get("name", "there");
            RenderedEmail {
                subject: "We received your window quote request".to_string(),
                html: layout(
                    &format!("Thanks, {}!", escape_html(&name)),
                    &format!(
                        "<p>We received your request for {} and a specialist will reach out within one business day.</p>",
                        v.html("projectType", "your window project")
                    ),
                ),
                text: format!(
                    "Thanks, {}! We received your request for {} and a specialist will reach out within one business day.",
                    name,
                    v.get("projectType", "your window project")
                ),
            }
        }
        EmailType::ConsultationScheduled => {
            let when = v.get("appointmentTime", "the time you selected");
            RenderedEmail {
                subject: format!("Your consultation is confirmed for {}", when),
                html: layout(
                    "Consultation confirmed",
                    &format!(
                        "<p>Hi {}, your in-home consultation is booked for <b>{}</b> at {}.</p>",
                        v.html("name", "there"),
                        escape_html(&when),
                        v.html("address", "your home")
                    ),
                ),
                text: format!(
                    "Hi {}, your in-home consultation is booked for {} at {}.",
                    v.get("name", "there"),
                    when,
                    v.get("address", "your home")
                ),
            }
        }
        EmailType::EstimateReady => {
            let amount = v.get("estimateAmount", "");
            let amount_line = if amount.is_empty() {
                "Your estimate is ready to review.".to_string()
            } else {
                format!("Your estimate of ${} is ready to review.", amount)
            };
            let link = v.get("estimateUrl", "");
            let link_html = if link.is_empty() {
                String::new()
            } else {
                format!("<p><a href=\"{}\">View your estimate</a></p>", escape_html(&link))
            };
            RenderedEmail {
                subject: "Your impact window estimate is ready".to_string(),
                html: layout(
                    "Your estimate is ready",
                    &format!(
                        "<p>Hi {}, {}</p>{}",
                        v.html("name", "there"),
                        escape_html(&amount_line),
                        link_html
                    ),
                ),
                text: format!(
                    "Hi {}, {}{}",
                    v.get("name", "there"),
                    amount_line,
                    if link.is_empty() { String::new() } else { format!(" {}", link) }
                ),
            }
        }
        EmailType::FollowUp => RenderedEmail {
            subject: "Still thinking about new windows?".to_string(),
            html: layout(
                "Still thinking it over?",
                &format!(
                    "<p>Hi {}, {}</p>",
                    v.html("name", "there"),
                    v.html(
                        "message",
                        "hurricane season is coming. Reply to this email and we'll help you plan."
                    )
                ),
            ),
            text: format!(
                "Hi {}, {}",
                v.get("name", "there"),
                v.get(
                    "message",
                    "hurricane season is coming. Reply to this email and we'll help you plan."
                )
            ),
        },
    }
}
