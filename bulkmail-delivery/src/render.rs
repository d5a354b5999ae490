//! Plain text rendering of built messages for simulated runs.

use lettre::Message;
use mailparse::{DispositionType, MailHeaderMap, MailParseError, ParsedMail};

/// Render `message` the way a reader would see it: sender, recipients and
/// subject lines, then the text body and the name of each attachment.
///
/// The text comes from parsing the fully formatted message, so it shows
/// exactly what would go on the wire after decoding.
///
/// # Errors
///
/// Returns an error if the formatted message cannot be parsed back.
pub fn render(message: &Message) -> Result<String, MailParseError> {
    let formatted = message.formatted();
    let parsed = mailparse::parse_mail(&formatted)?;
    let headers = parsed.get_headers();

    let mut text = String::from("\n");
    for (label, header) in [("FROM", "From"), ("TO", "To"), ("RE", "Subject")] {
        text.push_str(label);
        text.push_str(": ");
        text.push_str(&headers.get_first_value(header).unwrap_or_default());
        text.push('\n');
    }

    append_parts(&parsed, &mut text)?;
    text.push('\n');

    Ok(text)
}

fn append_parts(part: &ParsedMail<'_>, text: &mut String) -> Result<(), MailParseError> {
    if !part.subparts.is_empty() {
        for subpart in &part.subparts {
            append_parts(subpart, text)?;
        }
        return Ok(());
    }

    let disposition = part.get_content_disposition();
    let file_name = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"));

    if disposition.disposition == DispositionType::Attachment || file_name.is_some() {
        text.push('\n');
        text.push_str(file_name.map_or("", String::as_str));
    } else if part.ctype.mimetype.starts_with("text/") {
        let body = part.get_body()?;
        text.push('\n');
        text.push_str(body.replace("\r\n", "\n").trim_end_matches('\n'));
    }

    Ok(())
}
