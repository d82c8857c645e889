use mailparse::{parse_mail, DispositionType, MailHeaderMap, ParsedMail};

use crate::admission::sanitize_filename;
use crate::error::Result;
use crate::types::{InboundMail, MailAttachment};

/// Normalize a raw RFC 822 message into an [`InboundMail`]: bare sender
/// address, subject, first text/plain and text/html bodies, attachments by
/// content disposition.
pub fn parse_inbound(uid: &str, raw: &[u8]) -> Result<InboundMail> {
    let parsed = parse_mail(raw)?;
    let mut mail = InboundMail {
        uid: uid.to_string(),
        sender: bare_address(&parsed.headers.get_first_value("From").unwrap_or_default()),
        subject: parsed.headers.get_first_value("Subject").unwrap_or_default(),
        ..InboundMail::default()
    };
    collect_parts(&parsed, &mut mail)?;
    Ok(mail)
}

/// Reduce a `From:` header to the bare address; falls back to the raw header
/// when it does not parse as an address list.
fn bare_address(raw: &str) -> String {
    match mailparse::addrparse(raw) {
        Ok(list) => list
            .extract_single_info()
            .map(|info| info.addr)
            .unwrap_or_else(|| raw.trim().to_string()),
        Err(_) => raw.trim().to_string(),
    }
}

fn collect_parts(part: &ParsedMail<'_>, mail: &mut InboundMail) -> Result<()> {
    let disposition = part.get_content_disposition();
    if disposition.disposition == DispositionType::Attachment {
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .map(String::as_str)
            .unwrap_or("attachment");
        let bytes = part.get_body_raw()?;
        mail.attachments.push(MailAttachment {
            filename: sanitize_filename(filename),
            size: bytes.len() as u64,
            bytes,
        });
        return Ok(());
    }

    if part.subparts.is_empty() {
        match part.ctype.mimetype.as_str() {
            "text/plain" if mail.text.is_empty() => mail.text = part.get_body()?,
            "text/html" if mail.html.is_empty() => mail.html = part.get_body()?,
            _ => {}
        }
    }
    for sub in &part.subparts {
        collect_parts(sub, mail)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: Alice Example <alice@example.com>\r\n\
To: claims@insurer.test\r\n\
Subject: My car was hit\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
Rear-ended on Main St\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"police/report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"police/report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0=\r\n\
--XYZ--\r\n";

    #[test]
    fn multipart_message_is_fully_normalized() {
        let mail = parse_inbound("1001", MULTIPART.as_bytes()).unwrap();
        assert_eq!(mail.uid, "1001");
        assert_eq!(mail.sender, "alice@example.com");
        assert_eq!(mail.subject, "My car was hit");
        assert_eq!(mail.text.trim(), "Rear-ended on Main St");
        assert_eq!(mail.attachments.len(), 1);
        assert_eq!(mail.attachments[0].filename, "police_report.pdf");
        assert_eq!(mail.attachments[0].bytes, b"%PDF-");
    }

    #[test]
    fn plain_message_without_attachments() {
        let raw = "From: bob@example.com\r\n\
Subject: Re: My car was hit\r\n\
Content-Type: text/plain\r\n\
\r\n\
It happened yesterday at 9am\r\n";
        let mail = parse_inbound("1002", raw.as_bytes()).unwrap();
        assert_eq!(mail.sender, "bob@example.com");
        assert_eq!(mail.body().trim(), "It happened yesterday at 9am");
        assert!(mail.attachments.is_empty());
    }

    #[test]
    fn html_body_is_the_fallback() {
        let raw = "From: carol@example.com\r\n\
Subject: pictures\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>see below</p>\r\n";
        let mail = parse_inbound("1003", raw.as_bytes()).unwrap();
        assert!(mail.text.is_empty());
        assert_eq!(mail.body().trim(), "<p>see below</p>");
    }
}
