//! Maps `(sender, subject)` of an inbound mail to an existing or freshly
//! minted claim id. Precedence: explicit subject tag, then subject
//! fingerprint, then the sender's single open claim, then mint.

use once_cell::sync::Lazy;
use regex::Regex;
use sha1::{Digest, Sha1};
use uuid::Uuid;

use claim_core::{ClaimRecord, ClaimStage};
use session_store::SessionStore;

static CLAIM_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCLM-[A-Za-z0-9-]{6,}\b").expect("claim tag regex"));
static TAG_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[?clm-[a-z0-9-]+\]?").expect("tag strip regex"));
static REPLY_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(re|fwd|fw):\s*").expect("reply prefix regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize a subject line for threading: lowercase, drop `[CLM-…]` tags,
/// drop one leading reply/forward prefix, collapse whitespace. A subject that
/// is nothing but a claim tag normalizes to empty.
pub fn normalize_subject(subject: &str) -> String {
    let lowered = subject.to_lowercase();
    let stripped = TAG_STRIP_RE.replace_all(&lowered, " ");
    let unprefixed = REPLY_PREFIX_RE.replace(stripped.trim_start(), "");
    WHITESPACE_RE.replace_all(&unprefixed, " ").trim().to_string()
}

/// Stable fingerprint over `(sender, normalized subject)`. Used only as a
/// threading fallback, never as a claim id.
pub fn subject_fingerprint(sender: &str, normalized_subject: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("{}|{}", sender.to_lowercase(), normalized_subject).as_bytes());
    hex::encode(hasher.finalize())
}

/// First `CLM-…` token in the subject, if any.
pub fn extract_claim_tag(subject: &str) -> Option<String> {
    CLAIM_TAG_RE.find(subject).map(|found| found.as_str().to_string())
}

pub fn mint_claim_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("CLM-{}", hex[..10].to_uppercase())
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub claim_id: String,
    pub minted: bool,
}

/// Resolve an inbound message to a claim id. Deterministic for a fixed store
/// until the mint fallback is reached.
pub async fn resolve(
    store: &dyn SessionStore,
    sender: &str,
    subject: &str,
) -> session_store::Result<Resolution> {
    let tag = extract_claim_tag(subject);
    if let Some(tag) = &tag {
        if store.load_claim(tag).await?.is_some() {
            return Ok(Resolution { claim_id: tag.clone(), minted: false });
        }
    }

    let normalized = normalize_subject(subject);
    if !normalized.is_empty() {
        let fingerprint = subject_fingerprint(sender, &normalized);
        let predicate = |claim: &ClaimRecord| {
            claim.sender_email == sender && claim.subject_fp.as_deref() == Some(fingerprint.as_str())
        };
        let matches = store.scan_claims(&predicate).await?;
        if matches.len() == 1 {
            return Ok(Resolution {
                claim_id: matches[0].claim_id.clone(),
                minted: false,
            });
        }
    }

    // Last-active fallback: an empty subject, or a claim tag that resolved to
    // nothing, both signal a reply rather than a fresh report. Route to the
    // sender's single open claim when there is exactly one.
    if normalized.is_empty() || tag.is_some() {
        let predicate = |claim: &ClaimRecord| {
            claim.sender_email == sender && claim.stage != ClaimStage::Complete
        };
        let open = store.scan_claims(&predicate).await?;
        if open.len() == 1 {
            return Ok(Resolution {
                claim_id: open[0].claim_id.clone(),
                minted: false,
            });
        }
    }

    Ok(Resolution {
        claim_id: mint_claim_id(),
        minted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_reply_prefix_and_lowers() {
        assert_eq!(normalize_subject("Re: My car was hit"), "my car was hit");
        assert_eq!(normalize_subject("FWD:   Broken   window"), "broken window");
        assert_eq!(normalize_subject("My car was hit"), "my car was hit");
    }

    #[test]
    fn normalize_drops_claim_tags() {
        assert_eq!(normalize_subject("Update [CLM-ABCDEF1234]"), "update");
        assert_eq!(normalize_subject("[CLM-ABCDEF1234]"), "");
        assert_eq!(normalize_subject("Re: [clm-abc-123] hello"), "hello");
    }

    #[test]
    fn fingerprint_matches_known_digest() {
        // SHA1("alice@example.com|my car was hit")
        let fp = subject_fingerprint("alice@example.com", "my car was hit");
        assert_eq!(fp.len(), 40);
        assert_eq!(fp, subject_fingerprint("ALICE@example.com", "my car was hit"));
        assert_ne!(fp, subject_fingerprint("bob@example.com", "my car was hit"));
    }

    #[test]
    fn tag_extraction_requires_six_chars() {
        assert_eq!(
            extract_claim_tag("About [CLM-ABCDEF1234] again"),
            Some("CLM-ABCDEF1234".to_string())
        );
        assert_eq!(extract_claim_tag("clm-abcdef1234 inline"), Some("clm-abcdef1234".to_string()));
        assert_eq!(extract_claim_tag("CLM-AB"), None);
        assert_eq!(extract_claim_tag("no tag here"), None);
    }

    #[test]
    fn minted_ids_are_well_formed_and_distinct() {
        let re = Regex::new(r"^CLM-[0-9A-F]{10}$").unwrap();
        let a = mint_claim_id();
        let b = mint_claim_id();
        assert!(re.is_match(&a), "{a}");
        assert!(re.is_match(&b), "{b}");
        assert_ne!(a, b);
    }
}
