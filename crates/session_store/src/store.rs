use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use claim_core::{
    ClaimContext, ClaimRecord, ConversationEntry, DecisionRecord, FollowUpEntry, ParsedDoc,
    PendingPayload, Role,
};

use crate::error::Result;

const CLAIM_FILE: &str = "claim.json";
const CONTEXT_FILE: &str = "context.json";
const ATTACHMENT_DATA_FILE: &str = "attachment_data.json";
const PARSED_DOCS_FILE: &str = "parsed_docs.json";
const DECISIONS_FILE: &str = "decisions.json";
const FOLLOW_UP_FILE: &str = "follow_up.json";
const FOLLOW_UP_EMAIL_FILE: &str = "follow_up_email.json";
const CLARIFYING_FILE: &str = "clarifying_question.json";
const PROCESSED_FILE: &str = "processed_emails.json";
const PENDING_DIR: &str = "pending_payloads";
const ATTACHMENTS_DIR: &str = "attachments";

/// Session storage contract used by the orchestrator. All mutations are
/// durable before the call returns.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_claim(&self, claim_id: &str) -> Result<Option<ClaimRecord>>;
    async fn save_claim(&self, claim: &ClaimRecord) -> Result<()>;
    async fn create_claim_if_missing(&self, claim_id: &str) -> Result<ClaimRecord>;
    async fn delete_claim(&self, claim_id: &str) -> Result<()>;

    async fn append_conversation(&self, claim_id: &str, entry: ConversationEntry) -> Result<()>;
    async fn load_context(&self, claim_id: &str) -> Result<ClaimContext>;

    async fn record_parsed_doc(&self, claim_id: &str, filename: &str, text: &str) -> Result<()>;
    async fn load_parsed_docs(&self, claim_id: &str) -> Result<HashMap<String, ParsedDoc>>;
    async fn write_attachment_descriptions(
        &self,
        claim_id: &str,
        details: HashMap<String, String>,
    ) -> Result<()>;

    async fn store_attachment(&self, claim_id: &str, filename: &str, bytes: &[u8]) -> Result<()>;
    fn attachment_path(&self, claim_id: &str, filename: &str) -> PathBuf;

    async fn enqueue_pending(
        &self,
        claim_id: &str,
        agent: &str,
        payload: serde_json::Value,
    ) -> Result<()>;
    async fn list_unprocessed_pending(&self, claim_id: &str) -> Result<Vec<PendingPayload>>;
    async fn mark_pending_processed(&self, claim_id: &str, agent: &str) -> Result<()>;

    async fn put_decision(
        &self,
        claim_id: &str,
        agent: &str,
        decision: serde_json::Value,
    ) -> Result<()>;
    async fn load_decisions(&self, claim_id: &str) -> Result<Vec<DecisionRecord>>;

    async fn append_followup(&self, claim_id: &str, agent: &str, text: &str) -> Result<()>;
    async fn load_followups(&self, claim_id: &str) -> Result<Vec<FollowUpEntry>>;
    /// Atomic read-and-delete of the follow-up queue.
    async fn take_followups(&self, claim_id: &str) -> Result<Vec<FollowUpEntry>>;

    async fn append_agent_message(
        &self,
        claim_id: &str,
        agent: &str,
        role: Role,
        content: &str,
    ) -> Result<()>;

    async fn write_clarifier_artifact(
        &self,
        claim_id: &str,
        artifact: &serde_json::Value,
    ) -> Result<()>;
    async fn write_followup_email_artifact(
        &self,
        claim_id: &str,
        artifact: &serde_json::Value,
    ) -> Result<()>;

    async fn mark_mail_processed(&self, uid: &str) -> Result<()>;
    async fn is_mail_processed(&self, uid: &str) -> Result<bool>;

    async fn scan_claims(
        &self,
        predicate: &(dyn for<'a> Fn(&'a ClaimRecord) -> bool + Send + Sync),
    ) -> Result<Vec<ClaimRecord>>;

    /// Per-claim serialization lock for orchestration runs. Minted lazily on
    /// first access and kept for the process lifetime.
    fn claim_lock(&self, claim_id: &str) -> Arc<Mutex<()>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FollowUpFile {
    #[serde(default)]
    responses: Vec<FollowUpEntry>,
}

/// File-backed session store rooted at a sessions directory.
pub struct FileSessionStore {
    root: PathBuf,
    run_locks: DashMap<String, Arc<Mutex<()>>>,
    file_locks: DashMap<String, Arc<Mutex<()>>>,
    processed_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            run_locks: DashMap::new(),
            file_locks: DashMap::new(),
            processed_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn claim_dir(&self, claim_id: &str) -> PathBuf {
        self.root.join(format!("claim_{}", sanitize_id(claim_id)))
    }

    fn claim_file(&self, claim_id: &str, name: &str) -> PathBuf {
        self.claim_dir(claim_id).join(name)
    }

    fn pending_dir(&self, claim_id: &str) -> PathBuf {
        self.claim_dir(claim_id).join(PENDING_DIR)
    }

    fn pending_path(&self, claim_id: &str, agent: &str) -> PathBuf {
        self.pending_dir(claim_id).join(format!("{agent}_pending.json"))
    }

    /// Guards read-modify-write cycles on a claim's files. Distinct from the
    /// orchestration-level lock so a run holding [`SessionStore::claim_lock`]
    /// can still fan out workers that mutate the same claim.
    fn file_lock(&self, claim_id: &str) -> Arc<Mutex<()>> {
        self.file_locks
            .entry(claim_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_json_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T> {
        Ok(self.read_json(path).await?.unwrap_or_default())
    }

    /// Serialize to a temp file in the target directory, then rename into
    /// place so readers only ever observe complete documents.
    async fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_claim(&self, claim_id: &str) -> Result<Option<ClaimRecord>> {
        self.read_json(&self.claim_file(claim_id, CLAIM_FILE)).await
    }

    async fn save_claim(&self, claim: &ClaimRecord) -> Result<()> {
        // Serialized per claim so concurrent writers cannot collide on the
        // same temp file.
        let lock = self.file_lock(&claim.claim_id);
        let _held = lock.lock().await;
        self.write_json_atomic(&self.claim_file(&claim.claim_id, CLAIM_FILE), claim)
            .await
    }

    async fn create_claim_if_missing(&self, claim_id: &str) -> Result<ClaimRecord> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        fs::create_dir_all(self.pending_dir(claim_id)).await?;
        fs::create_dir_all(self.claim_dir(claim_id).join(ATTACHMENTS_DIR)).await?;
        if let Some(existing) = self.load_claim(claim_id).await? {
            return Ok(existing);
        }
        let claim = ClaimRecord::new(claim_id);
        self.write_json_atomic(&self.claim_file(claim_id, CLAIM_FILE), &claim)
            .await?;
        let context = ClaimContext {
            last_updated: Some(Utc::now()),
            ..ClaimContext::default()
        };
        self.write_json_atomic(&self.claim_file(claim_id, CONTEXT_FILE), &context)
            .await?;
        log::info!("[{claim_id}] created claim session");
        Ok(claim)
    }

    async fn delete_claim(&self, claim_id: &str) -> Result<()> {
        let dir = self.claim_dir(claim_id);
        if dir.exists() {
            fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    async fn append_conversation(&self, claim_id: &str, entry: ConversationEntry) -> Result<()> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        let path = self.claim_file(claim_id, CONTEXT_FILE);
        let mut context: ClaimContext = self.read_json_or_default(&path).await?;
        context.conversation_history.push(entry);
        context.last_updated = Some(Utc::now());
        self.write_json_atomic(&path, &context).await
    }

    async fn load_context(&self, claim_id: &str) -> Result<ClaimContext> {
        self.read_json_or_default(&self.claim_file(claim_id, CONTEXT_FILE))
            .await
    }

    async fn record_parsed_doc(&self, claim_id: &str, filename: &str, text: &str) -> Result<()> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        let path = self.claim_file(claim_id, PARSED_DOCS_FILE);
        let mut parsed: HashMap<String, ParsedDoc> = self.read_json_or_default(&path).await?;
        if parsed.contains_key(filename) {
            return Ok(());
        }
        parsed.insert(filename.to_string(), ParsedDoc { text: text.to_string() });
        self.write_json_atomic(&path, &parsed).await
    }

    async fn load_parsed_docs(&self, claim_id: &str) -> Result<HashMap<String, ParsedDoc>> {
        self.read_json_or_default(&self.claim_file(claim_id, PARSED_DOCS_FILE))
            .await
    }

    async fn write_attachment_descriptions(
        &self,
        claim_id: &str,
        details: HashMap<String, String>,
    ) -> Result<()> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        self.write_json_atomic(&self.claim_file(claim_id, ATTACHMENT_DATA_FILE), &details)
            .await?;
        let context_path = self.claim_file(claim_id, CONTEXT_FILE);
        let mut context: ClaimContext = self.read_json_or_default(&context_path).await?;
        context.attachment_details.extend(details);
        context.last_updated = Some(Utc::now());
        self.write_json_atomic(&context_path, &context).await
    }

    async fn store_attachment(&self, claim_id: &str, filename: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.claim_dir(claim_id).join(ATTACHMENTS_DIR);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(filename);
        let tmp = dir.join(format!("{filename}.part"));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn attachment_path(&self, claim_id: &str, filename: &str) -> PathBuf {
        self.claim_dir(claim_id).join(ATTACHMENTS_DIR).join(filename)
    }

    async fn enqueue_pending(
        &self,
        claim_id: &str,
        agent: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let record = PendingPayload {
            agent: agent.to_string(),
            payload,
            processed: false,
            timestamp: Utc::now(),
        };
        self.write_json_atomic(&self.pending_path(claim_id, agent), &record)
            .await
    }

    async fn list_unprocessed_pending(&self, claim_id: &str) -> Result<Vec<PendingPayload>> {
        let dir = self.pending_dir(claim_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut pending = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with("_pending.json") {
                continue;
            }
            if let Some(record) = self.read_json::<PendingPayload>(&entry.path()).await? {
                if !record.processed {
                    pending.push(record);
                }
            }
        }
        pending.sort_by(|a, b| a.agent.cmp(&b.agent));
        Ok(pending)
    }

    async fn mark_pending_processed(&self, claim_id: &str, agent: &str) -> Result<()> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        let path = self.pending_path(claim_id, agent);
        if let Some(mut record) = self.read_json::<PendingPayload>(&path).await? {
            record.processed = true;
            self.write_json_atomic(&path, &record).await?;
        }
        Ok(())
    }

    async fn put_decision(
        &self,
        claim_id: &str,
        agent: &str,
        decision: serde_json::Value,
    ) -> Result<()> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        let path = self.claim_file(claim_id, DECISIONS_FILE);
        let mut decisions: Vec<DecisionRecord> = self.read_json_or_default(&path).await?;
        decisions.retain(|record| record.agent != agent);
        decisions.push(DecisionRecord {
            agent: agent.to_string(),
            decision,
            timestamp: Utc::now(),
        });
        self.write_json_atomic(&path, &decisions).await
    }

    async fn load_decisions(&self, claim_id: &str) -> Result<Vec<DecisionRecord>> {
        self.read_json_or_default(&self.claim_file(claim_id, DECISIONS_FILE))
            .await
    }

    async fn append_followup(&self, claim_id: &str, agent: &str, text: &str) -> Result<()> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        let path = self.claim_file(claim_id, FOLLOW_UP_FILE);
        let mut file: FollowUpFile = self.read_json_or_default(&path).await?;
        file.responses.push(FollowUpEntry {
            agent: agent.to_string(),
            response: text.to_string(),
            timestamp: Utc::now(),
        });
        self.write_json_atomic(&path, &file).await
    }

    async fn load_followups(&self, claim_id: &str) -> Result<Vec<FollowUpEntry>> {
        let file: FollowUpFile = self
            .read_json_or_default(&self.claim_file(claim_id, FOLLOW_UP_FILE))
            .await?;
        Ok(file.responses)
    }

    async fn take_followups(&self, claim_id: &str) -> Result<Vec<FollowUpEntry>> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        let path = self.claim_file(claim_id, FOLLOW_UP_FILE);
        let file: FollowUpFile = self.read_json_or_default(&path).await?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(file.responses)
    }

    async fn append_agent_message(
        &self,
        claim_id: &str,
        agent: &str,
        role: Role,
        content: &str,
    ) -> Result<()> {
        let lock = self.file_lock(claim_id);
        let _held = lock.lock().await;
        let path = self.claim_file(claim_id, &format!("{agent}_messages.json"));
        let mut messages: Vec<ConversationEntry> = self.read_json_or_default(&path).await?;
        let entry = match role {
            Role::User => ConversationEntry::user(content),
            Role::Assistant => ConversationEntry::assistant(content),
        };
        messages.push(entry);
        self.write_json_atomic(&path, &messages).await
    }

    async fn write_clarifier_artifact(
        &self,
        claim_id: &str,
        artifact: &serde_json::Value,
    ) -> Result<()> {
        self.write_json_atomic(&self.claim_file(claim_id, CLARIFYING_FILE), artifact)
            .await
    }

    async fn write_followup_email_artifact(
        &self,
        claim_id: &str,
        artifact: &serde_json::Value,
    ) -> Result<()> {
        self.write_json_atomic(&self.claim_file(claim_id, FOLLOW_UP_EMAIL_FILE), artifact)
            .await
    }

    async fn mark_mail_processed(&self, uid: &str) -> Result<()> {
        let _held = self.processed_lock.lock().await;
        let path = self.root.join(PROCESSED_FILE);
        let mut processed: Vec<String> = self.read_json_or_default(&path).await?;
        if !processed.iter().any(|entry| entry == uid) {
            processed.push(uid.to_string());
            self.write_json_atomic(&path, &processed).await?;
        }
        Ok(())
    }

    async fn is_mail_processed(&self, uid: &str) -> Result<bool> {
        let _held = self.processed_lock.lock().await;
        let processed: Vec<String> = self
            .read_json_or_default(&self.root.join(PROCESSED_FILE))
            .await?;
        Ok(processed.iter().any(|entry| entry == uid))
    }

    async fn scan_claims(
        &self,
        predicate: &(dyn for<'a> Fn(&'a ClaimRecord) -> bool + Send + Sync),
    ) -> Result<Vec<ClaimRecord>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut matches = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("claim_") {
                continue;
            }
            let claim_path = entry.path().join(CLAIM_FILE);
            let result = self.read_json::<ClaimRecord>(&claim_path).await;
            match result {
                Ok(Some(claim)) => {
                    if predicate(&claim) {
                        matches.push(claim);
                    }
                }
                Ok(None) => {}
                Err(err) => log::warn!("skipping unreadable claim record {name}: {err}"),
            }
        }
        matches.sort_by(|a, b| a.claim_id.cmp(&b.claim_id));
        Ok(matches)
    }

    fn claim_lock(&self, claim_id: &str) -> Arc<Mutex<()>> {
        self.run_locks
            .entry(claim_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn sanitize_id(claim_id: &str) -> String {
    claim_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim_core::ClaimStage;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_and_load_claim() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let mut claim = store.create_claim_if_missing("CLM-AAAA111122").await.unwrap();
        claim.sender_email = "alice@example.com".to_string();
        store.save_claim(&claim).await.unwrap();

        let loaded = store.load_claim("CLM-AAAA111122").await.unwrap().unwrap();
        assert_eq!(loaded.sender_email, "alice@example.com");
        assert_eq!(loaded.stage, ClaimStage::New);
    }

    #[tokio::test]
    async fn create_claim_if_missing_keeps_existing_record() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let mut claim = store.create_claim_if_missing("CLM-BBBB222233").await.unwrap();
        claim.clarifying_sent = true;
        store.save_claim(&claim).await.unwrap();

        let again = store.create_claim_if_missing("CLM-BBBB222233").await.unwrap();
        assert!(again.clarifying_sent);
    }

    #[tokio::test]
    async fn load_missing_claim_is_none() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        assert!(store.load_claim("CLM-MISSING999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_temp_files_survive_a_write() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let claim = store.create_claim_if_missing("CLM-CCCC333344").await.unwrap();
        store.save_claim(&claim).await.unwrap();

        let mut leftovers = Vec::new();
        for entry in std::fs::read_dir(dir.path().join("claim_CLM-CCCC333344")).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            if name.ends_with(".tmp") || name.ends_with(".part") {
                leftovers.push(name);
            }
        }
        assert!(leftovers.is_empty(), "leftover temp files: {leftovers:?}");
    }

    #[tokio::test]
    async fn conversation_preserves_append_order() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_claim_if_missing("CLM-DDDD444455").await.unwrap();

        store
            .append_conversation("CLM-DDDD444455", ConversationEntry::user("first"))
            .await
            .unwrap();
        store
            .append_conversation("CLM-DDDD444455", ConversationEntry::assistant("second"))
            .await
            .unwrap();
        store
            .append_conversation("CLM-DDDD444455", ConversationEntry::user("third"))
            .await
            .unwrap();

        let context = store.load_context("CLM-DDDD444455").await.unwrap();
        let contents: Vec<&str> = context
            .conversation_history
            .iter()
            .map(|entry| entry.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn parsed_docs_are_never_recomputed() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_claim_if_missing("CLM-EEEE555566").await.unwrap();

        store
            .record_parsed_doc("CLM-EEEE555566", "report.pdf", "original text")
            .await
            .unwrap();
        store
            .record_parsed_doc("CLM-EEEE555566", "report.pdf", "replacement text")
            .await
            .unwrap();

        let parsed = store.load_parsed_docs("CLM-EEEE555566").await.unwrap();
        assert_eq!(parsed["report.pdf"].text, "original text");
    }

    #[tokio::test]
    async fn attachment_descriptions_merge_into_context() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_claim_if_missing("CLM-FFFF666677").await.unwrap();

        let mut details = HashMap::new();
        details.insert("photo.jpg".to_string(), "dented rear bumper".to_string());
        store
            .write_attachment_descriptions("CLM-FFFF666677", details)
            .await
            .unwrap();

        let context = store.load_context("CLM-FFFF666677").await.unwrap();
        assert_eq!(context.attachment_details["photo.jpg"], "dented rear bumper");
    }

    #[tokio::test]
    async fn pending_payload_lifecycle() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_claim_if_missing("CLM-GGGG777788").await.unwrap();

        store
            .enqueue_pending(
                "CLM-GGGG777788",
                "theft_assistant",
                json!({"reported_to_police": true, "time_lag_hours": 2}),
            )
            .await
            .unwrap();

        let pending = store.list_unprocessed_pending("CLM-GGGG777788").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].agent, "theft_assistant");
        assert!(!pending[0].processed);

        store
            .mark_pending_processed("CLM-GGGG777788", "theft_assistant")
            .await
            .unwrap();
        assert!(store
            .list_unprocessed_pending("CLM-GGGG777788")
            .await
            .unwrap()
            .is_empty());

        // The file itself stays behind, flipped to processed.
        let path = dir
            .path()
            .join("claim_CLM-GGGG777788")
            .join("pending_payloads")
            .join("theft_assistant_pending.json");
        let record: PendingPayload =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(record.processed);
    }

    #[tokio::test]
    async fn put_decision_replaces_prior_record_for_agent() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_claim_if_missing("CLM-HHHH888899").await.unwrap();

        store
            .put_decision("CLM-HHHH888899", "fire_assistant", json!({"outcome": "first"}))
            .await
            .unwrap();
        store
            .put_decision("CLM-HHHH888899", "theft_assistant", json!({"outcome": "other"}))
            .await
            .unwrap();
        store
            .put_decision("CLM-HHHH888899", "fire_assistant", json!({"outcome": "second"}))
            .await
            .unwrap();

        let decisions = store.load_decisions("CLM-HHHH888899").await.unwrap();
        assert_eq!(decisions.len(), 2);
        let fire: Vec<_> = decisions.iter().filter(|d| d.agent == "fire_assistant").collect();
        assert_eq!(fire.len(), 1);
        assert_eq!(fire[0].decision["outcome"], "second");
    }

    #[tokio::test]
    async fn followups_peek_then_take() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_claim_if_missing("CLM-IIII999900").await.unwrap();

        store
            .append_followup("CLM-IIII999900", "theft_assistant", "When was it stolen?")
            .await
            .unwrap();
        store
            .append_followup("CLM-IIII999900", "fire_assistant", "Was anyone hurt?")
            .await
            .unwrap();

        let peeked = store.load_followups("CLM-IIII999900").await.unwrap();
        assert_eq!(peeked.len(), 2);
        // Peeking does not consume.
        assert_eq!(store.load_followups("CLM-IIII999900").await.unwrap().len(), 2);

        let taken = store.take_followups("CLM-IIII999900").await.unwrap();
        assert_eq!(taken.len(), 2);
        assert!(store.load_followups("CLM-IIII999900").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn processed_mail_uids_survive_reopening_the_store() {
        let dir = tempdir().unwrap();
        {
            let store = FileSessionStore::new(dir.path());
            store.mark_mail_processed("1001").await.unwrap();
            store.mark_mail_processed("1001").await.unwrap();
        }
        let store = FileSessionStore::new(dir.path());
        assert!(store.is_mail_processed("1001").await.unwrap());
        assert!(!store.is_mail_processed("1002").await.unwrap());
    }

    #[tokio::test]
    async fn scan_claims_filters_by_predicate() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let mut a = store.create_claim_if_missing("CLM-JJJJ000011").await.unwrap();
        a.sender_email = "alice@example.com".to_string();
        store.save_claim(&a).await.unwrap();

        let mut b = store.create_claim_if_missing("CLM-KKKK111122").await.unwrap();
        b.sender_email = "bob@example.com".to_string();
        b.stage = ClaimStage::Complete;
        store.save_claim(&b).await.unwrap();

        let alices = store
            .scan_claims(&|claim: &ClaimRecord| claim.sender_email == "alice@example.com")
            .await
            .unwrap();
        assert_eq!(alices.len(), 1);
        assert_eq!(alices[0].claim_id, "CLM-JJJJ000011");

        let open = store
            .scan_claims(&|claim: &ClaimRecord| claim.stage != ClaimStage::Complete)
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].claim_id, "CLM-JJJJ000011");
    }

    #[tokio::test]
    async fn delete_claim_removes_attachments_too() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_claim_if_missing("CLM-LLLL222233").await.unwrap();
        store
            .store_attachment("CLM-LLLL222233", "photo.jpg", b"jpeg-bytes")
            .await
            .unwrap();
        assert!(store.attachment_path("CLM-LLLL222233", "photo.jpg").exists());

        store.delete_claim("CLM-LLLL222233").await.unwrap();
        assert!(store.load_claim("CLM-LLLL222233").await.unwrap().is_none());
        assert!(!store.attachment_path("CLM-LLLL222233", "photo.jpg").exists());
    }

    #[tokio::test]
    async fn agent_transcript_appends_roles_in_order() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        store.create_claim_if_missing("CLM-MMMM333344").await.unwrap();

        store
            .append_agent_message("CLM-MMMM333344", "theft_assistant", Role::User, "context")
            .await
            .unwrap();
        store
            .append_agent_message("CLM-MMMM333344", "theft_assistant", Role::Assistant, "reply")
            .await
            .unwrap();

        let path = dir
            .path()
            .join("claim_CLM-MMMM333344")
            .join("theft_assistant_messages.json");
        let messages: Vec<ConversationEntry> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn sanitize_id_replaces_path_characters() {
        assert_eq!(sanitize_id("CLM-AB12/..\\x"), "CLM-AB12____x");
        assert_eq!(sanitize_id("CLM-AB12CD34"), "CLM-AB12CD34");
    }

    #[test]
    fn claim_lock_is_shared_per_claim() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let first = store.claim_lock("CLM-NNNN444455");
        let second = store.claim_lock("CLM-NNNN444455");
        assert!(Arc::ptr_eq(&first, &second));
        let other = store.claim_lock("CLM-OOOO556677");
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
