//! The CLI's side of the host contract: record identity, control options and
//! the fixture-backed store.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tagbridge_control::{ControlConfig, SuggestionResolver, TagControl};
use tagbridge_model::{HostContext, Tag};
use tagbridge_store::{sample, MatchCase, MemoryStore, StoreConfig};

#[derive(Args, Debug, Clone)]
pub struct HostArgs {
    /// Fixture file backing the entity store
    #[arg(long, global = true, default_value = "tagbridge.json")]
    pub store: PathBuf,

    /// Entity type of the host record
    #[arg(long, global = true, default_value = sample::HOST_ENTITY)]
    pub entity_type: String,

    /// Id of the host record; omit (or pass the nil GUID) for an unsaved record
    #[arg(long, global = true)]
    pub entity_id: Option<String>,

    #[arg(long, global = true, default_value = sample::RELATED_ENTITY)]
    pub related_entity: String,

    #[arg(long, global = true, default_value = sample::JUNCTION_ENTITY)]
    pub relationship_entity: String,

    #[arg(long, global = true, default_value = sample::RELATIONSHIP)]
    pub relationship_name: String,

    /// Output encoding
    #[arg(long, global = true, value_parser = ["tagged", "keyList"])]
    pub format: Option<String>,

    #[arg(long, global = true)]
    pub max_suggestions: Option<usize>,

    /// Leave already-selected tags out of suggestions
    #[arg(long, global = true)]
    pub hide_selected: bool,

    /// Match suggestion filters case-sensitively
    #[arg(long, global = true)]
    pub case_sensitive: bool,

    /// Raw host parameter `NAME=VALUE`; overrides the flags above
    #[arg(long = "param", global = true, value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))
}

impl HostArgs {
    /// The parameter bag a host would hand the control.
    pub fn parameters(&self) -> HashMap<String, String> {
        let mut params = HashMap::from([
            ("relatedEntity".to_string(), self.related_entity.clone()),
            ("relationshipEntity".to_string(), self.relationship_entity.clone()),
            ("relationshipName".to_string(), self.relationship_name.clone()),
        ]);
        if let Some(format) = &self.format {
            params.insert("outputFormat".to_string(), format.clone());
        }
        if let Some(max) = self.max_suggestions {
            params.insert("maxSuggestions".to_string(), max.to_string());
        }
        if self.hide_selected {
            params.insert("hideSelectedSuggestions".to_string(), "true".to_string());
        }
        params.extend(self.params.iter().cloned());
        params
    }

    pub fn control_config(&self) -> Result<ControlConfig> {
        ControlConfig::from_parameters(&self.parameters()).context("invalid control parameters")
    }

    pub fn host_context(&self) -> HostContext {
        HostContext {
            entity_id: self.entity_id.clone(),
            entity_type: self.entity_type.clone(),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            match_case: if self.case_sensitive {
                MatchCase::Sensitive
            } else {
                MatchCase::Insensitive
            },
            latency_ms: 0,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// A loaded control bound to the fixture store.
pub struct Session {
    pub store: Arc<MemoryStore>,
    pub control: TagControl,
}

impl Session {
    pub async fn open(args: &HostArgs) -> Result<Self> {
        let store = Arc::new(MemoryStore::load(&args.store, args.store_config())?);
        let control = TagControl::new(
            args.control_config()?,
            args.host_context(),
            store.clone(),
            store.clone(),
        );
        control
            .initialize()
            .await
            .context("tag control failed to load")?;
        tracing::debug!(store = %args.store.display(), state = %control.state(), "session opened");
        Ok(Self { store, control })
    }

    /// Every related record, unfiltered and uncapped.
    pub async fn all_tags(&self) -> Result<Vec<Tag>> {
        let related = &self.control.descriptor().related_entity_type;
        let metadata = self
            .control
            .metadata()
            .cached(related)
            .ok_or_else(|| anyhow!("metadata for `{related}` not loaded"))?;
        Ok(SuggestionResolver::new(self.store.clone(), related.clone(), metadata)
            .suggest(None)
            .await)
    }
}

/// Map user-supplied keys or names (case-insensitive) onto known tags.
pub fn resolve_tags(candidates: &[Tag], wanted: &[String]) -> Result<Vec<Tag>> {
    wanted
        .iter()
        .map(|w| {
            candidates
                .iter()
                .find(|t| t.key.eq_ignore_ascii_case(w))
                .or_else(|| candidates.iter().find(|t| t.name.eq_ignore_ascii_case(w)))
                .cloned()
                .ok_or_else(|| anyhow!("unknown tag `{w}`"))
        })
        .collect()
}
