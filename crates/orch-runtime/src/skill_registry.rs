use std::collections::HashMap;
use std::path::{Path, PathBuf};

use orch_types::{SkillContract, Tier};

use crate::error::Result;

/// One discovered root: a directory that may contain a `base/`, `packs/*`,
/// and `project/` tree of `SKILL.md` documents.
pub struct SkillRoot {
    pub path: PathBuf,
}

/// Discovers, parses, and tightens skill contracts from on-disk `SKILL.md`
/// documents across the base/pack/project tiers. Read-mostly: rebuilt
/// wholesale on `refresh_skills` rather than mutated incrementally.
pub struct SkillRegistry {
    roots: Vec<SkillRoot>,
    disabled: Vec<String>,
    contracts: HashMap<String, SkillContract>,
}

impl SkillRegistry {
    pub fn new(roots: Vec<SkillRoot>, disabled: Vec<String>) -> Self {
        Self { roots, disabled, contracts: HashMap::new() }
    }

    /// Walks every root's `base/`, `packs/<name>/`, and `project/`
    /// subdirectories, parses each `SKILL.md`, and tightens same-named
    /// contracts in tier order (base, then each pack, then project).
    /// Disabled skill names are removed after loading.
    pub fn refresh_skills(&mut self) -> Result<()> {
        let mut by_name: HashMap<String, Vec<(Tier, SkillContract)>> = HashMap::new();

        for root in &self.roots {
            self.collect_tier(&root.path.join("base"), Tier::Base, &mut by_name)?;
            if let Ok(entries) = std::fs::read_dir(root.path.join("packs")) {
                for entry in entries.flatten() {
                    if entry.path().is_dir() {
                        self.collect_tier(&entry.path(), Tier::Pack, &mut by_name)?;
                    }
                }
            }
            self.collect_tier(&root.path.join("project"), Tier::Project, &mut by_name)?;
        }

        let mut contracts = HashMap::new();
        for (name, mut variants) in by_name {
            variants.sort_by_key(|(tier, _)| *tier);
            let mut iter = variants.into_iter();
            let Some((_, mut merged)) = iter.next() else { continue };
            for (_, override_contract) in iter {
                merged = merged.tighten(&override_contract);
            }
            contracts.insert(name, merged);
        }

        for name in &self.disabled {
            contracts.remove(name);
        }

        self.contracts = contracts;
        Ok(())
    }

    fn collect_tier(
        &self,
        dir: &Path,
        tier: Tier,
        by_name: &mut HashMap<String, Vec<(Tier, SkillContract)>>,
    ) -> Result<()> {
        let Ok(entries) = std::fs::read_dir(dir) else { return Ok(()) };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_skill_doc = path.file_name().and_then(|n| n.to_str()) == Some("SKILL.md")
                || path.extension().and_then(|e| e.to_str()) == Some("md");
            if !is_skill_doc {
                continue;
            }
            let raw = std::fs::read_to_string(&path)?;
            let contract = parse_skill_document(&raw, tier)?;
            by_name.entry(contract.name.clone()).or_default().push((tier, contract));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SkillContract> {
        self.contracts.get(name)
    }

    pub fn all(&self) -> impl Iterator<Item = &SkillContract> {
        self.contracts.values()
    }

    pub fn write_index(&self, path: &Path) -> Result<()> {
        let names: Vec<&str> = self.contracts.keys().map(|s| s.as_str()).collect();
        let payload = serde_json::json!({ "skills": names });
        orch_core::write_atomic(path, serde_json::to_string_pretty(&payload)?.as_bytes())?;
        Ok(())
    }
}

/// `SKILL.md` documents are YAML frontmatter (delimited by `---` lines)
/// followed by a Markdown instructional body.
fn parse_skill_document(raw: &str, tier: Tier) -> Result<SkillContract> {
    let (frontmatter, body) = split_frontmatter(raw);
    let mut contract: SkillContract = serde_yaml::from_str(frontmatter)?;
    contract.tier = tier;
    contract.instructions = body.trim().to_string();
    Ok(contract)
}

fn split_frontmatter(raw: &str) -> (&str, &str) {
    let trimmed = raw.trim_start();
    if let Some(rest) = trimmed.strip_prefix("---\n") {
        if let Some(end) = rest.find("\n---") {
            let frontmatter = &rest[..end];
            let body = &rest[end + 4..];
            return (frontmatter, body);
        }
    }
    (raw, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_skill(dir: &Path, name: &str, yaml: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("SKILL.md"), format!("---\n{yaml}\n---\ninstructions go here\n")).unwrap();
    }

    #[test]
    fn discovers_and_tightens_across_tiers() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(
            &dir.path().join("base"),
            "editor",
            "name: editor\ntools:\n  required: [edit]\n  optional: [bash]\n  denied: []\nbudget:\n  max_tool_calls: 100\n  max_tokens: 100000\nmax_parallel: 4\n",
        );
        write_skill(
            &dir.path().join("project"),
            "editor",
            "name: editor\ntools:\n  required: [edit]\n  optional: []\n  denied: [bash]\nbudget:\n  max_tool_calls: 10\n  max_tokens: 50000\nmax_parallel: 1\n",
        );

        let mut registry = SkillRegistry::new(vec![SkillRoot { path: dir.path().to_path_buf() }], Vec::new());
        registry.refresh_skills().unwrap();

        let contract = registry.get("editor").unwrap();
        assert!(contract.tools.denied.contains("bash"));
        assert_eq!(contract.budget.max_tool_calls, 10);
        assert_eq!(contract.max_parallel, 1);
    }

    #[test]
    fn disabled_skills_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(
            &dir.path().join("base"),
            "scratch",
            "name: scratch\ntools:\n  required: []\n  optional: []\n  denied: []\nbudget:\n  max_tool_calls: 5\n  max_tokens: 1000\nmax_parallel: 1\n",
        );
        let mut registry =
            SkillRegistry::new(vec![SkillRoot { path: dir.path().to_path_buf() }], vec!["scratch".to_string()]);
        registry.refresh_skills().unwrap();
        assert!(registry.get("scratch").is_none());
    }
}
