use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Base,
    Pack,
    Project,
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    Stable,
    Experimental,
    Deprecated,
}

impl Default for Stability {
    fn default() -> Self {
        Stability::Stable
    }
}

/// Required/optional/denied tool access for a skill.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolAccess {
    #[serde(default)]
    pub required: BTreeSet<String>,
    #[serde(default)]
    pub optional: BTreeSet<String>,
    #[serde(default)]
    pub denied: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SkillBudget {
    pub max_tool_calls: u32,
    pub max_tokens: u64,
}

impl SkillBudget {
    pub fn unbounded() -> Self {
        Self {
            max_tool_calls: u32::MAX,
            max_tokens: u64::MAX,
        }
    }
}

/// A parsed, possibly-tightened skill contract. Project-tier contracts
/// override pack-tier which override base-tier; overrides may only
/// tighten a contract, never loosen it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillContract {
    pub name: String,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub anti_tags: BTreeSet<String>,
    pub tools: ToolAccess,
    pub budget: SkillBudget,
    pub max_parallel: u32,
    #[serde(default)]
    pub stability: Stability,
    #[serde(default)]
    pub cost_hint: Option<f64>,
    /// Markdown instructional body, parsed separately from frontmatter.
    #[serde(default)]
    pub instructions: String,
}

impl SkillContract {
    /// Tighten `self` (the existing, lower-tier contract) using `other` (a
    /// higher-tier override). Overrides may only tighten:
    /// - `denied` is the union of both.
    /// - `required` is the intersection with the pre-existing allow-set.
    /// - `optional` is filtered to members of the allow-set not in
    ///   `required`/`denied`.
    /// - `max_tool_calls`/`max_tokens` take the min.
    /// - `max_parallel` takes the min.
    ///
    /// Idempotent: `tighten(tighten(base, o), o) == tighten(base, o)`.
    pub fn tighten(&self, other: &SkillContract) -> SkillContract {
        let denied: BTreeSet<String> = self.tools.denied.union(&other.tools.denied).cloned().collect();

        let allow_set: BTreeSet<String> = self
            .tools
            .required
            .union(&self.tools.optional)
            .cloned()
            .collect();

        let required: BTreeSet<String> = other
            .tools
            .required
            .iter()
            .filter(|t| allow_set.contains(*t) && !denied.contains(*t))
            .cloned()
            .collect();

        let optional: BTreeSet<String> = other
            .tools
            .optional
            .iter()
            .chain(self.tools.optional.iter())
            .filter(|t| allow_set.contains(*t) && !required.contains(*t) && !denied.contains(*t))
            .cloned()
            .collect();

        SkillContract {
            name: self.name.clone(),
            tier: other.tier,
            tags: self.tags.union(&other.tags).cloned().collect(),
            anti_tags: self.anti_tags.union(&other.anti_tags).cloned().collect(),
            tools: ToolAccess {
                required,
                optional,
                denied,
            },
            budget: SkillBudget {
                max_tool_calls: self.budget.max_tool_calls.min(other.budget.max_tool_calls),
                max_tokens: self.budget.max_tokens.min(other.budget.max_tokens),
            },
            max_parallel: self.max_parallel.min(other.max_parallel),
            stability: other.stability,
            cost_hint: other.cost_hint.or(self.cost_hint),
            instructions: if other.instructions.is_empty() {
                self.instructions.clone()
            } else {
                other.instructions.clone()
            },
        }
    }

    pub fn is_denied(&self, tool: &str) -> bool {
        self.tools.denied.contains(tool)
    }

    pub fn is_allowed(&self, tool: &str) -> bool {
        !self.is_denied(tool)
            && (self.tools.required.contains(tool) || self.tools.optional.contains(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SkillContract {
        SkillContract {
            name: "editor".into(),
            tier: Tier::Base,
            tags: BTreeSet::new(),
            anti_tags: BTreeSet::new(),
            tools: ToolAccess {
                required: ["edit".to_string()].into_iter().collect(),
                optional: ["bash".to_string(), "grep".to_string()].into_iter().collect(),
                denied: BTreeSet::new(),
            },
            budget: SkillBudget {
                max_tool_calls: 100,
                max_tokens: 100_000,
            },
            max_parallel: 4,
            stability: Stability::Stable,
            cost_hint: None,
            instructions: String::new(),
        }
    }

    fn project_override() -> SkillContract {
        SkillContract {
            name: "editor".into(),
            tier: Tier::Project,
            tags: BTreeSet::new(),
            anti_tags: BTreeSet::new(),
            tools: ToolAccess {
                required: ["edit".to_string(), "write".to_string()].into_iter().collect(),
                optional: BTreeSet::new(),
                denied: ["bash".to_string()].into_iter().collect(),
            },
            budget: SkillBudget {
                max_tool_calls: 20,
                max_tokens: 200_000,
            },
            max_parallel: 1,
            stability: Stability::Stable,
            cost_hint: None,
            instructions: String::new(),
        }
    }

    #[test]
    fn tighten_only_narrows() {
        let tightened = base().tighten(&project_override());
        assert!(tightened.tools.denied.contains("bash"));
        assert!(tightened.tools.required.contains("edit"));
        assert!(!tightened.tools.required.contains("write"), "write was never in the base allow-set");
        assert!(!tightened.tools.optional.contains("bash"), "bash is denied");
        assert_eq!(tightened.budget.max_tool_calls, 20);
        assert_eq!(tightened.budget.max_tokens, 100_000);
        assert_eq!(tightened.max_parallel, 1);
    }

    #[test]
    fn tighten_is_idempotent() {
        let once = base().tighten(&project_override());
        let twice = once.tighten(&project_override());
        assert_eq!(once.tools.denied, twice.tools.denied);
        assert_eq!(once.tools.required, twice.tools.required);
        assert_eq!(once.tools.optional, twice.tools.optional);
        assert_eq!(once.budget.max_tool_calls, twice.budget.max_tool_calls);
    }
}
